//! Forwarding-call propagation.
//!
//! Factory templates such as `makeHandle<T>(args...)` construct a `T`
//! somewhere inside their body. The construction's location is dependent, so
//! the gather pass marks it as *forwarded*; the analyze pass then attaches
//! each concrete construction (or nested forwarding call) to the
//! instantiation it appears in. A use of that instantiation elsewhere walks
//! the chain and reports the constructor at the use site.

use std::collections::{HashMap, HashSet};

use crate::model::{DeclId, ExprId, ExprKind, SourceLoc, TranslationUnit};

#[derive(Debug, Default)]
pub struct ForwardingTracker {
    forwarded_locations: HashSet<SourceLoc>,
    forwarding: HashMap<DeclId, Vec<ExprId>>,
}

impl ForwardingTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a dependent callee / allocated-type location as forwarded.
    pub fn mark_location(&mut self, loc: SourceLoc) {
        self.forwarded_locations.insert(loc);
    }

    pub fn is_forwarded(&self, loc: &SourceLoc) -> bool {
        self.forwarded_locations.contains(loc)
    }

    /// Attach an expression found at a forwarded location to the function
    /// template instantiation containing it.
    pub fn register(&mut self, instantiation: DeclId, expr: ExprId) {
        let entries = self.forwarding.entry(instantiation).or_default();
        if !entries.contains(&expr) {
            entries.push(expr);
        }
    }

    pub fn forwarded_by(&self, instantiation: DeclId) -> &[ExprId] {
        self.forwarding
            .get(&instantiation)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Constructions reachable from `start` through forwarding
    /// instantiations, in discovery order.
    pub fn collect_constructions(&self, tu: &TranslationUnit, start: ExprId) -> Vec<ExprId> {
        let mut todo = vec![start];
        let mut seen = HashSet::new();
        let mut constructions = Vec::new();

        while let Some(current) = todo.pop() {
            if !seen.insert(current) {
                continue;
            }
            let expr = tu.expr(current);
            let target = match &expr.kind {
                ExprKind::Construct(_) => {
                    constructions.push(current);
                    None
                }
                ExprKind::Call(call) => call.callee_decl,
                ExprKind::DeclRef(r) => Some(r.decl),
                _ => None,
            };

            let Some(target) = target else {
                continue;
            };
            let is_instantiation = tu
                .decl(target)
                .as_function()
                .is_some_and(|f| f.is_instantiation());
            if !is_instantiation {
                continue;
            }
            todo.extend(
                self.forwarded_by(target)
                    .iter()
                    .copied()
                    .filter(|e| !seen.contains(e)),
            );
        }

        constructions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        CallInfo, ConstructInfo, Decl, DeclKind, DeclRefInfo, Expr, FunctionInfo, SourceFile,
    };

    fn instantiation(tu: &mut TranslationUnit, name: &str) -> DeclId {
        let pattern = tu.add_decl(Decl::new(
            DeclKind::Function(FunctionInfo::default()),
            Some(name),
            SourceLoc::new(0, 0),
        ));
        tu.add_decl(Decl::new(
            DeclKind::Function(FunctionInfo {
                pattern: Some(pattern),
                ..Default::default()
            }),
            Some(name),
            SourceLoc::new(0, 0),
        ))
    }

    fn call(tu: &mut TranslationUnit, target: DeclId) -> ExprId {
        let callee = tu.add_expr(Expr::new(
            ExprKind::DeclRef(DeclRefInfo {
                decl: target,
                name_loc: None,
            }),
            SourceLoc::new(0, 1),
        ));
        tu.add_expr(Expr::new(
            ExprKind::Call(CallInfo {
                callee,
                args: Vec::new(),
                callee_decl: Some(target),
                operator_loc: None,
                return_type: None,
            }),
            SourceLoc::new(0, 1),
        ))
    }

    #[test]
    fn test_chain_through_two_forwarders() {
        let mut tu = TranslationUnit::default();
        tu.add_file(SourceFile::new("/src/a.cpp", ""));
        let ctor = tu.add_decl(Decl::new(
            DeclKind::Function(FunctionInfo::default()),
            Some("Widget"),
            SourceLoc::new(0, 0),
        ));
        let outer = instantiation(&mut tu, "makeHandle");
        let inner = instantiation(&mut tu, "makeUnique");

        let construct = tu.add_expr(Expr::new(
            ExprKind::Construct(ConstructInfo { constructor: ctor }),
            SourceLoc::new(0, 2),
        ));
        let inner_call = call(&mut tu, inner);
        let use_site = call(&mut tu, outer);

        let mut tracker = ForwardingTracker::new();
        tracker.register(inner, construct);
        tracker.register(outer, inner_call);
        tracker.register(outer, inner_call);
        assert_eq!(tracker.forwarded_by(outer).len(), 1);

        assert_eq!(tracker.collect_constructions(&tu, use_site), vec![construct]);
    }

    #[test]
    fn test_cycles_terminate() {
        let mut tu = TranslationUnit::default();
        tu.add_file(SourceFile::new("/src/a.cpp", ""));
        let a = instantiation(&mut tu, "a");
        let b = instantiation(&mut tu, "b");
        let call_b = call(&mut tu, b);
        let call_a = call(&mut tu, a);

        let mut tracker = ForwardingTracker::new();
        tracker.register(a, call_b);
        tracker.register(b, call_a);
        assert!(tracker.collect_constructions(&tu, call_a).is_empty());
    }

    #[test]
    fn test_non_instantiations_are_not_followed() {
        let mut tu = TranslationUnit::default();
        tu.add_file(SourceFile::new("/src/a.cpp", ""));
        let plain = tu.add_decl(Decl::new(
            DeclKind::Function(FunctionInfo::default()),
            Some("plain"),
            SourceLoc::new(0, 0),
        ));
        let construct = tu.add_expr(Expr::new(
            ExprKind::Construct(ConstructInfo { constructor: plain }),
            SourceLoc::new(0, 2),
        ));
        let use_site = call(&mut tu, plain);

        let mut tracker = ForwardingTracker::new();
        tracker.register(plain, construct);
        assert!(tracker.collect_constructions(&tu, use_site).is_empty());
        assert!(!tracker.is_forwarded(&SourceLoc::new(0, 2)));
        tracker.mark_location(SourceLoc::new(0, 2));
        assert!(tracker.is_forwarded(&SourceLoc::new(0, 2)));
    }
}

//! Best-effort resolution of names inside templates.
//!
//! When the object or qualifier type depends on template parameters the
//! front-end cannot resolve a name. We propose candidates by looking the
//! name up in the record the dependent type most likely names (and its
//! bases), then filter by the arity of the enclosing call. Results are
//! marked as heuristic in the emitted records.

use std::collections::HashSet;

use crate::model::{DeclId, DeclKind, DependentLookup, TranslationUnit};

pub struct HeuristicResolver<'a> {
    tu: &'a TranslationUnit,
}

impl<'a> HeuristicResolver<'a> {
    pub fn new(tu: &'a TranslationUnit) -> Self {
        Self { tu }
    }

    /// Candidate declarations for a dependent name.
    pub fn resolve(&self, lookup: &DependentLookup) -> Vec<DeclId> {
        if !lookup.candidates.is_empty() {
            return lookup.candidates.clone();
        }
        match lookup.base {
            Some(base) => self.lookup_member(base, &lookup.name),
            None => Vec::new(),
        }
    }

    /// By-name lookup in a record and, when nothing is found there, its bases.
    pub fn lookup_member(&self, record: DeclId, name: &str) -> Vec<DeclId> {
        let mut seen = HashSet::new();
        let mut pending = vec![record];
        let mut found = Vec::new();

        while let Some(current) = pending.pop() {
            let Some(current) = self.record_of(current) else {
                continue;
            };
            if !seen.insert(current) {
                continue;
            }
            let decl = self.tu.decl(current);
            let hits: Vec<DeclId> = decl
                .members
                .iter()
                .copied()
                .filter(|&m| self.tu.decl(m).name() == name)
                .collect();
            if !hits.is_empty() {
                found.extend(hits);
                continue;
            }
            if let Some(info) = decl.as_record() {
                pending.extend(info.bases.iter().rev().map(|b| b.record));
            }
        }

        found
    }

    /// Record behind a record or class template declaration.
    fn record_of(&self, id: DeclId) -> Option<DeclId> {
        match &self.tu.decl(id).kind {
            DeclKind::Record(_) => Some(id),
            DeclKind::ClassTemplate(t) => Some(t.templated),
            _ => None,
        }
    }

    /// Look through using-shadows and templates to the declaration a use
    /// should point at.
    pub fn unwrap_candidate(&self, mut id: DeclId) -> DeclId {
        // Bounded against cyclic shadows in malformed input.
        for _ in 0..8 {
            id = match &self.tu.decl(id).kind {
                DeclKind::UsingShadow(u) => u.target,
                DeclKind::FunctionTemplate(t) => t.templated,
                DeclKind::ClassTemplate(t) => t.templated,
                DeclKind::AliasTemplate(t) => t.templated,
                _ => return id,
            };
        }
        id
    }

    /// Whether `candidate` can accept `arg_count` arguments.
    ///
    /// Unknown call shape or a non-function candidate accepts. Variadic
    /// functions and parameter packs have no upper bound.
    pub fn arity_matches(&self, candidate: DeclId, arg_count: Option<usize>) -> bool {
        let Some(argc) = arg_count else {
            return true;
        };
        let candidate = self.unwrap_candidate(candidate);
        let Some(func) = self.tu.decl(candidate).as_function() else {
            return true;
        };

        let mut has_pack = false;
        let mut required = 0;
        for &param in &func.params {
            if let DeclKind::Var(v) = &self.tu.decl(param).kind {
                has_pack |= v.pack;
                if !v.has_default && !v.pack {
                    required += 1;
                }
            }
        }
        let min = func.min_args.unwrap_or(required);
        let max = if func.variadic || has_pack {
            usize::MAX
        } else {
            func.params.len()
        };

        argc >= min && argc <= max
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        BaseSpec, ClassTemplateInfo, Decl, FunctionInfo, RecordInfo, SourceFile, SourceLoc,
        UsingShadowInfo, VarInfo, VarScope,
    };

    fn param(tu: &mut TranslationUnit, has_default: bool, pack: bool) -> DeclId {
        tu.add_decl(Decl::new(
            DeclKind::Var(VarInfo {
                scope: VarScope::Param,
                has_default,
                pack,
                ..Default::default()
            }),
            Some("p"),
            SourceLoc::new(0, 0),
        ))
    }

    fn function(
        tu: &mut TranslationUnit,
        name: &str,
        params: Vec<DeclId>,
        variadic: bool,
    ) -> DeclId {
        tu.add_decl(Decl::new(
            DeclKind::Function(FunctionInfo {
                params,
                variadic,
                ..Default::default()
            }),
            Some(name),
            SourceLoc::new(0, 0),
        ))
    }

    fn unit() -> TranslationUnit {
        let mut tu = TranslationUnit::default();
        tu.add_file(SourceFile::new("/src/a.h", ""));
        tu
    }

    #[test]
    fn test_arity_filter() {
        let mut tu = unit();
        let a = param(&mut tu, false, false);
        let b = param(&mut tu, true, false);
        let two = function(&mut tu, "f", vec![a, b], false);
        let pack = param(&mut tu, false, true);
        let packed = function(&mut tu, "g", vec![pack], false);
        let c_variadic = function(&mut tu, "h", vec![a], true);

        let r = HeuristicResolver::new(&tu);
        assert!(r.arity_matches(two, None));
        assert!(!r.arity_matches(two, Some(0)));
        assert!(r.arity_matches(two, Some(1)));
        assert!(r.arity_matches(two, Some(2)));
        assert!(!r.arity_matches(two, Some(3)));
        assert!(r.arity_matches(packed, Some(0)));
        assert!(r.arity_matches(packed, Some(12)));
        assert!(!r.arity_matches(c_variadic, Some(0)));
        assert!(r.arity_matches(c_variadic, Some(5)));
    }

    #[test]
    fn test_lookup_through_bases_and_templates() {
        let mut tu = unit();
        let base = tu.add_decl(Decl::new(
            DeclKind::Record(RecordInfo::default()),
            Some("Base"),
            SourceLoc::new(0, 0),
        ));
        let method = function(&mut tu, "get", vec![], false);
        tu.decl_mut(base).members.push(method);

        let derived = tu.add_decl(Decl::new(
            DeclKind::Record(RecordInfo {
                bases: vec![BaseSpec {
                    record: base,
                    is_virtual: false,
                }],
                ..Default::default()
            }),
            Some("Derived"),
            SourceLoc::new(0, 0),
        ));
        let template = tu.add_decl(Decl::new(
            DeclKind::ClassTemplate(ClassTemplateInfo {
                templated: derived,
                ..Default::default()
            }),
            Some("Derived"),
            SourceLoc::new(0, 0),
        ));

        let r = HeuristicResolver::new(&tu);
        let lookup = DependentLookup {
            name: "get".to_string(),
            base: Some(template),
            candidates: Vec::new(),
        };
        assert_eq!(r.resolve(&lookup), vec![method]);
        assert!(r.lookup_member(derived, "missing").is_empty());
    }

    #[test]
    fn test_cyclic_bases_terminate() {
        let mut tu = unit();
        let a = tu.add_decl(Decl::new(
            DeclKind::Record(RecordInfo::default()),
            Some("A"),
            SourceLoc::new(0, 0),
        ));
        let b = tu.add_decl(Decl::new(
            DeclKind::Record(RecordInfo {
                bases: vec![BaseSpec {
                    record: a,
                    is_virtual: false,
                }],
                ..Default::default()
            }),
            Some("B"),
            SourceLoc::new(0, 0),
        ));
        if let DeclKind::Record(info) = &mut tu.decl_mut(a).kind {
            info.bases.push(BaseSpec {
                record: b,
                is_virtual: false,
            });
        }
        let r = HeuristicResolver::new(&tu);
        assert!(r.lookup_member(a, "x").is_empty());
    }

    #[test]
    fn test_unwrap_using_shadow() {
        let mut tu = unit();
        let f = function(&mut tu, "f", vec![], false);
        let shadow = tu.add_decl(Decl::new(
            DeclKind::UsingShadow(UsingShadowInfo { target: f }),
            Some("f"),
            SourceLoc::new(0, 0),
        ));
        let r = HeuristicResolver::new(&tu);
        assert_eq!(r.unwrap_candidate(shadow), f);
        assert_eq!(r.unwrap_candidate(f), f);
    }
}

//! Enclosing-scope tracking.
//!
//! Frames live in a caller-owned arena and point at their parent by index.
//! The stack can be detached, so an out-of-line definition reached from
//! inside a class body starts without the class as its context.

use crate::model::{DeclId, DeclKind, TranslationUnit};

/// The innermost enclosing named entity of an occurrence.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Context {
    pub name: String,
    pub symbol: String,
}

impl Context {
    pub fn is_empty(&self) -> bool {
        self.name.is_empty()
    }
}

#[derive(Debug, Clone)]
struct ContextFrame {
    decl: Option<DeclId>,
    visit_implicit: bool,
    parent: Option<usize>,
}

/// Saved position of a detached stack.
#[derive(Debug, Clone, Copy)]
#[must_use]
pub struct DetachedContext(Option<usize>);

#[derive(Debug, Default)]
pub struct ContextStack {
    frames: Vec<ContextFrame>,
    current: Option<usize>,
}

impl ContextStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enter a scope. `decl` is `None` for anonymous scopes such as lambdas.
    /// The implicit-code flag is inherited by every nested frame.
    pub fn push(&mut self, decl: Option<DeclId>, visit_implicit: bool) {
        let inherited = self.visit_implicit();
        self.frames.push(ContextFrame {
            decl,
            visit_implicit: visit_implicit || inherited,
            parent: self.current,
        });
        self.current = Some(self.frames.len() - 1);
    }

    /// Leave the innermost scope.
    pub fn pop(&mut self) {
        if let Some(idx) = self.current {
            self.current = self.frames[idx].parent;
            self.frames.truncate(idx);
        }
    }

    /// Continue with an empty context until [`ContextStack::restore`].
    pub fn detach(&mut self) -> DetachedContext {
        DetachedContext(self.current.take())
    }

    pub fn restore(&mut self, saved: DetachedContext) {
        self.current = saved.0;
    }

    /// Whether compiler-generated code should be traversed.
    pub fn visit_implicit(&self) -> bool {
        self.current
            .map(|idx| self.frames[idx].visit_implicit)
            .unwrap_or(false)
    }

    fn ancestors(&self) -> impl Iterator<Item = &ContextFrame> {
        std::iter::successors(self.current.map(|idx| &self.frames[idx]), |frame| {
            frame.parent.map(|idx| &self.frames[idx])
        })
    }

    /// Innermost declaration on the stack, skipping `skip`.
    pub fn nearest(&self, skip: Option<DeclId>) -> Option<DeclId> {
        self.ancestors()
            .filter_map(|frame| frame.decl)
            .find(|&decl| Some(decl) != skip)
    }

    /// Innermost function on the stack that is a template instantiation.
    pub fn current_instantiation(&self, tu: &TranslationUnit) -> Option<DeclId> {
        self.ancestors().filter_map(|frame| frame.decl).find(|&decl| {
            matches!(&tu.decl(decl).kind, DeclKind::Function(f) if f.is_instantiation())
        })
    }

    pub fn depth(&self) -> usize {
        self.ancestors().count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Decl, FunctionInfo, SourceFile, SourceLoc};

    #[test]
    fn test_nearest_skips_anonymous_frames() {
        let mut stack = ContextStack::new();
        assert_eq!(stack.nearest(None), None);
        stack.push(Some(3), false);
        stack.push(None, true);
        assert_eq!(stack.nearest(None), Some(3));
        assert!(stack.visit_implicit());
        stack.push(Some(5), false);
        assert!(stack.visit_implicit());
        assert_eq!(stack.nearest(None), Some(5));
        assert_eq!(stack.nearest(Some(5)), Some(3));
        stack.pop();
        stack.pop();
        assert!(!stack.visit_implicit());
        stack.pop();
        assert_eq!(stack.depth(), 0);
    }

    #[test]
    fn test_detach_and_restore() {
        let mut stack = ContextStack::new();
        stack.push(Some(1), false);
        let saved = stack.detach();
        assert_eq!(stack.nearest(None), None);
        stack.push(Some(2), false);
        assert_eq!(stack.nearest(None), Some(2));
        assert_eq!(stack.depth(), 1);
        stack.pop();
        stack.restore(saved);
        assert_eq!(stack.nearest(None), Some(1));
    }

    #[test]
    fn test_current_instantiation() {
        let mut tu = TranslationUnit::default();
        tu.add_file(SourceFile::new("/src/a.cpp", ""));
        let pattern = tu.add_decl(Decl::new(
            DeclKind::Function(FunctionInfo::default()),
            Some("make"),
            SourceLoc::new(0, 0),
        ));
        let inst = tu.add_decl(Decl::new(
            DeclKind::Function(FunctionInfo {
                pattern: Some(pattern),
                ..Default::default()
            }),
            Some("make"),
            SourceLoc::new(0, 0),
        ));

        let mut stack = ContextStack::new();
        stack.push(Some(inst), false);
        stack.push(None, true);
        assert_eq!(stack.current_instantiation(&tu), Some(inst));
        stack.pop();
        stack.pop();
        stack.push(Some(pattern), false);
        assert_eq!(stack.current_instantiation(&tu), None);
    }
}

//! Two-pass handling of templates.
//!
//! A template body is first walked in [`TemplateMode::Gather`], recording
//! every location whose meaning depends on the template arguments. If any
//! were found, the specializations are walked in [`TemplateMode::Analyze`]
//! and only those locations produce records there. Non-dependent code in a
//! template therefore yields one record no matter how often it is
//! instantiated, while dependent code yields one per instantiation.

use std::collections::HashSet;

use crate::model::SourceLoc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateMode {
    Gather,
    Analyze,
}

#[derive(Debug)]
struct TemplateFrame {
    mode: TemplateMode,
    dependent: HashSet<SourceLoc>,
    parent: Option<usize>,
}

/// Stack of template frames, innermost last.
#[derive(Debug, Default)]
pub struct TemplateStack {
    frames: Vec<TemplateFrame>,
}

impl TemplateStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enter a template. The frame starts in Analyze when any enclosing
    /// frame is analyzing, otherwise in Gather.
    pub fn push(&mut self) {
        let parent = self.frames.len().checked_sub(1);
        let mode = if self.frames_up(parent).any(|f| f.mode == TemplateMode::Analyze) {
            TemplateMode::Analyze
        } else {
            TemplateMode::Gather
        };
        self.frames.push(TemplateFrame {
            mode,
            dependent: HashSet::new(),
            parent,
        });
    }

    pub fn pop(&mut self) {
        self.frames.pop();
    }

    pub fn is_active(&self) -> bool {
        !self.frames.is_empty()
    }

    pub fn mode(&self) -> Option<TemplateMode> {
        self.frames.last().map(|f| f.mode)
    }

    pub fn in_gather_mode(&self) -> bool {
        self.mode() == Some(TemplateMode::Gather)
    }

    fn frames_up(&self, start: Option<usize>) -> impl Iterator<Item = &TemplateFrame> {
        std::iter::successors(start.map(|idx| &self.frames[idx]), |frame| {
            frame.parent.map(|idx| &self.frames[idx])
        })
    }

    /// Record a dependent location in the innermost frame and every
    /// gathering ancestor. Does nothing while analyzing.
    pub fn visit_dependent(&mut self, loc: SourceLoc) {
        let mut idx = self.frames.len().checked_sub(1);
        while let Some(i) = idx {
            let frame = &mut self.frames[i];
            if frame.mode == TemplateMode::Analyze {
                return;
            }
            frame.dependent.insert(loc);
            idx = frame.parent;
        }
    }

    /// Whether a second pass over the specializations is needed.
    pub fn needs_analysis(&self) -> bool {
        self.frames_up(self.frames.len().checked_sub(1))
            .any(|f| !f.dependent.is_empty())
    }

    /// Switch the innermost frame to Analyze.
    pub fn switch_to_analyze(&mut self) {
        if let Some(frame) = self.frames.last_mut() {
            frame.mode = TemplateMode::Analyze;
        }
    }

    /// Whether records at `loc` should be emitted. Outside templates and
    /// while gathering everything is emitted; while analyzing only
    /// locations some frame recorded as dependent.
    pub fn should_visit(&self, loc: &SourceLoc) -> bool {
        if self.frames.is_empty() {
            return true;
        }
        for frame in self.frames_up(self.frames.len().checked_sub(1)) {
            if frame.mode == TemplateMode::Gather || frame.dependent.contains(loc) {
                return true;
            }
        }
        false
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loc(offset: u32) -> SourceLoc {
        SourceLoc::new(0, offset)
    }

    #[test]
    fn test_gather_then_analyze() {
        let mut stack = TemplateStack::new();
        assert!(stack.should_visit(&loc(1)));

        stack.push();
        assert!(stack.in_gather_mode());
        assert!(stack.should_visit(&loc(1)));
        assert!(!stack.needs_analysis());

        stack.visit_dependent(loc(7));
        assert!(stack.needs_analysis());

        stack.switch_to_analyze();
        assert!(stack.should_visit(&loc(7)));
        assert!(!stack.should_visit(&loc(1)));

        // Analyze never grows the set.
        stack.visit_dependent(loc(1));
        assert!(!stack.should_visit(&loc(1)));

        stack.pop();
        assert!(!stack.is_active());
    }

    #[test]
    fn test_dependent_locations_bubble_up() {
        let mut stack = TemplateStack::new();
        stack.push();
        stack.push();
        stack.visit_dependent(loc(3));
        stack.pop();
        assert!(stack.needs_analysis());
        stack.switch_to_analyze();
        assert!(stack.should_visit(&loc(3)));
    }

    #[test]
    fn test_nested_frames_inherit_analyze() {
        let mut stack = TemplateStack::new();
        stack.push();
        stack.visit_dependent(loc(3));
        stack.switch_to_analyze();

        stack.push();
        assert_eq!(stack.mode(), Some(TemplateMode::Analyze));
        // The outer frame's set still governs the inner one.
        assert!(stack.needs_analysis());
        assert!(stack.should_visit(&loc(3)));
        assert!(!stack.should_visit(&loc(4)));
        stack.pop();
        stack.pop();
    }

    #[test]
    fn test_inner_gather_frame_visits_everything() {
        let mut stack = TemplateStack::new();
        stack.push();
        stack.push();
        assert!(stack.should_visit(&loc(99)));
        assert_eq!(stack.depth(), 2);
    }
}

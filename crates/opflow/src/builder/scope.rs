//! Region/scope tracking during lowering
//!
//! Maintains the stack of active lexical regions while the builder walks
//! the tree. Regions are arena-indexed; the entering/leaving delta of an
//! edge is derived later from the finished region tree, so the tracker
//! only has to record parentage and the active stack.

/// Builder-internal region index
pub(crate) type RegionIx = usize;

/// A lexical region under construction
#[derive(Debug)]
pub(crate) struct ScopeData {
    /// Enclosing region; `None` only for the root
    pub parent: Option<RegionIx>,
    /// Locals declared directly in this region, in source order
    pub locals: Vec<String>,
    /// Marks a loop-condition region (pattern outputs)
    pub condition_scoped: bool,
}

/// Stack of active lexical regions
#[derive(Debug)]
pub(crate) struct ScopeTracker {
    regions: Vec<ScopeData>,
    stack: Vec<RegionIx>,
}

impl ScopeTracker {
    /// New tracker with the implicit root region active
    pub fn new() -> Self {
        Self {
            regions: vec![ScopeData {
                parent: None,
                locals: Vec::new(),
                condition_scoped: false,
            }],
            stack: vec![0],
        }
    }

    /// Open a region under the current one and make it active
    pub fn push(&mut self, locals: Vec<String>, condition_scoped: bool) -> RegionIx {
        let ix = self.regions.len();
        self.regions.push(ScopeData {
            parent: Some(self.current()),
            locals,
            condition_scoped,
        });
        self.stack.push(ix);
        ix
    }

    /// Close the innermost region; the root is never popped
    pub fn pop(&mut self) {
        debug_assert!(self.stack.len() > 1, "attempted to pop the root region");
        self.stack.pop();
    }

    /// The innermost active region
    pub fn current(&self) -> RegionIx {
        *self.stack.last().expect("root region is always active")
    }

    /// The active stack, outermost first
    pub fn active_stack(&self) -> &[RegionIx] {
        &self.stack
    }

    /// The innermost active region declaring `name`, if any. Shadowing
    /// follows the stack, so a sibling scope's homonymous local never
    /// resolves here.
    pub fn resolve_local(&self, name: &str) -> Option<RegionIx> {
        self.stack
            .iter()
            .rev()
            .copied()
            .find(|&ix| self.regions[ix].locals.iter().any(|l| l == name))
    }

    /// All regions created so far, in creation order
    pub fn into_regions(self) -> Vec<ScopeData> {
        self.regions
    }

    /// Number of regions created so far
    pub fn region_count(&self) -> usize {
        self.regions.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_is_active() {
        let tracker = ScopeTracker::new();
        assert_eq!(tracker.current(), 0);
        assert_eq!(tracker.active_stack(), &[0]);
    }

    #[test]
    fn test_push_pop() {
        let mut tracker = ScopeTracker::new();
        let r1 = tracker.push(vec!["i".to_string()], false);
        assert_eq!(tracker.current(), r1);
        let r2 = tracker.push(vec![], true);
        assert_eq!(tracker.active_stack(), &[0, r1, r2]);
        tracker.pop();
        assert_eq!(tracker.current(), r1);
        tracker.pop();
        assert_eq!(tracker.current(), 0);
    }

    #[test]
    fn test_resolve_local_prefers_innermost() {
        let mut tracker = ScopeTracker::new();
        let outer = tracker.push(vec!["i".to_string()], false);
        let inner = tracker.push(vec!["i".to_string(), "j".to_string()], false);
        assert_eq!(tracker.resolve_local("i"), Some(inner));
        assert_eq!(tracker.resolve_local("j"), Some(inner));
        tracker.pop();
        assert_eq!(tracker.resolve_local("i"), Some(outer));
        assert_eq!(tracker.resolve_local("j"), None);
    }

    #[test]
    fn test_parentage() {
        let mut tracker = ScopeTracker::new();
        let r1 = tracker.push(vec![], false);
        tracker.pop();
        let r2 = tracker.push(vec![], false);
        let regions = tracker.into_regions();
        assert_eq!(regions[r1].parent, Some(0));
        assert_eq!(regions[r2].parent, Some(0));
    }
}

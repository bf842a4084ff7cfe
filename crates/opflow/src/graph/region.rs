//! Lexical regions
//!
//! Regions tie source locals to the span of blocks in which they are
//! live. They form a tree rooted at the implicit body region; a block
//! belongs to exactly the innermost region active at its position.

use serde::Serialize;

/// Region identifier; `R0` is the implicit root region
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct RegionId(pub u32);

impl RegionId {
    /// Wrap a raw region index
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    /// The raw region index
    pub fn as_u32(&self) -> u32 {
        self.0
    }
}

impl std::fmt::Display for RegionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "R{}", self.0)
    }
}

/// A lexical-scope record in the finalized graph
#[derive(Debug, Clone, Serialize)]
pub struct Region {
    /// Region id, dense in dump order
    pub id: RegionId,
    /// Enclosing region; `None` only for the root
    pub parent: Option<RegionId>,
    /// Locals declared directly within this region, in source order
    pub locals: Vec<String>,
    /// Set for the loop-condition region wrapping condition, body, and iterators
    pub condition_scoped: bool,
    /// Ordinal of the first block owned by this region's subtree
    pub first_block: u32,
    /// Ordinal of the last block owned by this region's subtree
    pub last_block: u32,
}

impl Region {
    /// Whether this is the implicit root region
    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }
}

/// Walks from `region` up to the root, yielding each region id in turn.
pub(crate) fn ancestors_inclusive(regions: &[Region], region: RegionId) -> Vec<RegionId> {
    let mut out = Vec::new();
    let mut cursor = Some(region);
    while let Some(id) = cursor {
        out.push(id);
        cursor = regions[id.as_u32() as usize].parent;
    }
    out
}

/// Region delta between the two endpoints of an edge.
///
/// `leaving` lists the regions exited, innermost first; `entering` lists
/// the regions entered, outermost first. Both are empty when the
/// endpoints share a region.
pub(crate) fn edge_delta(
    regions: &[Region],
    from: RegionId,
    to: RegionId,
) -> (Vec<RegionId>, Vec<RegionId>) {
    if from == to {
        return (Vec::new(), Vec::new());
    }
    let from_path = ancestors_inclusive(regions, from);
    let to_path = ancestors_inclusive(regions, to);

    // Strip the shared suffix up to the least common ancestor.
    let mut f = from_path.len();
    let mut t = to_path.len();
    while f > 0 && t > 0 && from_path[f - 1] == to_path[t - 1] {
        f -= 1;
        t -= 1;
    }

    let leaving = from_path[..f].to_vec();
    let mut entering = to_path[..t].to_vec();
    entering.reverse();
    (leaving, entering)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn region(id: u32, parent: Option<u32>) -> Region {
        Region {
            id: RegionId::new(id),
            parent: parent.map(RegionId::new),
            locals: Vec::new(),
            condition_scoped: false,
            first_block: 0,
            last_block: 0,
        }
    }

    #[test]
    fn test_region_id_display() {
        assert_eq!(format!("{}", RegionId::new(1)), "R1");
    }

    #[test]
    fn test_edge_delta_same_region() {
        let regions = vec![region(0, None)];
        let (leaving, entering) = edge_delta(&regions, RegionId::new(0), RegionId::new(0));
        assert!(leaving.is_empty());
        assert!(entering.is_empty());
    }

    #[test]
    fn test_edge_delta_enter_nested() {
        // R0 -> R1 -> R2
        let regions = vec![region(0, None), region(1, Some(0)), region(2, Some(1))];
        let (leaving, entering) = edge_delta(&regions, RegionId::new(0), RegionId::new(2));
        assert!(leaving.is_empty());
        // Outer -> inner ordering.
        assert_eq!(entering, vec![RegionId::new(1), RegionId::new(2)]);
    }

    #[test]
    fn test_edge_delta_leave_nested() {
        let regions = vec![region(0, None), region(1, Some(0)), region(2, Some(1))];
        let (leaving, entering) = edge_delta(&regions, RegionId::new(2), RegionId::new(0));
        // Inner -> outer ordering.
        assert_eq!(leaving, vec![RegionId::new(2), RegionId::new(1)]);
        assert!(entering.is_empty());
    }

    #[test]
    fn test_edge_delta_sibling_regions() {
        // R1 and R2 are both children of R0.
        let regions = vec![region(0, None), region(1, Some(0)), region(2, Some(0))];
        let (leaving, entering) = edge_delta(&regions, RegionId::new(1), RegionId::new(2));
        assert_eq!(leaving, vec![RegionId::new(1)]);
        assert_eq!(entering, vec![RegionId::new(2)]);
    }
}

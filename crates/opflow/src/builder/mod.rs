//! Operation tree to flow graph lowering
//!
//! Single-pass traversal with a patch pass: statements stream into basic
//! blocks, loops and scopes manage pre-allocated targets and lexical
//! regions, and forward gotos are left symbolic until every label is
//! known. Finalization then patches labels, elides dead declarations,
//! packs redundant blocks, renumbers everything densely, and derives
//! predecessor lists, reachability, and per-edge region deltas.

mod control_flow;
mod expr;
mod scope;
mod stmt;

use crate::error::FlowError;
use crate::graph::{
    edge_delta, BasicBlock, BlockId, BlockKind, CondBranch, Edge, EdgeKind, FlowGraph, JumpSense,
    Region, RegionId,
};
use crate::ops::{CaptureId, Operation, ReferenceKind};
use control_flow::{BlockIx, LabelTable, LoopStack};
use rustc_hash::{FxHashMap, FxHashSet};
use scope::{RegionIx, ScopeData, ScopeTracker};

/// Nesting bound for the recursive traversal; deeper trees are rejected
/// with [`FlowError::NestingTooDeep`] instead of overflowing the stack.
pub const MAX_LOWERING_DEPTH: usize = 2048;

/// Unresolved edge destination during construction
#[derive(Debug)]
enum PendingTarget {
    /// Concrete block
    Block(BlockIx),
    /// Forward goto awaiting the label patch pass
    LabelRef(String),
    /// No destination (throw)
    None,
}

#[derive(Debug)]
struct PendingEdge {
    kind: EdgeKind,
    target: PendingTarget,
    value: Option<Operation>,
}

/// A basic block under construction
#[derive(Debug)]
struct BlockData {
    statements: Vec<Operation>,
    cond: Option<(Operation, JumpSense, BlockIx)>,
    next: Option<PendingEdge>,
    region: RegionIx,
}

/// Lowers one operation tree into a [`FlowGraph`].
///
/// The builder is exclusively owned by its caller and consumed by
/// [`GraphBuilder::build`]; no partial graph is ever observable.
#[derive(Debug)]
pub struct GraphBuilder {
    blocks: Vec<BlockData>,
    /// Placement order; block ids are assigned from this at finalize
    order: Vec<BlockIx>,
    current: BlockIx,
    exit: BlockIx,
    scopes: ScopeTracker,
    loops: LoopStack,
    labels: LabelTable,
    /// Local references seen so far, resolved to the declaring region at
    /// the point of emission; drives dead-declaration elision
    live_locals: FxHashMap<RegionIx, FxHashSet<String>>,
    captures: u32,
    depth: usize,
}

impl Default for GraphBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphBuilder {
    /// Create a builder with the entry block open and the exit reserved
    pub fn new() -> Self {
        let entry = BlockData {
            statements: Vec::new(),
            cond: None,
            next: None,
            region: 0,
        };
        let exit = BlockData {
            statements: Vec::new(),
            cond: None,
            next: None,
            region: 0,
        };
        Self {
            blocks: vec![entry, exit],
            order: vec![0],
            current: 0,
            exit: 1,
            scopes: ScopeTracker::new(),
            loops: LoopStack::new(),
            labels: LabelTable::new(),
            live_locals: FxHashMap::default(),
            captures: 0,
            depth: 0,
        }
    }

    /// Lower `root` (a bound statement block) into an immutable flow graph
    pub fn build(mut self, root: &Operation) -> Result<FlowGraph, FlowError> {
        let first = self.alloc_block();
        self.seal_regular(first);
        self.start_block(first);
        self.lower_stmt(root)?;
        let exit = self.exit;
        self.seal_regular(exit);
        self.start_block(exit);
        self.finalize()
    }

    // ------------------------------------------------------------------
    // Block primitives
    // ------------------------------------------------------------------

    /// Reserve a block; it joins the graph once `start_block` places it
    fn alloc_block(&mut self) -> BlockIx {
        let ix = self.blocks.len();
        self.blocks.push(BlockData {
            statements: Vec::new(),
            cond: None,
            next: None,
            region: 0,
        });
        ix
    }

    /// Place a reserved block in the current region and make it current
    fn start_block(&mut self, ix: BlockIx) {
        self.blocks[ix].region = self.scopes.current();
        self.order.push(ix);
        self.current = ix;
    }

    /// Append a lowered statement to the current block
    fn emit(&mut self, stmt: Operation) {
        self.mark_live(&stmt);
        self.blocks[self.current].statements.push(stmt);
    }

    fn seal(&mut self, kind: EdgeKind, target: PendingTarget, value: Option<Operation>) {
        debug_assert!(
            self.blocks[self.current].next.is_none(),
            "current block sealed twice"
        );
        if let Some(value) = &value {
            self.mark_live(value);
        }
        self.blocks[self.current].next = Some(PendingEdge {
            kind,
            target,
            value,
        });
    }

    /// Seal the current block with a regular fall-through edge
    fn seal_regular(&mut self, target: BlockIx) {
        self.seal(EdgeKind::Regular, PendingTarget::Block(target), None);
    }

    /// Continue in a fresh block with no incoming edge; used after a
    /// terminating branch so later statements land somewhere. If nothing
    /// ever jumps there the pack pass removes it.
    fn start_unreachable(&mut self) {
        let next = self.alloc_block();
        self.start_block(next);
    }

    /// Seal the current block and continue in a fresh one
    fn goto_new_block(&mut self) {
        let next = self.alloc_block();
        self.seal_regular(next);
        self.start_block(next);
    }

    /// End the current block with a conditional jump and continue lowering
    /// in the fall-through block
    fn branch_to(&mut self, condition: Operation, sense: JumpSense, target: BlockIx) {
        debug_assert!(
            self.blocks[self.current].cond.is_none(),
            "block already carries a conditional jump"
        );
        self.mark_live(&condition);
        self.blocks[self.current].cond = Some((condition, sense, target));
        self.goto_new_block();
    }

    /// Open a lexical region and a fresh block inside it
    fn push_scope(&mut self, locals: Vec<String>, condition_scoped: bool) {
        self.scopes.push(locals, condition_scoped);
        self.goto_new_block();
    }

    /// Close the innermost region and continue in the enclosing one
    fn pop_scope_and_continue(&mut self) {
        self.scopes.pop();
        self.goto_new_block();
    }

    /// Close the innermost region without opening a continuation block;
    /// the caller places a pre-allocated block next
    fn pop_scope_only(&mut self) {
        self.scopes.pop();
    }

    /// Allocate the next flow-capture temporary
    fn next_capture(&mut self) -> CaptureId {
        let id = CaptureId::new(self.captures);
        self.captures += 1;
        id
    }

    /// Capture an already-evaluated operand so later control flow cannot
    /// reorder it; literals and existing captures pass through untouched
    fn spill(&mut self, value: Operation) -> Operation {
        if matches!(
            value,
            Operation::Literal(_) | Operation::FlowCaptureReference { .. }
        ) {
            return value;
        }
        let id = self.next_capture();
        self.emit(Operation::FlowCapture {
            id,
            value: Box::new(value),
        });
        Operation::FlowCaptureReference { id }
    }

    /// Record every local reference in `op` against the region declaring
    /// it on the active stack. Parameter and capture references retain
    /// nothing; a name no active region declares retains nothing either.
    fn mark_live(&mut self, op: &Operation) {
        let mut names = Vec::new();
        collect_local_refs(op, &mut names);
        for name in names {
            if let Some(region) = self.scopes.resolve_local(&name) {
                self.live_locals.entry(region).or_default().insert(name);
            }
        }
    }

    fn enter(&mut self) -> Result<(), FlowError> {
        self.depth += 1;
        if self.depth > MAX_LOWERING_DEPTH {
            return Err(FlowError::NestingTooDeep {
                limit: MAX_LOWERING_DEPTH,
            });
        }
        Ok(())
    }

    fn leave(&mut self) {
        self.depth -= 1;
    }

    // ------------------------------------------------------------------
    // Finalization
    // ------------------------------------------------------------------

    fn finalize(mut self) -> Result<FlowGraph, FlowError> {
        self.patch_labels()?;

        let mut scope_data =
            std::mem::replace(&mut self.scopes, ScopeTracker::new()).into_regions();
        let live = std::mem::take(&mut self.live_locals);
        let surviving = elide_dead_regions(&mut scope_data, &live);
        for i in 0..self.order.len() {
            let ix = self.order[i];
            let region = self.blocks[ix].region;
            self.blocks[ix].region = resolve_region(&scope_data, &surviving, region);
        }

        self.pack();

        Ok(self.into_graph(scope_data, surviving))
    }

    /// Second pass of label resolution: patch symbolic goto targets.
    fn patch_labels(&mut self) -> Result<(), FlowError> {
        let labels = std::mem::take(&mut self.labels);
        for block in &mut self.blocks {
            if let Some(edge) = &mut block.next {
                if let PendingTarget::LabelRef(name) = &edge.target {
                    match labels.get(name) {
                        Some(target) => edge.target = PendingTarget::Block(target),
                        None => {
                            return Err(FlowError::UnresolvedLabel { name: name.clone() })
                        }
                    }
                }
            }
        }
        Ok(())
    }

    /// Remove redundant blocks: empty pass-through blocks are spliced out
    /// and straight-line fall-through runs within one region are merged.
    /// Sibling scopes are never merged (their blocks sit in different
    /// regions) and unreachable blocks are kept.
    fn pack(&mut self) {
        loop {
            let incoming = self.incoming_counts();

            if let Some(pos) = self.find_removable(&incoming) {
                let removed = self.order[pos];
                let target = match &self.blocks[removed].next {
                    Some(PendingEdge {
                        target: PendingTarget::Block(t),
                        ..
                    }) => *t,
                    _ => unreachable!("removable blocks have a concrete fall-through"),
                };
                self.redirect_edges(removed, target);
                self.order.remove(pos);
                continue;
            }

            if let Some((pred, pos)) = self.find_mergeable(&incoming) {
                let merged = self.order[pos];
                let mut stolen = std::mem::take(&mut self.blocks[merged].statements);
                self.blocks[pred].statements.append(&mut stolen);
                self.blocks[pred].cond = self.blocks[merged].cond.take();
                self.blocks[pred].next = self.blocks[merged].next.take();
                self.order.remove(pos);
                continue;
            }

            break;
        }
    }

    /// Incoming edge counts over placed blocks (conditional and regular)
    fn incoming_counts(&self) -> FxHashMap<BlockIx, usize> {
        let mut incoming: FxHashMap<BlockIx, usize> = FxHashMap::default();
        for &ix in &self.order {
            let block = &self.blocks[ix];
            if let Some((_, _, target)) = &block.cond {
                *incoming.entry(*target).or_default() += 1;
            }
            if let Some(PendingEdge {
                target: PendingTarget::Block(t),
                ..
            }) = &block.next
            {
                *incoming.entry(*t).or_default() += 1;
            }
        }
        incoming
    }

    fn find_removable(&self, incoming: &FxHashMap<BlockIx, usize>) -> Option<usize> {
        self.order.iter().position(|&ix| {
            if ix == 0 || ix == self.exit {
                return false;
            }
            let block = &self.blocks[ix];
            if !block.statements.is_empty() || block.cond.is_some() {
                return false;
            }
            let target = match &block.next {
                Some(PendingEdge {
                    kind: EdgeKind::Regular,
                    target: PendingTarget::Block(t),
                    value: None,
                }) => *t,
                _ => return false,
            };
            if target == ix {
                return false;
            }
            let preds = incoming.get(&ix).copied().unwrap_or(0);
            preds <= 1 || block.region == self.blocks[target].region
        })
    }

    /// A block mergeable into its sole fall-through predecessor; returns
    /// (predecessor, position of the merged block in the order)
    fn find_mergeable(&self, incoming: &FxHashMap<BlockIx, usize>) -> Option<(BlockIx, usize)> {
        for &pred in &self.order {
            if pred == 0 {
                continue;
            }
            let block = &self.blocks[pred];
            if block.cond.is_some() {
                continue;
            }
            let target = match &block.next {
                Some(PendingEdge {
                    kind: EdgeKind::Regular,
                    target: PendingTarget::Block(t),
                    value: None,
                }) => *t,
                _ => continue,
            };
            if target == pred || target == 0 || target == self.exit {
                continue;
            }
            if incoming.get(&target).copied().unwrap_or(0) != 1 {
                continue;
            }
            if self.blocks[pred].region != self.blocks[target].region {
                continue;
            }
            let pos = self
                .order
                .iter()
                .position(|&ix| ix == target)
                .expect("merge target is placed");
            return Some((pred, pos));
        }
        None
    }

    fn redirect_edges(&mut self, from: BlockIx, to: BlockIx) {
        for i in 0..self.order.len() {
            let ix = self.order[i];
            if let Some((_, _, target)) = &mut self.blocks[ix].cond {
                if *target == from {
                    *target = to;
                }
            }
            if let Some(PendingEdge {
                target: PendingTarget::Block(t),
                ..
            }) = &mut self.blocks[ix].next
            {
                if *t == from {
                    *t = to;
                }
            }
        }
    }

    /// Renumber blocks and regions densely and assemble the final graph.
    fn into_graph(mut self, scope_data: Vec<ScopeData>, surviving: Vec<bool>) -> FlowGraph {
        debug_assert_eq!(self.order.first(), Some(&0), "entry block moved");
        debug_assert_eq!(self.order.last(), Some(&self.exit), "exit block not last");

        let index_of: FxHashMap<BlockIx, u32> = self
            .order
            .iter()
            .enumerate()
            .map(|(pos, &ix)| (ix, pos as u32))
            .collect();
        let block_count = self.order.len() as u32;

        // Block spans per region, propagated through ancestors.
        let mut first = vec![u32::MAX; scope_data.len()];
        let mut last = vec![0u32; scope_data.len()];
        for (pos, &ix) in self.order.iter().enumerate() {
            let mut region = self.blocks[ix].region;
            loop {
                first[region] = first[region].min(pos as u32);
                last[region] = last[region].max(pos as u32);
                match scope_data[region].parent {
                    Some(parent) => region = resolve_region(&scope_data, &surviving, parent),
                    None => break,
                }
            }
        }

        let mut survivors: Vec<usize> = (0..scope_data.len())
            .filter(|&ix| ix == 0 || (surviving[ix] && first[ix] != u32::MAX))
            .collect();
        survivors.sort_by_key(|&ix| (first[ix], std::cmp::Reverse(last[ix])));
        let region_id_of: FxHashMap<usize, RegionId> = survivors
            .iter()
            .enumerate()
            .map(|(pos, &ix)| (ix, RegionId::new(pos as u32)))
            .collect();

        let regions: Vec<Region> = survivors
            .iter()
            .map(|&ix| Region {
                id: region_id_of[&ix],
                parent: scope_data[ix]
                    .parent
                    .map(|p| region_id_of[&resolve_region(&scope_data, &surviving, p)]),
                locals: scope_data[ix].locals.clone(),
                condition_scoped: scope_data[ix].condition_scoped,
                first_block: if ix == 0 { 0 } else { first[ix] },
                last_block: if ix == 0 {
                    block_count - 1
                } else {
                    last[ix]
                },
            })
            .collect();

        let order = std::mem::take(&mut self.order);
        let mut blocks: Vec<BasicBlock> = order
            .iter()
            .enumerate()
            .map(|(pos, &ix)| {
                let data = &mut self.blocks[ix];
                let region = region_id_of[&data.region];
                let kind = if pos == 0 {
                    BlockKind::Entry
                } else if pos as u32 == block_count - 1 {
                    BlockKind::Exit
                } else {
                    BlockKind::Block
                };

                let cond_branch = data.cond.take().map(|(condition, sense, target)| {
                    let target_id = BlockId::new(index_of[&target]);
                    CondBranch {
                        condition,
                        sense,
                        target: target_id,
                        entering: Vec::new(),
                        leaving: Vec::new(),
                    }
                });
                let next = data.next.take().map(|edge| Edge {
                    kind: edge.kind,
                    target: match edge.target {
                        PendingTarget::Block(t) => Some(BlockId::new(index_of[&t])),
                        PendingTarget::None => None,
                        PendingTarget::LabelRef(_) => {
                            unreachable!("labels are patched before renumbering")
                        }
                    },
                    value: edge.value,
                    entering: Vec::new(),
                    leaving: Vec::new(),
                });

                BasicBlock {
                    id: BlockId::new(pos as u32),
                    kind,
                    statements: std::mem::take(&mut data.statements),
                    cond_branch,
                    next,
                    region,
                    is_reachable: false,
                }
            })
            .collect();

        // Per-edge region deltas, computed over a snapshot of each
        // block's region so the edges can be mutated in place.
        let block_regions: Vec<RegionId> = blocks.iter().map(|b| b.region).collect();
        for block in &mut blocks {
            let from = block.region;
            if let Some(cond) = block.cond_branch.as_mut() {
                let to = block_regions[cond.target.as_u32() as usize];
                let (leaving, entering) = edge_delta(&regions, from, to);
                cond.leaving = leaving;
                cond.entering = entering;
            }
            if let Some(next) = block.next.as_mut() {
                if let Some(target) = next.target {
                    let to = block_regions[target.as_u32() as usize];
                    let (leaving, entering) = edge_delta(&regions, from, to);
                    next.leaving = leaving;
                    next.entering = entering;
                }
            }
        }

        // Derived predecessors.
        let mut predecessors: Vec<Vec<BlockId>> = vec![Vec::new(); blocks.len()];
        for block in &blocks {
            for succ in block.successors() {
                predecessors[succ.as_u32() as usize].push(block.id);
            }
        }
        for preds in &mut predecessors {
            preds.sort();
            preds.dedup();
        }

        // Reachability from the entry block.
        let mut reachable = vec![false; blocks.len()];
        let mut worklist = vec![BlockId::new(0)];
        while let Some(id) = worklist.pop() {
            let ix = id.as_u32() as usize;
            if reachable[ix] {
                continue;
            }
            reachable[ix] = true;
            for succ in blocks[ix].successors() {
                worklist.push(succ);
            }
        }
        for (block, flag) in blocks.iter_mut().zip(&reachable) {
            block.is_reachable = *flag;
        }

        FlowGraph {
            blocks,
            regions,
            predecessors,
            capture_count: self.captures,
        }
    }
}

/// Retain only locals that were referenced in their own region, then mark
/// which regions survive.
fn elide_dead_regions(
    scope_data: &mut [ScopeData],
    live: &FxHashMap<RegionIx, FxHashSet<String>>,
) -> Vec<bool> {
    for (ix, region) in scope_data.iter_mut().enumerate().skip(1) {
        region
            .locals
            .retain(|local| live.get(&ix).is_some_and(|names| names.contains(local)));
    }
    scope_data
        .iter()
        .enumerate()
        .map(|(ix, region)| ix == 0 || !region.locals.is_empty())
        .collect()
}

/// Nearest surviving ancestor of a region (identity when it survives)
fn resolve_region(scope_data: &[ScopeData], surviving: &[bool], mut ix: RegionIx) -> RegionIx {
    while !surviving[ix] {
        ix = scope_data[ix]
            .parent
            .expect("root region always survives");
    }
    ix
}

/// Collect every local reference in an operation subtree. Parameter
/// references are skipped; only locals pin their declaring region.
fn collect_local_refs(op: &Operation, out: &mut Vec<String>) {
    match op {
        Operation::Reference {
            name,
            kind: ReferenceKind::Local,
        } => {
            out.push(name.clone());
        }
        Operation::Reference { .. } => {}
        Operation::Assignment { target, value } => {
            collect_local_refs(target, out);
            collect_local_refs(value, out);
        }
        Operation::Binary { left, right, .. } => {
            collect_local_refs(left, out);
            collect_local_refs(right, out);
        }
        Operation::Unary { operand, .. } | Operation::Conversion { operand, .. } => {
            collect_local_refs(operand, out);
        }
        Operation::Conditional {
            condition,
            when_true,
            when_false,
        } => {
            collect_local_refs(condition, out);
            collect_local_refs(when_true, out);
            if let Some(f) = when_false {
                collect_local_refs(f, out);
            }
        }
        Operation::NullCoalesce { value, fallback } => {
            collect_local_refs(value, out);
            collect_local_refs(fallback, out);
        }
        Operation::Invocation { arguments, .. } => {
            for arg in arguments {
                collect_local_refs(arg, out);
            }
        }
        Operation::FlowCapture { value, .. } => collect_local_refs(value, out),
        Operation::Throw { value } => collect_local_refs(value, out),
        Operation::VariableDeclaration { initializer, .. } => {
            if let Some(init) = initializer {
                collect_local_refs(init, out);
            }
        }
        Operation::Block { statements, .. } => {
            for stmt in statements {
                collect_local_refs(stmt, out);
            }
        }
        Operation::Literal(_)
        | Operation::FlowCaptureReference { .. }
        | Operation::Label { .. }
        | Operation::Loop(_)
        | Operation::Branch(_) => {}
    }
}

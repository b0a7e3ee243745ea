//! Natural loop detection.
//!
//! A well-formed loop has the following structure:
//!
//! ```text
//!     [preheader]     <- Single outside predecessor, jumps only to the header
//!          |
//!          v
//!     [header] <------+  <- Single entry point, dominates all loop blocks
//!          |          |
//!          v          |
//!     [body ...]      |
//!          |          |
//!          v          |
//!     [latch] --------+  <- Back edge source(s)
//! ```
//!
//! Loops are found from back edges `n -> h` where `h` dominates `n`. All back
//! edges into the same header form one loop. Nesting follows from body
//! containment: the parent of a loop is the smallest other loop containing its
//! header.

use std::collections::{HashMap, HashSet};

use crate::{
    ir::{BlockId, Function},
    utils::graph::DominatorTree,
};

/// A natural loop.
#[derive(Debug, Clone)]
pub struct LoopInfo {
    /// The header block (single entry point, dominates all loop blocks).
    pub header: BlockId,

    /// All blocks in the loop body, header included.
    pub body: HashSet<BlockId>,

    /// Back edge sources.
    pub latches: Vec<BlockId>,

    /// The preheader, if the header has exactly one predecessor outside the
    /// loop and that predecessor branches nowhere else.
    pub preheader: Option<BlockId>,

    /// Nesting depth (0 = outermost).
    pub depth: usize,

    /// Header of the enclosing loop, if this loop is nested.
    pub parent: Option<BlockId>,

    /// Headers of the immediately nested loops.
    pub children: Vec<BlockId>,
}

impl LoopInfo {
    /// Creates a loop consisting of only its header.
    #[must_use]
    pub fn new(header: BlockId) -> Self {
        let mut body = HashSet::new();
        body.insert(header);
        Self {
            header,
            body,
            latches: Vec::new(),
            preheader: None,
            depth: 0,
            parent: None,
            children: Vec::new(),
        }
    }

    /// Returns true if this loop contains the given block.
    #[must_use]
    pub fn contains(&self, block: BlockId) -> bool {
        self.body.contains(&block)
    }

    /// Returns the number of blocks in the loop.
    #[must_use]
    pub fn size(&self) -> usize {
        self.body.len()
    }

    /// Returns true if this is an innermost loop.
    #[must_use]
    pub fn is_innermost(&self) -> bool {
        self.children.is_empty()
    }

    /// Returns the predecessors of the header that lie outside the loop.
    #[must_use]
    pub fn outside_predecessors(&self, func: &Function) -> Vec<BlockId> {
        func.predecessors(self.header)
            .iter()
            .copied()
            .filter(|pred| !self.contains(*pred))
            .collect()
    }
}

/// All loops of a function.
#[derive(Debug, Clone, Default)]
pub struct LoopForest {
    /// Loops sorted by header.
    loops: Vec<LoopInfo>,
    /// Index of the innermost loop containing each block.
    block_to_loop: Vec<Option<usize>>,
}

impl LoopForest {
    /// Creates an empty loop forest.
    #[must_use]
    pub fn new(block_count: usize) -> Self {
        Self {
            loops: Vec::new(),
            block_to_loop: vec![None; block_count],
        }
    }

    /// Adds a loop to the forest.
    pub fn add_loop(&mut self, loop_info: LoopInfo) {
        let loop_idx = self.loops.len();

        for &block in &loop_info.body {
            if let Some(slot) = self.block_to_loop.get_mut(block.index()) {
                // Only update if this is a more deeply nested loop
                match *slot {
                    Some(existing) if self.loops[existing].depth >= loop_info.depth => {}
                    _ => *slot = Some(loop_idx),
                }
            }
        }

        self.loops.push(loop_info);
    }

    /// Returns all loops, sorted by header.
    #[must_use]
    pub fn loops(&self) -> &[LoopInfo] {
        &self.loops
    }

    /// Returns the number of loops.
    #[must_use]
    pub fn len(&self) -> usize {
        self.loops.len()
    }

    /// Returns true if there are no loops.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.loops.is_empty()
    }

    /// Returns the innermost loop containing the given block.
    #[must_use]
    pub fn innermost_loop(&self, block: BlockId) -> Option<&LoopInfo> {
        self.block_to_loop
            .get(block.index())
            .copied()
            .flatten()
            .map(|idx| &self.loops[idx])
    }

    /// Returns the loop with the given header.
    #[must_use]
    pub fn loop_for_header(&self, header: BlockId) -> Option<&LoopInfo> {
        self.loops.iter().find(|l| l.header == header)
    }

    /// Returns the loop depth for a block (0 if not in any loop).
    #[must_use]
    pub fn loop_depth(&self, block: BlockId) -> usize {
        self.innermost_loop(block).map_or(0, |l| l.depth + 1)
    }

    /// Iterates over all loops.
    pub fn iter(&self) -> impl Iterator<Item = &LoopInfo> {
        self.loops.iter()
    }

    /// Returns loops sorted innermost first; loops of equal depth keep header
    /// order.
    #[must_use]
    pub fn by_depth_descending(&self) -> Vec<&LoopInfo> {
        let mut sorted: Vec<_> = self.loops.iter().collect();
        sorted.sort_by_key(|l| std::cmp::Reverse(l.depth));
        sorted
    }
}

/// Detects all natural loops of `func`.
///
/// Back edges are edges `n -> h` where `h` dominates `n`. Each loop body is
/// the set of blocks that reach a latch without passing through the header.
/// Unreachable blocks never belong to a loop.
#[must_use]
pub fn detect_loops(func: &Function, dominators: &DominatorTree) -> LoopForest {
    let mut loops_by_header: HashMap<BlockId, LoopInfo> = HashMap::new();

    for (block, bb) in func.blocks() {
        for succ in bb.successors() {
            if dominators.dominates(succ.into(), block.into()) {
                let loop_info = loops_by_header
                    .entry(succ)
                    .or_insert_with(|| LoopInfo::new(succ));
                loop_info.latches.push(block);
                expand_loop_body(func, dominators, loop_info, block);
            }
        }
    }

    for loop_info in loops_by_header.values_mut() {
        loop_info.preheader = compute_preheader(func, loop_info);
    }

    let mut loops: Vec<LoopInfo> = loops_by_header.into_values().collect();
    loops.sort_by_key(|l| l.header);
    compute_nesting(&mut loops);

    let mut forest = LoopForest::new(func.block_capacity());
    for loop_info in loops {
        forest.add_loop(loop_info);
    }
    forest
}

/// Adds every block that reaches `latch` without passing through the header.
fn expand_loop_body(
    func: &Function,
    dominators: &DominatorTree,
    loop_info: &mut LoopInfo,
    latch: BlockId,
) {
    let header = loop_info.header;
    let mut worklist = vec![latch];

    while let Some(block) = worklist.pop() {
        if !loop_info.body.insert(block) {
            continue;
        }
        for &pred in func.predecessors(block) {
            if !loop_info.body.contains(&pred) && dominators.dominates(header.into(), pred.into()) {
                worklist.push(pred);
            }
        }
    }
}

fn compute_preheader(func: &Function, loop_info: &LoopInfo) -> Option<BlockId> {
    match loop_info.outside_predecessors(func).as_slice() {
        [pred] if func.successors(*pred) == [loop_info.header] => Some(*pred),
        _ => None,
    }
}

/// Computes parents, children and depths.
fn compute_nesting(loops: &mut [LoopInfo]) {
    let n = loops.len();
    let header_to_idx: HashMap<BlockId, usize> = loops
        .iter()
        .enumerate()
        .map(|(i, l)| (l.header, i))
        .collect();

    // Parent is the smallest other loop containing this loop's header
    for i in 0..n {
        let header = loops[i].header;
        loops[i].parent = (0..n)
            .filter(|&j| j != i && loops[j].contains(header))
            .min_by_key(|&j| loops[j].size())
            .map(|j| loops[j].header);
    }

    for i in 0..n {
        if let Some(parent_idx) = loops[i].parent.and_then(|p| header_to_idx.get(&p).copied()) {
            let header = loops[i].header;
            loops[parent_idx].children.push(header);
        }
    }

    for i in 0..n {
        let mut depth = 0;
        let mut current = loops[i].parent;
        while let Some(parent_idx) = current.and_then(|p| header_to_idx.get(&p).copied()) {
            depth += 1;
            current = loops[parent_idx].parent;
        }
        loops[i].depth = depth;
    }
}

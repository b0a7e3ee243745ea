use crate::ir::{BlockId, InstId, Terminator};

/// A basic block: phis, then ordinary instructions, then one terminator.
///
/// The predecessor list is maintained explicitly by the owning
/// [`Function`](crate::ir::Function) as edges are added and removed, and holds
/// each predecessor once even if it branches here along both of its edges.
#[derive(Debug, Clone, Default)]
pub struct BasicBlock {
    pub(crate) phis: Vec<InstId>,
    pub(crate) insts: Vec<InstId>,
    pub(crate) terminator: Option<Terminator>,
    pub(crate) preds: Vec<BlockId>,
}

impl BasicBlock {
    /// Returns the phi instructions of this block.
    #[must_use]
    pub fn phis(&self) -> &[InstId] {
        &self.phis
    }

    /// Returns the non-phi instructions in execution order.
    #[must_use]
    pub fn insts(&self) -> &[InstId] {
        &self.insts
    }

    /// Returns the terminator, or `None` while the block is still open.
    #[must_use]
    pub fn terminator(&self) -> Option<&Terminator> {
        self.terminator.as_ref()
    }

    /// Returns the predecessor blocks.
    #[must_use]
    pub fn predecessors(&self) -> &[BlockId] {
        &self.preds
    }

    /// Returns the distinct successor blocks (none while unterminated).
    pub fn successors(&self) -> impl Iterator<Item = BlockId> + '_ {
        self.terminator.iter().flat_map(Terminator::successors)
    }

    /// Returns every instruction of the block, phis first.
    pub fn all_insts(&self) -> impl Iterator<Item = InstId> + '_ {
        self.phis.iter().chain(self.insts.iter()).copied()
    }
}

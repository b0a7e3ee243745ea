//! Dead block elimination pass.
//!
//! Deletes every block that can not be reached from the entry. Live blocks that
//! had a deleted block as predecessor lose the matching phi operands, and phis
//! left with a single value are folded.

use crate::{
    compiler::pass::{AnalysisCache, Pass},
    ir::{BlockId, Function},
    utils::graph::reachable,
    Result,
};

/// Removes blocks unreachable from the entry.
pub struct DeadBlockEliminationPass;

impl Default for DeadBlockEliminationPass {
    fn default() -> Self {
        Self::new()
    }
}

impl DeadBlockEliminationPass {
    /// Creates a new dead block elimination pass.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Pass for DeadBlockEliminationPass {
    fn name(&self) -> &'static str {
        "dead-block-elimination"
    }

    fn description(&self) -> &'static str {
        "Deletes blocks that can not be reached from the entry"
    }

    fn requires(&self) -> &'static [&'static str] {
        &["constant-branch-folding"]
    }

    fn run(&self, func: &mut Function, _analyses: &mut AnalysisCache) -> Result<bool> {
        let live = reachable(&*func, func.entry().into());
        let dead: Vec<BlockId> = func
            .block_ids()
            .into_iter()
            .filter(|block| !live.contains(block.index()))
            .collect();

        for &block in &dead {
            func.remove_block(block)?;
        }

        if !dead.is_empty() {
            log::debug!("{}: removed {} unreachable blocks", func.name(), dead.len());
        }
        Ok(!dead.is_empty())
    }
}

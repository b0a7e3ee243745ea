//! Constant branch folding pass.
//!
//! Rewrites conditional branches whose condition is a literal constant into
//! unconditional jumps:
//!
//! ```text
//! bb0:                          bb0:
//!     br true, bb1, bb2    →        br bb1
//! ```
//!
//! The block is removed from the predecessors of the successor that is no
//! longer taken, which also drops the matching phi operands there. The untaken
//! successor may become unreachable; deleting it is left to
//! [`DeadBlockEliminationPass`](super::DeadBlockEliminationPass).

use crate::{
    compiler::pass::{AnalysisCache, Pass},
    ir::{BlockId, Function, Terminator, Value},
    Result,
};

/// Folds conditional branches on constant conditions.
pub struct ConstantBranchFoldingPass;

impl Default for ConstantBranchFoldingPass {
    fn default() -> Self {
        Self::new()
    }
}

impl ConstantBranchFoldingPass {
    /// Creates a new constant branch folding pass.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Returns `(block, taken, untaken)` for every foldable branch.
    fn find_candidates(func: &Function) -> Vec<(BlockId, BlockId, BlockId)> {
        func.blocks()
            .filter_map(|(id, bb)| match bb.terminator()? {
                Terminator::CondBranch {
                    cond: Value::Const(c),
                    then_block,
                    else_block,
                } => Some(if c.as_bool() {
                    (id, *then_block, *else_block)
                } else {
                    (id, *else_block, *then_block)
                }),
                _ => None,
            })
            .collect()
    }
}

impl Pass for ConstantBranchFoldingPass {
    fn name(&self) -> &'static str {
        "constant-branch-folding"
    }

    fn description(&self) -> &'static str {
        "Turns conditional branches on constant conditions into jumps"
    }

    fn requires(&self) -> &'static [&'static str] {
        &["constant-ops"]
    }

    fn run(&self, func: &mut Function, _analyses: &mut AnalysisCache) -> Result<bool> {
        let candidates = Self::find_candidates(func);

        for &(block, taken, untaken) in &candidates {
            func.replace_terminator(block, Terminator::Branch(taken))?;
            if untaken != taken {
                func.remove_predecessor(untaken, block);
            }
            log::debug!("{}: folded branch in {} to {}", func.name(), block, taken);
        }
        Ok(!candidates.is_empty())
    }
}

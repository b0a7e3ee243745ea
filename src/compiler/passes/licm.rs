//! Loop-invariant code motion.
//!
//! Moves computations whose result does not change between iterations out of
//! the loop into its preheader:
//!
//! ```text
//! preheader:                      preheader:
//!     br header                       %s = add %arg0, %arg1
//! header:                             br header
//!     %i = phi ...          →     header:
//!     %s = add %arg0, %arg1           %i = phi ...
//!     %n = add %i, %s                 %n = add %i, %s
//! ```
//!
//! An instruction is hoisted when it is pure, can be executed speculatively
//! (the preheader runs even if the loop body would not have reached it), and
//! all of its instruction operands are defined outside the loop. Blocks are
//! visited in dominator-tree preorder starting at the header, so operands that
//! were just hoisted count as invariant for the instructions after them.
//!
//! Loops are processed innermost first; a computation hoisted out of an inner
//! loop lands in a block of the enclosing loop and can move further out when
//! that loop is processed.

use crate::{
    analysis::LoopInfo,
    compiler::pass::{Analyses, AnalysisCache, Pass},
    ir::{BlockId, Function, InstId},
    Error, Result,
};

/// Hoists loop-invariant instructions into loop preheaders.
pub struct LicmPass;

impl Default for LicmPass {
    fn default() -> Self {
        Self::new()
    }
}

impl LicmPass {
    /// Creates a new LICM pass.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    fn is_invariant(func: &Function, loop_info: &LoopInfo, id: InstId) -> bool {
        let Some(inst) = func.inst(id) else {
            return false;
        };
        let kind = inst.kind();
        kind.is_hoistable()
            && kind.is_safe_to_speculate()
            && kind.operands().iter().all(|op| match op.as_inst() {
                Some(def) => func
                    .inst(def)
                    .is_some_and(|d| !loop_info.contains(d.block())),
                None => true,
            })
    }
}

impl Pass for LicmPass {
    fn name(&self) -> &'static str {
        "licm"
    }

    fn description(&self) -> &'static str {
        "Hoists loop-invariant computations into loop preheaders"
    }

    fn requires(&self) -> &'static [&'static str] {
        &["dead-block-elimination", "loop-preheaders"]
    }

    fn required_analyses(&self) -> Analyses {
        Analyses::LOOPS
    }

    fn preserved_analyses(&self) -> Analyses {
        Analyses::DOMINATORS | Analyses::LOOPS
    }

    fn run(&self, func: &mut Function, analyses: &mut AnalysisCache) -> Result<bool> {
        analyses.compute(func, Analyses::LOOPS);
        let (Some(dominators), Some(forest)) = (analyses.dominator_tree(), analyses.loop_forest())
        else {
            return Err(malformed_error!("{}: loop analysis is unavailable", func.name()));
        };

        let mut hoisted = 0usize;
        for loop_info in forest.by_depth_descending() {
            let preheader = loop_info
                .preheader
                .ok_or(Error::MissingPreheader(loop_info.header))?;

            let blocks = dominators.preorder_from(loop_info.header.into(), |n| {
                loop_info.contains(BlockId::from(n))
            });
            for node in blocks {
                let block = BlockId::from(node);
                let insts = func.block(block).map(|bb| bb.insts().to_vec()).unwrap_or_default();

                for id in insts {
                    if Self::is_invariant(func, loop_info, id) {
                        func.move_inst(id, preheader)?;
                        hoisted += 1;
                        log::trace!(
                            "{}: hoisted {} from {} to {}",
                            func.name(),
                            id,
                            block,
                            preheader
                        );
                    }
                }
            }
        }

        if hoisted > 0 {
            log::debug!("{}: hoisted {} instructions", func.name(), hoisted);
        }
        Ok(hoisted > 0)
    }
}

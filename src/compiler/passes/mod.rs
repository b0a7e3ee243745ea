//! The optimization passes.
//!
//! The passes build on each other and are scheduled in this order:
//!
//! 1. [`ConstantOpsPass`] - folds instructions with constant operands
//! 2. [`ConstantBranchFoldingPass`] - turns branches on constants into jumps
//! 3. [`DeadBlockEliminationPass`] - deletes the blocks that became unreachable
//! 4. [`LoopPreheaderPass`] - gives every loop a preheader
//! 5. [`LicmPass`] - hoists loop-invariant instructions into the preheaders

mod constbranch;
mod constops;
mod deadblocks;
mod licm;
mod preheader;

pub use constbranch::ConstantBranchFoldingPass;
pub use constops::ConstantOpsPass;
pub use deadblocks::DeadBlockEliminationPass;
pub use licm::LicmPass;
pub use preheader::LoopPreheaderPass;

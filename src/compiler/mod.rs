//! Optimization passes and the compilation pipeline.
//!
//! This module sits between the IR and register allocation:
//!
//! - [`crate::ir`] / [`crate::ssa`] - building functions in SSA form
//! - [`compiler`](self) - CFG cleanup and loop optimizations
//! - [`crate::regalloc`] - live intervals and register assignment
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                      Compiler Pipeline                           │
//! ├──────────────────────────────────────────────────────────────────┤
//! │                                                                  │
//! │  PassScheduler               Ordered execution                   │
//! │    ├─ validate()              requires() ordering check          │
//! │    ├─ AnalysisCache           dominators, loops                  │
//! │    └─ verify                  CFG check after each change        │
//! │                                                                  │
//! │  Pass trait                  Interface for all passes            │
//! │    ├─ run()                   Per-function transformation        │
//! │    ├─ requires()              Passes that must run first         │
//! │    └─ preserved_analyses()    What survives a change             │
//! │                                                                  │
//! │  Passes                                                          │
//! │    ├─ constant-ops            fold constant instructions         │
//! │    ├─ constant-branch-folding br const → br                      │
//! │    ├─ dead-block-elimination  drop unreachable blocks            │
//! │    ├─ loop-preheaders         one entering edge per loop         │
//! │    └─ licm                    hoist invariant instructions       │
//! │                                                                  │
//! │  compile_function            passes → liveness → allocation      │
//! │                                                                  │
//! └──────────────────────────────────────────────────────────────────┘
//! ```

mod config;
mod pass;
mod passes;
mod pipeline;
mod scheduler;

pub use config::CompilerConfig;
pub use pass::{Analyses, AnalysisCache, Pass};
pub use passes::{
    ConstantBranchFoldingPass, ConstantOpsPass, DeadBlockEliminationPass, LicmPass,
    LoopPreheaderPass,
};
pub use pipeline::{compile_function, CompiledFunction};
pub use scheduler::PassScheduler;

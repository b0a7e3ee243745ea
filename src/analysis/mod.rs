//! Analyses over a [`Function`](crate::ir::Function).
//!
//! The CFG of a function implements the graph traits of
//! [`crate::utils::graph`], so dominators and traversals run on it directly.
//! This module adds the function-level analyses built on top:
//!
//! - [`detect_loops`] - natural loops and their nesting ([`LoopForest`])
//! - [`compute_live_intervals`] - liveness and spill weights for register
//!   allocation
//!
//! # Usage
//!
//! ```rust
//! use ssaopt::{analysis::detect_loops, utils::graph::compute_dominators, FunctionBuilder};
//!
//! let mut b = FunctionBuilder::new("f", 0);
//! b.ret(None)?;
//! let func = b.finish()?;
//!
//! let dominators = compute_dominators(&func);
//! let loops = detect_loops(&func, &dominators);
//! assert!(loops.is_empty());
//! # Ok::<(), ssaopt::Error>(())
//! ```

mod liveness;
mod loops;

pub use liveness::compute_live_intervals;
pub use loops::{detect_loops, LoopForest, LoopInfo};

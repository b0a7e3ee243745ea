//! On-the-fly SSA construction.
//!
//! The front end never builds a non-SSA form first. Instead it reports variable
//! writes and reads while it emits blocks, and the [`SsaBuilder`] answers each
//! read with the SSA value that reaches it, inserting phi nodes at join points
//! as needed (Braun et al., "Simple and Efficient Construction of Static Single
//! Assignment Form", CC 2013).
//!
//! # Sealing
//!
//! A block is **sealed** once the front end guarantees that no further
//! predecessors will be added to it. Reads in unsealed blocks create
//! placeholder phis that are completed when the block is sealed. Structured
//! front ends know exactly when this happens; for a `while` loop, the header
//! is sealed after the back edge from the end of the body has been emitted.
//!
//! Most front ends use [`FunctionBuilder`](crate::ir::FunctionBuilder), which
//! drives an `SsaBuilder` internally.

mod builder;

use std::fmt;

pub use builder::SsaBuilder;

/// A source-level variable, as numbered by the front end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Variable(pub u32);

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "var{}", self.0)
    }
}

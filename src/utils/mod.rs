//! Shared data structures used across the back end.

mod bitset;
pub mod graph;

pub use bitset::{BitSet, BitSetIter};

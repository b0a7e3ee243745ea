//! Register allocation.
//!
//! The allocator works on [`LiveIntervals`] computed by
//! [`compute_live_intervals`](crate::analysis::compute_live_intervals) and
//! assigns every virtual register either a physical register of its class or
//! a stack slot. Program points are numbered by slot, four per position:
//!
//! ```text
//!   4k + 0   reload
//!   4k + 1   use
//!   4k + 2   def
//!   4k + 3   store
//! ```
//!
//! # Components
//!
//! - [`LiveInterval`] / [`LiveIntervals`] - segments, weights and spillability
//! - [`InterferenceGraph`] / [`simplify`] - allocation priorities
//! - [`LiveRegMatrix`] - current occupants of each physical register
//! - [`TargetRegisters`] - register classes, reserved and fixed registers
//! - [`Spiller`] / [`InlineSpiller`] - splitting spilled registers
//! - [`RegisterAllocator`] - the priority-driven assignment loop
//!
//! # Example
//!
//! ```rust
//! use ssaopt::regalloc::{InlineSpiller, LiveIntervals, RegisterAllocator, TargetRegisters};
//!
//! let mut intervals = LiveIntervals::new();
//! let reg = intervals.create_virt_reg(None);
//! if let Some(li) = intervals.interval_mut(reg) {
//!     li.add_segment(2, 10);
//! }
//!
//! let allocator = RegisterAllocator::new(TargetRegisters::uniform(4), 4);
//! let allocation = allocator.run(&mut intervals, &mut InlineSpiller::new())?;
//! assert_eq!(allocation.assignment(reg).map(|r| r.to_string()), Some("r0".to_string()));
//! # Ok::<(), ssaopt::Error>(())
//! ```

mod allocator;
mod graph;
mod interval;
mod matrix;
mod simplify;
mod spiller;
mod target;

pub use allocator::{Allocation, RegisterAllocator};
pub use graph::InterferenceGraph;
pub use interval::{
    base_slot, def_slot, segments_overlap, use_slot, LiveInterval, LiveIntervals, Segment, VirtReg,
};
pub use matrix::{Interference, LiveRegMatrix};
pub use simplify::{simplify, Simplification};
pub use spiller::{InlineSpiller, SpillRecord, SpillSlot, Spiller};
pub use target::{PhysReg, RegisterClass, TargetRegisters};

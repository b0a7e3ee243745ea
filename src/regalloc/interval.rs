//! Virtual registers and their live intervals.
//!
//! Program points are numbered by slot. Every numbered position owns four
//! consecutive slots:
//!
//! ```text
//!   4k + 0   reload   (a spilled operand is reloaded)
//!   4k + 1   use      (operands are read)
//!   4k + 2   def      (the result is written)
//!   4k + 3   store    (a spilled result is stored)
//! ```
//!
//! An interval is a sorted list of half-open `[start, end)` segments. A use at
//! position `k` keeps its operand live up to `4k + 2`, so an operand whose
//! last use is at `k` never interferes with the result defined at `k`.

use std::{collections::HashMap, fmt};

use crate::ir::Value;

/// A virtual register: one SSA value or one spill product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VirtReg(pub(crate) u32);

impl VirtReg {
    /// Creates a virtual register from a raw index.
    #[must_use]
    pub const fn new(index: u32) -> Self {
        VirtReg(index)
    }

    /// Returns the raw index.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for VirtReg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// Returns the reload slot of the position containing `slot`.
#[must_use]
pub const fn base_slot(slot: u32) -> u32 {
    slot & !3
}

/// Returns the use slot of position `pos`.
#[must_use]
pub const fn use_slot(pos: u32) -> u32 {
    pos * 4 + 1
}

/// Returns the def slot of position `pos`.
#[must_use]
pub const fn def_slot(pos: u32) -> u32 {
    pos * 4 + 2
}

/// A half-open range of slots `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Segment {
    /// First covered slot
    pub start: u32,
    /// First slot past the segment
    pub end: u32,
}

impl Segment {
    /// Creates a segment.
    #[must_use]
    pub const fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }

    /// Returns the number of covered slots.
    #[must_use]
    pub const fn len(&self) -> u32 {
        self.end.saturating_sub(self.start)
    }

    /// Returns `true` if no slot is covered.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.end <= self.start
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

/// Returns `true` if two sorted, disjoint segment lists share a slot.
#[must_use]
pub fn segments_overlap(a: &[Segment], b: &[Segment]) -> bool {
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        if a[i].end <= b[j].start {
            i += 1;
        } else if b[j].end <= a[i].start {
            j += 1;
        } else {
            return true;
        }
    }
    false
}

/// The live ranges of one virtual register plus its allocation attributes.
#[derive(Debug, Clone, PartialEq)]
pub struct LiveInterval {
    reg: VirtReg,
    segments: Vec<Segment>,
    weight: f32,
    spillable: bool,
    class: usize,
    def: Option<u32>,
    uses: Vec<u32>,
    origin: Option<VirtReg>,
}

impl LiveInterval {
    /// Creates an empty, spillable interval in register class 0.
    #[must_use]
    pub fn new(reg: VirtReg) -> Self {
        Self {
            reg,
            segments: Vec::new(),
            weight: 0.0,
            spillable: true,
            class: 0,
            def: None,
            uses: Vec::new(),
            origin: None,
        }
    }

    /// Returns the register this interval belongs to.
    #[must_use]
    pub fn reg(&self) -> VirtReg {
        self.reg
    }

    /// Returns the segments, sorted and disjoint.
    #[must_use]
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Returns `true` if the interval covers no slot.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Returns the first covered slot.
    #[must_use]
    pub fn start(&self) -> Option<u32> {
        self.segments.first().map(|s| s.start)
    }

    /// Returns the slot past the last covered one.
    #[must_use]
    pub fn end(&self) -> Option<u32> {
        self.segments.last().map(|s| s.end)
    }

    /// Returns the number of covered slots.
    #[must_use]
    pub fn size(&self) -> u32 {
        self.segments.iter().map(Segment::len).sum()
    }

    /// Adds `[start, end)`, merging with overlapping or adjacent segments.
    pub fn add_segment(&mut self, start: u32, end: u32) {
        if end <= start {
            return;
        }
        let mut merged = Segment::new(start, end);

        // Segments entirely before or after the new one stay untouched
        let first = self.segments.partition_point(|s| s.end < merged.start);
        let last = self.segments.partition_point(|s| s.start <= merged.end);
        if first < last {
            merged.start = merged.start.min(self.segments[first].start);
            merged.end = merged.end.max(self.segments[last - 1].end);
        }
        let tail = self.segments.split_off(last);
        self.segments.truncate(first);
        self.segments.push(merged);
        self.segments.extend(tail);
    }

    /// Removes every segment.
    pub fn clear(&mut self) {
        self.segments.clear();
    }

    /// Returns `true` if `slot` is covered.
    #[must_use]
    pub fn covers(&self, slot: u32) -> bool {
        let idx = self.segments.partition_point(|s| s.end <= slot);
        self.segments.get(idx).is_some_and(|s| s.start <= slot)
    }

    /// Returns `true` if both intervals cover a common slot.
    #[must_use]
    pub fn overlaps(&self, other: &LiveInterval) -> bool {
        segments_overlap(&self.segments, &other.segments)
    }

    /// Returns the spill weight.
    #[must_use]
    pub fn weight(&self) -> f32 {
        self.weight
    }

    /// Sets the spill weight.
    pub fn set_weight(&mut self, weight: f32) {
        self.weight = weight;
    }

    /// Returns `true` if the register may be spilled.
    #[must_use]
    pub fn is_spillable(&self) -> bool {
        self.spillable
    }

    /// Marks the register as (un)spillable.
    pub fn set_spillable(&mut self, spillable: bool) {
        self.spillable = spillable;
    }

    /// Returns the register class index.
    #[must_use]
    pub fn class(&self) -> usize {
        self.class
    }

    /// Sets the register class index.
    pub fn set_class(&mut self, class: usize) {
        self.class = class;
    }

    /// Returns the def slot, if the register has a definition.
    #[must_use]
    pub fn def(&self) -> Option<u32> {
        self.def
    }

    /// Sets the def slot.
    pub fn set_def(&mut self, slot: u32) {
        self.def = Some(slot);
    }

    /// Returns the distinct use slots in ascending order.
    #[must_use]
    pub fn uses(&self) -> &[u32] {
        &self.uses
    }

    /// Records a use slot.
    pub fn add_use(&mut self, slot: u32) {
        if let Err(pos) = self.uses.binary_search(&slot) {
            self.uses.insert(pos, slot);
        }
    }

    /// Returns the register this one was split off by spilling, if any.
    #[must_use]
    pub fn origin(&self) -> Option<VirtReg> {
        self.origin
    }
}

impl fmt::Display for LiveInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.reg)?;
        for segment in &self.segments {
            write!(f, " {segment}")?;
        }
        write!(f, " w={:.4}", self.weight)?;
        if !self.spillable {
            f.write_str(" unspillable")?;
        }
        Ok(())
    }
}

/// The live intervals of all virtual registers of a function.
#[derive(Debug, Clone, Default)]
pub struct LiveIntervals {
    intervals: Vec<LiveInterval>,
    by_value: HashMap<Value, VirtReg>,
    values: Vec<Option<Value>>,
}

impl LiveIntervals {
    /// Creates an empty collection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a virtual register with an empty interval, optionally bound to
    /// the SSA value it holds.
    #[allow(clippy::cast_possible_truncation)]
    pub fn create_virt_reg(&mut self, value: Option<Value>) -> VirtReg {
        let reg = VirtReg(self.intervals.len() as u32);
        self.intervals.push(LiveInterval::new(reg));
        self.values.push(value);
        if let Some(value) = value {
            self.by_value.insert(value, reg);
        }
        reg
    }

    /// Creates an unspillable register holding part of `origin`'s value.
    ///
    /// The new register inherits the class and value of `origin` and gets an
    /// infinite weight.
    pub fn create_spill_product(&mut self, origin: VirtReg) -> VirtReg {
        let class = self.interval(origin).map_or(0, LiveInterval::class);
        let value = self.value_of(origin);

        #[allow(clippy::cast_possible_truncation)]
        let reg = VirtReg(self.intervals.len() as u32);
        let mut interval = LiveInterval::new(reg);
        interval.class = class;
        interval.spillable = false;
        interval.weight = f32::INFINITY;
        interval.origin = Some(origin);
        self.intervals.push(interval);
        self.values.push(value);
        reg
    }

    /// Returns the number of virtual registers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.intervals.len()
    }

    /// Returns `true` if there are no virtual registers.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }

    /// Returns the interval of `reg`.
    #[must_use]
    pub fn interval(&self, reg: VirtReg) -> Option<&LiveInterval> {
        self.intervals.get(reg.index())
    }

    /// Returns the interval of `reg` mutably.
    pub fn interval_mut(&mut self, reg: VirtReg) -> Option<&mut LiveInterval> {
        self.intervals.get_mut(reg.index())
    }

    /// Returns the register holding `value`.
    #[must_use]
    pub fn vreg_for(&self, value: Value) -> Option<VirtReg> {
        self.by_value.get(&value).copied()
    }

    /// Returns the SSA value held by `reg`.
    #[must_use]
    pub fn value_of(&self, reg: VirtReg) -> Option<Value> {
        self.values.get(reg.index()).copied().flatten()
    }

    /// Iterates over all intervals in register order.
    pub fn iter(&self) -> impl Iterator<Item = &LiveInterval> {
        self.intervals.iter()
    }
}

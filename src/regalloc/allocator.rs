//! The priority-driven register allocator.
//!
//! Allocation runs in two phases:
//!
//! 1. The interference graph is built and simplified with `K` colors, which
//!    assigns every virtual register a priority (see [`simplify`]).
//! 2. Registers are taken from a priority queue, highest priority first, and
//!    matched against the candidates of their register class in order:
//!
//!    - a free candidate is assigned immediately;
//!    - a candidate whose occupants are all spillable and no heavier than the
//!      current register is remembered as an eviction site (the first one
//!      wins);
//!    - a candidate that is reserved or occupied by a fixed range is skipped.
//!
//!    Without a free candidate the occupants of the eviction site are spilled
//!    and the register takes their place. Without an eviction site the
//!    register itself is spilled. Spilling creates short unspillable
//!    registers, which are queued again at the lowest priority.
//!
//! The allocation fails only when a register can neither be assigned nor
//! spilled.

use std::{
    cmp::Reverse,
    collections::{BTreeMap, BinaryHeap},
};

use crate::{
    regalloc::{
        segments_overlap, simplify, Interference, InterferenceGraph, LiveIntervals,
        LiveRegMatrix, PhysReg, SpillRecord, Spiller, TargetRegisters, VirtReg,
    },
    Error, Result,
};

/// Priority of registers created by spilling.
const SPILL_PRODUCT_PRIORITY: u32 = 0;

/// The result of register allocation.
#[derive(Debug, Clone, Default)]
pub struct Allocation {
    assignments: BTreeMap<VirtReg, PhysReg>,
    spills: Vec<SpillRecord>,
}

impl Allocation {
    /// Returns the physical register assigned to `reg`.
    #[must_use]
    pub fn assignment(&self, reg: VirtReg) -> Option<PhysReg> {
        self.assignments.get(&reg).copied()
    }

    /// Iterates over all assignments in register order.
    pub fn assignments(&self) -> impl Iterator<Item = (VirtReg, PhysReg)> + '_ {
        self.assignments.iter().map(|(&v, &p)| (v, p))
    }

    /// Returns the spills in the order they happened.
    #[must_use]
    pub fn spills(&self) -> &[SpillRecord] {
        &self.spills
    }

    /// Returns `true` if `reg` was spilled.
    #[must_use]
    pub fn is_spilled(&self, reg: VirtReg) -> bool {
        self.spill_record(reg).is_some()
    }

    /// Returns the spill record of `reg`.
    #[must_use]
    pub fn spill_record(&self, reg: VirtReg) -> Option<&SpillRecord> {
        self.spills.iter().find(|r| r.vreg == reg)
    }

    /// Checks the allocation against the intervals it was computed for.
    ///
    /// Every non-empty interval must be assigned a non-reserved register of
    /// its class, overlapping intervals must not share a register and no
    /// interval may overlap a fixed range of its register. The products of
    /// every spill must cover the definition and all uses of the spilled
    /// register.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Malformed`] describing the first violation found.
    pub fn verify(&self, intervals: &LiveIntervals, target: &TargetRegisters) -> Result<()> {
        let mut by_reg: Vec<Vec<VirtReg>> = vec![Vec::new(); target.num_regs()];

        for li in intervals.iter().filter(|li| !li.is_empty()) {
            let reg = li.reg();
            let Some(phys) = self.assignment(reg) else {
                return Err(malformed_error!("{} is live but has no register", reg));
            };
            if target.is_reserved(phys) {
                return Err(malformed_error!("{} is assigned reserved {}", reg, phys));
            }
            if !target.class(li.class()).is_some_and(|c| c.contains(phys)) {
                return Err(malformed_error!("{} is outside the class of {}", phys, reg));
            }
            for &(fixed, segment) in target.fixed() {
                if fixed == phys && segments_overlap(li.segments(), &[segment]) {
                    return Err(malformed_error!("{} overlaps fixed {} of {}", reg, segment, phys));
                }
            }
            let Some(others) = by_reg.get_mut(phys.index()) else {
                return Err(malformed_error!("{} is outside the register file", phys));
            };
            for &other in others.iter() {
                if intervals.interval(other).is_some_and(|o| o.overlaps(li)) {
                    return Err(malformed_error!(
                        "{} and {} overlap but share {}",
                        other,
                        reg,
                        phys
                    ));
                }
            }
            others.push(reg);
        }

        for record in &self.spills {
            let covered = |slot: u32| {
                record
                    .products
                    .iter()
                    .filter_map(|&p| intervals.interval(p))
                    .any(|li| li.covers(slot))
            };
            if let Some(def) = record.def.filter(|&d| !covered(d)) {
                return Err(malformed_error!("Def {} of spilled {} is not covered", def, record.vreg));
            }
            if let Some(u) = record.uses.iter().find(|&&u| !covered(u)) {
                return Err(malformed_error!("Use {} of spilled {} is not covered", u, record.vreg));
            }
        }
        Ok(())
    }
}

/// Assigns physical registers to live intervals.
#[derive(Debug, Clone)]
pub struct RegisterAllocator {
    target: TargetRegisters,
    num_colors: usize,
}

impl RegisterAllocator {
    /// Creates an allocator for `target`, simplifying with `num_colors`
    /// colors.
    #[must_use]
    pub fn new(target: TargetRegisters, num_colors: usize) -> Self {
        Self { target, num_colors }
    }

    /// Returns the target register file.
    #[must_use]
    pub fn target(&self) -> &TargetRegisters {
        &self.target
    }

    /// Allocates every live interval, spilling through `spiller` where
    /// needed. Intervals of spilled registers are replaced in place.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotSupported`] for an unusable target or zero colors,
    /// and [`Error::AllocationFailed`] if an unspillable register can not be
    /// assigned.
    pub fn run(&self, intervals: &mut LiveIntervals, spiller: &mut dyn Spiller) -> Result<Allocation> {
        self.target.validate()?;
        if self.num_colors == 0 {
            return Err(Error::NotSupported);
        }

        let mut graph = InterferenceGraph::build(intervals);
        let simplification = simplify(&mut graph, intervals, self.num_colors);

        let mut ctx = AllocationContext {
            target: &self.target,
            intervals,
            spiller,
            matrix: LiveRegMatrix::new(&self.target),
            queue: BinaryHeap::new(),
            spills: Vec::new(),
        };
        for &reg in simplification.order() {
            ctx.enqueue(reg, simplification.priority(reg));
        }
        while let Some((_, Reverse(reg))) = ctx.queue.pop() {
            ctx.select_or_spill(reg)?;
        }

        let assignments = ctx.matrix.into_assignments();
        log::debug!(
            "allocated {} registers, {} spills",
            assignments.len(),
            ctx.spills.len()
        );
        Ok(Allocation {
            assignments,
            spills: ctx.spills,
        })
    }
}

/// Mutable state of one allocation run.
struct AllocationContext<'a> {
    target: &'a TargetRegisters,
    intervals: &'a mut LiveIntervals,
    spiller: &'a mut dyn Spiller,
    matrix: LiveRegMatrix,
    /// Highest priority first, lowest register among equals.
    queue: BinaryHeap<(u32, Reverse<VirtReg>)>,
    spills: Vec<SpillRecord>,
}

impl AllocationContext<'_> {
    fn enqueue(&mut self, reg: VirtReg, priority: u32) {
        self.queue.push((priority, Reverse(reg)));
    }

    fn weight(&self, reg: VirtReg) -> f32 {
        self.intervals.interval(reg).map_or(0.0, |li| li.weight())
    }

    fn is_spillable(&self, reg: VirtReg) -> bool {
        self.intervals.interval(reg).is_some_and(|li| li.is_spillable())
    }

    fn select_or_spill(&mut self, reg: VirtReg) -> Result<()> {
        let Some(li) = self.intervals.interval(reg) else {
            return Ok(());
        };
        if li.is_empty() || self.matrix.assignment(reg).is_some() {
            return Ok(());
        }
        let class = li.class();
        let weight = li.weight();

        let mut eviction: Option<(PhysReg, Vec<VirtReg>)> = None;
        for phys in self.target.allocation_order(class) {
            match self.matrix.check_interference(self.intervals, reg, phys) {
                Interference::Free => {
                    log::debug!("assign {} -> {}", reg, phys);
                    self.matrix.assign(reg, phys);
                    return Ok(());
                }
                Interference::Virtual(occupants) => {
                    let viable = occupants
                        .iter()
                        .all(|&o| self.is_spillable(o) && self.weight(o) <= weight);
                    if eviction.is_none() && viable {
                        eviction = Some((phys, occupants));
                    }
                }
                Interference::Fixed => {}
            }
        }

        if let Some((phys, occupants)) = eviction {
            for occupant in occupants {
                log::debug!("evict {} from {} for {}", occupant, phys, reg);
                self.matrix.unassign(occupant);
                self.spill(occupant)?;
            }
            log::debug!("assign {} -> {}", reg, phys);
            self.matrix.assign(reg, phys);
            return Ok(());
        }

        if !self.is_spillable(reg) {
            return Err(Error::AllocationFailed(reg));
        }
        self.spill(reg)
    }

    fn spill(&mut self, reg: VirtReg) -> Result<()> {
        let record = self.spiller.spill(self.intervals, reg)?;
        for &product in &record.products {
            self.enqueue(product, SPILL_PRODUCT_PRIORITY);
        }
        self.spills.push(record);
        Ok(())
    }
}

//! Tracks which virtual registers occupy which physical register.

use std::collections::BTreeMap;

use crate::regalloc::{
    segments_overlap, LiveIntervals, PhysReg, Segment, TargetRegisters, VirtReg,
};

/// The result of checking a virtual register against a physical register.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Interference {
    /// No overlap, the register can be assigned.
    Free,
    /// Overlaps the listed assigned virtual registers.
    Virtual(Vec<VirtReg>),
    /// The register is reserved or occupied by a fixed range.
    Fixed,
}

/// Per physical register lists of assigned virtual registers.
#[derive(Debug, Clone)]
pub struct LiveRegMatrix {
    units: Vec<Vec<VirtReg>>,
    fixed: Vec<Vec<Segment>>,
    reserved: Vec<bool>,
    assignment: BTreeMap<VirtReg, PhysReg>,
}

impl LiveRegMatrix {
    /// Creates an empty matrix for `target`.
    #[must_use]
    pub fn new(target: &TargetRegisters) -> Self {
        let n = target.num_regs();
        let mut fixed = vec![Vec::new(); n];
        for &(reg, segment) in target.fixed() {
            if let Some(list) = fixed.get_mut(reg.index()) {
                list.push(segment);
            }
        }
        for list in &mut fixed {
            list.sort_unstable();
        }
        let reserved = (0..n)
            .map(|i| {
                #[allow(clippy::cast_possible_truncation)]
                target.is_reserved(PhysReg(i as u16))
            })
            .collect();

        Self {
            units: vec![Vec::new(); n],
            fixed,
            reserved,
            assignment: BTreeMap::new(),
        }
    }

    /// Checks `reg` against everything currently occupying `phys`.
    #[must_use]
    pub fn check_interference(
        &self,
        intervals: &LiveIntervals,
        reg: VirtReg,
        phys: PhysReg,
    ) -> Interference {
        let Some(li) = intervals.interval(reg) else {
            return Interference::Free;
        };
        if self.reserved.get(phys.index()).copied().unwrap_or(true) {
            return Interference::Fixed;
        }
        if self
            .fixed
            .get(phys.index())
            .is_some_and(|f| segments_overlap(li.segments(), f))
        {
            return Interference::Fixed;
        }

        let interfering: Vec<VirtReg> = self.units[phys.index()]
            .iter()
            .copied()
            .filter(|&other| intervals.interval(other).is_some_and(|o| li.overlaps(o)))
            .collect();
        if interfering.is_empty() {
            Interference::Free
        } else {
            Interference::Virtual(interfering)
        }
    }

    /// Records `reg` as living in `phys`.
    pub fn assign(&mut self, reg: VirtReg, phys: PhysReg) {
        if let Some(unit) = self.units.get_mut(phys.index()) {
            unit.push(reg);
            self.assignment.insert(reg, phys);
        }
    }

    /// Removes the assignment of `reg`, returning the register it occupied.
    pub fn unassign(&mut self, reg: VirtReg) -> Option<PhysReg> {
        let phys = self.assignment.remove(&reg)?;
        if let Some(unit) = self.units.get_mut(phys.index()) {
            unit.retain(|&r| r != reg);
        }
        Some(phys)
    }

    /// Returns the physical register of `reg`.
    #[must_use]
    pub fn assignment(&self, reg: VirtReg) -> Option<PhysReg> {
        self.assignment.get(&reg).copied()
    }

    /// Consumes the matrix, returning the assignment map.
    #[must_use]
    pub fn into_assignments(self) -> BTreeMap<VirtReg, PhysReg> {
        self.assignment
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interference_kinds() {
        let target = TargetRegisters::uniform(3)
            .with_reserved(PhysReg(2))
            .with_fixed(PhysReg(1), 8, 12);
        let mut intervals = LiveIntervals::new();
        let a = intervals.create_virt_reg(None);
        let b = intervals.create_virt_reg(None);
        intervals.interval_mut(a).unwrap().add_segment(0, 10);
        intervals.interval_mut(b).unwrap().add_segment(4, 6);

        let mut matrix = LiveRegMatrix::new(&target);
        assert_eq!(matrix.check_interference(&intervals, a, PhysReg(0)), Interference::Free);
        assert_eq!(matrix.check_interference(&intervals, a, PhysReg(1)), Interference::Fixed);
        assert_eq!(matrix.check_interference(&intervals, b, PhysReg(1)), Interference::Free);
        assert_eq!(matrix.check_interference(&intervals, b, PhysReg(2)), Interference::Fixed);

        matrix.assign(a, PhysReg(0));
        assert_eq!(
            matrix.check_interference(&intervals, b, PhysReg(0)),
            Interference::Virtual(vec![a])
        );

        assert_eq!(matrix.unassign(a), Some(PhysReg(0)));
        assert_eq!(matrix.unassign(a), None);
        assert_eq!(matrix.check_interference(&intervals, b, PhysReg(0)), Interference::Free);
    }
}

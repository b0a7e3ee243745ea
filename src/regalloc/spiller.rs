//! Spilling virtual registers to the stack.

use std::fmt;

use crate::{
    regalloc::{base_slot, LiveIntervals, VirtReg},
    Error, Result,
};

/// A stack slot holding a spilled value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SpillSlot(pub(crate) u32);

impl SpillSlot {
    /// Returns the slot number.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for SpillSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ss{}", self.0)
    }
}

/// How a spilled register was split up, for the code that inserts the
/// stores and reloads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpillRecord {
    /// The register that was spilled.
    pub vreg: VirtReg,
    /// Where its value lives.
    pub slot: SpillSlot,
    /// The short registers replacing it, definition first.
    pub products: Vec<VirtReg>,
    /// Def slot of the spilled register, if it had one.
    pub def: Option<u32>,
    /// Use slots of the spilled register.
    pub uses: Vec<u32>,
}

/// Replaces the interval of a register that could not stay in a register.
pub trait Spiller {
    /// Spills `reg`, clearing its interval and creating replacement
    /// registers for the allocator to assign.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AllocationFailed`] if `reg` is not spillable.
    fn spill(&mut self, intervals: &mut LiveIntervals, reg: VirtReg) -> Result<SpillRecord>;
}

/// Stores the value right after its definition and reloads it right before
/// every use.
///
/// The definition gets an unspillable register over its def and store slots,
/// each distinct use position one over its reload and use slots.
#[derive(Debug, Default)]
pub struct InlineSpiller {
    next_slot: u32,
}

impl InlineSpiller {
    /// Creates a spiller starting at stack slot 0.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stack slots handed out.
    #[must_use]
    pub fn slots_used(&self) -> u32 {
        self.next_slot
    }
}

impl Spiller for InlineSpiller {
    fn spill(&mut self, intervals: &mut LiveIntervals, reg: VirtReg) -> Result<SpillRecord> {
        let Some(li) = intervals.interval_mut(reg) else {
            return Err(malformed_error!("Spilling unknown register {}", reg));
        };
        if !li.is_spillable() {
            return Err(Error::AllocationFailed(reg));
        }

        let def = li.def();
        let uses = li.uses().to_vec();
        li.clear();
        li.set_spillable(false);

        let slot = SpillSlot(self.next_slot);
        self.next_slot += 1;

        let mut products = Vec::new();
        if let Some(def) = def {
            let product = intervals.create_spill_product(reg);
            if let Some(pi) = intervals.interval_mut(product) {
                pi.add_segment(def, def + 2);
                pi.set_def(def);
            }
            products.push(product);
        }

        let mut bases: Vec<u32> = uses.iter().map(|&u| base_slot(u)).collect();
        bases.dedup();
        for base in bases {
            let product = intervals.create_spill_product(reg);
            if let Some(pi) = intervals.interval_mut(product) {
                pi.add_segment(base, base + 2);
                for &u in uses.iter().filter(|&&u| base_slot(u) == base) {
                    pi.add_use(u);
                }
            }
            products.push(product);
        }

        log::debug!(
            "spill {} to {} ({} products)",
            reg,
            slot,
            products.len()
        );
        Ok(SpillRecord {
            vreg: reg,
            slot,
            products,
            def,
            uses,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::regalloc::{def_slot, use_slot};

    #[test]
    fn test_inline_spill_splits_at_def_and_uses() -> Result<()> {
        let mut intervals = LiveIntervals::new();
        let reg = intervals.create_virt_reg(None);
        {
            let li = intervals.interval_mut(reg).unwrap();
            li.add_segment(def_slot(1), def_slot(9));
            li.set_def(def_slot(1));
            li.add_use(use_slot(4));
            li.add_use(use_slot(9));
        }

        let mut spiller = InlineSpiller::new();
        let record = spiller.spill(&mut intervals, reg)?;

        assert_eq!(record.slot, SpillSlot(0));
        assert_eq!(record.products.len(), 3);
        assert!(intervals.interval(reg).unwrap().is_empty());

        let def = intervals.interval(record.products[0]).unwrap();
        assert!(def.covers(def_slot(1)));
        assert!(!def.is_spillable());
        assert_eq!(def.origin(), Some(reg));

        let reload = intervals.interval(record.products[2]).unwrap();
        assert!(reload.covers(use_slot(9)));
        assert!(!reload.covers(def_slot(9)));
        assert_eq!(spiller.slots_used(), 1);
        Ok(())
    }

    #[test]
    fn test_products_can_not_be_spilled_again() -> Result<()> {
        let mut intervals = LiveIntervals::new();
        let reg = intervals.create_virt_reg(None);
        intervals.interval_mut(reg).unwrap().set_def(def_slot(0));
        intervals.interval_mut(reg).unwrap().add_segment(def_slot(0), def_slot(0) + 1);

        let mut spiller = InlineSpiller::new();
        let record = spiller.spill(&mut intervals, reg)?;
        let product = record.products[0];
        assert!(matches!(
            spiller.spill(&mut intervals, product),
            Err(Error::AllocationFailed(r)) if r == product
        ));
        Ok(())
    }
}

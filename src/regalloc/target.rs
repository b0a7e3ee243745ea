//! Physical register description of the target.

use std::fmt;

use crate::{regalloc::Segment, Error, Result};

/// A physical register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PhysReg(pub(crate) u16);

impl PhysReg {
    /// Creates a physical register from its hardware number.
    #[must_use]
    pub const fn new(number: u16) -> Self {
        PhysReg(number)
    }

    /// Returns the hardware number as an index.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for PhysReg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "r{}", self.0)
    }
}

/// A named set of interchangeable registers, in allocation order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterClass {
    name: String,
    regs: Vec<PhysReg>,
}

impl RegisterClass {
    /// Creates a class. Candidates are tried in the order given.
    #[must_use]
    pub fn new(name: impl Into<String>, regs: Vec<PhysReg>) -> Self {
        Self {
            name: name.into(),
            regs,
        }
    }

    /// Returns the class name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the registers of this class in allocation order.
    #[must_use]
    pub fn regs(&self) -> &[PhysReg] {
        &self.regs
    }

    /// Returns `true` if `reg` belongs to this class.
    #[must_use]
    pub fn contains(&self, reg: PhysReg) -> bool {
        self.regs.contains(&reg)
    }
}

/// The register file the allocator assigns from.
///
/// Reserved registers are never handed out. Fixed ranges model registers that
/// are occupied at known program points (for instance by a calling
/// convention) and can not be evicted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetRegisters {
    classes: Vec<RegisterClass>,
    reserved: Vec<PhysReg>,
    fixed: Vec<(PhysReg, Segment)>,
}

impl TargetRegisters {
    /// Creates a target from its register classes. Class `0` is the default
    /// class of every virtual register.
    #[must_use]
    pub fn new(classes: Vec<RegisterClass>) -> Self {
        Self {
            classes,
            reserved: Vec::new(),
            fixed: Vec::new(),
        }
    }

    /// A single class `gpr` holding `r0..r{count-1}`.
    #[must_use]
    pub fn uniform(count: u16) -> Self {
        Self::new(vec![RegisterClass::new(
            "gpr",
            (0..count).map(PhysReg).collect(),
        )])
    }

    /// Marks `reg` as reserved.
    #[must_use]
    pub fn with_reserved(mut self, reg: PhysReg) -> Self {
        if !self.reserved.contains(&reg) {
            self.reserved.push(reg);
        }
        self
    }

    /// Occupies `reg` over `[start, end)`.
    #[must_use]
    pub fn with_fixed(mut self, reg: PhysReg, start: u32, end: u32) -> Self {
        self.fixed.push((reg, Segment::new(start, end)));
        self
    }

    /// Returns the register classes.
    #[must_use]
    pub fn classes(&self) -> &[RegisterClass] {
        &self.classes
    }

    /// Returns the class with the given index.
    #[must_use]
    pub fn class(&self, index: usize) -> Option<&RegisterClass> {
        self.classes.get(index)
    }

    /// Returns the fixed ranges.
    #[must_use]
    pub fn fixed(&self) -> &[(PhysReg, Segment)] {
        &self.fixed
    }

    /// Returns `true` if `reg` is reserved.
    #[must_use]
    pub fn is_reserved(&self, reg: PhysReg) -> bool {
        self.reserved.contains(&reg)
    }

    /// Returns one more than the highest register number of any class.
    #[must_use]
    pub fn num_regs(&self) -> usize {
        self.classes
            .iter()
            .flat_map(|c| c.regs.iter())
            .map(|r| r.index() + 1)
            .max()
            .unwrap_or(0)
    }

    /// Returns the registers of class `index` that may be assigned, in
    /// allocation order.
    #[must_use]
    pub fn allocation_order(&self, index: usize) -> Vec<PhysReg> {
        self.class(index)
            .map(|c| {
                c.regs
                    .iter()
                    .copied()
                    .filter(|r| !self.is_reserved(*r))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Checks that every class has at least one assignable register.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotSupported`] if there are no classes or a class has
    /// no assignable register.
    pub fn validate(&self) -> Result<()> {
        if self.classes.is_empty() {
            return Err(Error::NotSupported);
        }
        for index in 0..self.classes.len() {
            if self.allocation_order(index).is_empty() {
                return Err(Error::NotSupported);
            }
        }
        Ok(())
    }
}

impl Default for TargetRegisters {
    fn default() -> Self {
        Self::uniform(4)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uniform() {
        let target = TargetRegisters::uniform(3);
        assert_eq!(target.num_regs(), 3);
        assert_eq!(target.class(0).map(RegisterClass::name), Some("gpr"));
        assert_eq!(
            target.allocation_order(0),
            vec![PhysReg(0), PhysReg(1), PhysReg(2)]
        );
        assert!(target.allocation_order(1).is_empty());
        assert!(target.validate().is_ok());
    }

    #[test]
    fn test_reserved_registers_are_skipped() {
        let target = TargetRegisters::uniform(2).with_reserved(PhysReg(0));
        assert!(target.is_reserved(PhysReg(0)));
        assert_eq!(target.allocation_order(0), vec![PhysReg(1)]);

        let target = target.with_reserved(PhysReg(1));
        assert!(matches!(target.validate(), Err(Error::NotSupported)));
    }

    #[test]
    fn test_empty_target_is_rejected() {
        assert!(matches!(
            TargetRegisters::new(Vec::new()).validate(),
            Err(Error::NotSupported)
        ));
        assert!(matches!(
            TargetRegisters::uniform(0).validate(),
            Err(Error::NotSupported)
        ));
    }

    #[test]
    fn test_display() {
        assert_eq!(PhysReg::new(7).to_string(), "r7");
    }
}

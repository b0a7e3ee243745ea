//! Phi nodes.
//!
//! A phi node `%3 = phi [bb1: %1], [bb2: %2]` selects `%1` if control arrived
//! from `bb1` and `%2` if it arrived from `bb2`. Phis are evaluated at block
//! entry, before any ordinary instruction of the block.
//!
//! While SSA is being built a phi may be **incomplete** (its block is not
//! sealed yet, so it has no operands) or **trivial** (it merges only itself
//! and at most one other value). Trivial phis are always eventually replaced by
//! the value they merge.

use std::fmt;

use crate::ir::{BlockId, InstId, Value};

/// An operand of a phi node: the value flowing in from one predecessor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhiOperand {
    /// The predecessor block the value comes from.
    block: BlockId,
    /// The incoming value.
    value: Value,
}

impl PhiOperand {
    /// Creates a new phi operand.
    #[must_use]
    pub const fn new(block: BlockId, value: Value) -> Self {
        Self { block, value }
    }

    /// Returns the predecessor block.
    #[must_use]
    pub const fn block(&self) -> BlockId {
        self.block
    }

    /// Returns the incoming value.
    #[must_use]
    pub const fn value(&self) -> Value {
        self.value
    }
}

impl fmt::Display for PhiOperand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}: {}]", self.block, self.value)
    }
}

/// A phi node merging values at a control flow join point.
///
/// Once the owning block is sealed the node holds exactly one operand per
/// predecessor of its block.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PhiNode {
    operands: Vec<PhiOperand>,
}

impl PhiNode {
    /// Creates a phi node without operands.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the operands in insertion order.
    #[must_use]
    pub fn operands(&self) -> &[PhiOperand] {
        &self.operands
    }

    /// Returns the number of operands.
    #[must_use]
    pub fn operand_count(&self) -> usize {
        self.operands.len()
    }

    /// Returns `true` if the phi has no operands.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.operands.is_empty()
    }

    /// Sets the value flowing in from `block`, appending a new operand if
    /// `block` has none yet.
    pub fn set_incoming(&mut self, block: BlockId, value: Value) {
        if let Some(op) = self.operands.iter_mut().find(|op| op.block == block) {
            op.value = value;
        } else {
            self.operands.push(PhiOperand::new(block, value));
        }
    }

    /// Returns the value flowing in from `block`.
    #[must_use]
    pub fn incoming(&self, block: BlockId) -> Option<Value> {
        self.operands
            .iter()
            .find(|op| op.block == block)
            .map(|op| op.value)
    }

    /// Removes the operand for `block`, returning its value.
    pub fn remove_incoming(&mut self, block: BlockId) -> Option<Value> {
        let pos = self.operands.iter().position(|op| op.block == block)?;
        Some(self.operands.remove(pos).value)
    }

    /// Renames the predecessor of an operand from `old` to `new`.
    pub fn rename_incoming(&mut self, old: BlockId, new: BlockId) {
        for op in &mut self.operands {
            if op.block == old {
                op.block = new;
            }
        }
    }

    /// Calls `f` on every incoming value.
    pub fn for_each_value_mut(&mut self, mut f: impl FnMut(&mut Value)) {
        for op in &mut self.operands {
            f(&mut op.value);
        }
    }

    /// Returns the value this phi trivially merges, if it is trivial.
    ///
    /// `this` is the instruction defining the phi. Operands referring to the phi
    /// itself are ignored; if at most one distinct value remains the phi is
    /// trivial and that value (or [`Value::Undef`] if none remains) is returned.
    #[must_use]
    pub fn trivial_value(&self, this: InstId) -> Option<Value> {
        let mut same: Option<Value> = None;
        for op in &self.operands {
            if op.value == Value::Inst(this) || Some(op.value) == same {
                continue;
            }
            if same.is_some() {
                return None;
            }
            same = Some(op.value);
        }
        Some(same.unwrap_or(Value::Undef))
    }
}

impl fmt::Display for PhiNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("phi")?;
        for (i, operand) in self.operands.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, " {operand}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phi_operand_display() {
        let operand = PhiOperand::new(BlockId::new(1), Value::Inst(InstId::new(3)));
        assert_eq!(format!("{operand}"), "[bb1: %3]");
    }

    #[test]
    fn test_phi_set_and_remove_incoming() {
        let mut phi = PhiNode::new();
        phi.set_incoming(BlockId::new(0), Value::int(1));
        phi.set_incoming(BlockId::new(2), Value::int(2));
        phi.set_incoming(BlockId::new(0), Value::int(3));

        assert_eq!(phi.operand_count(), 2);
        assert_eq!(phi.incoming(BlockId::new(0)), Some(Value::int(3)));
        assert_eq!(phi.remove_incoming(BlockId::new(2)), Some(Value::int(2)));
        assert_eq!(phi.remove_incoming(BlockId::new(2)), None);
        assert_eq!(format!("{phi}"), "phi [bb0: 3]");
    }

    #[test]
    fn test_phi_trivial_value() {
        let this = InstId::new(7);
        let x = Value::Inst(InstId::new(1));

        let mut phi = PhiNode::new();
        assert_eq!(phi.trivial_value(this), Some(Value::Undef));

        phi.set_incoming(BlockId::new(0), x);
        phi.set_incoming(BlockId::new(1), Value::Inst(this));
        phi.set_incoming(BlockId::new(2), x);
        assert_eq!(phi.trivial_value(this), Some(x));

        phi.set_incoming(BlockId::new(3), Value::int(0));
        assert_eq!(phi.trivial_value(this), None);
    }

    #[test]
    fn test_phi_undef_is_distinct() {
        let mut phi = PhiNode::new();
        phi.set_incoming(BlockId::new(0), Value::Undef);
        phi.set_incoming(BlockId::new(1), Value::int(4));
        assert_eq!(phi.trivial_value(InstId::new(0)), None);
    }
}

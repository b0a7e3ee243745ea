//! Instructions and terminators.
//!
//! Every instruction is one variant of the closed [`InstKind`] enum; passes
//! dispatch on it with exhaustive `match`es. Terminators are kept apart from
//! ordinary instructions so a block can hold at most one of them.

use std::fmt;

use strum::{EnumIter, IntoStaticStr};

use crate::ir::{BlockId, PhiNode, Value};

/// Two-operand integer arithmetic and bitwise operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, IntoStaticStr)]
#[strum(serialize_all = "lowercase")]
pub enum BinaryOp {
    /// Wrapping addition
    Add,
    /// Wrapping subtraction
    Sub,
    /// Wrapping multiplication
    Mul,
    /// Signed division
    SDiv,
    /// Unsigned division
    UDiv,
    /// Signed remainder
    SRem,
    /// Unsigned remainder
    URem,
    /// Bitwise and
    And,
    /// Bitwise or
    Or,
    /// Bitwise exclusive or
    Xor,
    /// Shift left
    Shl,
    /// Logical shift right
    LShr,
    /// Arithmetic shift right
    AShr,
}

impl BinaryOp {
    /// Returns `true` for the division and remainder operations, which trap on
    /// a zero divisor.
    #[must_use]
    pub const fn is_division(self) -> bool {
        matches!(
            self,
            BinaryOp::SDiv | BinaryOp::UDiv | BinaryOp::SRem | BinaryOp::URem
        )
    }

    /// Returns `true` for the signed division and remainder operations, which
    /// additionally overflow for `i64::MIN / -1`.
    #[must_use]
    pub const fn is_signed_division(self) -> bool {
        matches!(self, BinaryOp::SDiv | BinaryOp::SRem)
    }
}

/// Integer comparison predicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, IntoStaticStr)]
#[strum(serialize_all = "lowercase")]
#[allow(missing_docs)]
pub enum IcmpPred {
    Eq,
    Ne,
    Slt,
    Sle,
    Sgt,
    Sge,
    Ult,
    Ule,
    Ugt,
    Uge,
}

/// Integer width conversions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, IntoStaticStr)]
#[strum(serialize_all = "lowercase")]
pub enum CastOp {
    /// Keep the low bits
    Trunc,
    /// Zero-extend from the given width
    ZExt,
    /// Sign-extend from the given width
    SExt,
}

/// The operation performed by an instruction, with its operands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstKind {
    /// Integer arithmetic or bitwise operation.
    Binary {
        /// The operation
        op: BinaryOp,
        /// Left operand
        lhs: Value,
        /// Right operand
        rhs: Value,
    },
    /// Integer comparison producing a boolean.
    Icmp {
        /// The predicate
        pred: IcmpPred,
        /// Left operand
        lhs: Value,
        /// Right operand
        rhs: Value,
    },
    /// Width conversion.
    Cast {
        /// The conversion
        op: CastOp,
        /// The converted value
        value: Value,
        /// Bit width the conversion operates on (1..=64)
        bits: u8,
    },
    /// `cond ? then_value : else_value`.
    Select {
        /// The condition
        cond: Value,
        /// Result if `cond` is true
        then_value: Value,
        /// Result if `cond` is false
        else_value: Value,
    },
    /// Address computation `base + index`.
    Gep {
        /// Base address
        base: Value,
        /// Element offset
        index: Value,
    },
    /// Memory read.
    Load {
        /// Address to read
        addr: Value,
    },
    /// Memory write.
    Store {
        /// Address to write
        addr: Value,
        /// Value to write
        value: Value,
    },
    /// Call of a named function.
    Call {
        /// Name of the callee
        callee: String,
        /// Argument values
        args: Vec<Value>,
    },
    /// Stack allocation of one local slot.
    Alloca,
    /// SSA merge of values from predecessors.
    Phi(PhiNode),
}

impl InstKind {
    /// Returns the mnemonic of this instruction.
    #[must_use]
    pub fn opcode(&self) -> &'static str {
        match self {
            InstKind::Binary { op, .. } => op.into(),
            InstKind::Icmp { .. } => "icmp",
            InstKind::Cast { op, .. } => op.into(),
            InstKind::Select { .. } => "select",
            InstKind::Gep { .. } => "gep",
            InstKind::Load { .. } => "load",
            InstKind::Store { .. } => "store",
            InstKind::Call { .. } => "call",
            InstKind::Alloca => "alloca",
            InstKind::Phi(_) => "phi",
        }
    }

    /// Returns the operands in order. Phi operands are listed in predecessor
    /// order.
    #[must_use]
    pub fn operands(&self) -> Vec<Value> {
        match self {
            InstKind::Binary { lhs, rhs, .. } | InstKind::Icmp { lhs, rhs, .. } => {
                vec![*lhs, *rhs]
            }
            InstKind::Cast { value, .. } => vec![*value],
            InstKind::Select {
                cond,
                then_value,
                else_value,
            } => vec![*cond, *then_value, *else_value],
            InstKind::Gep { base, index } => vec![*base, *index],
            InstKind::Load { addr } => vec![*addr],
            InstKind::Store { addr, value } => vec![*addr, *value],
            InstKind::Call { args, .. } => args.clone(),
            InstKind::Alloca => Vec::new(),
            InstKind::Phi(phi) => phi.operands().iter().map(|op| op.value()).collect(),
        }
    }

    /// Calls `f` on every operand slot.
    pub fn for_each_operand_mut(&mut self, mut f: impl FnMut(&mut Value)) {
        match self {
            InstKind::Binary { lhs, rhs, .. } | InstKind::Icmp { lhs, rhs, .. } => {
                f(lhs);
                f(rhs);
            }
            InstKind::Cast { value, .. } => f(value),
            InstKind::Select {
                cond,
                then_value,
                else_value,
            } => {
                f(cond);
                f(then_value);
                f(else_value);
            }
            InstKind::Gep { base, index } => {
                f(base);
                f(index);
            }
            InstKind::Load { addr } => f(addr),
            InstKind::Store { addr, value } => {
                f(addr);
                f(value);
            }
            InstKind::Call { args, .. } => args.iter_mut().for_each(f),
            InstKind::Alloca => {}
            InstKind::Phi(phi) => phi.for_each_value_mut(f),
        }
    }

    /// Returns `true` if the instruction produces a value.
    #[must_use]
    pub const fn has_result(&self) -> bool {
        !matches!(self, InstKind::Store { .. })
    }

    /// Returns `true` for phi nodes.
    #[must_use]
    pub const fn is_phi(&self) -> bool {
        matches!(self, InstKind::Phi(_))
    }

    /// Returns the phi node, if this is one.
    #[must_use]
    pub const fn as_phi(&self) -> Option<&PhiNode> {
        match self {
            InstKind::Phi(phi) => Some(phi),
            _ => None,
        }
    }

    /// Returns the phi node mutably, if this is one.
    pub fn as_phi_mut(&mut self) -> Option<&mut PhiNode> {
        match self {
            InstKind::Phi(phi) => Some(phi),
            _ => None,
        }
    }

    /// Returns `true` if the kind may be moved out of a loop at all:
    /// arithmetic and bitwise operations, casts, selects, address
    /// computations and comparisons. Memory accesses, calls, stack
    /// allocations and phis never are.
    #[must_use]
    pub const fn is_hoistable(&self) -> bool {
        matches!(
            self,
            InstKind::Binary { .. }
                | InstKind::Cast { .. }
                | InstKind::Select { .. }
                | InstKind::Gep { .. }
                | InstKind::Icmp { .. }
        )
    }

    /// Returns `true` if executing the instruction on a path where it was not
    /// executed before can neither trap nor have side effects.
    ///
    /// Division and remainder are only safe with a constant, non-zero divisor
    /// (and, for the signed forms, a divisor other than -1).
    #[must_use]
    pub fn is_safe_to_speculate(&self) -> bool {
        match self {
            InstKind::Binary { op, rhs, .. } if op.is_division() => match rhs.as_const() {
                Some(c) => {
                    let divisor = c.as_int();
                    divisor != 0 && !(op.is_signed_division() && divisor == -1)
                }
                None => false,
            },
            InstKind::Binary { .. }
            | InstKind::Icmp { .. }
            | InstKind::Cast { .. }
            | InstKind::Select { .. }
            | InstKind::Gep { .. } => true,
            InstKind::Load { .. }
            | InstKind::Store { .. }
            | InstKind::Call { .. }
            | InstKind::Alloca
            | InstKind::Phi(_) => false,
        }
    }
}

impl fmt::Display for InstKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InstKind::Binary { op, lhs, rhs } => {
                write!(f, "{} {lhs}, {rhs}", <&str>::from(op))
            }
            InstKind::Icmp { pred, lhs, rhs } => {
                write!(f, "icmp {} {lhs}, {rhs}", <&str>::from(pred))
            }
            InstKind::Cast { op, value, bits } => {
                write!(f, "{} {value}, i{bits}", <&str>::from(op))
            }
            InstKind::Select {
                cond,
                then_value,
                else_value,
            } => write!(f, "select {cond}, {then_value}, {else_value}"),
            InstKind::Gep { base, index } => write!(f, "gep {base}, {index}"),
            InstKind::Load { addr } => write!(f, "load {addr}"),
            InstKind::Store { addr, value } => write!(f, "store {value}, {addr}"),
            InstKind::Call { callee, args } => {
                write!(f, "call @{callee}(")?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{arg}")?;
                }
                f.write_str(")")
            }
            InstKind::Alloca => f.write_str("alloca"),
            InstKind::Phi(phi) => write!(f, "{phi}"),
        }
    }
}

/// An instruction together with the block that owns it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    pub(crate) kind: InstKind,
    pub(crate) block: BlockId,
}

impl Instruction {
    /// Returns what the instruction computes.
    #[must_use]
    pub fn kind(&self) -> &InstKind {
        &self.kind
    }

    /// Returns the owning block.
    #[must_use]
    pub fn block(&self) -> BlockId {
        self.block
    }
}

/// The instruction ending a basic block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Terminator {
    /// Unconditional jump.
    Branch(BlockId),
    /// Two-way conditional jump.
    CondBranch {
        /// Branch condition
        cond: Value,
        /// Successor taken if `cond` is true
        then_block: BlockId,
        /// Successor taken if `cond` is false
        else_block: BlockId,
    },
    /// Function return, with an optional value.
    Return(Option<Value>),
}

impl Terminator {
    /// Returns the distinct successor blocks in branch order.
    pub fn successors(&self) -> impl Iterator<Item = BlockId> {
        let (first, second) = match *self {
            Terminator::Branch(target) => (Some(target), None),
            Terminator::CondBranch {
                then_block,
                else_block,
                ..
            } => (
                Some(then_block),
                (else_block != then_block).then_some(else_block),
            ),
            Terminator::Return(_) => (None, None),
        };
        first.into_iter().chain(second)
    }

    /// Returns the value operands.
    #[must_use]
    pub fn operands(&self) -> Vec<Value> {
        match self {
            Terminator::CondBranch { cond, .. } => vec![*cond],
            Terminator::Return(Some(value)) => vec![*value],
            Terminator::Branch(_) | Terminator::Return(None) => Vec::new(),
        }
    }

    /// Calls `f` on every value operand slot.
    pub fn for_each_operand_mut(&mut self, mut f: impl FnMut(&mut Value)) {
        match self {
            Terminator::CondBranch { cond, .. } => f(cond),
            Terminator::Return(Some(value)) => f(value),
            Terminator::Branch(_) | Terminator::Return(None) => {}
        }
    }

    /// Redirects every edge to `old` so that it targets `new` instead.
    pub fn retarget(&mut self, old: BlockId, new: BlockId) {
        match self {
            Terminator::Branch(target) => {
                if *target == old {
                    *target = new;
                }
            }
            Terminator::CondBranch {
                then_block,
                else_block,
                ..
            } => {
                if *then_block == old {
                    *then_block = new;
                }
                if *else_block == old {
                    *else_block = new;
                }
            }
            Terminator::Return(_) => {}
        }
    }
}

impl fmt::Display for Terminator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Terminator::Branch(target) => write!(f, "br {target}"),
            Terminator::CondBranch {
                cond,
                then_block,
                else_block,
            } => write!(f, "br {cond}, {then_block}, {else_block}"),
            Terminator::Return(Some(value)) => write!(f, "ret {value}"),
            Terminator::Return(None) => f.write_str("ret"),
        }
    }
}

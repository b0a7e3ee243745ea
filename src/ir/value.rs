//! Handles and operand values.

use std::fmt;

use crate::utils::graph::NodeId;

/// Stable handle of a basic block within its [`Function`](crate::ir::Function).
///
/// A handle stays valid until the block is deleted; deleted handles are never
/// reused within the same function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BlockId(pub(crate) u32);

impl BlockId {
    /// Creates a block handle from a raw index.
    #[must_use]
    pub const fn new(index: u32) -> Self {
        BlockId(index)
    }

    /// Returns the raw index of this block.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "bb{}", self.0)
    }
}

impl From<BlockId> for NodeId {
    fn from(block: BlockId) -> Self {
        NodeId::new(block.index())
    }
}

impl From<NodeId> for BlockId {
    fn from(node: NodeId) -> Self {
        // Node ids of a function graph are always block indices
        #[allow(clippy::cast_possible_truncation)]
        BlockId(node.index() as u32)
    }
}

/// Stable handle of an instruction within its [`Function`](crate::ir::Function).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct InstId(pub(crate) u32);

impl InstId {
    /// Creates an instruction handle from a raw index.
    #[must_use]
    pub const fn new(index: u32) -> Self {
        InstId(index)
    }

    /// Returns the raw index of this instruction.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for InstId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "%{}", self.0)
    }
}

/// A compile-time constant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Constant {
    /// 64-bit integer; narrower types are represented sign-extended.
    Int(i64),
    /// Boolean (the result type of comparisons).
    Bool(bool),
}

impl Constant {
    /// Returns the integer payload, treating booleans as 0/1.
    #[must_use]
    pub fn as_int(self) -> i64 {
        match self {
            Constant::Int(v) => v,
            Constant::Bool(b) => i64::from(b),
        }
    }

    /// Returns the truth value, treating any non-zero integer as `true`.
    #[must_use]
    pub fn as_bool(self) -> bool {
        match self {
            Constant::Int(v) => v != 0,
            Constant::Bool(b) => b,
        }
    }
}

impl fmt::Display for Constant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constant::Int(v) => write!(f, "{v}"),
            Constant::Bool(b) => write!(f, "{b}"),
        }
    }
}

/// An operand: a literal constant, the result of another instruction, a
/// function argument or `undef`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Value {
    /// A literal constant.
    Const(Constant),
    /// The result of an instruction.
    Inst(InstId),
    /// The n-th function argument.
    Arg(u32),
    /// An unspecified value, produced by reads that no definition reaches.
    Undef,
}

impl Value {
    /// Shorthand for an integer constant.
    #[must_use]
    pub const fn int(value: i64) -> Self {
        Value::Const(Constant::Int(value))
    }

    /// Shorthand for a boolean constant.
    #[must_use]
    pub const fn bool(value: bool) -> Self {
        Value::Const(Constant::Bool(value))
    }

    /// Returns the defining instruction, if this value is an instruction result.
    #[must_use]
    pub const fn as_inst(self) -> Option<InstId> {
        match self {
            Value::Inst(id) => Some(id),
            _ => None,
        }
    }

    /// Returns the constant, if this value is a literal.
    #[must_use]
    pub const fn as_const(self) -> Option<Constant> {
        match self {
            Value::Const(c) => Some(c),
            _ => None,
        }
    }

    /// Returns `true` if this value is a literal constant.
    #[must_use]
    pub const fn is_const(self) -> bool {
        matches!(self, Value::Const(_))
    }
}

impl From<InstId> for Value {
    fn from(id: InstId) -> Self {
        Value::Inst(id)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Const(c) => write!(f, "{c}"),
            Value::Inst(id) => write!(f, "{id}"),
            Value::Arg(n) => write!(f, "%arg{n}"),
            Value::Undef => f.write_str("undef"),
        }
    }
}

//! The intermediate representation the back end operates on.
//!
//! A [`Function`] is a control flow graph of [`BasicBlock`]s in SSA form. Blocks
//! and instructions live in per-function arenas and are referred to by the
//! stable handles [`BlockId`] and [`InstId`]:
//!
//! ```text
//! function @f(%arg0) {
//! bb0:
//!     %0 = icmp slt %arg0, 10
//!     br %0, bb1, bb2
//! bb1:  ; preds = bb0
//!     %1 = add %arg0, 1
//!     br bb2
//! bb2:  ; preds = bb0 bb1
//!     %2 = phi [bb0: %arg0], [bb1: %1]
//!     ret %2
//! }
//! ```
//!
//! Functions are normally produced with a [`FunctionBuilder`], which performs
//! SSA construction while the front end emits code.

mod block;
mod builder;
mod function;
mod instruction;
mod phi;
mod value;

pub use block::BasicBlock;
pub use builder::FunctionBuilder;
pub use function::Function;
pub use instruction::{BinaryOp, CastOp, IcmpPred, InstKind, Instruction, Terminator};
pub use phi::{PhiNode, PhiOperand};
pub use value::{BlockId, Constant, InstId, Value};

use thiserror::Error;

use crate::{ir::BlockId, regalloc::VirtReg};

macro_rules! malformed_error {
    // Single string version
    ($msg:expr) => {
        crate::Error::Malformed {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    // Format string with arguments version
    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::Malformed {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

/// The generic Error type, which covers every failure this library can report.
///
/// Every transformation in this crate is deterministic and total on a
/// structurally valid CFG, so an error always means that an earlier stage
/// produced something it must not have produced. None of these conditions are
/// retried; the surrounding compiler driver is expected to report them as a hard
/// compilation failure for the function at hand.
///
/// # Error Categories
///
/// ## Contract violations
/// - [`Error::Malformed`] - Structurally invalid CFG (missing terminator, phi arity, ...)
/// - [`Error::SealedBlock`] - An edge was added into a block that was already sealed
/// - [`Error::MissingPreheader`] - A loop reached LICM without a preheader
/// - [`Error::PassOrder`] - A pass was scheduled before a pass it depends on
///
/// ## Allocation
/// - [`Error::AllocationFailed`] - A register could neither be assigned nor spilled
/// - [`Error::NotSupported`] - The target description can not be used for allocation
///
/// # Examples
///
/// ```rust
/// use ssaopt::{compile_function, CompilerConfig, Error, FunctionBuilder};
///
/// let mut builder = FunctionBuilder::new("empty", 0);
/// builder.ret(None).unwrap();
/// let func = builder.finish().unwrap();
///
/// match compile_function(func, &CompilerConfig::default()) {
///     Ok(compiled) => println!("{}", compiled.function),
///     Err(Error::AllocationFailed(vreg)) => eprintln!("cannot allocate {vreg}"),
///     Err(e) => eprintln!("{e}"),
/// }
/// ```
#[derive(Error, Debug)]
pub enum Error {
    /// The function is structurally invalid and could not be processed.
    ///
    /// The error includes the source location where the malformation was
    /// detected, which points at the pass whose precondition was violated.
    #[error("Malformed - {file}:{line}: {message}")]
    Malformed {
        /// The message to be printed for the Malformed error
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// A new predecessor edge targets a block that was already sealed.
    #[error("Block {0} is sealed and can not gain new predecessors")]
    SealedBlock(BlockId),

    /// LICM was asked to process a loop that has no preheader.
    ///
    /// The associated [`BlockId`] is the loop header.
    #[error("Loop with header {0} has no preheader")]
    MissingPreheader(BlockId),

    /// A pass was scheduled before one of the passes it requires.
    #[error("Pass '{pass}' requires '{requires}' to run first")]
    PassOrder {
        /// The pass that could not run
        pass: &'static str,
        /// The pass that has to run before it
        requires: &'static str,
    },

    /// A virtual register could not be assigned and is not spillable.
    #[error("Ran out of registers during allocation of {0}")]
    AllocationFailed(VirtReg),

    /// The target description can not be used (e.g. an empty register class).
    #[error("This target description is not supported")]
    NotSupported,
}

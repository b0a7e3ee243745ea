// Copyright 2025 Johann Kempter
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]
#![deny(unsafe_code)]

//! # ssaopt
//!
//! The middle and back end of a small compiler: SSA construction, CFG cleanup,
//! loop-invariant code motion and register allocation over an arena-based IR.
//!
//! ## Features
//!
//! - **On-the-fly SSA construction** - Braun et al., with sealing and trivial
//!   phi removal, driven directly by the front end
//! - **CFG cleanup** - constant folding, constant branch folding and
//!   unreachable block deletion with phi maintenance
//! - **Loop optimizations** - natural loop detection, preheader insertion and
//!   loop-invariant code motion
//! - **Register allocation** - live intervals, interference graph
//!   simplification, priority-driven assignment with eviction and spilling
//!
//! ## Quick Start
//!
//! ```rust
//! use ssaopt::{
//!     compile_function, ir::{BinaryOp, IcmpPred, Value}, ssa::Variable, CompilerConfig,
//!     FunctionBuilder,
//! };
//!
//! // sum = 0; i = 0; while (i < n) { sum = sum + i * 2; i = i + 1 }; return sum
//! let (sum, i) = (Variable(0), Variable(1));
//! let mut b = FunctionBuilder::new("sum", 1);
//! b.def_var(sum, Value::int(0));
//! b.def_var(i, Value::int(0));
//!
//! let header = b.create_block();
//! let body = b.create_block();
//! let exit = b.create_block();
//! b.br(header)?;
//!
//! b.switch_to(header)?;
//! let iv = b.use_var(i)?;
//! let cond = b.icmp(IcmpPred::Slt, iv, b.arg(0))?;
//! b.cond_br(cond, body, exit)?;
//! b.seal(body)?;
//! b.seal(exit)?;
//!
//! b.switch_to(body)?;
//! let iv = b.use_var(i)?;
//! let twice = b.binary(BinaryOp::Mul, iv, Value::int(2))?;
//! let acc = b.use_var(sum)?;
//! let acc = b.binary(BinaryOp::Add, acc, twice)?;
//! b.def_var(sum, acc);
//! let next = b.binary(BinaryOp::Add, iv, Value::int(1))?;
//! b.def_var(i, next);
//! b.br(header)?;
//! b.seal(header)?;
//!
//! b.switch_to(exit)?;
//! let result = b.use_var(sum)?;
//! b.ret(Some(result))?;
//!
//! let compiled = compile_function(b.finish()?, &CompilerConfig::default())?;
//! println!("{}", compiled.function);
//! # Ok::<(), ssaopt::Error>(())
//! ```
//!
//! ## Architecture
//!
//! - [`ir`] - functions, blocks, instructions and the [`FunctionBuilder`]
//! - [`ssa`] - the SSA construction algorithm behind the builder
//! - [`analysis`] - loop detection and liveness
//! - [`compiler`] - the pass interface, the passes and [`compile_function`]
//! - [`regalloc`] - live intervals and the register allocator
//! - [`utils`] - bit sets and generic graph algorithms
//! - [`Error`] and [`Result`] - error handling
//!
//! ## Error Handling
//!
//! All operations return [`Result<T, Error>`](Result). Errors signal contract
//! violations by an earlier stage or an allocation that could not be
//! completed:
//!
//! ```rust
//! use ssaopt::{Error, FunctionBuilder};
//!
//! let b = FunctionBuilder::new("open", 0);
//! match b.finish() {
//!     Ok(func) => println!("{func}"),
//!     Err(Error::Malformed { message, .. }) => println!("Malformed: {}", message),
//!     Err(e) => println!("Other error: {}", e),
//! }
//! ```

#[macro_use]
pub(crate) mod error;

/// Shared data structures: bit sets and generic graph algorithms.
pub mod utils;

/// The arena-based intermediate representation.
pub mod ir;

/// On-the-fly SSA construction.
pub mod ssa;

/// Loop detection and liveness analysis.
pub mod analysis;

/// Optimization passes, pass scheduling and the compilation pipeline.
pub mod compiler;

/// Live intervals and register allocation.
pub mod regalloc;

/// `ssaopt` Result type
///
/// A type alias for [`std::result::Result<T, Error>`] where the error type is always [`Error`].
/// This is used consistently throughout the crate for all fallible operations.
pub type Result<T> = std::result::Result<T, Error>;

/// `ssaopt` Error type
///
/// The main error type for all operations in this crate.
pub use error::Error;

/// Builds a function in SSA form.
///
/// See [`ir::FunctionBuilder`].
pub use ir::FunctionBuilder;

/// Runs the standard pipeline over one function.
///
/// See [`compiler::compile_function`].
pub use compiler::{compile_function, CompiledFunction, CompilerConfig};

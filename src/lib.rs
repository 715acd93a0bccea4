// Copyright 2025 The ropt Authors
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

//! # ropt
//!
//! A register-IR SSA construction and optimization engine for
//! bytecode-to-bytecode compilers.
//!
//! `ropt` ingests a control-flow graph of register-based instructions (the
//! "rop" form an upstream translator produces from parsed bytecode),
//! converts it to static single assignment form, optimizes it, and hands
//! the result to a downstream register allocator / back-converter. It
//! implements exactly the pass set a translator with modest optimization
//! ambitions needs:
//!
//! - **Dominator computation** - two-pass Lengauer-Tarjan, forward and
//!   reverse (postdominance)
//! - **Dominance frontiers** and liveness-pruned **phi placement**
//! - **CFG normalization** - predecessor, exception-capture, and critical
//!   edge splitting
//! - **SSA renaming** with move elision and local-variable preservation
//! - **Sparse conditional constant propagation** over interleaved constant
//!   and reachability lattices
//! - **Dead code elimination**, including closed def/use cycles
//!
//! ## Quick Start
//!
//! ```rust
//! use ropt::prelude::*;
//!
//! // A one-block method: load 5, return it.
//! let block = RopBlock::new(
//!     0,
//!     vec![
//!         Insn::new_const(0, Constant::Int(5)),
//!         Insn::new(
//!             Opcode::Return,
//!             None,
//!             vec![RegisterSpec::new(0, TypeBearer::Type(Type::Int))],
//!         ),
//!     ],
//!     Vec::new(),
//!     None,
//! );
//! let method = RopMethod::new(vec![block], 0, 0, true);
//!
//! let ssa = optimize(&method, &OptimizationContext::default())?;
//! assert!(ssa.reg_count() > 0);
//! # Ok::<(), ropt::Error>(())
//! ```
//!
//! ## Processing Model
//!
//! The engine is single-threaded per method: every pass mutates shared
//! graph state (instruction lists, def/use indices) without internal
//! synchronization. Methods are independent units of work, and
//! [`opt::optimize_all`] processes a batch on a worker pool with one
//! method's failure isolated from its siblings.
//!
//! ## Error Handling
//!
//! All fallible operations return [`Result<T>`](Result). Malformed input
//! graphs and unsupported constructs are fatal for the affected method;
//! there is no partial-success mode. Capacity conditions (the register
//! count outgrowing a back-conversion strategy) are not errors: read
//! [`ssa::SsaMethod::reg_count`] after optimization and decide whether to
//! re-run with a reduced pass set.

#[macro_use]
pub(crate) mod error;

pub mod opt;
pub mod rop;
pub mod ssa;
pub mod utils;

/// Convenient re-exports of the most commonly used types.
///
/// # Example
///
/// ```rust,no_run
/// use ropt::prelude::*;
///
/// let ctx = OptimizationContext::default();
/// ```
pub mod prelude;

pub use error::Error;

/// The result type used throughout `ropt`.
pub type Result<T> = std::result::Result<T, Error>;

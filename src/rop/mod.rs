//! The register-based input/output IR.
//!
//! "Rop" form is the non-SSA register IR the engine accepts and (after the
//! downstream back-conversion) produces: basic blocks addressed by stable
//! labels, instructions reading and writing numbered registers, with
//! debug-level local-variable bindings attached to register operands.

mod insn;
mod method;
mod op;
mod reg;
mod types;

pub use insn::Insn;
pub use method::{RopBlock, RopMethod};
pub use op::{BinOp, Branchingness, Cmp, Opcode, UnOp};
pub use reg::{Interner, LocalInfo, RegisterSpec};
pub use types::{Constant, Type, TypeBearer};

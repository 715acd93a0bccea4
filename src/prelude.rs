//! # ropt Prelude
//!
//! A convenient prelude re-exporting the types needed for the common
//! "build a rop method, optimize it, inspect the SSA output" flow.

/// The main error type for all engine operations.
pub use crate::Error;

/// The result type used throughout the engine.
pub use crate::Result;

/// The register IR data model.
pub use crate::rop::{
    BinOp, Branchingness, Cmp, Constant, Insn, Interner, LocalInfo, Opcode, RegisterSpec,
    RopBlock, RopMethod, Type, TypeBearer, UnOp,
};

/// SSA form and its construction entry points.
pub use crate::ssa::{
    convert_to_ssa, update_ssa, DomFront, DomTree, InsnSite, PhiInsn, PhiOperand, SsaBasicBlock,
    SsaInsn, SsaMethod,
};

/// The optimization pipeline and its configuration.
pub use crate::opt::{
    optimize, optimize_all, DeadCodeRemover, NeverAdvice, OptimizationContext, Sccp,
    TranslationAdvice,
};

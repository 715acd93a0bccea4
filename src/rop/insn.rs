//! Register IR instructions.

use std::fmt;

use crate::rop::op::{Branchingness, Opcode};
use crate::rop::reg::RegisterSpec;
use crate::rop::types::{Constant, Type};

/// A single register IR instruction.
///
/// An instruction is an opcode, at most one result register, an ordered
/// list of source registers, and (for throwing instructions) the list of
/// exception types caught along the block's handler edges. A `Const`
/// instruction carries its value in the result spec's bearer rather than a
/// separate field, so constant knowledge travels with the register operand.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Insn {
    /// The opcode.
    pub opcode: Opcode,
    /// The result register, if the instruction defines one.
    pub result: Option<RegisterSpec>,
    /// The source registers, in operand order.
    pub sources: Vec<RegisterSpec>,
    /// For throwing instructions, the exception types caught by the block's
    /// handler successors, in successor order.
    pub catches: Vec<Type>,
}

impl Insn {
    /// Creates a non-throwing instruction.
    #[must_use]
    pub fn new(opcode: Opcode, result: Option<RegisterSpec>, sources: Vec<RegisterSpec>) -> Self {
        Self {
            opcode,
            result,
            sources,
            catches: Vec::new(),
        }
    }

    /// Creates a constant load. The constant is stored in the result
    /// bearer.
    #[must_use]
    pub fn new_const(result_reg: u32, value: Constant) -> Self {
        Self::new(
            Opcode::Const,
            Some(RegisterSpec::new(
                result_reg,
                crate::rop::types::TypeBearer::Constant(value),
            )),
            Vec::new(),
        )
    }

    /// Returns the branchingness of this instruction's opcode.
    #[must_use]
    pub fn branchingness(&self) -> Branchingness {
        self.opcode.branchingness()
    }

    /// Returns the constant loaded by this instruction, if it is a `Const`.
    #[must_use]
    pub fn constant(&self) -> Option<&Constant> {
        match self.opcode {
            Opcode::Const => self.result.as_ref().and_then(|r| r.bearer.constant()),
            _ => None,
        }
    }

    /// Returns `true` if executing this instruction has an observable
    /// effect beyond writing its result register.
    ///
    /// Control transfers, returns, throws, calls, and potentially-throwing
    /// arithmetic all have effects; straight-line register computation does
    /// not. Local-variable preservation is a per-run policy layered on top
    /// by the caller, not part of this predicate.
    #[must_use]
    pub fn has_side_effect(&self) -> bool {
        self.branchingness() != Branchingness::None
    }
}

impl fmt::Display for Insn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(result) = &self.result {
            write!(f, "{result} <- ")?;
        }
        write!(f, "{}", self.opcode)?;
        for (i, src) in self.sources.iter().enumerate() {
            if i == 0 {
                write!(f, " ")?;
            } else {
                write!(f, ", ")?;
            }
            write!(f, "{src}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rop::op::BinOp;
    use crate::rop::types::TypeBearer;

    #[test]
    fn test_const_insn_carries_value() {
        let insn = Insn::new_const(0, Constant::Int(42));
        assert_eq!(insn.constant(), Some(&Constant::Int(42)));
        assert!(!insn.has_side_effect());
    }

    #[test]
    fn test_side_effects() {
        let add = Insn::new(
            Opcode::BinOp(BinOp::Add),
            Some(RegisterSpec::new(2, TypeBearer::Type(Type::Int))),
            vec![
                RegisterSpec::new(0, TypeBearer::Type(Type::Int)),
                RegisterSpec::new(1, TypeBearer::Type(Type::Int)),
            ],
        );
        let div = Insn::new(
            Opcode::BinOp(BinOp::Div),
            Some(RegisterSpec::new(2, TypeBearer::Type(Type::Int))),
            vec![
                RegisterSpec::new(0, TypeBearer::Type(Type::Int)),
                RegisterSpec::new(1, TypeBearer::Type(Type::Int)),
            ],
        );
        let ret = Insn::new(Opcode::Return, None, Vec::new());

        assert!(!add.has_side_effect());
        assert!(div.has_side_effect());
        assert!(ret.has_side_effect());
    }

    #[test]
    fn test_display() {
        let insn = Insn::new(
            Opcode::BinOp(BinOp::Add),
            Some(RegisterSpec::new(2, TypeBearer::Type(Type::Int))),
            vec![
                RegisterSpec::new(0, TypeBearer::Type(Type::Int)),
                RegisterSpec::new(1, TypeBearer::Type(Type::Int)),
            ],
        );
        assert_eq!(insn.to_string(), "v2:Int <- add v0:Int, v1:Int");
    }
}

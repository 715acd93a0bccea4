//! SSA-form instructions.
//!
//! SSA form wraps the register IR's instructions in [`SsaInsn`], adding the
//! synthetic [`PhiInsn`] shape. Phis have no real opcode, one operand per
//! incoming control-flow edge, and cannot throw; everything a pass needs to
//! know about an instruction (result, sources, side effects) is answered
//! uniformly through [`SsaInsn`] so the passes are plain `match`-driven
//! visitors.

use std::fmt;

use crate::rop::{Branchingness, Insn, RegisterSpec};
use crate::{Error, Result};

/// One incoming value of a phi.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhiOperand {
    /// The SSA register live along the edge.
    pub spec: RegisterSpec,
    /// Index of the predecessor block the edge comes from.
    pub pred: usize,
}

/// A synthetic merge instruction, one operand per predecessor edge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhiInsn {
    /// The result register.
    pub result: RegisterSpec,
    /// The pre-SSA register this phi merges; used to match mapping entries
    /// during renaming.
    pub orig_reg: u32,
    /// The incoming operands. Order is insertion order, not predecessor
    /// order; each operand names its edge explicitly.
    pub operands: Vec<PhiOperand>,
}

impl PhiInsn {
    /// Creates a phi with no operands yet.
    #[must_use]
    pub fn new(result: RegisterSpec, orig_reg: u32) -> Self {
        Self {
            result,
            orig_reg,
            operands: Vec::new(),
        }
    }

    /// Adds an operand for the edge from `pred`.
    pub fn add_operand(&mut self, spec: RegisterSpec, pred: usize) {
        self.operands.push(PhiOperand { spec, pred });
    }

    /// Removes all operands arriving from `pred`.
    pub fn remove_operands_for_pred(&mut self, pred: usize) {
        self.operands.retain(|op| op.pred != pred);
    }

    /// Returns the operand arriving from `pred`, if present.
    #[must_use]
    pub fn operand_for_pred(&self, pred: usize) -> Option<&PhiOperand> {
        self.operands.iter().find(|op| op.pred == pred)
    }

    /// Returns `true` if any operand reads `reg`.
    #[must_use]
    pub fn uses_reg(&self, reg: u32) -> bool {
        self.operands.iter().any(|op| op.spec.reg == reg)
    }
}

impl fmt::Display for PhiInsn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} <- phi", self.result)?;
        for (i, op) in self.operands.iter().enumerate() {
            if i == 0 {
                write!(f, " ")?;
            } else {
                write!(f, ", ")?;
            }
            write!(f, "{}[b{}]", op.spec, op.pred)?;
        }
        Ok(())
    }
}

/// An instruction in SSA form: either a wrapped register IR instruction or
/// a synthetic phi.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SsaInsn {
    /// A real instruction carried over from the register IR.
    Normal(Insn),
    /// A synthetic merge instruction.
    Phi(PhiInsn),
}

impl SsaInsn {
    /// Returns the result register, if the instruction defines one.
    #[must_use]
    pub fn result(&self) -> Option<&RegisterSpec> {
        match self {
            Self::Normal(insn) => insn.result.as_ref(),
            Self::Phi(phi) => Some(&phi.result),
        }
    }

    /// Visits every source register operand.
    pub fn visit_sources(&self, mut f: impl FnMut(&RegisterSpec)) {
        match self {
            Self::Normal(insn) => insn.sources.iter().for_each(&mut f),
            Self::Phi(phi) => phi.operands.iter().for_each(|op| f(&op.spec)),
        }
    }

    /// Returns `true` if any source operand reads `reg`.
    #[must_use]
    pub fn uses_reg(&self, reg: u32) -> bool {
        match self {
            Self::Normal(insn) => insn.sources.iter().any(|s| s.reg == reg),
            Self::Phi(phi) => phi.uses_reg(reg),
        }
    }

    /// Returns the branchingness. Phis always fall through.
    #[must_use]
    pub fn branchingness(&self) -> Branchingness {
        match self {
            Self::Normal(insn) => insn.branchingness(),
            Self::Phi(_) => Branchingness::None,
        }
    }

    /// Returns `true` if this is a phi.
    #[must_use]
    pub const fn is_phi(&self) -> bool {
        matches!(self, Self::Phi(_))
    }

    /// Returns `true` if this is a register-to-register move whose
    /// definition the renamer may elide.
    #[must_use]
    pub fn is_plain_move(&self) -> bool {
        matches!(self, Self::Normal(insn) if insn.opcode == crate::rop::Opcode::Move)
    }

    /// Returns `true` if deleting this instruction could change observable
    /// behavior.
    ///
    /// Under `preserve_locals`, a move carrying a local-variable binding on
    /// its result counts as having an effect: it anchors the debug info the
    /// downstream emitter must keep alive.
    #[must_use]
    pub fn has_side_effect(&self, preserve_locals: bool) -> bool {
        match self {
            Self::Normal(insn) => {
                if insn.has_side_effect() {
                    return true;
                }
                preserve_locals
                    && insn.opcode.is_move_like()
                    && insn.result.as_ref().is_some_and(|r| r.local.is_some())
            }
            Self::Phi(phi) => preserve_locals && phi.result.local.is_some(),
        }
    }

    /// Clones this instruction for insertion elsewhere in the graph.
    ///
    /// Phis are tied to a specific block's predecessor edges, so cloning
    /// one through this generic path is a graph-construction defect.
    pub fn duplicate(&self) -> Result<Self> {
        match self {
            Self::Normal(insn) => Ok(Self::Normal(insn.clone())),
            Self::Phi(phi) => Err(Error::MalformedGraph {
                message: format!("attempt to duplicate phi for v{}", phi.result.reg),
                file: file!(),
                line: line!(),
            }),
        }
    }
}

impl fmt::Display for SsaInsn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Normal(insn) => write!(f, "{insn}"),
            Self::Phi(phi) => write!(f, "{phi}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rop::{Interner, LocalInfo, Opcode, Type, TypeBearer};

    fn spec(reg: u32) -> RegisterSpec {
        RegisterSpec::new(reg, TypeBearer::Type(Type::Int))
    }

    #[test]
    fn test_phi_operand_edges() {
        let mut phi = PhiInsn::new(spec(10), 3);
        phi.add_operand(spec(4), 1);
        phi.add_operand(spec(5), 2);

        assert_eq!(phi.operand_for_pred(1).map(|op| op.spec.reg), Some(4));
        assert!(phi.operand_for_pred(7).is_none());
        assert!(phi.uses_reg(5));

        phi.remove_operands_for_pred(1);
        assert!(phi.operand_for_pred(1).is_none());
        assert_eq!(phi.operands.len(), 1);
    }

    #[test]
    fn test_duplicate_rejects_phi() {
        let normal = SsaInsn::Normal(Insn::new(Opcode::Move, Some(spec(1)), vec![spec(0)]));
        assert!(normal.duplicate().is_ok());

        let phi = SsaInsn::Phi(PhiInsn::new(spec(10), 3));
        assert!(matches!(
            phi.duplicate(),
            Err(Error::MalformedGraph { .. })
        ));
    }

    #[test]
    fn test_side_effect_preserve_locals() {
        let interner = Interner::new();
        let local = LocalInfo::new(interner.intern("x"), interner.intern("I"));
        let bound = RegisterSpec::new_local(1, TypeBearer::Type(Type::Int), local);

        let move_bound = SsaInsn::Normal(Insn::new(Opcode::Move, Some(bound), vec![spec(0)]));
        let move_plain = SsaInsn::Normal(Insn::new(Opcode::Move, Some(spec(1)), vec![spec(0)]));

        assert!(move_bound.has_side_effect(true));
        assert!(!move_bound.has_side_effect(false));
        assert!(!move_plain.has_side_effect(true));
    }
}

//! SSA-form basic blocks.

use std::collections::BTreeSet;
use std::fmt;

use crate::rop::Branchingness;
use crate::ssa::insn::{PhiInsn, SsaInsn};

/// A basic block of an SSA-form method.
///
/// Blocks are identified by dense indices into [`crate::ssa::SsaMethod`]'s
/// block vector; the `rop_label` preserves the original label for
/// round-tripping back to the register IR. Phi instructions occupy a
/// contiguous run at the head of `insns`. Successors are ordered to match
/// the terminating instruction's branch targets.
#[derive(Debug, Clone)]
pub struct SsaBasicBlock {
    /// This block's index in the method's block vector. Immutable.
    pub index: usize,
    /// The original register IR label.
    pub rop_label: u32,
    /// The instructions, phis first.
    pub insns: Vec<SsaInsn>,
    /// Indices of predecessor blocks.
    pub predecessors: BTreeSet<usize>,
    /// Indices of successor blocks, in branch-target order.
    pub successors: Vec<usize>,
    /// The fall-through/default/non-exception successor, when one exists.
    pub primary_successor: Option<usize>,
    /// Children in the dominator tree, populated by the dominance pass.
    pub dom_children: Vec<usize>,
}

impl SsaBasicBlock {
    /// Creates an empty block.
    #[must_use]
    pub fn new(index: usize, rop_label: u32) -> Self {
        Self {
            index,
            rop_label,
            insns: Vec::new(),
            predecessors: BTreeSet::new(),
            successors: Vec::new(),
            primary_successor: None,
            dom_children: Vec::new(),
        }
    }

    /// Returns the number of leading phi instructions.
    #[must_use]
    pub fn phi_count(&self) -> usize {
        self.insns.iter().take_while(|insn| insn.is_phi()).count()
    }

    /// Iterates over the block's leading phis.
    pub fn phis(&self) -> impl Iterator<Item = &PhiInsn> {
        self.insns.iter().map_while(|insn| match insn {
            SsaInsn::Phi(phi) => Some(phi),
            SsaInsn::Normal(_) => None,
        })
    }

    /// Mutably iterates over the block's leading phis.
    pub fn phis_mut(&mut self) -> impl Iterator<Item = &mut PhiInsn> {
        self.insns.iter_mut().map_while(|insn| match insn {
            SsaInsn::Phi(phi) => Some(phi),
            SsaInsn::Normal(_) => None,
        })
    }

    /// Returns `true` if a phi for the given pre-SSA register is already
    /// present.
    #[must_use]
    pub fn has_phi_for(&self, orig_reg: u32) -> bool {
        self.phis().any(|phi| phi.orig_reg == orig_reg)
    }

    /// Inserts a phi at the head of the instruction list.
    pub fn add_phi(&mut self, phi: PhiInsn) {
        self.insns.insert(0, SsaInsn::Phi(phi));
    }

    /// Returns `true` if the block ends in a block-terminating instruction.
    #[must_use]
    pub fn is_terminated(&self) -> bool {
        self.insns
            .last()
            .is_some_and(|insn| insn.branchingness() != Branchingness::None)
    }

    /// Returns `true` if the block consists of a single unconditional jump,
    /// the shape of blocks inserted by edge splitting.
    #[must_use]
    pub fn is_forwarding_block(&self) -> bool {
        self.insns.len() == 1
            && self
                .insns
                .first()
                .is_some_and(|insn| insn.branchingness() == Branchingness::Goto)
    }
}

impl fmt::Display for SsaBasicBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "b{} (@{})", self.index, self.rop_label)?;
        if !self.successors.is_empty() {
            write!(f, " ->")?;
            for succ in &self.successors {
                if Some(*succ) == self.primary_successor {
                    write!(f, " *b{succ}")?;
                } else {
                    write!(f, " b{succ}")?;
                }
            }
        }
        writeln!(f)?;
        for insn in &self.insns {
            writeln!(f, "  {insn}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rop::{Insn, Opcode, RegisterSpec, Type, TypeBearer};

    fn spec(reg: u32) -> RegisterSpec {
        RegisterSpec::new(reg, TypeBearer::Type(Type::Int))
    }

    #[test]
    fn test_phi_run_at_head() {
        let mut block = SsaBasicBlock::new(0, 0);
        block
            .insns
            .push(SsaInsn::Normal(Insn::new(Opcode::Goto, None, Vec::new())));
        block.add_phi(PhiInsn::new(spec(5), 1));
        block.add_phi(PhiInsn::new(spec(6), 2));

        assert_eq!(block.phi_count(), 2);
        assert!(block.has_phi_for(1));
        assert!(block.has_phi_for(2));
        assert!(!block.has_phi_for(3));
        assert_eq!(block.phis().count(), 2);
    }

    #[test]
    fn test_termination() {
        let mut block = SsaBasicBlock::new(0, 0);
        assert!(!block.is_terminated());

        block.insns.push(SsaInsn::Normal(Insn::new(
            Opcode::Move,
            Some(spec(1)),
            vec![spec(0)],
        )));
        assert!(!block.is_terminated());

        block
            .insns
            .push(SsaInsn::Normal(Insn::new(Opcode::Goto, None, Vec::new())));
        assert!(block.is_terminated());
        assert!(!block.is_forwarding_block());
    }

    #[test]
    fn test_forwarding_block() {
        let mut block = SsaBasicBlock::new(3, 17);
        block
            .insns
            .push(SsaInsn::Normal(Insn::new(Opcode::Goto, None, Vec::new())));
        assert!(block.is_forwarding_block());
    }
}

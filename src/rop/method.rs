//! Register IR methods: label-addressed basic blocks.
//!
//! This is the representation handed to the engine by the upstream
//! translator and produced back to the downstream emitter. Blocks carry
//! stable numeric labels (not dense indices); successor lists are ordered,
//! and the primary successor marks the fall-through edge for `If`, the
//! default case for `Switch`, and the non-exception edge for throwing
//! instructions.

use std::collections::HashMap;
use std::fmt;

use crate::rop::insn::Insn;
use crate::rop::op::Branchingness;

/// A basic block of a register IR method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RopBlock {
    /// The block's label. Stable across passes, unique within a method.
    pub label: u32,
    /// The instructions, ending in at most one block-terminating
    /// instruction.
    pub insns: Vec<Insn>,
    /// Successor labels, in branch order.
    pub successors: Vec<u32>,
    /// The successor taken in the "normal" case, when there is more than
    /// one: fall-through for `If`, default for `Switch`, the non-exception
    /// edge for throwers.
    pub primary_successor: Option<u32>,
}

impl RopBlock {
    /// Creates a block.
    #[must_use]
    pub fn new(
        label: u32,
        insns: Vec<Insn>,
        successors: Vec<u32>,
        primary_successor: Option<u32>,
    ) -> Self {
        Self {
            label,
            insns,
            successors,
            primary_successor,
        }
    }

    /// Returns the block's final instruction.
    #[must_use]
    pub fn last_insn(&self) -> Option<&Insn> {
        self.insns.last()
    }

    /// Returns `true` if the block ends in an instruction that can
    /// terminate a block and whose successor count matches its shape.
    #[must_use]
    pub fn is_well_terminated(&self) -> bool {
        let Some(last) = self.last_insn() else {
            return false;
        };
        match last.branchingness() {
            Branchingness::None => false,
            Branchingness::Return => self.successors.is_empty(),
            Branchingness::Goto => self.successors.len() == 1,
            Branchingness::If => self.successors.len() == 2,
            Branchingness::Switch => !self.successors.is_empty(),
            Branchingness::Throws => !self.successors.is_empty() || self.primary_successor.is_none(),
        }
    }
}

/// A register IR method: a labeled control-flow graph plus calling
/// convention facts.
#[derive(Debug, Clone)]
pub struct RopMethod {
    /// The basic blocks, in no particular order.
    pub blocks: Vec<RopBlock>,
    /// Label of the entry block.
    pub entry_label: u32,
    /// Total width of the incoming parameters, in registers.
    pub param_width: u32,
    /// Whether the method is static (no `this` parameter).
    pub is_static: bool,
}

impl RopMethod {
    /// Creates a method.
    #[must_use]
    pub fn new(blocks: Vec<RopBlock>, entry_label: u32, param_width: u32, is_static: bool) -> Self {
        Self {
            blocks,
            entry_label,
            param_width,
            is_static,
        }
    }

    /// Returns the block with the given label, if present.
    #[must_use]
    pub fn block_by_label(&self, label: u32) -> Option<&RopBlock> {
        self.blocks.iter().find(|b| b.label == label)
    }

    /// Returns a map from label to position in `self.blocks`.
    #[must_use]
    pub fn label_index(&self) -> HashMap<u32, usize> {
        self.blocks
            .iter()
            .enumerate()
            .map(|(i, b)| (b.label, i))
            .collect()
    }

    /// Returns one past the highest label in use.
    #[must_use]
    pub fn max_label(&self) -> u32 {
        self.blocks
            .iter()
            .map(|b| b.label + 1)
            .max()
            .unwrap_or(0)
            .max(self.entry_label + 1)
    }

    /// Returns one past the highest register touched by any instruction.
    #[must_use]
    pub fn reg_count(&self) -> u32 {
        let mut count = self.param_width;
        for block in &self.blocks {
            for insn in &block.insns {
                if let Some(result) = &insn.result {
                    count = count.max(result.next_reg());
                }
                for src in &insn.sources {
                    count = count.max(src.next_reg());
                }
            }
        }
        count
    }
}

impl fmt::Display for RopMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "method (entry @{}):", self.entry_label)?;
        for block in &self.blocks {
            write!(f, "  @{}:", block.label)?;
            if !block.successors.is_empty() {
                write!(f, " ->")?;
                for succ in &block.successors {
                    if Some(*succ) == block.primary_successor {
                        write!(f, " *@{succ}")?;
                    } else {
                        write!(f, " @{succ}")?;
                    }
                }
            }
            writeln!(f)?;
            for insn in &block.insns {
                writeln!(f, "    {insn}")?;
            }
        }
        Ok(())
    }
}

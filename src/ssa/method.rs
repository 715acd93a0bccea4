//! The SSA-form method and its derived-index bookkeeping.
//!
//! [`SsaMethod`] owns the block vector plus two lazily-built derived
//! indices: the definition-site map (register to the one instruction
//! defining it) and the use lists (register to every instruction reading
//! it). The indices are pure functions of the graph; any mutation
//! invalidates them and the next read rebuilds. All graph mutation funnels
//! through a small set of entry points on this type so the invalidation
//! cannot be forgotten; passes never splice instruction vectors behind the
//! method's back.

use std::cell::RefCell;
use std::collections::HashSet;
use std::fmt::Write as _;

use crate::rop::{Branchingness, Insn, Opcode, Type, TypeBearer};
use crate::ssa::block::SsaBasicBlock;
use crate::ssa::insn::SsaInsn;
use crate::utils::BitSet;

/// The position of an instruction: block index plus offset in the block's
/// instruction list.
///
/// Sites are only meaningful against the graph revision they were built
/// from; any mutation through [`SsaMethod`] invalidates outstanding sites
/// along with the derived indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InsnSite {
    /// Block index.
    pub block: usize,
    /// Offset within the block's instruction list.
    pub insn: usize,
}

/// A method in SSA form.
#[derive(Debug)]
pub struct SsaMethod {
    blocks: Vec<SsaBasicBlock>,
    entry: usize,
    exit: Option<usize>,
    /// Total incoming parameter width, in registers.
    pub param_width: u32,
    /// Whether the method is static.
    pub is_static: bool,
    reg_count: u32,
    spare_base: u32,
    borrowed_spares: u32,
    next_label: u32,
    defs: RefCell<Option<Vec<Option<InsnSite>>>>,
    uses: RefCell<Option<Vec<Vec<InsnSite>>>>,
}

impl SsaMethod {
    /// Creates an empty method shell. Blocks are added with
    /// [`Self::push_block`]; the entry index is fixed afterwards with
    /// [`Self::set_entry`].
    #[must_use]
    pub fn new(param_width: u32, is_static: bool, reg_count: u32, next_label: u32) -> Self {
        Self {
            blocks: Vec::new(),
            entry: 0,
            exit: None,
            param_width,
            is_static,
            reg_count,
            spare_base: reg_count,
            borrowed_spares: 0,
            next_label,
            defs: RefCell::new(None),
            uses: RefCell::new(None),
        }
    }

    /// Returns the blocks. Read-only; mutation goes through the funnel
    /// methods below.
    #[must_use]
    pub fn blocks(&self) -> &[SsaBasicBlock] {
        &self.blocks
    }

    /// Returns one block.
    #[must_use]
    pub fn block(&self, index: usize) -> &SsaBasicBlock {
        &self.blocks[index]
    }

    /// Returns one block mutably, invalidating the derived indices.
    ///
    /// Passes that restructure whole instruction lists (the renamer, the
    /// normalizer) use this; point mutations prefer the dedicated entry
    /// points.
    pub fn block_mut(&mut self, index: usize) -> &mut SsaBasicBlock {
        self.invalidate_indices();
        &mut self.blocks[index]
    }

    /// Appends a fresh empty block with the given original label, returning
    /// its index.
    pub fn push_block(&mut self, rop_label: u32) -> usize {
        self.invalidate_indices();
        let index = self.blocks.len();
        self.blocks.push(SsaBasicBlock::new(index, rop_label));
        index
    }

    /// Returns the number of blocks.
    #[must_use]
    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// Returns the entry block index.
    #[must_use]
    pub const fn entry(&self) -> usize {
        self.entry
    }

    /// Sets the entry block index.
    pub fn set_entry(&mut self, entry: usize) {
        self.entry = entry;
    }

    /// Returns the synthetic exit block index, once synthesized.
    #[must_use]
    pub const fn exit(&self) -> Option<usize> {
        self.exit
    }

    /// Records the synthetic exit block.
    pub fn set_exit(&mut self, exit: usize) {
        self.exit = Some(exit);
    }

    /// Returns one past the highest register in use.
    ///
    /// Callers with a register budget (the back-conversion's coloring
    /// strategies) read this after optimization to decide whether to re-run
    /// with a reduced pass set.
    #[must_use]
    pub const fn reg_count(&self) -> u32 {
        self.reg_count
    }

    /// Mints a fresh register of the given category.
    pub fn make_reg(&mut self, category: u32) -> u32 {
        let reg = self.reg_count;
        self.reg_count += category;
        self.spare_base = self.reg_count;
        reg
    }

    /// Borrows a spare register above the high-water mark.
    ///
    /// Spares serialize parallel-copy moves during phi elimination in the
    /// back-conversion; they are reused across call sites once returned.
    pub fn borrow_spare_register(&mut self, category: u32) -> u32 {
        let reg = self.spare_base + self.borrowed_spares;
        self.borrowed_spares += category;
        self.reg_count = self.reg_count.max(reg + category);
        reg
    }

    /// Returns all borrowed spare registers to the pool.
    pub fn return_spare_registers(&mut self) {
        self.borrowed_spares = 0;
    }

    /// Mints a fresh, globally unique block label.
    pub fn make_label(&mut self) -> u32 {
        let label = self.next_label;
        self.next_label += 1;
        label
    }

    /// Drops both derived indices. Called by every mutation funnel.
    pub fn invalidate_indices(&self) {
        *self.defs.borrow_mut() = None;
        *self.uses.borrow_mut() = None;
    }

    fn ensure_defs(&self) {
        let mut defs = self.defs.borrow_mut();
        if defs.is_some() {
            return;
        }
        let mut map: Vec<Option<InsnSite>> = vec![None; self.reg_count as usize];
        for block in &self.blocks {
            for (i, insn) in block.insns.iter().enumerate() {
                if let Some(result) = insn.result() {
                    map[result.reg as usize] = Some(InsnSite {
                        block: block.index,
                        insn: i,
                    });
                }
            }
        }
        *defs = Some(map);
    }

    fn ensure_uses(&self) {
        let mut uses = self.uses.borrow_mut();
        if uses.is_some() {
            return;
        }
        let mut lists: Vec<Vec<InsnSite>> = vec![Vec::new(); self.reg_count as usize];
        for block in &self.blocks {
            for (i, insn) in block.insns.iter().enumerate() {
                let site = InsnSite {
                    block: block.index,
                    insn: i,
                };
                insn.visit_sources(|src| {
                    lists[src.reg as usize].push(site);
                });
            }
        }
        *uses = Some(lists);
    }

    /// Returns the definition site of a register, rebuilding the index if
    /// stale. `None` for registers with no definition (parameters handled
    /// by `move-param` always have one; a hole means a dead or spare
    /// register).
    #[must_use]
    pub fn def_site(&self, reg: u32) -> Option<InsnSite> {
        self.ensure_defs();
        self.defs
            .borrow()
            .as_ref()
            .and_then(|map| map.get(reg as usize).copied().flatten())
    }

    /// Returns a defensive copy of a register's use list.
    ///
    /// The copy does not track later graph mutation; callers that mutate
    /// while iterating (the dead-code pass) maintain their own snapshot.
    #[must_use]
    pub fn use_list_copy(&self, reg: u32) -> Vec<InsnSite> {
        self.ensure_uses();
        self.uses
            .borrow()
            .as_ref()
            .and_then(|lists| lists.get(reg as usize).cloned())
            .unwrap_or_default()
    }

    /// Returns the number of uses of a register.
    #[must_use]
    pub fn use_count(&self, reg: u32) -> usize {
        self.ensure_uses();
        self.uses
            .borrow()
            .as_ref()
            .and_then(|lists| lists.get(reg as usize).map(Vec::len))
            .unwrap_or(0)
    }

    /// Returns a defensive copy of every use list, indexed by register.
    #[must_use]
    pub fn use_lists_copy(&self) -> Vec<Vec<InsnSite>> {
        self.ensure_uses();
        self.uses.borrow().as_ref().cloned().unwrap_or_default()
    }

    /// Returns the instruction at a site.
    #[must_use]
    pub fn insn_at(&self, site: InsnSite) -> &SsaInsn {
        &self.blocks[site.block].insns[site.insn]
    }

    /// Replaces the instruction at a site.
    pub fn replace_insn(&mut self, site: InsnSite, insn: SsaInsn) {
        self.invalidate_indices();
        self.blocks[site.block].insns[site.insn] = insn;
    }

    /// Inserts an instruction immediately before the block's terminating
    /// instruction (or at the end, if the block is not yet terminated).
    pub fn insert_insn_before_last(&mut self, block: usize, insn: SsaInsn) {
        self.invalidate_indices();
        let insns = &mut self.blocks[block].insns;
        let at = if insns
            .last()
            .is_some_and(|last| last.branchingness() != Branchingness::None)
        {
            insns.len() - 1
        } else {
            insns.len()
        };
        insns.insert(at, insn);
    }

    /// Deletes a batch of instructions, then re-terminates any block whose
    /// trailing branch was removed by inserting an unconditional jump to
    /// its primary successor.
    pub fn delete_insns(&mut self, sites: &HashSet<InsnSite>) {
        self.invalidate_indices();
        let mut touched: Vec<usize> = sites.iter().map(|s| s.block).collect();
        touched.sort_unstable();
        touched.dedup();

        for block_idx in touched {
            let mut offsets: Vec<usize> = sites
                .iter()
                .filter(|s| s.block == block_idx)
                .map(|s| s.insn)
                .collect();
            offsets.sort_unstable_by(|a, b| b.cmp(a));
            let block = &mut self.blocks[block_idx];
            for offset in offsets {
                block.insns.remove(offset);
            }
            if !block.successors.is_empty() && !block.is_terminated() {
                block
                    .insns
                    .push(SsaInsn::Normal(Insn::new(Opcode::Goto, None, Vec::new())));
            }
        }
    }

    /// Adds a control-flow edge.
    pub fn add_edge(&mut self, from: usize, to: usize) {
        self.invalidate_indices();
        self.blocks[from].successors.push(to);
        self.blocks[to].predecessors.insert(from);
    }

    /// Removes the edge `from -> to`, dropping any phi operands in `to`
    /// that arrived along it.
    pub fn remove_edge(&mut self, from: usize, to: usize) {
        self.invalidate_indices();
        let from_block = &mut self.blocks[from];
        from_block.successors.retain(|&s| s != to);
        if from_block.primary_successor == Some(to) {
            from_block.primary_successor = None;
        }
        let to_block = &mut self.blocks[to];
        to_block.predecessors.remove(&from);
        for phi in to_block.phis_mut() {
            phi.remove_operands_for_pred(from);
        }
    }

    /// Redirects the edge `from -> old_to` to point at `new_to` instead,
    /// preserving successor order and the primary marker.
    pub fn redirect_edge(&mut self, from: usize, old_to: usize, new_to: usize) {
        self.invalidate_indices();
        let from_block = &mut self.blocks[from];
        for succ in &mut from_block.successors {
            if *succ == old_to {
                *succ = new_to;
            }
        }
        if from_block.primary_successor == Some(old_to) {
            from_block.primary_successor = Some(new_to);
        }
        self.blocks[old_to].predecessors.remove(&from);
        self.blocks[new_to].predecessors.insert(from);
    }

    /// Computes the set of blocks reachable from the entry over the current
    /// successor graph.
    #[must_use]
    pub fn reachable_from_entry(&self) -> BitSet {
        let mut reachable = BitSet::new(self.blocks.len());
        if self.blocks.is_empty() {
            return reachable;
        }
        let mut worklist = vec![self.entry];
        reachable.insert(self.entry);
        while let Some(block) = worklist.pop() {
            for &succ in &self.blocks[block].successors {
                if reachable.insert(succ) {
                    worklist.push(succ);
                }
            }
        }
        reachable
    }

    /// Builds a fresh untyped register spec, used where no better type is
    /// known yet.
    pub fn make_unknown_spec(&mut self) -> crate::rop::RegisterSpec {
        let reg = self.make_reg(1);
        crate::rop::RegisterSpec::new(reg, TypeBearer::Type(Type::Unknown))
    }

    /// Renders the control-flow graph in Graphviz dot format, one record
    /// node per block.
    #[must_use]
    pub fn to_dot(&self) -> String {
        let mut out = String::from("digraph method {\n  node [shape=record];\n");
        for block in &self.blocks {
            let mut label = format!("b{} (@{})", block.index, block.rop_label);
            for insn in &block.insns {
                let _ = write!(label, "\\n{insn}");
            }
            let escaped = label.replace('"', "\\\"").replace(['{', '}'], "");
            let _ = writeln!(out, "  b{} [label=\"{escaped}\"];", block.index);
        }
        for block in &self.blocks {
            for &succ in &block.successors {
                let style = if Some(succ) == block.primary_successor {
                    ""
                } else {
                    " [style=dashed]"
                };
                let _ = writeln!(out, "  b{} -> b{succ}{style};", block.index);
            }
        }
        out.push_str("}\n");
        out
    }
}

//! Dead code elimination.
//!
//! Two phases. Unreachable-block pruning recomputes reachability by a
//! forward walk from the entry (SCCP's own bookkeeping may be stale once
//! branches were rewritten) and empties every unreachable block, detaching
//! its edges and scrubbing dangling phi operands. Dead-instruction
//! elimination then iteratively deletes side-effect-free instructions whose
//! results have no surviving use, including closed cycles of
//! phi-and-move-only definitions that reference each other but never
//! escape (loop-carried temporaries after constant folding are the common
//! case).

use std::collections::HashSet;

use crate::opt::config::OptimizationContext;
use crate::ssa::{InsnSite, SsaMethod};

/// The pass entry point.
pub struct DeadCodeRemover;

impl DeadCodeRemover {
    /// Removes unreachable blocks' code and dead instructions.
    pub fn optimize(meth: &mut SsaMethod, ctx: &OptimizationContext) {
        Self::prune_unreachable(meth);
        Self::remove_dead_insns(meth, ctx.preserve_locals);
    }

    fn prune_unreachable(meth: &mut SsaMethod) {
        let reachable = meth.reachable_from_entry();
        let n = meth.block_count();

        let mut dead_regs: HashSet<u32> = HashSet::new();
        for b in 0..n {
            if reachable.contains(b) {
                continue;
            }
            for insn in &meth.block(b).insns {
                if let Some(result) = insn.result() {
                    dead_regs.insert(result.reg);
                }
            }
            let succs = meth.block(b).successors.clone();
            for succ in succs {
                meth.remove_edge(b, succ);
            }
            let preds: Vec<usize> = meth.block(b).predecessors.iter().copied().collect();
            for pred in preds {
                meth.remove_edge(pred, b);
            }
            meth.block_mut(b).insns.clear();
        }

        // A live phi must not reference a deleted definition.
        if !dead_regs.is_empty() {
            for b in 0..n {
                for phi in meth.block_mut(b).phis_mut() {
                    phi.operands.retain(|op| !dead_regs.contains(&op.spec.reg));
                }
            }
        }
    }

    fn remove_dead_insns(meth: &mut SsaMethod, preserve_locals: bool) {
        let reg_count = meth.reg_count();
        let mut use_lists = meth.use_lists_copy();
        let mut deleted: HashSet<InsnSite> = HashSet::new();
        let mut worklist: Vec<u32> = (0..reg_count).collect();

        while let Some(reg) = worklist.pop() {
            let def = match meth.def_site(reg) {
                Some(site) if !deleted.contains(&site) => site,
                _ => continue,
            };
            if meth.insn_at(def).has_side_effect(preserve_locals) {
                continue;
            }
            use_lists[reg as usize].retain(|site| !deleted.contains(site));
            let dead = use_lists[reg as usize].is_empty()
                || Self::is_circular_no_side_effect(meth, reg, &use_lists, &deleted, preserve_locals);
            if !dead {
                continue;
            }

            deleted.insert(def);
            let mut freed_sources = Vec::new();
            meth.insn_at(def).visit_sources(|src| {
                freed_sources.push(src.reg);
            });
            worklist.extend(freed_sources);
        }

        if !deleted.is_empty() {
            meth.delete_insns(&deleted);
        }
    }

    /// Checks whether every use reachable from `reg` through the def/use
    /// graph is side-effect-free and closed, i.e. nothing in the component
    /// escapes into an instruction that must stay. The visited set both
    /// cuts cycles and memoizes shared subgraphs within one query.
    fn is_circular_no_side_effect(
        meth: &SsaMethod,
        reg: u32,
        use_lists: &[Vec<InsnSite>],
        deleted: &HashSet<InsnSite>,
        preserve_locals: bool,
    ) -> bool {
        let mut visited: HashSet<u32> = HashSet::new();
        let mut stack = vec![reg];
        while let Some(r) = stack.pop() {
            if !visited.insert(r) {
                continue;
            }
            for site in &use_lists[r as usize] {
                if deleted.contains(site) {
                    continue;
                }
                let insn = meth.insn_at(*site);
                if insn.has_side_effect(preserve_locals) {
                    return false;
                }
                match insn.result() {
                    Some(result) => stack.push(result.reg),
                    None => return false,
                }
            }
        }
        true
    }
}

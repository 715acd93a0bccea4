//! Phi placement over iterated dominance frontiers.
//!
//! For each register, phis are inserted at the iterated dominance frontier
//! of its definition sites, pruned by a block-level liveness analysis: a
//! merge only needs a phi for a register that is actually live into it.
//! The pruning is what keeps repeated placement runs stable: a register
//! with one definition and only dominated uses never gains a phi.
//!
//! Placement runs before renaming, so phi results initially carry the
//! original register number; the renamer assigns the SSA version. The
//! `threshold` parameter restricts placement to registers at or above a
//! given index, which lets optimization passes that mint new temporaries
//! re-run placement incrementally.

use crate::rop::{RegisterSpec, Type, TypeBearer};
use crate::ssa::frontier::DomFront;
use crate::ssa::insn::{PhiInsn, SsaInsn};
use crate::ssa::locals::LocalSnapshot;
use crate::ssa::method::SsaMethod;
use crate::utils::{BitSet, BlockSet};

/// Block-level register liveness.
///
/// Phi operands count as live out of the corresponding predecessor rather
/// than live into the merge block; this is the convention that makes the
/// pruning in [`PhiPlacer`] exact.
pub struct Liveness {
    live_in: Vec<BitSet>,
}

impl Liveness {
    /// Runs the backward fixpoint over all blocks.
    #[must_use]
    pub fn compute(meth: &SsaMethod, reg_count: u32) -> Self {
        let n = meth.block_count();
        let regs = reg_count as usize;

        // Per block: registers read before any write (gen) and registers
        // written (kill), plus per-edge phi contributions to predecessors.
        let mut gen = vec![BitSet::new(regs); n];
        let mut kill = vec![BitSet::new(regs); n];
        let mut phi_out: Vec<BitSet> = vec![BitSet::new(regs); n];

        for block in meth.blocks() {
            let b = block.index;
            for insn in &block.insns {
                match insn {
                    SsaInsn::Phi(phi) => {
                        for op in &phi.operands {
                            let reg = op.spec.reg as usize;
                            if reg < regs {
                                phi_out[op.pred].insert(reg);
                            }
                        }
                        if (phi.result.reg as usize) < regs {
                            kill[b].insert(phi.result.reg as usize);
                        }
                    }
                    SsaInsn::Normal(real) => {
                        for src in &real.sources {
                            let reg = src.reg as usize;
                            if reg < regs && !kill[b].contains(reg) {
                                gen[b].insert(reg);
                            }
                        }
                        if let Some(result) = &real.result {
                            if (result.reg as usize) < regs {
                                kill[b].insert(result.reg as usize);
                            }
                        }
                    }
                }
            }
        }

        let mut live_in = vec![BitSet::new(regs); n];
        let mut worklist: Vec<usize> = (0..n).collect();
        while let Some(b) = worklist.pop() {
            // live_out = union of successor live_in plus this block's
            // phi-edge contributions.
            let mut live_out = phi_out[b].clone();
            for &succ in &meth.block(b).successors {
                live_out.union_with(&live_in[succ]);
            }
            let mut new_in = gen[b].clone();
            for reg in live_out.iter() {
                if !kill[b].contains(reg) {
                    new_in.insert(reg);
                }
            }
            if new_in != live_in[b] {
                live_in[b] = new_in;
                for &pred in &meth.block(b).predecessors {
                    if !worklist.contains(&pred) {
                        worklist.push(pred);
                    }
                }
            }
        }
        Self { live_in }
    }

    /// Returns `true` if `reg` is live into `block`.
    #[must_use]
    pub fn live_in(&self, block: usize, reg: u32) -> bool {
        self.live_in
            .get(block)
            .is_some_and(|set| (reg as usize) < set.len() && set.contains(reg as usize))
    }
}

/// Inserts phi instructions at iterated dominance frontiers.
pub struct PhiPlacer;

impl PhiPlacer {
    /// Places phis for every register at or above `threshold`.
    ///
    /// Phi results are typed from the local-variable snapshot when a
    /// binding is visible at the merge, and left as [`Type::Unknown`]
    /// otherwise for the downstream type-resolution pass.
    pub fn place(
        meth: &mut SsaMethod,
        front: &DomFront,
        snapshot: &LocalSnapshot,
        threshold: u32,
    ) {
        let reg_count = meth.reg_count();
        let n = meth.block_count();
        let liveness = Liveness::compute(meth, reg_count);

        // Definition-site block sets per register.
        let mut def_sites: Vec<BlockSet> = (threshold..reg_count).map(|_| BlockSet::new(n)).collect();
        for block in meth.blocks() {
            for insn in &block.insns {
                if let Some(result) = insn.result() {
                    if result.reg >= threshold && result.reg < reg_count {
                        def_sites[(result.reg - threshold) as usize].insert(block.index);
                    }
                }
            }
        }

        for reg in threshold..reg_count {
            let sites = &mut def_sites[(reg - threshold) as usize];
            let mut worklist: Vec<usize> = sites.iter().collect();
            while let Some(site) = worklist.pop() {
                let frontier: Vec<usize> = front.frontier(site).iter().collect();
                for f in frontier {
                    if meth.block(f).has_phi_for(reg) || !liveness.live_in(f, reg) {
                        continue;
                    }
                    let result = match snapshot.starting_spec(f, reg) {
                        Some(spec) => spec.with_reg(reg),
                        None => RegisterSpec::new(reg, TypeBearer::Type(Type::Unknown)),
                    };
                    meth.block_mut(f).add_phi(PhiInsn::new(result, reg));
                    // A phi is itself a definition; propagate to the
                    // frontier's frontier.
                    if sites.insert(f) {
                        worklist.push(f);
                    }
                }
            }
        }
    }
}

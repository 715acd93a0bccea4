//! Sparse conditional constant propagation.
//!
//! Runs the classic interleaved fixpoint over two lattices: per-register
//! values (Top, one known constant, Varying) and per-block reachability.
//! Four worklists drive it: newly executable blocks, executable blocks
//! needing only phi re-evaluation after a new inbound edge, registers whose
//! value lowered to a constant, and registers that lowered to Varying.
//!
//! Two finalization passes rewrite the graph: constant registers get their
//! defining instruction replaced by a constant load (or, when the
//! definition can throw, just a constant-bearing result descriptor), and
//! conditional branches proven one-sided become unconditional jumps with
//! the dead edge removed.

use std::collections::HashMap;

use crate::opt::config::OptimizationContext;
use crate::rop::{BinOp, Branchingness, Cmp, Constant, Insn, Opcode, UnOp};
use crate::ssa::{InsnSite, PhiInsn, SsaInsn, SsaMethod};
use crate::utils::BitSet;

/// One register's position in the constant lattice.
#[derive(Debug, Clone, PartialEq, Eq)]
enum LatticeValue {
    /// Not yet evaluated.
    Top,
    /// Holds exactly this value on every executable path.
    Constant(Constant),
    /// Proven not constant.
    Varying,
}

/// The pass entry point.
pub struct Sccp;

impl Sccp {
    /// Runs constant propagation and applies the results to the method.
    pub fn optimize(meth: &mut SsaMethod, _ctx: &OptimizationContext) {
        let mut run = Run::new(meth);
        run.analyze();
        run.apply();
    }
}

struct Run<'a> {
    meth: &'a mut SsaMethod,
    lattice: Vec<LatticeValue>,
    executable: BitSet,
    cfg_worklist: Vec<usize>,
    cfg_phi_worklist: Vec<usize>,
    ssa_worklist: Vec<u32>,
    varying_worklist: Vec<u32>,
    /// Conditional branches proven one-sided: block to taken successor.
    branch_taken: HashMap<usize, usize>,
}

impl<'a> Run<'a> {
    fn new(meth: &'a mut SsaMethod) -> Self {
        let regs = meth.reg_count() as usize;
        let blocks = meth.block_count();
        Self {
            meth,
            lattice: vec![LatticeValue::Top; regs],
            executable: BitSet::new(blocks),
            cfg_worklist: Vec::new(),
            cfg_phi_worklist: Vec::new(),
            ssa_worklist: Vec::new(),
            varying_worklist: Vec::new(),
            branch_taken: HashMap::new(),
        }
    }

    fn analyze(&mut self) {
        let entry = self.meth.entry();
        self.executable.insert(entry);
        self.cfg_worklist.push(entry);

        loop {
            if let Some(block) = self.cfg_worklist.pop() {
                self.simulate_block(block, true);
            } else if let Some(block) = self.cfg_phi_worklist.pop() {
                self.simulate_block(block, false);
            } else if let Some(reg) = self.varying_worklist.pop().or_else(|| self.ssa_worklist.pop())
            {
                for site in self.meth.use_list_copy(reg) {
                    if self.executable.contains(site.block) {
                        self.simulate_site(site);
                    }
                }
            } else {
                break;
            }
        }
    }

    /// Marks the edge `_from -> to` executable, queueing the target for
    /// full or phi-only simulation.
    fn mark_edge(&mut self, to: usize) {
        if self.executable.insert(to) {
            self.cfg_worklist.push(to);
        } else {
            self.cfg_phi_worklist.push(to);
        }
    }

    fn simulate_block(&mut self, block: usize, full: bool) {
        let count = self.meth.block(block).insns.len();
        for i in 0..count {
            let site = InsnSite { block, insn: i };
            let is_phi = self.meth.insn_at(site).is_phi();
            if is_phi || full {
                self.simulate_site(site);
            }
        }
    }

    fn simulate_site(&mut self, site: InsnSite) {
        match self.meth.insn_at(site) {
            SsaInsn::Phi(phi) => {
                let phi = phi.clone();
                self.simulate_phi(&phi);
            }
            SsaInsn::Normal(insn) => {
                let insn = insn.clone();
                self.simulate_stmt(&insn);
                let is_last = site.insn + 1 == self.meth.block(site.block).insns.len();
                if is_last && insn.branchingness() != Branchingness::None {
                    self.simulate_branch(site.block, &insn);
                }
            }
        }
    }

    /// A phi meets the values of operands arriving over executable edges.
    fn simulate_phi(&mut self, phi: &PhiInsn) {
        let mut value = LatticeValue::Top;
        for op in &phi.operands {
            if !self.executable.contains(op.pred) {
                continue;
            }
            let incoming = self.lattice[op.spec.reg as usize].clone();
            value = Self::meet(value, incoming);
        }
        self.lower(phi.result.reg, value);
    }

    fn meet(a: LatticeValue, b: LatticeValue) -> LatticeValue {
        match (a, b) {
            (LatticeValue::Top, x) | (x, LatticeValue::Top) => x,
            (LatticeValue::Constant(x), LatticeValue::Constant(y)) => {
                if x == y {
                    LatticeValue::Constant(x)
                } else {
                    LatticeValue::Varying
                }
            }
            _ => LatticeValue::Varying,
        }
    }

    fn simulate_stmt(&mut self, insn: &Insn) {
        let Some(result) = &insn.result else {
            return;
        };
        let value = match &insn.opcode {
            Opcode::Const => insn
                .constant()
                .map_or(LatticeValue::Varying, |c| LatticeValue::Constant(c.clone())),
            Opcode::Move => self.lattice[insn.sources[0].reg as usize].clone(),
            Opcode::BinOp(op) => self.evaluate_binop(*op, insn),
            Opcode::UnOp(op) => self.evaluate_unop(*op, insn),
            _ => LatticeValue::Varying,
        };
        self.lower(result.reg, value);
    }

    fn known(&self, reg: u32) -> Option<Constant> {
        match &self.lattice[reg as usize] {
            LatticeValue::Constant(c) => Some(c.clone()),
            _ => None,
        }
    }

    fn evaluate_binop(&self, op: BinOp, insn: &Insn) -> LatticeValue {
        let a = self.lattice[insn.sources[0].reg as usize].clone();
        let b = self.lattice[insn.sources[1].reg as usize].clone();
        match (a, b) {
            (LatticeValue::Constant(a), LatticeValue::Constant(b)) => {
                // Division by a known zero throws instead of producing a
                // value; leave it Top so the result never feeds a fold,
                // while the throwing edge keeps its successors reachable.
                if matches!(op, BinOp::Div | BinOp::Rem) && b.is_integral_zero() {
                    return LatticeValue::Top;
                }
                let folded = match op {
                    BinOp::Add => a.add(&b),
                    BinOp::Sub => a.sub(&b),
                    BinOp::Mul => a.mul(&b),
                    BinOp::Div => a.div(&b),
                    BinOp::Rem => a.rem(&b),
                    BinOp::And => a.and(&b),
                    BinOp::Or => a.or(&b),
                    BinOp::Xor => a.xor(&b),
                    BinOp::Shl => a.shl(&b),
                    BinOp::Shr => a.shr(&b),
                    BinOp::Ushr => a.ushr(&b),
                };
                folded.map_or(LatticeValue::Varying, LatticeValue::Constant)
            }
            (LatticeValue::Top, _) | (_, LatticeValue::Top) => LatticeValue::Top,
            _ => LatticeValue::Varying,
        }
    }

    fn evaluate_unop(&self, op: UnOp, insn: &Insn) -> LatticeValue {
        match self.lattice[insn.sources[0].reg as usize].clone() {
            LatticeValue::Constant(c) => {
                let folded = match op {
                    UnOp::Neg => c.neg(),
                    UnOp::Not => c.not(),
                };
                folded.map_or(LatticeValue::Varying, LatticeValue::Constant)
            }
            other => other,
        }
    }

    /// Lowers a register's lattice value, queueing its uses when it moves.
    fn lower(&mut self, reg: u32, value: LatticeValue) {
        let slot = &mut self.lattice[reg as usize];
        if *slot == value || matches!(slot, LatticeValue::Varying) {
            return;
        }
        let is_varying = matches!(value, LatticeValue::Varying);
        *slot = value;
        if is_varying {
            self.varying_worklist.push(reg);
        } else {
            self.ssa_worklist.push(reg);
        }
    }

    /// Determines which successors a terminating instruction can reach.
    fn simulate_branch(&mut self, block: usize, insn: &Insn) {
        let successors = self.meth.block(block).successors.clone();
        let primary = self.meth.block(block).primary_successor;

        let taken = match &insn.opcode {
            Opcode::If(cmp) => self.resolve_comparison(*cmp, insn).map(|branch| {
                if branch {
                    successors[0]
                } else {
                    primary.unwrap_or(successors[1])
                }
            }),
            Opcode::Switch(keys) => self.known(insn.sources[0].reg).and_then(|c| match c {
                Constant::Int(key) => {
                    let chosen = keys
                        .iter()
                        .position(|&k| k == key)
                        .map(|i| successors[i])
                        .or(primary)
                        .or_else(|| successors.last().copied());
                    chosen
                }
                _ => None,
            }),
            _ => None,
        };

        match taken {
            Some(target) => {
                self.branch_taken.insert(block, target);
                self.mark_edge(target);
            }
            None => {
                self.branch_taken.remove(&block);
                for succ in successors {
                    self.mark_edge(succ);
                }
            }
        }
    }

    /// Folds a comparison given 0, 1, or 2 known operands. A one-source
    /// conditional compares against an implicit integer zero.
    fn resolve_comparison(&self, cmp: Cmp, insn: &Insn) -> Option<bool> {
        let a = self.known(insn.sources[0].reg)?;
        let b = match insn.sources.get(1) {
            Some(src) => self.known(src.reg)?,
            None => Constant::Int(0),
        };
        let ordering = match (&a, &b) {
            (Constant::Int(x), Constant::Int(y)) => x.cmp(y),
            (Constant::Long(x), Constant::Long(y)) => x.cmp(y),
            _ => return None,
        };
        Some(cmp.evaluate(ordering))
    }

    /// Finalization: rewrite constant definitions and resolved branches.
    fn apply(mut self) {
        self.replace_constants();
        self.rewrite_branches();
    }

    fn replace_constants(&mut self) {
        for reg in 0..self.lattice.len() as u32 {
            let LatticeValue::Constant(value) = self.lattice[reg as usize].clone() else {
                continue;
            };
            let Some(def) = self.meth.def_site(reg) else {
                continue;
            };
            if !self.executable.contains(def.block) {
                continue;
            }

            let uses = self.meth.use_list_copy(reg);
            match self.meth.insn_at(def).clone() {
                SsaInsn::Normal(insn) => {
                    if insn.constant() == Some(&value) {
                        // Already a matching constant load.
                    } else if insn.has_side_effect() {
                        // The instruction must stay (it can throw), but its
                        // result is known.
                        let mut kept = insn;
                        if let Some(result) = kept.result.take() {
                            kept.result = Some(result.with_bearer(
                                crate::rop::TypeBearer::Constant(value.clone()),
                            ));
                        }
                        self.meth.replace_insn(def, SsaInsn::Normal(kept));
                    } else if let Some(result) = insn.result.as_ref() {
                        let load = Insn::new(
                            Opcode::Const,
                            Some(result.with_bearer(crate::rop::TypeBearer::Constant(
                                value.clone(),
                            ))),
                            Vec::new(),
                        );
                        self.meth.replace_insn(def, SsaInsn::Normal(load));
                    }
                }
                SsaInsn::Phi(mut phi) => {
                    // Keep the merge but publish the known value on its
                    // result descriptor.
                    phi.result = phi
                        .result
                        .with_bearer(crate::rop::TypeBearer::Constant(value.clone()));
                    self.meth.replace_insn(def, SsaInsn::Phi(phi));
                }
            }

            // Publish the value at every use.
            for site in uses {
                let mut insn = self.meth.insn_at(site).clone();
                match &mut insn {
                    SsaInsn::Normal(real) => {
                        for src in &mut real.sources {
                            if src.reg == reg {
                                *src = src.with_bearer(crate::rop::TypeBearer::Constant(
                                    value.clone(),
                                ));
                            }
                        }
                    }
                    SsaInsn::Phi(phi) => {
                        for op in &mut phi.operands {
                            if op.spec.reg == reg {
                                op.spec = op.spec.with_bearer(crate::rop::TypeBearer::Constant(
                                    value.clone(),
                                ));
                            }
                        }
                    }
                }
                self.meth.replace_insn(site, insn);
            }
        }
    }

    fn rewrite_branches(&mut self) {
        for (&block, &taken) in &self.branch_taken {
            let mut others: Vec<usize> = self
                .meth
                .block(block)
                .successors
                .iter()
                .copied()
                .filter(|&s| s != taken)
                .collect();
            others.sort_unstable();
            others.dedup();
            for other in others {
                self.meth.remove_edge(block, other);
            }
            let last = self.meth.block(block).insns.len() - 1;
            self.meth.replace_insn(
                InsnSite { block, insn: last },
                SsaInsn::Normal(Insn::new(Opcode::Goto, None, Vec::new())),
            );
            self.meth.block_mut(block).primary_successor = Some(taken);
        }
    }
}

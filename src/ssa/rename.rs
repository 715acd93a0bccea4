//! SSA version assignment.
//!
//! A dominator-tree preorder walk carries a mapping from pre-rename
//! register to the spec of its latest SSA version. Each definition mints a
//! fresh register; each source is renumbered through the mapping. Plain
//! moves are elided where safe: the source's mapping entry is forwarded to
//! the destination (picking up the destination's local-variable binding),
//! which removes most translator-generated copies without a separate
//! copy-propagation pass.
//!
//! Registers read before any definition on some path map to a single
//! synthetic "undefined" register minted up front; a phi operand whose
//! value is undefined along its edge is simply not recorded, marking the
//! edge as one where the variable is dead.

use crate::rop::{Opcode, RegisterSpec, Type, TypeBearer};
use crate::ssa::insn::SsaInsn;
use crate::ssa::method::SsaMethod;

/// Runs SSA renaming over a method whose phis are already placed and whose
/// dominator-tree child lists are populated.
pub struct Renamer<'a> {
    meth: &'a mut SsaMethod,
    preserve_locals: bool,
    /// Register count before renaming; mapping entries exist only below it.
    orig_count: u32,
    /// The synthetic undefined register.
    undefined_reg: u32,
}

impl<'a> Renamer<'a> {
    /// Renames every register reachable from the entry.
    pub fn rename(meth: &'a mut SsaMethod, preserve_locals: bool) {
        let orig_count = meth.reg_count();
        let undefined_reg = meth.make_reg(1);
        let mut renamer = Self {
            meth,
            preserve_locals,
            orig_count,
            undefined_reg,
        };
        renamer.run();
    }

    fn undefined_spec(&self) -> RegisterSpec {
        RegisterSpec::new(self.undefined_reg, TypeBearer::Type(Type::Unknown))
    }

    fn is_undefined(&self, spec: &RegisterSpec) -> bool {
        spec.reg == self.undefined_reg
    }

    fn run(&mut self) {
        let initial: Vec<RegisterSpec> = (0..self.orig_count)
            .map(|_| self.undefined_spec())
            .collect();
        let mut stack = vec![(self.meth.entry(), initial)];

        while let Some((block, mut mapping)) = stack.pop() {
            self.process_block(block, &mut mapping);
            self.push_phi_operands(block, &mapping);

            let children = self.meth.block(block).dom_children.clone();
            for (i, child) in children.iter().enumerate() {
                if i + 1 == children.len() {
                    stack.push((*child, std::mem::take(&mut mapping)));
                } else {
                    stack.push((*child, mapping.clone()));
                }
            }
        }
    }

    fn map_entry(&self, mapping: &[RegisterSpec], reg: u32) -> RegisterSpec {
        mapping
            .get(reg as usize)
            .cloned()
            .unwrap_or_else(|| self.undefined_spec())
    }

    fn process_block(&mut self, block: usize, mapping: &mut Vec<RegisterSpec>) {
        let insns = std::mem::take(&mut self.meth.block_mut(block).insns);
        let mut out = Vec::with_capacity(insns.len());

        for insn in insns {
            match insn {
                SsaInsn::Phi(mut phi) => {
                    let old_reg = phi.result.reg;
                    let fresh = self.meth.make_reg(phi.result.category());
                    phi.result = phi.result.with_reg(fresh);
                    phi.orig_reg = old_reg;
                    self.set_mapping(mapping, old_reg, phi.result.clone());
                    out.push(SsaInsn::Phi(phi));
                }
                SsaInsn::Normal(mut real) => {
                    if real.opcode == Opcode::Move && real.sources.len() == 1 {
                        let mapped = self.map_entry(mapping, real.sources[0].reg);
                        if !self.is_undefined(&mapped) && self.can_elide_move(&real, &mapped) {
                            let result = real.result.as_ref().cloned();
                            if let Some(result) = result {
                                let local = result.local.clone().or_else(|| mapped.local.clone());
                                let forwarded = mapped.with_local(local);
                                self.set_mapping(mapping, result.reg, forwarded);
                            }
                            continue;
                        }
                    }

                    for src in &mut real.sources {
                        let mapped = self.map_entry(mapping, src.reg);
                        *src = src.with_reg(mapped.reg);
                    }
                    if let Some(result) = real.result.take() {
                        let fresh = self.meth.make_reg(result.category());
                        let renamed = result.with_reg(fresh);
                        self.set_mapping(mapping, result.reg, renamed.clone());
                        real.result = Some(renamed);
                    }
                    out.push(SsaInsn::Normal(real));
                }
            }
        }
        self.meth.block_mut(block).insns = out;
    }

    /// Records a new version for `old_reg`. Registers minted during this
    /// rename run (at or above the original count) have no mapping slot
    /// and none is needed: they are already in SSA form.
    fn set_mapping(&self, mapping: &mut Vec<RegisterSpec>, old_reg: u32, spec: RegisterSpec) {
        if let Some(slot) = mapping.get_mut(old_reg as usize) {
            *slot = spec;
        }
    }

    /// A move may be dropped unless it anchors a local-variable binding
    /// that the preserve-locals policy requires to persist: a move whose
    /// result names a local the source does not already carry must stay.
    fn can_elide_move(&self, real: &crate::rop::Insn, mapped: &RegisterSpec) -> bool {
        if !self.preserve_locals {
            return true;
        }
        let result_local = real.result.as_ref().and_then(|r| r.local.as_ref());
        match (result_local, mapped.local.as_ref()) {
            (None, _) => true,
            (Some(a), Some(b)) => a == b,
            (Some(_), None) => false,
        }
    }

    /// Delivers this block's final mapping to the phis of its successors.
    fn push_phi_operands(&mut self, block: usize, mapping: &[RegisterSpec]) {
        let succs = self.meth.block(block).successors.clone();
        for succ in succs {
            let phi_count = self.meth.block(succ).phi_count();
            for i in 0..phi_count {
                let (orig_reg, existing) = match &self.meth.block(succ).insns[i] {
                    SsaInsn::Phi(phi) => (
                        phi.orig_reg,
                        phi.operand_for_pred(block).map(|op| op.spec.reg),
                    ),
                    SsaInsn::Normal(_) => continue,
                };
                if let Some(old_operand_reg) = existing {
                    // Re-rename: the edge already has an operand; renumber
                    // it through the mapping.
                    let mapped = self.map_entry(mapping, old_operand_reg);
                    if let SsaInsn::Phi(phi) = &mut self.meth.block_mut(succ).insns[i] {
                        for op in &mut phi.operands {
                            if op.pred == block {
                                op.spec = op.spec.with_reg(mapped.reg);
                            }
                        }
                    }
                } else {
                    let value = self.map_entry(mapping, orig_reg);
                    if self.is_undefined(&value) {
                        // The variable is dead along this edge.
                        continue;
                    }
                    if let SsaInsn::Phi(phi) = &mut self.meth.block_mut(succ).insns[i] {
                        phi.add_operand(value, block);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rop::{Cmp, Constant, Insn, Interner, LocalInfo, Opcode};
    use crate::ssa::dominators::DomTree;
    use crate::ssa::frontier::DomFront;
    use crate::ssa::locals::LocalSnapshot;
    use crate::ssa::placement::PhiPlacer;

    fn terminate(meth: &mut SsaMethod, block: usize, succs: &[usize]) {
        let insn = match succs.len() {
            0 => Insn::new(Opcode::Return, None, Vec::new()),
            1 => Insn::new(Opcode::Goto, None, Vec::new()),
            _ => Insn::new(
                Opcode::If(Cmp::Eq),
                None,
                vec![RegisterSpec::new(0, TypeBearer::Type(Type::Int))],
            ),
        };
        meth.block_mut(block).insns.push(SsaInsn::Normal(insn));
        for &s in succs {
            meth.add_edge(block, s);
        }
        meth.block_mut(block).primary_successor = succs.last().copied();
    }

    fn convert(meth: &mut SsaMethod, preserve_locals: bool) {
        let dom = DomTree::compute(meth, false).unwrap();
        dom.populate_dom_children(meth);
        let front = DomFront::compute(meth, &dom);
        let snapshot = LocalSnapshot::compute(meth, meth.reg_count());
        PhiPlacer::place(meth, &front, &snapshot, 0);
        Renamer::rename(meth, preserve_locals);
    }

    fn assert_single_assignment(meth: &SsaMethod) {
        let reachable = meth.reachable_from_entry();
        let mut defs = std::collections::HashMap::new();
        for block in meth.blocks() {
            if !reachable.contains(block.index) {
                continue;
            }
            for insn in &block.insns {
                if let Some(result) = insn.result() {
                    let count = defs.entry(result.reg).or_insert(0);
                    *count += 1;
                    assert_eq!(*count, 1, "register v{} defined twice", result.reg);
                }
            }
        }
    }

    /// Diamond: both arms write register 1, join returns it.
    fn conflicting_diamond() -> SsaMethod {
        let mut meth = SsaMethod::new(1, true, 4, 100);
        for label in 0..4 {
            meth.push_block(label);
        }
        terminate(&mut meth, 0, &[1, 2]);
        terminate(&mut meth, 1, &[3]);
        terminate(&mut meth, 2, &[3]);
        terminate(&mut meth, 3, &[]);
        meth.set_entry(0);
        meth.block_mut(0).insns.insert(
            0,
            SsaInsn::Normal(Insn::new(
                Opcode::MoveParam,
                Some(RegisterSpec::new(0, TypeBearer::Type(Type::Int))),
                Vec::new(),
            )),
        );
        meth.block_mut(1)
            .insns
            .insert(0, SsaInsn::Normal(Insn::new_const(1, Constant::Int(1))));
        meth.block_mut(2)
            .insns
            .insert(0, SsaInsn::Normal(Insn::new_const(1, Constant::Int(2))));
        meth.block_mut(3).insns[0] = SsaInsn::Normal(Insn::new(
            Opcode::Return,
            None,
            vec![RegisterSpec::new(1, TypeBearer::Type(Type::Int))],
        ));
        meth
    }

    #[test]
    fn test_single_assignment_after_rename() {
        let mut meth = conflicting_diamond();
        convert(&mut meth, false);
        assert_single_assignment(&meth);
    }

    #[test]
    fn test_phi_operands_complete() {
        let mut meth = conflicting_diamond();
        convert(&mut meth, false);

        let join = meth.block(3);
        let phi = join.phis().next().expect("join should carry a phi");
        assert_eq!(phi.operands.len(), 2);
        for op in &phi.operands {
            assert!(join.predecessors.contains(&op.pred));
        }
        // The return reads the phi's result.
        let ret = join.insns.last().unwrap();
        assert!(ret.uses_reg(phi.result.reg));
    }

    #[test]
    fn test_phi_operands_carry_constant_bearers() {
        let mut meth = conflicting_diamond();
        convert(&mut meth, false);

        let phi = meth.block(3).phis().next().unwrap();
        let mut consts: Vec<Option<Constant>> = phi
            .operands
            .iter()
            .map(|op| {
                meth.def_site(op.spec.reg).and_then(|site| {
                    match meth.insn_at(site) {
                        SsaInsn::Normal(insn) => insn.constant().cloned(),
                        SsaInsn::Phi(_) => None,
                    }
                })
            })
            .collect();
        consts.sort_by_key(|c| match c {
            Some(Constant::Int(v)) => *v,
            _ => i32::MAX,
        });
        assert_eq!(consts, vec![Some(Constant::Int(1)), Some(Constant::Int(2))]);
    }

    #[test]
    fn test_move_elision() {
        // b0: param v0; v1 <- move v0; return v1
        let mut meth = SsaMethod::new(1, true, 2, 100);
        meth.push_block(0);
        meth.set_entry(0);
        let block = meth.block_mut(0);
        block.insns.push(SsaInsn::Normal(Insn::new(
            Opcode::MoveParam,
            Some(RegisterSpec::new(0, TypeBearer::Type(Type::Int))),
            Vec::new(),
        )));
        block.insns.push(SsaInsn::Normal(Insn::new(
            Opcode::Move,
            Some(RegisterSpec::new(1, TypeBearer::Type(Type::Int))),
            vec![RegisterSpec::new(0, TypeBearer::Type(Type::Int))],
        )));
        block.insns.push(SsaInsn::Normal(Insn::new(
            Opcode::Return,
            None,
            vec![RegisterSpec::new(1, TypeBearer::Type(Type::Int))],
        )));

        convert(&mut meth, false);

        // The move disappeared and the return reads the parameter directly.
        let block = meth.block(0);
        assert_eq!(block.insns.len(), 2);
        let param_reg = block.insns[0].result().unwrap().reg;
        assert!(block.insns[1].uses_reg(param_reg));
    }

    #[test]
    fn test_move_kept_for_conflicting_locals() {
        let interner = Interner::new();
        let a = LocalInfo::new(interner.intern("a"), interner.intern("I"));
        let b = LocalInfo::new(interner.intern("b"), interner.intern("I"));

        let mut meth = SsaMethod::new(1, true, 2, 100);
        meth.push_block(0);
        meth.set_entry(0);
        let block = meth.block_mut(0);
        block.insns.push(SsaInsn::Normal(Insn::new(
            Opcode::MoveParam,
            Some(RegisterSpec::new_local(0, TypeBearer::Type(Type::Int), a)),
            Vec::new(),
        )));
        block.insns.push(SsaInsn::Normal(Insn::new(
            Opcode::Move,
            Some(RegisterSpec::new_local(1, TypeBearer::Type(Type::Int), b)),
            vec![RegisterSpec::new(0, TypeBearer::Type(Type::Int))],
        )));
        block.insns.push(SsaInsn::Normal(Insn::new(
            Opcode::Return,
            None,
            vec![RegisterSpec::new(1, TypeBearer::Type(Type::Int))],
        )));

        convert(&mut meth, true);
        assert_eq!(meth.block(0).insns.len(), 3);
        assert_single_assignment(&meth);
    }

    #[test]
    fn test_rerename_is_stable() {
        let mut meth = conflicting_diamond();
        convert(&mut meth, false);
        let count_first: usize = meth.blocks().iter().map(|b| b.insns.len()).sum();

        // Immediately convert again with a zero threshold: nothing should
        // be gained or lost.
        convert(&mut meth, false);
        let count_second: usize = meth.blocks().iter().map(|b| b.insns.len()).sum();
        assert_eq!(count_first, count_second);
        assert_single_assignment(&meth);
    }

    #[test]
    fn test_loop_phi_self_reference_allowed() {
        // entry: v1 <- const 0; loop: v1 <- v1 + v0, conditional back edge.
        let mut meth = SsaMethod::new(1, true, 2, 100);
        for label in 0..4 {
            meth.push_block(label);
        }
        terminate(&mut meth, 0, &[1]);
        terminate(&mut meth, 1, &[2, 3]);
        terminate(&mut meth, 2, &[1]);
        terminate(&mut meth, 3, &[]);
        meth.set_entry(0);
        meth.block_mut(0).insns.insert(
            0,
            SsaInsn::Normal(Insn::new(
                Opcode::MoveParam,
                Some(RegisterSpec::new(0, TypeBearer::Type(Type::Int))),
                Vec::new(),
            )),
        );
        meth.block_mut(0)
            .insns
            .insert(1, SsaInsn::Normal(Insn::new_const(1, Constant::Int(0))));
        let add = Insn::new(
            Opcode::BinOp(crate::rop::BinOp::Add),
            Some(RegisterSpec::new(1, TypeBearer::Type(Type::Int))),
            vec![
                RegisterSpec::new(1, TypeBearer::Type(Type::Int)),
                RegisterSpec::new(0, TypeBearer::Type(Type::Int)),
            ],
        );
        meth.block_mut(2).insns.insert(0, SsaInsn::Normal(add));
        let header_if = Insn::new(
            Opcode::If(Cmp::Lt),
            None,
            vec![RegisterSpec::new(1, TypeBearer::Type(Type::Int))],
        );
        let last = meth.block(1).insns.len() - 1;
        meth.block_mut(1).insns[last] = SsaInsn::Normal(header_if);

        convert(&mut meth, false);
        assert_single_assignment(&meth);

        let header_phi = meth.block(1).phis().next().expect("loop phi");
        assert_eq!(header_phi.operands.len(), 2);
    }
}

//! Local-variable liveness snapshots for phi typing.
//!
//! Before renaming, a forward dataflow pass records which local-variable
//! binding (name, signature, type) is visible in each original register at
//! each block's entry. Phi placement consults the snapshot so a phi merging
//! a named local inherits the local's type and binding instead of minting
//! an untyped placeholder, which keeps spurious type-resolution work and
//! debug-info churn down.

use crate::rop::RegisterSpec;
use crate::ssa::method::SsaMethod;

/// Per-block, per-register local-variable visibility at block entry.
#[derive(Debug)]
pub struct LocalSnapshot {
    /// `at_entry[block][reg]`: the spec visible for `reg` when `block`
    /// begins, if any single binding survives all inbound paths.
    at_entry: Vec<Vec<Option<RegisterSpec>>>,
}

impl LocalSnapshot {
    /// Runs the forward pass to a fixpoint.
    ///
    /// An assignment carrying a local binding makes that binding visible; a
    /// plain assignment to the same register kills it. Merges keep a
    /// binding only when every inbound path agrees on it.
    #[must_use]
    pub fn compute(meth: &SsaMethod, reg_count: u32) -> Self {
        let n = meth.block_count();
        let regs = reg_count as usize;
        let mut at_entry: Vec<Vec<Option<RegisterSpec>>> = vec![vec![None; regs]; n];
        let mut seen = vec![false; n];

        let mut worklist = vec![meth.entry()];
        seen[meth.entry()] = true;

        while let Some(b) = worklist.pop() {
            let mut state = at_entry[b].clone();
            for insn in &meth.block(b).insns {
                if let Some(result) = insn.result() {
                    let reg = result.reg as usize;
                    if reg < regs {
                        state[reg] = if result.local.is_some() {
                            Some(result.clone())
                        } else {
                            None
                        };
                    }
                }
            }
            for &succ in &meth.block(b).successors {
                let changed = if seen[succ] {
                    Self::merge_into(&mut at_entry[succ], &state)
                } else {
                    seen[succ] = true;
                    at_entry[succ] = state.clone();
                    true
                };
                if changed && !worklist.contains(&succ) {
                    worklist.push(succ);
                }
            }
        }
        Self { at_entry }
    }

    /// Intersects `incoming` into `dest`, returning `true` on change.
    fn merge_into(dest: &mut [Option<RegisterSpec>], incoming: &[Option<RegisterSpec>]) -> bool {
        let mut changed = false;
        for (d, i) in dest.iter_mut().zip(incoming) {
            if d.is_some() && d != i {
                *d = None;
                changed = true;
            }
        }
        changed
    }

    /// Returns the binding visible for `reg` at the entry of `block`.
    #[must_use]
    pub fn starting_spec(&self, block: usize, reg: u32) -> Option<&RegisterSpec> {
        self.at_entry
            .get(block)
            .and_then(|state| state.get(reg as usize))
            .and_then(Option::as_ref)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rop::{Cmp, Insn, Interner, LocalInfo, Opcode, Type, TypeBearer};
    use crate::ssa::insn::SsaInsn;

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

    fn bound_spec(interner: &Interner, reg: u32, name: &str) -> RegisterSpec {
        RegisterSpec::new_local(
            reg,
            TypeBearer::Type(Type::Int),
            LocalInfo::new(interner.intern(name), interner.intern("I")),
        )
    }

    fn assign(meth: &mut SsaMethod, block: usize, result: RegisterSpec) {
        let insn = SsaInsn::Normal(Insn::new(Opcode::Move, Some(result), vec![
            RegisterSpec::new(9, TypeBearer::Type(Type::Int)),
        ]));
        meth.block_mut(block).insns.insert(0, insn);
    }

    #[test]
    fn test_binding_flows_forward() {
        let interner = Interner::new();
        let mut meth = SsaMethod::new(1, true, 10, 100);
        meth.push_block(0);
        meth.push_block(1);
        terminate(&mut meth, 0, &[1]);
        terminate(&mut meth, 1, &[]);
        meth.set_entry(0);
        assign(&mut meth, 0, bound_spec(&interner, 2, "x"));

        let snap = LocalSnapshot::compute(&meth, 10);
        let at_b1 = snap.starting_spec(1, 2).unwrap();
        assert_eq!(at_b1.local.as_ref().unwrap().name.as_ref(), "x");
        assert!(snap.starting_spec(0, 2).is_none());
    }

    #[test]
    fn test_conflicting_bindings_merge_to_none() {
        let interner = Interner::new();
        // Diamond assigning different locals to the same register.
        let mut meth = SsaMethod::new(1, true, 10, 100);
        for label in 0..4 {
            meth.push_block(label);
        }
        terminate(&mut meth, 0, &[1, 2]);
        terminate(&mut meth, 1, &[3]);
        terminate(&mut meth, 2, &[3]);
        terminate(&mut meth, 3, &[]);
        meth.set_entry(0);
        assign(&mut meth, 1, bound_spec(&interner, 2, "a"));
        assign(&mut meth, 2, bound_spec(&interner, 2, "b"));

        let snap = LocalSnapshot::compute(&meth, 10);
        assert!(snap.starting_spec(3, 2).is_none());
    }

    #[test]
    fn test_agreeing_bindings_survive_merge() {
        let interner = Interner::new();
        let mut meth = SsaMethod::new(1, true, 10, 100);
        for label in 0..4 {
            meth.push_block(label);
        }
        terminate(&mut meth, 0, &[1, 2]);
        terminate(&mut meth, 1, &[3]);
        terminate(&mut meth, 2, &[3]);
        terminate(&mut meth, 3, &[]);
        meth.set_entry(0);
        assign(&mut meth, 1, bound_spec(&interner, 2, "same"));
        assign(&mut meth, 2, bound_spec(&interner, 2, "same"));

        let snap = LocalSnapshot::compute(&meth, 10);
        let merged = snap.starting_spec(3, 2).unwrap();
        assert_eq!(merged.local.as_ref().unwrap().name.as_ref(), "same");
    }

    #[test]
    fn test_plain_assignment_kills_binding() {
        let interner = Interner::new();
        let mut meth = SsaMethod::new(1, true, 10, 100);
        meth.push_block(0);
        meth.push_block(1);
        terminate(&mut meth, 0, &[1]);
        terminate(&mut meth, 1, &[]);
        meth.set_entry(0);
        // Bind then overwrite without a binding, in execution order.
        assign(&mut meth, 0, RegisterSpec::new(2, TypeBearer::Type(Type::Int)));
        assign(&mut meth, 0, bound_spec(&interner, 2, "x"));

        let snap = LocalSnapshot::compute(&meth, 10);
        assert!(snap.starting_spec(1, 2).is_none());
    }
}

//! Register IR to SSA conversion.
//!
//! The pipeline: validate and import the labeled block graph, split edges,
//! compute dominance, snapshot local-variable visibility, place phis,
//! rename, and finally synthesize the single exit block that aggregates
//! every return and throw path (the postdominator computation and the
//! back-conversion's liveness both want one).

use crate::rop::{Branchingness, RopMethod};
use crate::ssa::dominators::DomTree;
use crate::ssa::frontier::DomFront;
use crate::ssa::insn::SsaInsn;
use crate::ssa::locals::LocalSnapshot;
use crate::ssa::method::SsaMethod;
use crate::ssa::normalize::EdgeSplitter;
use crate::ssa::placement::PhiPlacer;
use crate::ssa::rename::Renamer;
use crate::Result;

/// Converts a register IR method into SSA form.
///
/// # Errors
///
/// Returns [`crate::Error::MalformedGraph`] when the input graph violates
/// a structural invariant: a dangling successor label, a missing entry
/// block, a block not ending in a branch, or a branch mid-block.
pub fn convert_to_ssa(rop: &RopMethod, preserve_locals: bool) -> Result<SsaMethod> {
    let mut meth = build(rop)?;
    EdgeSplitter::split(&mut meth)?;
    run_passes(&mut meth, 0, preserve_locals)?;
    make_exit_block(&mut meth);
    Ok(meth)
}

/// Re-establishes SSA form after an optimization pass minted registers at
/// or above `threshold`: places phis for the new registers only, then
/// renames.
///
/// # Errors
///
/// Returns [`crate::Error::MalformedGraph`] if the graph has been left in
/// an inconsistent state by the intervening pass.
pub fn update_ssa(meth: &mut SsaMethod, threshold: u32, preserve_locals: bool) -> Result<()> {
    run_passes(meth, threshold, preserve_locals)
}

fn run_passes(meth: &mut SsaMethod, threshold: u32, preserve_locals: bool) -> Result<()> {
    let dom = DomTree::compute(meth, false)?;
    dom.populate_dom_children(meth);
    let front = DomFront::compute(meth, &dom);
    let snapshot = LocalSnapshot::compute(meth, meth.reg_count());
    PhiPlacer::place(meth, &front, &snapshot, threshold);
    Renamer::rename(meth, preserve_locals);
    Ok(())
}

/// Imports the labeled block graph into the dense-index SSA block vector.
fn build(rop: &RopMethod) -> Result<SsaMethod> {
    let label_index = rop.label_index();
    let entry = *label_index
        .get(&rop.entry_label)
        .ok_or_else(|| malformed_graph!("entry label @{} has no block", rop.entry_label))?;

    let mut meth = SsaMethod::new(
        rop.param_width,
        rop.is_static,
        rop.reg_count(),
        rop.max_label(),
    );
    for block in &rop.blocks {
        meth.push_block(block.label);
    }
    meth.set_entry(entry);

    for (i, block) in rop.blocks.iter().enumerate() {
        if !block.is_well_terminated() {
            return Err(malformed_graph!(
                "block @{} does not end in a well-formed branch",
                block.label
            ));
        }
        for (j, insn) in block.insns.iter().enumerate() {
            if j + 1 < block.insns.len() && insn.branchingness() != Branchingness::None {
                return Err(malformed_graph!(
                    "branching instruction mid-block in @{} at {}",
                    block.label,
                    j
                ));
            }
            meth.block_mut(i).insns.push(SsaInsn::Normal(insn.clone()));
        }
        for succ_label in &block.successors {
            let succ = *label_index.get(succ_label).ok_or_else(|| {
                malformed_graph!("block @{} names dangling successor @{succ_label}", block.label)
            })?;
            meth.add_edge(i, succ);
        }
        meth.block_mut(i).primary_successor = block
            .primary_successor
            .and_then(|label| label_index.get(&label).copied());
    }
    Ok(meth)
}

/// Adds a synthetic exit block fed by every block with no successors.
///
/// Methods that never return (an unconditional infinite loop) get no exit
/// block; the postdominator computation reports this to its caller.
fn make_exit_block(meth: &mut SsaMethod) {
    let tails: Vec<usize> = meth
        .blocks()
        .iter()
        .filter(|b| b.successors.is_empty() && !b.insns.is_empty())
        .map(|b| b.index)
        .collect();
    if tails.is_empty() {
        return;
    }
    let label = meth.make_label();
    let exit = meth.push_block(label);
    for tail in tails {
        meth.add_edge(tail, exit);
        meth.block_mut(tail).primary_successor = Some(exit);
    }
    meth.set_exit(exit);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rop::{
        Cmp, Constant, Insn, Opcode, RegisterSpec, RopBlock, Type, TypeBearer,
    };

    fn spec(reg: u32) -> RegisterSpec {
        RegisterSpec::new(reg, TypeBearer::Type(Type::Int))
    }

    fn param_block(label: u32, succ: u32) -> RopBlock {
        RopBlock::new(
            label,
            vec![
                Insn::new(Opcode::MoveParam, Some(spec(0)), Vec::new()),
                Insn::new(Opcode::Goto, None, Vec::new()),
            ],
            vec![succ],
            Some(succ),
        )
    }

    /// entry -> cond -> {left, right} -> join -> return, both arms writing
    /// register 1.
    fn diamond_rop() -> RopMethod {
        let entry = param_block(0, 1);
        let cond = RopBlock::new(
            1,
            vec![Insn::new(Opcode::If(Cmp::Eq), None, vec![spec(0)])],
            vec![2, 3],
            Some(3),
        );
        let left = RopBlock::new(
            2,
            vec![
                Insn::new_const(1, Constant::Int(1)),
                Insn::new(Opcode::Goto, None, Vec::new()),
            ],
            vec![4],
            Some(4),
        );
        let right = RopBlock::new(
            3,
            vec![
                Insn::new_const(1, Constant::Int(2)),
                Insn::new(Opcode::Goto, None, Vec::new()),
            ],
            vec![4],
            Some(4),
        );
        let join = RopBlock::new(
            4,
            vec![Insn::new(Opcode::Return, None, vec![spec(1)])],
            Vec::new(),
            None,
        );
        RopMethod::new(vec![entry, cond, left, right, join], 0, 1, true)
    }

    #[test]
    fn test_convert_produces_ssa() {
        let rop = diamond_rop();
        let meth = convert_to_ssa(&rop, false).unwrap();

        // Single-assignment across reachable blocks.
        let reachable = meth.reachable_from_entry();
        let mut seen = std::collections::HashSet::new();
        for block in meth.blocks() {
            if !reachable.contains(block.index) {
                continue;
            }
            for insn in &block.insns {
                if let Some(result) = insn.result() {
                    assert!(seen.insert(result.reg), "duplicate def of v{}", result.reg);
                }
            }
        }

        // The join has exactly one phi with two operands.
        let join = meth
            .blocks()
            .iter()
            .find(|b| b.rop_label == 4)
            .expect("join survives");
        assert_eq!(join.phi_count(), 1);
        assert_eq!(join.phis().next().unwrap().operands.len(), 2);
    }

    #[test]
    fn test_exit_block_synthesized() {
        let rop = diamond_rop();
        let meth = convert_to_ssa(&rop, false).unwrap();
        let exit = meth.exit().expect("exit exists");
        assert!(meth.block(exit).insns.is_empty());
        assert!(!meth.block(exit).predecessors.is_empty());
        // Postdominators are computable once the exit exists.
        assert!(DomTree::compute(&meth, true).is_ok());
    }

    #[test]
    fn test_dangling_successor_rejected() {
        let mut rop = diamond_rop();
        rop.blocks[1].successors[0] = 77;
        assert!(convert_to_ssa(&rop, false).is_err());
    }

    #[test]
    fn test_missing_entry_rejected() {
        let mut rop = diamond_rop();
        rop.entry_label = 42;
        assert!(convert_to_ssa(&rop, false).is_err());
    }

    #[test]
    fn test_unterminated_block_rejected() {
        let mut rop = diamond_rop();
        rop.blocks[2].insns.pop();
        assert!(convert_to_ssa(&rop, false).is_err());
    }

    #[test]
    fn test_mid_block_branch_rejected() {
        let mut rop = diamond_rop();
        rop.blocks[0]
            .insns
            .insert(0, Insn::new(Opcode::Goto, None, Vec::new()));
        assert!(convert_to_ssa(&rop, false).is_err());
    }

    #[test]
    fn test_update_ssa_round_trip() {
        let rop = diamond_rop();
        let mut meth = convert_to_ssa(&rop, false).unwrap();
        let before: usize = meth.blocks().iter().map(|b| b.insns.len()).sum();

        update_ssa(&mut meth, 0, false).unwrap();
        let after: usize = meth.blocks().iter().map(|b| b.insns.len()).sum();
        assert_eq!(before, after);
    }

    #[test]
    fn test_infinite_loop_has_no_exit() {
        let spin = RopBlock::new(
            0,
            vec![Insn::new(Opcode::Goto, None, Vec::new())],
            vec![0],
            Some(0),
        );
        let rop = RopMethod::new(vec![spin], 0, 0, true);
        let meth = convert_to_ssa(&rop, false).unwrap();
        assert!(meth.exit().is_none());
    }
}

//! CFG normalization by edge splitting.
//!
//! Phi insertion and the later phi-elimination moves need edges that can
//! host code: no block may be a merge point and a branch point at once,
//! no exception-capturing block may be shared between predecessors, and no
//! critical edge (branchy source into mergey target) may survive. Three
//! rewrites establish this, each over a snapshot of the block list so
//! blocks minted mid-rewrite are not revisited.

use crate::rop::{Insn, Opcode};
use crate::ssa::insn::SsaInsn;
use crate::ssa::method::SsaMethod;
use crate::Result;

/// Runs the three edge-splitting rewrites over a method.
pub struct EdgeSplitter;

impl EdgeSplitter {
    /// Normalizes the method in place.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::MalformedGraph`] if an exception-capturing
    /// block cannot be split because its capture instruction resists
    /// cloning.
    pub fn split(meth: &mut SsaMethod) -> Result<()> {
        Self::split_predecessors(meth);
        Self::split_exception_captures(meth)?;
        Self::split_successors(meth);
        Ok(())
    }

    /// Mints a forwarding block that jumps to `to`, without wiring any
    /// edges yet.
    fn make_forwarding_block(meth: &mut SsaMethod, to: usize) -> usize {
        let label = meth.make_label();
        let index = meth.push_block(label);
        let block = meth.block_mut(index);
        block
            .insns
            .push(SsaInsn::Normal(Insn::new(Opcode::Goto, None, Vec::new())));
        block.primary_successor = Some(to);
        index
    }

    /// Rewrite 1: a block that is both a merge point and a branch point
    /// gets one fresh predecessor collecting all its inbound edges.
    fn split_predecessors(meth: &mut SsaMethod) {
        let snapshot = meth.block_count();
        for b in 0..snapshot {
            let block = meth.block(b);
            if block.predecessors.len() < 2 || block.successors.len() < 2 {
                continue;
            }
            let preds: Vec<usize> = block.predecessors.iter().copied().collect();
            let fresh = Self::make_forwarding_block(meth, b);
            for pred in preds {
                meth.redirect_edge(pred, b, fresh);
            }
            meth.add_edge(fresh, b);
        }
    }

    /// Rewrite 2: a shared block whose first instruction captures the
    /// in-flight exception is split so each predecessor delivers the
    /// capture in its own block.
    fn split_exception_captures(meth: &mut SsaMethod) -> Result<()> {
        let snapshot = meth.block_count();
        for b in 0..snapshot {
            let block = meth.block(b);
            if block.predecessors.len() < 2 {
                continue;
            }
            let captures = matches!(
                block.insns.first(),
                Some(SsaInsn::Normal(insn)) if insn.opcode == Opcode::MoveException
            );
            if !captures {
                continue;
            }
            let capture = block.insns[0].duplicate()?;
            let preds: Vec<usize> = block.predecessors.iter().copied().collect();
            for pred in preds {
                let fresh = Self::make_forwarding_block(meth, b);
                meth.block_mut(fresh).insns.insert(0, capture.clone());
                meth.redirect_edge(pred, b, fresh);
                meth.add_edge(fresh, b);
            }
            meth.block_mut(b).insns.remove(0);
        }
        Ok(())
    }

    /// Rewrite 3: every critical edge (branchy source into mergey target)
    /// gets an intermediate block, except when the source's terminator is a
    /// pure control transfer that reads and writes nothing.
    fn split_successors(meth: &mut SsaMethod) {
        let snapshot = meth.block_count();
        for b in 0..snapshot {
            let block = meth.block(b);
            if block.successors.len() < 2 {
                continue;
            }
            let exempt = block.insns.last().is_some_and(|last| match last {
                SsaInsn::Normal(insn) => insn.result.is_none() && insn.sources.is_empty(),
                SsaInsn::Phi(_) => false,
            });
            if exempt {
                continue;
            }
            let succs = block.successors.clone();
            for succ in succs {
                if succ < snapshot && meth.block(succ).predecessors.len() >= 2 {
                    let fresh = Self::make_forwarding_block(meth, succ);
                    meth.redirect_edge(b, succ, fresh);
                    meth.add_edge(fresh, succ);
                }
            }
        }
    }
}

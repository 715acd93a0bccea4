//! Dominance-frontier construction.
//!
//! The frontier of a block `b` is the set of blocks where `b`'s dominance
//! ends: the first blocks on some path that `b` does not strictly
//! dominate. Phi placement inserts merges exactly at frontier blocks.
//!
//! Built with the predecessor-walk formulation: every join block (two or
//! more predecessors) is pushed into the frontier of each predecessor and
//! of that predecessor's dominator-tree ancestors, stopping below the join
//! block's immediate dominator. The walk also stops early when the join is
//! already present, since an earlier predecessor's walk has then already
//! covered the remaining ancestors.

use crate::ssa::dominators::DomTree;
use crate::ssa::method::SsaMethod;
use crate::utils::BlockSet;

/// Per-block dominance frontiers.
#[derive(Debug)]
pub struct DomFront {
    frontiers: Vec<BlockSet>,
}

impl DomFront {
    /// Computes the dominance frontier of every block reachable in `dom`.
    ///
    /// Unreachable blocks get empty frontiers and are never added to any
    /// frontier.
    #[must_use]
    pub fn compute(meth: &SsaMethod, dom: &DomTree) -> Self {
        let n = meth.block_count();
        let mut frontiers: Vec<BlockSet> = (0..n).map(|_| BlockSet::new(n)).collect();

        for block in meth.blocks() {
            let b = block.index;
            if block.predecessors.len() < 2 || !dom.is_reachable(b) {
                continue;
            }
            let stop = dom.idom(b);
            for &pred in &block.predecessors {
                if !dom.is_reachable(pred) {
                    continue;
                }
                let mut runner = pred;
                while Some(runner) != stop {
                    if !frontiers[runner].insert(b) {
                        break;
                    }
                    match dom.idom(runner) {
                        Some(up) => runner = up,
                        None => break,
                    }
                }
            }
        }
        Self { frontiers }
    }

    /// Returns the frontier of one block.
    #[must_use]
    pub fn frontier(&self, block: usize) -> &BlockSet {
        &self.frontiers[block]
    }
}

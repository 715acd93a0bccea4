//! Small shared utilities.
//!
//! Currently this is only the block/register set machinery used by the
//! dominance and dataflow passes.

mod blockset;

pub use blockset::{BitSet, BlockSet};

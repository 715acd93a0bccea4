//! SSA form: construction, data model, and dominance machinery.

mod block;
mod convert;
mod dominators;
mod frontier;
mod insn;
mod locals;
mod method;
mod normalize;
mod placement;
mod rename;

pub use block::SsaBasicBlock;
pub use convert::{convert_to_ssa, update_ssa};
pub use dominators::DomTree;
pub use frontier::DomFront;
pub use insn::{PhiInsn, PhiOperand, SsaInsn};
pub use locals::LocalSnapshot;
pub use method::{InsnSite, SsaMethod};
pub use normalize::EdgeSplitter;
pub use placement::{Liveness, PhiPlacer};
pub use rename::Renamer;

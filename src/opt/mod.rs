//! The optimization pipeline.
//!
//! [`optimize`] takes one register IR method through SSA conversion,
//! constant propagation, and dead-code removal, returning the SSA-form
//! method ready for back-conversion. [`optimize_all`] fans a batch of
//! methods out over a worker pool; methods are independent units of work
//! and one method's failure never aborts its siblings.

mod config;
mod dead_code;
mod sccp;

pub use config::{NeverAdvice, OptimizationContext, TranslationAdvice};
pub use dead_code::DeadCodeRemover;
pub use sccp::Sccp;

use rayon::prelude::*;

use crate::rop::RopMethod;
use crate::ssa::{convert_to_ssa, SsaMethod};
use crate::Result;

/// Runs the full pass pipeline over one method.
///
/// # Errors
///
/// Returns [`crate::Error::MalformedGraph`] when the input graph is
/// structurally invalid; no partial output is produced.
pub fn optimize(rop: &RopMethod, ctx: &OptimizationContext) -> Result<SsaMethod> {
    let mut meth = convert_to_ssa(rop, ctx.preserve_locals)?;
    Sccp::optimize(&mut meth, ctx);
    DeadCodeRemover::optimize(&mut meth, ctx);
    Ok(meth)
}

/// Optimizes a batch of methods in parallel, one worker per method.
///
/// Results are returned in input order. Failures are isolated per method.
#[must_use]
pub fn optimize_all(methods: &[RopMethod], ctx: &OptimizationContext) -> Vec<Result<SsaMethod>> {
    methods.par_iter().map(|rop| optimize(rop, ctx)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rop::{Constant, Insn, Opcode, RopBlock};

    fn const_return_method(value: i32) -> RopMethod {
        let block = RopBlock::new(
            0,
            vec![
                Insn::new_const(0, Constant::Int(value)),
                Insn::new(
                    Opcode::Return,
                    None,
                    vec![crate::rop::RegisterSpec::new(
                        0,
                        crate::rop::TypeBearer::Type(crate::rop::Type::Int),
                    )],
                ),
            ],
            Vec::new(),
            None,
        );
        RopMethod::new(vec![block], 0, 0, true)
    }

    #[test]
    fn test_optimize_all_isolates_failures() {
        let good = const_return_method(1);
        let mut bad = const_return_method(2);
        bad.entry_label = 99;

        let results = optimize_all(&[good, bad], &OptimizationContext::default());
        assert_eq!(results.len(), 2);
        assert!(results[0].is_ok());
        assert!(results[1].is_err());
    }

    #[test]
    fn test_optimize_single_method() {
        let meth = optimize(&const_return_method(7), &OptimizationContext::default()).unwrap();
        assert!(meth.block_count() >= 1);
    }
}

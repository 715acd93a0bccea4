//! Optimizer configuration.
//!
//! Passes never read process-wide state: everything policy-shaped arrives
//! through an [`OptimizationContext`] handed to each pass entry point. The
//! context is cheap to clone and safe to share across the per-method worker
//! threads.

use std::sync::Arc;

use crate::rop::{Opcode, RegisterSpec};

/// Target-specific queries consulted by the literal-operand and
/// constant-collection passes.
///
/// Both queries are pure; an implementation answers from static knowledge
/// of the output instruction set.
pub trait TranslationAdvice: Send + Sync {
    /// Does `op` have a cheap immediate-operand form for these operands?
    fn has_constant_operation(&self, op: &Opcode, a: &RegisterSpec, b: &RegisterSpec) -> bool;

    /// Must a call-like `op` receive its sources in strictly increasing,
    /// contiguous register order?
    fn requires_sources_in_order(&self, op: &Opcode, sources: &[RegisterSpec]) -> bool;
}

/// Advice that declines every query; the conservative default.
#[derive(Debug, Default, Clone, Copy)]
pub struct NeverAdvice;

impl TranslationAdvice for NeverAdvice {
    fn has_constant_operation(&self, _op: &Opcode, _a: &RegisterSpec, _b: &RegisterSpec) -> bool {
        false
    }

    fn requires_sources_in_order(&self, _op: &Opcode, _sources: &[RegisterSpec]) -> bool {
        false
    }
}

/// Immutable per-run optimizer policy.
#[derive(Clone)]
pub struct OptimizationContext {
    /// Keep local-variable-binding moves alive for debug fidelity. Affects
    /// move elision during renaming and side-effect classification during
    /// dead-code removal.
    pub preserve_locals: bool,
    /// Target knowledge injected by the embedding translator.
    pub advice: Arc<dyn TranslationAdvice>,
}

impl OptimizationContext {
    /// Creates a context with explicit advice.
    #[must_use]
    pub fn new(preserve_locals: bool, advice: Arc<dyn TranslationAdvice>) -> Self {
        Self {
            preserve_locals,
            advice,
        }
    }
}

impl Default for OptimizationContext {
    fn default() -> Self {
        Self {
            preserve_locals: true,
            advice: Arc::new(NeverAdvice),
        }
    }
}

impl std::fmt::Debug for OptimizationContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OptimizationContext")
            .field("preserve_locals", &self.preserve_locals)
            .finish_non_exhaustive()
    }
}

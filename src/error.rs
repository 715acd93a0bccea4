//! Error types for all engine operations.

use thiserror::Error;

macro_rules! malformed_graph {
    // Single string version
    ($msg:expr) => {
        $crate::Error::MalformedGraph {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    // Format string with arguments version
    ($fmt:expr, $($arg:tt)*) => {
        $crate::Error::MalformedGraph {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

/// The generic Error type covering every failure this engine can report.
///
/// The engine distinguishes two fatal error families: malformed-graph
/// errors, which are programming errors in the engine or its caller, and
/// unsupported-construct errors, which point at a miscompiled input method.
/// Neither is recoverable for the affected method; a caller processing many
/// methods isolates failures at the per-method boundary.
///
/// Capacity conditions (e.g. the register count outgrowing what a
/// back-conversion strategy can color) are deliberately *not* errors here:
/// the caller reads [`crate::ssa::SsaMethod::reg_count`] after optimization
/// and decides whether to re-run with a reduced pass set.
#[derive(Error, Debug)]
pub enum Error {
    /// The control-flow graph violates a structural invariant.
    ///
    /// Examples: a block whose last instruction cannot terminate a block, a
    /// successor index out of range, or a phi cloned through the generic
    /// duplication path. These are defects in the engine or in the upstream
    /// translator, never conditions to recover from. The source location
    /// where the violation was detected is captured for debugging.
    #[error("Malformed graph - {file}:{line}: {message}")]
    MalformedGraph {
        /// Description of the violated invariant, with block/instruction context.
        message: String,
        /// Source file in which the violation was detected.
        file: &'static str,
        /// Source line in which the violation was detected.
        line: u32,
    },

    /// The input uses a construct the engine cannot represent.
    ///
    /// The canonical case is a phi whose operand descriptors cannot be
    /// merged to a common type. All conflicting descriptors are carried so
    /// the caller can diagnose the miscompiled input.
    #[error("Unsupported construct - {message}: [{}]", conflicting.join(", "))]
    UnsupportedConstruct {
        /// What could not be merged or represented.
        message: String,
        /// Renderings of the conflicting descriptors.
        conflicting: Vec<String>,
    },

    /// Generic error for miscellaneous failures.
    #[error("{0}")]
    Error(String),
}

//! Fine-tuning transformation errors

use thiserror::Error;

/// Errors raised while rewriting a module tree for fine-tuning.
///
/// All variants abort setup; the tree may be left partially transformed
/// and there is no rollback.
#[derive(Error, Debug)]
pub enum FineTuneError {
    /// A node already carrying the fine-tunable marker was reached again.
    /// Signals a double-application bug in caller usage.
    #[error("module {name} is already fine-tunable")]
    AlreadyFinetuable { name: String },

    /// A strategy failed while handling the named node.
    #[error("strategy failed at {name}: {reason}")]
    Strategy { name: String, reason: String },
}

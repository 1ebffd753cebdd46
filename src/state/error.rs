//! State serialization errors

use thiserror::Error;

/// Checkpoint save/load errors
#[derive(Error, Debug)]
pub enum StateError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Checkpoint validation error: {0}")]
    Validation(String),

    #[error("Size mismatch for {key}: expected {expected}, got {actual}")]
    SizeMismatch { key: String, expected: usize, actual: usize },
}

//! Pipeline-specific error types.

use crate::types::ScalarKind;
use thiserror::Error;

/// Errors that can occur while compiling, restricting or draining a pipeline.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Malformed descriptor: both/neither child set, mismatched children, bad options
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Unknown source, dataset or variant
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unknown directive '{0}'")]
    UnknownDirective(String),

    /// Encoder asked to serialize a kind pair outside its whitelist
    #[error("Unsupported types: x={x}, y={y}")]
    UnsupportedType { x: ScalarKind, y: ScalarKind },

    /// `peek()`/`next()` called on an exhausted node
    #[error("End of sequence")]
    EndOfSequence,

    #[error("Kind mismatch: expected {expected}, found {found}")]
    KindMismatch {
        expected: ScalarKind,
        found: ScalarKind,
    },

    #[error("Invalid range: {0}")]
    InvalidRange(String),

    #[error("Value out of range: {0}")]
    ValueOutOfRange(String),

    #[error("Encoder state error: {0}")]
    EncoderState(String),

    #[error("Script error: {0}")]
    Script(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    /// Returns true for errors caused by the request rather than by the engine
    /// or its collaborators. These map onto a rejected request (4xx).
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            PipelineError::Configuration(_)
                | PipelineError::NotFound(_)
                | PipelineError::UnknownDirective(_)
                | PipelineError::UnsupportedType { .. }
                | PipelineError::KindMismatch { .. }
                | PipelineError::InvalidRange(_)
        )
    }
}

pub type PipelineResult<T> = std::result::Result<T, PipelineError>;

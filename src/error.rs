//! Error handling for perfstream
//!
//! Pipeline work reports [`PipelineError`]; everything around it (config
//! loading, request parsing, output files) reports [`PerfStreamError`], which
//! wraps pipeline errors and can carry context.

use crate::pipeline::error::PipelineError;
use thiserror::Error;

/// Main error type for perfstream operations
#[derive(Error, Debug)]
pub enum PerfStreamError {
    /// Errors raised while compiling or draining pipelines
    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    /// Errors related to configuration loading/saving
    #[error("Configuration error: {0}")]
    Config(String),

    /// Malformed request documents
    #[error("Request error: {0}")]
    Request(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic errors with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<PerfStreamError>,
    },
}

impl PerfStreamError {
    /// Add context to an error
    pub fn with_context(self, context: impl Into<String>) -> Self {
        PerfStreamError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// The pipeline error at the root of this error, if any
    pub fn pipeline_error(&self) -> Option<&PipelineError> {
        match self {
            PerfStreamError::Pipeline(e) => Some(e),
            PerfStreamError::WithContext { source, .. } => source.pipeline_error(),
            _ => None,
        }
    }

    /// Returns true when the error was caused by the caller's input
    pub fn is_client_error(&self) -> bool {
        match self {
            PerfStreamError::Request(_) => true,
            PerfStreamError::WithContext { source, .. } => source.is_client_error(),
            other => other.pipeline_error().is_some_and(|e| e.is_client_error()),
        }
    }
}

impl From<serde_json::Error> for PerfStreamError {
    fn from(err: serde_json::Error) -> Self {
        PerfStreamError::Serialization(err.to_string())
    }
}

/// Result type alias for perfstream operations
pub type Result<T> = std::result::Result<T, PerfStreamError>;

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error result
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Add context lazily to an error result
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| e.with_context(f()))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, PipelineError> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| PerfStreamError::from(e).with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| PerfStreamError::from(e).with_context(f()))
    }
}

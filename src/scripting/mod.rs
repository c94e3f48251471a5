//! Rhai evaluator for `expr` stages
//!
//! An expression stage hands every sample to an [`Evaluator`] together with the
//! expression text. The production implementation is [`ScriptEngine`], which
//! compiles each distinct expression once and evaluates it with the sample
//! bound into the scope.
//!
//! ## Bound variables
//!
//! - `x` / `X` - the sample's X value (`Instant` as Unix seconds)
//! - `y` / `Y` - the sample's Y value
//!
//! `Instant` and `Integer` values are bound as Rhai integers, `Real32` and
//! `Real64` as floats. Integer and float operands mix freely.
//!
//! ## Example Expressions
//!
//! Bytes to megabytes:
//! ```rhai
//! y / 1048576.0
//! ```
//!
//! Clamp a noisy percentage:
//! ```rhai
//! clamp(y, 0.0, 100.0)
//! ```
//!
//! Daily sawtooth from the timestamp:
//! ```rhai
//! x % 86400
//! ```

mod engine;

pub use engine::ScriptEngine;

use crate::pipeline::error::{PipelineError, PipelineResult};
use crate::types::Scalar;
use rhai::{Engine, AST};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Evaluates an arithmetic expression over one sample.
///
/// Implementations must be deterministic: the same expression and inputs
/// always produce the same value and kind.
pub trait Evaluator: Send + Sync {
    fn evaluate(&self, expression: &str, x: Scalar, y: Scalar) -> PipelineResult<Scalar>;
}

/// Cache of compiled expressions, keyed by source text
#[derive(Default)]
pub struct ScriptCache {
    cache: RwLock<HashMap<String, Arc<AST>>>,
}

impl ScriptCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a cached AST or compile and cache it
    pub fn get_or_compile(&self, engine: &Engine, source: &str) -> PipelineResult<Arc<AST>> {
        {
            let cache = self.cache.read().map_err(|e| {
                PipelineError::Script(format!("Failed to acquire cache lock: {}", e))
            })?;
            if let Some(ast) = cache.get(source) {
                return Ok(Arc::clone(ast));
            }
        }

        let ast = engine
            .compile(source)
            .map_err(|e| PipelineError::Script(format!("Compilation error: {}", e)))?;
        let ast = Arc::new(ast);

        let mut cache = self
            .cache
            .write()
            .map_err(|e| PipelineError::Script(format!("Failed to acquire cache lock: {}", e)))?;
        // Another thread may have compiled the same source meanwhile
        let entry = cache
            .entry(source.to_string())
            .or_insert_with(|| Arc::clone(&ast));

        Ok(Arc::clone(entry))
    }

    pub fn len(&self) -> usize {
        self.cache.read().map(|c| c.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        if let Ok(mut cache) = self.cache.write() {
            cache.clear();
        }
    }
}

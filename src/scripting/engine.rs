//! Rhai Script Engine Implementation
//!
//! Binds one sample into a fresh scope per call and evaluates a cached AST.
//! Results are mapped back onto [`Scalar`]:
//! - Rhai integers become `Integer` when they fit in 32 bits, `Real64` otherwise
//! - Rhai floats become `Real64` if either input was `Real64`, `Real32` otherwise
//! - anything else is a script error

use crate::pipeline::error::{PipelineError, PipelineResult};
use crate::scripting::{Evaluator, ScriptCache};
use crate::types::{Scalar, ScalarKind};
use rhai::{Dynamic, Engine, Scope, FLOAT, INT};
use std::sync::Arc;
use tracing::trace;

/// The script engine backing `expr` stages
pub struct ScriptEngine {
    /// The Rhai engine instance
    engine: Engine,
    /// Compiled expressions, shared by every stage that uses this engine
    cache: Arc<ScriptCache>,
}

impl ScriptEngine {
    /// Create a new script engine with default configuration
    pub fn new() -> Self {
        Self::with_cache(Arc::new(ScriptCache::new()))
    }

    /// Create a new script engine with a shared cache
    pub fn with_cache(cache: Arc<ScriptCache>) -> Self {
        let mut engine = Engine::new();
        Self::configure_engine(&mut engine);

        Self { engine, cache }
    }

    /// Configure the Rhai engine with math helpers and safety limits
    fn configure_engine(engine: &mut Engine) {
        // Set safety limits
        engine.set_max_expr_depths(64, 64);
        engine.set_max_call_levels(32);
        engine.set_max_operations(10_000);
        engine.set_max_string_size(10_000);
        engine.set_max_array_size(1_000);
        engine.set_max_map_size(1_000);

        // ===== Mathematical Functions =====

        engine.register_fn("abs", |x: FLOAT| x.abs());
        engine.register_fn("sqrt", |x: FLOAT| x.sqrt());
        engine.register_fn("pow", |x: FLOAT, y: FLOAT| x.powf(y));
        engine.register_fn("exp", |x: FLOAT| x.exp());
        engine.register_fn("ln", |x: FLOAT| x.ln());
        engine.register_fn("log10", |x: FLOAT| x.log10());
        engine.register_fn("log2", |x: FLOAT| x.log2());

        // Rounding functions
        engine.register_fn("floor", |x: FLOAT| x.floor());
        engine.register_fn("ceil", |x: FLOAT| x.ceil());
        engine.register_fn("round", |x: FLOAT| x.round());
        engine.register_fn("trunc", |x: FLOAT| x.trunc());

        // Clamping and limiting
        engine.register_fn("clamp", |x: FLOAT, min: FLOAT, max: FLOAT| x.clamp(min, max));
        engine.register_fn("clamp", |x: INT, min: INT, max: INT| x.clamp(min, max));
        engine.register_fn("min", |a: FLOAT, b: FLOAT| a.min(b));
        engine.register_fn("max", |a: FLOAT, b: FLOAT| a.max(b));
        engine.register_fn("min", |a: INT, b: INT| a.min(b));
        engine.register_fn("max", |a: INT, b: INT| a.max(b));

        // Type conversions
        engine.register_fn("to_int", |x: FLOAT| x as INT);
        engine.register_fn("to_float", |x: INT| x as FLOAT);

        // Constants
        engine.register_fn("pi", || std::f64::consts::PI);
        engine.register_fn("e", || std::f64::consts::E);

        // Utility functions
        engine.register_fn("is_nan", |x: FLOAT| x.is_nan());
        engine.register_fn("is_finite", |x: FLOAT| x.is_finite());

        // Map value from one range to another
        engine.register_fn(
            "map_range",
            |x: FLOAT, in_min: FLOAT, in_max: FLOAT, out_min: FLOAT, out_max: FLOAT| {
                (x - in_min) * (out_max - out_min) / (in_max - in_min) + out_min
            },
        );
    }

    /// Validate an expression without evaluating it
    pub fn validate(&self, source: &str) -> PipelineResult<()> {
        self.engine
            .compile(source)
            .map(|_| ())
            .map_err(|e| PipelineError::Script(format!("Validation error: {}", e)))
    }

    /// Get a reference to the shared cache
    pub fn cache(&self) -> &Arc<ScriptCache> {
        &self.cache
    }

    fn bind(value: Scalar) -> Dynamic {
        match value {
            Scalar::Instant(t) => Dynamic::from(t.timestamp() as INT),
            Scalar::Integer(v) => Dynamic::from(v as INT),
            Scalar::Real32(v) => Dynamic::from(v as FLOAT),
            Scalar::Real64(v) => Dynamic::from(v),
        }
    }

    fn unbind(result: Dynamic, wide: bool) -> PipelineResult<Scalar> {
        if let Ok(i) = result.as_int() {
            return Ok(match i32::try_from(i) {
                Ok(v) => Scalar::Integer(v),
                Err(_) => Scalar::Real64(i as f64),
            });
        }

        if let Ok(f) = result.as_float() {
            return Ok(if wide {
                Scalar::Real64(f)
            } else {
                Scalar::Real32(f as f32)
            });
        }

        Err(PipelineError::Script(format!(
            "Expression must return a number, got {}",
            result.type_name()
        )))
    }
}

impl Evaluator for ScriptEngine {
    fn evaluate(&self, expression: &str, x: Scalar, y: Scalar) -> PipelineResult<Scalar> {
        let ast = self.cache.get_or_compile(&self.engine, expression)?;

        let mut scope = Scope::new();
        for (names, value) in [(["x", "X"], x), (["y", "Y"], y)] {
            for name in names {
                scope.push_dynamic(name, Self::bind(value));
            }
        }

        let result = self
            .engine
            .eval_ast_with_scope::<Dynamic>(&mut scope, &ast)
            .map_err(|e| PipelineError::Script(format!("Execution error: {}", e)))?;

        let wide = x.kind() == ScalarKind::Real64 || y.kind() == ScalarKind::Real64;
        let value = Self::unbind(result, wide)?;
        trace!(expression, %x, %y, %value, "evaluated expression");

        Ok(value)
    }
}

impl Default for ScriptEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ScriptEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptEngine")
            .field("cache_size", &self.cache.len())
            .finish()
    }
}

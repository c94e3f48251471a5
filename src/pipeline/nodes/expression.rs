//! Expression stage: maps every sample's Y through an arithmetic expression.
//!
//! The output Y kind is decided once, by evaluating the expression against the
//! zero values of the child's kinds. Later results of another kind are cast
//! back to it so the declared kind holds for the whole stream.

use crate::pipeline::error::{PipelineError, PipelineResult};
use crate::pipeline::node::{AnyNode, Sample, StreamNode};
use crate::range::DataRange;
use crate::scripting::Evaluator;
use crate::types::ScalarKind;
use serde::Deserialize;
use std::sync::Arc;

/// Options accepted by the `expr` directive.
#[derive(Debug, Clone, Deserialize)]
pub struct ExpressionOptions {
    /// Expression over `x` and `y`
    pub expression: String,
}

/// Expression: emits `(x, f(x, y))` for every child sample.
pub struct ExpressionStage {
    child: AnyNode,
    expression: String,
    evaluator: Arc<dyn Evaluator>,
    y_kind: ScalarKind,
}

impl ExpressionStage {
    pub fn new(
        child: AnyNode,
        options: ExpressionOptions,
        evaluator: Arc<dyn Evaluator>,
    ) -> PipelineResult<Self> {
        let (x_kind, y_kind) = (child.x_kind(), child.y_kind());
        if !x_kind.is_scalar() || !y_kind.is_scalar() {
            return Err(PipelineError::Configuration(format!(
                "expr cannot bind x={}, y={}",
                x_kind, y_kind
            )));
        }

        let inferred = evaluator
            .evaluate(&options.expression, x_kind.zero(), y_kind.zero())
            .map_err(|e| {
                PipelineError::Configuration(format!(
                    "expression '{}' does not evaluate: {}",
                    options.expression, e
                ))
            })?;

        Ok(Self {
            child,
            expression: options.expression,
            evaluator,
            y_kind: inferred.kind(),
        })
    }

    pub fn name(&self) -> &str {
        "expr"
    }

    pub fn expression(&self) -> &str {
        &self.expression
    }

    pub fn x_kind(&self) -> ScalarKind {
        self.child.x_kind()
    }

    pub fn y_kind(&self) -> ScalarKind {
        self.y_kind
    }

    pub fn apply_range(&mut self, range: &DataRange) -> PipelineResult<()> {
        self.child.apply_range(range)
    }

    pub fn has_next(&mut self) -> PipelineResult<bool> {
        self.child.has_next()
    }

    pub fn peek(&mut self) -> PipelineResult<Sample> {
        let sample = self.child.peek()?;
        self.map(sample)
    }

    pub fn next(&mut self) -> PipelineResult<Sample> {
        let sample = self.child.next()?;
        self.map(sample)
    }

    pub fn query_leaf_x_kind(&self) -> PipelineResult<ScalarKind> {
        self.child.query_leaf_x_kind()
    }

    fn map(&self, (x, y): Sample) -> PipelineResult<Sample> {
        let value = self.evaluator.evaluate(&self.expression, x, y)?;
        if value.kind() == self.y_kind {
            return Ok((x, value));
        }

        value.cast(self.y_kind).map(|v| (x, v)).ok_or_else(|| {
            PipelineError::ValueOutOfRange(format!(
                "'{}' produced {} which is not a valid {}",
                self.expression, value, self.y_kind
            ))
        })
    }
}

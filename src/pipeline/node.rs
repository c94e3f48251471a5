//! Node abstraction for the pipeline.
//!
//! Two-layer design:
//! - **`StreamNode` trait** - the pull contract. Leaf nodes handed out by
//!   dataset sources implement it directly and travel as trait objects.
//! - **`BuiltinStage` enum** - for all built-in operator stages. The compiler
//!   can inline match arms, eliminating dynamic dispatch on the hot path.
//!
//! `AnyNode` wraps either variant so stages can own children of both kinds
//! uniformly.

use crate::pipeline::error::{PipelineError, PipelineResult};
use crate::pipeline::nodes::{DifferentiateStage, ExpressionStage, MergeStage};
use crate::range::DataRange;
use crate::types::{Scalar, ScalarKind};

/// One `(x, y)` pair pulled from a stream.
pub type Sample = (Scalar, Scalar);

/// Pull-based, lazily evaluated producer of samples.
///
/// Successive `next()` calls must yield non-decreasing X values. Merging
/// stages rely on it and do not check it.
pub trait StreamNode: Send {
    /// Human-readable name, used in logs.
    fn name(&self) -> &str;

    /// Kind of every X this node emits. Fixed at construction.
    fn x_kind(&self) -> ScalarKind;

    /// Kind of every Y this node emits. Fixed at construction.
    fn y_kind(&self) -> ScalarKind;

    /// Restrict the node to samples with X inside `range`.
    ///
    /// Must be called at most once, before the first pull.
    fn apply_range(&mut self, range: &DataRange) -> PipelineResult<()>;

    fn has_next(&mut self) -> PipelineResult<bool>;

    /// Read the next sample without consuming it.
    fn peek(&mut self) -> PipelineResult<Sample>;

    /// Consume and return the next sample.
    fn next(&mut self) -> PipelineResult<Sample>;

    /// The single X kind shared by every leaf beneath this node.
    fn query_leaf_x_kind(&self) -> PipelineResult<ScalarKind> {
        Ok(self.x_kind())
    }
}

/// Enum dispatch for built-in stages, no dynamic dispatch overhead.
pub enum BuiltinStage {
    Differentiate(DifferentiateStage),
    Expression(ExpressionStage),
    Sum(MergeStage),
    Average(MergeStage),
}

impl BuiltinStage {
    pub fn name(&self) -> &str {
        match self {
            BuiltinStage::Differentiate(n) => n.name(),
            BuiltinStage::Expression(n) => n.name(),
            BuiltinStage::Sum(n) => n.name(),
            BuiltinStage::Average(n) => n.name(),
        }
    }

    pub fn x_kind(&self) -> ScalarKind {
        match self {
            BuiltinStage::Differentiate(n) => n.x_kind(),
            BuiltinStage::Expression(n) => n.x_kind(),
            BuiltinStage::Sum(n) => n.x_kind(),
            BuiltinStage::Average(n) => n.x_kind(),
        }
    }

    pub fn y_kind(&self) -> ScalarKind {
        match self {
            BuiltinStage::Differentiate(n) => n.y_kind(),
            BuiltinStage::Expression(n) => n.y_kind(),
            BuiltinStage::Sum(n) => n.y_kind(),
            BuiltinStage::Average(n) => n.y_kind(),
        }
    }

    pub fn apply_range(&mut self, range: &DataRange) -> PipelineResult<()> {
        match self {
            BuiltinStage::Differentiate(n) => n.apply_range(range),
            BuiltinStage::Expression(n) => n.apply_range(range),
            BuiltinStage::Sum(n) => n.apply_range(range),
            BuiltinStage::Average(n) => n.apply_range(range),
        }
    }

    pub fn has_next(&mut self) -> PipelineResult<bool> {
        match self {
            BuiltinStage::Differentiate(n) => n.has_next(),
            BuiltinStage::Expression(n) => n.has_next(),
            BuiltinStage::Sum(n) => n.has_next(),
            BuiltinStage::Average(n) => n.has_next(),
        }
    }

    pub fn peek(&mut self) -> PipelineResult<Sample> {
        match self {
            BuiltinStage::Differentiate(n) => n.peek(),
            BuiltinStage::Expression(n) => n.peek(),
            BuiltinStage::Sum(n) => n.peek(),
            BuiltinStage::Average(n) => n.peek(),
        }
    }

    pub fn next(&mut self) -> PipelineResult<Sample> {
        match self {
            BuiltinStage::Differentiate(n) => n.next(),
            BuiltinStage::Expression(n) => n.next(),
            BuiltinStage::Sum(n) => n.next(),
            BuiltinStage::Average(n) => n.next(),
        }
    }

    pub fn query_leaf_x_kind(&self) -> PipelineResult<ScalarKind> {
        match self {
            BuiltinStage::Differentiate(n) => n.query_leaf_x_kind(),
            BuiltinStage::Expression(n) => n.query_leaf_x_kind(),
            BuiltinStage::Sum(n) => n.query_leaf_x_kind(),
            BuiltinStage::Average(n) => n.query_leaf_x_kind(),
        }
    }
}

/// Wrapper that holds either a built-in stage (enum dispatch) or a leaf (trait object).
pub enum AnyNode {
    Stage(Box<BuiltinStage>),
    Leaf(Box<dyn StreamNode>),
}

impl AnyNode {
    pub fn stage(stage: BuiltinStage) -> Self {
        AnyNode::Stage(Box::new(stage))
    }

    pub fn leaf(node: impl StreamNode + 'static) -> Self {
        AnyNode::Leaf(Box::new(node))
    }
}

impl StreamNode for AnyNode {
    fn name(&self) -> &str {
        match self {
            AnyNode::Stage(n) => n.name(),
            AnyNode::Leaf(n) => n.name(),
        }
    }

    fn x_kind(&self) -> ScalarKind {
        match self {
            AnyNode::Stage(n) => n.x_kind(),
            AnyNode::Leaf(n) => n.x_kind(),
        }
    }

    fn y_kind(&self) -> ScalarKind {
        match self {
            AnyNode::Stage(n) => n.y_kind(),
            AnyNode::Leaf(n) => n.y_kind(),
        }
    }

    fn apply_range(&mut self, range: &DataRange) -> PipelineResult<()> {
        match self {
            AnyNode::Stage(n) => n.apply_range(range),
            AnyNode::Leaf(n) => n.apply_range(range),
        }
    }

    fn has_next(&mut self) -> PipelineResult<bool> {
        match self {
            AnyNode::Stage(n) => n.has_next(),
            AnyNode::Leaf(n) => n.has_next(),
        }
    }

    fn peek(&mut self) -> PipelineResult<Sample> {
        match self {
            AnyNode::Stage(n) => n.peek(),
            AnyNode::Leaf(n) => n.peek(),
        }
    }

    fn next(&mut self) -> PipelineResult<Sample> {
        match self {
            AnyNode::Stage(n) => n.next(),
            AnyNode::Leaf(n) => n.next(),
        }
    }

    fn query_leaf_x_kind(&self) -> PipelineResult<ScalarKind> {
        match self {
            AnyNode::Stage(n) => n.query_leaf_x_kind(),
            AnyNode::Leaf(n) => n.query_leaf_x_kind(),
        }
    }
}

impl std::fmt::Debug for AnyNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnyNode")
            .field("name", &self.name())
            .field("x_kind", &self.x_kind())
            .field("y_kind", &self.y_kind())
            .finish()
    }
}

/// Leaf X kind shared by all `children`. Fails when there are none or they disagree.
pub fn common_leaf_x_kind<'a, I>(children: I) -> PipelineResult<ScalarKind>
where
    I: IntoIterator<Item = &'a AnyNode>,
{
    let mut found: Option<ScalarKind> = None;

    for child in children {
        let kind = child.query_leaf_x_kind()?;
        match found {
            None => found = Some(kind),
            Some(expected) if expected != kind => {
                return Err(PipelineError::KindMismatch {
                    expected,
                    found: kind,
                });
            }
            Some(_) => {}
        }
    }

    found.ok_or_else(|| PipelineError::Configuration("node has no leaves".to_string()))
}

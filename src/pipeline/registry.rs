//! Static directive table.
//!
//! Built once, on first use, by walking [`StageKind::all`]. Each kind maps to
//! a factory whose shape must match [`StageKind::arity`]. Options arrive as the raw
//! JSON object from the descriptor and are deserialized into the stage's typed
//! options struct. Option names are matched case-insensitively.

use crate::pipeline::error::{PipelineError, PipelineResult};
use crate::pipeline::node::{AnyNode, BuiltinStage};
use crate::pipeline::node_type::{Arity, StageKind};
use crate::pipeline::nodes::{
    DifferentiateStage, ExpressionOptions, ExpressionStage, MergeOp, MergeStage,
};
use crate::scripting::Evaluator;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

/// String-keyed stage options as they appear in a descriptor.
pub type StageOptions = Map<String, Value>;

/// Shared collaborators handed to every factory.
#[derive(Clone)]
pub struct StageContext {
    pub evaluator: Arc<dyn Evaluator>,
}

impl StageContext {
    pub fn new(evaluator: Arc<dyn Evaluator>) -> Self {
        Self { evaluator }
    }
}

/// Already-compiled children of a stage descriptor.
#[derive(Debug)]
pub enum StageInput {
    Single(AnyNode),
    Multi(Vec<AnyNode>),
}

impl StageInput {
    fn arity(&self) -> Arity {
        match self {
            StageInput::Single(_) => Arity::Single,
            StageInput::Multi(_) => Arity::Multi,
        }
    }
}

type SingleFactory = fn(AnyNode, &StageOptions, &StageContext) -> PipelineResult<AnyNode>;
type MultiFactory = fn(Vec<AnyNode>, &StageOptions, &StageContext) -> PipelineResult<AnyNode>;

/// Constructor for one stage kind.
#[derive(Clone, Copy)]
pub enum StageFactory {
    Single(SingleFactory),
    Multi(MultiFactory),
}

impl StageFactory {
    fn arity(&self) -> Arity {
        match self {
            StageFactory::Single(_) => Arity::Single,
            StageFactory::Multi(_) => Arity::Multi,
        }
    }
}

/// Stage kind → factory.
pub struct StageRegistry {
    entries: HashMap<StageKind, StageFactory>,
}

impl StageRegistry {
    /// The process-wide registry.
    pub fn global() -> &'static StageRegistry {
        static REGISTRY: OnceLock<StageRegistry> = OnceLock::new();
        REGISTRY.get_or_init(StageRegistry::build)
    }

    fn build() -> Self {
        let entries = StageKind::all()
            .iter()
            .map(|&kind| {
                let factory = factory_for(kind);
                debug_assert_eq!(factory.arity(), kind.arity(), "factory shape for {}", kind);
                (kind, factory)
            })
            .collect();
        Self { entries }
    }

    /// Stage kind for a directive, ignoring ASCII case.
    pub fn lookup(&self, directive: &str) -> Option<StageKind> {
        StageKind::from_directive(directive).filter(|kind| self.entries.contains_key(kind))
    }

    /// Registered kinds, in no particular order.
    pub fn kinds(&self) -> impl Iterator<Item = StageKind> + '_ {
        self.entries.keys().copied()
    }

    /// Build the stage named by `directive` over already-compiled children.
    pub fn construct(
        &self,
        directive: &str,
        input: StageInput,
        options: &StageOptions,
        ctx: &StageContext,
    ) -> PipelineResult<AnyNode> {
        let (kind, factory) = self
            .lookup(directive)
            .and_then(|kind| self.entries.get(&kind).map(|factory| (kind, factory)))
            .ok_or_else(|| PipelineError::UnknownDirective(directive.to_string()))?;

        match (factory, input) {
            (StageFactory::Single(build), StageInput::Single(child)) => build(child, options, ctx),
            (StageFactory::Multi(build), StageInput::Multi(children)) => {
                build(children, options, ctx)
            }
            (_, input) => Err(PipelineError::Configuration(format!(
                "'{}' takes {} input, got {}",
                kind.directive(),
                describe(kind.arity()),
                describe(input.arity()),
            ))),
        }
    }
}

fn describe(arity: Arity) -> &'static str {
    match arity {
        Arity::Single => "a single 'child'",
        Arity::Multi => "a 'children' array",
    }
}

fn factory_for(kind: StageKind) -> StageFactory {
    match kind {
        StageKind::Differentiate => StageFactory::Single(build_differentiate),
        StageKind::Expression => StageFactory::Single(build_expression),
        StageKind::Sum => StageFactory::Multi(build_sum),
        StageKind::Average => StageFactory::Multi(build_average),
    }
}

/// Deserialize stage options, lower-casing every key first.
pub fn parse_options<T: DeserializeOwned>(
    directive: &str,
    options: &StageOptions,
) -> PipelineResult<T> {
    let lowered: StageOptions = options
        .iter()
        .map(|(k, v)| (k.to_ascii_lowercase(), v.clone()))
        .collect();

    serde_json::from_value(Value::Object(lowered)).map_err(|e| {
        PipelineError::Configuration(format!("invalid options for '{}': {}", directive, e))
    })
}

fn build_differentiate(
    child: AnyNode,
    _options: &StageOptions,
    _ctx: &StageContext,
) -> PipelineResult<AnyNode> {
    let stage = DifferentiateStage::new(child)?;
    Ok(AnyNode::stage(BuiltinStage::Differentiate(stage)))
}

fn build_expression(
    child: AnyNode,
    options: &StageOptions,
    ctx: &StageContext,
) -> PipelineResult<AnyNode> {
    let options: ExpressionOptions = parse_options("expr", options)?;
    let stage = ExpressionStage::new(child, options, Arc::clone(&ctx.evaluator))?;
    Ok(AnyNode::stage(BuiltinStage::Expression(stage)))
}

fn build_sum(
    children: Vec<AnyNode>,
    _options: &StageOptions,
    _ctx: &StageContext,
) -> PipelineResult<AnyNode> {
    let stage = MergeStage::new(MergeOp::Sum, children)?;
    Ok(AnyNode::stage(BuiltinStage::Sum(stage)))
}

fn build_average(
    children: Vec<AnyNode>,
    _options: &StageOptions,
    _ctx: &StageContext,
) -> PipelineResult<AnyNode> {
    let stage = MergeStage::new(MergeOp::Average, children)?;
    Ok(AnyNode::stage(BuiltinStage::Average(stage)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::memory::SeriesNode;
    use crate::pipeline::node::StreamNode;
    use crate::scripting::ScriptEngine;
    use crate::types::{Scalar, ScalarKind};
    use serde_json::json;

    fn ctx() -> StageContext {
        StageContext::new(Arc::new(ScriptEngine::new()))
    }

    fn leaf() -> AnyNode {
        AnyNode::leaf(SeriesNode::new(
            "leaf",
            ScalarKind::Instant,
            ScalarKind::Integer,
            vec![(Scalar::unix(0).unwrap(), Scalar::Integer(1))],
        ))
    }

    fn options(value: Value) -> StageOptions {
        match value {
            Value::Object(map) => map,
            _ => panic!("options must be an object"),
        }
    }

    #[test]
    fn test_every_kind_is_registered() {
        let registry = StageRegistry::global();
        let mut kinds: Vec<_> = registry.kinds().collect();
        kinds.sort_by_key(|k| k.directive());
        assert_eq!(kinds.len(), StageKind::all().len());
        assert_eq!(registry.lookup("Diff"), Some(StageKind::Differentiate));
        assert_eq!(registry.lookup("nope"), None);
    }

    #[test]
    fn test_factories_match_kind_arity() {
        for &kind in StageKind::all() {
            assert_eq!(factory_for(kind).arity(), kind.arity(), "{}", kind);
        }
    }

    #[test]
    fn test_unknown_directive() {
        let result = StageRegistry::global().construct(
            "median",
            StageInput::Single(leaf()),
            &StageOptions::new(),
            &ctx(),
        );
        assert!(matches!(result, Err(PipelineError::UnknownDirective(d)) if d == "median"));
    }

    #[test]
    fn test_arity_mismatch() {
        let registry = StageRegistry::global();
        let result = registry.construct(
            "sum",
            StageInput::Single(leaf()),
            &StageOptions::new(),
            &ctx(),
        );
        assert!(matches!(result, Err(PipelineError::Configuration(_))));

        let result = registry.construct(
            "diff",
            StageInput::Multi(vec![leaf(), leaf()]),
            &StageOptions::new(),
            &ctx(),
        );
        assert!(matches!(result, Err(PipelineError::Configuration(_))));
    }

    #[test]
    fn test_expression_options_ignore_case() {
        let node = StageRegistry::global()
            .construct(
                "expr",
                StageInput::Single(leaf()),
                &options(json!({ "Expression": "y * 3" })),
                &ctx(),
            )
            .unwrap();
        assert_eq!(node.name(), "expr");
        assert_eq!(node.y_kind(), ScalarKind::Integer);
    }

    #[test]
    fn test_missing_expression_option() {
        let result = StageRegistry::global().construct(
            "expr",
            StageInput::Single(leaf()),
            &StageOptions::new(),
            &ctx(),
        );
        assert!(matches!(result, Err(PipelineError::Configuration(_))));
    }
}

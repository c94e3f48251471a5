use super::compiled_plan::{CompiledPlan, PlanStats};
use super::descriptor::NodeDescriptor;
use super::error::{PipelineError, PipelineResult};
use super::node::AnyNode;
use super::registry::{StageContext, StageInput, StageRegistry};
use crate::catalog::Catalog;
use crate::scripting::Evaluator;
use std::sync::Arc;
use tracing::{debug, trace};

/// Turns descriptor trees into node trees.
///
/// Leaves are resolved through the [`Catalog`], stages through the
/// [`StageRegistry`]. Compilation fails on the first malformed node; no
/// partially built pipeline escapes.
pub struct PipelineCompiler<'a> {
    catalog: &'a Catalog,
    registry: &'static StageRegistry,
    ctx: StageContext,
}

impl<'a> PipelineCompiler<'a> {
    pub fn new(catalog: &'a Catalog, evaluator: Arc<dyn Evaluator>) -> Self {
        Self {
            catalog,
            registry: StageRegistry::global(),
            ctx: StageContext::new(evaluator),
        }
    }

    /// Compile a single descriptor tree.
    pub fn compile(&self, descriptor: &NodeDescriptor) -> PipelineResult<AnyNode> {
        let mut stats = PlanStats::default();
        self.compile_node(descriptor, &mut stats)
    }

    /// Compile every descriptor of a request.
    ///
    /// Descriptors are compiled on scoped threads, one per descriptor. The
    /// result keeps request order; if several fail, the error of the earliest
    /// descriptor is returned.
    pub fn compile_all(&self, descriptors: &[NodeDescriptor]) -> PipelineResult<CompiledPlan> {
        let start_time = std::time::Instant::now();

        let results: Vec<PipelineResult<(AnyNode, PlanStats)>> = if descriptors.len() <= 1 {
            descriptors.iter().map(|d| self.compile_counted(d)).collect()
        } else {
            std::thread::scope(|scope| {
                let handles: Vec<_> = descriptors
                    .iter()
                    .map(|d| scope.spawn(move || self.compile_counted(d)))
                    .collect();

                handles
                    .into_iter()
                    .map(|handle| match handle.join() {
                        Ok(result) => result,
                        Err(panic) => std::panic::resume_unwind(panic),
                    })
                    .collect()
            })
        };

        let mut stats = PlanStats::default();
        let mut pipelines = Vec::with_capacity(results.len());
        for result in results {
            let (node, counts) = result?;
            stats.absorb(&counts);
            pipelines.push(node);
        }

        stats.pipelines = pipelines.len();
        stats.compile_time_us = start_time.elapsed().as_micros() as u64;

        debug!(
            "Compiled {} pipeline(s) ({} stages, {} leaves) in {} us",
            stats.pipelines, stats.stages, stats.leaves, stats.compile_time_us
        );

        Ok(CompiledPlan { pipelines, stats })
    }

    fn compile_counted(&self, descriptor: &NodeDescriptor) -> PipelineResult<(AnyNode, PlanStats)> {
        let mut stats = PlanStats::default();
        let node = self.compile_node(descriptor, &mut stats)?;
        Ok((node, stats))
    }

    fn compile_node(
        &self,
        descriptor: &NodeDescriptor,
        stats: &mut PlanStats,
    ) -> PipelineResult<AnyNode> {
        if descriptor.child.is_some() && descriptor.children.is_some() {
            return Err(PipelineError::Configuration(format!(
                "'{}' sets both 'child' and 'children'",
                descriptor.directive
            )));
        }

        if descriptor.is_leaf() {
            return self.compile_leaf(descriptor, stats);
        }

        if self.registry.lookup(&descriptor.directive).is_none() {
            return Err(PipelineError::UnknownDirective(descriptor.directive.clone()));
        }

        let input = match (&descriptor.child, &descriptor.children) {
            (Some(child), None) => StageInput::Single(self.compile_node(child, stats)?),
            (None, Some(children)) => {
                let mut nodes = Vec::with_capacity(children.len());
                for child in children {
                    nodes.push(self.compile_node(child, stats)?);
                }
                StageInput::Multi(nodes)
            }
            _ => {
                return Err(PipelineError::Configuration(format!(
                    "'{}' needs a 'child' or a 'children' array",
                    descriptor.directive
                )))
            }
        };

        let node = self
            .registry
            .construct(&descriptor.directive, input, &descriptor.options, &self.ctx)?;
        stats.stages += 1;
        trace!("Compiled stage {:?}", node);
        Ok(node)
    }

    fn compile_leaf(
        &self,
        descriptor: &NodeDescriptor,
        stats: &mut PlanStats,
    ) -> PipelineResult<AnyNode> {
        if descriptor.child.is_some() || descriptor.children.is_some() {
            return Err(PipelineError::Configuration(
                "a 'data' leaf cannot have children".to_string(),
            ));
        }

        let dataset = descriptor.dataset.as_ref().ok_or_else(|| {
            PipelineError::Configuration("a 'data' leaf needs a 'dataset'".to_string())
        })?;

        let node = self.catalog.get_node(dataset)?;
        stats.leaves += 1;
        trace!("Resolved leaf {}", node.name());
        Ok(AnyNode::Leaf(node))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::MemorySource;
    use crate::pipeline::node::StreamNode;
    use crate::scripting::ScriptEngine;
    use crate::types::{Scalar, ScalarKind};

    fn catalog() -> Catalog {
        let samples = (0..4)
            .map(|i| (Scalar::unix(i * 60).unwrap(), Scalar::Integer(i as i32)))
            .collect();
        let source = MemorySource::new("mem", "Memory")
            .with_series("ops", None, ScalarKind::Instant, ScalarKind::Integer, samples)
            .unwrap();
        Catalog::new().with_source(Arc::new(source)).unwrap()
    }

    fn leaf() -> NodeDescriptor {
        NodeDescriptor::leaf("mem", "ops", None)
    }

    #[test]
    fn test_compile_leaf_and_stage() {
        let catalog = catalog();
        let compiler = PipelineCompiler::new(&catalog, Arc::new(ScriptEngine::new()));

        let node = compiler.compile(&leaf()).unwrap();
        assert!(matches!(node, AnyNode::Leaf(_)));

        let node = compiler
            .compile(&NodeDescriptor::stage("DIFF", leaf()))
            .unwrap();
        assert_eq!(node.name(), "diff");
        assert_eq!(node.y_kind(), ScalarKind::Real32);
    }

    #[test]
    fn test_compile_all_keeps_order_and_counts() {
        let catalog = catalog();
        let compiler = PipelineCompiler::new(&catalog, Arc::new(ScriptEngine::new()));

        let descriptors = vec![
            NodeDescriptor::merge("sum", vec![leaf(), leaf()]),
            leaf(),
            NodeDescriptor::stage("expr", leaf()).with_option("expression", "y * 2.0"),
        ];
        let plan = compiler.compile_all(&descriptors).unwrap();

        assert_eq!(plan.len(), 3);
        assert_eq!(plan.pipelines[0].name(), "sum");
        assert!(matches!(plan.pipelines[1], AnyNode::Leaf(_)));
        assert_eq!(plan.pipelines[2].name(), "expr");
        assert_eq!(plan.stats.pipelines, 3);
        assert_eq!(plan.stats.stages, 2);
        assert_eq!(plan.stats.leaves, 4);
    }

    #[test]
    fn test_both_child_and_children_rejected() {
        let catalog = catalog();
        let compiler = PipelineCompiler::new(&catalog, Arc::new(ScriptEngine::new()));

        let mut desc = NodeDescriptor::stage("diff", leaf());
        desc.children = Some(vec![leaf()]);
        assert!(matches!(
            compiler.compile(&desc),
            Err(PipelineError::Configuration(_))
        ));
    }

    #[test]
    fn test_stage_without_input_rejected() {
        let catalog = catalog();
        let compiler = PipelineCompiler::new(&catalog, Arc::new(ScriptEngine::new()));

        let desc = NodeDescriptor {
            directive: "diff".to_string(),
            ..NodeDescriptor::default()
        };
        assert!(matches!(
            compiler.compile(&desc),
            Err(PipelineError::Configuration(_))
        ));
    }

    #[test]
    fn test_leaf_errors() {
        let catalog = catalog();
        let compiler = PipelineCompiler::new(&catalog, Arc::new(ScriptEngine::new()));

        let no_dataset = NodeDescriptor {
            directive: "data".to_string(),
            ..NodeDescriptor::default()
        };
        assert!(matches!(
            compiler.compile(&no_dataset),
            Err(PipelineError::Configuration(_))
        ));

        let mut with_child = leaf();
        with_child.child = Some(Box::new(leaf()));
        assert!(matches!(
            compiler.compile(&with_child),
            Err(PipelineError::Configuration(_))
        ));

        let missing = NodeDescriptor::leaf("mem", "latency", None);
        assert!(matches!(
            compiler.compile(&missing),
            Err(PipelineError::NotFound(_))
        ));
    }

    #[test]
    fn test_unknown_directive() {
        let catalog = catalog();
        let compiler = PipelineCompiler::new(&catalog, Arc::new(ScriptEngine::new()));

        let result = compiler.compile(&NodeDescriptor::stage("median", leaf()));
        assert!(matches!(result, Err(PipelineError::UnknownDirective(d)) if d == "median"));
    }

    #[test]
    fn test_first_failing_descriptor_wins() {
        let catalog = catalog();
        let compiler = PipelineCompiler::new(&catalog, Arc::new(ScriptEngine::new()));

        let descriptors = vec![
            leaf(),
            NodeDescriptor::stage("median", leaf()),
            NodeDescriptor::leaf("nope", "ops", None),
        ];
        assert!(matches!(
            compiler.compile_all(&descriptors),
            Err(PipelineError::UnknownDirective(_))
        ));
    }
}

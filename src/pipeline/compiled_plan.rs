use super::node::AnyNode;

/// Compiled pipelines of one request, in request order.
#[derive(Debug)]
pub struct CompiledPlan {
    /// One root node per descriptor
    pub pipelines: Vec<AnyNode>,

    /// Compilation statistics
    pub stats: PlanStats,
}

/// Statistics about the compiled plan
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlanStats {
    /// Number of compiled pipelines
    pub pipelines: usize,

    /// Number of stage nodes across all pipelines
    pub stages: usize,

    /// Number of leaf nodes across all pipelines
    pub leaves: usize,

    /// Compilation time in microseconds
    pub compile_time_us: u64,
}

impl PlanStats {
    pub(crate) fn absorb(&mut self, other: &PlanStats) {
        self.stages += other.stages;
        self.leaves += other.leaves;
    }
}

impl CompiledPlan {
    pub fn len(&self) -> usize {
        self.pipelines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pipelines.is_empty()
    }

    pub fn into_pipelines(self) -> Vec<AnyNode> {
        self.pipelines
    }
}

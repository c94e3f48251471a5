//! Test data builders for catalogs and descriptors

use perfstream::catalog::{Catalog, MemorySource};
use perfstream::pipeline::{NodeDescriptor, Sample};
use perfstream::{Scalar, ScalarKind};
use std::sync::Arc;

/// Builder for in-memory sources with `Instant` X axes
pub struct SeriesBuilder {
    source: MemorySource,
}

impl SeriesBuilder {
    pub fn new(id: &str) -> Self {
        Self {
            source: MemorySource::new(id, format!("{} (test)", id)),
        }
    }

    /// Integer series from `(unix_seconds, value)` pairs
    pub fn ints(mut self, dataset: &str, variant: Option<&str>, points: &[(i64, i32)]) -> Self {
        let samples = points
            .iter()
            .map(|&(t, v)| (super::at(t), Scalar::Integer(v)))
            .collect();
        self.source
            .add_series(dataset, variant, ScalarKind::Instant, ScalarKind::Integer, samples)
            .unwrap();
        self
    }

    /// Float series from `(unix_seconds, value)` pairs
    pub fn floats(mut self, dataset: &str, variant: Option<&str>, points: &[(i64, f32)]) -> Self {
        let samples: Vec<Sample> = points
            .iter()
            .map(|&(t, v)| (super::at(t), Scalar::Real32(v)))
            .collect();
        self.source
            .add_series(dataset, variant, ScalarKind::Instant, ScalarKind::Real32, samples)
            .unwrap();
        self
    }

    pub fn build(self) -> MemorySource {
        self.source
    }

    /// Catalog holding just this source
    pub fn catalog(self) -> Catalog {
        Catalog::new().with_source(Arc::new(self.source)).unwrap()
    }
}

/// Shorthand for a leaf over `source/dataset`
pub fn leaf(source: &str, dataset: &str) -> NodeDescriptor {
    NodeDescriptor::leaf(source, dataset, None)
}

/// Shorthand for an `expr` stage
pub fn expr(expression: &str, child: NodeDescriptor) -> NodeDescriptor {
    NodeDescriptor::stage("expr", child).with_option("expression", expression)
}

#[cfg(test)]
mod tests {
    use super::*;
    use perfstream::DataSource;

    #[test]
    fn test_series_builder() {
        let source = SeriesBuilder::new("mem")
            .ints("ops", None, &[(0, 1), (60, 2)])
            .floats("lat", Some("p99"), &[(0, 0.5)])
            .build();

        assert_eq!(source.datasets().len(), 2);
        assert_eq!(source.dataset("lat").unwrap().variants(), &["p99"]);
    }
}

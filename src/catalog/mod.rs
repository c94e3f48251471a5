//! Dataset catalog
//!
//! A [`Catalog`] holds every configured [`DataSource`]. Each source publishes a
//! list of [`Dataset`]s and hands out leaf nodes for `(dataset, variant)` pairs.
//!
//! # Source types
//!
//! - `synthetic` (alias `dummy`) - deterministic generated series, see [`synthetic`]
//! - in-memory series registered programmatically, see [`memory`]

pub mod memory;
pub mod synthetic;

pub use memory::{MemorySource, SeriesNode};
pub use synthetic::SyntheticSource;

use crate::config::SourceConfig;
use crate::error::{PerfStreamError, Result};
use crate::pipeline::descriptor::DatasetDescriptor;
use crate::pipeline::error::{PipelineError, PipelineResult};
use crate::pipeline::node::StreamNode;
use crate::range::DataRange;
use crate::types::ScalarKind;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info};

/// A provider of datasets.
///
/// Sources are shared between concurrently compiling pipelines, so they must
/// be `Sync`; the nodes they hand out are owned by a single pipeline.
pub trait DataSource: Send + Sync {
    /// Identifier used by descriptors (`dataset.source`)
    fn id(&self) -> &str;

    /// Human-readable name
    fn name(&self) -> &str;

    /// Source type as written in the configuration
    fn kind(&self) -> &'static str;

    fn datasets(&self) -> &[Dataset];

    fn dataset(&self, id: &str) -> Option<&Dataset> {
        self.datasets().iter().find(|d| d.id() == id)
    }

    /// Leaf node over one variant of a dataset.
    fn get_node(&self, dataset: &str, variant: Option<&str>) -> PipelineResult<Box<dyn StreamNode>>;

    /// Combined coverage of every dataset in this source.
    fn data_ranges(&self) -> Vec<DataRange> {
        let all: Vec<DataRange> = self
            .datasets()
            .iter()
            .flat_map(|d| d.data_range().iter().copied())
            .collect();
        DataRange::simplify(&all)
    }
}

/// Catalog entry describing one dataset.
#[derive(Debug, Clone, Serialize)]
pub struct Dataset {
    id: String,
    category: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    units: Option<String>,
    source: String,
    x_type: ScalarKind,
    y_type: ScalarKind,
    /// Available coverage, simplified
    data_range: Vec<DataRange>,
    variants: Vec<String>,
}

impl Dataset {
    /// Create a dataset entry. Every range must be of kind `x_type`.
    pub fn new(
        id: impl Into<String>,
        source: impl Into<String>,
        x_type: ScalarKind,
        y_type: ScalarKind,
        ranges: &[DataRange],
    ) -> PipelineResult<Self> {
        if let Some(bad) = ranges.iter().find(|r| r.kind() != x_type) {
            return Err(PipelineError::KindMismatch {
                expected: x_type,
                found: bad.kind(),
            });
        }

        Ok(Self {
            id: id.into(),
            category: Vec::new(),
            units: None,
            source: source.into(),
            x_type,
            y_type,
            data_range: DataRange::simplify(ranges),
            variants: Vec::new(),
        })
    }

    pub fn with_category(mut self, category: &[&str]) -> Self {
        self.category = category.iter().map(|c| c.to_string()).collect();
        self
    }

    pub fn with_units(mut self, units: impl Into<String>) -> Self {
        self.units = Some(units.into());
        self
    }

    pub fn with_variants<I, S>(mut self, variants: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.variants = variants.into_iter().map(Into::into).collect();
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn category(&self) -> &[String] {
        &self.category
    }

    pub fn units(&self) -> Option<&str> {
        self.units.as_deref()
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn x_type(&self) -> ScalarKind {
        self.x_type
    }

    pub fn y_type(&self) -> ScalarKind {
        self.y_type
    }

    pub fn data_range(&self) -> &[DataRange] {
        &self.data_range
    }

    pub fn variants(&self) -> &[String] {
        &self.variants
    }

    /// Smallest range covering all available data.
    pub fn bounds(&self) -> Option<DataRange> {
        DataRange::bounding_box(&self.data_range)
    }

    /// Validate a requested variant.
    ///
    /// A dataset without variants only accepts no variant. A dataset with
    /// variants accepts any listed one and defaults to the first.
    pub fn resolve_variant<'a>(&'a self, variant: Option<&'a str>) -> PipelineResult<Option<&'a str>> {
        let variant = variant.filter(|v| !v.is_empty());
        match (variant, self.variants.first()) {
            (None, default) => Ok(default.map(String::as_str)),
            (Some(v), Some(_)) if self.variants.iter().any(|known| known == v) => Ok(Some(v)),
            (Some(v), _) => Err(PipelineError::NotFound(format!(
                "variant '{}' of dataset '{}'",
                v, self.id
            ))),
        }
    }
}

/// One source as it appears in the catalog listing.
#[derive(Debug, Serialize)]
pub struct SourceListing<'a> {
    pub id: &'a str,
    pub name: &'a str,
    #[serde(rename = "type")]
    pub kind: &'a str,
    pub datasets: &'a [Dataset],
}

impl<'a> SourceListing<'a> {
    fn of(source: &'a dyn DataSource) -> Self {
        Self {
            id: source.id(),
            name: source.name(),
            kind: source.kind(),
            datasets: source.datasets(),
        }
    }
}

/// Every configured data source.
#[derive(Default, Clone)]
pub struct Catalog {
    sources: Vec<Arc<dyn DataSource>>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the catalog described by the `[[sources]]` tables of the config.
    pub fn from_config(sources: &[SourceConfig]) -> Result<Self> {
        let mut catalog = Self::new();

        for config in sources {
            let source: Arc<dyn DataSource> = match config.kind.to_ascii_lowercase().as_str() {
                "synthetic" | "dummy" => Arc::new(SyntheticSource::from_config(config)),
                other => {
                    return Err(PerfStreamError::Config(format!(
                        "Source of type '{}' does not exist",
                        other
                    )))
                }
            };
            catalog.add_source(source)?;
        }

        info!("Catalog ready with {} source(s)", catalog.sources.len());
        Ok(catalog)
    }

    /// Register a source. Ids must be unique.
    pub fn add_source(&mut self, source: Arc<dyn DataSource>) -> PipelineResult<()> {
        if self.get_source(source.id()).is_some() {
            return Err(PipelineError::Configuration(format!(
                "duplicate source id '{}'",
                source.id()
            )));
        }

        debug!(
            "Registered {} source '{}' with {} dataset(s)",
            source.kind(),
            source.id(),
            source.datasets().len()
        );
        self.sources.push(source);
        Ok(())
    }

    pub fn with_source(mut self, source: Arc<dyn DataSource>) -> PipelineResult<Self> {
        self.add_source(source)?;
        Ok(self)
    }

    pub fn get_source(&self, id: &str) -> Option<&Arc<dyn DataSource>> {
        self.sources.iter().find(|s| s.id() == id)
    }

    pub fn sources(&self) -> &[Arc<dyn DataSource>] {
        &self.sources
    }

    fn require_source(&self, id: &str) -> PipelineResult<&Arc<dyn DataSource>> {
        self.get_source(id)
            .ok_or_else(|| PipelineError::NotFound(format!("source '{}'", id)))
    }

    /// Catalog entry of one dataset.
    pub fn dataset(&self, source: &str, id: &str) -> PipelineResult<&Dataset> {
        self.require_source(source)?.dataset(id).ok_or_else(|| {
            PipelineError::NotFound(format!("dataset '{}' in source '{}'", id, source))
        })
    }

    /// Resolve a leaf descriptor to a node.
    pub fn get_node(&self, dataset: &DatasetDescriptor) -> PipelineResult<Box<dyn StreamNode>> {
        self.require_source(&dataset.source)?
            .get_node(&dataset.id, dataset.variant.as_deref())
    }

    /// Serializable view of every source and its datasets.
    pub fn listing(&self) -> Vec<SourceListing<'_>> {
        self.sources.iter().map(|s| SourceListing::of(s.as_ref())).collect()
    }

    /// Serializable view of one source.
    pub fn source_listing(&self, id: &str) -> PipelineResult<SourceListing<'_>> {
        Ok(SourceListing::of(self.require_source(id)?.as_ref()))
    }
}

impl std::fmt::Debug for Catalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Catalog")
            .field(
                "sources",
                &self.sources.iter().map(|s| s.id()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Scalar;

    fn day_range(from: i64, to: i64) -> DataRange {
        DataRange::new(
            Scalar::unix(from * 86_400).unwrap(),
            Scalar::unix(to * 86_400).unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn test_dataset_simplifies_ranges() {
        let dataset = Dataset::new(
            "iops",
            "mem",
            ScalarKind::Instant,
            ScalarKind::Integer,
            &[day_range(5, 9), day_range(0, 3), day_range(2, 4)],
        )
        .unwrap();

        assert_eq!(dataset.data_range(), &[day_range(0, 4), day_range(5, 9)]);
        assert_eq!(dataset.bounds(), Some(day_range(0, 9)));
    }

    #[test]
    fn test_dataset_rejects_foreign_range_kind() {
        let ints = DataRange::new(Scalar::Integer(0), Scalar::Integer(1)).unwrap();
        let result = Dataset::new("x", "mem", ScalarKind::Instant, ScalarKind::Integer, &[ints]);
        assert!(matches!(result, Err(PipelineError::KindMismatch { .. })));
    }

    #[test]
    fn test_variant_resolution() {
        let plain = Dataset::new("a", "mem", ScalarKind::Instant, ScalarKind::Real32, &[]).unwrap();
        assert_eq!(plain.resolve_variant(None).unwrap(), None);
        assert_eq!(plain.resolve_variant(Some("")).unwrap(), None);
        assert!(plain.resolve_variant(Some("port-1")).is_err());

        let ports = plain.with_variants(["port-1", "port-2"]);
        assert_eq!(ports.resolve_variant(None).unwrap(), Some("port-1"));
        assert_eq!(ports.resolve_variant(Some("port-2")).unwrap(), Some("port-2"));
        assert!(matches!(
            ports.resolve_variant(Some("port-3")),
            Err(PipelineError::NotFound(_))
        ));
    }

    #[test]
    fn test_dataset_serialization() {
        let dataset = Dataset::new(
            "read_rate",
            "array-1",
            ScalarKind::Instant,
            ScalarKind::Real32,
            &[day_range(0, 1)],
        )
        .unwrap()
        .with_category(&["ports"])
        .with_units("MB/s");

        let json = serde_json::to_value(&dataset).unwrap();
        assert_eq!(json["x_type"], "datetime");
        assert_eq!(json["y_type"], "float");
        assert_eq!(json["data_range"], serde_json::json!([[0, 86_400]]));
        assert_eq!(json["units"], "MB/s");
    }

    #[test]
    fn test_duplicate_source_ids_rejected() {
        let mut catalog = Catalog::new();
        catalog
            .add_source(Arc::new(MemorySource::new("mem", "Memory")))
            .unwrap();
        assert!(catalog
            .add_source(Arc::new(MemorySource::new("mem", "Other")))
            .is_err());
        assert_eq!(catalog.sources().len(), 1);
    }

    #[test]
    fn test_unknown_source_type_in_config() {
        let config = SourceConfig {
            id: "array".to_string(),
            kind: "hp".to_string(),
            name: None,
            anchor: None,
            seed: None,
        };
        assert!(matches!(
            Catalog::from_config(&[config]),
            Err(PerfStreamError::Config(_))
        ));
    }

    #[test]
    fn test_single_source_and_dataset_lookup() {
        let source = MemorySource::new("mem", "Memory")
            .with_series("iops", None, ScalarKind::Instant, ScalarKind::Integer, vec![])
            .unwrap();
        let catalog = Catalog::new().with_source(Arc::new(source)).unwrap();

        let listing = catalog.source_listing("mem").unwrap();
        assert_eq!(listing.kind, "memory");
        assert_eq!(listing.datasets.len(), 1);
        assert_eq!(catalog.dataset("mem", "iops").unwrap().y_type(), ScalarKind::Integer);

        assert!(matches!(catalog.source_listing("hp"), Err(PipelineError::NotFound(_))));
        assert!(matches!(catalog.dataset("mem", "latency"), Err(PipelineError::NotFound(_))));
        assert!(matches!(catalog.dataset("hp", "iops"), Err(PipelineError::NotFound(_))));
    }

    #[test]
    fn test_unknown_source_is_not_found() {
        let catalog = Catalog::new();
        let descriptor = DatasetDescriptor {
            source: "nope".to_string(),
            id: "testset".to_string(),
            variant: None,
        };
        assert!(matches!(
            catalog.get_node(&descriptor),
            Err(PipelineError::NotFound(_))
        ));
    }
}

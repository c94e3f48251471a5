//! In-memory data source
//!
//! Series are registered up front as sorted sample vectors. Nodes share the
//! samples through an `Arc` and only keep a cursor, so handing out many nodes
//! over the same series is cheap.

use crate::catalog::{DataSource, Dataset};
use crate::pipeline::error::{PipelineError, PipelineResult};
use crate::pipeline::node::{Sample, StreamNode};
use crate::range::DataRange;
use crate::types::ScalarKind;
use std::collections::HashMap;
use std::sync::Arc;

/// Source backed by sample vectors held in memory.
pub struct MemorySource {
    id: String,
    name: String,
    datasets: Vec<Dataset>,
    /// (dataset, variant) -> samples
    series: HashMap<(String, Option<String>), Arc<[Sample]>>,
}

impl MemorySource {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            datasets: Vec::new(),
            series: HashMap::new(),
        }
    }

    /// Register a series, creating its dataset entry on first use.
    ///
    /// Samples must match the declared kinds and be sorted by X. All variants
    /// of one dataset must share its kinds.
    pub fn add_series(
        &mut self,
        dataset: &str,
        variant: Option<&str>,
        x_kind: ScalarKind,
        y_kind: ScalarKind,
        samples: Vec<Sample>,
    ) -> PipelineResult<()> {
        if let Some((x, y)) = samples
            .iter()
            .find(|(x, y)| x.kind() != x_kind || y.kind() != y_kind)
        {
            let (expected, found) = if x.kind() != x_kind {
                (x_kind, x.kind())
            } else {
                (y_kind, y.kind())
            };
            return Err(PipelineError::KindMismatch { expected, found });
        }
        if samples.windows(2).any(|w| w[0].0 > w[1].0) {
            return Err(PipelineError::Configuration(format!(
                "series '{}' is not sorted by X",
                dataset
            )));
        }

        let key = (dataset.to_string(), variant.map(str::to_string));
        if self.series.contains_key(&key) {
            return Err(PipelineError::Configuration(format!(
                "series '{}' variant {:?} registered twice",
                dataset, variant
            )));
        }

        let coverage: Vec<DataRange> = match (samples.first(), samples.last()) {
            (Some(first), Some(last)) => vec![DataRange::new(first.0, last.0)?],
            _ => Vec::new(),
        };

        match self.datasets.iter().position(|d| d.id() == dataset) {
            Some(index) => {
                let existing = &self.datasets[index];
                if existing.x_type() != x_kind || existing.y_type() != y_kind {
                    return Err(PipelineError::Configuration(format!(
                        "variants of '{}' must share x={}, y={}",
                        dataset,
                        existing.x_type(),
                        existing.y_type()
                    )));
                }
                if existing.variants().is_empty() != variant.is_none() {
                    return Err(PipelineError::Configuration(format!(
                        "'{}' cannot mix named and unnamed variants",
                        dataset
                    )));
                }

                let mut ranges = existing.data_range().to_vec();
                ranges.extend(coverage);
                let mut variants = existing.variants().to_vec();
                variants.extend(variant.map(str::to_string));

                self.datasets[index] = Dataset::new(dataset, self.id.clone(), x_kind, y_kind, &ranges)?
                    .with_variants(variants);
            }
            None => {
                self.datasets.push(
                    Dataset::new(dataset, self.id.clone(), x_kind, y_kind, &coverage)?
                        .with_variants(variant),
                );
            }
        }

        self.series.insert(key, samples.into());
        Ok(())
    }

    /// Builder form of [`MemorySource::add_series`].
    pub fn with_series(
        mut self,
        dataset: &str,
        variant: Option<&str>,
        x_kind: ScalarKind,
        y_kind: ScalarKind,
        samples: Vec<Sample>,
    ) -> PipelineResult<Self> {
        self.add_series(dataset, variant, x_kind, y_kind, samples)?;
        Ok(self)
    }
}

impl DataSource for MemorySource {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> &'static str {
        "memory"
    }

    fn datasets(&self) -> &[Dataset] {
        &self.datasets
    }

    fn get_node(&self, dataset: &str, variant: Option<&str>) -> PipelineResult<Box<dyn StreamNode>> {
        let entry = self.dataset(dataset).ok_or_else(|| {
            PipelineError::NotFound(format!("dataset '{}' in source '{}'", dataset, self.id))
        })?;
        let variant = entry.resolve_variant(variant)?;

        let key = (dataset.to_string(), variant.map(str::to_string));
        let samples = self.series.get(&key).ok_or_else(|| {
            PipelineError::NotFound(format!("series '{}' variant {:?}", dataset, variant))
        })?;

        let name = match variant {
            Some(v) => format!("{}/{}[{}]", self.id, dataset, v),
            None => format!("{}/{}", self.id, dataset),
        };
        Ok(Box::new(SeriesNode::shared(
            name,
            entry.x_type(),
            entry.y_type(),
            Arc::clone(samples),
        )))
    }
}

/// Leaf node over a sorted sample slice.
pub struct SeriesNode {
    name: String,
    x_kind: ScalarKind,
    y_kind: ScalarKind,
    samples: Arc<[Sample]>,
    position: usize,
    end: usize,
}

impl SeriesNode {
    pub fn new(
        name: impl Into<String>,
        x_kind: ScalarKind,
        y_kind: ScalarKind,
        samples: Vec<Sample>,
    ) -> Self {
        Self::shared(name, x_kind, y_kind, samples.into())
    }

    pub fn shared(
        name: impl Into<String>,
        x_kind: ScalarKind,
        y_kind: ScalarKind,
        samples: Arc<[Sample]>,
    ) -> Self {
        let end = samples.len();
        Self {
            name: name.into(),
            x_kind,
            y_kind,
            samples,
            position: 0,
            end,
        }
    }
}

impl StreamNode for SeriesNode {
    fn name(&self) -> &str {
        &self.name
    }

    fn x_kind(&self) -> ScalarKind {
        self.x_kind
    }

    fn y_kind(&self) -> ScalarKind {
        self.y_kind
    }

    fn apply_range(&mut self, range: &DataRange) -> PipelineResult<()> {
        if range.kind() != self.x_kind {
            return Err(PipelineError::KindMismatch {
                expected: self.x_kind,
                found: range.kind(),
            });
        }

        let (from, to) = (range.from(), range.to());
        self.position = self.samples.partition_point(|(x, _)| *x < from);
        self.end = self.samples.partition_point(|(x, _)| *x <= to).max(self.position);
        Ok(())
    }

    fn has_next(&mut self) -> PipelineResult<bool> {
        Ok(self.position < self.end)
    }

    fn peek(&mut self) -> PipelineResult<Sample> {
        if self.position >= self.end {
            return Err(PipelineError::EndOfSequence);
        }
        Ok(self.samples[self.position])
    }

    fn next(&mut self) -> PipelineResult<Sample> {
        let sample = self.peek()?;
        self.position += 1;
        Ok(sample)
    }
}

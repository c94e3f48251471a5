//! Synthetic data source
//!
//! Generates deterministic daily and sub-hourly series ending at an anchor day
//! (midnight UTC). Useful for demos and for exercising pipelines without a
//! storage array.
//!
//! | dataset      | span     | step   | values                          |
//! |--------------|----------|--------|---------------------------------|
//! | `testset`    | 90 days  | 1 day  | seeded pseudo-random in [0, 1)  |
//! | `zeros`      | 90 days  | 1 day  | 0                               |
//! | `peak`       | 90 days  | 1 day  | Gaussian peak 45 days back      |
//! | `dense`      | 300 days | 12 min | seeded pseudo-random in [0, 1)  |
//! | `extradense` | 300 days | 4 min  | seeded pseudo-random in [0, 1)  |

use crate::catalog::{DataSource, Dataset};
use crate::config::SourceConfig;
use crate::pipeline::error::{PipelineError, PipelineResult};
use crate::pipeline::node::{Sample, StreamNode};
use crate::range::DataRange;
use crate::types::{Scalar, ScalarKind};
use chrono::{DateTime, NaiveDate, TimeDelta, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use tracing::debug;

/// Seed used when the configuration does not name one
pub const DEFAULT_SEED: u64 = 0x5eed;

const SECONDS_PER_DAY: i64 = 86_400;

/// How a dataset computes the value of its `index`-th sample.
#[derive(Clone)]
enum Pattern {
    /// Precomputed values, one per sample
    Table(Arc<[f32]>),
    Zeros,
    /// `exp(-0.7 * d^2)` where `d` is the distance to `center` in days
    Peak { center: DateTime<Utc> },
}

impl Pattern {
    fn value(&self, index: usize, at: DateTime<Utc>) -> f32 {
        match self {
            Pattern::Table(values) => values.get(index).copied().unwrap_or(0.0),
            Pattern::Zeros => 0.0,
            Pattern::Peak { center } => {
                let days = (at - *center).num_seconds() as f32 / SECONDS_PER_DAY as f32;
                (-0.7 * days * days).exp()
            }
        }
    }
}

/// Generator parameters for one dataset.
#[derive(Clone)]
struct Series {
    start: DateTime<Utc>,
    step: TimeDelta,
    pattern: Pattern,
}

/// Source of generated series.
pub struct SyntheticSource {
    id: String,
    name: String,
    anchor: DateTime<Utc>,
    datasets: Vec<Dataset>,
    series: Vec<Series>,
}

impl SyntheticSource {
    /// Create a source whose series end at midnight UTC of `anchor`.
    pub fn new(id: impl Into<String>, anchor: NaiveDate, seed: u64) -> Self {
        let id = id.into();
        let anchor = anchor.and_time(chrono::NaiveTime::MIN).and_utc();
        let mut rng = StdRng::seed_from_u64(seed);

        // (name, span in days, step, pattern); tables are filled in order
        let specs: [(&str, i64, TimeDelta, Option<Pattern>); 5] = [
            ("testset", 90, TimeDelta::days(1), None),
            ("zeros", 90, TimeDelta::days(1), Some(Pattern::Zeros)),
            (
                "peak",
                90,
                TimeDelta::days(1),
                Some(Pattern::Peak {
                    center: anchor - TimeDelta::days(45),
                }),
            ),
            ("dense", 300, TimeDelta::minutes(12), None),
            ("extradense", 300, TimeDelta::minutes(4), None),
        ];

        let mut datasets = Vec::with_capacity(specs.len());
        let mut series = Vec::with_capacity(specs.len());

        for (name, span_days, step, pattern) in specs {
            let start = anchor - TimeDelta::days(span_days);
            let count = (span_days * SECONDS_PER_DAY / step.num_seconds()) as usize + 1;
            let pattern = pattern.unwrap_or_else(|| {
                Pattern::Table((0..count).map(|_| rng.gen::<f32>()).collect())
            });

            let Some(coverage) = span(start, anchor) else {
                continue;
            };
            let Ok(dataset) = Dataset::new(
                name,
                id.clone(),
                ScalarKind::Instant,
                ScalarKind::Real32,
                &[coverage],
            ) else {
                continue;
            };

            datasets.push(dataset.with_category(&["synthetic"]));
            series.push(Series {
                start,
                step,
                pattern,
            });
        }

        debug!(
            "Synthetic source '{}' anchored at {} (seed {:#x})",
            id,
            anchor.format("%Y-%m-%d"),
            seed
        );

        Self {
            name: "Synthetic Data Source".to_string(),
            id,
            anchor,
            datasets,
            series,
        }
    }

    /// Build from a `[[sources]]` entry. The anchor defaults to today (UTC).
    pub fn from_config(config: &SourceConfig) -> Self {
        let anchor = config.anchor.unwrap_or_else(|| Utc::now().date_naive());
        let mut source = Self::new(
            config.id.clone(),
            anchor,
            config.seed.unwrap_or(DEFAULT_SEED),
        );
        if let Some(name) = &config.name {
            source.name = name.clone();
        }
        source
    }

    /// Last instant covered by every dataset.
    pub fn anchor(&self) -> DateTime<Utc> {
        self.anchor
    }
}

fn span(from: DateTime<Utc>, to: DateTime<Utc>) -> Option<DataRange> {
    DataRange::new(Scalar::Instant(from), Scalar::Instant(to)).ok()
}

impl DataSource for SyntheticSource {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> &'static str {
        "synthetic"
    }

    fn datasets(&self) -> &[Dataset] {
        &self.datasets
    }

    fn get_node(&self, dataset: &str, variant: Option<&str>) -> PipelineResult<Box<dyn StreamNode>> {
        let index = self
            .datasets
            .iter()
            .position(|d| d.id() == dataset)
            .ok_or_else(|| {
                PipelineError::NotFound(format!("dataset '{}' in source '{}'", dataset, self.id))
            })?;

        let entry = &self.datasets[index];
        entry.resolve_variant(variant)?;
        let available = entry.bounds().ok_or_else(|| {
            PipelineError::NotFound(format!("dataset '{}' has no data", dataset))
        })?;

        Ok(Box::new(SyntheticNode::new(
            format!("{}/{}", self.id, dataset),
            self.series[index].clone(),
            available,
        )))
    }
}

/// Leaf node walking one synthetic series.
pub struct SyntheticNode {
    name: String,
    series: Series,
    available: DataRange,
    cursor: DateTime<Utc>,
    index: usize,
    /// Last X to emit; `None` when the restricted range is empty
    last: Option<DateTime<Utc>>,
}

impl SyntheticNode {
    fn new(name: String, series: Series, available: DataRange) -> Self {
        let last = match available.to() {
            Scalar::Instant(t) => Some(t),
            _ => None,
        };
        Self {
            name,
            cursor: series.start,
            series,
            available,
            index: 0,
            last,
        }
    }
}

impl StreamNode for SyntheticNode {
    fn name(&self) -> &str {
        &self.name
    }

    fn x_kind(&self) -> ScalarKind {
        ScalarKind::Instant
    }

    fn y_kind(&self) -> ScalarKind {
        ScalarKind::Real32
    }

    fn apply_range(&mut self, range: &DataRange) -> PipelineResult<()> {
        if range.kind() != ScalarKind::Instant {
            return Err(PipelineError::KindMismatch {
                expected: ScalarKind::Instant,
                found: range.kind(),
            });
        }

        let Some(window) = self.available.intersection(range) else {
            self.last = None;
            return Ok(());
        };
        let (Scalar::Instant(from), Scalar::Instant(to)) = (window.from(), window.to()) else {
            self.last = None;
            return Ok(());
        };

        // Jump to the first sample at or after `from`
        let step = self.series.step.num_seconds();
        let offset = (from - self.series.start).num_seconds().max(0);
        let skip = (offset + step - 1) / step;
        self.index = skip as usize;
        self.cursor = self.series.start + TimeDelta::seconds(skip * step);
        self.last = Some(to);

        Ok(())
    }

    fn has_next(&mut self) -> PipelineResult<bool> {
        Ok(self.last.is_some_and(|last| self.cursor <= last))
    }

    fn peek(&mut self) -> PipelineResult<Sample> {
        if !self.has_next()? {
            return Err(PipelineError::EndOfSequence);
        }

        let value = self.series.pattern.value(self.index, self.cursor);
        Ok((Scalar::Instant(self.cursor), Scalar::Real32(value)))
    }

    fn next(&mut self) -> PipelineResult<Sample> {
        let sample = self.peek()?;
        self.cursor += self.series.step;
        self.index += 1;
        Ok(sample)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn anchor() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()
    }

    fn drain(node: &mut dyn StreamNode) -> Vec<Sample> {
        let mut out = Vec::new();
        while node.has_next().unwrap() {
            out.push(node.next().unwrap());
        }
        out
    }

    #[test]
    fn test_lists_all_datasets() {
        let source = SyntheticSource::new("dummy", anchor(), DEFAULT_SEED);
        let ids: Vec<_> = source.datasets().iter().map(|d| d.id()).collect();
        assert_eq!(ids, vec!["testset", "zeros", "peak", "dense", "extradense"]);
        assert_eq!(source.data_ranges().len(), 1);
    }

    #[test]
    fn test_daily_series_covers_ninety_days() {
        let source = SyntheticSource::new("dummy", anchor(), DEFAULT_SEED);
        let mut node = source.get_node("zeros", None).unwrap();
        let samples = drain(node.as_mut());

        assert_eq!(samples.len(), 91);
        assert!(samples.iter().all(|s| s.1 == Scalar::Real32(0.0)));
        assert_eq!(samples[90].0, Scalar::Instant(source.anchor()));
    }

    #[test]
    fn test_peak_is_centered() {
        let source = SyntheticSource::new("dummy", anchor(), DEFAULT_SEED);
        let mut node = source.get_node("peak", None).unwrap();
        let samples = drain(node.as_mut());

        assert_eq!(samples[45].1, Scalar::Real32(1.0));
        assert!(samples[44].1.as_f32() < 0.5);
        assert!(samples[0].1.as_f32() < 1e-6);
    }

    #[test]
    fn test_same_seed_same_values() {
        let a = SyntheticSource::new("a", anchor(), 7);
        let b = SyntheticSource::new("b", anchor(), 7);
        let first = drain(a.get_node("testset", None).unwrap().as_mut());
        let second = drain(b.get_node("testset", None).unwrap().as_mut());
        assert_eq!(first, second);
        assert!(first.iter().all(|s| (0.0..1.0).contains(&s.1.as_f32())));
    }

    #[test]
    fn test_apply_range_jumps_to_window() {
        let source = SyntheticSource::new("dummy", anchor(), DEFAULT_SEED);
        let full = drain(source.get_node("dense", None).unwrap().as_mut());
        assert_eq!(full.len(), 300 * 24 * 5 + 1);

        let end = source.anchor();
        let window = DataRange::new(
            Scalar::Instant(end - TimeDelta::minutes(30)),
            Scalar::Instant(end),
        )
        .unwrap();

        let mut node = source.get_node("dense", None).unwrap();
        node.apply_range(&window).unwrap();
        let tail = drain(node.as_mut());

        // 12-minute grid: end-24m, end-12m, end
        assert_eq!(tail.len(), 3);
        assert_eq!(tail[..], full[full.len() - 3..]);
    }

    #[test]
    fn test_disjoint_range_yields_nothing() {
        let source = SyntheticSource::new("dummy", anchor(), DEFAULT_SEED);
        let mut node = source.get_node("testset", None).unwrap();
        let future = DataRange::new(
            Scalar::Instant(source.anchor() + TimeDelta::days(1)),
            Scalar::Instant(source.anchor() + TimeDelta::days(2)),
        )
        .unwrap();
        node.apply_range(&future).unwrap();
        assert!(!node.has_next().unwrap());
    }

    #[test]
    fn test_unknown_dataset_and_variant() {
        let source = SyntheticSource::new("dummy", anchor(), DEFAULT_SEED);
        assert!(matches!(
            source.get_node("nope", None),
            Err(PipelineError::NotFound(_))
        ));
        assert!(matches!(
            source.get_node("testset", Some("port-1")),
            Err(PipelineError::NotFound(_))
        ));
    }
}

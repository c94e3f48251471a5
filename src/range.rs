//! Interval algebra over a single [`ScalarKind`] axis.
//!
//! Dataset catalogs describe available history as a simplified set of
//! [`DataRange`]s, and requests describe the wanted window as one more. Ranges
//! are immutable; every operation produces new values.

use crate::pipeline::error::{PipelineError, PipelineResult};
use crate::types::{Scalar, ScalarKind};
use serde::ser::SerializeTuple;
use serde::{Serialize, Serializer};
use std::cmp::Ordering;

/// A closed interval `[from, to]` with `from <= to`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DataRange {
    kind: ScalarKind,
    from: Scalar,
    to: Scalar,
}

impl DataRange {
    /// Create a range, validating that both ends share a kind and are ordered.
    pub fn new(from: Scalar, to: Scalar) -> PipelineResult<Self> {
        if from.kind() != to.kind() {
            return Err(PipelineError::KindMismatch {
                expected: from.kind(),
                found: to.kind(),
            });
        }

        match from.partial_cmp(&to) {
            Some(Ordering::Less | Ordering::Equal) => Ok(Self {
                kind: from.kind(),
                from,
                to,
            }),
            _ => Err(PipelineError::InvalidRange(format!(
                "'{}' is not before '{}'",
                from, to
            ))),
        }
    }

    /// The whole axis of `kind`.
    pub fn unbounded(kind: ScalarKind) -> Self {
        Self {
            kind,
            from: kind.min_value(),
            to: kind.max_value(),
        }
    }

    /// Parse textual endpoints in the given kind. A missing end stands for the
    /// axis minimum or maximum.
    pub fn parse(kind: ScalarKind, from: Option<&str>, to: Option<&str>) -> PipelineResult<Self> {
        let from = match from {
            Some(text) => Scalar::parse(kind, text)?,
            None => kind.min_value(),
        };
        let to = match to {
            Some(text) => Scalar::parse(kind, text)?,
            None => kind.max_value(),
        };
        Self::new(from, to)
    }

    pub fn kind(&self) -> ScalarKind {
        self.kind
    }

    pub fn from(&self) -> Scalar {
        self.from
    }

    pub fn to(&self) -> Scalar {
        self.to
    }

    /// Overlap of two ranges; `None` if kinds differ or the ranges are disjoint.
    pub fn intersection(&self, other: &DataRange) -> Option<DataRange> {
        if self.kind != other.kind {
            return None;
        }

        let start = if self.from >= other.from { self.from } else { other.from };
        let end = if self.to <= other.to { self.to } else { other.to };

        match start.partial_cmp(&end) {
            Some(Ordering::Less | Ordering::Equal) => Some(DataRange {
                kind: self.kind,
                from: start,
                to: end,
            }),
            _ => None,
        }
    }

    /// True iff `other` lies entirely inside `self`.
    pub fn contains(&self, other: &DataRange) -> bool {
        self.kind == other.kind && self.from <= other.from && self.to >= other.to
    }

    /// True iff `value` lies inside the range.
    pub fn contains_value(&self, value: &Scalar) -> bool {
        value.kind() == self.kind && self.from <= *value && *value <= self.to
    }

    /// Smallest range covering all of `ranges`; `None` on empty or mixed-kind input.
    pub fn bounding_box<'a, I>(ranges: I) -> Option<DataRange>
    where
        I: IntoIterator<Item = &'a DataRange>,
    {
        let mut iter = ranges.into_iter();
        let mut acc = *iter.next()?;

        for range in iter {
            if range.kind != acc.kind {
                return None;
            }
            if range.from < acc.from {
                acc.from = range.from;
            }
            if range.to > acc.to {
                acc.to = range.to;
            }
        }

        Some(acc)
    }

    /// Merge touching or overlapping ranges into a minimal, sorted, disjoint cover.
    pub fn simplify<'a, I>(ranges: I) -> Vec<DataRange>
    where
        I: IntoIterator<Item = &'a DataRange>,
    {
        let mut sorted: Vec<DataRange> = ranges.into_iter().copied().collect();
        sorted.sort_by(|a, b| a.from.partial_cmp(&b.from).unwrap_or(Ordering::Equal));

        let mut merged: Vec<DataRange> = Vec::with_capacity(sorted.len());
        let mut iter = sorted.into_iter();
        let Some(mut current) = iter.next() else {
            return merged;
        };

        for next in iter {
            if current.intersection(&next).is_some() {
                current = DataRange::bounding_box([&current, &next]).unwrap_or(current);
            } else {
                merged.push(current);
                current = next;
            }
        }
        merged.push(current);

        merged
    }
}

impl Serialize for DataRange {
    /// Serialized as a `[from, to]` pair.
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut tuple = serializer.serialize_tuple(2)?;
        tuple.serialize_element(&self.from)?;
        tuple.serialize_element(&self.to)?;
        tuple.end()
    }
}

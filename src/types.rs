//! Core value types for perfstream
//!
//! Every stream node produces `(X, Y)` pairs of [`Scalar`] values. The kind of
//! each axis is declared up front as a [`ScalarKind`] and never changes for the
//! life of a node, so operators can decide promotion and encoding rules once at
//! construction instead of inspecting every sample.
//!
//! # Kinds
//!
//! - `Instant` - UTC timestamp with second resolution
//! - `Integer` - 32-bit signed integer
//! - `Real32` - IEEE-754 binary32
//! - `Real64` - IEEE-754 binary64
//!
//! # Serialized names
//!
//! Catalog listings and pipeline specs name kinds the same way the HTTP API
//! always has: `datetime`, `int`, `float` and `double`.

use crate::pipeline::error::{PipelineError, PipelineResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;

/// The kind of value carried on one axis of a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScalarKind {
    /// Timestamp, second resolution
    #[serde(rename = "datetime")]
    Instant,
    /// 32-bit signed integer
    #[serde(rename = "int")]
    Integer,
    /// 32-bit floating point
    #[serde(rename = "float")]
    Real32,
    /// 64-bit floating point
    #[serde(rename = "double")]
    Real64,
}

impl ScalarKind {
    /// All kinds, in promotion order.
    pub fn all() -> &'static [ScalarKind] {
        &[
            ScalarKind::Instant,
            ScalarKind::Integer,
            ScalarKind::Real32,
            ScalarKind::Real64,
        ]
    }

    /// Serialized name of this kind
    pub fn name(&self) -> &'static str {
        match self {
            ScalarKind::Instant => "datetime",
            ScalarKind::Integer => "int",
            ScalarKind::Real32 => "float",
            ScalarKind::Real64 => "double",
        }
    }

    /// Returns true for kinds that take part in arithmetic (everything but `Instant`)
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            ScalarKind::Integer | ScalarKind::Real32 | ScalarKind::Real64
        )
    }

    /// Returns true for kinds that can be bound into an expression.
    pub fn is_scalar(&self) -> bool {
        self.is_numeric() || matches!(self, ScalarKind::Instant)
    }

    /// The zero value of this kind (the Unix epoch for `Instant`).
    pub fn zero(&self) -> Scalar {
        match self {
            ScalarKind::Instant => Scalar::Instant(DateTime::<Utc>::UNIX_EPOCH),
            ScalarKind::Integer => Scalar::Integer(0),
            ScalarKind::Real32 => Scalar::Real32(0.0),
            ScalarKind::Real64 => Scalar::Real64(0.0),
        }
    }

    /// Smallest representable value of this kind
    pub fn min_value(&self) -> Scalar {
        match self {
            ScalarKind::Instant => Scalar::Instant(DateTime::<Utc>::MIN_UTC),
            ScalarKind::Integer => Scalar::Integer(i32::MIN),
            ScalarKind::Real32 => Scalar::Real32(f32::MIN),
            ScalarKind::Real64 => Scalar::Real64(f64::MIN),
        }
    }

    /// Largest representable value of this kind
    pub fn max_value(&self) -> Scalar {
        match self {
            ScalarKind::Instant => Scalar::Instant(DateTime::<Utc>::MAX_UTC),
            ScalarKind::Integer => Scalar::Integer(i32::MAX),
            ScalarKind::Real32 => Scalar::Real32(f32::MAX),
            ScalarKind::Real64 => Scalar::Real64(f64::MAX),
        }
    }

    /// Numeric promotion over a set of kinds.
    ///
    /// `Real64` wins over `Real32`, which wins over `Integer`. Returns `None`
    /// for an empty set or when any kind is not numeric.
    pub fn promote<I>(kinds: I) -> Option<ScalarKind>
    where
        I: IntoIterator<Item = ScalarKind>,
    {
        let mut result: Option<ScalarKind> = None;
        for kind in kinds {
            if !kind.is_numeric() {
                return None;
            }
            result = Some(match (result, kind) {
                (None, k) => k,
                (Some(ScalarKind::Real64), _) | (_, ScalarKind::Real64) => ScalarKind::Real64,
                (Some(ScalarKind::Real32), _) | (_, ScalarKind::Real32) => ScalarKind::Real32,
                _ => ScalarKind::Integer,
            });
        }
        result
    }
}

impl fmt::Display for ScalarKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A single axis value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Scalar {
    Instant(DateTime<Utc>),
    Integer(i32),
    Real32(f32),
    Real64(f64),
}

impl Scalar {
    /// The kind tag of this value
    pub fn kind(&self) -> ScalarKind {
        match self {
            Scalar::Instant(_) => ScalarKind::Instant,
            Scalar::Integer(_) => ScalarKind::Integer,
            Scalar::Real32(_) => ScalarKind::Real32,
            Scalar::Real64(_) => ScalarKind::Real64,
        }
    }

    /// Build an `Instant` from Unix seconds. `None` if out of chrono's range.
    pub fn unix(seconds: i64) -> Option<Scalar> {
        DateTime::from_timestamp(seconds, 0).map(Scalar::Instant)
    }

    /// Unix seconds for `Instant`, `None` for every other kind.
    pub fn unix_seconds(&self) -> Option<i64> {
        match self {
            Scalar::Instant(t) => Some(t.timestamp()),
            _ => None,
        }
    }

    /// Lossy cast to `f32`; `Instant` casts to its Unix seconds.
    pub fn as_f32(&self) -> f32 {
        match *self {
            Scalar::Instant(t) => t.timestamp() as f32,
            Scalar::Integer(v) => v as f32,
            Scalar::Real32(v) => v,
            Scalar::Real64(v) => v as f32,
        }
    }

    /// Lossy cast to `f64`; `Instant` casts to its Unix seconds.
    pub fn as_f64(&self) -> f64 {
        match *self {
            Scalar::Instant(t) => t.timestamp() as f64,
            Scalar::Integer(v) => v as f64,
            Scalar::Real32(v) => v as f64,
            Scalar::Real64(v) => v,
        }
    }

    /// Saturating cast to `i32`; `Instant` casts to its Unix seconds.
    pub fn as_i32(&self) -> i32 {
        match *self {
            Scalar::Instant(t) => t.timestamp().clamp(i32::MIN as i64, i32::MAX as i64) as i32,
            Scalar::Integer(v) => v,
            Scalar::Real32(v) => v as i32,
            Scalar::Real64(v) => v as i32,
        }
    }

    /// Cast this value into `kind`.
    ///
    /// Numeric targets always succeed (float to int saturates). An `Instant`
    /// target interprets the value as Unix seconds and fails outside
    /// chrono's representable range.
    pub fn cast(&self, kind: ScalarKind) -> Option<Scalar> {
        match kind {
            ScalarKind::Integer => Some(Scalar::Integer(self.as_i32())),
            ScalarKind::Real32 => Some(Scalar::Real32(self.as_f32())),
            ScalarKind::Real64 => Some(Scalar::Real64(self.as_f64())),
            ScalarKind::Instant => match *self {
                Scalar::Instant(_) => Some(*self),
                Scalar::Integer(v) => Scalar::unix(v as i64),
                Scalar::Real32(v) => Scalar::unix(v as i64),
                Scalar::Real64(v) => Scalar::unix(v as i64),
            },
        }
    }

    /// `self - earlier` as `f32`.
    ///
    /// For `Instant` this is the elapsed time in seconds. Both values must be of
    /// the same kind.
    pub fn delta_f32(&self, earlier: &Scalar) -> Option<f32> {
        match (*self, *earlier) {
            (Scalar::Instant(a), Scalar::Instant(b)) => Some((a - b).num_seconds() as f32),
            (Scalar::Integer(a), Scalar::Integer(b)) => Some(a.wrapping_sub(b) as f32),
            (Scalar::Real32(a), Scalar::Real32(b)) => Some(a - b),
            (Scalar::Real64(a), Scalar::Real64(b)) => Some((a - b) as f32),
            _ => None,
        }
    }

    /// Parse a textual value of the given kind.
    ///
    /// `Instant` accepts either integer Unix seconds or an RFC 3339 timestamp.
    pub fn parse(kind: ScalarKind, text: &str) -> PipelineResult<Scalar> {
        let text = text.trim();
        let invalid = || PipelineError::InvalidRange(format!("'{}' is not a valid {}", text, kind));

        match kind {
            ScalarKind::Instant => {
                if let Ok(seconds) = text.parse::<i64>() {
                    return Scalar::unix(seconds).ok_or_else(invalid);
                }
                // Sub-second precision is dropped to stay on the second grid
                DateTime::parse_from_rfc3339(text)
                    .map_err(|_| invalid())
                    .and_then(|t| Scalar::unix(t.timestamp()).ok_or_else(invalid))
            }
            ScalarKind::Integer => text.parse().map(Scalar::Integer).map_err(|_| invalid()),
            ScalarKind::Real32 => text.parse().map(Scalar::Real32).map_err(|_| invalid()),
            ScalarKind::Real64 => text.parse().map(Scalar::Real64).map_err(|_| invalid()),
        }
    }
}

impl PartialOrd for Scalar {
    /// Values of different kinds are unordered.
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Scalar::Instant(a), Scalar::Instant(b)) => a.partial_cmp(b),
            (Scalar::Integer(a), Scalar::Integer(b)) => a.partial_cmp(b),
            (Scalar::Real32(a), Scalar::Real32(b)) => a.partial_cmp(b),
            (Scalar::Real64(a), Scalar::Real64(b)) => a.partial_cmp(b),
            _ => None,
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Instant(t) => write!(f, "{}", t.to_rfc3339()),
            Scalar::Integer(v) => write!(f, "{}", v),
            Scalar::Real32(v) => write!(f, "{}", v),
            Scalar::Real64(v) => write!(f, "{}", v),
        }
    }
}

impl Serialize for Scalar {
    /// `Instant` serializes as Unix seconds, numbers as themselves.
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match *self {
            Scalar::Instant(t) => serializer.serialize_i64(t.timestamp()),
            Scalar::Integer(v) => serializer.serialize_i32(v),
            Scalar::Real32(v) => serializer.serialize_f32(v),
            Scalar::Real64(v) => serializer.serialize_f64(v),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_names_round_trip_through_serde() {
        for kind in ScalarKind::all() {
            let json = serde_json::to_string(kind).unwrap();
            assert_eq!(json, format!("\"{}\"", kind.name()));
            let back: ScalarKind = serde_json::from_str(&json).unwrap();
            assert_eq!(back, *kind);
        }
    }

    #[test]
    fn test_promotion() {
        use ScalarKind::*;
        assert_eq!(ScalarKind::promote([Integer, Integer]), Some(Integer));
        assert_eq!(ScalarKind::promote([Integer, Real32]), Some(Real32));
        assert_eq!(ScalarKind::promote([Real32, Real64, Integer]), Some(Real64));
        assert_eq!(ScalarKind::promote([Integer, Instant]), None);
        assert_eq!(ScalarKind::promote([]), None);
    }

    #[test]
    fn test_zero_values() {
        assert_eq!(ScalarKind::Instant.zero().unix_seconds(), Some(0));
        assert_eq!(ScalarKind::Integer.zero(), Scalar::Integer(0));
        assert_eq!(ScalarKind::Real64.zero(), Scalar::Real64(0.0));
    }

    #[test]
    fn test_parse_instant_forms() {
        let a = Scalar::parse(ScalarKind::Instant, "1700000000").unwrap();
        let b = Scalar::parse(ScalarKind::Instant, "2023-11-14T22:13:20Z").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.unix_seconds(), Some(1_700_000_000));

        let trimmed = Scalar::parse(ScalarKind::Instant, "2023-11-14T22:13:20.750Z").unwrap();
        assert_eq!(trimmed, a);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(Scalar::parse(ScalarKind::Integer, "12.5").is_err());
        assert!(Scalar::parse(ScalarKind::Instant, "yesterday").is_err());
        assert_eq!(
            Scalar::parse(ScalarKind::Real32, " 2.5 ").unwrap(),
            Scalar::Real32(2.5)
        );
    }

    #[test]
    fn test_cross_kind_values_are_unordered() {
        assert_eq!(Scalar::Integer(1).partial_cmp(&Scalar::Real32(1.0)), None);
        assert!(Scalar::Integer(1) < Scalar::Integer(2));
    }

    #[test]
    fn test_delta_in_seconds_for_instants() {
        let a = Scalar::unix(100).unwrap();
        let b = Scalar::unix(160).unwrap();
        assert_eq!(b.delta_f32(&a), Some(60.0));
        assert_eq!(Scalar::Integer(3).delta_f32(&Scalar::Real32(1.0)), None);
    }

    #[test]
    fn test_cast() {
        assert_eq!(Scalar::Real32(2.9).cast(ScalarKind::Integer), Some(Scalar::Integer(2)));
        assert_eq!(Scalar::Integer(7).cast(ScalarKind::Real64), Some(Scalar::Real64(7.0)));
        assert_eq!(
            Scalar::Integer(60).cast(ScalarKind::Instant),
            Scalar::unix(60)
        );
    }

    #[test]
    fn test_serialize_instant_as_seconds() {
        let json = serde_json::to_string(&Scalar::unix(42).unwrap()).unwrap();
        assert_eq!(json, "42");
    }
}

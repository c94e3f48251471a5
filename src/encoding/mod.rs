//! Binary wire format for pipeline output
//!
//! # Record layout
//!
//! Every record is a fixed-size X field followed by a fixed-size Y field, all
//! little-endian, with no padding:
//!
//! ```text
//! X  datetime  i32  seconds since the Unix epoch
//! Y  int       i32
//! Y  float     f32  IEEE-754 single precision
//! ```
//!
//! # Framing
//!
//! [`FramedBuffer`] collects one pipeline's records and emits them as a block
//! prefixed by a `u32` byte count:
//!
//! ```text
//! [0..4]   payload length in bytes (LE)
//! [4..]    records
//! ```
//!
//! A fetch response is the concatenation of one block per pipeline, in
//! request order. [`StreamWriter`] writes bare records with no header and is
//! used for single-dataset bulk exports.

pub mod framed;
pub mod stream;

pub use framed::{FramedBuffer, DEFAULT_FRAME_CAPACITY};
pub use stream::StreamWriter;

use crate::pipeline::error::{PipelineError, PipelineResult};
use crate::types::{Scalar, ScalarKind};

/// X kinds the wire format can carry
pub const SUPPORTED_X: &[ScalarKind] = &[ScalarKind::Instant];

/// Y kinds the wire format can carry
pub const SUPPORTED_Y: &[ScalarKind] = &[ScalarKind::Integer, ScalarKind::Real32];

/// Size of the largest record
pub const MAX_RECORD_SIZE: usize = 8;

/// Size of a frame header
pub const FRAME_HEADER_SIZE: usize = 4;

/// Sink for encoded samples.
///
/// `set_types` must be called before the first `write`. Every written sample
/// must match the declared kinds.
pub trait DataWriter {
    fn set_types(&mut self, x_kind: ScalarKind, y_kind: ScalarKind) -> PipelineResult<()>;

    fn write(&mut self, x: Scalar, y: Scalar) -> PipelineResult<()>;
}

/// Validated pair of field kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordLayout {
    x_kind: ScalarKind,
    y_kind: ScalarKind,
}

impl RecordLayout {
    pub fn new(x_kind: ScalarKind, y_kind: ScalarKind) -> PipelineResult<Self> {
        if !SUPPORTED_X.contains(&x_kind) || !SUPPORTED_Y.contains(&y_kind) {
            return Err(PipelineError::UnsupportedType {
                x: x_kind,
                y: y_kind,
            });
        }
        Ok(Self { x_kind, y_kind })
    }

    pub fn x_kind(&self) -> ScalarKind {
        self.x_kind
    }

    pub fn y_kind(&self) -> ScalarKind {
        self.y_kind
    }

    pub fn record_size(&self) -> usize {
        field_size(self.x_kind) + field_size(self.y_kind)
    }

    /// Encode one record into `out`, returning the number of bytes used.
    pub fn encode(
        &self,
        x: Scalar,
        y: Scalar,
        out: &mut [u8; MAX_RECORD_SIZE],
    ) -> PipelineResult<usize> {
        let split = field_size(self.x_kind);
        let size = self.record_size();
        encode_field(self.x_kind, x, &mut out[..split])?;
        encode_field(self.y_kind, y, &mut out[split..size])?;
        Ok(size)
    }

    /// Decode one record from the start of `bytes`.
    pub fn decode(&self, bytes: &[u8]) -> PipelineResult<(Scalar, Scalar)> {
        if bytes.len() < self.record_size() {
            return Err(PipelineError::ValueOutOfRange(format!(
                "record needs {} bytes, got {}",
                self.record_size(),
                bytes.len()
            )));
        }
        let split = field_size(self.x_kind);
        let x = decode_field(self.x_kind, &bytes[..split])?;
        let y = decode_field(self.y_kind, &bytes[split..self.record_size()])?;
        Ok((x, y))
    }

    /// Decode a whole payload of records.
    pub fn decode_all(&self, payload: &[u8]) -> PipelineResult<Vec<(Scalar, Scalar)>> {
        let size = self.record_size();
        if payload.len() % size != 0 {
            return Err(PipelineError::ValueOutOfRange(format!(
                "payload of {} bytes is not a multiple of {}",
                payload.len(),
                size
            )));
        }
        payload.chunks_exact(size).map(|c| self.decode(c)).collect()
    }
}

fn field_size(kind: ScalarKind) -> usize {
    match kind {
        ScalarKind::Instant | ScalarKind::Integer | ScalarKind::Real32 => 4,
        ScalarKind::Real64 => 8,
    }
}

fn encode_field(kind: ScalarKind, value: Scalar, out: &mut [u8]) -> PipelineResult<()> {
    if value.kind() != kind {
        return Err(PipelineError::KindMismatch {
            expected: kind,
            found: value.kind(),
        });
    }

    let bytes = match value {
        Scalar::Instant(t) => {
            let seconds = i32::try_from(t.timestamp()).map_err(|_| {
                PipelineError::ValueOutOfRange(format!("{} does not fit a 32-bit timestamp", t))
            })?;
            seconds.to_le_bytes()
        }
        Scalar::Integer(v) => v.to_le_bytes(),
        Scalar::Real32(v) => v.to_le_bytes(),
        other => {
            return Err(PipelineError::ValueOutOfRange(format!(
                "{} has no wire encoding",
                other
            )))
        }
    };
    out.copy_from_slice(&bytes);
    Ok(())
}

fn decode_field(kind: ScalarKind, bytes: &[u8]) -> PipelineResult<Scalar> {
    let raw: [u8; 4] = bytes
        .try_into()
        .map_err(|_| PipelineError::ValueOutOfRange(format!("bad {} field width", kind)))?;

    match kind {
        ScalarKind::Instant => {
            let seconds = i32::from_le_bytes(raw);
            Scalar::unix(seconds.into()).ok_or_else(|| {
                PipelineError::ValueOutOfRange(format!("{} is not a valid timestamp", seconds))
            })
        }
        ScalarKind::Integer => Ok(Scalar::Integer(i32::from_le_bytes(raw))),
        ScalarKind::Real32 => Ok(Scalar::Real32(f32::from_le_bytes(raw))),
        other => Err(PipelineError::ValueOutOfRange(format!(
            "{} has no wire encoding",
            other
        ))),
    }
}

use super::{DataWriter, RecordLayout, FRAME_HEADER_SIZE, MAX_RECORD_SIZE};
use crate::pipeline::error::{PipelineError, PipelineResult};
use crate::types::{Scalar, ScalarKind};
use std::io::Write;

/// Default payload capacity of one frame (16 MiB)
pub const DEFAULT_FRAME_CAPACITY: usize = 16 * 1024 * 1024;

/// Buffers one pipeline's records and emits them as a length-prefixed block.
///
/// `set_types` starts a new frame. `flush` writes the header and payload to a
/// sink and empties the buffer, keeping the layout.
#[derive(Debug)]
pub struct FramedBuffer {
    buffer: Vec<u8>,
    capacity: usize,
    layout: Option<RecordLayout>,
    records: usize,
}

impl FramedBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            buffer: Vec::new(),
            capacity: capacity.min(u32::MAX as usize),
            layout: None,
            records: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn layout(&self) -> Option<RecordLayout> {
        self.layout
    }

    /// Payload bytes buffered so far
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Records buffered so far
    pub fn records(&self) -> usize {
        self.records
    }

    /// Write the current frame to `sink` and reset. Returns the bytes written,
    /// header included.
    pub fn flush<W: Write + ?Sized>(&mut self, sink: &mut W) -> PipelineResult<usize> {
        let length = u32::try_from(self.buffer.len()).map_err(|_| {
            PipelineError::ValueOutOfRange(format!(
                "frame of {} bytes exceeds the header range",
                self.buffer.len()
            ))
        })?;

        sink.write_all(&length.to_le_bytes())?;
        sink.write_all(&self.buffer)?;

        let written = FRAME_HEADER_SIZE + self.buffer.len();
        self.buffer.clear();
        self.records = 0;
        Ok(written)
    }
}

impl Default for FramedBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_FRAME_CAPACITY)
    }
}

impl DataWriter for FramedBuffer {
    fn set_types(&mut self, x_kind: ScalarKind, y_kind: ScalarKind) -> PipelineResult<()> {
        self.layout = Some(RecordLayout::new(x_kind, y_kind)?);
        self.buffer.clear();
        self.records = 0;
        Ok(())
    }

    fn write(&mut self, x: Scalar, y: Scalar) -> PipelineResult<()> {
        let layout = self.layout.ok_or_else(|| {
            PipelineError::EncoderState("write() called before set_types()".to_string())
        })?;

        if self.buffer.len() + layout.record_size() > self.capacity {
            return Err(PipelineError::EncoderState(format!(
                "frame capacity of {} bytes exceeded",
                self.capacity
            )));
        }

        let mut scratch = [0u8; MAX_RECORD_SIZE];
        let n = layout.encode(x, y, &mut scratch)?;
        self.buffer.extend_from_slice(&scratch[..n]);
        self.records += 1;
        Ok(())
    }
}

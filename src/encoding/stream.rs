use super::{DataWriter, RecordLayout, MAX_RECORD_SIZE};
use crate::pipeline::error::{PipelineError, PipelineResult};
use crate::types::{Scalar, ScalarKind};
use std::io::Write;

/// Writes bare records straight to a sink, without framing.
pub struct StreamWriter<W: Write> {
    sink: W,
    layout: Option<RecordLayout>,
    records: usize,
}

impl<W: Write> StreamWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            sink,
            layout: None,
            records: 0,
        }
    }

    /// Records written so far
    pub fn records(&self) -> usize {
        self.records
    }

    /// Bytes written so far
    pub fn bytes(&self) -> usize {
        self.layout.map_or(0, |l| l.record_size() * self.records)
    }

    pub fn flush(&mut self) -> PipelineResult<()> {
        self.sink.flush()?;
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.sink
    }
}

impl<W: Write> DataWriter for StreamWriter<W> {
    fn set_types(&mut self, x_kind: ScalarKind, y_kind: ScalarKind) -> PipelineResult<()> {
        if self.records > 0 {
            return Err(PipelineError::EncoderState(
                "set_types() called after records were written".to_string(),
            ));
        }
        self.layout = Some(RecordLayout::new(x_kind, y_kind)?);
        Ok(())
    }

    fn write(&mut self, x: Scalar, y: Scalar) -> PipelineResult<()> {
        let layout = self.layout.ok_or_else(|| {
            PipelineError::EncoderState("write() called before set_types()".to_string())
        })?;

        let mut scratch = [0u8; MAX_RECORD_SIZE];
        let n = layout.encode(x, y, &mut scratch)?;
        self.sink.write_all(&scratch[..n])?;
        self.records += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_records_go_straight_to_sink() {
        let mut writer = StreamWriter::new(Vec::new());
        writer.set_types(ScalarKind::Instant, ScalarKind::Real32).unwrap();
        writer
            .write(Scalar::unix(10).unwrap(), Scalar::Real32(2.5))
            .unwrap();

        assert_eq!(writer.records(), 1);
        assert_eq!(writer.bytes(), 8);

        let out = writer.into_inner();
        assert_eq!(&out[..4], &10i32.to_le_bytes());
        assert_eq!(&out[4..], &2.5f32.to_le_bytes());
    }

    #[test]
    fn test_state_errors() {
        let mut writer = StreamWriter::new(Vec::new());
        assert!(matches!(
            writer.write(Scalar::unix(0).unwrap(), Scalar::Integer(0)),
            Err(PipelineError::EncoderState(_))
        ));

        assert!(matches!(
            writer.set_types(ScalarKind::Instant, ScalarKind::Real64),
            Err(PipelineError::UnsupportedType { .. })
        ));

        writer.set_types(ScalarKind::Instant, ScalarKind::Integer).unwrap();
        writer.write(Scalar::unix(0).unwrap(), Scalar::Integer(0)).unwrap();
        assert!(writer.set_types(ScalarKind::Instant, ScalarKind::Integer).is_err());
    }

    #[test]
    fn test_failing_sink_reports_io() {
        struct Broken;
        impl Write for Broken {
            fn write(&mut self, _: &[u8]) -> std::io::Result<usize> {
                Err(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "closed"))
            }
            fn flush(&mut self) -> std::io::Result<()> {
                Ok(())
            }
        }

        let mut writer = StreamWriter::new(Broken);
        writer.set_types(ScalarKind::Instant, ScalarKind::Integer).unwrap();
        assert!(matches!(
            writer.write(Scalar::unix(0).unwrap(), Scalar::Integer(0)),
            Err(PipelineError::Io(_))
        ));
    }
}

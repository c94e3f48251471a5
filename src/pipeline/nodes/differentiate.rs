//! Differentiate stage: discrete derivative of a stream.
//!
//! Each output is `dy / dx` over a pair of consecutive child samples, where
//! `dx` is measured in seconds for `Instant` axes. Outputs sit on the
//! **trailing edge**: the value computed from samples `i` and `i + 1` is
//! emitted at X of sample `i`. The same rule applies to the first, interior and
//! last outputs, so N input samples always produce `max(N - 1, 0)` outputs.

use crate::pipeline::error::{PipelineError, PipelineResult};
use crate::pipeline::node::{AnyNode, Sample, StreamNode};
use crate::pipeline::window::RotatingWindow;
use crate::range::DataRange;
use crate::types::{Scalar, ScalarKind};

/// Number of raw samples kept around.
const WINDOW_SLOTS: usize = 3;

/// Differentiate: emits `Real32` slopes of the child's Y with respect to X.
pub struct DifferentiateStage {
    child: AnyNode,
    /// Most recent raw samples, newest at age 0.
    window: RotatingWindow<Sample, WINDOW_SLOTS>,
    /// Next output, computed ahead for `peek()`.
    pending: Option<Sample>,
    primed: bool,
}

impl DifferentiateStage {
    pub fn new(child: AnyNode) -> PipelineResult<Self> {
        if !child.y_kind().is_numeric() {
            return Err(PipelineError::Configuration(format!(
                "diff requires a numeric Y, got {}",
                child.y_kind()
            )));
        }

        Ok(Self {
            child,
            window: RotatingWindow::new(),
            pending: None,
            primed: false,
        })
    }

    pub fn name(&self) -> &str {
        "diff"
    }

    pub fn x_kind(&self) -> ScalarKind {
        self.child.x_kind()
    }

    pub fn y_kind(&self) -> ScalarKind {
        ScalarKind::Real32
    }

    pub fn apply_range(&mut self, range: &DataRange) -> PipelineResult<()> {
        self.child.apply_range(range)
    }

    pub fn has_next(&mut self) -> PipelineResult<bool> {
        self.fill()?;
        Ok(self.pending.is_some())
    }

    pub fn peek(&mut self) -> PipelineResult<Sample> {
        self.fill()?;
        self.pending.ok_or(PipelineError::EndOfSequence)
    }

    pub fn next(&mut self) -> PipelineResult<Sample> {
        self.fill()?;
        self.pending.take().ok_or(PipelineError::EndOfSequence)
    }

    pub fn query_leaf_x_kind(&self) -> PipelineResult<ScalarKind> {
        self.child.query_leaf_x_kind()
    }

    /// Compute the next output if none is buffered and the child has data left.
    fn fill(&mut self) -> PipelineResult<()> {
        if !self.primed {
            self.primed = true;
            if self.child.has_next()? {
                let first = self.child.next()?;
                self.window.push(first);
            }
        }

        if self.pending.is_some() || self.window.is_empty() || !self.child.has_next()? {
            return Ok(());
        }

        let sample = self.child.next()?;
        self.window.push(sample);
        debug_assert!(
            self.window
                .iter()
                .zip(self.window.iter().skip(1))
                .all(|(a, b)| a.0 <= b.0),
            "diff child emitted decreasing X"
        );

        let (Some(earlier), Some(later)) = (self.window.get(1), self.window.get(0)) else {
            return Ok(());
        };
        self.pending = Some((earlier.0, slope(&earlier, &later)?));

        Ok(())
    }
}

fn slope(earlier: &Sample, later: &Sample) -> PipelineResult<Scalar> {
    let dy = later.1.delta_f32(&earlier.1).ok_or(PipelineError::KindMismatch {
        expected: earlier.1.kind(),
        found: later.1.kind(),
    })?;
    let dx = later.0.delta_f32(&earlier.0).ok_or(PipelineError::KindMismatch {
        expected: earlier.0.kind(),
        found: later.0.kind(),
    })?;

    Ok(Scalar::Real32(dy / dx))
}

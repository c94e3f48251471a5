//! Merge stage: aligns several streams on X and sums or averages their Y.
//!
//! Each step pulls one sample from every child and aligns the laggards on the
//! largest X. A child that jumps past that X keeps its previously pulled Y for
//! the step (carry-forward). There is no interpolation between samples.

use crate::pipeline::error::{PipelineError, PipelineResult};
use crate::pipeline::node::{common_leaf_x_kind, AnyNode, Sample, StreamNode};
use crate::range::DataRange;
use crate::types::{Scalar, ScalarKind};
use std::cmp::Ordering;

/// How aligned Y values are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOp {
    /// Add in the promoted kind. Integer adds wrap.
    Sum,
    /// Sum divided by the child count, always `Real32`.
    Average,
}

/// Sum/Average over two or more children sharing one X kind.
pub struct MergeStage {
    op: MergeOp,
    children: Vec<AnyNode>,
    x_kind: ScalarKind,
    /// Promoted kind of the children's Y, used for accumulation
    promoted: ScalarKind,
    /// Next output, computed ahead for `peek()`. `None` once exhausted.
    pending: Option<Sample>,
    initialized: bool,
}

impl MergeStage {
    pub fn new(op: MergeOp, children: Vec<AnyNode>) -> PipelineResult<Self> {
        if children.len() < 2 {
            return Err(PipelineError::Configuration(format!(
                "merge needs at least two children, got {}",
                children.len()
            )));
        }

        let x_kind = children[0].x_kind();
        if let Some(other) = children.iter().find(|c| c.x_kind() != x_kind) {
            return Err(PipelineError::Configuration(format!(
                "all children must share one X kind, found {} and {}",
                x_kind,
                other.x_kind()
            )));
        }

        let promoted = ScalarKind::promote(children.iter().map(|c| c.y_kind())).ok_or_else(|| {
            PipelineError::Configuration("all children must have a numeric Y kind".to_string())
        })?;

        Ok(Self {
            op,
            children,
            x_kind,
            promoted,
            pending: None,
            initialized: false,
        })
    }

    pub fn op(&self) -> MergeOp {
        self.op
    }

    pub fn name(&self) -> &str {
        match self.op {
            MergeOp::Sum => "sum",
            MergeOp::Average => "avg",
        }
    }

    pub fn x_kind(&self) -> ScalarKind {
        self.x_kind
    }

    pub fn y_kind(&self) -> ScalarKind {
        match self.op {
            MergeOp::Sum => self.promoted,
            MergeOp::Average => ScalarKind::Real32,
        }
    }

    pub fn apply_range(&mut self, range: &DataRange) -> PipelineResult<()> {
        for child in &mut self.children {
            child.apply_range(range)?;
        }
        Ok(())
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
        let sample = self.pending.take().ok_or(PipelineError::EndOfSequence)?;
        // The following step is only computed when asked for
        self.initialized = false;
        Ok(sample)
    }

    pub fn query_leaf_x_kind(&self) -> PipelineResult<ScalarKind> {
        common_leaf_x_kind(&self.children)
    }

    fn fill(&mut self) -> PipelineResult<()> {
        if !self.initialized {
            self.pending = self.step()?;
            self.initialized = true;
        }
        Ok(())
    }

    /// One merge step. `Ok(None)` means the stage is exhausted.
    fn step(&mut self) -> PipelineResult<Option<Sample>> {
        for child in &mut self.children {
            if !child.has_next()? {
                return Ok(None);
            }
        }

        let mut pulled = Vec::with_capacity(self.children.len());
        for child in &mut self.children {
            pulled.push(child.next()?);
        }

        let mut max_x = pulled[0].0;
        for (x, _) in &pulled[1..] {
            if *x > max_x {
                max_x = *x;
            }
        }

        for (child, sample) in self.children.iter_mut().zip(pulled.iter_mut()) {
            if sample.0 >= max_x {
                continue;
            }

            loop {
                if !child.has_next()? {
                    return Ok(None);
                }
                let (x, _) = child.peek()?;
                match x.partial_cmp(&max_x) {
                    Some(Ordering::Equal) => {
                        *sample = child.next()?;
                        break;
                    }
                    // Carry-forward: keep the Y pulled above, leave the child untouched
                    Some(Ordering::Greater) => break,
                    _ => {
                        child.next()?;
                    }
                }
            }
        }

        Ok(Some((max_x, self.combine(&pulled))))
    }

    fn combine(&self, samples: &[Sample]) -> Scalar {
        let ys = samples.iter().map(|(_, y)| y);
        match (self.op, self.promoted) {
            // f32 accumulation; integer children never wrap
            (MergeOp::Average, _) => {
                Scalar::Real32(ys.map(Scalar::as_f32).sum::<f32>() / samples.len() as f32)
            }
            (MergeOp::Sum, ScalarKind::Integer) => {
                Scalar::Integer(ys.fold(0i32, |acc, y| acc.wrapping_add(y.as_i32())))
            }
            (MergeOp::Sum, ScalarKind::Real32) => Scalar::Real32(ys.map(Scalar::as_f32).sum()),
            (MergeOp::Sum, _) => Scalar::Real64(ys.map(Scalar::as_f64).sum()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::memory::SeriesNode;

    fn ints(name: &str, points: &[(i32, i32)]) -> AnyNode {
        AnyNode::leaf(SeriesNode::new(
            name,
            ScalarKind::Integer,
            ScalarKind::Integer,
            points
                .iter()
                .map(|&(x, y)| (Scalar::Integer(x), Scalar::Integer(y)))
                .collect(),
        ))
    }

    fn reals(name: &str, points: &[(i32, f64)]) -> AnyNode {
        AnyNode::leaf(SeriesNode::new(
            name,
            ScalarKind::Integer,
            ScalarKind::Real64,
            points
                .iter()
                .map(|&(x, y)| (Scalar::Integer(x), Scalar::Real64(y)))
                .collect(),
        ))
    }

    fn drain(stage: &mut MergeStage) -> Vec<Sample> {
        let mut out = Vec::new();
        while stage.has_next().unwrap() {
            out.push(stage.next().unwrap());
        }
        out
    }

    #[test]
    fn test_sum_aligned_children() {
        let a = ints("a", &[(0, 1), (1, 1), (2, 1)]);
        let b = ints("b", &[(0, 2), (1, 2), (2, 2)]);
        let mut stage = MergeStage::new(MergeOp::Sum, vec![a, b]).unwrap();
        assert_eq!(stage.y_kind(), ScalarKind::Integer);

        assert_eq!(
            drain(&mut stage),
            (0..3)
                .map(|x| (Scalar::Integer(x), Scalar::Integer(3)))
                .collect::<Vec<_>>()
        );
    }

    #[test]
    fn test_average_aligned_children() {
        let a = ints("a", &[(0, 1), (1, 1), (2, 1)]);
        let b = ints("b", &[(0, 2), (1, 2), (2, 2)]);
        let mut stage = MergeStage::new(MergeOp::Average, vec![a, b]).unwrap();
        assert_eq!(stage.y_kind(), ScalarKind::Real32);

        let out = drain(&mut stage);
        assert_eq!(out.len(), 3);
        assert!(out.iter().all(|s| s.1 == Scalar::Real32(1.5)));
    }

    #[test]
    fn test_carry_forward_without_interpolation() {
        let fast = ints("fast", &[(0, 1), (2, 3), (4, 5)]);
        let slow = ints("slow", &[(0, 10), (1, 20), (3, 40)]);
        let mut stage = MergeStage::new(MergeOp::Sum, vec![fast, slow]).unwrap();

        // At x=2 the slow child has already jumped to 3, so its y=20 is held
        assert_eq!(
            drain(&mut stage),
            vec![
                (Scalar::Integer(0), Scalar::Integer(11)),
                (Scalar::Integer(2), Scalar::Integer(23)),
            ]
        );
    }

    #[test]
    fn test_exhaustion_during_catch_up_ends_stage() {
        let fast = ints("fast", &[(0, 1), (2, 3)]);
        let slow = ints("slow", &[(0, 10), (1, 20)]);
        let mut stage = MergeStage::new(MergeOp::Sum, vec![fast, slow]).unwrap();

        assert_eq!(
            drain(&mut stage),
            vec![(Scalar::Integer(0), Scalar::Integer(11))]
        );
        assert!(matches!(stage.next(), Err(PipelineError::EndOfSequence)));
    }

    #[test]
    fn test_laggard_discards_until_equal() {
        let sparse = ints("sparse", &[(0, 100), (3, 100)]);
        let dense = ints("dense", &[(0, 1), (1, 2), (2, 3), (3, 4)]);
        let mut stage = MergeStage::new(MergeOp::Sum, vec![sparse, dense]).unwrap();

        assert_eq!(
            drain(&mut stage),
            vec![
                (Scalar::Integer(0), Scalar::Integer(101)),
                (Scalar::Integer(3), Scalar::Integer(104)),
            ]
        );
    }

    #[test]
    fn test_promotion_to_real64() {
        let a = ints("a", &[(0, 1)]);
        let b = reals("b", &[(0, 0.25)]);
        let mut stage = MergeStage::new(MergeOp::Sum, vec![a, b]).unwrap();
        assert_eq!(stage.y_kind(), ScalarKind::Real64);
        assert_eq!(stage.next().unwrap().1, Scalar::Real64(1.25));
    }

    #[test]
    fn test_integer_sum_wraps() {
        let a = ints("a", &[(0, i32::MAX)]);
        let b = ints("b", &[(0, 1)]);
        let mut stage = MergeStage::new(MergeOp::Sum, vec![a, b]).unwrap();
        assert_eq!(stage.next().unwrap().1, Scalar::Integer(i32::MIN));
    }

    #[test]
    fn test_integer_average_does_not_wrap() {
        let a = ints("a", &[(0, 2_000_000_000)]);
        let b = ints("b", &[(0, 2_000_000_000)]);
        let mut stage = MergeStage::new(MergeOp::Average, vec![a, b]).unwrap();
        assert_eq!(stage.next().unwrap().1, Scalar::Real32(2.0e9));
    }

    #[test]
    fn test_peek_is_stable() {
        let a = ints("a", &[(0, 1), (1, 2)]);
        let b = ints("b", &[(0, 1), (1, 2)]);
        let mut stage = MergeStage::new(MergeOp::Sum, vec![a, b]).unwrap();

        let first = stage.peek().unwrap();
        assert_eq!(stage.peek().unwrap(), first);
        assert_eq!(stage.next().unwrap(), first);
        assert_eq!(stage.peek().unwrap(), (Scalar::Integer(1), Scalar::Integer(4)));
    }

    #[test]
    fn test_rejects_bad_children() {
        assert!(matches!(
            MergeStage::new(MergeOp::Sum, vec![ints("a", &[])]),
            Err(PipelineError::Configuration(_))
        ));

        let instant_x = AnyNode::leaf(SeriesNode::new(
            "t",
            ScalarKind::Instant,
            ScalarKind::Integer,
            Vec::new(),
        ));
        assert!(matches!(
            MergeStage::new(MergeOp::Sum, vec![ints("a", &[]), instant_x]),
            Err(PipelineError::Configuration(_))
        ));

        let instant_y = AnyNode::leaf(SeriesNode::new(
            "t",
            ScalarKind::Integer,
            ScalarKind::Instant,
            Vec::new(),
        ));
        assert!(matches!(
            MergeStage::new(MergeOp::Average, vec![ints("a", &[]), instant_y]),
            Err(PipelineError::Configuration(_))
        ));
    }
}

//! Built-in operator stages.

pub mod differentiate;
pub mod expression;
pub mod merge;

pub use differentiate::DifferentiateStage;
pub use expression::{ExpressionOptions, ExpressionStage};
pub use merge::{MergeOp, MergeStage};

//! Pull-based time-series pipelines.
//!
//! A request carries one descriptor tree per pipeline. The compiler turns each
//! tree into a tree of [`StreamNode`]s: leaves come from the catalog, stages
//! from the registry. The driver then restricts every pipeline to the
//! requested range and drains it into an encoder.
//!
//! # Architecture
//!
//! ```text
//! NodeDescriptor ──► PipelineCompiler ──► AnyNode tree ──► prepare ──► consume ──► DataWriter
//!                      │        │
//!                   Catalog  StageRegistry
//! ```
//!
//! # Design
//!
//! - **Enum dispatch for stages** - `BuiltinStage` covers every built-in stage.
//! - **Trait objects for leaves** - sources hand out `Box<dyn StreamNode>`.
//! - **Pull model** - a root `next()` pulls exactly what it needs from below.
//! - **Parallel compilation** - descriptors compile on scoped threads.

pub mod compiled_plan;
pub mod compiler;
pub mod descriptor;
pub mod driver;
pub mod error;
pub mod node;
pub mod node_type;
pub mod nodes;
pub mod registry;
pub mod window;

pub use compiled_plan::{CompiledPlan, PlanStats};
pub use compiler::PipelineCompiler;
pub use descriptor::{
    load_request, parse_request, BulkDataRequest, DatasetDescriptor, FetchDataRequest,
    NodeDescriptor, PipelineSpecs,
};
pub use driver::{consume, prepare, Driver, FetchStats};
pub use error::{PipelineError, PipelineResult};
pub use node::{AnyNode, BuiltinStage, Sample, StreamNode};
pub use node_type::{Arity, StageKind};
pub use registry::{StageContext, StageOptions, StageRegistry};
pub use window::RotatingWindow;

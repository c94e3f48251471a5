//! # perfstream: time-series pipeline engine
//!
//! Serves performance metrics (IOPS, throughput, latency) as compact binary
//! streams. Clients describe what they want as a tree of stages over catalog
//! datasets; the engine compiles the tree, restricts it to an X range, pulls
//! samples through it and encodes them for the wire.
//!
//! ## Architecture
//!
//! - **Catalog**: data sources and the datasets they publish
//! - **Pipeline**: descriptor compiler, stage registry, built-in stages, driver
//! - **Scripting**: Rhai evaluator behind the `expr` stage
//! - **Encoding**: fixed-width little-endian records, framed or bare
//!
//! ## Configuration
//!
//! Sources, logging and the frame capacity are read from
//! `perfstream/config.toml` in the platform config directory, see [`config`].
//!
//! ## Example
//!
//! ```ignore
//! use perfstream::{
//!     catalog::Catalog,
//!     config::AppConfig,
//!     pipeline::{Driver, FetchDataRequest, NodeDescriptor},
//!     scripting::ScriptEngine,
//! };
//! use std::sync::Arc;
//!
//! let config = AppConfig::default();
//! let catalog = Catalog::from_config(&config.sources)?;
//! let driver = Driver::new(&catalog, Arc::new(ScriptEngine::new()));
//!
//! let request = FetchDataRequest {
//!     from: None,
//!     to: None,
//!     pipelines: vec![NodeDescriptor::stage(
//!         "diff",
//!         NodeDescriptor::leaf("dummy", "dense", None),
//!     )],
//! };
//!
//! let mut out = Vec::new();
//! let stats = driver.fetch(&request, &mut out)?;
//! ```

pub mod catalog;
pub mod config;
pub mod encoding;
pub mod error;
pub mod pipeline;
pub mod range;
pub mod scripting;
pub mod types;

// Re-export commonly used types
pub use catalog::{Catalog, DataSource, Dataset};
pub use config::AppConfig;
pub use error::{PerfStreamError, Result};
pub use pipeline::{Driver, PipelineCompiler, PipelineError, StreamNode};
pub use range::DataRange;
pub use scripting::{Evaluator, ScriptEngine};
pub use types::{Scalar, ScalarKind};

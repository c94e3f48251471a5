//! Request-level orchestration: compile, restrict, drain, encode.

use super::compiler::PipelineCompiler;
use super::descriptor::{BulkDataRequest, FetchDataRequest, PipelineSpecs};
use super::error::{PipelineError, PipelineResult};
use super::node::{AnyNode, StreamNode};
use crate::catalog::Catalog;
use crate::encoding::{DataWriter, FramedBuffer, RecordLayout, StreamWriter, DEFAULT_FRAME_CAPACITY};
use crate::range::DataRange;
use crate::scripting::Evaluator;
use std::io::Write;
use std::sync::Arc;
use std::time::Instant;

/// Drain `node` into `writer`. Declares the node's kinds first, then writes
/// every remaining sample. Returns the number of samples written.
pub fn consume<N, W>(node: &mut N, writer: &mut W) -> PipelineResult<usize>
where
    N: StreamNode + ?Sized,
    W: DataWriter + ?Sized,
{
    writer.set_types(node.x_kind(), node.y_kind())?;

    let mut written = 0;
    while node.has_next()? {
        let (x, y) = node.next()?;
        writer.write(x, y)?;
        written += 1;
    }
    Ok(written)
}

/// Restrict every pipeline to `[from, to]`, parsed in each pipeline's leaf X kind.
pub fn prepare(pipelines: &mut [AnyNode], from: Option<&str>, to: Option<&str>) -> PipelineResult<()> {
    for pipeline in pipelines.iter_mut() {
        let kind = pipeline.query_leaf_x_kind()?;
        let range = DataRange::parse(kind, from, to)?;
        pipeline.apply_range(&range)?;
    }
    Ok(())
}

/// Check that every pipeline's kinds can be encoded, before any byte is written.
fn check_layouts<'n, I>(nodes: I) -> PipelineResult<()>
where
    I: IntoIterator<Item = &'n dyn StreamNode>,
{
    for node in nodes {
        RecordLayout::new(node.x_kind(), node.y_kind())?;
    }
    Ok(())
}

/// Counters for one fetch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchStats {
    pub pipelines: usize,
    pub records: usize,
    /// Bytes written to the sink, headers included
    pub bytes: usize,
    pub compile_time_us: u64,
    pub prepare_time_us: u64,
    pub drain_time_us: u64,
}

/// Serves fetch, specs and bulk requests against one catalog.
pub struct Driver<'a> {
    catalog: &'a Catalog,
    evaluator: Arc<dyn Evaluator>,
    frame_capacity: usize,
}

impl<'a> Driver<'a> {
    pub fn new(catalog: &'a Catalog, evaluator: Arc<dyn Evaluator>) -> Self {
        Self {
            catalog,
            evaluator,
            frame_capacity: DEFAULT_FRAME_CAPACITY,
        }
    }

    pub fn with_frame_capacity(mut self, capacity: usize) -> Self {
        self.frame_capacity = capacity;
        self
    }

    fn compiler(&self) -> PipelineCompiler<'a> {
        PipelineCompiler::new(self.catalog, Arc::clone(&self.evaluator))
    }

    /// Compile every pipeline of `request`, restrict them to its range and
    /// write one framed block per pipeline to `sink`, in request order.
    ///
    /// Nothing is written if compilation, range parsing or the kind check
    /// fails. A failure while draining leaves the blocks of earlier pipelines
    /// in `sink`.
    pub fn fetch<W: Write + ?Sized>(
        &self,
        request: &FetchDataRequest,
        sink: &mut W,
    ) -> PipelineResult<FetchStats> {
        let plan = self.compiler().compile_all(&request.pipelines)?;
        let mut stats = FetchStats {
            pipelines: plan.len(),
            compile_time_us: plan.stats.compile_time_us,
            ..FetchStats::default()
        };
        let mut pipelines = plan.into_pipelines();

        let started = Instant::now();
        prepare(&mut pipelines, request.from.as_deref(), request.to.as_deref())?;
        stats.prepare_time_us = started.elapsed().as_micros() as u64;
        tracing::debug!("Applied range to {} pipeline(s) in {} us", stats.pipelines, stats.prepare_time_us);
        check_layouts(pipelines.iter().map(|p| p as &dyn StreamNode))?;

        let started = Instant::now();
        let mut frame = FramedBuffer::new(self.frame_capacity);
        for (index, pipeline) in pipelines.iter_mut().enumerate() {
            let records = consume(pipeline, &mut frame)?;
            let bytes = frame.flush(&mut *sink)?;
            tracing::trace!("Pipeline {} ({}) wrote {} records", index, pipeline.name(), records);
            stats.records += records;
            stats.bytes += bytes;
        }
        sink.flush()?;
        stats.drain_time_us = started.elapsed().as_micros() as u64;

        tracing::debug!(
            "Fetched {} records ({} bytes) in {} us",
            stats.records,
            stats.bytes,
            stats.drain_time_us
        );
        Ok(stats)
    }

    /// Output kinds of every pipeline in `request`, without draining anything.
    pub fn specs(&self, request: &FetchDataRequest) -> PipelineResult<Vec<PipelineSpecs>> {
        let plan = self.compiler().compile_all(&request.pipelines)?;
        Ok(plan
            .pipelines
            .iter()
            .map(|p| PipelineSpecs {
                x_type: p.x_kind(),
                y_type: p.y_kind(),
            })
            .collect())
    }

    /// Export one dataset as bare records, one variant after another.
    ///
    /// With no variants listed, the dataset's default variant is exported.
    /// Returns the number of records written.
    pub fn bulk_export<W: Write>(
        &self,
        source: &str,
        dataset: &str,
        request: &BulkDataRequest,
        sink: W,
    ) -> PipelineResult<usize> {
        let source = self
            .catalog
            .get_source(source)
            .ok_or_else(|| PipelineError::NotFound(format!("source '{}'", source)))?;

        let variants: Vec<Option<&str>> = if request.variants.is_empty() {
            vec![None]
        } else {
            request.variants.iter().map(|v| Some(v.as_str())).collect()
        };

        // Resolve every node before writing anything
        let mut nodes = Vec::with_capacity(variants.len());
        for variant in variants {
            let mut node = source.get_node(dataset, variant)?;
            let range = DataRange::parse(node.query_leaf_x_kind()?, request.from.as_deref(), request.to.as_deref())?;
            node.apply_range(&range)?;
            nodes.push(node);
        }
        check_layouts(nodes.iter().map(|n| &**n))?;

        let started = Instant::now();
        let mut sink = sink;
        let mut total = 0;
        for node in nodes.iter_mut() {
            let mut writer = StreamWriter::new(&mut sink);
            total += consume(&mut **node, &mut writer)?;
        }
        sink.flush()?;

        tracing::debug!(
            "Exported {} records of {}/{} in {} us",
            total,
            source.id(),
            dataset,
            started.elapsed().as_micros()
        );
        Ok(total)
    }
}

//! Streaming pipeline of single-owner stages.
//!
//! A pipeline is a linear chain: one source, any number of transforms, one
//! sink. Each stage runs on its own named OS thread and owns its DSP state
//! exclusively. Adjacent stages are connected by a bounded queue of pooled
//! buffers, so a slow consumer suspends its producer (backpressure) and the
//! number of live buffers per boundary stays bounded by
//! `queue_depth + 2`: the blocks in transit, one being filled and one being
//! drained.
//!
//! # Shutdown
//!
//! - Clean: the source hits end of stream at a block boundary, drops its
//!   queue, and each following stage drains its input, finishes and closes
//!   its own output in turn.
//! - On error: the failing stage trips the shared [`CancelToken`] and drops
//!   its queues. Its neighbours see the disconnection, find the token set and
//!   stop with [`Error::Cancelled`], which propagates along the chain. Every
//!   thread is joined and every buffer returns to its pool.
//!   [`Pipeline::run`] reports the root cause, not the cancellations.
//!
//! # Example
//!
//! ```
//! use num_complex::Complex;
//! use sdrpipe::PipelineConfig;
//! use sdrpipe::convert::Int8ToComplex;
//! use sdrpipe::dsp::fm::FmDemodulator;
//! use sdrpipe::iqread::BlockRead;
//! use sdrpipe::pipeline::Pipeline;
//!
//! let raw: Vec<u8> = vec![64, 0, 0, 64, 192, 0, 0, 192];
//! let reader = BlockRead::<_, i8>::new(std::io::Cursor::new(raw), 4, "memory reader");
//!
//! let stats = Pipeline::source(PipelineConfig::new(2, 4), "reader", reader)
//!     .then("int8 to complex64", Int8ToComplex)
//!     .then("fm demodulator", FmDemodulator::default())
//!     .sink("writer", std::io::sink())
//!     .run()?;
//! assert_eq!(stats.stages.len(), 4);
//! # Ok::<(), sdrpipe::Error>(())
//! ```

use std::io::{Read, Write};
use std::thread::JoinHandle;

use crate::config::PipelineConfig;
use crate::dsp::DspBlock;
use crate::error::{Error, Result};
use crate::iqread::BlockRead;
use crate::WireSample;

pub mod pool;
pub mod queue;
pub mod stage;

pub use pool::{BufferPool, PooledBuf};
pub use queue::{CancelToken, Inlet, Outlet};
pub use stage::{SinkStage, SourceStage, Stage, TransformStage};

/// Per-stage outcome of a successful run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageStats {
    pub name: &'static str,
    pub blocks: u64,
}

/// Buffer usage of one stage boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundaryStats {
    /// Name of the producing stage
    pub producer: &'static str,
    /// Buffers the boundary's pool allocated over the whole run
    pub buffers_allocated: usize,
}

/// Summary returned by [`Pipeline::run`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineStats {
    pub stages: Vec<StageStats>,
    pub boundaries: Vec<BoundaryStats>,
}

/// Type-erased view of a boundary pool, read after the run.
type PoolProbe = Box<dyn Fn() -> usize + Send>;

/// A fully assembled pipeline, ready to run.
pub struct Pipeline {
    config: PipelineConfig,
    cancel: CancelToken,
    stages: Vec<Box<dyn Stage>>,
    probes: Vec<(&'static str, PoolProbe)>,
}

/// A pipeline under construction whose last stage emits `T`.
pub struct PipelineBuilder<T> {
    pipeline: Pipeline,
    tail: &'static str,
    inlet: Inlet<T>,
}

impl Pipeline {
    /// Starts a pipeline with a source stage reading `reader`.
    pub fn source<R, T>(
        config: PipelineConfig,
        name: &'static str,
        reader: BlockRead<R, T>,
    ) -> PipelineBuilder<T>
    where
        R: Read + Send + 'static,
        T: WireSample,
    {
        let mut pipeline = Pipeline {
            config,
            cancel: CancelToken::new(),
            stages: Vec::new(),
            probes: Vec::new(),
        };
        let pool = pipeline.boundary_pool::<T>(name, reader.block_size());
        let (outlet, inlet) = queue::bounded(config.queue_depth, &pipeline.cancel);
        pipeline
            .stages
            .push(Box::new(SourceStage::new(name, reader, pool, outlet)));
        PipelineBuilder {
            pipeline,
            tail: name,
            inlet,
        }
    }

    /// Token shared by every stage; cancelling it makes the run stop early.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    fn boundary_pool<T: Send + 'static>(
        &mut self,
        producer: &'static str,
        block_capacity: usize,
    ) -> BufferPool<T> {
        let pool = BufferPool::new(block_capacity, self.config.queue_depth + 2);
        let probe = pool.clone();
        self.probes
            .push((producer, Box::new(move || probe.allocated())));
        pool
    }

    /// Runs every stage on its own thread and waits for all of them.
    ///
    /// # Errors
    /// The first error that is not a mere cancellation, in pipeline order.
    pub fn run(self) -> Result<PipelineStats> {
        self.config.validate()?;
        let Pipeline {
            cancel,
            stages,
            probes,
            ..
        } = self;

        let names: Vec<&'static str> = stages.iter().map(|s| s.name()).collect();
        tracing::debug!(stages = ?names, "starting pipeline");

        let mut handles: Vec<(&'static str, JoinHandle<Result<u64>>)> = Vec::new();
        let mut spawn_error = None;
        for stage in stages {
            let name = stage.name();
            if spawn_error.is_some() {
                // Dropping the stage closes its queues
                continue;
            }
            let token = cancel.clone();
            match std::thread::Builder::new()
                .name(name.to_string())
                .spawn(move || run_stage(stage, token))
            {
                Ok(handle) => handles.push((name, handle)),
                Err(e) => {
                    cancel.cancel();
                    spawn_error = Some(Error::io("pipeline", e));
                }
            }
        }

        let mut stats = Vec::with_capacity(handles.len());
        let mut first_error: Option<Error> = spawn_error;
        for (name, handle) in handles {
            let result = handle.join().unwrap_or_else(|_| {
                Err(Error::StagePanicked {
                    stage: name.to_string(),
                })
            });
            match result {
                Ok(blocks) => stats.push(StageStats { name, blocks }),
                Err(e) => {
                    let replace = match &first_error {
                        None => true,
                        Some(current) => current.is_cancellation() && !e.is_cancellation(),
                    };
                    if replace {
                        first_error = Some(e);
                    }
                }
            }
        }

        if let Some(e) = first_error {
            return Err(e);
        }

        let boundaries = probes
            .into_iter()
            .map(|(producer, probe)| BoundaryStats {
                producer,
                buffers_allocated: probe(),
            })
            .collect();
        tracing::debug!("pipeline finished");
        Ok(PipelineStats {
            stages: stats,
            boundaries,
        })
    }
}

/// Trips the cancel token if the stage unwinds, before its queues drop.
struct CancelOnPanic(CancelToken);

impl Drop for CancelOnPanic {
    fn drop(&mut self) {
        if std::thread::panicking() {
            self.0.cancel();
        }
    }
}

fn run_stage(mut stage: Box<dyn Stage>, cancel: CancelToken) -> Result<u64> {
    let name = stage.name();
    let guard = CancelOnPanic(cancel.clone());
    tracing::debug!(stage = name, "stage started");

    let result = stage.run();
    match &result {
        Ok(blocks) => tracing::debug!(stage = name, blocks, "stage finished"),
        Err(e) if e.is_cancellation() => tracing::warn!(stage = name, "stage cancelled"),
        Err(e) => {
            tracing::error!(stage = name, error = %e, "stage failed");
            cancel.cancel();
        }
    }

    // The token is set before the queues close, so neighbours can tell a
    // failure from a clean end of stream.
    drop(guard);
    drop(stage);
    result
}

impl<T: Send + 'static> PipelineBuilder<T> {
    /// Appends a transform stage running `block`.
    pub fn then<B>(mut self, name: &'static str, block: B) -> PipelineBuilder<B::Output>
    where
        B: DspBlock<Input = T> + Send + 'static,
        B::Output: Send + 'static,
    {
        let config = self.pipeline.config;
        let pool = self.pipeline.boundary_pool::<B::Output>(name, config.block_size);
        let (outlet, inlet) = queue::bounded(config.queue_depth, &self.pipeline.cancel);
        self.pipeline.stages.push(Box::new(TransformStage::new(
            name, block, self.inlet, pool, outlet,
        )));
        PipelineBuilder {
            pipeline: self.pipeline,
            tail: name,
            inlet,
        }
    }

    /// Name of the stage currently at the end of the chain.
    pub fn tail(&self) -> &'static str {
        self.tail
    }
}

impl<T: WireSample> PipelineBuilder<T> {
    /// Terminates the chain with a sink writing to `writer`.
    pub fn sink<W>(mut self, name: &'static str, writer: W) -> Pipeline
    where
        W: Write + Send + 'static,
    {
        self.pipeline
            .stages
            .push(Box::new(SinkStage::new(name, writer, self.inlet)));
        self.pipeline
    }
}

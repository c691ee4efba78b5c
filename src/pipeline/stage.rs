//! Pipeline stages.
//!
//! Every stage follows the same contract:
//! - a **source** reads whole blocks from an external byte stream into pooled
//!   buffers and pushes them downstream,
//! - a **transform** pops a block, runs its [`DspBlock`] into a freshly
//!   borrowed output buffer, pushes the result and releases the input buffer,
//! - a **sink** pops blocks and writes them to an external byte stream.
//!
//! A stage's output queue closes when the stage value is dropped, which the
//! runner does right after [`Stage::run`] returns.

use std::io::{Read, Write};

use super::pool::BufferPool;
use super::queue::{Inlet, Outlet};
use crate::dsp::DspBlock;
use crate::error::{Error, Result};
use crate::iqread::BlockRead;
use crate::{WireSample, encode_samples};

/// A long-lived pipeline worker.
pub trait Stage: Send {
    /// Stage name used in logs, thread names and errors.
    fn name(&self) -> &'static str;

    /// Runs until the input is exhausted. Returns the number of blocks the
    /// stage emitted (or wrote, for sinks).
    fn run(&mut self) -> Result<u64>;
}

/// Reads fixed-size blocks from a byte stream.
pub struct SourceStage<R: Read, T> {
    name: &'static str,
    reader: BlockRead<R, T>,
    pool: BufferPool<T>,
    outlet: Outlet<T>,
}

impl<R: Read, T: WireSample> SourceStage<R, T> {
    pub fn new(
        name: &'static str,
        reader: BlockRead<R, T>,
        pool: BufferPool<T>,
        outlet: Outlet<T>,
    ) -> Self {
        Self {
            name,
            reader,
            pool,
            outlet,
        }
    }
}

impl<R: Read + Send, T: WireSample> Stage for SourceStage<R, T> {
    fn name(&self) -> &'static str {
        self.name
    }

    fn run(&mut self) -> Result<u64> {
        let mut blocks = 0;
        loop {
            let mut buf = self.pool.get();
            if !self.reader.read_block(&mut buf)? {
                break;
            }
            tracing::trace!(stage = self.name, samples = buf.len(), "block read");
            self.outlet.push(self.name, buf)?;
            blocks += 1;
        }
        Ok(blocks)
    }
}

/// Runs a [`DspBlock`] over every block of its input queue.
pub struct TransformStage<B: DspBlock> {
    name: &'static str,
    block: B,
    inlet: Inlet<B::Input>,
    pool: BufferPool<B::Output>,
    outlet: Outlet<B::Output>,
}

impl<B: DspBlock> TransformStage<B> {
    pub fn new(
        name: &'static str,
        block: B,
        inlet: Inlet<B::Input>,
        pool: BufferPool<B::Output>,
        outlet: Outlet<B::Output>,
    ) -> Self {
        Self {
            name,
            block,
            inlet,
            pool,
            outlet,
        }
    }
}

impl<B> Stage for TransformStage<B>
where
    B: DspBlock + Send,
    B::Input: Send,
    B::Output: Send,
{
    fn name(&self) -> &'static str {
        self.name
    }

    fn run(&mut self) -> Result<u64> {
        let mut blocks = 0;
        while let Some(input) = self.inlet.pop(self.name)? {
            let mut output = self.pool.get();
            self.block.process_into(&input, &mut output);
            drop(input);
            tracing::trace!(stage = self.name, samples = output.len(), "block processed");
            self.outlet.push(self.name, output)?;
            blocks += 1;
        }
        Ok(blocks)
    }
}

/// Writes every block of its input queue to a byte stream, little-endian.
pub struct SinkStage<W: Write, T> {
    name: &'static str,
    writer: W,
    inlet: Inlet<T>,
    bytes: Vec<u8>,
}

impl<W: Write, T: WireSample> SinkStage<W, T> {
    pub fn new(name: &'static str, writer: W, inlet: Inlet<T>) -> Self {
        Self {
            name,
            writer,
            inlet,
            bytes: Vec::new(),
        }
    }
}

impl<W: Write + Send, T: WireSample> Stage for SinkStage<W, T> {
    fn name(&self) -> &'static str {
        self.name
    }

    fn run(&mut self) -> Result<u64> {
        let mut blocks = 0;
        while let Some(buf) = self.inlet.pop(self.name)? {
            self.bytes.clear();
            encode_samples(&buf, &mut self.bytes);
            self.writer
                .write_all(&self.bytes)
                .map_err(|e| Error::io(self.name, e))?;
            drop(buf);
            blocks += 1;
        }
        self.writer.flush().map_err(|e| Error::io(self.name, e))?;
        Ok(blocks)
    }
}

/// Digital Signal Processing (DSP) module.
///
/// This module provides the stateful DSP blocks of the toolkit and the
/// adapters that run them over chunked sample streams.
///
/// # Overview
///
/// ```text
/// raw bytes → convert → complex I/Q → PolyphaseDecimator → FmDemodulator → i16 audio
///                                          ↓                     ↓
///                                  Kaiser low-pass + M↓   discriminator + DC blocker
/// ```
///
/// # Modules
///
/// - [`filters`]: Kaiser windowed-sinc low-pass designer
/// - [`decimator`]: Polyphase decimation with anti-aliasing filtering
/// - [`fm`]: FM discriminator, DC blocker and audio quantizer
///
/// # Traits
///
/// - [`DspBlock`]: A stateful block that maps a slice of input samples to
///   zero or more output samples.
///
/// # Stream adapters
///
/// - [`Blocks`]: runs a block over an `Iterator` of sample blocks
/// - [`BlockStream`]: runs a block over a `futures::Stream` of sample blocks
///
/// # Thread Safety
///
/// DSP blocks maintain internal state and are meant to be owned by exactly
/// one worker. Each pipeline stage gets its own instance.
use std::pin::Pin;
use std::task::{Context, Poll};

use futures::Stream;

use crate::error::Result;

pub mod decimator;
pub mod filters;
pub mod fm;

/// Trait for stateful DSP blocks.
///
/// A block consumes its input in order and may keep state between calls;
/// feeding a stream in several calls must be equivalent to feeding it in one.
///
/// # Examples
///
/// ```
/// use sdrpipe::dsp::{DspBlock, fm::FmDemodulator};
/// use num_complex::Complex;
///
/// let mut demod = FmDemodulator::default();
/// let input = vec![Complex::new(1.0f32, 0.0); 10];
/// let audio = demod.process(&input);
/// assert_eq!(audio.len(), 10);
/// ```
pub trait DspBlock {
    type Input;
    type Output;

    /// Process a block of samples, appending the results to `output`.
    ///
    /// `output` is not cleared, so pooled buffers can be reused by the caller.
    fn process_into(&mut self, input: &[Self::Input], output: &mut Vec<Self::Output>);

    /// Process a block of samples into a freshly allocated vector.
    fn process(&mut self, input: &[Self::Input]) -> Vec<Self::Output> {
        let mut output = Vec::with_capacity(input.len());
        self.process_into(input, &mut output);
        output
    }
}

/// Iterator adapter running a [`DspBlock`] over a stream of blocks.
///
/// Yields one output block per input block. Errors from the source are
/// passed through without touching the block state.
pub struct Blocks<I, B> {
    source: I,
    block: B,
}

impl<I, B> Blocks<I, B> {
    pub fn new(source: I, block: B) -> Self {
        Self { source, block }
    }

    /// Gives the block back, with whatever state it accumulated.
    pub fn into_inner(self) -> B {
        self.block
    }
}

impl<I, B> Iterator for Blocks<I, B>
where
    B: DspBlock,
    I: Iterator<Item = Result<Vec<B::Input>>>,
{
    type Item = Result<Vec<B::Output>>;

    fn next(&mut self) -> Option<Self::Item> {
        let input = self.source.next()?;
        Some(input.map(|samples| self.block.process(&samples)))
    }
}

/// Stream adapter running a [`DspBlock`] over an asynchronous stream of
/// blocks, such as an [`AsyncBlockRead`](crate::iqread::AsyncBlockRead).
pub struct BlockStream<S, B> {
    source: S,
    block: B,
}

impl<S, B> BlockStream<S, B> {
    pub fn new(source: S, block: B) -> Self {
        Self { source, block }
    }
}

impl<S, B> Stream for BlockStream<S, B>
where
    B: DspBlock + Unpin,
    S: Stream<Item = Result<Vec<B::Input>>> + Unpin,
{
    type Item = Result<Vec<B::Output>>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        match Pin::new(&mut this.source).poll_next(cx) {
            Poll::Ready(Some(Ok(samples))) => Poll::Ready(Some(Ok(this.block.process(&samples)))),
            Poll::Ready(Some(Err(e))) => Poll::Ready(Some(Err(e))),
            Poll::Ready(None) => Poll::Ready(None),
            Poll::Pending => Poll::Pending,
        }
    }
}

//! FM demodulation blocks.
//!
//! This module provides the building blocks for turning decimated complex
//! baseband into 16-bit audio:
//! - [`Discriminator`]: phase-difference discriminator between consecutive samples
//! - [`DcBlocker`]: first-order high-pass removing the discriminator's DC bias
//! - [`FmDemodulator`]: discriminator, DC blocker, gain, clip and quantization
//!
//! The time constants are tuned for a 48 kHz input rate; decimate before this
//! stage, never after it.
//!
//! # Example
//!
//! ```
//! use sdrpipe::dsp::{DspBlock, fm::FmDemodulator};
//! use num_complex::Complex;
//!
//! let mut demod = FmDemodulator::default();
//! let iq = vec![Complex::new(0.5f32, 0.5); 100];
//! let audio = demod.process(&iq);
//! assert_eq!(audio[0], 0);
//! ```

use num_complex::Complex;

use super::DspBlock;
use crate::config::{FmConfig, StartDetection};
use crate::error::Result;

/// Phase-difference FM discriminator.
///
/// For consecutive samples `last = (I0, Q0)` and `cur = (I1, Q1)` the output is
/// `(I1·Q0 − Q1·I0) / (I0² + Q0²)`, the sine of the phase step scaled by the
/// amplitude ratio. Denominators at or below `epsilon` yield 0.
pub struct Discriminator {
    /// Previous complex sample
    last: Complex<f32>,
    /// Whether `last` holds a real sample
    primed: bool,
    epsilon: f32,
    start: StartDetection,
}

impl Discriminator {
    pub fn new(epsilon: f32, start: StartDetection) -> Self {
        Self {
            last: Complex::new(0.0, 0.0),
            primed: false,
            epsilon,
            start,
        }
    }

    /// Feeds one sample. Returns `None` when there is no previous sample to
    /// compare against, i.e. at the start of the stream.
    #[inline]
    pub fn next(&mut self, cur: Complex<f32>) -> Option<f32> {
        let has_last = match self.start {
            StartDetection::Flag => self.primed,
            StartDetection::ZeroSentinel => self.last != Complex::new(0.0, 0.0),
        };
        let last = std::mem::replace(&mut self.last, cur);
        self.primed = true;

        if !has_last {
            return None;
        }

        let den = last.norm_sqr();
        if den > self.epsilon {
            Some((cur.re * last.im - cur.im * last.re) / den)
        } else {
            Some(0.0)
        }
    }

    /// Forget the previous sample.
    pub fn reset(&mut self) {
        self.last = Complex::new(0.0, 0.0);
        self.primed = false;
    }
}

/// DC blocker: first-order IIR high-pass filter.
///
/// Implements `y[n] = x[n] − x[n−1] + α·y[n−1]`.
///
/// # Example
///
/// ```
/// use sdrpipe::dsp::fm::DcBlocker;
///
/// let mut blocker = DcBlocker::new(0.995);
/// let mut y = 0.0;
/// for _ in 0..5000 {
///     y = blocker.next(0.25);
/// }
/// assert!(y.abs() < 1e-3);
/// ```
pub struct DcBlocker {
    /// Pole position, in `[0, 1)`
    alpha: f32,
    /// Previous input sample
    x_prev: f32,
    /// Previous output sample
    y_prev: f32,
}

impl DcBlocker {
    pub fn new(alpha: f32) -> Self {
        Self {
            alpha,
            x_prev: 0.0,
            y_prev: 0.0,
        }
    }

    #[inline]
    pub fn next(&mut self, x: f32) -> f32 {
        let y = x - self.x_prev + self.alpha * self.y_prev;
        self.x_prev = x;
        self.y_prev = y;
        y
    }

    pub fn reset(&mut self) {
        self.x_prev = 0.0;
        self.y_prev = 0.0;
    }
}

/// FM demodulator producing signed 16-bit audio.
///
/// Per sample: discriminate, remove DC, multiply by the audio gain, clip to
/// `[-1, 1]` and scale to `i16::MAX`. The first sample of the stream always
/// produces 0. With [`StartDetection::ZeroSentinel`] a sample following an
/// exact `0+0j` sample also produces 0 and leaves the DC blocker untouched.
pub struct FmDemodulator {
    discriminator: Discriminator,
    dc_blocker: DcBlocker,
    gain: f32,
}

impl FmDemodulator {
    /// Creates a demodulator with explicit parameters.
    ///
    /// # Panics
    /// Panics if the configuration is invalid; use [`FmDemodulator::from_config`]
    /// to get an error instead.
    pub fn new(config: FmConfig) -> Self {
        assert!(config.validate().is_ok(), "Invalid FM demodulator configuration");
        Self::build(config)
    }

    pub fn from_config(config: FmConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(config))
    }

    fn build(config: FmConfig) -> Self {
        tracing::debug!(
            gain = config.audio_gain,
            dc_alpha = config.dc_alpha,
            start = ?config.start,
            "FM demodulator ready"
        );
        Self {
            discriminator: Discriminator::new(config.epsilon, config.start),
            dc_blocker: DcBlocker::new(config.dc_alpha),
            gain: config.audio_gain,
        }
    }

    /// Demodulates a single sample.
    #[inline]
    pub fn demodulate_sample(&mut self, cur: Complex<f32>) -> i16 {
        match self.discriminator.next(cur) {
            Some(v) => quantize(self.dc_blocker.next(v) * self.gain),
            None => 0,
        }
    }

    /// Lazily demodulates a stream of complex blocks into audio blocks.
    pub fn demodulate<I>(self, input: I) -> super::Blocks<I::IntoIter, Self>
    where
        I: IntoIterator<Item = Result<Vec<Complex<f32>>>>,
    {
        super::Blocks::new(input.into_iter(), self)
    }

    /// Restores the state of a freshly built demodulator.
    pub fn reset(&mut self) {
        self.discriminator.reset();
        self.dc_blocker.reset();
    }
}

impl Default for FmDemodulator {
    fn default() -> Self {
        Self::build(FmConfig::default())
    }
}

impl DspBlock for FmDemodulator {
    type Input = Complex<f32>;
    type Output = i16;

    fn process_into(&mut self, input: &[Complex<f32>], output: &mut Vec<i16>) {
        output.extend(input.iter().map(|&s| self.demodulate_sample(s)));
    }
}

/// Clip to `[-1, 1]` and scale to the `i16` range, truncating toward zero.
#[inline]
fn quantize(v: f32) -> i16 {
    (v.clamp(-1.0, 1.0) * i16::MAX as f32) as i16
}

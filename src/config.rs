//! Tunable parameters for the DSP blocks and the pipeline.
//!
//! Every constant that shapes the filters or the demodulator is exposed here
//! with a documented valid range. Each config has a `validate()` method so
//! that a bad value is rejected before any pipeline stage is started.

use crate::error::{Error, Result};

/// Default stopband attenuation of the anti-aliasing filter, in dB.
pub const DEFAULT_STOPBAND_DB: f64 = 60.0;
/// Default cutoff of the anti-aliasing filter, as a fraction of the output rate.
pub const DEFAULT_CUTOFF_RATIO: f64 = 0.45;
/// Default number of power-series terms used for the Bessel I0 approximation.
pub const DEFAULT_BESSEL_TERMS: usize = 25;

/// Default audio gain applied to the discriminator output before clipping.
pub const DEFAULT_AUDIO_GAIN: f32 = 5000.0;
/// Default DC-blocker pole (~50-100 Hz corner at 48 kHz).
pub const DEFAULT_DC_ALPHA: f32 = 0.995;
/// Default discriminator denominator guard.
pub const DEFAULT_EPSILON: f32 = 1e-12;

/// Default block size, in samples.
pub const DEFAULT_BLOCK_SIZE: usize = 4096;
/// Default capacity of each handoff queue, in blocks.
pub const DEFAULT_QUEUE_DEPTH: usize = 4;

/// Kaiser low-pass design parameters.
///
/// # Valid ranges
/// - `stopband_db`: `0.0..=150.0`
/// - `cutoff_ratio`: `(0.0, 0.5]`, relative to the decimated output rate
/// - `bessel_terms`: `1..=100`. The I0 series is truncated, so its error
///   grows with the argument; 25 terms is accurate for β up to about 15.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FilterConfig {
    pub stopband_db: f64,
    pub cutoff_ratio: f64,
    pub bessel_terms: usize,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            stopband_db: DEFAULT_STOPBAND_DB,
            cutoff_ratio: DEFAULT_CUTOFF_RATIO,
            bessel_terms: DEFAULT_BESSEL_TERMS,
        }
    }
}

impl FilterConfig {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=150.0).contains(&self.stopband_db) {
            return Err(Error::config(format!(
                "stopband attenuation {} dB outside 0..=150",
                self.stopband_db
            )));
        }
        if !(self.cutoff_ratio > 0.0 && self.cutoff_ratio <= 0.5) {
            return Err(Error::config(format!(
                "cutoff ratio {} outside (0, 0.5]",
                self.cutoff_ratio
            )));
        }
        if !(1..=100).contains(&self.bessel_terms) {
            return Err(Error::config(format!(
                "bessel terms {} outside 1..=100",
                self.bessel_terms
            )));
        }
        Ok(())
    }
}

/// Which polyphase subfilters the decimator evaluates at each output instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PolyphaseMode {
    /// Every phase subfilter contributes through its own commutated delay
    /// line. Equivalent to a full FIR followed by keeping every M-th sample.
    #[default]
    Commutated,
    /// Only phase 0 is applied, over the most recent samples of a single
    /// delay line. Kept for output compatibility with older captures; the
    /// passband gain is roughly 1/M and the effective filter aliases.
    PhaseZeroOnly,
}

/// Polyphase decimator parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecimatorConfig {
    /// Input sample rate in Hz, must be positive
    pub sample_rate: f64,
    /// Integer decimation factor, at least 1
    pub factor: usize,
    /// FIR tap count, at least 1. 63 suits factors up to 10, 127 for 20-50.
    pub taps: usize,
    pub filter: FilterConfig,
    pub mode: PolyphaseMode,
}

impl DecimatorConfig {
    pub fn new(sample_rate: f64, factor: usize, taps: usize) -> Self {
        Self {
            sample_rate,
            factor,
            taps,
            filter: FilterConfig::default(),
            mode: PolyphaseMode::default(),
        }
    }

    pub fn with_filter(mut self, filter: FilterConfig) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_mode(mut self, mode: PolyphaseMode) -> Self {
        self.mode = mode;
        self
    }

    /// Output sample rate after decimation.
    pub fn output_rate(&self) -> f64 {
        self.sample_rate / self.factor as f64
    }

    /// Anti-aliasing cutoff in Hz.
    pub fn cutoff_hz(&self) -> f64 {
        self.filter.cutoff_ratio * self.output_rate()
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.sample_rate > 0.0 && self.sample_rate.is_finite()) {
            return Err(Error::config(format!(
                "sample rate {} must be positive",
                self.sample_rate
            )));
        }
        if self.factor == 0 {
            return Err(Error::config("decimation factor must be at least 1"));
        }
        if self.taps == 0 {
            return Err(Error::config("tap count must be at least 1"));
        }
        self.filter.validate()
    }
}

/// How the demodulator recognises the start of the stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StartDetection {
    /// An explicit initialised flag; only the very first sample emits zero.
    #[default]
    Flag,
    /// A previous sample of exactly `0+0j` counts as "no previous sample",
    /// so every sample following a zero sample emits zero as well.
    ZeroSentinel,
}

/// FM demodulator parameters.
///
/// # Valid ranges
/// - `audio_gain`: positive and finite
/// - `dc_alpha`: `[0.0, 1.0)`; time constants are tuned for 48 kHz input
/// - `epsilon`: non-negative
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FmConfig {
    pub audio_gain: f32,
    pub dc_alpha: f32,
    pub epsilon: f32,
    pub start: StartDetection,
}

impl Default for FmConfig {
    fn default() -> Self {
        Self {
            audio_gain: DEFAULT_AUDIO_GAIN,
            dc_alpha: DEFAULT_DC_ALPHA,
            epsilon: DEFAULT_EPSILON,
            start: StartDetection::default(),
        }
    }
}

impl FmConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.audio_gain > 0.0 && self.audio_gain.is_finite()) {
            return Err(Error::config(format!(
                "audio gain {} must be positive",
                self.audio_gain
            )));
        }
        if !(0.0..1.0).contains(&self.dc_alpha) {
            return Err(Error::config(format!(
                "DC blocker alpha {} outside [0, 1)",
                self.dc_alpha
            )));
        }
        if !(self.epsilon >= 0.0) {
            return Err(Error::config("epsilon must be non-negative"));
        }
        Ok(())
    }
}

/// Block and queue sizing shared by every stage of a pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Samples per block, at least 1
    pub block_size: usize,
    /// Blocks in flight per stage boundary, at least 1
    pub queue_depth: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            block_size: DEFAULT_BLOCK_SIZE,
            queue_depth: DEFAULT_QUEUE_DEPTH,
        }
    }
}

impl PipelineConfig {
    pub fn new(block_size: usize, queue_depth: usize) -> Self {
        Self {
            block_size,
            queue_depth,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.block_size == 0 {
            return Err(Error::config("block size must be at least 1"));
        }
        if self.queue_depth == 0 {
            return Err(Error::config("queue depth must be at least 1"));
        }
        Ok(())
    }
}

/// Polyphase decimator with Kaiser anti-aliasing filter.
///
/// This module provides a decimator that reduces the sample rate by an integer
/// factor `M`. The anti-aliasing low-pass filter is designed once at
/// construction and split into `M` phase subfilters, subfilter `i` holding the
/// taps at positions `i, i + M, i + 2M, ...`. Only the samples that survive
/// decimation are ever computed.
///
/// The decimator keeps its delay lines and phase counter between calls, so a
/// stream fed in arbitrary chunks produces exactly the same output as the
/// same stream fed in one piece.
///
/// # Example
///
/// ```rust
/// use sdrpipe::dsp::decimator::PolyphaseDecimator;
/// use sdrpipe::dsp::DspBlock;
/// use num_complex::Complex;
///
/// // 240 kHz down to 48 kHz
/// let mut decimator = PolyphaseDecimator::new(240_000.0, 5, 63);
///
/// let input = vec![Complex::new(1.0f32, 0.0); 1000];
/// let output = decimator.process(&input);
/// assert_eq!(output.len(), 200);
/// ```
use num_complex::Complex;

use super::filters::KaiserLowpass;
use super::{Blocks, DspBlock};
use crate::config::{DecimatorConfig, PolyphaseMode};
use crate::error::Result;

/// Fixed-capacity circular buffer of complex samples.
///
/// Holds the most recent `capacity` samples pushed into it; older samples are
/// overwritten. The write cursor always stays in `0..capacity`.
#[derive(Debug, Clone)]
pub struct DelayLine {
    buf: Vec<Complex<f32>>,
    pos: usize,
}

impl DelayLine {
    /// Creates a zero-filled delay line. A capacity of 0 is rounded up to 1.
    pub fn new(capacity: usize) -> Self {
        Self {
            buf: vec![Complex::new(0.0, 0.0); capacity.max(1)],
            pos: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    /// Current write cursor.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Writes a sample at the cursor and advances the cursor.
    #[inline]
    pub fn push(&mut self, sample: Complex<f32>) {
        self.buf[self.pos] = sample;
        self.pos += 1;
        if self.pos == self.buf.len() {
            self.pos = 0;
        }
    }

    /// Dot product of `taps` with the most recent samples, newest first.
    ///
    /// `taps[0]` weights the newest sample, `taps[1]` the one before, and so
    /// on, walking backward from the cursor and wrapping around.
    #[inline]
    pub fn dot(&self, taps: &[f32]) -> Complex<f32> {
        debug_assert!(taps.len() <= self.buf.len());
        let mut acc = Complex::new(0.0f32, 0.0);
        let mut idx = self.pos;
        for &t in taps {
            if idx == 0 {
                idx = self.buf.len();
            }
            idx -= 1;
            acc += self.buf[idx] * t;
        }
        acc
    }

    /// Zeroes the contents and rewinds the cursor.
    pub fn clear(&mut self) {
        self.buf.fill(Complex::new(0.0, 0.0));
        self.pos = 0;
    }
}

/// A decimator that reduces the sample rate by an integer factor.
///
/// # Fields
/// - `factor`: The decimation factor `M` (output rate = input rate / `M`)
/// - `taps`: The full prototype filter
/// - `phases`: The prototype split into `M` phase subfilters
/// - `lines`: One delay line per phase (commutated mode) or a single shared
///   delay line (phase-zero-only mode)
/// - `phase`: Running phase counter, modulo `M`
pub struct PolyphaseDecimator {
    factor: usize,
    taps: Vec<f32>,
    phases: Vec<Vec<f32>>,
    lines: Vec<DelayLine>,
    phase: usize,
    mode: PolyphaseMode,
}

impl PolyphaseDecimator {
    /// Creates a decimator with the default filter settings: cutoff at
    /// 0.45 × output rate, 60 dB stopband, commutated polyphase evaluation.
    ///
    /// # Panics
    /// Panics if `factor` or `taps` is 0, or if `sample_rate` is not positive.
    pub fn new(sample_rate: f64, factor: usize, taps: usize) -> Self {
        assert!(factor > 0, "Decimation factor must be greater than 0");
        assert!(taps > 0, "Number of taps must be greater than 0");
        assert!(sample_rate > 0.0, "Sample rate must be greater than 0");
        let config = DecimatorConfig::new(sample_rate, factor, taps);
        Self::build(&config)
    }

    /// Creates a decimator from a validated configuration.
    pub fn from_config(config: &DecimatorConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(config))
    }

    /// Creates a decimator around caller-provided prototype taps.
    ///
    /// # Panics
    /// Panics if `factor` is 0 or `taps` is empty.
    pub fn with_taps(factor: usize, taps: Vec<f32>, mode: PolyphaseMode) -> Self {
        assert!(factor > 0, "Decimation factor must be greater than 0");
        assert!(!taps.is_empty(), "Number of taps must be greater than 0");

        let phases = split_phases(&taps, factor);
        let capacity = phases.iter().map(Vec::len).max().unwrap_or(1);
        let branches = match mode {
            PolyphaseMode::Commutated => factor,
            PolyphaseMode::PhaseZeroOnly => 1,
        };
        let lines = (0..branches).map(|_| DelayLine::new(capacity)).collect();

        tracing::debug!(
            factor,
            taps = taps.len(),
            delay = capacity,
            ?mode,
            "polyphase decimator ready"
        );

        Self {
            factor,
            taps,
            phases,
            lines,
            phase: 0,
            mode,
        }
    }

    fn build(config: &DecimatorConfig) -> Self {
        let taps = KaiserLowpass::new(config.taps, config.cutoff_hz(), config.sample_rate)
            .stopband_db(config.filter.stopband_db)
            .bessel_terms(config.filter.bessel_terms)
            .design();
        Self::with_taps(config.factor, taps, config.mode)
    }

    /// Returns the decimation factor.
    pub fn factor(&self) -> usize {
        self.factor
    }

    /// Returns the number of FIR filter taps.
    pub fn num_taps(&self) -> usize {
        self.taps.len()
    }

    /// Returns the prototype filter coefficients.
    pub fn taps(&self) -> &[f32] {
        &self.taps
    }

    /// Returns the phase subfilters, indexed by phase.
    pub fn phases(&self) -> &[Vec<f32>] {
        &self.phases
    }

    /// Capacity of each delay line: the length of the longest phase.
    pub fn delay_capacity(&self) -> usize {
        self.lines[0].capacity()
    }

    /// Current value of the running phase counter.
    pub fn phase(&self) -> usize {
        self.phase
    }

    pub fn mode(&self) -> PolyphaseMode {
        self.mode
    }

    /// Clears the delay lines and rewinds the phase counter.
    pub fn reset(&mut self) {
        self.lines.iter_mut().for_each(DelayLine::clear);
        self.phase = 0;
    }

    /// Lazily decimates a stream of sample blocks.
    ///
    /// Each input block yields one output block holding the phase-zero hits
    /// of that block, which may be empty. Errors are passed through.
    pub fn decimate<I>(self, input: I) -> Blocks<I::IntoIter, Self>
    where
        I: IntoIterator<Item = Result<Vec<Complex<f32>>>>,
    {
        Blocks::new(input.into_iter(), self)
    }

    #[inline]
    fn consume(&mut self, x: Complex<f32>) -> Option<Complex<f32>> {
        let output = match self.mode {
            PolyphaseMode::Commutated => {
                // Sample n feeds the branch whose taps weight it at the next
                // phase-zero instant: branch (M - n mod M) mod M.
                let branch = (self.factor - self.phase) % self.factor;
                self.lines[branch].push(x);
                (self.phase == 0).then(|| {
                    self.lines
                        .iter()
                        .zip(&self.phases)
                        .map(|(line, taps)| line.dot(taps))
                        .sum::<Complex<f32>>()
                })
            }
            PolyphaseMode::PhaseZeroOnly => {
                self.lines[0].push(x);
                (self.phase == 0).then(|| self.lines[0].dot(&self.phases[0]))
            }
        };

        self.phase += 1;
        if self.phase == self.factor {
            self.phase = 0;
        }
        output
    }
}

impl DspBlock for PolyphaseDecimator {
    type Input = Complex<f32>;
    type Output = Complex<f32>;

    /// Appends one output per phase-zero hit in `input`.
    fn process_into(&mut self, input: &[Complex<f32>], output: &mut Vec<Complex<f32>>) {
        output.reserve(input.len() / self.factor + 1);
        for &x in input {
            if let Some(y) = self.consume(x) {
                output.push(y);
            }
        }
    }
}

/// Split `taps` into `factor` subsequences by stride.
fn split_phases(taps: &[f32], factor: usize) -> Vec<Vec<f32>> {
    (0..factor)
        .map(|i| taps.iter().skip(i).step_by(factor).copied().collect())
        .collect()
}

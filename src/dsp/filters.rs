//! FIR low-pass filter design.
//!
//! This module synthesizes low-pass FIR coefficients with the Kaiser
//! windowed-sinc method:
//! 1. Ideal sinc impulse response for the requested cutoff
//! 2. Kaiser window, with β derived from the requested stopband attenuation
//! 3. Normalization to unity DC gain
//!
//! All arithmetic is carried out in `f64`; coefficients are narrowed to `f32`
//! at the very end, which is the working precision of the sample streams.
//!
//! # Example
//!
//! ```
//! use sdrpipe::dsp::filters::design_lowpass;
//!
//! // 63 taps, 21.6 kHz cutoff at 240 kHz, 60 dB stopband
//! let taps = design_lowpass(63, 21_600.0, 240_000.0, 60.0);
//! assert_eq!(taps.len(), 63);
//!
//! let dc_gain: f32 = taps.iter().sum();
//! assert!((dc_gain - 1.0).abs() < 1e-5);
//! ```

use std::f64::consts::PI;

use crate::config::DEFAULT_BESSEL_TERMS;

/// Kaiser shape parameter β for a stopband attenuation of `att_db` decibels.
///
/// Uses the empirical piecewise formula:
/// - `A > 50`: `β = 0.1102 (A − 8.7)`
/// - `21 ≤ A ≤ 50`: `β = 0.5842 (A − 21)^0.4 + 0.07886 (A − 21)`
/// - `A < 21`: `β = 0` (rectangular window)
pub fn kaiser_beta(att_db: f64) -> f64 {
    if att_db > 50.0 {
        0.1102 * (att_db - 8.7)
    } else if att_db >= 21.0 {
        0.5842 * (att_db - 21.0).powf(0.4) + 0.07886 * (att_db - 21.0)
    } else {
        0.0
    }
}

/// Zeroth-order modified Bessel function of the first kind, `I0(x)`.
///
/// Evaluates the power series `Σ (x²/4)^k / (k!)²` truncated to `terms`
/// terms. This is an approximation: the truncation error grows with `|x|`.
/// With 25 terms the relative error stays below 1e-12 for `|x| ≤ 15`, which
/// covers Kaiser windows up to roughly 140 dB of attenuation.
pub fn bessel_i0(x: f64, terms: usize) -> f64 {
    let y = x * x / 4.0;
    let mut sum = 0.0;
    let mut term = 1.0;
    for k in 0..terms {
        sum += term;
        let next = (k + 1) as f64;
        term *= y / (next * next);
    }
    sum
}

/// Kaiser window value at index `n` of a window spanning `0..=m`.
///
/// The window is symmetric about `m / 2`: `kaiser_window(n, m, ..)` equals
/// `kaiser_window(m - n, m, ..)`. A single-point window (`m == 0`) is 1.
pub fn kaiser_window(n: usize, m: usize, beta: f64, bessel_terms: usize) -> f64 {
    if m == 0 {
        return 1.0;
    }
    let r = (2.0 * n as f64 - m as f64) / m as f64;
    let arg = beta * (1.0 - r * r).max(0.0).sqrt();
    bessel_i0(arg, bessel_terms) / bessel_i0(beta, bessel_terms)
}

/// Normalized sinc: `sin(πx) / (πx)`, with `sinc(0) = 1`.
pub fn sinc(x: f64) -> f64 {
    if x == 0.0 {
        1.0
    } else {
        (PI * x).sin() / (PI * x)
    }
}

/// Kaiser windowed-sinc low-pass design.
///
/// Holds the design parameters; call [`KaiserLowpass::design`] to obtain the
/// coefficients.
///
/// The caller is responsible for `taps > 0` and `cutoff_hz < sample_rate / 2`;
/// a cutoff above Nyquist produces an aliasing filter and is not detected.
///
/// # Example
///
/// ```
/// use sdrpipe::dsp::filters::KaiserLowpass;
///
/// let taps = KaiserLowpass::new(127, 4_000.0, 48_000.0)
///     .stopband_db(80.0)
///     .design();
/// assert_eq!(taps.len(), 127);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KaiserLowpass {
    taps: usize,
    cutoff_hz: f64,
    sample_rate: f64,
    stopband_db: f64,
    bessel_terms: usize,
}

impl KaiserLowpass {
    /// Start a design with 60 dB stopband attenuation and the default
    /// Bessel series length.
    pub fn new(taps: usize, cutoff_hz: f64, sample_rate: f64) -> Self {
        Self {
            taps,
            cutoff_hz,
            sample_rate,
            stopband_db: crate::config::DEFAULT_STOPBAND_DB,
            bessel_terms: DEFAULT_BESSEL_TERMS,
        }
    }

    pub fn stopband_db(mut self, stopband_db: f64) -> Self {
        self.stopband_db = stopband_db;
        self
    }

    pub fn bessel_terms(mut self, bessel_terms: usize) -> Self {
        self.bessel_terms = bessel_terms;
        self
    }

    /// Kaiser β for this design.
    pub fn beta(&self) -> f64 {
        kaiser_beta(self.stopband_db)
    }

    /// Compute the normalized coefficients.
    pub fn design(&self) -> Vec<f32> {
        let beta = self.beta();
        let fc = self.cutoff_hz / self.sample_rate;
        let m = self.taps.saturating_sub(1);
        let mid = m as f64 / 2.0;

        let raw: Vec<f64> = (0..self.taps)
            .map(|n| {
                let h = 2.0 * fc * sinc(2.0 * fc * (n as f64 - mid));
                h * kaiser_window(n, m, beta, self.bessel_terms)
            })
            .collect();

        // DC-gain normalization
        let sum: f64 = raw.iter().sum();
        raw.iter().map(|&v| (v / sum) as f32).collect()
    }
}

/// Design a Kaiser windowed-sinc low-pass filter.
///
/// # Arguments
///
/// * `tap_count` - Number of coefficients (must be > 0)
/// * `cutoff_hz` - Cutoff frequency in Hz (must be below `sample_rate / 2`)
/// * `sample_rate` - Sample rate in Hz
/// * `stopband_db` - Desired stopband attenuation in dB
///
/// # Returns
///
/// `tap_count` coefficients whose sum is 1 (unity DC gain).
pub fn design_lowpass(
    tap_count: usize,
    cutoff_hz: f64,
    sample_rate: f64,
    stopband_db: f64,
) -> Vec<f32> {
    KaiserLowpass::new(tap_count, cutoff_hz, sample_rate)
        .stopband_db(stopband_db)
        .design()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_kaiser_beta_piecewise() {
        assert_relative_eq!(kaiser_beta(60.0), 0.1102 * 51.3, epsilon = 1e-12);
        assert_relative_eq!(
            kaiser_beta(30.0),
            0.5842 * 9f64.powf(0.4) + 0.07886 * 9.0,
            epsilon = 1e-12
        );
        assert_eq!(kaiser_beta(21.0), 0.0);
        assert_eq!(kaiser_beta(10.0), 0.0);
    }

    #[test]
    fn test_bessel_i0_known_values() {
        assert_relative_eq!(bessel_i0(0.0, 25), 1.0, epsilon = 1e-15);
        assert_relative_eq!(bessel_i0(1.0, 25), 1.266_065_877_752_008_4, epsilon = 1e-12);
        assert_relative_eq!(bessel_i0(5.0, 25), 27.239_871_823_604_45, max_relative = 1e-12);
    }

    #[test]
    fn test_bessel_i0_truncation_loses_precision() {
        // Few terms cannot follow the series for large arguments
        let exact = bessel_i0(20.0, 100);
        let truncated = bessel_i0(20.0, 5);
        assert!((exact - truncated).abs() / exact > 0.5);
    }

    #[test]
    fn test_kaiser_window_symmetric() {
        let beta = kaiser_beta(60.0);
        let m = 62;
        for n in 0..=m {
            assert_relative_eq!(
                kaiser_window(n, m, beta, 25),
                kaiser_window(m - n, m, beta, 25),
                epsilon = 1e-12
            );
        }
        assert_relative_eq!(kaiser_window(31, m, beta, 25), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_kaiser_window_rectangular_for_zero_beta() {
        for n in 0..=10 {
            assert_relative_eq!(kaiser_window(n, 10, 0.0, 25), 1.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_sinc() {
        assert_eq!(sinc(0.0), 1.0);
        assert!(sinc(1.0).abs() < 1e-15);
        assert_relative_eq!(sinc(0.5), 2.0 / PI, epsilon = 1e-12);
    }

    #[test]
    fn test_design_unity_dc_gain() {
        for taps in [1, 2, 7, 31, 63, 64, 127, 191] {
            for (cutoff, rate) in [(21_600.0, 240_000.0), (1_000.0, 48_000.0), (0.4, 1.0)] {
                let coeffs = design_lowpass(taps, cutoff, rate, 60.0);
                assert_eq!(coeffs.len(), taps);
                let sum: f32 = coeffs.iter().sum();
                assert_relative_eq!(sum, 1.0, epsilon = 1e-5);
            }
        }
    }

    #[test]
    fn test_design_is_symmetric() {
        let coeffs = design_lowpass(63, 21_600.0, 240_000.0, 60.0);
        for n in 0..coeffs.len() {
            assert_relative_eq!(coeffs[n], coeffs[62 - n], epsilon = 1e-7);
        }
    }

    #[test]
    fn test_design_peak_at_center() {
        let coeffs = design_lowpass(63, 21_600.0, 240_000.0, 60.0);
        let peak = coeffs
            .iter()
            .enumerate()
            .max_by(|(_, a), (_, b)| a.total_cmp(b))
            .map(|(idx, _)| idx)
            .unwrap();
        assert_eq!(peak, 31);
    }

    #[test]
    fn test_design_attenuates_stopband() {
        let rate = 240_000.0;
        let coeffs = design_lowpass(127, 21_600.0, rate, 60.0);

        // Frequency response magnitude at a given frequency
        let response = |freq: f64| {
            let w = 2.0 * PI * freq / rate;
            let (re, im) = coeffs.iter().enumerate().fold((0.0, 0.0), |(re, im), (n, &h)| {
                (re + h as f64 * (w * n as f64).cos(), im - h as f64 * (w * n as f64).sin())
            });
            (re * re + im * im).sqrt()
        };

        assert_relative_eq!(response(0.0), 1.0, epsilon = 1e-5);
        assert!(response(5_000.0) > 0.98);
        // Well inside the stopband: at least 50 dB down
        assert!(response(60_000.0) < 10f64.powf(-50.0 / 20.0));
    }

    #[test]
    fn test_builder_matches_free_function() {
        let a = KaiserLowpass::new(31, 1_000.0, 8_000.0).stopband_db(40.0).design();
        let b = design_lowpass(31, 1_000.0, 8_000.0, 40.0);
        assert_eq!(a, b);
    }
}

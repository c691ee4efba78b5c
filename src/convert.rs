//! Stateless sample-format converters.
//!
//! Each converter is a [`DspBlock`] so it can run as a pipeline stage like
//! the decimator and the demodulator. Supported pairs:
//!
//! | input     | output    | mapping                                  |
//! |-----------|-----------|------------------------------------------|
//! | int8      | complex64 | interleaved I/Q, `x / 128`               |
//! | uint8     | complex64 | interleaved I/Q, `(x − 127.5) / 128`     |
//! | float32   | int16     | truncating cast, saturating at the range |

use num_complex::Complex;

use crate::SampleFormat;
use crate::dsp::DspBlock;
use crate::error::{Error, Result};

/// Scale applied to signed 8-bit samples.
pub const INT8_SCALE: f32 = 1.0 / 128.0;

/// Signed 8-bit interleaved I/Q to complex float.
#[derive(Debug, Default, Clone, Copy)]
pub struct Int8ToComplex;

impl DspBlock for Int8ToComplex {
    type Input = i8;
    type Output = Complex<f32>;

    /// A trailing unpaired element is ignored.
    fn process_into(&mut self, input: &[i8], output: &mut Vec<Complex<f32>>) {
        output.extend(
            input
                .chunks_exact(2)
                .map(|c| Complex::new(c[0] as f32 * INT8_SCALE, c[1] as f32 * INT8_SCALE)),
        );
    }
}

/// Unsigned 8-bit interleaved I/Q (RTL-SDR layout) to complex float.
#[derive(Debug, Default, Clone, Copy)]
pub struct Uint8ToComplex;

impl DspBlock for Uint8ToComplex {
    type Input = u8;
    type Output = Complex<f32>;

    fn process_into(&mut self, input: &[u8], output: &mut Vec<Complex<f32>>) {
        output.extend(
            input
                .chunks_exact(2)
                .map(|c| Complex::new((c[0] as f32 - 127.5) / 128.0, (c[1] as f32 - 127.5) / 128.0)),
        );
    }
}

/// 32-bit float to signed 16-bit, one to one, without rescaling.
#[derive(Debug, Default, Clone, Copy)]
pub struct Float32ToInt16;

impl DspBlock for Float32ToInt16 {
    type Input = f32;
    type Output = i16;

    fn process_into(&mut self, input: &[f32], output: &mut Vec<i16>) {
        output.extend(input.iter().map(|&x| x as i16));
    }
}

/// A supported input/output type pair.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Conversion {
    Int8ToComplex64,
    Uint8ToComplex64,
    Float32ToInt16,
}

impl Conversion {
    /// All supported conversions.
    pub const ALL: [Conversion; 3] = [
        Conversion::Int8ToComplex64,
        Conversion::Uint8ToComplex64,
        Conversion::Float32ToInt16,
    ];

    /// Looks up the converter for a type pair.
    ///
    /// # Errors
    /// [`Error::UnsupportedConversion`] when no converter exists for the pair.
    pub fn resolve(input: SampleFormat, output: SampleFormat) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|c| c.formats() == (input, output))
            .ok_or_else(|| Error::UnsupportedConversion {
                input: input.to_string(),
                output: output.to_string(),
            })
    }

    pub fn formats(self) -> (SampleFormat, SampleFormat) {
        match self {
            Conversion::Int8ToComplex64 => (SampleFormat::Int8, SampleFormat::Complex64),
            Conversion::Uint8ToComplex64 => (SampleFormat::Uint8, SampleFormat::Complex64),
            Conversion::Float32ToInt16 => (SampleFormat::Float32, SampleFormat::Int16),
        }
    }

    /// Input elements consumed per output sample.
    pub fn input_elements_per_sample(self) -> usize {
        match self {
            Conversion::Int8ToComplex64 | Conversion::Uint8ToComplex64 => 2,
            Conversion::Float32ToInt16 => 1,
        }
    }

    /// Human-readable list of the supported pairs, for diagnostics.
    pub fn supported_list() -> String {
        Self::ALL
            .iter()
            .map(|c| {
                let (i, o) = c.formats();
                format!("{i} -> {o}")
            })
            .collect::<Vec<_>>()
            .join(", ")
    }
}

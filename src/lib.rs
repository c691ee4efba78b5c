#![doc = include_str!("../readme.md")]

use std::fmt;
use std::str::FromStr;

use num_complex::Complex;

pub mod config;
pub mod convert;
pub mod dsp;
pub mod error;
pub mod iqread;
pub mod pipeline;

pub use config::{
    DecimatorConfig, FilterConfig, FmConfig, PipelineConfig, PolyphaseMode, StartDetection,
};
pub use error::{Error, Result};

/**
 * Sample data type on the wire
 */
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SampleFormat {
    /// Signed 8-bit, interleaved I/Q when complex (Cs8)
    Int8,
    /// Unsigned 8-bit with 127.5 offset, interleaved I/Q (Cu8, RTL-SDR)
    Uint8,
    /// Signed 16-bit little-endian
    Int16,
    /// 32-bit little-endian float
    Float32,
    /// Two interleaved 32-bit little-endian floats (I, Q)
    Complex64,
}

impl SampleFormat {
    /// Size of one element on the wire, in bytes.
    pub fn element_size(self) -> usize {
        match self {
            SampleFormat::Int8 | SampleFormat::Uint8 => 1,
            SampleFormat::Int16 => 2,
            SampleFormat::Float32 => 4,
            SampleFormat::Complex64 => 8,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            SampleFormat::Int8 => "int8",
            SampleFormat::Uint8 => "uint8",
            SampleFormat::Int16 => "int16",
            SampleFormat::Float32 => "float32",
            SampleFormat::Complex64 => "complex64",
        }
    }
}

impl fmt::Display for SampleFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SampleFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "int8" | "cs8" => Ok(SampleFormat::Int8),
            "uint8" | "cu8" => Ok(SampleFormat::Uint8),
            "int16" | "s16" => Ok(SampleFormat::Int16),
            "float32" | "f32" => Ok(SampleFormat::Float32),
            "complex64" | "cf32" => Ok(SampleFormat::Complex64),
            other => Err(Error::config(format!("unknown sample type '{other}'"))),
        }
    }
}

/// A sample type with a fixed-width little-endian wire encoding.
pub trait WireSample: Copy + Send + 'static {
    /// Encoded size in bytes
    const SIZE: usize;

    /// Decodes one element from exactly `SIZE` bytes.
    fn read_le(bytes: &[u8]) -> Self;

    /// Appends the encoding of `self` to `out`.
    fn write_le(&self, out: &mut Vec<u8>);
}

impl WireSample for u8 {
    const SIZE: usize = 1;

    fn read_le(bytes: &[u8]) -> Self {
        bytes[0]
    }

    fn write_le(&self, out: &mut Vec<u8>) {
        out.push(*self);
    }
}

impl WireSample for i8 {
    const SIZE: usize = 1;

    fn read_le(bytes: &[u8]) -> Self {
        bytes[0] as i8
    }

    fn write_le(&self, out: &mut Vec<u8>) {
        out.push(*self as u8);
    }
}

impl WireSample for i16 {
    const SIZE: usize = 2;

    fn read_le(bytes: &[u8]) -> Self {
        i16::from_le_bytes([bytes[0], bytes[1]])
    }

    fn write_le(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.to_le_bytes());
    }
}

impl WireSample for f32 {
    const SIZE: usize = 4;

    fn read_le(bytes: &[u8]) -> Self {
        f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
    }

    fn write_le(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.to_le_bytes());
    }
}

impl WireSample for Complex<f32> {
    const SIZE: usize = 8;

    fn read_le(bytes: &[u8]) -> Self {
        Complex::new(f32::read_le(&bytes[..4]), f32::read_le(&bytes[4..8]))
    }

    fn write_le(&self, out: &mut Vec<u8>) {
        self.re.write_le(out);
        self.im.write_le(out);
    }
}

/// Decodes a whole number of elements from `bytes` into `out`.
///
/// Trailing bytes that do not make up a full element are ignored; callers
/// that care about alignment check it beforehand.
pub fn decode_samples<T: WireSample>(bytes: &[u8], out: &mut Vec<T>) {
    out.extend(bytes.chunks_exact(T::SIZE).map(T::read_le));
}

/// Encodes `samples` little-endian, appending to `out`.
pub fn encode_samples<T: WireSample>(samples: &[T], out: &mut Vec<u8>) {
    out.reserve(samples.len() * T::SIZE);
    for s in samples {
        s.write_le(out);
    }
}

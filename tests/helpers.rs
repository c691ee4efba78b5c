//! Test helper utilities for generating synthetic I/Q signals and capturing
//! pipeline output

#![allow(dead_code)]

use std::f32::consts::PI;
use std::io::Write;
use std::sync::{Arc, Mutex};

use num_complex::Complex;

/// Generate a complex tone at a specific frequency
///
/// # Arguments
/// * `frequency` - Frequency in Hz (negative for clockwise rotation)
/// * `sample_rate` - Sample rate in Hz
/// * `num_samples` - Number of samples to generate
pub fn generate_tone(frequency: f32, sample_rate: f32, num_samples: usize) -> Vec<Complex<f32>> {
    let angular_freq = 2.0 * PI * frequency / sample_rate;
    (0..num_samples)
        .map(|n| {
            let phase = angular_freq * n as f32;
            Complex::new(phase.cos(), phase.sin())
        })
        .collect()
}

/// Generate an FM-modulated carrier
///
/// # Arguments
/// * `audio_freq` - Modulating tone frequency in Hz
/// * `deviation` - Peak frequency deviation in Hz
/// * `sample_rate` - Sample rate in Hz
/// * `num_samples` - Number of samples to generate
pub fn generate_fm(
    audio_freq: f32,
    deviation: f32,
    sample_rate: f32,
    num_samples: usize,
) -> Vec<Complex<f32>> {
    let mut phase = 0.0f32;
    (0..num_samples)
        .map(|n| {
            let t = n as f32 / sample_rate;
            let inst_freq = deviation * (2.0 * PI * audio_freq * t).sin();
            phase += 2.0 * PI * inst_freq / sample_rate;
            phase %= 2.0 * PI;
            Complex::new(phase.cos(), phase.sin()) * 0.9
        })
        .collect()
}

/// Quantize complex samples to interleaved signed 8-bit I/Q bytes (Cs8)
pub fn to_cs8(samples: &[Complex<f32>]) -> Vec<u8> {
    let mut buffer = Vec::with_capacity(samples.len() * 2);
    for s in samples {
        buffer.push(((s.re * 127.0).round() as i8) as u8);
        buffer.push(((s.im * 127.0).round() as i8) as u8);
    }
    buffer
}

/// Encode complex samples as interleaved little-endian f32 (Cf32)
pub fn to_cf32(samples: &[Complex<f32>]) -> Vec<u8> {
    let mut buffer = Vec::with_capacity(samples.len() * 8);
    sdrpipe::encode_samples(samples, &mut buffer);
    buffer
}

/// Decode little-endian bytes into samples
pub fn decode<T: sdrpipe::WireSample>(bytes: &[u8]) -> Vec<T> {
    let mut out = Vec::new();
    sdrpipe::decode_samples(bytes, &mut out);
    out
}

/// A `Write` target that can be inspected after the pipeline consumed it
#[derive(Clone, Default)]
pub struct SharedSink(pub Arc<Mutex<Vec<u8>>>);

impl SharedSink {
    pub fn bytes(&self) -> Vec<u8> {
        self.0.lock().unwrap().clone()
    }
}

impl Write for SharedSink {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// A `Write` target that fails after accepting `limit` bytes
pub struct FailingSink {
    pub written: usize,
    pub limit: usize,
}

impl Write for FailingSink {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        if self.written + buf.len() > self.limit {
            return Err(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "downstream closed",
            ));
        }
        self.written += buf.len();
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// A `Write` target that sleeps on every write, to build up backpressure
#[derive(Clone, Default)]
pub struct SlowSink(pub SharedSink);

impl Write for SlowSink {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        std::thread::sleep(std::time::Duration::from_millis(2));
        self.0.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_tone_length() {
        assert_eq!(generate_tone(1000.0, 48_000.0, 100).len(), 100);
    }

    #[test]
    fn test_generate_fm_constant_envelope() {
        for s in generate_fm(1000.0, 5000.0, 240_000.0, 500) {
            assert!((s.norm() - 0.9).abs() < 1e-4);
        }
    }

    #[test]
    fn test_to_cs8_layout() {
        let bytes = to_cs8(&[Complex::new(0.5, -0.5)]);
        assert_eq!(bytes, vec![64, (-64i8) as u8]);
    }

    #[test]
    fn test_shared_sink_collects() {
        let sink = SharedSink::default();
        let mut writer = sink.clone();
        writer.write_all(&[1, 2, 3]).unwrap();
        assert_eq!(sink.bytes(), vec![1, 2, 3]);
    }
}

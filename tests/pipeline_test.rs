//! Integration tests for the threaded stage pipeline

mod helpers;

use std::io::Cursor;

use num_complex::Complex;
use sdrpipe::convert::Int8ToComplex;
use sdrpipe::dsp::DspBlock;
use sdrpipe::dsp::decimator::PolyphaseDecimator;
use sdrpipe::dsp::fm::FmDemodulator;
use sdrpipe::iqread::BlockRead;
use sdrpipe::pipeline::Pipeline;
use sdrpipe::{Error, PipelineConfig};

/// Run raw Cs8 bytes through convert → decimate → demodulate → i16 sink
fn run_fm_chain(raw: Vec<u8>, block_size: usize, queue_depth: usize) -> sdrpipe::Result<Vec<u8>> {
    let sink = helpers::SharedSink::default();
    let reader = BlockRead::<_, i8>::new(Cursor::new(raw), block_size * 2, "memory reader");
    Pipeline::source(PipelineConfig::new(block_size, queue_depth), "reader", reader)
        .then("int8 to complex64", Int8ToComplex)
        .then("decimator", PolyphaseDecimator::new(240_000.0, 5, 63))
        .then("fm demodulator", FmDemodulator::default())
        .sink("writer", sink.clone())
        .run()?;
    Ok(sink.bytes())
}

#[test]
fn test_pipeline_matches_sequential_processing() {
    let iq = helpers::generate_fm(1_000.0, 5_000.0, 240_000.0, 12_000);
    let raw = helpers::to_cs8(&iq);

    let samples = Int8ToComplex.process(&helpers::decode::<i8>(&raw));
    let decimated = PolyphaseDecimator::new(240_000.0, 5, 63).process(&samples);
    let expected = FmDemodulator::default().process(&decimated);

    let bytes = run_fm_chain(raw, 400, 4).expect("pipeline failed");
    let audio: Vec<i16> = helpers::decode(&bytes);
    assert_eq!(audio.len(), 12_000 / 5);
    assert_eq!(audio, expected);
}

#[test]
fn test_pipeline_output_is_independent_of_block_size() {
    let iq = helpers::generate_fm(700.0, 8_000.0, 240_000.0, 9_600);
    let raw = helpers::to_cs8(&iq);

    let reference = run_fm_chain(raw.clone(), 9_600, 4).unwrap();
    for block_size in [64, 100, 320, 1_200] {
        let got = run_fm_chain(raw.clone(), block_size, 2).unwrap();
        assert_eq!(got, reference, "block size {block_size}");
    }
}

#[test]
fn test_pipeline_demodulates_tone() {
    let iq = helpers::generate_fm(1_000.0, 2_000.0, 240_000.0, 48_000);
    let bytes = run_fm_chain(helpers::to_cs8(&iq), 4_800, 4).unwrap();
    let audio: Vec<i16> = helpers::decode(&bytes);

    // A 1 kHz tone at 48 kHz: the audio swings both ways
    let settled = &audio[2_000..];
    assert!(settled.iter().any(|&s| s > 10_000));
    assert!(settled.iter().any(|&s| s < -10_000));
}

#[test]
fn test_empty_input_is_clean() {
    let bytes = run_fm_chain(Vec::new(), 128, 4).unwrap();
    assert!(bytes.is_empty());
}

#[test]
fn test_truncated_input_fails_without_deadlock() {
    let mut raw = helpers::to_cs8(&helpers::generate_tone(1_000.0, 240_000.0, 1_000));
    raw.truncate(raw.len() - 3);
    let err = run_fm_chain(raw, 100, 2).unwrap_err();
    match err {
        Error::TruncatedBlock {
            stage, expected, got,
        } => {
            assert_eq!(stage, "memory reader");
            assert_eq!(expected, 200);
            assert_eq!(got, 197);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_sink_failure_is_root_cause() {
    let iq = helpers::generate_tone(1_000.0, 240_000.0, 100_000);
    let reader = BlockRead::<_, i8>::new(Cursor::new(helpers::to_cs8(&iq)), 200, "memory reader");
    let sink = helpers::FailingSink {
        written: 0,
        limit: 1_000,
    };

    let err = Pipeline::source(PipelineConfig::new(100, 2), "reader", reader)
        .then("int8 to complex64", Int8ToComplex)
        .sink("stdout writer", sink)
        .run()
        .unwrap_err();

    assert!(
        matches!(err, Error::Io { stage: "stdout writer", .. }),
        "unexpected error: {err}"
    );
}

#[test]
fn test_buffers_stay_bounded_under_backpressure() {
    let iq = helpers::generate_tone(1_000.0, 240_000.0, 20_000);
    let reader = BlockRead::<_, Complex<f32>>::new(
        Cursor::new(helpers::to_cf32(&iq)),
        100,
        "memory reader",
    );
    let sink = helpers::SlowSink::default();
    let depth = 3;

    let stats = Pipeline::source(PipelineConfig::new(100, depth), "reader", reader)
        .then("decimator", PolyphaseDecimator::new(240_000.0, 2, 31))
        .sink("writer", sink.clone())
        .run()
        .unwrap();

    assert_eq!(stats.stages[0].blocks, 200);
    assert_eq!(stats.stages[2].blocks, 200);
    for boundary in &stats.boundaries {
        assert!(
            boundary.buffers_allocated <= depth + 2,
            "{} allocated {} buffers",
            boundary.producer,
            boundary.buffers_allocated
        );
    }
    assert_eq!(sink.0.bytes().len(), 10_000 * 8);
}

struct Exploding {
    after: usize,
}

impl DspBlock for Exploding {
    type Input = Complex<f32>;
    type Output = Complex<f32>;

    fn process_into(&mut self, input: &[Complex<f32>], output: &mut Vec<Complex<f32>>) {
        assert!(self.after > 0, "block exploded");
        self.after -= 1;
        output.extend_from_slice(input);
    }
}

#[test]
fn test_stage_panic_is_reported() {
    let iq = helpers::generate_tone(1_000.0, 240_000.0, 10_000);
    let reader = BlockRead::<_, Complex<f32>>::new(
        Cursor::new(helpers::to_cf32(&iq)),
        100,
        "memory reader",
    );

    let err = Pipeline::source(PipelineConfig::new(100, 2), "reader", reader)
        .then("exploding", Exploding { after: 3 })
        .sink("writer", helpers::SharedSink::default())
        .run()
        .unwrap_err();

    assert!(
        matches!(&err, Error::StagePanicked { stage } if stage == "exploding"),
        "unexpected error: {err}"
    );
}

#[test]
fn test_invalid_config_rejected_before_start() {
    let reader = BlockRead::<_, u8>::new(Cursor::new(vec![0u8; 16]), 4, "memory reader");
    let sink = helpers::SharedSink::default();
    let err = Pipeline::source(PipelineConfig::new(0, 4), "reader", reader)
        .sink("writer", sink.clone())
        .run()
        .unwrap_err();
    assert!(matches!(err, Error::InvalidConfig(_)));
    assert!(sink.bytes().is_empty());
}

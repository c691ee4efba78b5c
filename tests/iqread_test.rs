//! Integration tests for the iqread module: file, async and chained readers

mod helpers;

use std::fs;
use std::io::{BufReader, Read};
use std::path::PathBuf;

use futures::StreamExt;
use num_complex::Complex;
use sdrpipe::pipeline::Pipeline;
use sdrpipe::{Error, PipelineConfig};
use sdrpipe::convert::{Int8ToComplex, Uint8ToComplex};
use sdrpipe::dsp::decimator::PolyphaseDecimator;
use sdrpipe::dsp::fm::FmDemodulator;
use sdrpipe::dsp::{BlockStream, Blocks, DspBlock};
use sdrpipe::iqread::{AsyncBlockRead, BlockRead};

fn temp_file(name: &str, contents: &[u8]) -> PathBuf {
    let path = std::env::temp_dir().join(format!("sdrpipe_{}_{name}", std::process::id()));
    fs::write(&path, contents).expect("Failed to write test file");
    path
}

#[test]
fn test_file_reader_cs8_blocks() {
    let samples = vec![0u8, 0, 127, 127, 128, 128, 64, 192];
    let path = temp_file("cs8_blocks.iq", &samples);

    let reader = BlockRead::<BufReader<fs::File>, i8>::from_file(&path, 4).expect("Failed to open");
    let blocks: Vec<Vec<i8>> = reader.map(|b| b.unwrap()).collect();
    assert_eq!(blocks, vec![vec![0, 0, 127, 127], vec![-128, -128, 64, -64]]);

    fs::remove_file(path).ok();
}

#[test]
fn test_file_reader_missing_file() {
    let err = BlockRead::<BufReader<fs::File>, u8>::from_file("/nonexistent/sdrpipe/input.iq", 16)
        .err()
        .expect("open should fail");
    assert!(matches!(err, Error::Io { stage: "file reader", .. }));
}

#[test]
fn test_file_reader_truncated_tail() {
    // 3 whole complex64 samples and half of a fourth
    let mut bytes = helpers::to_cf32(&helpers::generate_tone(1_000.0, 48_000.0, 3));
    bytes.extend_from_slice(&[0u8; 4]);
    let path = temp_file("cf32_truncated.iq", &bytes);

    let results: Vec<_> = BlockRead::<BufReader<fs::File>, Complex<f32>>::from_file(&path, 3)
        .unwrap()
        .collect();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].as_ref().unwrap().len(), 3);
    assert!(matches!(
        results[1],
        Err(Error::TruncatedBlock {
            expected: 24,
            got: 4,
            ..
        })
    ));

    fs::remove_file(path).ok();
}

#[test]
fn test_cu8_dc_signal_is_centered() {
    // RTL-SDR idle level sits between 127 and 128
    let bytes: Vec<u8> = [127u8, 128].repeat(50);
    let reader = BlockRead::<_, u8>::new(std::io::Cursor::new(bytes), 20, "memory reader");

    for block in Blocks::new(reader, Uint8ToComplex) {
        for s in block.unwrap() {
            assert!(s.norm() < 0.01, "sample {s} not centered");
        }
    }
}

#[test]
fn test_iterator_chain_matches_whole_stream() {
    let iq = helpers::generate_fm(1_000.0, 5_000.0, 240_000.0, 6_000);
    let raw = helpers::to_cs8(&iq);

    let expected = {
        let samples = Int8ToComplex.process(&helpers::decode::<i8>(&raw));
        let decimated = PolyphaseDecimator::new(240_000.0, 5, 63).process(&samples);
        FmDemodulator::default().process(&decimated)
    };

    let reader = BlockRead::<_, i8>::new(std::io::Cursor::new(raw), 300, "memory reader");
    let samples = Blocks::new(reader, Int8ToComplex);
    let decimated = PolyphaseDecimator::new(240_000.0, 5, 63).decimate(samples);
    let audio: Vec<i16> = FmDemodulator::default()
        .demodulate(decimated)
        .map(|b| b.unwrap())
        .flatten()
        .collect();

    assert_eq!(audio, expected);
}

#[test]
fn test_iterator_chain_passes_errors_through() {
    let reader = BlockRead::<_, i8>::new(std::io::Cursor::new(vec![1u8; 10]), 4, "memory reader");
    let samples = Blocks::new(reader, Int8ToComplex);
    let results: Vec<_> = PolyphaseDecimator::new(48_000.0, 2, 15)
        .decimate(samples)
        .collect();

    assert_eq!(results.len(), 3);
    assert_eq!(results[0].as_ref().unwrap().len(), 1);
    assert_eq!(results[1].as_ref().unwrap().len(), 1);
    assert!(matches!(results[2], Err(Error::TruncatedBlock { got: 2, .. })));
}

#[tokio::test]
async fn test_async_file_stream_matches_sync() {
    let iq = helpers::generate_tone(-2_000.0, 96_000.0, 960);
    let path = temp_file("cf32_async.iq", &helpers::to_cf32(&iq));

    let reader = AsyncBlockRead::<tokio::io::BufReader<tokio::fs::File>, Complex<f32>>::from_file(&path, 96)
        .await
        .expect("Failed to open");
    let decimator = PolyphaseDecimator::new(96_000.0, 2, 31);
    let decimated: Vec<Complex<f32>> = BlockStream::new(reader, decimator)
        .map(|b| b.unwrap())
        .collect::<Vec<_>>()
        .await
        .concat();

    let expected = PolyphaseDecimator::new(96_000.0, 2, 31).process(&iq);
    assert_eq!(decimated, expected);

    fs::remove_file(path).ok();
}

#[tokio::test]
async fn test_async_tcp_connection_refused() {
    // Bind then drop a listener to get a port nobody listens on
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let err = AsyncBlockRead::<tokio::io::BufReader<tokio::net::TcpStream>, u8>::from_tcp("127.0.0.1", port, 64)
        .await
        .err()
        .expect("connect should fail");
    assert!(matches!(err, Error::Io { stage: "tcp reader", .. }));
}

#[test]
fn test_open_reads_file_through_pipeline() {
    let iq = helpers::generate_tone(3_000.0, 48_000.0, 480);
    let path = temp_file("cf32_open.iq", &helpers::to_cf32(&iq));

    let reader = BlockRead::<Box<dyn Read + Send>, Complex<f32>>::open(Some(path.as_path()), 48).unwrap();
    let sink = helpers::SharedSink::default();
    let stats = Pipeline::source(PipelineConfig::new(48, 2), "source", reader)
        .then("decimator", PolyphaseDecimator::new(48_000.0, 4, 31))
        .sink("writer", sink.clone())
        .run()
        .unwrap();

    assert_eq!(stats.stages[0].blocks, 10);
    let out: Vec<Complex<f32>> = helpers::decode(&sink.bytes());
    assert_eq!(out, PolyphaseDecimator::new(48_000.0, 4, 31).process(&iq));

    fs::remove_file(path).ok();
}

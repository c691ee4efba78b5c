//! Streaming converter, decimator and FM demodulator for raw SDR samples
//!
//! Reads little-endian samples from a file or standard input and writes the
//! processed stream to standard output. Supported operations:
//! - sample type conversion (int8/uint8 → complex64, float32 → int16)
//! - polyphase decimation of complex64 streams
//! - FM demodulation of complex64 streams to int16 audio
//! - the full raw bytes → audio chain
//!
//! # Usage Examples
//!
//! ## RTL-SDR bytes to complex float
//! ```bash
//! rtl_sdr -f 105.1M -s 240k - | sdrconvert convert --in uint8 --out complex64 > iq.cf32
//! ```
//!
//! ## Decimate by 5
//! ```bash
//! sdrconvert decimate --rate 240000 --factor 5 --input iq.cf32 > iq48k.cf32
//! ```
//!
//! ## Demodulate to 16-bit audio
//! ```bash
//! sdrconvert demod --input iq48k.cf32 | aplay -f S16_LE -r 48000
//! ```
//!
//! ## Full chain
//! ```bash
//! rtl_sdr -f 105.1M -s 240k - | sdrconvert fm --rate 240000 --factor 5 --in uint8 | aplay -f S16_LE -r 48000
//! ```

use std::io::{BufWriter, Read, Stdout};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{ArgAction, Args, Parser, Subcommand};
use num_complex::Complex;
use sdrpipe::config::{
    DEFAULT_AUDIO_GAIN, DEFAULT_BLOCK_SIZE, DEFAULT_CUTOFF_RATIO, DEFAULT_DC_ALPHA,
    DEFAULT_QUEUE_DEPTH, DEFAULT_STOPBAND_DB,
};
use sdrpipe::convert::{Conversion, Float32ToInt16, Int8ToComplex, Uint8ToComplex};
use sdrpipe::dsp::decimator::PolyphaseDecimator;
use sdrpipe::dsp::fm::FmDemodulator;
use sdrpipe::iqread::{BlockRead, IO_BUFFER_SIZE};
use sdrpipe::pipeline::{Pipeline, PipelineStats};
use sdrpipe::{
    DecimatorConfig, Error, FilterConfig, FmConfig, PipelineConfig, PolyphaseMode, Result,
    SampleFormat, StartDetection, WireSample,
};
use tracing::{debug, info};

const SOURCE: &str = "source";
const SINK: &str = "stdout writer";

#[derive(Parser, Debug)]
#[command(author, version, about = "Streaming SDR sample converter, decimator and FM demodulator", long_about = None)]
struct Cli {
    /// Verbosity level (-v=info, -vv=debug, -vvv=trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Convert between sample types
    Convert {
        /// Input sample type (int8, uint8, float32)
        #[arg(long = "in")]
        input_type: String,

        /// Output sample type (complex64, int16)
        #[arg(long = "out")]
        output_type: String,

        #[command(flatten)]
        io: IoArgs,
    },
    /// Low-pass filter and decimate a complex64 stream
    Decimate {
        #[command(flatten)]
        decimator: DecimatorArgs,

        #[command(flatten)]
        io: IoArgs,
    },
    /// FM-demodulate a complex64 stream to int16 audio
    Demod {
        #[command(flatten)]
        demod: DemodArgs,

        #[command(flatten)]
        io: IoArgs,
    },
    /// Raw 8-bit I/Q to int16 audio: convert, decimate and demodulate
    Fm {
        /// Input sample type (int8 or uint8)
        #[arg(long = "in", default_value = "uint8")]
        input_type: String,

        #[command(flatten)]
        decimator: DecimatorArgs,

        #[command(flatten)]
        demod: DemodArgs,

        #[command(flatten)]
        io: IoArgs,
    },
}

#[derive(Args, Debug)]
struct IoArgs {
    /// Input file path (standard input when omitted)
    #[arg(long)]
    input: Option<PathBuf>,

    /// Block size in samples
    #[arg(long, default_value_t = DEFAULT_BLOCK_SIZE)]
    buffer: usize,

    /// Blocks in flight between two stages
    #[arg(long, default_value_t = DEFAULT_QUEUE_DEPTH)]
    queue_depth: usize,
}

impl IoArgs {
    fn pipeline_config(&self) -> Result<PipelineConfig> {
        let config = PipelineConfig::new(self.buffer, self.queue_depth);
        config.validate()?;
        Ok(config)
    }

    /// Opens the input with `elements` wire elements per block.
    fn reader<T: WireSample>(&self, elements: usize) -> Result<BlockRead<Box<dyn Read + Send>, T>> {
        BlockRead::open(self.input.as_deref(), elements)
    }
}

#[derive(Args, Debug)]
struct DecimatorArgs {
    /// Input sample rate in Hz
    #[arg(long)]
    rate: f64,

    /// Integer decimation factor
    #[arg(long)]
    factor: usize,

    /// Number of FIR taps
    #[arg(long, default_value_t = 63)]
    taps: usize,

    /// Stopband attenuation in dB
    #[arg(long, default_value_t = DEFAULT_STOPBAND_DB)]
    stopband: f64,

    /// Cutoff as a fraction of the output rate
    #[arg(long, default_value_t = DEFAULT_CUTOFF_RATIO)]
    cutoff: f64,

    /// Evaluate only the first polyphase branch (legacy behaviour, gain ≈ 1/factor)
    #[arg(long, default_value_t = false)]
    phase_zero_only: bool,
}

impl DecimatorArgs {
    fn config(&self) -> DecimatorConfig {
        let filter = FilterConfig {
            stopband_db: self.stopband,
            cutoff_ratio: self.cutoff,
            ..FilterConfig::default()
        };
        let mode = if self.phase_zero_only {
            PolyphaseMode::PhaseZeroOnly
        } else {
            PolyphaseMode::Commutated
        };
        DecimatorConfig::new(self.rate, self.factor, self.taps)
            .with_filter(filter)
            .with_mode(mode)
    }

    fn build(&self) -> Result<PolyphaseDecimator> {
        let config = self.config();
        let decimator = PolyphaseDecimator::from_config(&config)?;
        info!(
            input_rate = config.sample_rate,
            output_rate = config.output_rate(),
            cutoff_hz = config.cutoff_hz(),
            "decimator configured"
        );
        Ok(decimator)
    }
}

#[derive(Args, Debug)]
struct DemodArgs {
    /// Audio gain applied after the DC blocker
    #[arg(long, default_value_t = DEFAULT_AUDIO_GAIN)]
    gain: f32,

    /// DC blocker pole, in [0, 1)
    #[arg(long, default_value_t = DEFAULT_DC_ALPHA)]
    dc_alpha: f32,

    /// Treat a 0+0j sample as the start of the stream (legacy behaviour)
    #[arg(long, default_value_t = false)]
    zero_sentinel: bool,
}

impl DemodArgs {
    fn config(&self) -> FmConfig {
        FmConfig {
            audio_gain: self.gain,
            dc_alpha: self.dc_alpha,
            start: if self.zero_sentinel {
                StartDetection::ZeroSentinel
            } else {
                StartDetection::Flag
            },
            ..FmConfig::default()
        }
    }

    fn build(&self) -> Result<FmDemodulator> {
        FmDemodulator::from_config(self.config())
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // 0 = WARN (quiet), 1 = INFO, 2 = DEBUG, 3+ = TRACE
    let log_level = match cli.verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        2 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };

    // stdout carries samples, logs go to stderr
    let _ = tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .try_init();

    match run(cli.command) {
        Ok(stats) => {
            for stage in &stats.stages {
                info!(stage = stage.name, blocks = stage.blocks, "stage done");
            }
            for boundary in &stats.boundaries {
                debug!(
                    producer = boundary.producer,
                    buffers = boundary.buffers_allocated,
                    "buffer pool usage"
                );
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: {e}");
            if matches!(e, Error::UnsupportedConversion { .. }) {
                eprintln!("supported conversions: {}", Conversion::supported_list());
            }
            ExitCode::FAILURE
        }
    }
}

fn stdout_writer() -> BufWriter<Stdout> {
    BufWriter::with_capacity(IO_BUFFER_SIZE, std::io::stdout())
}

/// Every configuration is validated here, before any stage thread starts.
fn run(command: Command) -> Result<PipelineStats> {
    match command {
        Command::Convert {
            input_type,
            output_type,
            io,
        } => {
            let conversion = resolve_conversion(&input_type, &output_type)?;
            let config = io.pipeline_config()?;
            let elements = config.block_size * conversion.input_elements_per_sample();
            info!(conversion = ?conversion, block_size = config.block_size, "converting");

            match conversion {
                Conversion::Int8ToComplex64 => {
                    Pipeline::source(config, SOURCE, io.reader::<i8>(elements)?)
                        .then("int8 to complex64", Int8ToComplex)
                        .sink(SINK, stdout_writer())
                        .run()
                }
                Conversion::Uint8ToComplex64 => {
                    Pipeline::source(config, SOURCE, io.reader::<u8>(elements)?)
                        .then("uint8 to complex64", Uint8ToComplex)
                        .sink(SINK, stdout_writer())
                        .run()
                }
                Conversion::Float32ToInt16 => {
                    Pipeline::source(config, SOURCE, io.reader::<f32>(elements)?)
                        .then("float32 to int16", Float32ToInt16)
                        .sink(SINK, stdout_writer())
                        .run()
                }
            }
        }
        Command::Decimate { decimator, io } => {
            let decimator = decimator.build()?;
            let config = io.pipeline_config()?;
            Pipeline::source(
                config,
                SOURCE,
                io.reader::<Complex<f32>>(config.block_size)?,
            )
            .then("decimator", decimator)
            .sink(SINK, stdout_writer())
            .run()
        }
        Command::Demod { demod, io } => {
            let demod = demod.build()?;
            let config = io.pipeline_config()?;
            Pipeline::source(
                config,
                SOURCE,
                io.reader::<Complex<f32>>(config.block_size)?,
            )
            .then("fm demodulator", demod)
            .sink(SINK, stdout_writer())
            .run()
        }
        Command::Fm {
            input_type,
            decimator,
            demod,
            io,
        } => {
            let format = fm_input_format(&input_type)?;
            let decimator = decimator.build()?;
            let demod = demod.build()?;
            let config = io.pipeline_config()?;
            // Two wire elements (I, Q) per complex sample
            let elements = config.block_size * 2;

            match format {
                SampleFormat::Int8 => Pipeline::source(config, SOURCE, io.reader::<i8>(elements)?)
                    .then("int8 to complex64", Int8ToComplex)
                    .then("decimator", decimator)
                    .then("fm demodulator", demod)
                    .sink(SINK, stdout_writer())
                    .run(),
                _ => Pipeline::source(config, SOURCE, io.reader::<u8>(elements)?)
                    .then("uint8 to complex64", Uint8ToComplex)
                    .then("decimator", decimator)
                    .then("fm demodulator", demod)
                    .sink(SINK, stdout_writer())
                    .run(),
            }
        }
    }
}

/// Unknown type names are reported like unsupported pairs.
fn resolve_conversion(input: &str, output: &str) -> Result<Conversion> {
    match (input.parse::<SampleFormat>(), output.parse::<SampleFormat>()) {
        (Ok(i), Ok(o)) => Conversion::resolve(i, o),
        _ => Err(Error::UnsupportedConversion {
            input: input.to_string(),
            output: output.to_string(),
        }),
    }
}

fn fm_input_format(input: &str) -> Result<SampleFormat> {
    match input.parse::<SampleFormat>()? {
        format @ (SampleFormat::Int8 | SampleFormat::Uint8) => Ok(format),
        other => Err(Error::config(format!(
            "fm input must be int8 or uint8, got {other}"
        ))),
    }
}

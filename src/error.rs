//! Error handling for the sdrpipe library
//!
//! This module provides a unified error type for every fallible operation in
//! the library: stream I/O, block alignment, configuration and pipeline
//! coordination. Numeric guard conditions inside the DSP blocks (division
//! guards, output clipping) are handled locally and never show up here.

use std::io;

use thiserror::Error;

/// A specialized Result type for sdrpipe operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for sdrpipe operations
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error raised by a pipeline stage or reader
    #[error("{stage}: I/O error: {source}")]
    Io {
        stage: &'static str,
        #[source]
        source: io::Error,
    },

    /// The stream ended in the middle of a block
    #[error("{stage}: truncated input, expected {expected} bytes, got {got}")]
    TruncatedBlock {
        stage: &'static str,
        expected: usize,
        got: usize,
    },

    /// The requested input/output sample type pair has no converter
    #[error("unsupported conversion: {input} -> {output}")]
    UnsupportedConversion { input: String, output: String },

    /// A configuration value is out of its valid range
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The stage stopped because a sibling stage failed
    #[error("{stage}: cancelled")]
    Cancelled { stage: &'static str },

    /// A stage worker thread panicked
    #[error("{stage}: worker panicked")]
    StagePanicked { stage: String },

    /// Generic error with custom message
    #[error("{0}")]
    Other(String),
}

impl From<io::Error> for Error {
    fn from(source: io::Error) -> Self {
        Error::Io {
            stage: "io",
            source,
        }
    }
}

impl From<String> for Error {
    fn from(msg: String) -> Self {
        Error::Other(msg)
    }
}

impl From<&str> for Error {
    fn from(msg: &str) -> Self {
        Error::Other(msg.to_string())
    }
}

impl Error {
    /// Create an I/O error tagged with the stage and direction that failed
    pub fn io(stage: &'static str, source: io::Error) -> Self {
        Error::Io { stage, source }
    }

    /// Create a configuration error with a custom message
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Error::InvalidConfig(msg.into())
    }

    /// Create a generic error with a custom message
    pub fn other<S: Into<String>>(msg: S) -> Self {
        Error::Other(msg.into())
    }

    /// True when this error only reports that a sibling stage failed first.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Error::Cancelled { .. })
    }
}

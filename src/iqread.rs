//! Block-aligned sample readers.
//!
//! This module reads raw little-endian sample streams (files, standard input,
//! TCP) as a sequence of fixed-size blocks. Both readers enforce strict block
//! alignment:
//! - a clean end of stream exactly at a block boundary ends the sequence,
//! - a trailing partial block is reported as [`Error::TruncatedBlock`] and is
//!   never zero-padded or silently dropped.
//!
//! [`BlockRead`] is a synchronous `Iterator`; [`AsyncBlockRead`] is the same
//! contract as a `futures::Stream` on top of tokio I/O.
use std::io::{ErrorKind, Read};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::task::{Context, Poll};

use futures::Stream;
use tokio::io::{AsyncRead, ReadBuf};

use crate::error::{Error, Result};
use crate::{WireSample, decode_samples};

/// Read buffer size for stdin and files, matching the 1 MiB stdio buffers.
pub const IO_BUFFER_SIZE: usize = 1 << 20;

/**
 * Synchronous block reader
 */
pub struct BlockRead<R: Read, T> {
    reader: R,
    bytes: Vec<u8>,
    label: &'static str,
    _sample: PhantomData<fn() -> T>,
}

impl<R: Read, T: WireSample> BlockRead<R, T> {
    /// Wraps a reader yielding blocks of `block_size` elements of `T`.
    ///
    /// `label` names the reader in error messages ("stdin reader", ...).
    pub fn new(reader: R, block_size: usize, label: &'static str) -> Self {
        Self {
            reader,
            bytes: vec![0u8; block_size * T::SIZE],
            label,
            _sample: PhantomData,
        }
    }

    /// Number of elements per block.
    pub fn block_size(&self) -> usize {
        self.bytes.len() / T::SIZE
    }

    /// Reads the next whole block, appending its samples to `out`.
    ///
    /// Returns `Ok(false)` on a clean end of stream at a block boundary.
    pub fn read_block(&mut self, out: &mut Vec<T>) -> Result<bool> {
        let mut filled = 0;
        while filled < self.bytes.len() {
            match self.reader.read(&mut self.bytes[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(Error::io(self.label, e)),
            }
        }

        if filled == 0 {
            return Ok(false);
        }
        if filled < self.bytes.len() {
            return Err(Error::TruncatedBlock {
                stage: self.label,
                expected: self.bytes.len(),
                got: filled,
            });
        }
        decode_samples(&self.bytes, out);
        Ok(true)
    }
}

impl<T: WireSample> BlockRead<std::io::BufReader<std::fs::File>, T> {
    /// Opens a file; a leading `~` is expanded to the home directory.
    pub fn from_file<P: AsRef<Path>>(path: P, block_size: usize) -> Result<Self> {
        let path = expanduser(path.as_ref().to_path_buf());
        let file = std::fs::File::open(&path).map_err(|e| Error::io("file reader", e))?;
        let reader = std::io::BufReader::with_capacity(IO_BUFFER_SIZE, file);
        Ok(Self::new(reader, block_size, "file reader"))
    }
}

impl<T: WireSample> BlockRead<std::io::BufReader<std::io::Stdin>, T> {
    pub fn from_stdin(block_size: usize) -> Self {
        let reader = std::io::BufReader::with_capacity(IO_BUFFER_SIZE, std::io::stdin());
        Self::new(reader, block_size, "stdin reader")
    }
}

impl<T: WireSample> BlockRead<Box<dyn Read + Send>, T> {
    /// Opens `path`, or standard input when no path is given.
    pub fn open(path: Option<&Path>, block_size: usize) -> Result<Self> {
        let Some(path) = path else {
            let stdin = std::io::BufReader::with_capacity(IO_BUFFER_SIZE, std::io::stdin());
            return Ok(Self::new(Box::new(stdin), block_size, "stdin reader"));
        };
        let file = std::fs::File::open(expanduser(path.to_path_buf()))
            .map_err(|e| Error::io("file reader", e))?;
        let reader = std::io::BufReader::with_capacity(IO_BUFFER_SIZE, file);
        Ok(Self::new(Box::new(reader), block_size, "file reader"))
    }
}

impl<R: Read, T: WireSample> Iterator for BlockRead<R, T> {
    type Item = Result<Vec<T>>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut samples = Vec::with_capacity(self.block_size());
        match self.read_block(&mut samples) {
            Ok(true) => Some(Ok(samples)),
            Ok(false) => None,
            Err(e) => Some(Err(e)),
        }
    }
}

/**
 * Asynchronous block reader
 */
pub struct AsyncBlockRead<R: AsyncRead + Unpin, T> {
    reader: R,
    bytes: Vec<u8>,
    /// Bytes of the current block received so far, kept across `Pending`
    filled: usize,
    done: bool,
    label: &'static str,
    _sample: PhantomData<fn() -> T>,
}

impl<R: AsyncRead + Unpin, T: WireSample> AsyncBlockRead<R, T> {
    pub fn new(reader: R, block_size: usize, label: &'static str) -> Self {
        Self {
            reader,
            bytes: vec![0u8; block_size * T::SIZE],
            filled: 0,
            done: false,
            label,
            _sample: PhantomData,
        }
    }
}

impl<T: WireSample> AsyncBlockRead<tokio::io::BufReader<tokio::fs::File>, T> {
    pub async fn from_file<P: AsRef<Path>>(path: P, block_size: usize) -> Result<Self> {
        let path = expanduser(path.as_ref().to_path_buf());
        let file = tokio::fs::File::open(path)
            .await
            .map_err(|e| Error::io("file reader", e))?;
        let reader = tokio::io::BufReader::with_capacity(IO_BUFFER_SIZE, file);
        Ok(Self::new(reader, block_size, "file reader"))
    }
}

impl<T: WireSample> AsyncBlockRead<tokio::io::BufReader<tokio::io::Stdin>, T> {
    pub fn from_stdin(block_size: usize) -> Self {
        let reader = tokio::io::BufReader::with_capacity(IO_BUFFER_SIZE, tokio::io::stdin());
        Self::new(reader, block_size, "stdin reader")
    }
}

impl<T: WireSample> AsyncBlockRead<tokio::io::BufReader<tokio::net::TcpStream>, T> {
    pub async fn from_tcp(address: &str, port: u16, block_size: usize) -> Result<Self> {
        let stream = tokio::net::TcpStream::connect((address, port))
            .await
            .map_err(|e| Error::io("tcp reader", e))?;
        let reader = tokio::io::BufReader::new(stream);
        Ok(Self::new(reader, block_size, "tcp reader"))
    }
}

impl<R: AsyncRead + Unpin, T: WireSample> Stream for AsyncBlockRead<R, T> {
    type Item = Result<Vec<T>>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.done {
            return Poll::Ready(None);
        }

        while this.filled < this.bytes.len() {
            let mut read_buf = ReadBuf::new(&mut this.bytes[this.filled..]);
            match Pin::new(&mut this.reader).poll_read(cx, &mut read_buf) {
                Poll::Ready(Ok(())) => {
                    let n = read_buf.filled().len();
                    if n == 0 {
                        break;
                    }
                    this.filled += n;
                }
                Poll::Ready(Err(e)) if e.kind() == ErrorKind::Interrupted => continue,
                Poll::Ready(Err(e)) => {
                    this.done = true;
                    return Poll::Ready(Some(Err(Error::io(this.label, e))));
                }
                Poll::Pending => return Poll::Pending,
            }
        }

        let got = std::mem::take(&mut this.filled);
        if got == 0 {
            this.done = true;
            return Poll::Ready(None);
        }
        if got < this.bytes.len() {
            this.done = true;
            return Poll::Ready(Some(Err(Error::TruncatedBlock {
                stage: this.label,
                expected: this.bytes.len(),
                got,
            })));
        }

        let mut samples = Vec::with_capacity(this.bytes.len() / T::SIZE);
        decode_samples(&this.bytes, &mut samples);
        Poll::Ready(Some(Ok(samples)))
    }
}

fn expanduser(path: PathBuf) -> PathBuf {
    // Check if the path starts with "~"
    if let Some(stripped) = path.to_str().and_then(|p| p.strip_prefix("~"))
        && let Some(home_dir) = dirs::home_dir()
    {
        return home_dir.join(stripped.trim_start_matches('/'));
    }
    path
}

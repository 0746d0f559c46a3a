//! Deadline-aware reader for PTY output.
//!
//! A PTY master read blocks with no way to time out. The reader runs the
//! blocking reads in a helper thread that forwards chunks through a channel,
//! so the session can wait on the channel with a deadline instead.

use std::any::Any;
use std::io::Read;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, error, trace};

use crate::error::AdbPtyError;
use crate::Result;

/// Size of a single read from the PTY master.
pub const READ_CHUNK_SIZE: usize = 4096;

/// A point in time after which blocking reads give up.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    at: Instant,
    budget: Duration,
}

impl Deadline {
    /// Deadline `budget` from now.
    pub fn after(budget: Duration) -> Self {
        Self {
            at: Instant::now() + budget,
            budget,
        }
    }

    /// Time left, or `None` once the deadline has passed.
    pub fn remaining(&self) -> Option<Duration> {
        self.at
            .checked_duration_since(Instant::now())
            .filter(|d| !d.is_zero())
    }

    /// Whether the deadline has passed.
    pub fn is_expired(&self) -> bool {
        self.remaining().is_none()
    }

    /// The error reported when this deadline expires.
    pub fn timeout_error(&self) -> AdbPtyError {
        AdbPtyError::Timeout(self.budget)
    }
}

/// Buffered, deadline-aware view over a blocking byte source.
///
/// `read_some` hands out at most one forwarded chunk per call, so a short
/// read on the underlying source stays visible as a short read here.
pub struct ChunkReader {
    rx: Receiver<Vec<u8>>,
    pending: Vec<u8>,
    /// Handles whose lifetime must cover the reader (e.g. the PTY master).
    _keepalive: Option<Box<dyn Any + Send>>,
}

impl ChunkReader {
    /// Start forwarding `reader` in [`READ_CHUNK_SIZE`] chunks.
    pub fn spawn<R: Read + Send + 'static>(reader: R) -> Result<Self> {
        Self::with_chunk_size(reader, READ_CHUNK_SIZE)
    }

    /// Start forwarding `reader` with a custom chunk size.
    pub fn with_chunk_size<R: Read + Send + 'static>(
        mut reader: R,
        chunk_size: usize,
    ) -> Result<Self> {
        let (tx, rx) = mpsc::channel::<Vec<u8>>();

        thread::Builder::new()
            .name("adb-pty-reader".into())
            .spawn(move || {
                let mut buf = vec![0u8; chunk_size];

                loop {
                    match reader.read(&mut buf) {
                        Ok(0) => {
                            debug!("PTY reader: EOF");
                            break;
                        }
                        Ok(n) => {
                            trace!("PTY reader: read {} bytes", n);
                            if tx.send(buf[..n].to_vec()).is_err() {
                                debug!("PTY reader: channel closed");
                                break;
                            }
                        }
                        Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                        Err(e) => {
                            // EIO on Unix means every slave descriptor was closed
                            #[cfg(unix)]
                            if e.raw_os_error() == Some(libc::EIO) {
                                debug!("PTY reader: PTY closed (EIO)");
                                break;
                            }

                            error!("PTY reader error: {}", e);
                            break;
                        }
                    }
                }
            })?;

        Ok(Self {
            rx,
            pending: Vec::new(),
            _keepalive: None,
        })
    }

    /// Keep `handle` alive for as long as this reader exists.
    pub fn keep_alive(mut self, handle: Box<dyn Any + Send>) -> Self {
        self._keepalive = Some(handle);
        self
    }

    /// Read up to `max` bytes, waiting until data arrives or `deadline` passes.
    ///
    /// Never returns an empty vector; end-of-stream is reported as
    /// [`AdbPtyError::ChannelClosed`].
    pub fn read_some(&mut self, max: usize, deadline: Deadline) -> Result<Vec<u8>> {
        if self.pending.is_empty() {
            self.pending = self.recv(deadline)?;
        }

        let n = max.min(self.pending.len());
        Ok(self.pending.drain(..n).collect())
    }

    /// Read a single byte.
    pub fn read_byte(&mut self, deadline: Deadline) -> Result<u8> {
        let byte = self.read_some(1, deadline)?;
        Ok(byte[0])
    }

    /// Number of bytes received but not yet handed out.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    fn recv(&self, deadline: Deadline) -> Result<Vec<u8>> {
        loop {
            let remaining = deadline.remaining().ok_or_else(|| deadline.timeout_error())?;
            match self.rx.recv_timeout(remaining) {
                Ok(chunk) if chunk.is_empty() => continue,
                Ok(chunk) => return Ok(chunk),
                Err(RecvTimeoutError::Timeout) => return Err(deadline.timeout_error()),
                Err(RecvTimeoutError::Disconnected) => return Err(AdbPtyError::ChannelClosed),
            }
        }
    }
}

impl std::fmt::Debug for ChunkReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChunkReader")
            .field("pending", &self.pending.len())
            .finish_non_exhaustive()
    }
}

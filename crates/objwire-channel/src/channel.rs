use std::io::{ErrorKind, Read, Write};
use std::time::Duration;

use bytes::{Buf, Bytes, BytesMut};
use tracing::trace;

use crate::error::{ChannelError, Result};
use crate::stream::WireStream;

const READ_CHUNK_SIZE: usize = 8 * 1024;
const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;

/// Pushback is only needed for single-byte lookahead; anything deeper is a
/// bug in the layer above.
const DEFAULT_MAX_PUSHBACK: usize = 8;

/// Configuration for a [`ByteChannel`].
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    /// Read timeout applied to the underlying stream at construction.
    pub read_timeout: Option<Duration>,
    /// Upper bound on the pushback stack.
    pub max_pushback: usize,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            read_timeout: None,
            max_pushback: DEFAULT_MAX_PUSHBACK,
        }
    }
}

/// A blocking duplex byte channel with single-byte pushback.
///
/// Reads are buffered internally; callers always get exactly the bytes they
/// asked for or a [`ChannelError::Truncated`]. Bytes handed back via
/// [`ByteChannel::unread`] are returned by the next read, stacked
/// last-unread-first.
pub struct ByteChannel<T> {
    inner: T,
    buf: BytesMut,
    pushback: Vec<u8>,
    config: ChannelConfig,
}

impl<T> ByteChannel<T> {
    /// Wrap a stream with default configuration.
    pub fn new(inner: T) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            pushback: Vec::new(),
            config: ChannelConfig::default(),
        }
    }

    /// Push bytes back onto the front of the stream.
    ///
    /// A later read returns `bytes` in order, before anything else. Multiple
    /// unreads compose as a stack. Only single-byte lookahead is part of the
    /// channel contract; unreading more than was consumed is not supported.
    ///
    /// # Panics
    ///
    /// Panics when the pushback stack would exceed `max_pushback`. Only
    /// bytes already read can be unread, so this is a caller bug, never a
    /// condition peer input can produce.
    pub fn unread(&mut self, bytes: &[u8]) {
        assert!(
            self.pushback.len() + bytes.len() <= self.config.max_pushback,
            "pushback exceeds lookahead bound"
        );
        // Reversed so that pops come out in the order given.
        self.pushback.extend(bytes.iter().rev());
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the channel and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }
}

impl<T: Read> ByteChannel<T> {
    /// Read exactly `n` bytes, blocking until they arrive.
    ///
    /// EOF before `n` bytes is [`ChannelError::Truncated`].
    pub fn read_exact_bytes(&mut self, n: usize) -> Result<Bytes> {
        let mut out = BytesMut::with_capacity(n);
        while out.len() < n && !self.pushback.is_empty() {
            // Pushback bytes first, newest unread on top.
            let byte = self.pushback.pop().unwrap_or_default();
            out.extend_from_slice(&[byte]);
        }
        while out.len() < n {
            if self.buf.is_empty() {
                self.fill_buf(n - out.len())?;
            }
            let take = (n - out.len()).min(self.buf.len());
            out.extend_from_slice(&self.buf[..take]);
            self.buf.advance(take);
        }
        Ok(out.freeze())
    }

    /// Read a single byte.
    pub fn read_byte(&mut self) -> Result<u8> {
        if let Some(byte) = self.pushback.pop() {
            return Ok(byte);
        }
        if self.buf.is_empty() {
            self.fill_buf(1)?;
        }
        let byte = self.buf[0];
        self.buf.advance(1);
        Ok(byte)
    }

    /// Look at the next byte without consuming it.
    pub fn peek(&mut self) -> Result<u8> {
        let byte = self.read_byte()?;
        self.unread(&[byte]);
        Ok(byte)
    }

    fn fill_buf(&mut self, missing: usize) -> Result<()> {
        let mut chunk = [0u8; READ_CHUNK_SIZE];
        loop {
            match self.inner.read(&mut chunk) {
                Ok(0) => {
                    trace!(missing, "stream closed mid-read");
                    return Err(ChannelError::Truncated { missing });
                }
                Ok(read) => {
                    self.buf.extend_from_slice(&chunk[..read]);
                    return Ok(());
                }
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(ChannelError::Io(err)),
            }
        }
    }
}

impl<T: Write> ByteChannel<T> {
    /// Write all bytes to the stream.
    pub fn write_all(&mut self, bytes: &[u8]) -> Result<()> {
        let mut offset = 0usize;
        while offset < bytes.len() {
            match self.inner.write(&bytes[offset..]) {
                Ok(0) => {
                    return Err(ChannelError::Truncated {
                        missing: bytes.len() - offset,
                    })
                }
                Ok(n) => offset += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(ChannelError::Io(err)),
            }
        }
        Ok(())
    }

    /// Flush the underlying stream.
    pub fn flush(&mut self) -> Result<()> {
        loop {
            match self.inner.flush() {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(ChannelError::Io(err)),
            }
        }
    }
}

impl<T: WireStream> ByteChannel<T> {
    /// Wrap a stream and apply the configured read timeout.
    pub fn with_config(mut inner: T, config: ChannelConfig) -> Result<Self> {
        inner.set_read_timeout(config.read_timeout)?;
        Ok(Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            pushback: Vec::new(),
            config,
        })
    }

    /// Change the read timeout on the underlying stream.
    pub fn set_read_timeout(&mut self, timeout: Option<Duration>) -> Result<()> {
        self.inner.set_read_timeout(timeout)?;
        Ok(())
    }

    /// Flush and shut down the write half, ending the session.
    pub fn close(&mut self) -> Result<()> {
        self.flush()?;
        self.inner.shutdown_write()?;
        Ok(())
    }
}

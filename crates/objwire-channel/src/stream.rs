use std::io::{Read, Write};
use std::os::unix::net::UnixStream;
use std::path::Path;
use std::time::Duration;

use tracing::info;

use crate::error::Result;

/// A duplex stream usable underneath a [`crate::ByteChannel`].
///
/// The protocol core only needs read/write/flush plus the ability to bound a
/// blocking read during a liveness probe. How the stream was constructed
/// (connected socket, spawned-process pipes) is the caller's business.
pub trait WireStream: Read + Write {
    /// Bound subsequent blocking reads. `None` removes the bound.
    ///
    /// Streams that cannot time out ignore the request; the liveness probe
    /// then simply blocks until the peer answers.
    fn set_read_timeout(&mut self, _timeout: Option<Duration>) -> std::io::Result<()> {
        Ok(())
    }

    /// Shut down the write direction, signalling end-of-session to the peer.
    fn shutdown_write(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl WireStream for UnixStream {
    fn set_read_timeout(&mut self, timeout: Option<Duration>) -> std::io::Result<()> {
        UnixStream::set_read_timeout(self, timeout)
    }

    fn shutdown_write(&mut self) -> std::io::Result<()> {
        self.shutdown(std::net::Shutdown::Write)
    }
}

/// Joins an independent read half and write half into one duplex stream.
///
/// This is how a spawned compute process is wired up: its stdout becomes the
/// read half and its stdin the write half.
#[derive(Debug)]
pub struct Duplex<R, W> {
    reader: R,
    writer: W,
}

impl<R: Read, W: Write> Duplex<R, W> {
    pub fn new(reader: R, writer: W) -> Self {
        Self { reader, writer }
    }

    /// Consume the duplex and return both halves.
    pub fn into_parts(self) -> (R, W) {
        (self.reader, self.writer)
    }

    /// Borrow the read half.
    pub fn reader(&self) -> &R {
        &self.reader
    }

    /// Borrow the write half.
    pub fn writer(&self) -> &W {
        &self.writer
    }
}

impl<R: Read, W: Write> Read for Duplex<R, W> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.reader.read(buf)
    }
}

impl<R: Read, W: Write> Write for Duplex<R, W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.writer.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.writer.flush()
    }
}

impl<R: Read, W: Write> WireStream for Duplex<R, W> {}

/// Connect to a server listening on a Unix domain socket.
pub fn connect(path: impl AsRef<Path>) -> Result<UnixStream> {
    let path = path.as_ref();
    let stream = UnixStream::connect(path)?;
    info!(?path, "connected to remote object server");
    Ok(stream)
}

/// A locally connected stream pair, handy for in-process servers and tests.
pub fn pipe() -> Result<(UnixStream, UnixStream)> {
    Ok(UnixStream::pair()?)
}

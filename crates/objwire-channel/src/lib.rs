//! Duplex byte channel for the objwire remote-object protocol.
//!
//! This is the lowest layer of objwire. It provides [`ByteChannel`], a
//! blocking byte source/sink with single-byte pushback, over anything that
//! implements [`WireStream`] (Unix domain sockets, spawned-process pipes,
//! in-memory test doubles).

pub mod channel;
pub mod error;
pub mod stream;

pub use channel::{ByteChannel, ChannelConfig};
pub use error::{ChannelError, Result};
pub use stream::{connect, pipe, Duplex, WireStream};

#[cfg(unix)]
pub use std::os::unix::net::UnixStream;

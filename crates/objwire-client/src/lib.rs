//! Synchronous request/response sessions against a remote object server.
//!
//! One [`Session`] owns one duplex channel, one pointer table and one id
//! allocator; nothing is shared between sessions. A call blocks the calling
//! thread until its full response, sideband frames included, has been read.
//! Parallelism means running several independent sessions.

pub mod error;
pub mod idalloc;
pub mod session;
pub mod sideband;

pub use error::{CallError, Result};
pub use objwire_codec::Value;
pub use idalloc::IdAllocator;
pub use session::{RemoteHandle, Session, SessionConfig};
pub use sideband::{LogFrame, ProgressFrame, SidebandHandler, TracingSideband};

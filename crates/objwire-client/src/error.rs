use std::time::Duration;

use objwire_channel::ChannelError;
use objwire_codec::DecodeError;

/// Errors that can occur during a remote call.
#[derive(Debug, thiserror::Error)]
pub enum CallError {
    /// Channel failure outside a decode, likely a dead peer.
    #[error(transparent)]
    Channel(#[from] ChannelError),

    /// A response frame did not decode.
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// A frame started with something other than `*` or `!`. The connection
    /// state afterwards is untrusted.
    #[error("protocol violation: frame starts with {found:#04x}")]
    Protocol { found: u8 },

    /// Fewer or more result values than the `!R` frame declared.
    #[error("result count mismatch: expected {expected}, got {got}")]
    ResultCountMismatch { expected: usize, got: usize },

    /// The server reported an error. This is an expected failure mode that
    /// callers routinely catch; the session remains usable.
    #[error("remote error: {0}")]
    Remote(String),

    /// The liveness probe did not answer in time.
    #[error("no answer within {0:?}")]
    Timeout(Duration),

    /// An object id was claimed twice, or was the reserved null id.
    #[error("object id {0} is unavailable")]
    IdUnavailable(u64),
}

impl CallError {
    /// True for server-reported errors, the only kind meant to be handled
    /// rather than propagated.
    pub fn is_remote(&self) -> bool {
        matches!(self, CallError::Remote(_))
    }
}

pub type Result<T> = std::result::Result<T, CallError>;

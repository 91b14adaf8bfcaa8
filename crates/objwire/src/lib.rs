//! Client-side plumbing for remote-object servers speaking a hybrid
//! text/binary wire protocol.
//!
//! objwire talks to a server that owns a registry of live objects: the
//! client constructs them, calls their methods, and receives typed results
//! mixed with out-of-band log and progress notifications.
//!
//! # Crate Structure
//!
//! - [`channel`] — Byte-level duplex channel with single-byte lookahead
//! - [`codec`] — Value model, text lexer, binary codec, pointer graph,
//!   object decoding and serialization
//! - [`client`] — Session management: remote handles, calls, sideband

/// Re-export channel types.
pub mod channel {
    pub use objwire_channel::*;
}

/// Re-export codec types.
pub mod codec {
    pub use objwire_codec::*;
}

/// Re-export client types.
pub mod client {
    pub use objwire_client::*;
}

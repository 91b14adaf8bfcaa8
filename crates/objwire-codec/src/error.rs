use objwire_channel::ChannelError;

/// Errors that can occur while decoding or encoding wire values.
///
/// None of these are retried automatically. Apart from channel I/O failure,
/// a decode error means the current frame is malformed and the connection
/// state afterwards is untrusted.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    /// The underlying channel failed or was closed mid-frame.
    #[error(transparent)]
    Channel(#[from] ChannelError),

    /// A specific byte was expected and something else arrived.
    #[error("unexpected byte {found:#04x} (expected {expected})")]
    UnexpectedByte { found: u8, expected: &'static str },

    /// The leading byte of a value is not a known type code.
    #[error("unexpected type tag {0:#04x}")]
    UnexpectedTag(u8),

    /// Redefinition of a resolved pointer id, reference to an unresolved id,
    /// or a missing `->` after a fresh id.
    #[error("pointer protocol violation: {0}")]
    PointerViolation(String),

    /// The token at this position does not parse as an integer.
    #[error("expected an integer, got {0:?}")]
    ExpectedInt(String),

    /// The token at this position does not parse as a number.
    #[error("expected a number, got {0:?}")]
    ExpectedFloat(String),

    /// A word or quoted string contained invalid UTF-8.
    #[error("invalid utf-8 in {0}")]
    BadUtf8(&'static str),

    /// A construct the codec deliberately does not handle.
    #[error("unsupported construct: {0}")]
    Unsupported(&'static str),

    /// Structurally valid syntax with impossible contents, such as a vector
    /// slice outside the bounds of its storage.
    #[error("malformed value: {0}")]
    Malformed(String),
}

pub type Result<T> = std::result::Result<T, DecodeError>;

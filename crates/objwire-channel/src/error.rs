/// Errors that can occur on the byte channel.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    /// The stream reached EOF before the requested bytes arrived.
    /// The connection is likely dead.
    #[error("channel truncated (EOF with {missing} byte(s) outstanding)")]
    Truncated { missing: usize },

    /// An I/O error occurred while reading or writing.
    #[error("channel I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ChannelError {
    /// True when the error came from a read timeout on the stream.
    pub fn is_timeout(&self) -> bool {
        match self {
            ChannelError::Io(err) => matches!(
                err.kind(),
                std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
            ),
            ChannelError::Truncated { .. } => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, ChannelError>;

use crate::traits::LinkId;

/// Errors that can occur in die transport operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// No link with this id has been opened.
    #[error("unknown link {0}")]
    UnknownLink(LinkId),

    /// The link was closed (die disconnected or went to sleep).
    #[error("link {0} is closed")]
    Closed(LinkId),

    /// The underlying stack refused the write.
    #[error("send to {link} failed: {reason}")]
    SendFailed { link: LinkId, reason: String },

    /// An inbound callback was already registered.
    #[error("inbound callback already registered")]
    AlreadyRegistered,

    /// Bytes arrived before anyone registered to receive them.
    #[error("no inbound callback registered")]
    NoReceiver,

    /// An I/O error occurred on the transport.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, TransportError>;

use pixelroll_frame::FrameError;
use pixelroll_transport::LinkId;

/// Errors that can occur while tracking dice and roll sessions.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Frame-level error (malformed inbound frame, invalid command field).
    #[error("frame error: {0}")]
    Frame(#[from] FrameError),

    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] pixelroll_transport::TransportError),

    /// A status frame arrived on a link whose die has not identified itself.
    #[error("no identity seen on {link}")]
    UnknownDevice { link: LinkId },

    /// Session configuration rejected.
    #[error("invalid session config: {0}")]
    InvalidConfig(String),

    /// The roll monitor has shut down.
    #[error("roll monitor closed")]
    MonitorClosed,
}

impl SessionError {
    /// Whether the error only concerns one inbound frame.
    ///
    /// Such frames are dropped and processing continues.
    pub fn is_dropped_frame(&self) -> bool {
        matches!(
            self,
            Self::Frame(FrameError::Malformed(_)) | Self::UnknownDevice { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, SessionError>;

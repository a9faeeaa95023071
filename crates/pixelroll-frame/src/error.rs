/// Why an inbound buffer could not be decoded.
///
/// Malformed frames are dropped by the caller; they are never fatal.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MalformedFrame {
    /// The notification carried no bytes.
    #[error("empty frame")]
    Empty,

    /// The buffer is shorter than the layout of its message type.
    #[error("{message} frame too short ({len} bytes, need {min})")]
    TooShort {
        message: &'static str,
        len: usize,
        min: usize,
    },

    /// Byte 0 is not an inbound message type we understand.
    #[error("unknown message type {0}")]
    UnknownMessageType(u8),
}

/// Errors that can occur during frame encoding/decoding.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The inbound buffer is not a valid frame.
    #[error("malformed frame: {0}")]
    Malformed(#[from] MalformedFrame),

    /// An outbound command field does not fit its wire width.
    #[error("invalid command field `{field}`: {value} exceeds maximum {max}")]
    InvalidCommandField {
        field: &'static str,
        value: u64,
        max: u64,
    },

    /// The transport refused an encoded command.
    #[error("transport error: {0}")]
    Transport(#[from] pixelroll_transport::TransportError),
}

pub type Result<T> = std::result::Result<T, FrameError>;

/// Errors that can occur during frame encoding/decoding.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The frame header contains an invalid magic number.
    #[error("invalid frame magic (expected 0x4358 \"CX\")")]
    InvalidMagic,

    /// The frame header carries a kind byte this codec does not know.
    #[error("unknown frame kind 0x{0:02x}")]
    UnknownKind(u8),

    /// The payload exceeds the configured maximum size.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// A text frame or open label is not valid UTF-8.
    #[error("text payload is not valid UTF-8")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),

    /// An open frame arrived where a data message was expected.
    #[error("unexpected open frame in message stream")]
    UnexpectedOpen,

    /// A text message is neither the terminator nor a valid control message.
    #[error("invalid control message: {0}")]
    InvalidControl(#[source] serde_json::Error),

    /// The control message could not be serialized.
    #[error("control message encoding failed: {0}")]
    ControlEncode(#[source] serde_json::Error),

    /// An I/O error occurred while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The connection was closed before a complete frame was received.
    #[error("connection closed (incomplete frame)")]
    ConnectionClosed,
}

pub type Result<T> = std::result::Result<T, FrameError>;

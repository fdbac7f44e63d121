//! The transfer framing model.
//!
//! One payload crosses the channel as:
//! 1. a Control message (JSON text) announcing `totalBytes`,
//! 2. zero or more binary Chunks in ascending offset order,
//! 3. the Terminator text sentinel.
//!
//! The three shapes are told apart by message shape alone: binary is always a
//! chunk, the exact sentinel string is the terminator, and any other text must
//! parse as a control message.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::{FrameError, Result};
use crate::message::ChannelMessage;

/// Largest chunk the sender emits, in bytes.
pub const MAX_CHUNK_SIZE: usize = 65535;

/// Buffered byte count above which the sender stops handing items to the
/// channel and waits for the buffered-amount-low event.
pub const BUFFER_THRESHOLD: usize = 65535;

/// Text sentinel marking the end of a payload's chunk sequence.
///
/// Sender and receiver both use this constant; there is no other definition.
pub const TERMINATOR: &str = "LDOF7";

/// Announces the size of the payload that follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlMessage {
    /// Total payload length in bytes.
    #[serde(rename = "totalBytes")]
    pub total_bytes: u64,
}

impl ControlMessage {
    /// Control message for a payload of `total_bytes`.
    pub fn new(total_bytes: u64) -> Self {
        Self { total_bytes }
    }
}

/// Sent back by a receiver once a payload reached its sink.
///
/// Travels receiver to sender, so it never meets the transfer decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryReceipt {
    /// Length of the payload the sink accepted.
    #[serde(rename = "receivedBytes")]
    pub received_bytes: u64,
}

impl DeliveryReceipt {
    pub fn new(received_bytes: u64) -> Self {
        Self { received_bytes }
    }

    pub fn encode(&self) -> Result<ChannelMessage> {
        serde_json::to_string(self)
            .map(ChannelMessage::Text)
            .map_err(FrameError::ControlEncode)
    }

    /// Parse a receipt; `None` for binary or any other text.
    pub fn decode(message: &ChannelMessage) -> Option<Self> {
        match message {
            ChannelMessage::Text(text) => serde_json::from_str(text).ok(),
            ChannelMessage::Binary(_) => None,
        }
    }
}

/// One message of the transfer protocol, decoded from its channel shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferMessage {
    /// Payload size announcement; always first.
    Control(ControlMessage),
    /// A contiguous slice of the payload.
    Chunk(Bytes),
    /// End of the chunk sequence; always last.
    Terminator,
}

impl TransferMessage {
    /// Encode into the channel message that carries it.
    pub fn encode(&self) -> Result<ChannelMessage> {
        match self {
            Self::Control(control) => serde_json::to_string(control)
                .map(ChannelMessage::Text)
                .map_err(FrameError::ControlEncode),
            Self::Chunk(data) => Ok(ChannelMessage::Binary(data.clone())),
            Self::Terminator => Ok(ChannelMessage::Text(TERMINATOR.to_string())),
        }
    }

    /// Decode a channel message by its shape.
    pub fn decode(message: ChannelMessage) -> Result<Self> {
        match message {
            ChannelMessage::Binary(data) => Ok(Self::Chunk(data)),
            ChannelMessage::Text(text) if text == TERMINATOR => Ok(Self::Terminator),
            ChannelMessage::Text(text) => serde_json::from_str::<ControlMessage>(&text)
                .map(Self::Control)
                .map_err(FrameError::InvalidControl),
        }
    }

    /// Short name for logs.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Control(_) => "control",
            Self::Chunk(_) => "chunk",
            Self::Terminator => "terminator",
        }
    }
}

impl TryFrom<ChannelMessage> for TransferMessage {
    type Error = FrameError;

    fn try_from(message: ChannelMessage) -> Result<Self> {
        Self::decode(message)
    }
}

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{FrameError, Result};
use crate::message::ChannelMessage;

/// Frame header: magic (2) + length (4) + kind (1) = 7 bytes.
pub const HEADER_SIZE: usize = 7;

/// Magic bytes: "CX" (0x43 0x58).
pub const MAGIC: [u8; 2] = [0x43, 0x58];

/// Default maximum payload size: 16 MiB.
pub const DEFAULT_MAX_PAYLOAD: usize = 16 * 1024 * 1024;

/// What a stream frame carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    /// Channel open announcement; the payload is the channel label.
    Open,
    /// A text channel message.
    Text,
    /// A binary channel message.
    Binary,
}

impl FrameKind {
    /// Wire byte for this kind.
    pub fn as_u8(self) -> u8 {
        match self {
            Self::Open => 0x01,
            Self::Text => 0x02,
            Self::Binary => 0x03,
        }
    }

    /// Parse a wire byte.
    pub fn from_u8(byte: u8) -> Result<Self> {
        match byte {
            0x01 => Ok(Self::Open),
            0x02 => Ok(Self::Text),
            0x03 => Ok(Self::Binary),
            other => Err(FrameError::UnknownKind(other)),
        }
    }
}

/// A decoded stream frame.
#[derive(Debug, Clone)]
pub struct Frame {
    /// What the payload holds.
    pub kind: FrameKind,
    /// The frame payload.
    pub payload: Bytes,
}

impl Frame {
    /// Create a new frame.
    pub fn new(kind: FrameKind, payload: impl Into<Bytes>) -> Self {
        Self {
            kind,
            payload: payload.into(),
        }
    }

    /// Frame announcing a channel with the given label.
    pub fn open(label: &str) -> Self {
        Self::new(FrameKind::Open, Bytes::copy_from_slice(label.as_bytes()))
    }

    /// The total wire size of this frame (header + payload).
    pub fn wire_size(&self) -> usize {
        HEADER_SIZE + self.payload.len()
    }

    /// Convert into the channel message it carries.
    ///
    /// Open frames are not channel messages and are rejected.
    pub fn into_message(self) -> Result<ChannelMessage> {
        match self.kind {
            FrameKind::Binary => Ok(ChannelMessage::Binary(self.payload)),
            FrameKind::Text => Ok(ChannelMessage::Text(String::from_utf8(
                self.payload.to_vec(),
            )?)),
            FrameKind::Open => Err(FrameError::UnexpectedOpen),
        }
    }

    /// Decode the label of an open frame.
    pub fn into_label(self) -> Result<String> {
        if self.kind != FrameKind::Open {
            return Err(FrameError::UnknownKind(self.kind.as_u8()));
        }
        Ok(String::from_utf8(self.payload.to_vec())?)
    }
}

impl From<ChannelMessage> for Frame {
    fn from(message: ChannelMessage) -> Self {
        match message {
            ChannelMessage::Text(text) => Frame::new(FrameKind::Text, Bytes::from(text)),
            ChannelMessage::Binary(data) => Frame::new(FrameKind::Binary, data),
        }
    }
}

/// Encode a frame into the wire format.
///
/// Wire format:
/// ```text
/// ┌──────────────┬───────────┬──────────┬─────────────────┐
/// │ Magic (2B)   │ Length    │ Kind     │ Payload          │
/// │ 0x43 0x58    │ (4B LE)   │ (1B)     │ (Length bytes)   │
/// │ "CX"         │           │          │                  │
/// └──────────────┴───────────┴──────────┴─────────────────┘
/// ```
pub fn encode_frame(kind: FrameKind, payload: &[u8], dst: &mut BytesMut) -> Result<()> {
    if payload.len() > u32::MAX as usize {
        return Err(FrameError::PayloadTooLarge {
            size: payload.len(),
            max: u32::MAX as usize,
        });
    }
    dst.reserve(HEADER_SIZE + payload.len());
    dst.put_slice(&MAGIC);
    dst.put_u32_le(payload.len() as u32);
    dst.put_u8(kind.as_u8());
    dst.put_slice(payload);
    Ok(())
}

/// Decode a frame from a buffer.
///
/// Returns `Ok(None)` if the buffer doesn't contain a complete frame yet.
/// On success, consumes the frame bytes from the buffer.
pub fn decode_frame(src: &mut BytesMut, max_payload: usize) -> Result<Option<Frame>> {
    if src.len() < HEADER_SIZE {
        return Ok(None);
    }

    if src[0..2] != MAGIC {
        return Err(FrameError::InvalidMagic);
    }

    let payload_len = u32::from_le_bytes([src[2], src[3], src[4], src[5]]) as usize;
    let kind = FrameKind::from_u8(src[6])?;

    if payload_len > max_payload {
        return Err(FrameError::PayloadTooLarge {
            size: payload_len,
            max: max_payload,
        });
    }

    let total = HEADER_SIZE + payload_len;
    if src.len() < total {
        return Ok(None);
    }

    src.advance(HEADER_SIZE);
    let payload = src.split_to(payload_len).freeze();

    Ok(Some(Frame { kind, payload }))
}

/// Configuration for the stream frame codec.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Maximum payload size in bytes. Default: 16 MiB.
    pub max_payload_size: usize,
    /// Read timeout for blocking operations.
    pub read_timeout: Option<std::time::Duration>,
    /// Write timeout for blocking operations.
    pub write_timeout: Option<std::time::Duration>,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_payload_size: DEFAULT_MAX_PAYLOAD,
            read_timeout: None,
            write_timeout: None,
        }
    }
}

use std::fmt;

use bytes::Bytes;

/// A discrete message as carried by a channel: either a text block or a
/// binary block.
///
/// The channel preserves message boundaries and order. Nothing about the
/// transfer protocol lives at this level; see [`crate::TransferMessage`].
#[derive(Clone, PartialEq, Eq)]
pub enum ChannelMessage {
    /// A UTF-8 text message.
    Text(String),
    /// A binary message.
    Binary(Bytes),
}

impl ChannelMessage {
    /// Number of bytes this message occupies in a channel send buffer.
    ///
    /// Text counts its UTF-8 encoded length.
    pub fn len(&self) -> usize {
        match self {
            Self::Text(text) => text.len(),
            Self::Binary(data) => data.len(),
        }
    }

    /// Returns true if the message carries no bytes.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns true for binary messages.
    pub fn is_binary(&self) -> bool {
        matches!(self, Self::Binary(_))
    }

    /// Borrow the message bytes regardless of shape.
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Text(text) => text.as_bytes(),
            Self::Binary(data) => data.as_ref(),
        }
    }
}

impl fmt::Debug for ChannelMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(text) => f.debug_tuple("Text").field(text).finish(),
            Self::Binary(data) => f
                .debug_tuple("Binary")
                .field(&format_args!("<{} bytes>", data.len()))
                .finish(),
        }
    }
}

impl From<String> for ChannelMessage {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<&str> for ChannelMessage {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<Bytes> for ChannelMessage {
    fn from(data: Bytes) -> Self {
        Self::Binary(data)
    }
}

impl From<Vec<u8>> for ChannelMessage {
    fn from(data: Vec<u8>) -> Self {
        Self::Binary(Bytes::from(data))
    }
}

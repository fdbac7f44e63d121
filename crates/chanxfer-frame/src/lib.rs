//! Framing for chunked payload transfer over a message channel.
//!
//! Two layers live here:
//! - The transfer framing model: a Control message announcing the payload
//!   size, zero or more binary Chunks, and one Terminator. See [`transfer`].
//! - A stream wire codec that carries channel messages over a byte stream
//!   (used by the socket channel). Every frame is:
//!   - A 2-byte magic number ("CX") for stream synchronization
//!   - A 4-byte little-endian payload length
//!   - A 1-byte message kind (open, text, binary)

pub mod chunk;
pub mod codec;
pub mod error;
pub mod message;
pub mod reader;
pub mod transfer;
pub mod writer;

pub use chunk::{chunk_count, Chunks};
pub use codec::{
    decode_frame, encode_frame, Frame, FrameConfig, FrameKind, DEFAULT_MAX_PAYLOAD, HEADER_SIZE,
};
pub use error::{FrameError, Result};
pub use message::ChannelMessage;
pub use reader::FrameReader;
pub use transfer::{
    ControlMessage, DeliveryReceipt, TransferMessage, BUFFER_THRESHOLD, MAX_CHUNK_SIZE,
    TERMINATOR,
};
pub use writer::FrameWriter;

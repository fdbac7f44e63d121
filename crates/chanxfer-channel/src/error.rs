use std::path::PathBuf;

use chanxfer_frame::FrameError;

use crate::traits::ReadyState;

/// Errors that can occur in channel operations.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    /// Failed to bind to the specified address.
    #[error("failed to bind to {path}: {source}")]
    Bind {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to connect to the specified address.
    #[error("failed to connect to {path}: {source}")]
    Connect {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to accept an incoming connection.
    #[error("failed to accept connection: {0}")]
    Accept(std::io::Error),

    /// An I/O error occurred on the underlying stream.
    #[error("channel I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Wire framing failed.
    #[error("channel framing error: {0}")]
    Frame(#[from] FrameError),

    /// The socket path is too long for the platform.
    #[error("socket path too long ({len} bytes, max {max}): {path}")]
    PathTooLong {
        path: PathBuf,
        len: usize,
        max: usize,
    },

    /// The channel is not in the open state.
    #[error("channel is not open (state: {state})")]
    NotOpen { state: ReadyState },

    /// The send buffer cannot take the message.
    #[error("send buffer full ({buffered} buffered + {size} bytes exceeds {capacity})")]
    BufferFull {
        buffered: usize,
        size: usize,
        capacity: usize,
    },

    /// The transport refused the message.
    #[error("send rejected: {0}")]
    SendRejected(String),

    /// The channel has been shut down.
    #[error("channel closed")]
    Closed,
}

pub type Result<T> = std::result::Result<T, ChannelError>;

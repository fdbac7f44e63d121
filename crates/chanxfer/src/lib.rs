//! Chunked, flow-controlled file transfer over ordered message channels.
//!
//! A payload crosses a channel as a size announcement, bounded binary chunks
//! and an end marker. The sender never hands the channel more while its send
//! buffer is above a threshold; the receiver rebuilds the exact bytes and
//! knows when the payload is complete.
//!
//! # Crate Structure
//!
//! - [`frame`]: message shapes, chunking and the socket wire codec
//! - [`channel`]: the channel abstraction, an in-memory loopback pair and
//!   Unix domain socket channels
//! - [`transfer`]: the paced sender, the reassembling receiver and drivers

/// Re-export frame types.
pub mod frame {
    pub use chanxfer_frame::*;
}

/// Re-export channel types.
pub mod channel {
    pub use chanxfer_channel::*;
}

/// Re-export transfer types.
pub mod transfer {
    pub use chanxfer_transfer::*;
}

//! Chunked, flow-controlled payload transfer over a [`Channel`].
//!
//! The [`SenderQueue`] splits a payload into a control message, bounded
//! chunks and a terminator, and paces them against the channel's send buffer.
//! The [`ReceiverAssembler`] rebuilds the payload and hands it to a
//! [`PayloadSink`]. The two sides share nothing but the channel and the
//! message shapes from `chanxfer-frame`.
//!
//! [`send_payload`] and [`receive_payloads`] drive either side from channel
//! events until the transfer finishes.
//! [`wait_receipt`] lets a sender learn that the receiver kept the payload.
//!
//! [`Channel`]: chanxfer_channel::Channel

pub mod config;
pub mod driver;
pub mod error;
pub mod receiver;
pub mod sender;

pub use config::TransferConfig;
pub use driver::{receive_payloads, send_payload, wait_closed, wait_receipt, ReceiveSummary};
pub use error::{ReceiveError, Result, TransferError};
pub use receiver::{
    step, AssemblerState, Delivery, Effect, Outcome, PayloadSink, Progress, ReceiverAssembler,
    Session,
};
pub use sender::{SendStats, SendStatus, SenderQueue};

//! Ordered, message-oriented channels with a bounded send buffer.
//!
//! A [`Channel`] delivers discrete text or binary messages in order, reports
//! how many bytes sit in its send buffer, and fires a one-shot
//! buffered-amount-low event once that buffer drains to its threshold.
//!
//! Implementations:
//! - [`LoopbackChannel`]: in-memory pair with explicit delivery, for tests
//!   and single-process use
//! - [`SocketChannel`]: Unix domain socket carrying framed messages (Unix only)

pub mod error;
pub mod loopback;
pub mod traits;

#[cfg(unix)]
pub mod socket;
#[cfg(unix)]
pub mod uds;

pub use error::{ChannelError, Result};
pub use loopback::{LoopbackChannel, SendRecord, DEFAULT_LOOPBACK_CAPACITY};
pub use traits::{Channel, ChannelEvent, ReadyState};

#[cfg(unix)]
pub use socket::SocketChannel;
#[cfg(unix)]
pub use uds::{connect, connect_with_config, SocketListener};

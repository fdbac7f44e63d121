use std::time::Duration;

use chanxfer_frame::{BUFFER_THRESHOLD, MAX_CHUNK_SIZE};

use crate::error::{Result, TransferError};

/// Local tuning for one side of a transfer.
///
/// Nothing here is negotiated or sent on the wire; both ends run with the
/// defaults unless a test or a local deployment overrides them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferConfig {
    /// Largest chunk the sender emits. Default: [`MAX_CHUNK_SIZE`].
    pub max_chunk_size: usize,
    /// Buffered byte count above which the sender pauses.
    /// Default: [`BUFFER_THRESHOLD`].
    pub buffer_threshold: usize,
    /// How long the drivers wait for the next channel event.
    /// `None` waits indefinitely.
    pub idle_timeout: Option<Duration>,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            max_chunk_size: MAX_CHUNK_SIZE,
            buffer_threshold: BUFFER_THRESHOLD,
            idle_timeout: None,
        }
    }
}

impl TransferConfig {
    /// Set the driver idle timeout.
    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = Some(timeout);
        self
    }

    /// Reject settings the sender cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.max_chunk_size == 0 {
            return Err(TransferError::InvalidConfig(
                "max_chunk_size must be greater than zero".to_string(),
            ));
        }
        if self.idle_timeout == Some(Duration::ZERO) {
            return Err(TransferError::InvalidConfig(
                "idle_timeout must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

use std::collections::VecDeque;

use bytes::Bytes;
use chanxfer_channel::{Channel, ReadyState};
use chanxfer_frame::{chunk_count, ChannelMessage, Chunks, ControlMessage, TransferMessage};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::TransferConfig;
use crate::error::{Result, TransferError};

/// Where the sender stands after handing items to the channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendStatus {
    /// Every queued item has been handed to the channel.
    Complete,
    /// Items remain queued until the channel reports buffered-amount-low.
    Paused,
}

/// Running totals for everything this sender handed to its channel.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SendStats {
    /// Messages sent, including control and terminator messages.
    pub messages: u64,
    /// Chunk messages sent.
    pub chunks: u64,
    /// Payload bytes sent in chunks.
    pub bytes: u64,
    /// Times draining paused on a full send buffer.
    pub pauses: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DrainState {
    Idle,
    Paused,
    Failed,
}

/// Outbound FIFO that paces messages against a channel's send buffer.
///
/// Items are handed to [`Channel::send`] only while the buffered amount is
/// at or below the configured threshold. Once it is above, the popped item
/// goes back to the front, draining pauses, and the channel's one-shot
/// buffered-amount-low listener is armed. The owner feeds that event back
/// through [`SenderQueue::on_buffered_amount_low`].
pub struct SenderQueue<C> {
    channel: C,
    config: TransferConfig,
    queue: VecDeque<ChannelMessage>,
    state: DrainState,
    stats: SendStats,
}

impl<C: Channel> SenderQueue<C> {
    /// Sender with the default chunk size and buffer threshold.
    pub fn new(channel: C) -> Self {
        Self::build(channel, TransferConfig::default())
    }

    /// Sender with explicit configuration.
    pub fn with_config(channel: C, config: TransferConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(channel, config))
    }

    fn build(mut channel: C, config: TransferConfig) -> Self {
        channel.set_buffered_amount_low_threshold(config.buffer_threshold);
        Self {
            channel,
            config,
            queue: VecDeque::new(),
            state: DrainState::Idle,
            stats: SendStats::default(),
        }
    }

    /// Queue a whole payload and start draining.
    ///
    /// Queues the control message, the payload's chunks in offset order and
    /// the terminator, then drains as far as the send buffer allows. The
    /// channel must be open and no earlier transfer may still be queued.
    pub fn transfer(&mut self, payload: impl Into<Bytes>) -> Result<SendStatus> {
        let payload = payload.into();
        let state = self.channel.ready_state();
        if state != ReadyState::Open {
            return Err(TransferError::ChannelNotOpen { state });
        }
        if self.state == DrainState::Failed {
            return Err(TransferError::Failed {
                pending: self.queue.len(),
            });
        }
        if !self.queue.is_empty() {
            return Err(TransferError::Busy {
                pending: self.queue.len(),
            });
        }

        let total_bytes = payload.len() as u64;
        let chunks = chunk_count(payload.len(), self.config.max_chunk_size);
        info!(
            label = %self.channel.label(),
            total_bytes,
            chunks,
            "starting transfer"
        );

        let control = TransferMessage::Control(ControlMessage::new(total_bytes)).encode()?;
        self.queue.reserve(chunks + 2);
        self.queue.push_back(control);
        self.queue.extend(
            Chunks::new(payload, self.config.max_chunk_size).map(ChannelMessage::Binary),
        );
        self.queue.push_back(TransferMessage::Terminator.encode()?);

        self.drain()
    }

    /// Append one item and drain unless paused.
    pub fn enqueue(&mut self, item: TransferMessage) -> Result<SendStatus> {
        let message = item.encode()?;
        self.queue.push_back(message);
        match self.state {
            DrainState::Paused => Ok(SendStatus::Paused),
            DrainState::Failed => Err(TransferError::Failed {
                pending: self.queue.len(),
            }),
            DrainState::Idle => self.drain(),
        }
    }

    /// Hand queued items to the channel while its buffer is at or below the
    /// threshold.
    ///
    /// A no-op returning [`SendStatus::Paused`] while paused. On a send error
    /// the failed item is dropped, the rest stay queued, and the sender
    /// refuses further work until [`SenderQueue::abort`].
    pub fn drain(&mut self) -> Result<SendStatus> {
        match self.state {
            DrainState::Paused => return Ok(SendStatus::Paused),
            DrainState::Failed => {
                return Err(TransferError::Failed {
                    pending: self.queue.len(),
                })
            }
            DrainState::Idle => {}
        }

        while let Some(message) = self.queue.pop_front() {
            let buffered = self.channel.buffered_amount();
            if buffered > self.config.buffer_threshold {
                self.queue.push_front(message);
                self.state = DrainState::Paused;
                self.stats.pauses += 1;
                debug!(
                    buffered,
                    threshold = self.config.buffer_threshold,
                    pending = self.queue.len(),
                    "send buffer above threshold; pausing"
                );
                self.channel.listen_buffered_amount_low();
                return Ok(SendStatus::Paused);
            }

            let len = message.len();
            let binary = message.is_binary();
            if let Err(source) = self.channel.send(message) {
                self.state = DrainState::Failed;
                warn!(
                    label = %self.channel.label(),
                    error = %source,
                    undelivered = self.queue.len(),
                    "send failed; transfer aborted"
                );
                return Err(TransferError::ChannelSend { source });
            }

            self.stats.messages += 1;
            if binary {
                self.stats.chunks += 1;
                self.stats.bytes += len as u64;
            }
        }

        if self.stats.messages > 0 {
            debug!(label = %self.channel.label(), "send queue drained");
        }
        Ok(SendStatus::Complete)
    }

    /// The channel's buffered-amount-low event fired; resume draining.
    ///
    /// Spurious events while not paused are ignored.
    pub fn on_buffered_amount_low(&mut self) -> Result<SendStatus> {
        if self.state != DrainState::Paused {
            debug!("buffered-amount-low while not paused; ignoring");
            return self.status();
        }
        debug!(
            buffered = self.channel.buffered_amount(),
            pending = self.queue.len(),
            "send buffer low; resuming"
        );
        self.state = DrainState::Idle;
        self.drain()
    }

    /// Discard everything still queued and clear a failure.
    ///
    /// Returns how many items were dropped. The payload has to be sent again
    /// from the start.
    pub fn abort(&mut self) -> usize {
        let dropped = self.queue.len();
        self.queue.clear();
        self.state = DrainState::Idle;
        if dropped > 0 {
            info!(label = %self.channel.label(), dropped, "transfer aborted");
        }
        dropped
    }

    /// Current status without touching the channel.
    pub fn status(&self) -> Result<SendStatus> {
        match self.state {
            DrainState::Idle if self.queue.is_empty() => Ok(SendStatus::Complete),
            DrainState::Idle | DrainState::Paused => Ok(SendStatus::Paused),
            DrainState::Failed => Err(TransferError::Failed {
                pending: self.queue.len(),
            }),
        }
    }

    /// Items not yet handed to the channel.
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Returns true while waiting on buffered-amount-low.
    pub fn is_paused(&self) -> bool {
        self.state == DrainState::Paused
    }

    /// Totals since this sender was created.
    pub fn stats(&self) -> &SendStats {
        &self.stats
    }

    /// Active configuration.
    pub fn config(&self) -> &TransferConfig {
        &self.config
    }

    /// Borrow the channel.
    pub fn channel(&self) -> &C {
        &self.channel
    }

    /// Mutably borrow the channel.
    pub fn channel_mut(&mut self) -> &mut C {
        &mut self.channel
    }

    /// Give the channel back, dropping anything still queued.
    pub fn into_inner(self) -> C {
        self.channel
    }
}

impl<C: Channel> std::fmt::Debug for SenderQueue<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SenderQueue")
            .field("label", &self.channel.label())
            .field("state", &self.state)
            .field("pending", &self.queue.len())
            .field("stats", &self.stats)
            .finish()
    }
}

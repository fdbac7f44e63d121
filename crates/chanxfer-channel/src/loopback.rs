use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chanxfer_frame::ChannelMessage;
use tracing::{debug, trace};

use crate::error::{ChannelError, Result};
use crate::traits::{Channel, ChannelEvent, ReadyState};

/// Default send-buffer capacity of a loopback half: 16 MiB.
pub const DEFAULT_LOOPBACK_CAPACITY: usize = 16 * 1024 * 1024;

/// One call to `send` as observed by a loopback half.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SendRecord {
    /// Buffered amount at the moment `send` was called.
    pub buffered_before: usize,
    /// Size of the message in bytes.
    pub len: usize,
    /// Whether the message was binary.
    pub binary: bool,
}

#[derive(Debug)]
struct Side {
    outbound: VecDeque<ChannelMessage>,
    buffered: usize,
    capacity: usize,
    low_threshold: usize,
    low_armed: bool,
    events: VecDeque<ChannelEvent>,
    send_log: Vec<SendRecord>,
    reject_next: Option<String>,
}

impl Side {
    fn new(capacity: usize) -> Self {
        let mut events = VecDeque::new();
        events.push_back(ChannelEvent::Open);
        Self {
            outbound: VecDeque::new(),
            buffered: 0,
            capacity,
            low_threshold: 0,
            low_armed: false,
            events,
            send_log: Vec::new(),
            reject_next: None,
        }
    }

    fn fire_low_if_due(&mut self) {
        if self.low_armed && self.buffered <= self.low_threshold {
            self.low_armed = false;
            self.events.push_back(ChannelEvent::BufferedAmountLow);
        }
    }
}

#[derive(Debug)]
struct Link {
    state: ReadyState,
    sides: [Side; 2],
}

/// One half of an in-memory channel pair.
///
/// Sent messages sit in this half's send buffer, counted by
/// `buffered_amount()`, until [`LoopbackChannel::transmit`] moves them to the
/// peer as `Message` events. Delivery timing is therefore fully under the
/// caller's control, which makes pacing and ordering observable in tests.
///
/// A send that would push the buffer past its capacity fails with
/// [`ChannelError::BufferFull`], as a real transport's bounded buffer does.
#[derive(Debug)]
pub struct LoopbackChannel {
    link: Arc<Mutex<Link>>,
    side: usize,
    label: String,
}

impl LoopbackChannel {
    /// Create an open pair with the default capacity.
    pub fn pair(label: &str) -> (Self, Self) {
        Self::pair_with_capacity(label, DEFAULT_LOOPBACK_CAPACITY)
    }

    /// Create an open pair whose halves each buffer at most `capacity` bytes.
    pub fn pair_with_capacity(label: &str, capacity: usize) -> (Self, Self) {
        let link = Arc::new(Mutex::new(Link {
            state: ReadyState::Open,
            sides: [Side::new(capacity), Side::new(capacity)],
        }));
        let left = Self {
            link: Arc::clone(&link),
            side: 0,
            label: label.to_string(),
        };
        let right = Self {
            link,
            side: 1,
            label: label.to_string(),
        };
        (left, right)
    }

    fn link(&self) -> MutexGuard<'_, Link> {
        self.link.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn peer(&self) -> usize {
        1 - self.side
    }

    /// Deliver buffered messages from this half to the peer.
    ///
    /// Whole messages move in send order until at least `max_bytes` bytes
    /// have moved or the buffer is empty. Returns the bytes moved.
    pub fn transmit(&self, max_bytes: usize) -> usize {
        let mut link = self.link();
        if link.state == ReadyState::Closed {
            return 0;
        }

        let (mine, peer) = (self.side, self.peer());
        let mut moved = 0usize;
        while moved < max_bytes {
            let Some(message) = link.sides[mine].outbound.pop_front() else {
                break;
            };
            let len = message.len();
            moved += len;
            link.sides[mine].buffered -= len;
            link.sides[peer].events.push_back(ChannelEvent::Message(message));
        }

        trace!(label = %self.label, moved, buffered = link.sides[mine].buffered, "loopback transmit");
        link.sides[mine].fire_low_if_due();
        moved
    }

    /// Deliver everything buffered on this half.
    pub fn transmit_all(&self) -> usize {
        self.transmit(usize::MAX)
    }

    /// Every `send` accepted or rejected on this half, in call order.
    pub fn send_log(&self) -> Vec<SendRecord> {
        self.link().sides[self.side].send_log.clone()
    }

    /// Make the next `send` on this half fail with [`ChannelError::SendRejected`].
    pub fn reject_next_send(&self, reason: &str) {
        self.link().sides[self.side].reject_next = Some(reason.to_string());
    }

    /// Number of events waiting on this half.
    pub fn pending_events(&self) -> usize {
        self.link().sides[self.side].events.len()
    }
}

impl Channel for LoopbackChannel {
    fn label(&self) -> &str {
        &self.label
    }

    fn ready_state(&self) -> ReadyState {
        self.link().state
    }

    fn buffered_amount(&self) -> usize {
        self.link().sides[self.side].buffered
    }

    fn buffered_amount_low_threshold(&self) -> usize {
        self.link().sides[self.side].low_threshold
    }

    fn set_buffered_amount_low_threshold(&mut self, threshold: usize) {
        self.link().sides[self.side].low_threshold = threshold;
    }

    fn listen_buffered_amount_low(&mut self) {
        let mut link = self.link();
        let side = &mut link.sides[self.side];
        side.low_armed = true;
        side.fire_low_if_due();
    }

    fn send(&mut self, message: ChannelMessage) -> Result<()> {
        let mut link = self.link();
        let state = link.state;
        let side = &mut link.sides[self.side];
        let len = message.len();
        side.send_log.push(SendRecord {
            buffered_before: side.buffered,
            len,
            binary: message.is_binary(),
        });

        if state != ReadyState::Open {
            return Err(ChannelError::NotOpen { state });
        }
        if let Some(reason) = side.reject_next.take() {
            return Err(ChannelError::SendRejected(reason));
        }
        if side.buffered + len > side.capacity {
            return Err(ChannelError::BufferFull {
                buffered: side.buffered,
                size: len,
                capacity: side.capacity,
            });
        }

        side.buffered += len;
        side.outbound.push_back(message);
        Ok(())
    }

    fn next_event(&mut self, _timeout: Option<Duration>) -> Result<Option<ChannelEvent>> {
        Ok(self.link().sides[self.side].events.pop_front())
    }

    fn close(&mut self) -> Result<()> {
        let mut link = self.link();
        if link.state == ReadyState::Closed {
            return Ok(());
        }
        link.state = ReadyState::Closed;
        for side in &mut link.sides {
            side.outbound.clear();
            side.buffered = 0;
            side.low_armed = false;
            side.events.push_back(ChannelEvent::Closed);
        }
        debug!(label = %self.label, "loopback channel closed");
        Ok(())
    }
}

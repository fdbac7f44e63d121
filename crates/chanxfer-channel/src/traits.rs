use std::fmt;
use std::time::Duration;

use chanxfer_frame::ChannelMessage;

use crate::error::{ChannelError, Result};

/// Lifecycle of a channel.
///
/// Channels are open once constructed; there is no connecting phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadyState {
    /// Messages can be sent and received.
    Open,
    /// `close()` was called; pending sends are being flushed.
    Closing,
    /// No further messages flow in either direction.
    Closed,
}

impl fmt::Display for ReadyState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Open => "open",
            Self::Closing => "closing",
            Self::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Something that happened on a channel.
#[derive(Debug)]
pub enum ChannelEvent {
    /// The channel became open.
    Open,
    /// A message arrived from the remote side.
    Message(ChannelMessage),
    /// The send buffer drained to the low threshold after a listener was armed.
    BufferedAmountLow,
    /// The channel closed.
    Closed,
    /// The transport failed; a `Closed` event follows.
    Error(ChannelError),
}

/// An ordered, message-oriented, bidirectional channel with a bounded send
/// buffer.
///
/// Handlers react to [`ChannelEvent`]s pulled with [`Channel::next_event`];
/// there is no callback registration. The buffered-amount-low notification
/// is one-shot: [`Channel::listen_buffered_amount_low`] arms it, and the
/// channel queues exactly one [`ChannelEvent::BufferedAmountLow`] the next
/// time `buffered_amount() <= buffered_amount_low_threshold()`, including
/// immediately if that already holds when armed.
pub trait Channel {
    /// Label both ends agreed on when the channel opened.
    fn label(&self) -> &str;

    /// Current lifecycle state.
    fn ready_state(&self) -> ReadyState;

    /// Bytes handed to `send` that the transport has not yet written out.
    fn buffered_amount(&self) -> usize;

    /// Threshold at or below which the buffered-amount-low event fires.
    fn buffered_amount_low_threshold(&self) -> usize;

    /// Change the buffered-amount-low threshold.
    fn set_buffered_amount_low_threshold(&mut self, threshold: usize);

    /// Arm the one-shot buffered-amount-low event.
    fn listen_buffered_amount_low(&mut self);

    /// Queue one message for delivery.
    fn send(&mut self, message: ChannelMessage) -> Result<()>;

    /// Next pending event.
    ///
    /// `None` timeout blocks until an event is available on channels that can
    /// block. Returns `Ok(None)` when the timeout elapses or, on channels
    /// without background delivery, when nothing is queued.
    fn next_event(&mut self, timeout: Option<Duration>) -> Result<Option<ChannelEvent>>;

    /// Close the channel. Closing an already closed channel is a no-op.
    fn close(&mut self) -> Result<()>;

    /// Returns true while the channel is open.
    fn is_open(&self) -> bool {
        self.ready_state() == ReadyState::Open
    }
}

impl<C: Channel + ?Sized> Channel for &mut C {
    fn label(&self) -> &str {
        (**self).label()
    }

    fn ready_state(&self) -> ReadyState {
        (**self).ready_state()
    }

    fn buffered_amount(&self) -> usize {
        (**self).buffered_amount()
    }

    fn buffered_amount_low_threshold(&self) -> usize {
        (**self).buffered_amount_low_threshold()
    }

    fn set_buffered_amount_low_threshold(&mut self, threshold: usize) {
        (**self).set_buffered_amount_low_threshold(threshold)
    }

    fn listen_buffered_amount_low(&mut self) {
        (**self).listen_buffered_amount_low()
    }

    fn send(&mut self, message: ChannelMessage) -> Result<()> {
        (**self).send(message)
    }

    fn next_event(&mut self, timeout: Option<Duration>) -> Result<Option<ChannelEvent>> {
        (**self).next_event(timeout)
    }

    fn close(&mut self) -> Result<()> {
        (**self).close()
    }
}

impl<C: Channel + ?Sized> Channel for Box<C> {
    fn label(&self) -> &str {
        (**self).label()
    }

    fn ready_state(&self) -> ReadyState {
        (**self).ready_state()
    }

    fn buffered_amount(&self) -> usize {
        (**self).buffered_amount()
    }

    fn buffered_amount_low_threshold(&self) -> usize {
        (**self).buffered_amount_low_threshold()
    }

    fn set_buffered_amount_low_threshold(&mut self, threshold: usize) {
        (**self).set_buffered_amount_low_threshold(threshold)
    }

    fn listen_buffered_amount_low(&mut self) {
        (**self).listen_buffered_amount_low()
    }

    fn send(&mut self, message: ChannelMessage) -> Result<()> {
        (**self).send(message)
    }

    fn next_event(&mut self, timeout: Option<Duration>) -> Result<Option<ChannelEvent>> {
        (**self).next_event(timeout)
    }

    fn close(&mut self) -> Result<()> {
        (**self).close()
    }
}

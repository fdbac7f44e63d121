//! Event loops that run a sender or receiver against its channel.

use std::time::Duration;

use bytes::Bytes;
use chanxfer_channel::{Channel, ChannelEvent, ReadyState};
use chanxfer_frame::DeliveryReceipt;
use serde::Serialize;
use tracing::{debug, info, trace};

use crate::error::{Result, TransferError};
use crate::receiver::{Outcome, PayloadSink, ReceiverAssembler};
use crate::sender::{SendStats, SendStatus, SenderQueue};

/// Totals from one [`receive_payloads`] run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReceiveSummary {
    /// Payloads delivered to the sink.
    pub completed: u64,
    /// Messages dropped as protocol violations.
    pub discarded: u64,
    /// Payload bytes delivered.
    pub bytes: u64,
}

fn next_event<C: Channel>(channel: &mut C, timeout: Option<Duration>) -> Result<ChannelEvent> {
    match channel.next_event(timeout)? {
        Some(event) => Ok(event),
        None => Err(TransferError::Timeout(timeout.unwrap_or_default())),
    }
}

/// Send one payload and service buffered-amount-low events until every item
/// has been handed to the channel.
///
/// The channel must already be open. Returns the sender's running totals.
/// The channel stays open; closing it flushes what is still buffered.
pub fn send_payload<C: Channel>(
    sender: &mut SenderQueue<C>,
    payload: impl Into<Bytes>,
) -> Result<SendStats> {
    let timeout = sender.config().idle_timeout;

    let mut status = sender.transfer(payload)?;
    while status == SendStatus::Paused {
        match next_event(sender.channel_mut(), timeout)? {
            ChannelEvent::BufferedAmountLow => status = sender.on_buffered_amount_low()?,
            ChannelEvent::Closed => return Err(TransferError::ChannelClosed),
            ChannelEvent::Error(err) => return Err(err.into()),
            ChannelEvent::Open => {}
            ChannelEvent::Message(message) => {
                debug!(len = message.len(), "ignoring inbound message on sending side")
            }
        }
    }

    info!(
        label = %sender.channel().label(),
        chunks = sender.stats().chunks,
        bytes = sender.stats().bytes,
        pauses = sender.stats().pauses,
        "transfer handed to channel"
    );
    Ok(sender.stats().clone())
}

/// Feed channel messages to the assembler until the channel closes or
/// `limit` payloads have been delivered.
pub fn receive_payloads<C: Channel, S: PayloadSink>(
    assembler: &mut ReceiverAssembler<C, S>,
    limit: Option<u64>,
    idle_timeout: Option<Duration>,
) -> Result<ReceiveSummary> {
    let mut summary = ReceiveSummary::default();

    while limit.is_none_or(|limit| summary.completed < limit) {
        let message = match next_event(assembler.channel_mut(), idle_timeout)? {
            ChannelEvent::Message(message) => message,
            ChannelEvent::Closed => break,
            ChannelEvent::Error(err) => return Err(err.into()),
            ChannelEvent::Open | ChannelEvent::BufferedAmountLow => continue,
        };

        match assembler.on_message(message)? {
            Outcome::Completed { total_bytes } => {
                summary.completed += 1;
                summary.bytes += total_bytes;
                if assembler.channel().ready_state() == ReadyState::Closed {
                    break;
                }
            }
            Outcome::Discarded(_) => summary.discarded += 1,
            Outcome::Started { .. } | Outcome::Accepted(_) => {}
        }
    }

    Ok(summary)
}

/// Wait for the receiver's [`DeliveryReceipt`] for a payload of
/// `total_bytes`.
///
/// A close without a receipt means the receiver did not keep the payload.
pub fn wait_receipt<C: Channel>(
    channel: &mut C,
    total_bytes: u64,
    timeout: Option<Duration>,
) -> Result<DeliveryReceipt> {
    loop {
        match next_event(channel, timeout)? {
            ChannelEvent::Message(message) => match DeliveryReceipt::decode(&message) {
                Some(receipt) if receipt.received_bytes == total_bytes => {
                    debug!(total_bytes, "delivery confirmed");
                    return Ok(receipt);
                }
                Some(receipt) => {
                    return Err(TransferError::ReceiptMismatch {
                        expected: total_bytes,
                        received: receipt.received_bytes,
                    });
                }
                None => debug!(len = message.len(), "ignoring non-receipt message"),
            },
            ChannelEvent::Closed => return Err(TransferError::Unconfirmed),
            ChannelEvent::Error(err) => return Err(err.into()),
            other => trace!(?other, "ignoring event while waiting for receipt"),
        }
    }
}

/// Wait until the remote side closes the channel.
///
/// A close alone does not say the payload was kept; use [`wait_receipt`]
/// against a receiver that sends receipts.
pub fn wait_closed<C: Channel>(channel: &mut C, timeout: Option<Duration>) -> Result<()> {
    if channel.ready_state() == ReadyState::Closed {
        return Ok(());
    }
    loop {
        match next_event(channel, timeout)? {
            ChannelEvent::Closed => return Ok(()),
            ChannelEvent::Error(err) => return Err(err.into()),
            other => trace!(?other, "ignoring event while waiting for close"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::receiver::Delivery;
    use chanxfer_channel::LoopbackChannel;
    use chanxfer_frame::ChannelMessage;

    #[test]
    fn receive_stops_at_close() {
        let (mut left, right) = LoopbackChannel::pair("x");
        left.send(ChannelMessage::from("{\"totalBytes\":2}")).unwrap();
        left.send(ChannelMessage::from(vec![1u8, 2])).unwrap();
        left.send(ChannelMessage::from("LDOF7")).unwrap();
        left.transmit_all();

        let mut delivered = Vec::new();
        let mut assembler = ReceiverAssembler::new(right, |d: Delivery| -> std::io::Result<()> {
            delivered.push(d.bytes);
            Ok(())
        });
        let summary = receive_payloads(&mut assembler, None, None).unwrap();
        assert_eq!(
            summary,
            ReceiveSummary {
                completed: 1,
                discarded: 0,
                bytes: 2
            }
        );
        drop(assembler);
        assert_eq!(delivered, vec![Bytes::from_static(&[1, 2])]);
    }

    #[test]
    fn receive_times_out_on_silent_loopback() {
        let (_left, right) = LoopbackChannel::pair("x");
        let mut assembler =
            ReceiverAssembler::new(right, |_: Delivery| -> std::io::Result<()> { Ok(()) });
        // Open event first, then nothing.
        let err = receive_payloads(&mut assembler, Some(1), None).unwrap_err();
        assert!(matches!(err, TransferError::Timeout(_)));
    }

    #[test]
    fn send_requires_open_channel() {
        let (left, mut right) = LoopbackChannel::pair("x");
        let config = crate::TransferConfig {
            max_chunk_size: 4,
            buffer_threshold: 0,
            idle_timeout: None,
        };
        let mut sender = SenderQueue::with_config(left, config).unwrap();
        right.close().unwrap();
        let err = send_payload(&mut sender, Bytes::from_static(b"abcdefgh")).unwrap_err();
        assert!(matches!(err, TransferError::ChannelNotOpen { .. }));
    }

    #[test]
    fn wait_closed_sees_remote_close() {
        let (mut left, mut right) = LoopbackChannel::pair("x");
        left.send(ChannelMessage::from("ignored")).unwrap();
        left.transmit_all();
        right.close().unwrap();
        wait_closed(&mut left, None).unwrap();

        let (mut open, _other) = LoopbackChannel::pair("y");
        let err = wait_closed(&mut open, None).unwrap_err();
        assert!(matches!(err, TransferError::Timeout(_)));
    }

    #[test]
    fn receipt_confirms_delivery() {
        let (mut left, mut right) = LoopbackChannel::pair("x");
        right.send(ChannelMessage::from("not a receipt")).unwrap();
        right.send(DeliveryReceipt::new(9).encode().unwrap()).unwrap();
        right.transmit_all();
        right.close().unwrap();

        let receipt = wait_receipt(&mut left, 9, None).unwrap();
        assert_eq!(receipt.received_bytes, 9);
    }

    #[test]
    fn close_without_receipt_is_unconfirmed() {
        let (mut left, mut right) = LoopbackChannel::pair("x");
        right.close().unwrap();
        let err = wait_receipt(&mut left, 3, None).unwrap_err();
        assert!(matches!(err, TransferError::Unconfirmed));
    }

    #[test]
    fn receipt_for_other_length_is_rejected() {
        let (mut left, mut right) = LoopbackChannel::pair("x");
        right.send(DeliveryReceipt::new(2).encode().unwrap()).unwrap();
        right.transmit_all();
        let err = wait_receipt(&mut left, 3, None).unwrap_err();
        assert!(matches!(
            err,
            TransferError::ReceiptMismatch {
                expected: 3,
                received: 2
            }
        ));
    }

    #[test]
    fn rejected_payload_reaches_sender_as_unconfirmed() {
        let (left, right) = LoopbackChannel::pair("..");
        let mut sender = SenderQueue::new(left);
        let mut assembler = ReceiverAssembler::new(right, |_: Delivery| -> std::io::Result<()> {
            Err(std::io::Error::other("refused"))
        })
        .with_receipts();

        send_payload(&mut sender, Bytes::from_static(b"abc")).unwrap();
        sender.channel().transmit_all();
        let err = receive_payloads(&mut assembler, Some(1), None).unwrap_err();
        assert!(matches!(err, TransferError::Sink(_)));

        let err = wait_receipt(sender.channel_mut(), 3, None).unwrap_err();
        assert!(matches!(err, TransferError::Unconfirmed));
    }
}

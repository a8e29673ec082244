//! Tagged events returned from the engine's entry points.
//!
//! Replaces a dynamic message bus of tagged tuples (`{send_ack, true}`,
//! `{acked, [...]}`) with a closed, typed enum. Every public entry point on
//! [`crate::buffer::Buffer`] returns `Vec<Event>` instead of mutating
//! hidden state and logging on the side.

use crate::retransmission::WrappedPacket;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// An ACK should be sent to the peer now.
    SendAck,
    /// These packets were acknowledged and removed from the retransmission
    /// queue; the controller uses their send times and transmission counts
    /// for RTT/LEDBAT accounting.
    Acked(Vec<WrappedPacket>),
    /// The peer's FIN has been observed and its sequence position reached.
    GotFin,
    /// An inbound `ack_no` preceded the current send-window base; ignored.
    OldAck,
    /// `fill_window` filled the outbound window to capacity this call.
    WindowMaxedOut,
    /// `fill_window` queued and sent at least one new DATA packet.
    SentData,
    /// `fill_window` had nothing to send (ProcessQueue returned `Zero`).
    NoPiggyback,
    /// The retransmission queue is still non-empty after an ACK was
    /// processed.
    DataInflight,
    /// The retransmission queue became empty as a result of this ACK, and
    /// at least one packet was acknowledged.
    AllAcked,
    /// A FIN packet was among those just acknowledged.
    FinSentAcked,
    /// An inbound payload's sequence number was already present in the
    /// reorder buffer; dropped, but still forces an ACK.
    Duplicate,
    /// `Network::send_pkt` failed; the outbound packet was dropped and
    /// will be retried by the retransmission timer.
    SendFailed(String),
}

//! External collaborator traits.
//!
//! The engine never owns a socket, a writer queue, or a clock — it is
//! handed trait objects for each, mirroring how the teacher's session type
//! is handed an `Arc<UdpSocket>` rather than constructing one itself.
//! These are plain synchronous traits: the engine performs no I/O and
//! awaits nothing internally (see the concurrency model), so there is no
//! reason for the collaborator contracts to be async either.

use bytes::Bytes;

use crate::packet::Packet;

/// Reason a `Network::send_pkt` call failed to hand a packet to the socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendFailed(pub String);

impl std::fmt::Display for SendFailed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "send failed: {}", self.0)
    }
}

impl std::error::Error for SendFailed {}

/// The outbound-socket and congestion-window collaborator.
pub trait Network {
    /// Hand a packet to the socket for transmission with the given
    /// advertised window. Returns the send timestamp in microseconds, as
    /// observed by the caller's clock, on success.
    fn send_pkt(&mut self, window_bytes: u32, packet: &Packet) -> Result<u64, SendFailed>;

    /// The congestion controller's current send window, in bytes.
    fn max_window_send(&self) -> u32;

    /// Fold a freshly-observed peer window size into the controller's view
    /// of the peer, returning the updated `pkt_window` value.
    fn handle_window_size(&mut self, pkt_window: u32, peer_win_sz: u32) -> u32;
}

/// Result of asking the writer-side queue for more bytes to send.
pub enum Fill {
    /// Exactly the requested byte count was available.
    Filled(Bytes),
    /// Fewer bytes than requested were available; the writer is exhausted
    /// for now.
    Partial(Bytes),
    /// Nothing is waiting to be written.
    Zero,
}

/// The upstream byte source the outbound pipeline packetizes from.
pub trait ProcessQueue {
    /// Pull up to `n_bytes` of outbound payload.
    fn fill(&mut self, n_bytes: u32) -> Fill;
}

/// Monotonic microsecond clock collaborator.
///
/// `Buffer` itself never calls this — send timestamps arrive already
/// stamped via `Network::send_pkt`'s return value. `Timing` is part of
/// the collaborator contract (spec section 2) for the owning connection
/// task, which uses it to drive the retransmission timer and the
/// delayed-ACK byte/time thresholds carried on `BufferConfig`; both of
/// those live at the scheduler layer, outside this engine.
pub trait Timing {
    fn now_micros(&self) -> u64;
}

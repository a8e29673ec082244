//! The Buffer Engine: the single per-connection struct that owns the
//! receive pipeline, the send pipeline, and the state transitions that
//! touch them (spec section 4).
//!
//! Mirrors how `session::RakNetSession` composes `SendWindow` +
//! `ReceiveWindow` behind one dispatch surface
//! (`handle_incoming`/`handle_datagram`/`handle_ack_nack`/`tick`), except
//! every entry point here is synchronous and returns its side effects as
//! `Vec<Event>` instead of performing them inline.

use bytes::Bytes;
use tracing::{debug, trace, warn};

use crate::config::BufferConfig;
use crate::error::{BufferError, Result};
use crate::event::Event;
use crate::network::{Fill, Network, ProcessQueue};
use crate::packet::{Packet, PacketType};
use crate::reorder::ReorderBuffer;
use crate::retransmission::{AckOutcome, RetransmissionQueue};
use crate::seq::{bit16, dist};
use crate::state::{ConnectionState, FinState};

/// The largest `dist(seq_no, next_expected)` that is still considered "in
/// the reorder window" rather than `FarInFuture`. Locked at 511 per
/// spec.md's Open Questions (a single constant instead of the source's two
/// separately-defined `REORDER_BUFFER_SIZE`/`REORDER_BUFFER_MAX_SIZE`).
pub const REORDER_BUFFER_MAX: u32 = 511;

/// Threshold above which a reopened zero window is worth notifying the
/// peer about proactively (spec 4.6), to avoid silly-window churn.
const ZERO_WINDOW_REOPEN_THRESHOLD: u32 = 1000;

/// Outcome of `validate_seq_no` (spec 4.2 step 2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SeqValidation {
    /// Packet carries no new data; purely an ACK/STATE or a duplicate of
    /// the last consumed sequence number.
    NoData,
    /// Packet's payload sits `diff` sequence numbers ahead of
    /// `next_expected_seq_no`.
    InWindow(u32),
}

/// Outcome of folding an inbound payload into `recv_buf`/`reorder_buf`
/// (spec 4.2 "Receive-buffer update rules").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
struct IngestOutcome {
    /// `recv_buf` and/or `reorder_buf` changed; an ACK is owed.
    changed: bool,
    /// `next_expected_seq_no` just advanced past the peer's FIN position.
    /// Can be true together with `changed` when a contiguous DATA delivery
    /// (direct or drained from `reorder_buf`) closes the last gap before a
    /// FIN recorded earlier at a higher sequence number.
    got_fin: bool,
    /// The payload's sequence number was already present in `reorder_buf`.
    duplicate: bool,
}

/// The per-connection reliable-stream buffer engine (spec section 3).
#[derive(Debug)]
pub struct Buffer {
    config: BufferConfig,
    state: ConnectionState,
    fin_state: FinState,

    recv_buf: std::collections::VecDeque<Bytes>,
    reorder_buf: ReorderBuffer,
    next_expected_seq_no: u16,

    retransmission_queue: RetransmissionQueue,
    seq_no: u16,
}

impl Buffer {
    /// Construct a new engine for a connection whose initial outbound
    /// sequence number is `seq_no` and whose first expected inbound
    /// sequence number (learned from the SYN exchange) is
    /// `next_expected_seq_no`.
    pub fn new(seq_no: u16, next_expected_seq_no: u16, config: BufferConfig) -> Self {
        Buffer {
            config,
            state: ConnectionState::Connected,
            fin_state: FinState::None,
            recv_buf: std::collections::VecDeque::new(),
            reorder_buf: ReorderBuffer::new(),
            next_expected_seq_no,
            retransmission_queue: RetransmissionQueue::new(),
            seq_no,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn fin_state(&self) -> FinState {
        self.fin_state
    }

    pub fn next_expected_seq_no(&self) -> u16 {
        self.next_expected_seq_no
    }

    pub fn seq_no(&self) -> u16 {
        self.seq_no
    }

    pub fn retransmission_len(&self) -> usize {
        self.retransmission_queue.len()
    }

    /// Bytes of received payload sitting in `recv_buf`, awaiting the
    /// reader.
    fn recv_buf_bytes(&self) -> u32 {
        self.recv_buf.iter().map(|b| b.len() as u32).sum()
    }

    /// `advertised_window(buf)` (spec 4.6): `max(0, recv_buf_bytes -
    /// sum(recv_buf payloads))`.
    pub fn advertised_window(&self) -> u32 {
        self.config
            .recv_buf_bytes
            .saturating_sub(self.recv_buf_bytes())
    }

    /// True iff `old` was a zero window and `new` exceeds the reopen
    /// threshold — the peer-notification trigger for window reopening
    /// (spec 4.6), to avoid silly-window churn.
    pub fn view_zerowindow_reopen(old: u32, new: u32) -> bool {
        old == 0 && new > ZERO_WINDOW_REOPEN_THRESHOLD
    }

    // ---- sequence validation (spec 4.1, 4.2 step 2) ----------------

    fn validate_seq_no(&self, seq_no: u16) -> Result<SeqValidation> {
        let diff = dist(seq_no, self.next_expected_seq_no);
        let diff_m1 = dist(seq_no, bit16(self.next_expected_seq_no as u32).wrapping_sub(1));
        if diff_m1 == 0 {
            return Ok(SeqValidation::NoData);
        }
        if diff >= self.config.reorder_buf_max {
            return Err(BufferError::FarInFuture {
                distance: diff,
                limit: self.config.reorder_buf_max,
            });
        }
        Ok(SeqValidation::InWindow(diff))
    }

    // ---- receive-buffer update rules (spec 4.2) --------------------

    fn ingest_payload(&mut self, seq_no: u16, payload: Bytes) -> IngestOutcome {
        let mut outcome = IngestOutcome::default();

        if payload.is_empty() {
            // "Empty payload otherwise: no-op" — including an out-of-order
            // FIN whose sequence position hasn't been reached yet. Whether
            // this is in fact the FIN-match case is decided below by the
            // unconditional `next_expected_seq_no` check, since reaching
            // the FIN's position can also happen via a DATA packet that
            // fills the last gap (spec scenario 4).
        } else if seq_no == self.next_expected_seq_no {
            if self.state == ConnectionState::Connected {
                self.recv_buf.push_back(payload);
            } else {
                trace!(seq_no, "discarding in-order payload: connection is FinSent");
            }
            self.next_expected_seq_no = bit16(self.next_expected_seq_no as u32 + 1);
            outcome.changed = true;

            let (drained, new_next_expected) = self.reorder_buf.drain_from(self.next_expected_seq_no);
            if self.state == ConnectionState::Connected {
                self.recv_buf.extend(drained);
            }
            self.next_expected_seq_no = new_next_expected;
        } else if self.reorder_buf.insert(seq_no, payload) {
            outcome.changed = true;
        } else {
            outcome.duplicate = true;
        }

        if self.fin_state.seq_no() == Some(self.next_expected_seq_no) {
            self.next_expected_seq_no = bit16(self.next_expected_seq_no as u32 + 1);
            outcome.got_fin = true;
            trace!(seq_no, "fin sequence position reached");
        }

        outcome
    }

    // ---- inbound pipeline (spec 4.2) -------------------------------

    /// Handle one inbound packet. `pkt_window` is the congestion
    /// controller's current view of the peer window, folded through
    /// `Network::handle_window_size` and returned updated.
    pub fn handle_packet(
        &mut self,
        network: &mut dyn Network,
        packet: &Packet,
        pkt_window: u32,
    ) -> Result<(Vec<Event>, u32)> {
        if self.state != ConnectionState::Connected && self.state != ConnectionState::FinSent {
            return Err(BufferError::InvalidState {
                state: self.state,
                packet_type: packet.packet_type,
            });
        }

        let mut events = Vec::new();

        // Step 1: type-specific state capture.
        if packet.packet_type == PacketType::Fin {
            if self.fin_state == FinState::None {
                self.fin_state = FinState::GotFin(packet.seq_no);
                debug!(seq_no = packet.seq_no, "peer FIN observed");
            }
        }

        // Step 2: sequence validation.
        let validation = self.validate_seq_no(packet.seq_no)?;

        // Step 3: payload ingest.
        let ingest = match validation {
            SeqValidation::NoData if packet.payload.is_empty() => IngestOutcome::default(),
            _ => self.ingest_payload(packet.seq_no, packet.payload.clone()),
        };

        if ingest.duplicate {
            events.push(Event::Duplicate);
        }
        if ingest.changed || ingest.got_fin || ingest.duplicate {
            events.push(Event::SendAck);
        }
        if ingest.got_fin {
            events.push(Event::GotFin);
        }

        if packet.packet_type == PacketType::Fin && !events.contains(&Event::SendAck) {
            // A received FIN is always ACKed (spec 4.2 ACK-emission policy),
            // even if the FIN segment's sequence number doesn't land here
            // (e.g. it arrived out of order and is sitting in reorder_buf).
            events.push(Event::SendAck);
        }

        // Step 4: ACK processing against the retransmission queue.
        let last_sent = bit16(self.seq_no as u32).wrapping_sub(1);
        match self.retransmission_queue.update_send_buffer(packet.ack_no, last_sent) {
            AckOutcome::Old => events.push(Event::OldAck),
            AckOutcome::Acked {
                acked,
                fin_acked,
                queue_now_empty,
            } => {
                if fin_acked {
                    events.push(Event::FinSentAcked);
                }
                let any_acked = !acked.is_empty();
                if any_acked {
                    events.push(Event::Acked(acked));
                }
                // `all_acked` requires the queue to be empty *and* this ack
                // to have actually drained something (spec 4.4); otherwise
                // an already-empty queue would report `AllAcked` on every
                // inbound packet from a pure receiver that never sent data.
                if !queue_now_empty {
                    events.push(Event::DataInflight);
                } else if any_acked {
                    events.push(Event::AllAcked);
                }
            }
        }

        // Step 5: window-size handshake.
        let pkt_window = network.handle_window_size(pkt_window, packet.win_sz);

        self.maybe_close();

        Ok((events, pkt_window))
    }

    /// `FinSent -> Closed` once `fin_sent_acked` has fired, the peer's FIN
    /// has been observed, and the outbound queue has drained (spec 4.9).
    fn maybe_close(&mut self) {
        if self.state == ConnectionState::FinSent
            && self.fin_state != FinState::None
            && self.retransmission_queue.is_empty()
        {
            self.state = ConnectionState::Closed;
            debug!("connection closed: fin acked, peer fin observed, queue drained");
        }
    }

    // ---- outbound pipeline (spec 4.3) ------------------------------

    /// Assign the next sequence number to a DATA or FIN packet, send it,
    /// and enqueue it for retransmission. `STATE` is handled by
    /// `send_state` instead, since it never consumes a sequence number.
    fn send_packet(
        &mut self,
        network: &mut dyn Network,
        pkt_window: u32,
        packet_type: PacketType,
        payload: Bytes,
        connection_id: u16,
    ) -> std::result::Result<(), Event> {
        let seq_no = self.seq_no;
        let ack_no = bit16(self.next_expected_seq_no as u32).wrapping_sub(1);
        let packet = Packet {
            packet_type,
            connection_id,
            timestamp_microseconds: 0,
            timestamp_difference_microseconds: 0,
            win_sz: self.advertised_window(),
            seq_no,
            ack_no,
            extensions: Vec::new(),
            payload,
        };

        match network.send_pkt(pkt_window, &packet) {
            Ok(send_time) => {
                self.retransmission_queue.push(packet, send_time);
                self.seq_no = bit16(self.seq_no as u32 + 1);
                Ok(())
            }
            Err(e) => {
                warn!(seq_no, error = %e, "send_pkt failed");
                Err(Event::SendFailed(e.0))
            }
        }
    }

    /// Build and send a pure-ACK STATE packet. Reports
    /// `bit16(seq_no - 1)` as its own `seq_no` field and does not consume
    /// a sequence number or enter the retransmission queue (spec 4.3,
    /// locked in by spec.md's Open Questions).
    pub fn send_state(&self, network: &mut dyn Network, pkt_window: u32, connection_id: u16) -> Vec<Event> {
        let packet = Packet {
            packet_type: PacketType::State,
            connection_id,
            timestamp_microseconds: 0,
            timestamp_difference_microseconds: 0,
            win_sz: self.advertised_window(),
            seq_no: bit16(self.seq_no as u32).wrapping_sub(1),
            ack_no: bit16(self.next_expected_seq_no as u32).wrapping_sub(1),
            extensions: Vec::new(),
            payload: Bytes::new(),
        };
        match network.send_pkt(pkt_window, &packet) {
            Ok(_) => Vec::new(),
            Err(e) => vec![Event::SendFailed(e.0)],
        }
    }

    /// Send a FIN, transitioning `Connected -> FinSent`.
    pub fn send_fin(
        &mut self,
        network: &mut dyn Network,
        pkt_window: u32,
        connection_id: u16,
    ) -> Vec<Event> {
        let mut events = Vec::new();
        match self.send_packet(network, pkt_window, PacketType::Fin, Bytes::new(), connection_id) {
            Ok(()) => {
                self.state = ConnectionState::FinSent;
            }
            Err(e) => events.push(e),
        }
        events
    }

    /// Pull as much outbound data as the window allows from `queue` and
    /// transmit it (spec 4.3 "Window-filling algorithm").
    pub fn fill_window(
        &mut self,
        network: &mut dyn Network,
        queue: &mut dyn ProcessQueue,
        pkt_window: u32,
        connection_id: u16,
    ) -> Vec<Event> {
        let max_window_send = network.max_window_send();
        let inflight = self.retransmission_queue.inflight_bytes();
        let mut free = max_window_send.saturating_sub(inflight);

        let mut chunks: Vec<Bytes> = Vec::new();
        let mut maxed_out = false;

        loop {
            if free == 0 {
                maxed_out = true;
                break;
            }
            let to_fill = free.min(self.config.pkt_size);
            match queue.fill(to_fill) {
                Fill::Filled(bytes) => {
                    free -= bytes.len() as u32;
                    chunks.push(bytes);
                    if free == 0 {
                        maxed_out = true;
                    }
                }
                Fill::Partial(bytes) => {
                    free = free.saturating_sub(bytes.len() as u32);
                    chunks.push(bytes);
                    break;
                }
                Fill::Zero => break,
            }
        }

        let mut events = Vec::new();
        let mut sent_any = false;
        for chunk in chunks {
            match self.send_packet(network, pkt_window, PacketType::Data, chunk, connection_id) {
                Ok(()) => sent_any = true,
                Err(e) => events.push(e),
            }
        }

        if sent_any {
            events.push(Event::SentData);
        } else if events.is_empty() {
            events.push(Event::NoPiggyback);
        }
        if maxed_out {
            events.push(Event::WindowMaxedOut);
        }
        events
    }

    // ---- retransmission (spec 4.5) ---------------------------------

    /// Select and resend the oldest unacknowledged packet, per
    /// `order_packets` (spec 4.5). Returns `None` if the queue is empty.
    pub fn retransmit_packet(
        &mut self,
        network: &mut dyn Network,
        pkt_window: u32,
    ) -> Option<std::result::Result<u16, Event>> {
        let last_sent = bit16(self.seq_no as u32).wrapping_sub(1);
        let window_size = self.retransmission_queue.len() as u32;
        let window_start = bit16(last_sent as u32).wrapping_sub(window_size as u16);
        let oldest = self.retransmission_queue.oldest_seq_no(window_start)?;

        let packet = self.retransmission_queue.get(oldest)?.packet.clone();
        match network.send_pkt(pkt_window, &packet) {
            Ok(send_time) => {
                self.retransmission_queue.mark_resent(oldest, send_time);
                trace!(seq_no = oldest, "retransmitted");
                Some(Ok(oldest))
            }
            Err(e) => {
                warn!(seq_no = oldest, error = %e, "retransmit send_pkt failed");
                Some(Err(Event::SendFailed(e.0)))
            }
        }
    }

    // ---- reader (spec 4.8) -----------------------------------------

    /// Pop the head of `recv_buf`.
    pub fn buffer_dequeue(&mut self) -> Option<Bytes> {
        self.recv_buf.pop_front()
    }

    /// Push a chunk back at the head of `recv_buf`.
    pub fn buffer_putback(&mut self, chunk: Bytes) {
        self.recv_buf.push_front(chunk);
    }

    /// Read up to `n` contiguous bytes (spec 4.8). Splits a head chunk
    /// longer than `n`, concatenates across chunks if shorter, and puts
    /// back any leftover tail so no bytes are lost.
    pub fn draining_receive(&mut self, n: usize) -> DrainOutcome {
        if n == 0 || self.recv_buf.is_empty() {
            return DrainOutcome::Empty;
        }

        let mut out = Vec::with_capacity(n);
        while out.len() < n {
            let Some(mut chunk) = self.recv_buf.pop_front() else {
                break;
            };
            let remaining = n - out.len();
            if chunk.len() > remaining {
                let tail = chunk.split_off(remaining);
                out.extend_from_slice(&chunk);
                self.recv_buf.push_front(tail);
            } else {
                out.extend_from_slice(&chunk);
            }
        }

        if out.is_empty() {
            DrainOutcome::Empty
        } else if out.len() == n {
            DrainOutcome::Ok(Bytes::from(out))
        } else {
            DrainOutcome::PartialRead(Bytes::from(out))
        }
    }
}

/// Outcome of `draining_receive` (spec 4.8).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DrainOutcome {
    Empty,
    Ok(Bytes),
    PartialRead(Bytes),
}

//! `utp-core`: the reliable-stream buffer engine for a uTP-style transport.
//!
//! This crate implements the per-connection subsystem that turns an
//! unreliable, unordered datagram channel into an ordered, reliable,
//! flow-controlled byte stream: sequence-space arithmetic, the reorder
//! buffer, the retransmission queue, the streaming reader, and the state
//! machine that ties them together ([`Buffer`]).
//!
//! It deliberately does not implement congestion control, socket
//! multiplexing, or any protocol-control-plane logic above a single
//! connection — those are external collaborators, expressed here as the
//! [`Network`], [`ProcessQueue`] and [`Timing`] traits.

pub mod binary;
pub mod buffer;
pub mod config;
pub mod error;
pub mod event;
pub mod network;
pub mod packet;
pub mod reorder;
pub mod retransmission;
pub mod seq;
pub mod state;

pub use buffer::{Buffer, DrainOutcome, REORDER_BUFFER_MAX};
pub use config::BufferConfig;
pub use error::{BufferError, PacketDecodeError, Result};
pub use event::Event;
pub use network::{Fill, Network, ProcessQueue, SendFailed, Timing};
pub use packet::{Extension, Packet, PacketType};
pub use retransmission::{extract_payload_size, extract_rtt, WrappedPacket};
pub use state::{ConnectionState, FinState};

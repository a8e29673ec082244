//! Error types for the buffer engine.

use thiserror::Error;

/// Errors surfaced by [`crate::buffer::Buffer`] entry points.
///
/// Recoverable conditions (`Duplicate`, `OldAck`, `SendFailed`) are not
/// returned here — they are reported as [`crate::event::Event`] values so
/// callers can keep processing. Only conditions that abort the current
/// call are modeled as errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BufferError {
    /// A packet was handed to `handle_packet` while the connection was in
    /// a state that cannot accept it.
    #[error("invalid state for packet type {packet_type:?}: connection is {state:?}")]
    InvalidState {
        state: crate::state::ConnectionState,
        packet_type: crate::packet::PacketType,
    },

    /// The inbound sequence number is too far ahead of `next_expected_seq_no`
    /// to fit in the reorder window.
    #[error("sequence number is too far in the future (distance {distance} >= {limit})")]
    FarInFuture { distance: u32, limit: u32 },

    /// Wire decode failed.
    #[error("packet decode error: {0}")]
    PacketDecode(#[from] PacketDecodeError),
}

/// Errors produced while decoding a [`crate::packet::Packet`] from the wire.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PacketDecodeError {
    #[error("buffer too short: needed {needed} bytes, had {available}")]
    UnexpectedEof { needed: usize, available: usize },

    #[error("unknown packet type nibble: {0:#x}")]
    UnknownPacketType(u8),

    #[error("unsupported protocol version: {0}")]
    UnsupportedVersion(u8),

    #[error("extension chain declares length past end of buffer")]
    TruncatedExtension,
}

pub type Result<T> = std::result::Result<T, BufferError>;

//! Buffer engine configuration.

/// Tunable parameters for a [`crate::buffer::Buffer`].
///
/// Mirrors the recognized configuration options in the wire spec: receive
/// buffer capacity, reorder window size, outbound packet cap, and the
/// delayed-ACK thresholds the scheduler enforces using the numbers carried
/// here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferConfig {
    /// Receive buffer capacity in bytes; bounds the advertised window.
    pub recv_buf_bytes: u32,
    /// Maximum distinct entries the reorder buffer may hold before an
    /// inbound packet is rejected as `FarInFuture`.
    pub reorder_buf_max: u32,
    /// Outbound payload cap per DATA packet (MSS-like).
    pub pkt_size: u32,
    /// Bytes of unacknowledged received data that force an ACK at the
    /// scheduler layer.
    pub delayed_ack_byte_threshold: u32,
    /// Milliseconds of delay that force an ACK at the scheduler layer.
    pub delayed_ack_time_ms: u32,
}

impl Default for BufferConfig {
    fn default() -> Self {
        BufferConfig {
            recv_buf_bytes: 8192,
            reorder_buf_max: 511,
            pkt_size: 1000,
            delayed_ack_byte_threshold: 2400,
            delayed_ack_time_ms: 100,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let cfg = BufferConfig::default();
        assert_eq!(cfg.recv_buf_bytes, 8192);
        assert_eq!(cfg.reorder_buf_max, 511);
        assert_eq!(cfg.pkt_size, 1000);
        assert_eq!(cfg.delayed_ack_byte_threshold, 2400);
        assert_eq!(cfg.delayed_ack_time_ms, 100);
    }
}

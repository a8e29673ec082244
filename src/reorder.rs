//! Reorder buffer: out-of-order received payloads, keyed by sequence
//! number, bounded at `REORDER_BUFFER_MAX` entries.

use std::collections::BTreeMap;

use bytes::Bytes;
use tracing::trace;

use crate::seq::bit16;

#[derive(Debug, Default)]
pub struct ReorderBuffer {
    entries: BTreeMap<u16, Bytes>,
}

impl ReorderBuffer {
    pub fn new() -> Self {
        ReorderBuffer {
            entries: BTreeMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, seq_no: u16) -> bool {
        self.entries.contains_key(&seq_no)
    }

    /// Insert an out-of-order payload. Returns `false` (and leaves the
    /// buffer unchanged) if `seq_no` is already present — the caller
    /// surfaces this as `Event::Duplicate`, which still forces an ACK.
    pub fn insert(&mut self, seq_no: u16, payload: Bytes) -> bool {
        if self.entries.contains_key(&seq_no) {
            trace!(seq_no, "duplicate reorder insert dropped");
            return false;
        }
        self.entries.insert(seq_no, payload);
        true
    }

    /// Drain every entry contiguous with `next_expected`, advancing it past
    /// each drained key. Returns the drained payloads in sequence order and
    /// the new `next_expected_seq_no`.
    ///
    /// After this call, `reorder_buf` never contains an entry at the
    /// returned `next_expected` (invariant 2).
    pub fn drain_from(&mut self, mut next_expected: u16) -> (Vec<Bytes>, u16) {
        let mut drained = Vec::new();
        while let Some(payload) = self.entries.remove(&next_expected) {
            trace!(seq_no = next_expected, "drained reorder entry");
            drained.push(payload);
            next_expected = bit16(next_expected as u32 + 1);
        }
        (drained, next_expected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_duplicate_returns_false_and_is_unchanged() {
        let mut buf = ReorderBuffer::new();
        assert!(buf.insert(10, Bytes::from_static(b"A")));
        assert!(!buf.insert(10, Bytes::from_static(b"Z")));
        assert_eq!(buf.len(), 1);
        assert_eq!(buf.entries.get(&10), Some(&Bytes::from_static(b"A")));
    }

    #[test]
    fn reorder_then_drain_scenario() {
        // next_expected=10. Receive 12="C", 11="B", 10="A".
        let mut buf = ReorderBuffer::new();
        let next_expected = 10u16;

        buf.insert(12, Bytes::from_static(b"C"));
        let (drained, next_expected) = buf.drain_from(next_expected);
        assert!(drained.is_empty());
        assert_eq!(next_expected, 10);

        buf.insert(11, Bytes::from_static(b"B"));
        let (drained, next_expected) = buf.drain_from(next_expected);
        assert!(drained.is_empty());
        assert_eq!(next_expected, 10);

        buf.insert(10, Bytes::from_static(b"A"));
        let (drained, next_expected) = buf.drain_from(next_expected);
        assert_eq!(
            drained,
            vec![
                Bytes::from_static(b"A"),
                Bytes::from_static(b"B"),
                Bytes::from_static(b"C"),
            ]
        );
        assert_eq!(next_expected, 13);
        assert!(buf.is_empty());
    }

    #[test]
    fn drain_wraps_around_sequence_space() {
        let mut buf = ReorderBuffer::new();
        buf.insert(65535, Bytes::from_static(b"A"));
        let (drained, next_expected) = buf.drain_from(65535);
        assert_eq!(drained, vec![Bytes::from_static(b"A")]);
        assert_eq!(next_expected, 0);
    }
}

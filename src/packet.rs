//! Wire packet: the uTP v1 header, extension chain, and payload.

use bytes::{BufMut, Bytes, BytesMut};

use crate::binary::{BinaryReader, BinaryWriter};
use crate::error::PacketDecodeError;

const PROTOCOL_VERSION: u8 = 1;
const FIXED_HEADER_LEN: usize = 20;

/// uTP packet type, the high nibble of the first header byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PacketType {
    Data,
    Fin,
    State,
    Reset,
    Syn,
}

impl PacketType {
    fn as_nibble(self) -> u8 {
        match self {
            PacketType::Data => 0,
            PacketType::Fin => 1,
            PacketType::State => 2,
            PacketType::Reset => 3,
            PacketType::Syn => 4,
        }
    }

    fn from_nibble(v: u8) -> Result<Self, PacketDecodeError> {
        match v {
            0 => Ok(PacketType::Data),
            1 => Ok(PacketType::Fin),
            2 => Ok(PacketType::State),
            3 => Ok(PacketType::Reset),
            4 => Ok(PacketType::Syn),
            other => Err(PacketDecodeError::UnknownPacketType(other)),
        }
    }
}

/// One link of the extension chain. `ext_type` is opaque to this crate —
/// unknown types are kept around verbatim rather than interpreted, per the
/// "unknown extensions are skipped" rule; they are never fatal to decoding
/// the rest of the packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extension {
    pub ext_type: u8,
    pub data: Bytes,
}

/// A decoded or to-be-encoded uTP packet (spec section 3 and 6).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub packet_type: PacketType,
    pub connection_id: u16,
    pub timestamp_microseconds: u32,
    pub timestamp_difference_microseconds: u32,
    /// Advertised window, in bytes (`wnd_size` on the wire).
    pub win_sz: u32,
    pub seq_no: u16,
    pub ack_no: u16,
    pub extensions: Vec<Extension>,
    pub payload: Bytes,
}

impl Packet {
    pub fn encode(&self) -> BytesMut {
        let mut buf = BytesMut::with_capacity(FIXED_HEADER_LEN + self.payload.len());

        let first_ext_type = self.extensions.first().map(|e| e.ext_type).unwrap_or(0);
        buf.write_u8((PROTOCOL_VERSION & 0x0F) | (self.packet_type.as_nibble() << 4));
        buf.write_u8(first_ext_type);
        buf.write_u16_be(self.connection_id);
        buf.write_u32_be(self.timestamp_microseconds);
        buf.write_u32_be(self.timestamp_difference_microseconds);
        buf.write_u32_be(self.win_sz);
        buf.write_u16_be(self.seq_no);
        buf.write_u16_be(self.ack_no);

        for (i, ext) in self.extensions.iter().enumerate() {
            let next_type = self.extensions.get(i + 1).map(|e| e.ext_type).unwrap_or(0);
            buf.write_u8(next_type);
            buf.write_u8(ext.data.len() as u8);
            buf.put_slice(&ext.data);
        }

        buf.put_slice(&self.payload);
        buf
    }

    pub fn decode(mut bytes: Bytes) -> Result<Self, PacketDecodeError> {
        let first_byte = bytes.read_u8_checked()?;
        let version = first_byte & 0x0F;
        if version != PROTOCOL_VERSION {
            return Err(PacketDecodeError::UnsupportedVersion(version));
        }
        let packet_type = PacketType::from_nibble(first_byte >> 4)?;

        let mut next_ext_type = bytes.read_u8_checked()?;
        let connection_id = bytes.read_u16_be()?;
        let timestamp_microseconds = bytes.read_u32_be()?;
        let timestamp_difference_microseconds = bytes.read_u32_be()?;
        let win_sz = bytes.read_u32_be()?;
        let seq_no = bytes.read_u16_be()?;
        let ack_no = bytes.read_u16_be()?;

        let mut extensions = Vec::new();
        while next_ext_type != 0 {
            let following_type = bytes.read_u8_checked()?;
            let len = bytes.read_u8_checked()? as usize;
            if bytes.remaining() < len {
                return Err(PacketDecodeError::TruncatedExtension);
            }
            let data = bytes.read_bytes_checked(len)?;
            extensions.push(Extension {
                ext_type: next_ext_type,
                data,
            });
            next_ext_type = following_type;
        }

        let payload = bytes;

        Ok(Packet {
            packet_type,
            connection_id,
            timestamp_microseconds,
            timestamp_difference_microseconds,
            win_sz,
            seq_no,
            ack_no,
            extensions,
            payload,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(packet_type: PacketType, payload: &[u8]) -> Packet {
        Packet {
            packet_type,
            connection_id: 0x1234,
            timestamp_microseconds: 0xAABB_CCDD,
            timestamp_difference_microseconds: 0x0102_0304,
            win_sz: 8192,
            seq_no: 42,
            ack_no: 41,
            extensions: Vec::new(),
            payload: Bytes::copy_from_slice(payload),
        }
    }

    #[test]
    fn encode_decode_data_packet_round_trips() {
        let pkt = sample(PacketType::Data, b"hello");
        let encoded = pkt.encode().freeze();
        let decoded = Packet::decode(encoded).unwrap();
        assert_eq!(decoded, pkt);
    }

    #[test]
    fn encode_matches_literal_byte_layout() {
        let pkt = sample(PacketType::State, b"");
        let encoded = pkt.encode();
        // type=STATE(2)<<4 | version=1 -> 0x21
        assert_eq!(encoded[0], 0x21);
        assert_eq!(encoded[1], 0x00); // no extensions
        assert_eq!(&encoded[2..4], &[0x12, 0x34]); // connection_id
        assert_eq!(&encoded[4..8], &[0xAA, 0xBB, 0xCC, 0xDD]); // timestamp
        assert_eq!(&encoded[8..12], &[0x01, 0x02, 0x03, 0x04]); // timestamp diff
        assert_eq!(&encoded[12..16], &0x0000_2000u32.to_be_bytes()); // wnd_size=8192
        assert_eq!(&encoded[16..18], &42u16.to_be_bytes());
        assert_eq!(&encoded[18..20], &41u16.to_be_bytes());
        assert_eq!(encoded.len(), 20);
    }

    #[test]
    fn decode_unknown_packet_type_errors() {
        let mut raw = sample(PacketType::Data, b"").encode();
        raw[0] = 0xF1; // type nibble 0xF is unknown
        let err = Packet::decode(raw.freeze()).unwrap_err();
        assert_eq!(err, PacketDecodeError::UnknownPacketType(0xF));
    }

    #[test]
    fn decode_short_buffer_is_unexpected_eof() {
        let err = Packet::decode(Bytes::from_static(&[0x01, 0x00])).unwrap_err();
        assert!(matches!(err, PacketDecodeError::UnexpectedEof { .. }));
    }

    #[test]
    fn extension_chain_round_trips_and_skips_unknown() {
        let mut pkt = sample(PacketType::Data, b"payload");
        pkt.extensions = vec![
            Extension {
                ext_type: 1,
                data: Bytes::from_static(&[0xAA, 0xBB]),
            },
            Extension {
                ext_type: 99, // unknown to this crate, still round-trips
                data: Bytes::from_static(&[0x01]),
            },
        ];
        let encoded = pkt.encode().freeze();
        let decoded = Packet::decode(encoded).unwrap();
        assert_eq!(decoded.extensions, pkt.extensions);
        assert_eq!(decoded.payload, pkt.payload);
    }

    #[test]
    fn truncated_extension_is_a_decode_error_not_a_panic() {
        let mut pkt = sample(PacketType::Data, b"");
        pkt.extensions = vec![Extension {
            ext_type: 1,
            data: Bytes::from_static(&[0xAA, 0xBB, 0xCC]),
        }];
        let mut encoded = pkt.encode();
        // truncate the buffer mid-extension-data
        encoded.truncate(encoded.len() - 2);
        let err = Packet::decode(encoded.freeze()).unwrap_err();
        assert!(matches!(
            err,
            PacketDecodeError::TruncatedExtension | PacketDecodeError::UnexpectedEof { .. }
        ));
    }
}

//! Big-endian binary I/O helpers for the wire codec.
//!
//! Trimmed from a richer source that also carried little-endian triads and
//! varint encodings — the uTP header (section 6) is plain big-endian
//! fixed-width fields only, so this is the subset that survives.

use bytes::{Buf, BufMut};

use crate::error::PacketDecodeError;

/// Extension trait for reading big-endian primitives off a [`bytes::Buf`],
/// with bounds-checked errors instead of panics on short input.
pub trait BinaryReader: Buf {
    fn read_u8_checked(&mut self) -> Result<u8, PacketDecodeError> {
        self.ensure_remaining(1)?;
        Ok(self.get_u8())
    }

    fn read_u16_be(&mut self) -> Result<u16, PacketDecodeError> {
        self.ensure_remaining(2)?;
        Ok(self.get_u16())
    }

    fn read_u32_be(&mut self) -> Result<u32, PacketDecodeError> {
        self.ensure_remaining(4)?;
        Ok(self.get_u32())
    }

    fn read_bytes_checked(&mut self, len: usize) -> Result<bytes::Bytes, PacketDecodeError> {
        self.ensure_remaining(len)?;
        Ok(self.copy_to_bytes(len))
    }

    fn ensure_remaining(&self, needed: usize) -> Result<(), PacketDecodeError> {
        let available = self.remaining();
        if available < needed {
            Err(PacketDecodeError::UnexpectedEof { needed, available })
        } else {
            Ok(())
        }
    }
}

impl<T: Buf> BinaryReader for T {}

/// Extension trait for writing big-endian primitives onto a
/// [`bytes::BufMut`].
pub trait BinaryWriter: BufMut {
    fn write_u8(&mut self, v: u8) {
        BufMut::put_u8(self, v);
    }

    fn write_u16_be(&mut self, v: u16) {
        BufMut::put_u16(self, v);
    }

    fn write_u32_be(&mut self, v: u32) {
        BufMut::put_u32(self, v);
    }
}

impl<T: BufMut> BinaryWriter for T {}

//! Unsigned LEB128 varints, as used by the binary capture format.

use std::{io, slice};

/// 10 bytes with 7 bits each are needed for 64 bits.
pub const MAX_VARINT_LENGTH: usize = 10;

/// Decode an unsigned varint. Return None if it overflows a u64 or the input
/// ends before the last byte.
pub fn decode_varint(input: &[u8]) -> Option<u64> {
    let mut value: u64 = 0;
    for (i, byte) in input.iter().take(MAX_VARINT_LENGTH).enumerate() {
        // The 10th byte only has room for one bit.
        if i == MAX_VARINT_LENGTH - 1 && byte & 0x7E != 0 {
            return None;
        }
        value |= ((byte & 0x7F) as u64) << (i * 7);
        if byte & 0x80 == 0 {
            return Some(value);
        }
    }
    None
}

/// Encode an unsigned varint. Return the number of bytes written. The output
/// must have room for `MAX_VARINT_LENGTH` bytes.
pub fn encode_varint(output: &mut [u8], mut value: u64) -> usize {
    for (i, out) in output.iter_mut().take(MAX_VARINT_LENGTH).enumerate() {
        let bits = value as u8 & 0x7F;
        value >>= 7;
        if value == 0 {
            *out = bits;
            return i + 1;
        }
        *out = bits | 0x80;
    }
    MAX_VARINT_LENGTH
}

pub trait VarintReader {
    fn read_varint(&mut self) -> io::Result<u64>;
}

impl<R> VarintReader for R
where
    R: io::Read,
{
    fn read_varint(&mut self) -> io::Result<u64> {
        let mut value: u64 = 0;
        for i in 0..MAX_VARINT_LENGTH {
            let mut byte = 0;
            self.read_exact(slice::from_mut(&mut byte))?;

            if i == MAX_VARINT_LENGTH - 1 && byte & 0x7E != 0 {
                break;
            }
            value |= ((byte & 0x7F) as u64) << (i * 7);
            if byte & 0x80 == 0 {
                return Ok(value);
            }
        }
        Err(io::Error::new(io::ErrorKind::InvalidData, "varint overflow"))
    }
}

pub trait VarintWriter {
    fn write_varint(&mut self, value: u64) -> io::Result<usize>;
}

impl<W> VarintWriter for W
where
    W: io::Write,
{
    fn write_varint(&mut self, value: u64) -> io::Result<usize> {
        let mut buf = [0; MAX_VARINT_LENGTH];
        let length = encode_varint(&mut buf, value);
        self.write_all(&buf[..length])?;
        Ok(length)
    }
}

//! Fixed-width integer encoding in either byte order

use byteorder::{BigEndian, ByteOrder, LittleEndian};

use crate::error::ProtocolError;

/// Byte order selector for the wire encoders.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endian {
    Big,
    Little,
}

impl Endian {
    /// `Big` when `big_endian` is set
    pub const fn from_flag(big_endian: bool) -> Self {
        if big_endian {
            Endian::Big
        } else {
            Endian::Little
        }
    }
}

/// Single byte.
pub const fn uint8(value: u8) -> [u8; 1] {
    [value]
}

/// 32-bit integer as 4 bytes.
pub fn int_to_bytes(value: i32, endian: Endian) -> [u8; 4] {
    let mut bytes = [0u8; 4];
    match endian {
        Endian::Big => BigEndian::write_i32(&mut bytes, value),
        Endian::Little => LittleEndian::write_i32(&mut bytes, value),
    }
    bytes
}

/// 16-bit integer as 2 bytes.
pub fn short_to_bytes(value: i16, endian: Endian) -> [u8; 2] {
    let mut bytes = [0u8; 2];
    match endian {
        Endian::Big => BigEndian::write_i16(&mut bytes, value),
        Endian::Little => LittleEndian::write_i16(&mut bytes, value),
    }
    bytes
}

/// Decode exactly 4 bytes into an `i32`.
pub fn bytes_to_int(bytes: &[u8], endian: Endian) -> Result<i32, ProtocolError> {
    if bytes.len() != 4 {
        return Err(ProtocolError::IntLength(bytes.len()));
    }
    Ok(match endian {
        Endian::Big => BigEndian::read_i32(bytes),
        Endian::Little => LittleEndian::read_i32(bytes),
    })
}

/// Decode consecutive 4-byte integers.
///
/// A buffer whose length is not a multiple of 4 is rejected rather than
/// truncated, so a short read from the panel never silently drops a field.
pub fn bytes_to_int_array(bytes: &[u8], endian: Endian) -> Result<Vec<i32>, ProtocolError> {
    if bytes.len() % 4 != 0 {
        return Err(ProtocolError::IntLength(bytes.len()));
    }
    let mut values = vec![0i32; bytes.len() / 4];
    match endian {
        Endian::Big => BigEndian::read_i32_into(bytes, &mut values),
        Endian::Little => LittleEndian::read_i32_into(bytes, &mut values),
    }
    Ok(values)
}

/// Encode a list of integers back to back.
pub fn int_array_to_bytes(values: &[i32], endian: Endian) -> Vec<u8> {
    let mut bytes = vec![0u8; values.len() * 4];
    match endian {
        Endian::Big => BigEndian::write_i32_into(values, &mut bytes),
        Endian::Little => LittleEndian::write_i32_into(values, &mut bytes),
    }
    bytes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn int_round_trips_both_orders() {
        assert_eq!(int_to_bytes(1, Endian::Big), [0, 0, 0, 1]);
        assert_eq!(int_to_bytes(1, Endian::Little), [1, 0, 0, 0]);
        assert_eq!(int_to_bytes(-2, Endian::Big), [0xFF, 0xFF, 0xFF, 0xFE]);
        assert_eq!(bytes_to_int(&[0x12, 0x34, 0x56, 0x78], Endian::Big).unwrap(), 0x1234_5678);
        assert_eq!(bytes_to_int(&[0x78, 0x56, 0x34, 0x12], Endian::Little).unwrap(), 0x1234_5678);
    }

    #[test]
    fn short_encodes_signed_values() {
        assert_eq!(short_to_bytes(10, Endian::Big), [0, 10]);
        assert_eq!(short_to_bytes(10, Endian::Little), [10, 0]);
        assert_eq!(short_to_bytes(-2000, Endian::Big), [0xF8, 0x30]);
    }

    #[test]
    fn bytes_to_int_needs_four_bytes() {
        assert_eq!(
            bytes_to_int(&[1, 2, 3], Endian::Big),
            Err(ProtocolError::IntLength(3))
        );
        assert_eq!(
            bytes_to_int(&[1, 2, 3, 4, 5], Endian::Little),
            Err(ProtocolError::IntLength(5))
        );
    }

    #[test]
    fn int_array_rejects_ragged_input() {
        let ints = bytes_to_int_array(&[0, 0, 0, 7, 0, 0, 1, 0], Endian::Big).unwrap();
        assert_eq!(ints, vec![7, 256]);
        assert_eq!(
            bytes_to_int_array(&[0, 0, 0, 7, 1], Endian::Big),
            Err(ProtocolError::IntLength(5))
        );
        assert!(bytes_to_int_array(&[], Endian::Big).unwrap().is_empty());
    }

    #[test]
    fn int_array_encodes_in_order() {
        let bytes = int_array_to_bytes(&[1, 0x0102], Endian::Big);
        assert_eq!(bytes, vec![0, 0, 0, 1, 0, 0, 1, 2]);
        assert_eq!(uint8(0x80), [0x80]);
    }
}

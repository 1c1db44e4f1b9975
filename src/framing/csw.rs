//! Command Status Wrapper: the 13-byte trailer closing a round-trip

use crate::codec::{bytes_to_int, Endian};
use crate::error::ProtocolError;

/// Exact size of a status wrapper on the wire
pub const CSW_LENGTH: usize = 13;

/// Status reported by the device after a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandStatusWrapper {
    pub signature: [u8; 4],
    pub tag: u32,
    pub data_residue: u32,
    pub status: u8,
}

impl CommandStatusWrapper {
    /// Decode a status wrapper. Anything but 13 bytes is rejected.
    pub fn parse(bytes: &[u8], endian: Endian) -> Result<Self, ProtocolError> {
        if bytes.len() != CSW_LENGTH {
            return Err(ProtocolError::StatusLength(bytes.len()));
        }
        let mut signature = [0u8; 4];
        signature.copy_from_slice(&bytes[0..4]);
        Ok(CommandStatusWrapper {
            signature,
            tag: bytes_to_int(&bytes[4..8], endian)? as u32,
            data_residue: bytes_to_int(&bytes[8..12], endian)? as u32,
            status: bytes[12],
        })
    }
}

//! 16-byte vendor command block carried inside a CBW

use crate::codec::{int_to_bytes, short_to_bytes, Endian};
use crate::error::ProtocolError;

/// Size of an encoded register command
pub const REGISTER_COMMAND_LENGTH: usize = 16;

const VALUE_LENGTH: usize = 9;

/// `0xFE | 0x00 | address(4, BE) | command(1) | value(9)`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterCommand {
    pub address: u32,
    pub command: u8,
    value: [u8; VALUE_LENGTH],
}

impl RegisterCommand {
    /// Command with an all-zero value.
    pub fn new(address: u32, command: u8) -> Self {
        RegisterCommand {
            address,
            command,
            value: [0u8; VALUE_LENGTH],
        }
    }

    /// Register access: the value field carries a big-endian 16-bit length.
    pub fn with_length(address: u32, command: u8, length: u16) -> Self {
        let mut value = [0u8; VALUE_LENGTH];
        value[..2].copy_from_slice(&short_to_bytes(length as i16, Endian::Big));
        RegisterCommand {
            address,
            command,
            value,
        }
    }

    /// Arbitrary value of at most 9 bytes, zero padded.
    pub fn with_value(address: u32, command: u8, value: &[u8]) -> Result<Self, ProtocolError> {
        if value.len() > VALUE_LENGTH {
            return Err(ProtocolError::ValueTooLong(value.len()));
        }
        let mut padded = [0u8; VALUE_LENGTH];
        padded[..value.len()].copy_from_slice(value);
        Ok(RegisterCommand {
            address,
            command,
            value: padded,
        })
    }

    pub fn value(&self) -> &[u8] {
        &self.value
    }

    pub fn encode(&self) -> [u8; REGISTER_COMMAND_LENGTH] {
        let mut bytes = [0u8; REGISTER_COMMAND_LENGTH];
        bytes[0] = 0xFE;
        bytes[2..6].copy_from_slice(&int_to_bytes(self.address as i32, Endian::Big));
        bytes[6] = self.command;
        bytes[7..].copy_from_slice(&self.value);
        bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_access_layout() {
        let bytes = RegisterCommand::with_length(100, 150, 10).encode();
        assert_eq!(
            bytes,
            [0xFE, 0x00, 0, 0, 0, 100, 150, 0, 10, 0, 0, 0, 0, 0, 0, 0]
        );
    }

    #[test]
    fn value_is_padded() {
        let cmd = RegisterCommand::with_value(0x3839_3531, 0x80, &[0, 1, 0, 2]).unwrap();
        assert_eq!(
            cmd.encode(),
            [254, 0, 56, 57, 53, 49, 128, 0, 1, 0, 2, 0, 0, 0, 0, 0]
        );
        assert_eq!(cmd.value().len(), 9);
    }

    #[test]
    fn long_value_is_rejected() {
        assert_eq!(
            RegisterCommand::with_value(0, 0, &[0u8; 10]),
            Err(ProtocolError::ValueTooLong(10))
        );
        assert!(RegisterCommand::with_value(0, 0, &[0u8; 9]).is_ok());
    }

    #[test]
    fn fixed_commands() {
        let load = RegisterCommand::new(0, 0xA2).encode();
        assert_eq!(load, [254, 0, 0, 0, 0, 0, 162, 0, 0, 0, 0, 0, 0, 0, 0, 0]);
        let display = RegisterCommand::new(0, 0x94).encode();
        assert_eq!(display[6], 148);
    }
}

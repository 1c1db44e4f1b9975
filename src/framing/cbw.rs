//! Command Block Wrapper: the header of every USB bulk round-trip

use crate::codec::{int_to_bytes, Endian};

/// "USBC"
pub const CBW_SIGNATURE: [u8; 4] = *b"USBC";

/// Length of the wrapper without its command data
pub const CBW_HEADER_LENGTH: usize = 15;

/// Which way the data phase flows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Host to device
    Outgoing,
    /// Device to host
    Incoming,
}

impl Direction {
    /// `flags` byte of the wrapper
    pub const fn flags(self) -> u8 {
        match self {
            Direction::Outgoing => 0x00,
            Direction::Incoming => 0x80,
        }
    }
}

/// Header sent ahead of a command and its optional data phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandBlockWrapper {
    pub tag: u32,
    pub data_transfer_length: u32,
    pub direction: Direction,
    pub lun: u8,
    pub command_length: u8,
    pub command_data: Vec<u8>,
}

impl CommandBlockWrapper {
    /// Wrapper for LUN 0. `command_length` is the length of `command_data`,
    /// 16 for every IT8951 register command.
    pub fn new(
        tag: u32,
        data_transfer_length: u32,
        direction: Direction,
        command_data: Vec<u8>,
    ) -> Self {
        let command_length = u8::try_from(command_data.len()).unwrap_or(u8::MAX);
        CommandBlockWrapper {
            tag,
            data_transfer_length,
            direction,
            lun: 0,
            command_length,
            command_data,
        }
    }

    /// Serialize to `15 + command_data.len()` bytes.
    pub fn encode(&self, endian: Endian) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(CBW_HEADER_LENGTH + self.command_data.len());
        bytes.extend_from_slice(&CBW_SIGNATURE);
        bytes.extend_from_slice(&int_to_bytes(self.tag as i32, endian));
        bytes.extend_from_slice(&int_to_bytes(self.data_transfer_length as i32, endian));
        bytes.push(self.direction.flags());
        bytes.push(self.lun);
        bytes.push(self.command_length);
        bytes.extend_from_slice(&self.command_data);
        bytes
    }
}

//! Binary framing for the USB command tunnel
//!
//! The IT8951 USB bridge speaks a mass-storage style bulk protocol: every
//! request starts with a [`CommandBlockWrapper`], optionally followed by a
//! data phase, and ends with a 13-byte [`CommandStatusWrapper`]. The 16-byte
//! [`RegisterCommand`] rides inside the block wrapper as its command data.

pub mod cbw;
pub mod csw;
pub mod register;

pub use cbw::{CommandBlockWrapper, Direction, CBW_SIGNATURE};
pub use csw::{CommandStatusWrapper, CSW_LENGTH};
pub use register::{RegisterCommand, REGISTER_COMMAND_LENGTH};

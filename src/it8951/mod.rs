//! IT8951 e-paper timing controller
//!
//! Found on the Waveshare 6" to 10.3" HAT boards. The controller can be
//! reached two ways:
//!
//! 1. over USB, where it enumerates as a mass storage device and takes
//!    vendor SCSI commands wrapped in bulk-only CBW/CSW frames, see [`usb`]
//! 1. over SPI plus a few GPIO lines, with a 16-bit word protocol, see [`spi`]
//!
//! Both drivers upload images in horizontal strips and then ask the
//! controller to refresh the touched area.
//!
//! ### Usage
//! Drivers are normally created by [`crate::driver::build_driver`], which
//! also runs `init`. Built by hand:
//!
//! 1. open a transport and wrap it in [`UsbIt8951`] or [`SpiIt8951`]
//! 1. call `init` to learn the panel geometry
//! 1. `draw` any [`crate::raster::Canvas`], then `close`
//!

pub mod cmd;
pub mod flag;
pub mod spi;
pub mod usb;

pub use spi::SpiIt8951;
pub use usb::UsbIt8951;

/// "8951" in ASCII, the GET_SYS address and the reported signature
pub const SIGNATURE: u32 = 0x3839_3531;

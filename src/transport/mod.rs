//! Byte channels between the host and a panel controller
//!
//! Drivers only see [`Transport`]: blocking `read`, `write` and `close`.
//! The USB family gets a boxed transport from a [`TransportOpener`]; the SPI
//! family gets a concrete [`GpioTransport`] because it also needs the pin
//! helpers (reset, chip select, ready line).
//!
//! Which opener is used is decided once, from the configuration:
//! [`HardwareOpener`] talks to real devices, [`MockOpener`] keeps everything
//! in memory.

use display_interface::DisplayError;
use embedded_hal::spi::SpiDevice;

use crate::config::{SpiParams, UsbParams};
use crate::error::TransportError;

pub mod gpio;
pub mod hardware;
pub mod mock;
pub mod pins;
#[cfg(feature = "usb")]
pub mod usb;

pub use gpio::GpioTransport;
pub use hardware::HardwareOpener;
pub use mock::{MockOpener, MockPinAllocator, MockSpi, MockTransport, SpiLog};
pub use pins::{PinAllocator, PinHandle, PinMode, Pins};

/// Blocking byte channel owned by exactly one driver.
pub trait Transport: Send {
    /// Read exactly `len` bytes.
    fn read(&mut self, len: usize) -> Result<Vec<u8>, TransportError>;

    /// Write `data`, returning how many bytes went out.
    fn write(&mut self, data: &[u8]) -> Result<usize, TransportError>;

    /// Release the underlying device. Later reads and writes fail with
    /// [`TransportError::Closed`].
    fn close(&mut self) -> Result<(), TransportError>;
}

/// Raw SPI access for [`GpioTransport`].
pub trait SpiChannel: Send {
    fn write(&mut self, data: &[u8]) -> Result<(), DisplayError>;

    /// Clock out zeros while filling `buffer` with what comes back.
    fn read(&mut self, buffer: &mut [u8]) -> Result<(), DisplayError>;
}

impl<T> SpiChannel for T
where
    T: SpiDevice + Send,
{
    fn write(&mut self, data: &[u8]) -> Result<(), DisplayError> {
        SpiDevice::write(self, data).map_err(|e| {
            log::error!("SPI write error for {} bytes: {:?}", data.len(), e);
            DisplayError::BusWriteError
        })
    }

    fn read(&mut self, buffer: &mut [u8]) -> Result<(), DisplayError> {
        buffer.fill(0);
        SpiDevice::transfer_in_place(self, buffer).map_err(|_| DisplayError::BusWriteError)
    }
}

/// Opens the channel a driver family needs.
pub trait TransportOpener {
    fn open_usb(&mut self, params: &UsbParams) -> Result<Box<dyn Transport>, TransportError>;

    fn open_spi(&mut self, params: &SpiParams) -> Result<GpioTransport, TransportError>;
}

//! Opens real USB and spidev/gpio-cdev devices
use crate::config::{SpiParams, UsbParams};
use crate::error::TransportError;
use crate::transport::gpio::GpioTransport;
use crate::transport::{Transport, TransportOpener};

#[cfg(feature = "linux")]
use crate::transport::pins::{InputHandle, OutputHandle, PinAllocator, PinHandle, PinMode};
#[cfg(feature = "linux")]
use linux_embedded_hal::{
    gpio_cdev::{Chip, LineRequestFlags},
    spidev::{SpiModeFlags, SpidevOptions},
    CdevPin, Delay, SpidevDevice,
};

/// Opener for physical hardware. Families whose feature was not compiled
/// in fail with [`TransportError::Unavailable`].
#[derive(Debug, Default)]
pub struct HardwareOpener;

impl TransportOpener for HardwareOpener {
    #[cfg(feature = "usb")]
    fn open_usb(&mut self, params: &UsbParams) -> Result<Box<dyn Transport>, TransportError> {
        Ok(Box::new(crate::transport::usb::UsbTransport::open(params)?))
    }

    #[cfg(not(feature = "usb"))]
    fn open_usb(&mut self, _params: &UsbParams) -> Result<Box<dyn Transport>, TransportError> {
        Err(TransportError::Unavailable("usb"))
    }

    #[cfg(feature = "linux")]
    fn open_spi(&mut self, params: &SpiParams) -> Result<GpioTransport, TransportError> {
        log::info!("Opening {} at {} Hz", params.spi_device, params.max_speed_hz);
        let mut spi = SpidevDevice::open(&params.spi_device)
            .map_err(|e| TransportError::open("spi device", e))?;
        // chip select is driven through the pin table
        let options = SpidevOptions::new()
            .bits_per_word(8)
            .max_speed_hz(params.max_speed_hz)
            .mode(SpiModeFlags::SPI_MODE_0 | SpiModeFlags::SPI_NO_CS)
            .build();
        spi.configure(&options)?;

        let chip = Chip::new(&params.gpio_chip).map_err(|e| TransportError::open("gpio chip", e))?;

        Ok(GpioTransport::new(
            Box::new(spi),
            Box::new(CdevAllocator { chip }),
            Box::new(Delay),
            params.max_transfer,
        ))
    }

    #[cfg(not(feature = "linux"))]
    fn open_spi(&mut self, _params: &SpiParams) -> Result<GpioTransport, TransportError> {
        Err(TransportError::Unavailable("spi"))
    }
}

/// Requests lines from a gpio character device.
#[cfg(feature = "linux")]
struct CdevAllocator {
    chip: Chip,
}

#[cfg(feature = "linux")]
impl PinAllocator for CdevAllocator {
    fn pin(&mut self, number: u8, mode: PinMode) -> Result<Box<dyn PinHandle>, TransportError> {
        let line = self
            .chip
            .get_line(u32::from(number))
            .map_err(|e| TransportError::open("gpio line", e))?;
        let flags = match mode {
            PinMode::Input => LineRequestFlags::INPUT,
            PinMode::Output => LineRequestFlags::OUTPUT,
        };
        let request = line
            .request(flags, 0, "inkpanel")
            .map_err(|e| TransportError::open("gpio line", e))?;
        let pin = CdevPin::new(request).map_err(|e| TransportError::open("gpio line", e))?;

        let handle: Box<dyn PinHandle> = match mode {
            PinMode::Input => Box::new(InputHandle::new(number, pin)),
            PinMode::Output => Box::new(OutputHandle::new(number, pin)),
        };
        Ok(handle)
    }
}

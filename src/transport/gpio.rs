//! SPI transport with hand-driven control pins
use std::collections::BTreeMap;
use std::time::Instant;

use embedded_hal::delay::DelayNs;

use crate::driver::ReadyPolicy;
use crate::error::{PanelError, TransportError};
use crate::transport::pins::{PinAllocator, PinHandle, PinMode, Pins};
use crate::transport::{SpiChannel, Transport};

const RESET_DELAY_MS: u32 = 100;

/// SPI bus plus a table of allocated GPIO lines.
///
/// Pins are only requested in [`GpioTransport::allocate_pins`], so building
/// the transport never touches the gpio chip.
pub struct GpioTransport {
    spi: Box<dyn SpiChannel>,
    /// Allocated lines keyed by BCM number
    pins: BTreeMap<u8, Box<dyn PinHandle>>,
    allocator: Box<dyn PinAllocator>,
    delay: Box<dyn DelayNs + Send>,
    /// Swap the two bytes of every packed word before sending
    word_flip: bool,
    max_transfer: usize,
    closed: bool,
}

impl GpioTransport {
    /// Wrap an SPI channel. Writes longer than `max_transfer` are split.
    pub fn new(
        spi: Box<dyn SpiChannel>,
        allocator: Box<dyn PinAllocator>,
        delay: Box<dyn DelayNs + Send>,
        max_transfer: usize,
    ) -> Self {
        GpioTransport {
            spi,
            pins: BTreeMap::new(),
            allocator,
            delay,
            word_flip: false,
            max_transfer: max_transfer.max(1),
            closed: false,
        }
    }

    pub fn word_flip(&self) -> bool {
        self.word_flip
    }

    pub fn set_word_flip(&mut self, word_flip: bool) {
        self.word_flip = word_flip;
    }

    /// Request RST, CS and BUSY, and DC when `use_dc` is set.
    pub fn allocate_pins(&mut self, use_dc: bool) -> Result<(), TransportError> {
        log::info!("Allocating panel GPIO lines (dc pin: {})", use_dc);
        self.allocate(Pins::RST, PinMode::Output)?;
        if use_dc {
            self.allocate(Pins::DC, PinMode::Output)?;
        }
        self.allocate(Pins::CS, PinMode::Output)?;
        self.allocate(Pins::BUSY, PinMode::Input)?;
        Ok(())
    }

    fn allocate(&mut self, number: u8, mode: PinMode) -> Result<(), TransportError> {
        let handle = self.allocator.pin(number, mode)?;
        self.pins.insert(number, handle);
        Ok(())
    }

    pub fn has_pin(&self, number: u8) -> bool {
        self.pins.contains_key(&number)
    }

    /// Allocated pin numbers in ascending order
    pub fn allocated_pins(&self) -> Vec<u8> {
        self.pins.keys().copied().collect()
    }

    fn pin(&mut self, number: u8) -> Result<&mut Box<dyn PinHandle>, TransportError> {
        if self.closed {
            return Err(TransportError::Closed);
        }
        self.pins
            .get_mut(&number)
            .ok_or(TransportError::PinNotAllocated(number))
    }

    pub fn set_pin(&mut self, number: u8, high: bool) -> Result<(), TransportError> {
        let pin = self.pin(number)?;
        if high {
            pin.set_high()?;
        } else {
            pin.set_low()?;
        }
        Ok(())
    }

    pub fn read_pin(&mut self, number: u8) -> Result<bool, TransportError> {
        Ok(self.pin(number)?.is_high()?)
    }

    /// Pulse RST low, leaving chip select released.
    pub fn reset(&mut self) -> Result<(), TransportError> {
        log::info!("Resetting panel controller");
        self.set_pin(Pins::CS, true)?;
        self.set_pin(Pins::RST, true)?;
        self.delay.delay_ms(RESET_DELAY_MS);
        self.set_pin(Pins::RST, false)?;
        self.delay.delay_ms(RESET_DELAY_MS);
        self.set_pin(Pins::RST, true)?;
        self.delay.delay_ms(RESET_DELAY_MS);
        Ok(())
    }

    /// Assert chip select (active low).
    pub fn select(&mut self) -> Result<(), TransportError> {
        self.set_pin(Pins::CS, false)
    }

    pub fn deselect(&mut self) -> Result<(), TransportError> {
        self.set_pin(Pins::CS, true)
    }

    /// Select data (`true`) or command (`false`) when a DC line is allocated.
    pub fn set_data_mode(&mut self, data: bool) -> Result<(), TransportError> {
        if self.has_pin(Pins::DC) {
            self.set_pin(Pins::DC, data)?;
        }
        Ok(())
    }

    pub fn delay_ms(&mut self, ms: u32) {
        self.delay.delay_ms(ms);
    }

    /// Wait until the BUSY/HRDY line goes high.
    pub fn wait_until_gpio_pin_ready(&mut self, policy: &ReadyPolicy) -> Result<(), PanelError> {
        let started = Instant::now();
        loop {
            if self.read_pin(Pins::BUSY)? {
                return Ok(());
            }
            if let Some(timeout) = policy.timeout {
                if started.elapsed() >= timeout {
                    log::error!("Timed out waiting for the ready line after {:?}", timeout);
                    return Err(PanelError::NotReady(timeout));
                }
            }
            self.delay.delay_us(policy.interval_us());
        }
    }

    fn check_open(&self) -> Result<(), TransportError> {
        if self.closed {
            Err(TransportError::Closed)
        } else {
            Ok(())
        }
    }
}

impl Transport for GpioTransport {
    fn read(&mut self, len: usize) -> Result<Vec<u8>, TransportError> {
        self.check_open()?;
        let mut buffer = vec![0u8; len];
        self.spi.read(&mut buffer)?;
        Ok(buffer)
    }

    fn write(&mut self, data: &[u8]) -> Result<usize, TransportError> {
        self.check_open()?;
        for chunk in data.chunks(self.max_transfer) {
            self.spi.write(chunk)?;
        }
        Ok(data.len())
    }

    /// Release every pin. The SPI device itself is closed on drop.
    fn close(&mut self) -> Result<(), TransportError> {
        if self.closed {
            return Ok(());
        }
        if self.has_pin(Pins::CS) {
            self.deselect()?;
        }
        self.pins.clear();
        self.closed = true;
        Ok(())
    }
}

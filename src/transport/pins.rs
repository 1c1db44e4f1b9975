//! GPIO pin numbers and pin handle abstractions for the SPI family
//!
//! Numbers are BCM offsets on a Raspberry Pi header, which is how the
//! Waveshare IT8951 HAT is wired.

use display_interface::DisplayError;
use embedded_hal::digital::{InputPin, OutputPin};

use crate::error::TransportError;

/// Pin configuration constants for the panel HAT
pub struct Pins;

impl Pins {
    /// Reset pin for the controller
    pub const RST: u8 = 17;
    /// Data/Command control pin (High for data, Low for command)
    pub const DC: u8 = 25;
    /// Chip Select, driven by hand rather than by spidev
    pub const CS: u8 = 8;
    /// HRDY on IT8951, high when the controller can take the next word
    pub const BUSY: u8 = 24;
}

/// Direction a pin is requested with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinMode {
    Input,
    Output,
}

/// A single allocated GPIO line.
pub trait PinHandle: Send {
    fn set_high(&mut self) -> Result<(), DisplayError>;
    fn set_low(&mut self) -> Result<(), DisplayError>;
    fn is_high(&mut self) -> Result<bool, DisplayError>;
}

/// Hands out pin handles by number.
pub trait PinAllocator: Send {
    fn pin(&mut self, number: u8, mode: PinMode) -> Result<Box<dyn PinHandle>, TransportError>;
}

/// `DisplayError` flavour reported for failures on `number`.
///
/// There is no busy variant, so the busy line reports `DCError` like any
/// other control line.
pub fn pin_error(number: u8) -> DisplayError {
    match number {
        Pins::CS => DisplayError::CSError,
        Pins::RST => DisplayError::RSError,
        _ => DisplayError::DCError,
    }
}

/// Adapter from an `embedded_hal` output pin
pub struct OutputHandle<P> {
    number: u8,
    pin: P,
}

impl<P: OutputPin> OutputHandle<P> {
    pub fn new(number: u8, pin: P) -> Self {
        OutputHandle { number, pin }
    }
}

impl<P> PinHandle for OutputHandle<P>
where
    P: OutputPin + Send,
{
    fn set_high(&mut self) -> Result<(), DisplayError> {
        self.pin.set_high().map_err(|_| pin_error(self.number))
    }

    fn set_low(&mut self) -> Result<(), DisplayError> {
        self.pin.set_low().map_err(|_| pin_error(self.number))
    }

    /// Output lines cannot be sampled
    fn is_high(&mut self) -> Result<bool, DisplayError> {
        Err(pin_error(self.number))
    }
}

/// Adapter from an `embedded_hal` input pin
pub struct InputHandle<P> {
    number: u8,
    pin: P,
}

impl<P: InputPin> InputHandle<P> {
    pub fn new(number: u8, pin: P) -> Self {
        InputHandle { number, pin }
    }
}

impl<P> PinHandle for InputHandle<P>
where
    P: InputPin + Send,
{
    fn set_high(&mut self) -> Result<(), DisplayError> {
        Err(pin_error(self.number))
    }

    fn set_low(&mut self) -> Result<(), DisplayError> {
        Err(pin_error(self.number))
    }

    fn is_high(&mut self) -> Result<bool, DisplayError> {
        self.pin.is_high().map_err(|_| pin_error(self.number))
    }
}

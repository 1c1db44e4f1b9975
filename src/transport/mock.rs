//! In-memory transports
//!
//! Every mock keeps its state behind an `Arc<Mutex<_>>`, so a clone handed to
//! a driver and a clone kept by the caller see the same traffic.

use std::collections::{BTreeMap, VecDeque};
use std::convert::Infallible;
use std::sync::{Arc, Mutex, MutexGuard};

use display_interface::DisplayError;
use embedded_hal::delay::DelayNs;
use embedded_hal::spi::{ErrorType, Operation, SpiDevice};

use crate::config::{SpiParams, UsbParams};
use crate::error::TransportError;
use crate::framing::{CBW_SIGNATURE, CSW_LENGTH};
use crate::it8951::spi::DeviceInfo;
use crate::it8951::usb::SystemInfo;
use crate::transport::gpio::GpioTransport;
use crate::transport::pins::{pin_error, PinAllocator, PinHandle, PinMode};
use crate::transport::{Transport, TransportOpener};

fn lock<T>(state: &Mutex<T>) -> MutexGuard<'_, T> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[derive(Debug, Default)]
struct TransportState {
    writes: Vec<Vec<u8>>,
    reads: Vec<usize>,
    responses: VecDeque<Vec<u8>>,
    echo_status: bool,
    last_tag: [u8; 4],
    closed: bool,
    close_calls: usize,
}

/// Records writes and answers reads from a queue, then with zeros.
#[derive(Debug, Clone, Default)]
pub struct MockTransport {
    state: Arc<Mutex<TransportState>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// A transport that behaves like the IT8951 USB bridge: every 13-byte
    /// read is answered with a status wrapper echoing the last issued tag.
    pub fn usb_bridge() -> Self {
        let transport = Self::new();
        lock(&transport.state).echo_status = true;
        transport
    }

    /// Serve `response` to the next data read, padded or cut to its length.
    pub fn queue_response(&self, response: impl Into<Vec<u8>>) {
        lock(&self.state).responses.push_back(response.into());
    }

    /// Every buffer written so far, oldest first
    pub fn writes(&self) -> Vec<Vec<u8>> {
        lock(&self.state).writes.clone()
    }

    /// Length requested by every read so far
    pub fn reads(&self) -> Vec<usize> {
        lock(&self.state).reads.clone()
    }

    pub fn clear_history(&self) {
        let mut state = lock(&self.state);
        state.writes.clear();
        state.reads.clear();
    }

    pub fn is_closed(&self) -> bool {
        lock(&self.state).closed
    }

    pub fn close_calls(&self) -> usize {
        lock(&self.state).close_calls
    }
}

impl Transport for MockTransport {
    fn read(&mut self, len: usize) -> Result<Vec<u8>, TransportError> {
        let mut state = lock(&self.state);
        if state.closed {
            return Err(TransportError::Closed);
        }
        state.reads.push(len);

        if state.echo_status && len == CSW_LENGTH {
            let mut status = vec![0u8; CSW_LENGTH];
            status[0..4].copy_from_slice(b"USBS");
            status[4..8].copy_from_slice(&state.last_tag);
            return Ok(status);
        }

        let mut response = state.responses.pop_front().unwrap_or_default();
        response.resize(len, 0);
        Ok(response)
    }

    fn write(&mut self, data: &[u8]) -> Result<usize, TransportError> {
        let mut state = lock(&self.state);
        if state.closed {
            return Err(TransportError::Closed);
        }
        if data.len() >= 8 && data[0..4] == CBW_SIGNATURE {
            state.last_tag.copy_from_slice(&data[4..8]);
        }
        state.writes.push(data.to_vec());
        Ok(data.len())
    }

    fn close(&mut self) -> Result<(), TransportError> {
        let mut state = lock(&self.state);
        state.close_calls += 1;
        state.closed = true;
        Ok(())
    }
}

/// SPI traffic seen by a [`MockSpi`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpiLog {
    pub writes: Vec<Vec<u8>>,
    pub reads: Vec<usize>,
}

#[derive(Debug, Default)]
struct SpiState {
    log: SpiLog,
    incoming: VecDeque<u8>,
}

/// `embedded_hal` SPI device that records writes and serves queued bytes.
#[derive(Debug, Clone, Default)]
pub struct MockSpi {
    state: Arc<Mutex<SpiState>>,
}

impl MockSpi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append bytes to the stream later reads consume.
    pub fn queue_read(&self, bytes: &[u8]) {
        lock(&self.state).incoming.extend(bytes.iter().copied());
    }

    /// Append big-endian 16-bit words to the read stream.
    pub fn queue_words(&self, words: &[u16]) {
        let bytes: Vec<u8> = words.iter().flat_map(|w| w.to_be_bytes()).collect();
        self.queue_read(&bytes);
    }

    pub fn log(&self) -> SpiLog {
        lock(&self.state).log.clone()
    }

    pub fn clear_log(&self) {
        lock(&self.state).log = SpiLog::default();
    }

    /// Every written byte, concatenated
    pub fn written_bytes(&self) -> Vec<u8> {
        lock(&self.state).log.writes.concat()
    }

    fn fill(state: &mut SpiState, buffer: &mut [u8]) {
        state.log.reads.push(buffer.len());
        for byte in buffer.iter_mut() {
            *byte = state.incoming.pop_front().unwrap_or(0);
        }
    }
}

impl ErrorType for MockSpi {
    type Error = Infallible;
}

impl SpiDevice for MockSpi {
    fn transaction(&mut self, operations: &mut [Operation<'_, u8>]) -> Result<(), Self::Error> {
        let mut state = lock(&self.state);
        for operation in operations {
            match operation {
                Operation::Write(data) => state.log.writes.push(data.to_vec()),
                Operation::Read(buffer) | Operation::TransferInPlace(buffer) => {
                    Self::fill(&mut state, buffer)
                }
                Operation::Transfer(read, write) => {
                    state.log.writes.push(write.to_vec());
                    Self::fill(&mut state, read);
                }
                Operation::DelayNs(_) => {}
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
struct PinState {
    mode: PinMode,
    level: bool,
    history: Vec<bool>,
}

/// Pin allocator whose inputs read high (ready) unless told otherwise.
#[derive(Debug, Clone, Default)]
pub struct MockPinAllocator {
    pins: Arc<Mutex<BTreeMap<u8, PinState>>>,
}

impl MockPinAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mode(&self, number: u8) -> Option<PinMode> {
        lock(&self.pins).get(&number).map(|pin| pin.mode)
    }

    /// Levels driven onto an output pin, oldest first
    pub fn history(&self, number: u8) -> Vec<bool> {
        lock(&self.pins)
            .get(&number)
            .map(|pin| pin.history.clone())
            .unwrap_or_default()
    }

    /// Force the level an input pin reads.
    pub fn set_input(&self, number: u8, high: bool) {
        if let Some(pin) = lock(&self.pins).get_mut(&number) {
            pin.level = high;
        }
    }
}

impl PinAllocator for MockPinAllocator {
    fn pin(&mut self, number: u8, mode: PinMode) -> Result<Box<dyn PinHandle>, TransportError> {
        lock(&self.pins).insert(
            number,
            PinState {
                mode,
                level: mode == PinMode::Input,
                history: Vec::new(),
            },
        );
        Ok(Box::new(MockPin {
            number,
            pins: Arc::clone(&self.pins),
        }))
    }
}

struct MockPin {
    number: u8,
    pins: Arc<Mutex<BTreeMap<u8, PinState>>>,
}

impl MockPin {
    fn drive(&mut self, high: bool) -> Result<(), DisplayError> {
        let mut pins = lock(&self.pins);
        let pin = pins
            .get_mut(&self.number)
            .ok_or_else(|| pin_error(self.number))?;
        pin.level = high;
        pin.history.push(high);
        Ok(())
    }
}

impl PinHandle for MockPin {
    fn set_high(&mut self) -> Result<(), DisplayError> {
        self.drive(true)
    }

    fn set_low(&mut self) -> Result<(), DisplayError> {
        self.drive(false)
    }

    fn is_high(&mut self) -> Result<bool, DisplayError> {
        lock(&self.pins)
            .get(&self.number)
            .map(|pin| pin.level)
            .ok_or_else(|| pin_error(self.number))
    }
}

/// Delay provider that returns immediately
#[derive(Debug, Clone, Copy, Default)]
pub struct NoDelay;

impl DelayNs for NoDelay {
    fn delay_ns(&mut self, _ns: u32) {}
}

/// Geometry reported by the simulated IT8951 controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MockPanelInfo {
    pub width: u32,
    pub height: u32,
    pub image_buffer_base: u32,
    pub display_modes: u32,
}

impl Default for MockPanelInfo {
    fn default() -> Self {
        // 10.3" Waveshare panel
        MockPanelInfo {
            width: 1872,
            height: 1404,
            image_buffer_base: 0x0012_36E0,
            display_modes: 6,
        }
    }
}

/// Hands out in-memory channels primed to answer the IT8951 bring-up
/// queries, and keeps a handle on each so tests can inspect the traffic.
#[derive(Debug, Default)]
pub struct MockOpener {
    panel: MockPanelInfo,
    usb: Vec<MockTransport>,
    spi: Vec<(MockSpi, MockPinAllocator)>,
}

impl MockOpener {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_panel(panel: MockPanelInfo) -> Self {
        MockOpener {
            panel,
            ..Self::default()
        }
    }

    pub fn usb_opens(&self) -> usize {
        self.usb.len()
    }

    pub fn spi_opens(&self) -> usize {
        self.spi.len()
    }

    pub fn last_usb(&self) -> Option<MockTransport> {
        self.usb.last().cloned()
    }

    pub fn last_spi(&self) -> Option<(MockSpi, MockPinAllocator)> {
        self.spi.last().cloned()
    }
}

impl TransportOpener for MockOpener {
    fn open_usb(&mut self, params: &UsbParams) -> Result<Box<dyn Transport>, TransportError> {
        log::debug!(
            "Opening in-memory USB bridge for {:04x}:{:04x}",
            params.vendor_id,
            params.product_id
        );
        let transport = MockTransport::usb_bridge();
        transport.queue_response(SystemInfo::for_panel(&self.panel).to_bytes());
        self.usb.push(transport.clone());
        Ok(Box::new(transport))
    }

    fn open_spi(&mut self, params: &SpiParams) -> Result<GpioTransport, TransportError> {
        log::debug!("Opening in-memory SPI bus for {}", params.spi_device);
        let spi = MockSpi::new();
        // dummy word, then the device info block
        spi.queue_words(&[0]);
        spi.queue_words(&DeviceInfo::for_panel(&self.panel).to_words());
        let pins = MockPinAllocator::new();
        self.spi.push((spi.clone(), pins.clone()));
        Ok(GpioTransport::new(
            Box::new(spi),
            Box::new(pins),
            Box::new(NoDelay),
            params.max_transfer,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serves_queue_then_zeros() {
        let mut transport = MockTransport::new();
        transport.queue_response(vec![1, 2, 3]);
        assert_eq!(transport.read(2).unwrap(), vec![1, 2]);
        assert_eq!(transport.read(2).unwrap(), vec![0, 0]);
        assert_eq!(transport.reads(), vec![2, 2]);
    }

    #[test]
    fn echoes_status_tag() {
        let mut transport = MockTransport::usb_bridge();
        let mut cbw = b"USBC".to_vec();
        cbw.extend_from_slice(&[9, 0, 0, 0]);
        transport.write(&cbw).unwrap();
        let status = transport.read(CSW_LENGTH).unwrap();
        assert_eq!(&status[0..4], b"USBS");
        assert_eq!(&status[4..8], &[9, 0, 0, 0]);
    }

    #[test]
    fn closed_mock_rejects_io() {
        let mut transport = MockTransport::new();
        let observer = transport.clone();
        transport.close().unwrap();
        assert!(observer.is_closed());
        assert!(matches!(transport.write(&[0]), Err(TransportError::Closed)));
    }

    #[test]
    fn mock_spi_is_an_spi_device() {
        let mut spi = MockSpi::new();
        spi.queue_words(&[0x1234]);
        SpiDevice::write(&mut spi, &[0x60, 0x00]).unwrap();
        let mut buffer = [0u8; 3];
        SpiDevice::read(&mut spi, &mut buffer).unwrap();
        assert_eq!(buffer, [0x12, 0x34, 0]);
        assert_eq!(spi.log().writes, vec![vec![0x60, 0x00]]);
        assert_eq!(spi.log().reads, vec![3]);
    }

    #[test]
    fn opener_counts_opens() {
        let mut opener = MockOpener::new();
        opener.open_usb(&UsbParams::default()).unwrap();
        opener.open_spi(&SpiParams::default()).unwrap();
        opener.open_spi(&SpiParams::default()).unwrap();
        assert_eq!(opener.usb_opens(), 1);
        assert_eq!(opener.spi_opens(), 2);
    }
}

//! Protocol-less panels for exercising callers without hardware
use crate::driver::{
    check_bounds, DisplayMode, DriverState, PanelDriver, QueryResult, RegisterAccess,
};
use crate::error::Result;
use crate::packer::{pack, Bpp};
use crate::raster::Canvas;
use crate::transport::gpio::GpioTransport;
use crate::transport::mock::{MockPinAllocator, MockSpi, MockTransport, NoDelay};
use crate::transport::Transport;

/// VCOM every mock panel reports
pub const MOCK_VCOM: i32 = 2000;
pub const MOCK_WIDTH: u32 = 800;
pub const MOCK_HEIGHT: u32 = 600;

enum Link {
    Usb(Box<dyn Transport>),
    Gpio { gpio: GpioTransport, use_dc_pin: bool },
}

impl Link {
    fn transport(&mut self) -> &mut dyn Transport {
        match self {
            Link::Usb(transport) => transport.as_mut(),
            Link::Gpio { gpio, .. } => gpio,
        }
    }
}

/// A panel that speaks no protocol. `draw` packs the image and writes the
/// packed bytes straight to the transport.
pub struct MockPanel {
    link: Link,
    state: DriverState,
    bpp: Bpp,
    width: u32,
    height: u32,
}

impl MockPanel {
    /// USB family panel over `transport`.
    pub fn usb(transport: Box<dyn Transport>, bpp: Bpp, width: u32, height: u32) -> Self {
        Self::with_link(Link::Usb(transport), bpp, width, height)
    }

    /// GPIO family panel; pins are requested during `init`.
    pub fn gpio(gpio: GpioTransport, use_dc_pin: bool, bpp: Bpp, width: u32, height: u32) -> Self {
        Self::with_link(Link::Gpio { gpio, use_dc_pin }, bpp, width, height)
    }

    /// USB family panel on a fresh [`MockTransport`]. The returned clone
    /// sees every byte the panel writes.
    pub fn in_memory_usb(bpp: Bpp) -> (Self, MockTransport) {
        let transport = MockTransport::new();
        let panel = Self::usb(Box::new(transport.clone()), bpp, MOCK_WIDTH, MOCK_HEIGHT);
        (panel, transport)
    }

    /// GPIO family panel on a fresh [`MockSpi`] and pin allocator.
    pub fn in_memory_gpio(bpp: Bpp, use_dc_pin: bool) -> (Self, MockSpi, MockPinAllocator) {
        let spi = MockSpi::new();
        let pins = MockPinAllocator::new();
        let gpio = GpioTransport::new(
            Box::new(spi.clone()),
            Box::new(pins.clone()),
            Box::new(NoDelay),
            4096,
        );
        let panel = Self::gpio(gpio, use_dc_pin, bpp, MOCK_WIDTH, MOCK_HEIGHT);
        (panel, spi, pins)
    }

    fn with_link(link: Link, bpp: Bpp, width: u32, height: u32) -> Self {
        MockPanel {
            link,
            state: DriverState::Uninitialized,
            bpp,
            width,
            height,
        }
    }

    pub fn state(&self) -> DriverState {
        self.state
    }
}

impl RegisterAccess for MockPanel {
    fn read_register(&mut self, _address: u32, length: u16) -> Result<Vec<u8>> {
        self.state.ensure_initialized()?;
        Ok(vec![0; length as usize])
    }

    fn write_register(&mut self, _address: u32, _data: &[u8]) -> Result<()> {
        self.state.ensure_initialized()
    }

    fn write_register_fast(&mut self, _address: u32, _data: &[u8]) -> Result<()> {
        self.state.ensure_initialized()
    }
}

impl PanelDriver for MockPanel {
    fn init(&mut self) -> Result<()> {
        self.state.ensure_open()?;
        if let Link::Gpio { gpio, use_dc_pin } = &mut self.link {
            gpio.allocate_pins(*use_dc_pin)?;
        }
        log::info!("Mock panel {}x{} at {}", self.width, self.height, self.bpp);
        self.state = DriverState::Initialized;
        Ok(())
    }

    fn wait_until_panel_ready(&mut self) -> Result<()> {
        self.state.ensure_initialized()
    }

    fn draw(
        &mut self,
        x: u32,
        y: u32,
        image: &Canvas,
        _mode: Option<DisplayMode>,
        _refresh_after: bool,
    ) -> Result<()> {
        self.state.ensure_initialized()?;
        check_bounds(x, y, image, self.width, self.height)?;

        let mut gray = image.export_grayscale(None);
        let step = self.bpp.step();
        gray.resize(gray.len().div_ceil(step) * step, 0);
        let packed = pack(self.bpp, &gray, false)?;
        log::debug!("Mock draw at ({}, {}): {} bytes", x, y, packed.len());
        if !packed.is_empty() {
            self.link.transport().write(&packed)?;
        }
        Ok(())
    }

    fn clear(&mut self) -> Result<()> {
        self.state.ensure_initialized()
    }

    fn query(&mut self) -> Result<QueryResult> {
        self.state.ensure_initialized()?;
        Ok(QueryResult {
            vcom: Some(MOCK_VCOM),
            ..QueryResult::default()
        })
    }

    fn set_bpp(&mut self, bpp: Bpp) -> Result<()> {
        self.state.ensure_initialized()?;
        self.bpp = bpp;
        Ok(())
    }

    fn set_vcom(&mut self, _vcom: i16) -> Result<()> {
        self.state.ensure_initialized()
    }

    fn close(&mut self) {
        if self.state == DriverState::Closed {
            return;
        }
        if let Err(e) = self.link.transport().close() {
            log::warn!("Failed to close mock transport: {}", e);
        }
        self.state = DriverState::Closed;
    }

    fn bpp(&self) -> Bpp {
        self.bpp
    }

    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{PanelError, ProtocolError, TransportError};
    use crate::raster::WHITE;
    use crate::transport::Pins;

    #[test]
    fn usb_mock_writes_packed_image() {
        let (mut panel, transport) = MockPanel::in_memory_usb(Bpp::One);
        panel.init().unwrap();

        let mut image = Canvas::new(20, 2);
        image.fill(WHITE);
        panel.draw(0, 0, &image, None, true).unwrap();

        // 40 samples padded to 48, 6 bytes at 1bpp
        let writes = transport.writes();
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0].len(), 6);
        assert_eq!(&writes[0][..5], &[0xFF; 5]);
    }

    #[test]
    fn gpio_mock_allocates_pins() {
        let (mut panel, spi, pins) = MockPanel::in_memory_gpio(Bpp::Eight, true);
        panel.init().unwrap();
        assert!(pins.mode(Pins::DC).is_some());
        assert!(pins.mode(Pins::BUSY).is_some());

        let mut image = Canvas::new(2, 1);
        image.fill(WHITE);
        panel.draw(10, 10, &image, None, false).unwrap();
        assert_eq!(spi.written_bytes(), vec![0xFF, 0xFF]);
    }

    #[test]
    fn mock_reports_vcom() {
        let (mut panel, _) = MockPanel::in_memory_usb(Bpp::One);
        panel.init().unwrap();
        assert_eq!(panel.query().unwrap().vcom, Some(2000));
        panel.set_bpp(Bpp::Two).unwrap();
        assert_eq!(panel.bpp(), Bpp::Two);
    }

    #[test]
    fn mock_validates_region() {
        let (mut panel, transport) = MockPanel::in_memory_usb(Bpp::One);
        panel.init().unwrap();
        let image = Canvas::new(10, 10);
        assert!(matches!(
            panel.draw(MOCK_WIDTH - 5, 0, &image, None, true),
            Err(PanelError::Protocol(ProtocolError::OutOfBounds { .. }))
        ));
        assert!(transport.writes().is_empty());
    }

    #[test]
    fn mock_lifecycle() {
        let (mut panel, transport) = MockPanel::in_memory_usb(Bpp::One);
        assert!(matches!(
            panel.clear(),
            Err(PanelError::Protocol(ProtocolError::NotInitialized))
        ));
        panel.init().unwrap();
        panel.close();
        panel.close();
        assert_eq!(transport.close_calls(), 1);
        assert!(matches!(
            panel.query(),
            Err(PanelError::Transport(TransportError::Closed))
        ));
    }
}

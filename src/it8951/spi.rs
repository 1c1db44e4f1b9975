//! IT8951 on the SPI host interface
//!
//! Everything on the wire is a 16-bit word, most significant byte first.
//! Each transfer starts with a preamble word telling the controller what
//! follows: a command, data to write, or a request to read data back. The
//! controller drops HRDY while it digests a word, so every phase waits for
//! the BUSY line first.
//!
//! Packed pixels are sent with the two bytes of each word swapped, which
//! puts the first pixel in the low bits where the controller expects it.

use std::time::Instant;

use crate::driver::strip::{max_chunk_height, packed_strip, row_samples, strips, MAX_TRANSFER};
use crate::driver::{
    check_bounds, DisplayMode, DriverState, PanelDriver, QueryResult, ReadyPolicy, RegisterAccess,
};
use crate::error::{PanelError, ProtocolError, Result};
use crate::it8951::cmd::SpiCmd;
use crate::it8951::flag::{Flag, Reg};
use crate::packer::Bpp;
use crate::raster::{Canvas, WHITE};
use crate::transport::gpio::GpioTransport;
use crate::transport::mock::MockPanelInfo;
use crate::transport::Transport;

/// Words in the GET_DEV_INFO reply
pub const DEVICE_INFO_WORDS: usize = 20;

/// Controller description returned by GET_DEV_INFO.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    pub width: u16,
    pub height: u16,
    pub image_buffer_address: u32,
    pub firmware: String,
    pub lut: String,
}

impl DeviceInfo {
    pub fn from_words(words: &[u16]) -> std::result::Result<Self, ProtocolError> {
        if words.len() < DEVICE_INFO_WORDS {
            return Err(ProtocolError::ShortInfo {
                what: "device info",
                len: words.len() * 2,
            });
        }
        Ok(DeviceInfo {
            width: words[0],
            height: words[1],
            image_buffer_address: u32::from(words[2]) | (u32::from(words[3]) << 16),
            firmware: words_to_string(&words[4..12]),
            lut: words_to_string(&words[12..20]),
        })
    }

    pub fn to_words(&self) -> Vec<u16> {
        let mut words = vec![
            self.width,
            self.height,
            self.image_buffer_address as u16,
            (self.image_buffer_address >> 16) as u16,
        ];
        words.extend(string_to_words(&self.firmware));
        words.extend(string_to_words(&self.lut));
        words
    }

    /// What a simulated controller with `panel` geometry reports
    pub fn for_panel(panel: &MockPanelInfo) -> Self {
        DeviceInfo {
            width: panel.width as u16,
            height: panel.height as u16,
            image_buffer_address: panel.image_buffer_base,
            firmware: "SWv_0.1.1".to_string(),
            lut: "M841_TFAB512".to_string(),
        }
    }
}

/// 8 words of NUL padded ASCII, high byte first
fn words_to_string(words: &[u16]) -> String {
    let bytes: Vec<u8> = words
        .iter()
        .flat_map(|w| w.to_be_bytes())
        .take_while(|&b| b != 0)
        .collect();
    String::from_utf8_lossy(&bytes).into_owned()
}

fn string_to_words(text: &str) -> Vec<u16> {
    let mut bytes = [0u8; 16];
    for (out, byte) in bytes.iter_mut().zip(text.bytes()) {
        *out = byte;
    }
    bytes
        .chunks_exact(2)
        .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
        .collect()
}

/// IT8951 wired to SPI and a handful of GPIO lines.
pub struct SpiIt8951 {
    gpio: GpioTransport,
    state: DriverState,
    /// Panel refresh wait
    ready: ReadyPolicy,
    /// Per-word HRDY wait
    hrdy: ReadyPolicy,
    use_dc_pin: bool,
    bpp: Bpp,
    width: u32,
    height: u32,
    base_address: u32,
    pitch: usize,
    max_chunk_height: u32,
    last_display_mode: DisplayMode,
    device_info: Option<DeviceInfo>,
    /// VCOM written during init
    vcom: Option<i16>,
}

impl SpiIt8951 {
    pub fn new(
        gpio: GpioTransport,
        bpp: Bpp,
        ready: ReadyPolicy,
        use_dc_pin: bool,
        vcom: Option<i16>,
    ) -> Self {
        let hrdy = ReadyPolicy {
            interval: std::time::Duration::ZERO,
            timeout: ready.timeout,
        };
        SpiIt8951 {
            gpio,
            state: DriverState::Uninitialized,
            ready,
            hrdy,
            use_dc_pin,
            bpp,
            width: 0,
            height: 0,
            base_address: 0,
            pitch: 0,
            max_chunk_height: 0,
            last_display_mode: DisplayMode::INIT,
            device_info: None,
            vcom,
        }
    }

    pub fn state(&self) -> DriverState {
        self.state
    }

    pub fn pitch(&self) -> usize {
        self.pitch
    }

    pub fn max_chunk_height(&self) -> u32 {
        self.max_chunk_height
    }

    pub fn device_info(&self) -> Option<&DeviceInfo> {
        self.device_info.as_ref()
    }

    fn wait_hrdy(&mut self) -> Result<()> {
        self.gpio.wait_until_gpio_pin_ready(&self.hrdy)
    }

    /// Preamble then payload inside one chip select window.
    fn transfer(&mut self, preamble: u16, payload: &[u8]) -> Result<()> {
        self.state.ensure_open()?;
        self.gpio.set_data_mode(preamble != Flag::PREAMBLE_COMMAND)?;
        self.wait_hrdy()?;
        self.gpio.select()?;
        self.gpio.write(&preamble.to_be_bytes())?;
        self.wait_hrdy()?;
        self.gpio.write(payload)?;
        self.gpio.deselect()?;
        Ok(())
    }

    fn write_command(&mut self, command: u16) -> Result<()> {
        log::debug!("SPI command {:#06x}", command);
        self.transfer(Flag::PREAMBLE_COMMAND, &command.to_be_bytes())
    }

    fn write_words(&mut self, words: &[u16]) -> Result<()> {
        let bytes: Vec<u8> = words.iter().flat_map(|w| w.to_be_bytes()).collect();
        self.transfer(Flag::PREAMBLE_WRITE, &bytes)
    }

    /// Command followed by its arguments, one word per data transfer.
    fn write_command_args(&mut self, command: u16, args: &[u16]) -> Result<()> {
        self.write_command(command)?;
        for &arg in args {
            self.write_words(&[arg])?;
        }
        Ok(())
    }

    fn read_words(&mut self, count: usize) -> Result<Vec<u16>> {
        self.state.ensure_open()?;
        self.gpio.set_data_mode(true)?;
        self.wait_hrdy()?;
        self.gpio.select()?;
        self.gpio.write(&Flag::PREAMBLE_READ.to_be_bytes())?;
        self.wait_hrdy()?;
        // first word back is a dummy
        self.gpio.read(2)?;
        self.wait_hrdy()?;
        let bytes = self.gpio.read(count * 2)?;
        self.gpio.deselect()?;
        Ok(bytes
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect())
    }

    fn read_reg(&mut self, address: u32) -> Result<u16> {
        self.write_command_args(SpiCmd::REG_RD, &[address as u16])?;
        let words = self.read_words(1)?;
        Ok(words.first().copied().unwrap_or_default())
    }

    fn write_reg(&mut self, address: u32, value: u16) -> Result<()> {
        self.write_command_args(SpiCmd::REG_WR, &[address as u16, value])
    }

    pub fn get_device_info(&mut self) -> Result<DeviceInfo> {
        self.write_command(SpiCmd::GET_DEV_INFO)?;
        let words = self.read_words(DEVICE_INFO_WORDS)?;
        Ok(DeviceInfo::from_words(&words)?)
    }

    /// VCOM magnitude in millivolts as stored by the controller.
    pub fn read_vcom(&mut self) -> Result<u16> {
        self.write_command_args(SpiCmd::VCOM, &[Flag::VCOM_GET])?;
        let words = self.read_words(1)?;
        Ok(words.first().copied().unwrap_or_default())
    }

    fn write_vcom(&mut self, vcom: i16) -> Result<()> {
        log::info!("Setting VCOM to -{:.2} V", f32::from(vcom.unsigned_abs()) / 1000.0);
        self.write_command_args(SpiCmd::VCOM, &[Flag::VCOM_SET, vcom.unsigned_abs()])
    }

    fn set_image_base(&mut self) -> Result<()> {
        self.write_reg(Reg::LISAR + 2, (self.base_address >> 16) as u16)?;
        self.write_reg(Reg::LISAR, self.base_address as u16)
    }

    fn pixel_code(bpp: Bpp) -> std::result::Result<u16, ProtocolError> {
        match bpp {
            Bpp::Two => Ok(Flag::PIXEL_2BPP),
            Bpp::Four => Ok(Flag::PIXEL_4BPP),
            Bpp::Eight => Ok(Flag::PIXEL_8BPP),
            Bpp::One => Err(ProtocolError::UnsupportedDepth(1)),
        }
    }

    /// Upload one strip of packed pixels at panel position (`x`, `y`).
    pub fn load_image_area(&mut self, x: u32, y: u32, w: u32, h: u32, data: &[u8]) -> Result<()> {
        log::debug!("Loading {}x{} area at ({}, {}), {} bytes", w, h, x, y, data.len());
        let argument = (Flag::LDIMG_LITTLE_ENDIAN << 8)
            | (Self::pixel_code(self.bpp)? << 4)
            | Flag::ROTATE_0;
        self.set_image_base()?;
        self.write_command_args(
            SpiCmd::LD_IMG_AREA,
            &[argument, x as u16, y as u16, w as u16, h as u16],
        )?;
        self.transfer(Flag::PREAMBLE_WRITE, data)?;
        self.write_command(SpiCmd::LD_IMG_END)
    }

    pub fn display_area(
        &mut self,
        x: u32,
        y: u32,
        w: u32,
        h: u32,
        mode: DisplayMode,
    ) -> Result<()> {
        log::debug!("Refreshing {}x{} at ({}, {}) with {}", w, h, x, y, mode);
        self.write_command_args(
            SpiCmd::DPY_AREA,
            &[x as u16, y as u16, w as u16, h as u16, mode.0 as u16],
        )
    }

    fn apply_bpp(&mut self, bpp: Bpp) -> Result<()> {
        Self::pixel_code(bpp)?;
        let pitch = (self.width as usize * bpp.bits() as usize).div_ceil(8);
        let chunk_height = max_chunk_height(MAX_TRANSFER, pitch)?;
        self.bpp = bpp;
        self.pitch = pitch;
        self.max_chunk_height = chunk_height;
        self.last_display_mode = DisplayMode(Flag::MODE_GC16);
        log::info!(
            "Depth {} pitch {} bytes, strips of up to {} rows",
            bpp,
            pitch,
            chunk_height
        );
        Ok(())
    }
}

impl RegisterAccess for SpiIt8951 {
    /// Reads `length` bytes from consecutive 16-bit registers.
    fn read_register(&mut self, address: u32, length: u16) -> Result<Vec<u8>> {
        let mut bytes = Vec::with_capacity(length as usize + 1);
        for offset in (0..u32::from(length)).step_by(2) {
            bytes.extend_from_slice(&self.read_reg(address + offset)?.to_be_bytes());
        }
        bytes.truncate(length as usize);
        Ok(bytes)
    }

    fn write_register(&mut self, address: u32, data: &[u8]) -> Result<()> {
        for (offset, pair) in (0u32..).step_by(2).zip(data.chunks(2)) {
            let value = u16::from_be_bytes([pair[0], pair.get(1).copied().unwrap_or(0)]);
            self.write_reg(address + offset, value)?;
        }
        Ok(())
    }

    /// The host interface has no separate fast path.
    fn write_register_fast(&mut self, address: u32, data: &[u8]) -> Result<()> {
        self.write_register(address, data)
    }
}

impl PanelDriver for SpiIt8951 {
    fn init(&mut self) -> Result<()> {
        self.state.ensure_open()?;
        // Step 1: claim the pins, the host interface wants swapped words
        self.gpio.allocate_pins(self.use_dc_pin)?;
        self.gpio.set_word_flip(true);

        // Step 2: hardware reset and wake the controller
        self.gpio.reset()?;
        self.write_command(SpiCmd::SYS_RUN)?;

        // Step 3: geometry and image buffer location
        let info = self.get_device_info()?;
        log::info!(
            "IT8951 {}x{}, image buffer at {:#010x}, firmware {} lut {}",
            info.width,
            info.height,
            info.image_buffer_address,
            info.firmware,
            info.lut
        );
        self.width = u32::from(info.width);
        self.height = u32::from(info.height);
        self.base_address = info.image_buffer_address;
        self.device_info = Some(info);

        // Step 4: packed pixel writes
        self.write_reg(Reg::I80CPCR, Flag::PACKED_WRITE)?;

        // Step 5: optional VCOM calibration
        if let Some(vcom) = self.vcom {
            self.write_vcom(vcom)?;
        }

        // Step 6: depth, pitch and strip height
        self.apply_bpp(self.bpp)?;
        self.state = DriverState::Initialized;
        Ok(())
    }

    fn wait_until_panel_ready(&mut self) -> Result<()> {
        self.state.ensure_initialized()?;
        let started = Instant::now();
        loop {
            if self.read_reg(Reg::LUTAFSR)? == 0 {
                return Ok(());
            }
            if let Some(timeout) = self.ready.timeout {
                if started.elapsed() >= timeout {
                    return Err(PanelError::NotReady(timeout));
                }
            }
            self.gpio.delay_ms(self.ready.interval_ms());
        }
    }

    fn draw(
        &mut self,
        x: u32,
        y: u32,
        image: &Canvas,
        mode: Option<DisplayMode>,
        refresh_after: bool,
    ) -> Result<()> {
        self.state.ensure_initialized()?;
        check_bounds(x, y, image, self.width, self.height)?;
        let (w, h) = (image.width(), image.height());
        if w == 0 || h == 0 {
            return Ok(());
        }

        self.wait_until_panel_ready()?;
        let samples = row_samples(w, self.width, self.pitch, self.bpp);
        let word_flip = self.gpio.word_flip();
        for strip in strips(h, self.max_chunk_height) {
            let packed = packed_strip(image, strip, samples, self.bpp, word_flip)?;
            self.load_image_area(x, y + strip.y, w, strip.height, &packed)?;
        }

        if refresh_after {
            self.display_area(x, y, w, h, mode.unwrap_or(self.last_display_mode))?;
        }
        Ok(())
    }

    fn clear(&mut self) -> Result<()> {
        self.state.ensure_initialized()?;
        let mut blank = Canvas::new(self.width, self.height);
        blank.fill(WHITE);
        self.draw(0, 0, &blank, Some(DisplayMode::INIT), true)
    }

    fn query(&mut self) -> Result<QueryResult> {
        self.state.ensure_initialized()?;
        let vcom = self.read_vcom()?;
        let info = self.device_info.as_ref();
        Ok(QueryResult {
            width: Some(self.width),
            height: Some(self.height),
            bpp: Some(self.bpp),
            vcom: Some(i32::from(vcom)),
            firmware: info.map(|i| i.firmware.clone()),
            lut: info.map(|i| i.lut.clone()),
            ..QueryResult::default()
        })
    }

    fn set_bpp(&mut self, bpp: Bpp) -> Result<()> {
        self.state.ensure_initialized()?;
        self.apply_bpp(bpp)
    }

    fn set_vcom(&mut self, vcom: i16) -> Result<()> {
        self.state.ensure_initialized()?;
        self.write_vcom(vcom)?;
        self.vcom = Some(vcom);
        Ok(())
    }

    /// Put the controller to sleep and release the pins.
    fn close(&mut self) {
        match self.state {
            DriverState::Closed => return,
            DriverState::Initialized => {
                if let Err(e) = self.write_command(SpiCmd::SLEEP) {
                    log::warn!("Failed to put the controller to sleep: {}", e);
                }
            }
            DriverState::Uninitialized => {}
        }
        if let Err(e) = self.gpio.close() {
            log::warn!("Failed to release SPI transport: {}", e);
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
    use crate::error::TransportError;
    use crate::transport::mock::{MockPinAllocator, MockSpi, NoDelay};
    use crate::transport::Pins;
    use embedded_graphics::pixelcolor::Rgb888;
    use embedded_graphics::prelude::*;

    fn driver(panel: MockPanelInfo, bpp: Bpp) -> (SpiIt8951, MockSpi, MockPinAllocator) {
        let spi = MockSpi::new();
        spi.queue_words(&[0]);
        spi.queue_words(&DeviceInfo::for_panel(&panel).to_words());
        let pins = MockPinAllocator::new();
        let gpio = GpioTransport::new(
            Box::new(spi.clone()),
            Box::new(pins.clone()),
            Box::new(NoDelay),
            4096,
        );
        let driver = SpiIt8951::new(gpio, bpp, ReadyPolicy::default(), false, None);
        (driver, spi, pins)
    }

    /// Written bytes as big-endian words
    fn words(bytes: &[u8]) -> Vec<u16> {
        bytes
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect()
    }

    #[test]
    fn device_info_round_trip() {
        let info = DeviceInfo::for_panel(&MockPanelInfo::default());
        let words = info.to_words();
        assert_eq!(words.len(), DEVICE_INFO_WORDS);
        assert_eq!(DeviceInfo::from_words(&words).unwrap(), info);
        assert!(DeviceInfo::from_words(&words[..10]).is_err());
    }

    #[test]
    fn init_learns_geometry() {
        let (mut driver, spi, pins) = driver(MockPanelInfo::default(), Bpp::Four);
        driver.init().unwrap();

        assert_eq!(driver.width(), 1872);
        assert_eq!(driver.height(), 1404);
        assert_eq!(driver.pitch(), 936);
        assert_eq!(driver.max_chunk_height(), 65);
        assert_eq!(driver.device_info().unwrap().lut, "M841_TFAB512");
        assert_eq!(pins.history(Pins::RST), vec![true, false, true]);

        let stream = words(&spi.written_bytes());
        // SYS_RUN, then GET_DEV_INFO
        assert_eq!(&stream[0..4], &[0x6000, SpiCmd::SYS_RUN, 0x6000, SpiCmd::GET_DEV_INFO]);
        assert_eq!(stream[4], Flag::PREAMBLE_READ);
        // packed writes enabled through REG_WR
        assert_eq!(
            &stream[5..11],
            &[0x6000, SpiCmd::REG_WR, 0x0000, Reg::I80CPCR as u16, 0x0000, 1]
        );
    }

    #[test]
    fn one_bpp_is_not_supported() {
        let (mut driver, _, _) = driver(MockPanelInfo::default(), Bpp::One);
        assert!(matches!(
            driver.init(),
            Err(PanelError::Protocol(ProtocolError::UnsupportedDepth(1)))
        ));
    }

    #[test]
    fn draw_sends_flipped_words_between_area_commands() {
        let panel = MockPanelInfo {
            width: 32,
            height: 16,
            ..MockPanelInfo::default()
        };
        let (mut driver, spi, _) = driver(panel, Bpp::Eight);
        driver.init().unwrap();
        spi.clear_log();

        let mut image = Canvas::new(4, 1);
        image.fill(WHITE);
        image
            .draw_iter([Pixel(Point::new(0, 0), Rgb888::BLACK)])
            .unwrap();
        driver.draw(2, 3, &image, None, true).unwrap();

        let stream = words(&spi.written_bytes());
        let area = stream
            .windows(2)
            .position(|pair| pair == [0x6000, SpiCmd::LD_IMG_AREA])
            .unwrap();
        // argument, x, y, w, h each in its own write transfer
        assert_eq!(
            &stream[area + 2..area + 12],
            &[0, 0x0030, 0, 2, 0, 3, 0, 4, 0, 1]
        );
        // pixel data: pixel 0 black, then white; bytes swapped per word
        assert_eq!(&stream[area + 12..area + 15], &[0x0000, 0xFF00, 0xFFFF]);
        assert_eq!(&stream[area + 15..area + 17], &[0x6000, SpiCmd::LD_IMG_END]);

        let refresh = stream.len() - 12;
        assert_eq!(&stream[refresh..refresh + 2], &[0x6000, SpiCmd::DPY_AREA]);
        assert_eq!(
            &stream[refresh + 2..],
            &[0, 2, 0, 3, 0, 4, 0, 1, 0, Flag::MODE_GC16 as u16]
        );
    }

    #[test]
    fn busy_line_timeout() {
        let (mut driver, _, pins) = driver(MockPanelInfo::default(), Bpp::Eight);
        driver.hrdy.timeout = Some(std::time::Duration::ZERO);
        driver.init().unwrap();
        pins.set_input(Pins::BUSY, false);
        assert!(matches!(driver.query(), Err(PanelError::NotReady(_))));
    }

    #[test]
    fn query_reads_vcom() {
        let (mut driver, spi, _) = driver(MockPanelInfo::default(), Bpp::Eight);
        driver.init().unwrap();
        spi.queue_words(&[0, 1500]);
        let result = driver.query().unwrap();
        assert_eq!(result.vcom, Some(1500));
        assert_eq!(result.firmware.as_deref(), Some("SWv_0.1.1"));
    }

    #[test]
    fn register_access_uses_consecutive_words() {
        let (mut driver, spi, _) = driver(MockPanelInfo::default(), Bpp::Eight);
        driver.init().unwrap();
        spi.clear_log();
        driver.write_register(0x1000, &[0x12, 0x34, 0x56]).unwrap();
        let stream = words(&spi.written_bytes());
        assert_eq!(
            stream,
            vec![
                0x6000, SpiCmd::REG_WR, 0, 0x1000, 0, 0x1234,
                0x6000, SpiCmd::REG_WR, 0, 0x1002, 0, 0x5600,
            ]
        );
    }

    #[test]
    fn close_sleeps_and_releases_pins() {
        let (mut driver, spi, _) = driver(MockPanelInfo::default(), Bpp::Eight);
        driver.init().unwrap();
        spi.clear_log();
        driver.close();
        assert_eq!(words(&spi.written_bytes()), vec![0x6000, SpiCmd::SLEEP]);
        assert!(matches!(
            driver.clear(),
            Err(PanelError::Transport(TransportError::Closed))
        ));
    }
}

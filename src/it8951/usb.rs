//! IT8951 behind its USB bridge
//!
//! Every exchange is a bulk-only round-trip:
//!
//! 1. a Command Block Wrapper carrying a 16-byte register command,
//! 1. the data phase, in either direction,
//! 1. a 13-byte Command Status Wrapper read back from the board.
//!
//! Wrapper fields are little-endian; everything inside the vendor command
//! and its payload is big-endian.
//!
//! ### Image uploads
//!
//! One transfer carries at most [`MAX_TRANSFER`] bytes of image data, so
//! `draw` cuts the image into full-width strips of at most
//! `max_chunk_height` rows. Full-width strips go straight into image memory
//! with a fast register write; narrower ones use the load-image-area
//! command, which the controller only accepts at 8bpp.

use std::thread;
use std::time::Instant;

use crate::codec::{bytes_to_int_array, int_array_to_bytes, short_to_bytes, Endian};
use crate::driver::strip::{max_chunk_height, packed_strip, row_samples, strips, MAX_TRANSFER};
use crate::driver::{
    check_bounds, DisplayMode, DriverState, PanelDriver, QueryResult, ReadyPolicy, RegisterAccess,
};
use crate::error::{PanelError, ProtocolError, Result};
use crate::framing::{
    CommandBlockWrapper, CommandStatusWrapper, Direction, RegisterCommand, CSW_LENGTH,
};
use crate::it8951::cmd::UsbCmd;
use crate::it8951::flag::{Flag, Reg};
use crate::it8951::SIGNATURE;
use crate::packer::Bpp;
use crate::raster::{Canvas, WHITE};
use crate::transport::mock::MockPanelInfo;
use crate::transport::Transport;

/// The USB bridge does not want packed words swapped.
const WORD_FLIP: bool = false;

/// Byte order of the bulk-only wrappers
const WRAPPER_ENDIAN: Endian = Endian::Little;

/// Number of 32-bit words in the system info block
const SYSTEM_INFO_WORDS: usize = 29;

/// Controller description returned by the GET_SYS command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemInfo {
    pub standard_cmd_no: u32,
    pub extended_cmd_no: u32,
    /// Always "8951"
    pub signature: u32,
    pub version: u32,
    pub width: u32,
    pub height: u32,
    pub update_buf_base: u32,
    pub image_buffer_base: u32,
    pub temperature_no: u32,
    /// Number of display modes, 6 or 8
    pub mode: u32,
}

impl SystemInfo {
    /// Decode the big-endian word block. Trailing words are ignored.
    pub fn parse(bytes: &[u8]) -> std::result::Result<Self, ProtocolError> {
        let ints = bytes_to_int_array(bytes, Endian::Big)?;
        if ints.len() < 10 {
            return Err(ProtocolError::ShortInfo {
                what: "system info",
                len: bytes.len(),
            });
        }
        let word = |i: usize| ints[i] as u32;
        Ok(SystemInfo {
            standard_cmd_no: word(0),
            extended_cmd_no: word(1),
            signature: word(2),
            version: word(3),
            width: word(4),
            height: word(5),
            update_buf_base: word(6),
            image_buffer_base: word(7),
            temperature_no: word(8),
            mode: word(9),
        })
    }

    /// Full 29-word block as the controller sends it
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut words = vec![0i32; SYSTEM_INFO_WORDS];
        let fields = [
            self.standard_cmd_no,
            self.extended_cmd_no,
            self.signature,
            self.version,
            self.width,
            self.height,
            self.update_buf_base,
            self.image_buffer_base,
            self.temperature_no,
            self.mode,
        ];
        for (word, field) in words.iter_mut().zip(fields) {
            *word = field as i32;
        }
        int_array_to_bytes(&words, Endian::Big)
    }

    /// What a simulated controller with `panel` geometry reports
    pub fn for_panel(panel: &MockPanelInfo) -> Self {
        SystemInfo {
            standard_cmd_no: 0,
            extended_cmd_no: 0,
            signature: SIGNATURE,
            version: 0,
            width: panel.width,
            height: panel.height,
            update_buf_base: 0,
            image_buffer_base: panel.image_buffer_base,
            temperature_no: 0,
            mode: panel.display_modes,
        }
    }
}

/// IT8951 driver board reached over USB.
pub struct UsbIt8951 {
    transport: Box<dyn Transport>,
    state: DriverState,
    ready: ReadyPolicy,
    /// Last command tag issued, never reset
    tag: u32,
    bpp: Bpp,
    base_address: u32,
    width: u32,
    height: u32,
    /// Bytes per panel row at the current depth
    pitch: usize,
    max_chunk_height: u32,
    last_display_mode: DisplayMode,
    display_modes_supported: u32,
    system_info: Option<SystemInfo>,
    last_vcom: Option<i16>,
}

impl UsbIt8951 {
    /// Wrap an open transport. `bpp` is applied during `init`.
    pub fn new(transport: Box<dyn Transport>, bpp: Bpp, ready: ReadyPolicy) -> Self {
        UsbIt8951 {
            transport,
            state: DriverState::Uninitialized,
            ready,
            tag: 0,
            bpp,
            base_address: 0,
            width: 0,
            height: 0,
            pitch: 0,
            max_chunk_height: 0,
            last_display_mode: DisplayMode::INIT,
            display_modes_supported: 0,
            system_info: None,
            last_vcom: None,
        }
    }

    pub fn state(&self) -> DriverState {
        self.state
    }

    /// Tag of the most recent command, 0 before the first one
    pub fn tag(&self) -> u32 {
        self.tag
    }

    pub fn pitch(&self) -> usize {
        self.pitch
    }

    pub fn max_chunk_height(&self) -> u32 {
        self.max_chunk_height
    }

    /// Mode used when `draw` gets no override
    pub fn display_mode(&self) -> DisplayMode {
        self.last_display_mode
    }

    pub fn system_info(&self) -> Option<&SystemInfo> {
        self.system_info.as_ref()
    }

    fn next_tag(&mut self) -> u32 {
        self.tag = self.tag.wrapping_add(1);
        self.tag
    }

    /// Issue `command`, read `length` bytes back, then the status.
    fn read_command(&mut self, command: &RegisterCommand, length: usize) -> Result<Vec<u8>> {
        self.state.ensure_open()?;
        let tag = self.next_tag();
        let cbw = CommandBlockWrapper::new(
            tag,
            length as u32,
            Direction::Incoming,
            command.encode().to_vec(),
        );
        self.transport.write(&cbw.encode(WRAPPER_ENDIAN))?;
        let data = self.transport.read(length)?;
        self.read_status(tag)?;
        Ok(data)
    }

    /// Issue `command` followed by `value` and `extra` as one data phase.
    fn write_command(
        &mut self,
        command: &RegisterCommand,
        value: &[u8],
        extra: &[u8],
    ) -> Result<()> {
        self.state.ensure_open()?;
        let mut bulk = Vec::with_capacity(value.len() + extra.len());
        bulk.extend_from_slice(value);
        bulk.extend_from_slice(extra);

        let tag = self.next_tag();
        let cbw = CommandBlockWrapper::new(
            tag,
            bulk.len() as u32,
            Direction::Outgoing,
            command.encode().to_vec(),
        );
        self.transport.write(&cbw.encode(WRAPPER_ENDIAN))?;
        self.transport.write(&bulk)?;
        self.read_status(tag)?;
        Ok(())
    }

    fn read_status(&mut self, tag: u32) -> Result<CommandStatusWrapper> {
        let bytes = self.transport.read(CSW_LENGTH)?;
        let status = CommandStatusWrapper::parse(&bytes, WRAPPER_ENDIAN)?;
        if status.tag != tag {
            log::warn!("Status tag {} does not match command tag {}", status.tag, tag);
        }
        if status.status != 0 {
            log::debug!("Command {} finished with status {}", tag, status.status);
        }
        Ok(status)
    }

    fn register_command(address: u32, command: u8, length: usize) -> Result<RegisterCommand> {
        let length = u16::try_from(length).map_err(|_| ProtocolError::OversizeChunk {
            len: length,
            max: u16::MAX as usize,
        })?;
        Ok(RegisterCommand::with_length(address, command, length))
    }

    /// Query geometry and memory layout of the panel.
    pub fn get_system_info(&mut self) -> Result<SystemInfo> {
        let command = RegisterCommand::with_value(SIGNATURE, UsbCmd::GET_SYS, &[0, 1, 0, 2])?;
        let bytes = self.read_command(&command, SYSTEM_INFO_WORDS * 4)?;
        Ok(SystemInfo::parse(&bytes)?)
    }

    /// Upload one strip of packed pixels at panel position (`x`, `y`).
    pub fn load_image_area(&mut self, x: u32, y: u32, w: u32, h: u32, data: &[u8]) -> Result<()> {
        if data.len() > MAX_TRANSFER {
            return Err(ProtocolError::OversizeChunk {
                len: data.len(),
                max: MAX_TRANSFER,
            }
            .into());
        }

        if w == self.width {
            let address = self
                .base_address
                .wrapping_sub(Reg::ADJUST)
                .wrapping_add((self.pitch as u32).wrapping_mul(y));
            log::debug!(
                "Fast write of {} bytes at {:#010x} ({}x{} at y {})",
                data.len(),
                address,
                w,
                h,
                y
            );
            self.write_register_fast(address, data)
        } else if self.bpp == Bpp::One {
            Err(ProtocolError::PartialWidth1bpp.into())
        } else {
            log::debug!("Loading {}x{} area at ({}, {})", w, h, x, y);
            let area = int_array_to_bytes(
                &[self.base_address as i32, x as i32, y as i32, w as i32, h as i32],
                Endian::Big,
            );
            let command = RegisterCommand::new(0, UsbCmd::LD_IMAGE_AREA);
            self.write_command(&command, &area, data)
        }
    }

    /// Refresh a rectangle of the panel from image memory.
    pub fn display_area(
        &mut self,
        x: u32,
        y: u32,
        w: u32,
        h: u32,
        mode: DisplayMode,
    ) -> Result<()> {
        log::debug!("Refreshing {}x{} at ({}, {}) with {}", w, h, x, y, mode);
        let wait_ready = 1;
        let area = int_array_to_bytes(
            &[
                self.base_address as i32,
                mode.0 as i32,
                x as i32,
                y as i32,
                w as i32,
                h as i32,
                wait_ready,
            ],
            Endian::Big,
        );
        let command = RegisterCommand::new(0, UsbCmd::DPY_AREA);
        self.write_command(&command, &area, &[])
    }

    /// Write the VCOM value as a bare command block, returning the number
    /// of bytes written (16).
    pub fn set_vcom(&mut self, vcom: i16) -> Result<usize> {
        self.state.ensure_initialized()?;
        let [high, low] = short_to_bytes(vcom, Endian::Big);
        let vcom_flag = 1;
        let power_flag = 0;
        let power = 0;
        let value = [high, low, vcom_flag, power_flag, power];
        let command = RegisterCommand::with_value(0, UsbCmd::SET_VCOM, &value)?;
        let written = self.transport.write(&command.encode())?;
        self.last_vcom = Some(vcom);
        log::info!("VCOM set to {}", vcom);
        Ok(written)
    }

    fn apply_bpp(&mut self, bpp: Bpp) -> Result<()> {
        if !matches!(bpp, Bpp::One | Bpp::Eight) {
            return Err(ProtocolError::UnsupportedDepth(bpp.bits()).into());
        }

        // row length in 32-pixel double words, rounded up
        let width_words = self.width.div_ceil(32);
        let pitch = match bpp {
            Bpp::One => width_words as usize * 4,
            _ => self.width as usize,
        };
        let chunk_height = max_chunk_height(MAX_TRANSFER, pitch)?;

        // Step 1: Update Parameter 1, toggle the 1bpp bits and keep the rest
        let mut mode_bits = self.read_register(Reg::UP1SR, 4)?;
        if let Some(byte) = mode_bits.get_mut(2) {
            if bpp == Bpp::One {
                *byte |= Flag::UP1SR_1BPP;
            } else {
                *byte &= !Flag::UP1SR_1BPP;
            }
        }
        self.write_register(Reg::UP1SR, &mode_bits)?;

        // Step 2: 1bpp color table, white and black
        self.write_register(Reg::BGVR, &[Flag::BGVR_GRAY, Flag::BGVR_BLACK])?;

        // Step 3: panel width in 32-pixel units
        self.write_register(Reg::WIDTH, &short_to_bytes(width_words as i16, Endian::Little))?;

        self.last_display_mode = match bpp {
            Bpp::One if self.display_modes_supported == 6 => DisplayMode(Flag::MODE_A2_6),
            Bpp::One => DisplayMode(Flag::MODE_A2_8),
            _ => DisplayMode(Flag::MODE_GC16),
        };
        self.bpp = bpp;
        self.pitch = pitch;
        self.max_chunk_height = chunk_height;

        log::info!(
            "Depth {} pitch {} bytes, strips of up to {} rows, default {}",
            bpp,
            pitch,
            chunk_height,
            self.last_display_mode
        );
        Ok(())
    }
}

impl RegisterAccess for UsbIt8951 {
    fn read_register(&mut self, address: u32, length: u16) -> Result<Vec<u8>> {
        let command = RegisterCommand::with_length(address, UsbCmd::READ, length);
        self.read_command(&command, length as usize)
    }

    fn write_register(&mut self, address: u32, data: &[u8]) -> Result<()> {
        let command = Self::register_command(address, UsbCmd::WRITE, data.len())?;
        self.write_command(&command, data, &[])
    }

    fn write_register_fast(&mut self, address: u32, data: &[u8]) -> Result<()> {
        let command = Self::register_command(address, UsbCmd::WRITE_FAST, data.len())?;
        self.write_command(&command, data, &[])
    }
}

impl PanelDriver for UsbIt8951 {
    fn init(&mut self) -> Result<()> {
        self.state.ensure_open()?;

        // Geometry and image buffer location
        let info = self.get_system_info()?;
        log::info!(
            "IT8951 {}x{} version {}, image buffer at {:#010x}, {} display modes",
            info.width,
            info.height,
            info.version,
            info.image_buffer_base,
            info.mode
        );
        if info.signature != SIGNATURE {
            log::warn!("Unexpected controller signature {:#010x}", info.signature);
        }

        self.base_address = info.image_buffer_base;
        self.width = info.width;
        self.height = info.height;
        self.display_modes_supported = info.mode;
        self.system_info = Some(info);

        self.apply_bpp(self.bpp)?;
        self.state = DriverState::Initialized;
        Ok(())
    }

    fn wait_until_panel_ready(&mut self) -> Result<()> {
        self.state.ensure_initialized()?;
        let started = Instant::now();
        loop {
            let status = self.read_register(Reg::LUTAFSR, 2)?;
            if status.iter().all(|&b| b == 0) {
                return Ok(());
            }
            if let Some(timeout) = self.ready.timeout {
                if started.elapsed() >= timeout {
                    return Err(PanelError::NotReady(timeout));
                }
            }
            thread::sleep(self.ready.interval);
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

        let samples = row_samples(w, self.width, self.pitch, self.bpp);
        for strip in strips(h, self.max_chunk_height) {
            let packed = packed_strip(image, strip, samples, self.bpp, WORD_FLIP)?;
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
        let info = self.system_info.as_ref();
        Ok(QueryResult {
            width: Some(self.width),
            height: Some(self.height),
            bpp: Some(self.bpp),
            display_modes: Some(self.display_modes_supported),
            signature: info.map(|i| i.signature),
            version: info.map(|i| i.version),
            temperature: info.map(|i| i.temperature_no),
            vcom: self.last_vcom.map(i32::from),
            firmware: None,
            lut: None,
        })
    }

    fn set_bpp(&mut self, bpp: Bpp) -> Result<()> {
        self.state.ensure_initialized()?;
        self.apply_bpp(bpp)
    }

    fn set_vcom(&mut self, vcom: i16) -> Result<()> {
        UsbIt8951::set_vcom(self, vcom).map(|_| ())
    }

    fn close(&mut self) {
        if self.state == DriverState::Closed {
            return;
        }
        if let Err(e) = self.transport.close() {
            log::warn!("Failed to close USB transport: {}", e);
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

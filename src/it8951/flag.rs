/// Register addresses of the IT8951 controller.
pub struct Reg;
impl Reg {
    pub const SYSTEM_BASE: u32 = 0x0000;
    /// I80 command packing, 1 enables packed writes
    pub const I80CPCR: u32 = Self::SYSTEM_BASE + 0x04;

    pub const MCSR_BASE: u32 = 0x0200;
    /// Load image start address, low word (high word at +2)
    pub const LISAR: u32 = Self::MCSR_BASE + 0x08;

    pub const DISPLAY_BASE: u32 = 0x1000;
    /// Update parameter 1 setting, holds the 1bpp and pitch mode bits
    pub const UP1SR: u32 = Self::DISPLAY_BASE + 0x138;
    /// LUT status of all engines, zero when idle
    pub const LUTAFSR: u32 = Self::DISPLAY_BASE + 0x224;
    /// Panel width in 32-pixel units for 1bpp mode
    pub const WIDTH: u32 = Self::DISPLAY_BASE + 0x24C;
    /// 1bpp color table
    pub const BGVR: u32 = Self::DISPLAY_BASE + 0x250;

    /// Offset between the reported image buffer base and the fast-write address space
    pub const ADJUST: u32 = 0x1800_0000;
}

/// Flag values and constants for the IT8951 controller.
pub struct Flag;
#[allow(missing_docs)]
impl Flag {
    // Display modes
    pub const MODE_INIT: u32 = 0;
    pub const MODE_DU: u32 = 1;
    pub const MODE_GC16: u32 = 2;
    pub const MODE_A2_6: u32 = 4; // A2 on panels with 6 modes
    pub const MODE_A2_8: u32 = 6; // A2 on panels with 8 modes

    // Update Parameter 1 (UP1SR byte 2)
    pub const UP1SR_1BPP: u8 = 0x06;

    // Bitmap color table (BGVR)
    pub const BGVR_GRAY: u8 = 0xF0;
    pub const BGVR_BLACK: u8 = 0x00;

    // SPI preambles
    pub const PREAMBLE_COMMAND: u16 = 0x6000;
    pub const PREAMBLE_WRITE: u16 = 0x0000;
    pub const PREAMBLE_READ: u16 = 0x1000;

    // Load image argument
    pub const LDIMG_LITTLE_ENDIAN: u16 = 0;
    pub const ROTATE_0: u16 = 0;
    pub const PIXEL_2BPP: u16 = 0;
    pub const PIXEL_4BPP: u16 = 2;
    pub const PIXEL_8BPP: u16 = 3;

    // VCOM command argument
    pub const VCOM_GET: u16 = 0;
    pub const VCOM_SET: u16 = 1;

    // I80CPCR
    pub const PACKED_WRITE: u16 = 1;
}

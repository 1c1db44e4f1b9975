/// Command codes carried in byte 6 of the 16-byte USB command block
pub struct UsbCmd;
impl UsbCmd {
    // System
    pub const GET_SYS: u8 = 0x80;

    // Register access
    pub const READ: u8 = 0x81;
    pub const WRITE: u8 = 0x82;
    pub const WRITE_FAST: u8 = 0xA5;

    // Image
    pub const LD_IMAGE_AREA: u8 = 0xA2;
    pub const DPY_AREA: u8 = 0x94;

    // Power
    pub const SET_VCOM: u8 = 0xA3;
}

/// I80/SPI host interface commands
pub struct SpiCmd;
impl SpiCmd {
    // Power
    pub const SYS_RUN: u16 = 0x0001;
    pub const SLEEP: u16 = 0x0003;

    // Register access
    pub const REG_RD: u16 = 0x0010;
    pub const REG_WR: u16 = 0x0011;

    // Image
    pub const LD_IMG_AREA: u16 = 0x0021;
    pub const LD_IMG_END: u16 = 0x0022;
    pub const DPY_AREA: u16 = 0x0034;

    // User defined
    pub const VCOM: u16 = 0x0039;
    pub const GET_DEV_INFO: u16 = 0x0302;
}

/*
IT8951 USB programming guide:
0x80 - Get System Info (address "8951")
0x81 - Read Memory/Register
0x82 - Write Memory/Register
0x94 - Display Area
0xA2 - Load Image Area
0xA3 - Set VCOM / power
0xA5 - Fast Write Memory
*/

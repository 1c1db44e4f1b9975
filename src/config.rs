//! Configuration descriptor
//!
//! One `Config` value describes which driver family and panel to talk to and
//! how to reach the hardware. It is read from TOML:
//!
//! ```toml
//! driver = "USB"
//! panel = "IT8951"
//! bpp = 8
//! ready_timeout_ms = 30000
//!
//! [transport]
//! kind = "real"
//!
//! [transport.usb]
//! vendor_id = 0x048d
//! product_id = 0x8951
//! ```
//!
//! `kind = "mock"` swaps every hardware channel for an in-memory one.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::driver::ReadyPolicy;

/// Failure to read or parse a configuration file.
#[derive(Debug, Error)]
pub enum ConfigLoadError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Which driver and panel to build, and how to reach them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Driver family: `USB` or `GPIO`, case-insensitive
    pub driver: String,
    /// Panel controller: `IT8951` or `Mock`
    pub panel: String,
    #[serde(default)]
    pub remote: bool,
    #[serde(default)]
    pub host: String,
    #[serde(default)]
    pub port: u16,
    #[serde(default)]
    pub transport: TransportSelection,
    /// Pixel depth set during init, panel default when absent
    #[serde(default)]
    pub bpp: Option<u8>,
    /// Give up waiting for the panel after this long; wait forever when absent
    #[serde(default)]
    pub ready_timeout_ms: Option<u64>,
    /// VCOM written during init on the SPI family
    #[serde(default)]
    pub vcom: Option<i16>,
    /// Allocate the data/command pin on the GPIO family
    #[serde(default)]
    pub use_dc_pin: bool,
}

impl Config {
    /// Local, real hardware, panel defaults for everything else.
    pub fn new(driver: impl Into<String>, panel: impl Into<String>) -> Self {
        Config {
            driver: driver.into(),
            panel: panel.into(),
            remote: false,
            host: String::new(),
            port: 0,
            transport: TransportSelection::default(),
            bpp: None,
            ready_timeout_ms: None,
            vcom: None,
            use_dc_pin: false,
        }
    }

    /// Same as [`Config::new`] with the in-memory transport selected.
    pub fn mock(driver: impl Into<String>, panel: impl Into<String>) -> Self {
        Config {
            transport: TransportSelection::Mock,
            ..Config::new(driver, panel)
        }
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ConfigLoadError> {
        Ok(toml::from_str(text)?)
    }

    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigLoadError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Polling behaviour for `wait_until_panel_ready`
    pub fn ready_policy(&self) -> ReadyPolicy {
        ReadyPolicy {
            timeout: self.ready_timeout_ms.map(Duration::from_millis),
            ..ReadyPolicy::default()
        }
    }
}

/// Hardware or in-memory channels, fixed at configuration time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum TransportSelection {
    Real {
        #[serde(default)]
        usb: UsbParams,
        #[serde(default)]
        spi: SpiParams,
    },
    Mock,
}

impl Default for TransportSelection {
    fn default() -> Self {
        TransportSelection::Real {
            usb: UsbParams::default(),
            spi: SpiParams::default(),
        }
    }
}

/// Where to find the USB bridge board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UsbParams {
    pub vendor_id: u16,
    pub product_id: u16,
    pub interface: u8,
    pub endpoint_in: u8,
    pub endpoint_out: u8,
}

impl Default for UsbParams {
    fn default() -> Self {
        // IT8951 USB bridge
        UsbParams {
            vendor_id: 0x048d,
            product_id: 0x8951,
            interface: 0,
            endpoint_in: 0x81,
            endpoint_out: 0x02,
        }
    }
}

/// spidev and gpio character device used by the GPIO family.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpiParams {
    pub spi_device: String,
    pub gpio_chip: String,
    pub max_speed_hz: u32,
    /// Largest single SPI write, the spidev buffer size
    pub max_transfer: usize,
}

impl Default for SpiParams {
    fn default() -> Self {
        SpiParams {
            spi_device: "/dev/spidev0.0".to_string(),
            gpio_chip: "/dev/gpiochip0".to_string(),
            max_speed_hz: 2_000_000,
            max_transfer: 4096,
        }
    }
}

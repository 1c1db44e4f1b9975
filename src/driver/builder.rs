//! Builds and initializes the driver a [`Config`] asks for
//!
//! This is the only place panels are constructed. Both kinds are resolved
//! before any transport is opened, so a bad configuration never touches
//! the hardware.

use std::fmt;
use std::str::FromStr;

use crate::config::{Config, SpiParams, TransportSelection, UsbParams};
use crate::driver::mock::{MockPanel, MOCK_HEIGHT, MOCK_WIDTH};
use crate::driver::PanelDriver;
use crate::error::{ConfigurationError, PanelError, Result};
use crate::it8951::{SpiIt8951, UsbIt8951};
use crate::packer::Bpp;
use crate::transport::gpio::GpioTransport;
use crate::transport::mock::{MockPinAllocator, MockSpi, MockTransport, NoDelay};
use crate::transport::{HardwareOpener, MockOpener, TransportOpener};

/// Driver family
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverKind {
    Usb,
    Gpio,
}

impl FromStr for DriverKind {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "USB" => Ok(DriverKind::Usb),
            "GPIO" => Ok(DriverKind::Gpio),
            _ => Err(ConfigurationError::UnknownDriver(s.to_string())),
        }
    }
}

impl fmt::Display for DriverKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DriverKind::Usb => f.write_str("USB"),
            DriverKind::Gpio => f.write_str("GPIO"),
        }
    }
}

/// Panel controller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanelKind {
    It8951,
    Mock,
}

impl PanelKind {
    /// Resolve `name` for the given driver family.
    pub fn parse(driver: DriverKind, name: &str) -> std::result::Result<Self, ConfigurationError> {
        match name.to_ascii_uppercase().as_str() {
            "IT8951" => Ok(PanelKind::It8951),
            "MOCK" => Ok(PanelKind::Mock),
            _ => Err(ConfigurationError::UnknownPanel {
                driver: driver.to_string(),
                panel: name.to_string(),
            }),
        }
    }
}

/// Build and initialize the driver `config` describes, on real hardware or
/// in memory depending on `config.transport`.
pub fn build_driver(config: &Config) -> Result<Box<dyn PanelDriver>> {
    match &config.transport {
        TransportSelection::Real { .. } => build_driver_with(config, &mut HardwareOpener),
        TransportSelection::Mock => build_driver_with(config, &mut MockOpener::new()),
    }
}

/// Same as [`build_driver`] with an explicit opener.
pub fn build_driver_with(
    config: &Config,
    opener: &mut dyn TransportOpener,
) -> Result<Box<dyn PanelDriver>> {
    if config.remote {
        return Err(ConfigurationError::RemoteUnsupported {
            host: config.host.clone(),
            port: config.port,
        }
        .into());
    }

    let driver_kind: DriverKind = config.driver.parse()?;
    let panel_kind = PanelKind::parse(driver_kind, &config.panel)?;
    let bpp = configured_bpp(config, panel_kind)?;
    log::info!("Building {} {:?} panel at {}", driver_kind, panel_kind, bpp);

    let (usb_params, spi_params) = match &config.transport {
        TransportSelection::Real { usb, spi } => (usb.clone(), spi.clone()),
        TransportSelection::Mock => (UsbParams::default(), SpiParams::default()),
    };

    let mut driver: Box<dyn PanelDriver> = match (driver_kind, panel_kind) {
        (DriverKind::Usb, PanelKind::It8951) => Box::new(UsbIt8951::new(
            opener.open_usb(&usb_params)?,
            bpp,
            config.ready_policy(),
        )),
        (DriverKind::Gpio, PanelKind::It8951) => Box::new(SpiIt8951::new(
            opener.open_spi(&spi_params)?,
            bpp,
            config.ready_policy(),
            config.use_dc_pin,
            config.vcom,
        )),
        (DriverKind::Usb, PanelKind::Mock) => Box::new(MockPanel::usb(
            Box::new(MockTransport::new()),
            bpp,
            MOCK_WIDTH,
            MOCK_HEIGHT,
        )),
        (DriverKind::Gpio, PanelKind::Mock) => {
            let gpio = GpioTransport::new(
                Box::new(MockSpi::new()),
                Box::new(MockPinAllocator::new()),
                Box::new(NoDelay),
                spi_params.max_transfer,
            );
            Box::new(MockPanel::gpio(
                gpio,
                config.use_dc_pin,
                bpp,
                MOCK_WIDTH,
                MOCK_HEIGHT,
            ))
        }
    };

    if let Err(e) = driver.init() {
        driver.close();
        return Err(e);
    }
    Ok(driver)
}

fn configured_bpp(config: &Config, panel: PanelKind) -> std::result::Result<Bpp, PanelError> {
    match config.bpp {
        Some(bits) => Ok(Bpp::try_from(bits)?),
        None if panel == PanelKind::Mock => Ok(Bpp::One),
        None => Ok(Bpp::Eight),
    }
}

//! E-ink panel communication engine
//!
//! Talks to IT8951 based e-paper panels over USB (SCSI-style bulk
//! transfers) or over SPI with a few GPIO control lines.
//!
//! ### Usage
//! 1. describe the panel with a [`Config`], in code or from TOML
//! 1. get an initialized driver from [`build_driver`]
//! 1. draw a [`Canvas`], preferably rendered with
//!    [`embedded_graphics`](https://github.com/jamwaffles/embedded-graphics)
//! 1. `close` the driver when done
//!
//! ```no_run
//! use inkpanel::{build_driver, Canvas, Config, PanelDriver};
//!
//! let mut panel = build_driver(&Config::new("USB", "IT8951"))?;
//! let mut canvas = Canvas::new(200, 100);
//! canvas.fill_hex("#FFF")?;
//! panel.draw(0, 0, &canvas, None, true)?;
//! panel.close();
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
#![allow(clippy::pedantic)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]

pub mod codec;
pub mod config;
pub mod driver;
pub mod error;
pub mod framing;
pub mod it8951;
pub mod packer;
pub mod raster;
pub mod transport;

pub use crate::config::Config;
pub use crate::driver::{build_driver, build_driver_with, DisplayMode, PanelDriver, QueryResult};
pub use crate::error::{ConfigurationError, PanelError, ProtocolError, TransportError};
pub use crate::packer::Bpp;
pub use crate::raster::Canvas;

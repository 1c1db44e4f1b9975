//! Panel driver abstraction
//!
//! A driver owns one transport for one panel session. It is created and
//! initialized by [`builder::build_driver`], used for any number of
//! `draw`/`clear`/`query` calls and finally closed:
//!
//! ```text
//! Uninitialized --init--> Initialized --close--> Closed
//! ```
//!
//! Anything but `init` before initialization fails with
//! [`ProtocolError::NotInitialized`]; anything after `close` fails with
//! [`TransportError::Closed`].

use std::fmt;
use std::time::Duration;

use crate::error::{ProtocolError, Result, TransportError};
use crate::packer::Bpp;
use crate::raster::Canvas;

pub mod builder;
pub mod mock;
pub mod strip;

pub use builder::{build_driver, build_driver_with, DriverKind, PanelKind};
pub use mock::MockPanel;

/// Controller waveform selector. Values are controller specific, see
/// [`crate::it8951::flag::Flag`] for the IT8951 table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DisplayMode(pub u32);

impl DisplayMode {
    /// Full clear to white, slow and flashy
    pub const INIT: DisplayMode = DisplayMode(0);
}

impl fmt::Display for DisplayMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "mode {}", self.0)
    }
}

/// How `wait_until_panel_ready` polls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadyPolicy {
    /// Sleep between two polls
    pub interval: Duration,
    /// Give up after this long, `None` waits forever
    pub timeout: Option<Duration>,
}

impl Default for ReadyPolicy {
    fn default() -> Self {
        ReadyPolicy {
            interval: Duration::from_millis(100),
            timeout: None,
        }
    }
}

impl ReadyPolicy {
    /// Poll interval for `DelayNs::delay_us`, saturating at `u32::MAX`
    pub fn interval_us(&self) -> u32 {
        u32::try_from(self.interval.as_micros()).unwrap_or(u32::MAX)
    }

    /// Poll interval for `DelayNs::delay_ms`, saturating at `u32::MAX`
    pub fn interval_ms(&self) -> u32 {
        u32::try_from(self.interval.as_millis()).unwrap_or(u32::MAX)
    }
}

/// Whatever the panel was able to report. Fields a controller does not
/// know stay `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryResult {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub bpp: Option<Bpp>,
    pub display_modes: Option<u32>,
    pub signature: Option<u32>,
    pub version: Option<u32>,
    pub temperature: Option<u32>,
    pub vcom: Option<i32>,
    pub firmware: Option<String>,
    pub lut: Option<String>,
}

fn line<T: fmt::Display>(f: &mut fmt::Formatter<'_>, name: &str, value: &Option<T>) -> fmt::Result {
    match value {
        Some(value) => writeln!(f, "{name:<14}{value}"),
        None => Ok(()),
    }
}

impl fmt::Display for QueryResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        line(f, "width", &self.width)?;
        line(f, "height", &self.height)?;
        line(f, "depth", &self.bpp)?;
        line(f, "display modes", &self.display_modes)?;
        if let Some(signature) = self.signature {
            writeln!(f, "{:<14}{:#010x}", "signature", signature)?;
        }
        line(f, "version", &self.version)?;
        line(f, "temperature", &self.temperature)?;
        line(f, "vcom", &self.vcom)?;
        line(f, "firmware", &self.firmware)?;
        line(f, "lut", &self.lut)
    }
}

/// Lifecycle of a driver session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    Uninitialized,
    Initialized,
    Closed,
}

impl DriverState {
    /// Fail unless the driver is initialized and still open.
    pub fn ensure_initialized(self) -> Result<()> {
        match self {
            DriverState::Initialized => Ok(()),
            DriverState::Uninitialized => Err(ProtocolError::NotInitialized.into()),
            DriverState::Closed => Err(TransportError::Closed.into()),
        }
    }

    /// Fail once the driver has been closed.
    pub fn ensure_open(self) -> Result<()> {
        match self {
            DriverState::Closed => Err(TransportError::Closed.into()),
            _ => Ok(()),
        }
    }
}

/// Operations every panel driver offers.
///
/// All calls are blocking and take `&mut self`, so a driver only ever has
/// one command in flight. Wrap it in a `Mutex` to share it across threads.
pub trait PanelDriver: Send {
    /// Bring the controller up and learn its geometry.
    fn init(&mut self) -> Result<()>;

    /// Block until the controller has finished refreshing.
    fn wait_until_panel_ready(&mut self) -> Result<()>;

    /// Upload `image` with its top-left corner at (`x`, `y`) and refresh
    /// that area when `refresh_after` is set. `mode` defaults to the one
    /// picked for the current pixel depth.
    fn draw(
        &mut self,
        x: u32,
        y: u32,
        image: &Canvas,
        mode: Option<DisplayMode>,
        refresh_after: bool,
    ) -> Result<()>;

    /// Paint the whole panel white.
    fn clear(&mut self) -> Result<()>;

    fn query(&mut self) -> Result<QueryResult>;

    /// Switch pixel depth. Depths the controller cannot do fail with
    /// [`ProtocolError::UnsupportedDepth`].
    fn set_bpp(&mut self, bpp: Bpp) -> Result<()>;

    /// Write the panel's VCOM voltage, eg. `-1500` for -1.50 V.
    fn set_vcom(&mut self, vcom: i16) -> Result<()>;

    /// Release the transport. Failures are logged, not returned.
    fn close(&mut self);

    fn bpp(&self) -> Bpp;

    fn width(&self) -> u32;

    fn height(&self) -> u32;
}

/// Raw access to controller registers.
pub trait RegisterAccess {
    fn read_register(&mut self, address: u32, length: u16) -> Result<Vec<u8>>;

    fn write_register(&mut self, address: u32, data: &[u8]) -> Result<()>;

    /// Same as [`RegisterAccess::write_register`] but skips the
    /// controller's read-back, used for bulk image data.
    fn write_register_fast(&mut self, address: u32, data: &[u8]) -> Result<()>;
}

/// Reject an image that does not fit the panel at (`x`, `y`).
pub fn check_bounds(x: u32, y: u32, image: &Canvas, width: u32, height: u32) -> Result<()> {
    let (w, h) = (image.width(), image.height());
    let fits_x = x.checked_add(w).is_some_and(|right| right <= width);
    let fits_y = y.checked_add(h).is_some_and(|bottom| bottom <= height);
    if fits_x && fits_y {
        Ok(())
    } else {
        Err(ProtocolError::OutOfBounds {
            x,
            y,
            w,
            h,
            width,
            height,
        }
        .into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PanelError;

    #[test]
    fn long_poll_intervals_saturate() {
        let policy = ReadyPolicy {
            interval: Duration::from_secs(5000),
            timeout: None,
        };
        // 5e9 microseconds does not fit in a u32
        assert_eq!(policy.interval_us(), u32::MAX);
        assert_eq!(policy.interval_ms(), 5_000_000);

        let default = ReadyPolicy::default();
        assert_eq!(default.interval_us(), 100_000);
        assert_eq!(default.interval_ms(), 100);
    }

    #[test]
    fn state_guards() {
        assert!(DriverState::Initialized.ensure_initialized().is_ok());
        assert!(matches!(
            DriverState::Uninitialized.ensure_initialized(),
            Err(PanelError::Protocol(ProtocolError::NotInitialized))
        ));
        assert!(matches!(
            DriverState::Closed.ensure_initialized(),
            Err(PanelError::Transport(TransportError::Closed))
        ));
        assert!(DriverState::Uninitialized.ensure_open().is_ok());
        assert!(DriverState::Closed.ensure_open().is_err());
    }

    #[test]
    fn bounds() {
        let image = Canvas::new(10, 10);
        assert!(check_bounds(0, 0, &image, 10, 10).is_ok());
        assert!(check_bounds(5, 0, &image, 15, 10).is_ok());
        assert!(matches!(
            check_bounds(1, 0, &image, 10, 10),
            Err(PanelError::Protocol(ProtocolError::OutOfBounds { x: 1, .. }))
        ));
        assert!(check_bounds(u32::MAX, 0, &image, 10, 10).is_err());
    }

    #[test]
    fn query_result_prints_known_fields() {
        let result = QueryResult {
            width: Some(1872),
            vcom: Some(2000),
            ..QueryResult::default()
        };
        let text = result.to_string();
        assert!(text.contains("1872"));
        assert!(text.contains("vcom"));
        assert!(!text.contains("height"));
    }
}

//! Error taxonomy for the panel engine
//!
//! Pin and SPI level failures keep the [`DisplayError`] shape used by
//! `display-interface`; everything above that is classified into
//! configuration, transport and protocol failures.

use std::time::Duration;

pub use display_interface::DisplayError;
use thiserror::Error;

/// Unrecognized or unsupported configuration. Raised before any hardware access.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("unknown driver type: {0}")]
    UnknownDriver(String),
    #[error("unknown {driver} panel type: {panel}")]
    UnknownPanel { driver: String, panel: String },
    #[error("remote panels are not supported (host {host}:{port})")]
    RemoteUnsupported { host: String, port: u16 },
}

/// Failure of the underlying byte channel.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("USB device {vendor_id:04x}:{product_id:04x} not found")]
    DeviceNotFound { vendor_id: u16, product_id: u16 },
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[cfg(feature = "usb")]
    #[error(transparent)]
    Transfer(#[from] nusb::transfer::TransferError),
    #[error("gpio/spi interface error: {0:?}")]
    Interface(DisplayError),
    #[error("failed to open {what}: {source}")]
    Open {
        what: &'static str,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    #[error("pin {0} has not been allocated")]
    PinNotAllocated(u8),
    #[error("short read: wanted {wanted} bytes, got {got}")]
    ShortRead { wanted: usize, got: usize },
    #[error("transport is closed")]
    Closed,
    #[error("{0} transport support was not compiled in")]
    Unavailable(&'static str),
}

impl TransportError {
    pub(crate) fn open<E>(what: &'static str, source: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        TransportError::Open {
            what,
            source: source.into(),
        }
    }
}

impl From<DisplayError> for TransportError {
    fn from(err: DisplayError) -> Self {
        TransportError::Interface(err)
    }
}

/// Malformed exchange or a request the controller cannot express.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("command status wrapper must be 13 bytes, got {0}")]
    StatusLength(usize),
    #[error("image chunk is too big: {len} > {max}")]
    OversizeChunk { len: usize, max: usize },
    #[error("1bpp mode only supports full-width images")]
    PartialWidth1bpp,
    #[error("unsupported pixel depth: {0}bpp")]
    UnsupportedDepth(u8),
    #[error("pack input of {len} samples is not a multiple of {step}")]
    PackLength { len: usize, step: usize },
    #[error("integer buffer of {0} bytes is not a multiple of 4")]
    IntLength(usize),
    #[error("{what} reply is {len} bytes, too short")]
    ShortInfo { what: &'static str, len: usize },
    #[error("register command value is {0} bytes, at most 9 fit")]
    ValueTooLong(usize),
    #[error("panel pitch is zero, width was never reported")]
    ZeroPitch,
    #[error("area {w}x{h} at ({x}, {y}) does not fit a {width}x{height} panel")]
    OutOfBounds {
        x: u32,
        y: u32,
        w: u32,
        h: u32,
        width: u32,
        height: u32,
    },
    #[error("driver used before init()")]
    NotInitialized,
}

/// Anything a panel driver operation can fail with.
#[derive(Debug, Error)]
pub enum PanelError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    #[error("panel still busy after {0:?}")]
    NotReady(Duration),
}

impl From<DisplayError> for PanelError {
    fn from(err: DisplayError) -> Self {
        PanelError::Transport(TransportError::Interface(err))
    }
}

/// Crate-wide result alias.
pub type Result<T, E = PanelError> = std::result::Result<T, E>;

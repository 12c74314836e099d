//! Device bridge: screenshots and UI hierarchy dumps from attached devices.
//!
//! The transport talks to devices through [`DevicePool`], which hands out one
//! [`DeviceBridge`] per serial, connecting lazily through a [`DeviceConnector`].
//! [`adb::AdbConnector`] is the production connector.

pub mod adb;
pub mod pool;
pub mod uidump;

use std::io;
use std::sync::Arc;
use thiserror::Error;

use crate::error::AppError;

pub use adb::{AdbConnector, AdbDevice};
pub use pool::DevicePool;
pub use uidump::{parse_hierarchy, Bounds, UiNode};

/// Serial that selects whichever single device is attached.
pub const DEFAULT_SERIAL: &str = "default";

#[derive(Debug, Error)]
pub enum DeviceError {
    /// No device answered for the serial.
    #[error("device not available: {0}")]
    Unavailable(String),

    /// The device tool ran but reported failure.
    #[error("device command failed: {0}")]
    CommandFailed(String),

    /// UI dump could not be parsed.
    #[error("malformed ui dump: {0}")]
    MalformedDump(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl From<DeviceError> for AppError {
    fn from(err: DeviceError) -> Self {
        let code = match &err {
            DeviceError::Unavailable(_) => "device_unavailable",
            DeviceError::CommandFailed(_) => "device_command_failed",
            DeviceError::MalformedDump(_) => "device_malformed_dump",
            DeviceError::Io(_) => "device_io",
        };
        AppError::device(code, err.to_string())
    }
}

pub type DeviceResult<T> = Result<T, DeviceError>;

/// One connected device. Calls block for a full device round-trip.
pub trait DeviceBridge: Send + Sync {
    /// Encoded image bytes (PNG or JPEG).
    fn capture_screenshot(&self) -> DeviceResult<Vec<u8>>;
    /// Top-level nodes of the current UI hierarchy.
    fn dump_ui_tree(&self) -> DeviceResult<Vec<UiNode>>;
}

/// Opens bridges. `None` means "the only attached device".
pub trait DeviceConnector: Send + Sync {
    fn connect(&self, serial: Option<&str>) -> DeviceResult<Arc<dyn DeviceBridge>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    Png,
    Jpeg,
}

impl ImageKind {
    /// Sniff the container from magic bytes.
    pub fn detect(bytes: &[u8]) -> Option<Self> {
        if bytes.starts_with(&[0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a]) {
            Some(ImageKind::Png)
        } else if bytes.starts_with(&[0xff, 0xd8, 0xff]) {
            Some(ImageKind::Jpeg)
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ImageKind::Png => "png",
            ImageKind::Jpeg => "jpeg",
        }
    }
}

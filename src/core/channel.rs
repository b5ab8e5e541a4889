//! Serial channel access
//!
//! The session engine only sees the [`Channel`] and [`ChannelOpener`] traits.
//! [`SerialOpener`] provides the real implementation on top of the `serialport`
//! crate; tests substitute scripted channels.

use std::io::{self, Read, Write};
use std::sync::Mutex;
use std::time::Duration;

use thiserror::Error;
use tracing::debug;

use crate::config::{DataBits, Parity, PortSettings, StopBits};

/// How long a single byte read may block before reporting "no data"
pub const READ_TIMEOUT: Duration = Duration::from_millis(500);

#[derive(Error, Debug)]
pub enum ChannelError {
    #[error("Failed to read from channel: {0}")]
    Read(#[source] io::Error),

    #[error("Failed to write to channel: {0}")]
    Write(#[source] io::Error),
}

pub type Result<T> = std::result::Result<T, ChannelError>;

/// Why a channel could not be opened
#[derive(Error, Debug)]
pub enum OpenError {
    /// The device is absent or busy; worth retrying
    #[error("{port} is not available: {reason}")]
    Unavailable { port: String, reason: String },

    /// The requested parameters can never succeed
    #[error("Invalid settings for {port}: {reason}")]
    InvalidSettings { port: String, reason: String },
}

impl OpenError {
    pub fn is_transient(&self) -> bool {
        matches!(self, OpenError::Unavailable { .. })
    }
}

/// An open byte channel supporting concurrent reads and writes from
/// different threads
pub trait Channel: Send + Sync {
    /// Read one byte, waiting at most the channel's read timeout.
    /// `Ok(None)` means no data arrived in time.
    fn read_byte(&self) -> Result<Option<u8>>;

    /// Write all bytes in a single operation
    fn write_all(&self, bytes: &[u8]) -> Result<()>;
}

/// Opens channels for the connection supervisor
pub trait ChannelOpener {
    fn open(&mut self, settings: &PortSettings) -> std::result::Result<Box<dyn Channel>, OpenError>;
}

/// A serial port with independent handles for each direction.
///
/// Each handle is only ever used by one worker, so the locks are never contended;
/// they exist because `SerialPort` needs `&mut` access and is not `Sync`.
pub struct SerialChannel {
    reader: Mutex<Box<dyn serialport::SerialPort>>,
    writer: Mutex<Box<dyn serialport::SerialPort>>,
}

impl Channel for SerialChannel {
    fn read_byte(&self) -> Result<Option<u8>> {
        let mut port = self.reader.lock().unwrap_or_else(|e| e.into_inner());
        let mut buf = [0u8; 1];

        match port.read(&mut buf) {
            Ok(0) => Ok(None),
            Ok(_) => Ok(Some(buf[0])),
            Err(e) if matches!(e.kind(), io::ErrorKind::TimedOut | io::ErrorKind::Interrupted) => {
                Ok(None)
            }
            Err(e) => Err(ChannelError::Read(e)),
        }
    }

    fn write_all(&self, bytes: &[u8]) -> Result<()> {
        let mut port = self.writer.lock().unwrap_or_else(|e| e.into_inner());
        port.write_all(bytes).map_err(ChannelError::Write)?;
        port.flush().map_err(ChannelError::Write)
    }
}

impl Drop for SerialChannel {
    fn drop(&mut self) {
        debug!("Closing serial channel");
    }
}

/// Opens real serial ports
#[derive(Debug, Default)]
pub struct SerialOpener;

impl ChannelOpener for SerialOpener {
    fn open(&mut self, settings: &PortSettings) -> std::result::Result<Box<dyn Channel>, OpenError> {
        let port = serialport::new(&settings.name, settings.baud.as_u32())
            .data_bits(settings.data_bits.into())
            .stop_bits(settings.stop_bits.into())
            .parity(settings.parity.into())
            .flow_control(serialport::FlowControl::None)
            .timeout(READ_TIMEOUT)
            .open()
            .map_err(|e| classify_open_error(&settings.name, e))?;

        let writer = port
            .try_clone()
            .map_err(|e| classify_open_error(&settings.name, e))?;

        Ok(Box::new(SerialChannel {
            reader: Mutex::new(port),
            writer: Mutex::new(writer),
        }))
    }
}

/// Decide whether a failed open is worth retrying
fn classify_open_error(port: &str, error: serialport::Error) -> OpenError {
    let port = port.to_string();
    let reason = error.description;

    match error.kind {
        serialport::ErrorKind::InvalidInput => OpenError::InvalidSettings { port, reason },
        serialport::ErrorKind::NoDevice
        | serialport::ErrorKind::Io(_)
        | serialport::ErrorKind::Unknown => OpenError::Unavailable { port, reason },
    }
}

impl From<DataBits> for serialport::DataBits {
    fn from(bits: DataBits) -> Self {
        match bits {
            DataBits::Six => serialport::DataBits::Six,
            DataBits::Seven => serialport::DataBits::Seven,
            DataBits::Eight => serialport::DataBits::Eight,
        }
    }
}

impl From<StopBits> for serialport::StopBits {
    fn from(bits: StopBits) -> Self {
        match bits {
            StopBits::One => serialport::StopBits::One,
            StopBits::Two => serialport::StopBits::Two,
        }
    }
}

impl From<Parity> for serialport::Parity {
    fn from(parity: Parity) -> Self {
        match parity {
            Parity::Disabled => serialport::Parity::None,
            Parity::Enabled => serialport::Parity::Even,
        }
    }
}

//! # Line Source — serial instrument boundary
//!
//! Abstracts the physical device: a byte-oriented serial link with fixed
//! 8-N-1 framing carrying line-delimited text. The session controller only
//! sees the [`LineSource`] trait, so tests (and any future transport) can
//! substitute an in-memory source.
//!
//! ## Contract
//!
//! - [`LineSource::read_available`] drains whatever is currently buffered on
//!   the link and returns **complete** raw lines. An idle link yields zero
//!   lines, never an error. A partial trailing line is carried over to the
//!   next call.
//! - [`LineSource::send_startup_token`] writes the fixed `CP\r\n` command
//!   after a settling delay. Callers treat failure as a warning, not a
//!   session-fatal error.
//! - [`LineSource::close`] is idempotent and must be called on every exit
//!   path; the serial handle is the only stateful external resource besides
//!   the output file.

use std::io::{Read, Write};
use std::time::Duration;

use thiserror::Error;

/// Fixed command sent to the instrument once per connection to request
/// continuous output.
pub const STARTUP_TOKEN: &[u8] = b"CP\r\n";

/// Delay before the startup token is written, letting the device become
/// ready after the port opens.
pub const SETTLE_DELAY: Duration = Duration::from_millis(500);

/// Upper bound on bytes pulled off the link per poll.
const MAX_CHUNK: usize = 16 * 1024;

/// Errors at the device boundary.
#[derive(Debug, Error)]
pub enum SourceError {
    /// The port could not be opened (missing, access denied, device absent).
    #[error("failed to open serial port: {0}")]
    Connect(#[source] serialport::Error),

    /// The port rejected an operation after it was open.
    #[error("serial port error: {0}")]
    Port(#[source] serialport::Error),

    /// An underlying I/O error on an open handle.
    #[error("serial io error: {0}")]
    Io(#[from] std::io::Error),

    /// The handle was closed (or never opened) when an operation needed it.
    #[error("serial port is closed")]
    Closed,
}

/// A lazy, potentially infinite producer of raw byte lines.
pub trait LineSource {
    /// Drains currently available bytes and returns complete raw lines,
    /// oldest first. Zero lines when nothing is available.
    fn read_available(&mut self) -> Result<Vec<Vec<u8>>, SourceError>;

    /// Writes the fixed startup command to the device.
    fn send_startup_token(&mut self) -> Result<(), SourceError>;

    fn is_open(&self) -> bool;

    /// Closes the handle. Safe to call repeatedly or on a never-opened
    /// handle.
    fn close(&mut self);
}

/// [`LineSource`] over a real serial port with 8-N-1 framing.
pub struct SerialLineSource {
    port: Option<Box<dyn serialport::SerialPort>>,
    /// Bytes received after the last complete line.
    pending: Vec<u8>,
}

impl SerialLineSource {
    /// Opens `port` at `baud` with 8 data bits, no parity, 1 stop bit.
    ///
    /// `read_timeout` bounds each read on the handle; an expired timeout is
    /// an idle poll, not an error.
    pub fn open(port: &str, baud: u32, read_timeout: Duration) -> Result<Self, SourceError> {
        let handle = serialport::new(port, baud)
            .data_bits(serialport::DataBits::Eight)
            .parity(serialport::Parity::None)
            .stop_bits(serialport::StopBits::One)
            .timeout(read_timeout)
            .open()
            .map_err(SourceError::Connect)?;

        tracing::debug!(port, baud, "serial port opened");
        Ok(Self {
            port: Some(handle),
            pending: Vec::new(),
        })
    }
}

impl LineSource for SerialLineSource {
    fn read_available(&mut self) -> Result<Vec<Vec<u8>>, SourceError> {
        let port = self.port.as_mut().ok_or(SourceError::Closed)?;

        let waiting = port.bytes_to_read().map_err(SourceError::Port)? as usize;
        if waiting > 0 {
            let mut chunk = vec![0u8; waiting.min(MAX_CHUNK)];
            match port.read(&mut chunk) {
                Ok(n) => self.pending.extend_from_slice(&chunk[..n]),
                // Raced with the device draining its buffer: an idle poll.
                Err(e)
                    if e.kind() == std::io::ErrorKind::TimedOut
                        || e.kind() == std::io::ErrorKind::WouldBlock => {}
                Err(e) => return Err(e.into()),
            }
        }

        Ok(split_complete_lines(&mut self.pending))
    }

    fn send_startup_token(&mut self) -> Result<(), SourceError> {
        let port = self.port.as_mut().ok_or(SourceError::Closed)?;
        std::thread::sleep(SETTLE_DELAY);
        port.write_all(STARTUP_TOKEN)?;
        port.flush()?;
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.port.is_some()
    }

    fn close(&mut self) {
        if self.port.take().is_some() {
            tracing::debug!("serial port closed");
        }
    }
}

impl Drop for SerialLineSource {
    fn drop(&mut self) {
        self.close();
    }
}

/// Splits off every `\n`-terminated line from `pending`, leaving any partial
/// trailing line in place. The terminator is stripped; a trailing `\r` is
/// left for the sanitizer.
pub fn split_complete_lines(pending: &mut Vec<u8>) -> Vec<Vec<u8>> {
    let Some(last_newline) = pending.iter().rposition(|&b| b == b'\n') else {
        return Vec::new();
    };

    let rest = pending.split_off(last_newline + 1);
    let mut complete = std::mem::replace(pending, rest);
    complete.pop(); // the terminating '\n'

    complete.split(|&b| b == b'\n').map(<[u8]>::to_vec).collect()
}

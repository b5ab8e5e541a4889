//! Terminal output shared by the receive worker, the transmit worker and
//! the connection supervisor.
//!
//! Every write is flushed immediately; received bytes must appear as soon as
//! they arrive.

use std::io::{self, Write};
use std::sync::Mutex;

use crossterm::cursor::MoveLeft;
use crossterm::queue;
use crossterm::terminal::{Clear, ClearType};

/// Flushed, thread-safe output sink
pub struct Console {
    out: Mutex<Box<dyn Write + Send>>,
}

impl Console {
    pub fn new(out: impl Write + Send + 'static) -> Self {
        Self {
            out: Mutex::new(Box::new(out)),
        }
    }

    /// Console writing to the process's stdout
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }

    /// Write bytes and flush
    pub fn write_bytes(&self, bytes: &[u8]) -> io::Result<()> {
        let mut out = self.out.lock().unwrap_or_else(|e| e.into_inner());
        out.write_all(bytes)?;
        out.flush()
    }

    /// Erase `columns` cells to the left of the cursor
    pub fn erase(&self, columns: u16) -> io::Result<()> {
        if columns == 0 {
            return Ok(());
        }
        let mut out = self.out.lock().unwrap_or_else(|e| e.into_inner());
        queue!(out, MoveLeft(columns), Clear(ClearType::UntilNewLine))?;
        out.flush()
    }

    /// Print a notice on its own line.
    ///
    /// Uses explicit `\r\n` since the terminal is in raw mode.
    pub fn notice(&self, message: &str) -> io::Result<()> {
        self.write_bytes(format!("\r\n{}\r\n", message).as_bytes())
    }
}

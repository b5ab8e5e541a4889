//! Transmit worker
//!
//! Polls the keystroke source and writes to the channel, either one key at a
//! time (dumb mode) or one escape-decoded line at a time (local-line mode).

use std::thread;
use std::time::Duration;

use tracing::{debug, info, warn};
use unicode_width::UnicodeWidthChar;

use super::cancel::CancellationToken;
use super::channel::Channel;
use super::escape::{self, EscapeSyntaxError};
use super::session::WorkerExit;
use crate::config::Mode;
use crate::ui::console::Console;
use crate::ui::keys::{Key, KeySource};

/// Sleep between keystroke polls when no key is pending
pub const KEY_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Byte sent for the end-of-input key in dumb mode
const EOT: u8 = 0x04;

/// Line being typed in local-line mode
#[derive(Debug, Default)]
pub struct LineEditor {
    buffer: String,
}

impl LineEditor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a character, returning the text to echo
    pub fn push(&mut self, ch: char) -> String {
        self.buffer.push(ch);
        echo_form(ch)
    }

    /// Remove the last character, returning how many columns its echo occupied
    pub fn backspace(&mut self) -> Option<u16> {
        self.buffer.pop().map(|ch| {
            if ch.is_control() {
                echo_form(ch).len() as u16
            } else {
                ch.width().unwrap_or(0).max(1) as u16
            }
        })
    }

    /// Encode the finished line and reset the buffer. The buffer is cleared
    /// even when the line is rejected.
    pub fn finish(&mut self) -> Result<Vec<u8>, EscapeSyntaxError> {
        let line = std::mem::take(&mut self.buffer);
        escape::encode(&line).map(|encoded| encoded.into_terminated())
    }

    #[allow(dead_code)]
    pub fn as_str(&self) -> &str {
        &self.buffer
    }
}

/// Echo text for a typed character. Control characters are shown in escape
/// form so they never reach the local terminal raw.
fn echo_form(ch: char) -> String {
    if ch.is_control() {
        let mut buf = [0u8; 4];
        ch.encode_utf8(&mut buf).bytes().map(escape::escape_byte).collect()
    } else {
        ch.to_string()
    }
}

/// Transmit worker bound to one session's channel and token
pub struct ChannelWriter<'a> {
    channel: &'a dyn Channel,
    token: &'a CancellationToken,
    console: &'a Console,
    keys: &'a mut dyn KeySource,
    mode: Mode,
    editor: LineEditor,
}

impl<'a> ChannelWriter<'a> {
    pub fn new(
        channel: &'a dyn Channel,
        token: &'a CancellationToken,
        console: &'a Console,
        keys: &'a mut dyn KeySource,
        mode: Mode,
    ) -> Self {
        Self {
            channel,
            token,
            console,
            keys,
            mode,
            editor: LineEditor::new(),
        }
    }

    /// Transmit until cancelled, the channel faults, or the user quits
    pub fn run(mut self) -> WorkerExit {
        while !self.token.is_cancelled() {
            let key = match self.next_key() {
                Ok(Some(key)) => key,
                Ok(None) => {
                    thread::sleep(KEY_POLL_INTERVAL);
                    continue;
                }
                Err(e) => {
                    warn!("Keystroke source failed: {}", e);
                    self.token.cancel();
                    return WorkerExit::UserTerminated;
                }
            };

            let step = match self.mode {
                Mode::Dumb => self.handle_dumb(key),
                Mode::Local => self.handle_local(key),
            };
            if let Some(exit) = step {
                self.token.cancel();
                return exit;
            }
        }

        debug!("Transmit worker cancelled");
        WorkerExit::Cancelled
    }

    fn next_key(&mut self) -> std::io::Result<Option<Key>> {
        if self.keys.available()? {
            self.keys.read_one()
        } else {
            Ok(None)
        }
    }

    /// Send every key as it is pressed
    fn handle_dumb(&mut self, key: Key) -> Option<WorkerExit> {
        let bytes = match key {
            Key::Cancel => {
                info!("Cancel key pressed");
                return Some(WorkerExit::UserTerminated);
            }
            Key::Backspace => {
                self.echo_erase(1);
                return None;
            }
            Key::Enter => vec![escape::LINE_TERMINATOR],
            Key::EndOfInput => vec![EOT],
            Key::Char(ch) => {
                let mut buf = [0u8; 4];
                ch.encode_utf8(&mut buf).as_bytes().to_vec()
            }
        };
        self.send(&bytes)
    }

    /// Edit a line locally and send it on Enter
    fn handle_local(&mut self, key: Key) -> Option<WorkerExit> {
        match key {
            Key::Cancel => {
                info!("Cancel key pressed");
                Some(WorkerExit::UserTerminated)
            }
            Key::EndOfInput => {
                info!("End of input");
                Some(WorkerExit::UserTerminated)
            }
            Key::Backspace => {
                if let Some(columns) = self.editor.backspace() {
                    self.echo_erase(columns);
                }
                None
            }
            Key::Char(ch) => {
                let echo = self.editor.push(ch);
                self.echo(echo.as_bytes());
                None
            }
            Key::Enter => {
                self.echo(b"\r\n");
                match self.editor.finish() {
                    Ok(bytes) => self.send(&bytes),
                    Err(e) => {
                        debug!("Line rejected: {}", e);
                        let message =
                            format!("error: bad escape sequence, line not sent ({})\r\n", e);
                        self.echo(message.as_bytes());
                        None
                    }
                }
            }
        }
    }

    fn send(&self, bytes: &[u8]) -> Option<WorkerExit> {
        match self.channel.write_all(bytes) {
            Ok(()) => None,
            Err(e) => {
                warn!("Transmit worker stopping: {}", e);
                Some(WorkerExit::ChannelFault)
            }
        }
    }

    fn echo(&self, bytes: &[u8]) {
        if let Err(e) = self.console.write_bytes(bytes) {
            debug!("Console write failed: {}", e);
        }
    }

    fn echo_erase(&self, columns: u16) {
        if let Err(e) = self.console.erase(columns) {
            debug!("Console write failed: {}", e);
        }
    }
}

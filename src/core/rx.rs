//! Receive worker
//!
//! Pulls bytes from the channel one at a time and renders them on the console.

use tracing::{debug, warn};

use super::cancel::CancellationToken;
use super::channel::Channel;
use super::escape::escape_byte;
use super::session::WorkerExit;
use crate::ui::console::Console;

/// U+FFFD, rendered for malformed UTF-8 input
const REPLACEMENT: &[u8] = "\u{FFFD}".as_bytes();

/// Printable ASCII plus the whitespace control codes
pub fn is_printable(byte: u8) -> bool {
    matches!(byte, 0x20..=0x7e | b'\t' | b'\n' | b'\r' | 0x0b | 0x0c)
}

/// Turns received bytes into console output
pub struct ByteRenderer {
    /// Show non-printable bytes escaped instead of raw
    display: bool,
    /// Bytes of an incomplete UTF-8 sequence
    pending: Vec<u8>,
    /// Total length of the pending sequence
    expected: usize,
    /// Previous byte was a carriage return
    after_cr: bool,
}

impl ByteRenderer {
    pub fn new(display: bool) -> Self {
        Self {
            display,
            pending: Vec::with_capacity(4),
            expected: 0,
            after_cr: false,
        }
    }

    /// Render one received byte, appending console output to `out`.
    ///
    /// May append nothing while a multi-byte character is incomplete.
    pub fn render(&mut self, byte: u8, out: &mut Vec<u8>) {
        // The terminal is in raw mode, so a bare LF needs its CR
        let bare_lf = byte == b'\n' && !self.after_cr;
        self.after_cr = byte == b'\r';

        if self.display {
            if bare_lf {
                out.push(b'\r');
            }
            if is_printable(byte) {
                out.push(byte);
            } else {
                out.extend_from_slice(escape_byte(byte).as_bytes());
            }
            return;
        }

        if !self.pending.is_empty() {
            if byte & 0xC0 == 0x80 {
                self.pending.push(byte);
                if self.pending.len() == self.expected {
                    match std::str::from_utf8(&self.pending) {
                        Ok(s) => out.extend_from_slice(s.as_bytes()),
                        Err(_) => out.extend_from_slice(REPLACEMENT),
                    }
                    self.pending.clear();
                }
                return;
            }
            // Sequence cut short; the new byte starts over
            out.extend_from_slice(REPLACEMENT);
            self.pending.clear();
        }

        if byte < 0x80 {
            if bare_lf {
                out.push(b'\r');
            }
            out.push(byte);
            return;
        }

        let seq_len = if byte & 0xE0 == 0xC0 {
            2
        } else if byte & 0xF0 == 0xE0 {
            3
        } else if byte & 0xF8 == 0xF0 {
            4
        } else {
            1
        };

        if seq_len == 1 {
            out.extend_from_slice(REPLACEMENT);
        } else {
            self.pending.push(byte);
            self.expected = seq_len;
        }
    }

    /// Give up on an incomplete multi-byte character, rendering it as U+FFFD
    pub fn finish(&mut self, out: &mut Vec<u8>) {
        if !self.pending.is_empty() {
            out.extend_from_slice(REPLACEMENT);
            self.pending.clear();
        }
    }
}

/// Receive worker bound to one session's channel and token
pub struct ChannelReader<'a> {
    channel: &'a dyn Channel,
    token: &'a CancellationToken,
    console: &'a Console,
    renderer: ByteRenderer,
}

impl<'a> ChannelReader<'a> {
    pub fn new(
        channel: &'a dyn Channel,
        token: &'a CancellationToken,
        console: &'a Console,
        display: bool,
    ) -> Self {
        Self {
            channel,
            token,
            console,
            renderer: ByteRenderer::new(display),
        }
    }

    /// Read and render until cancelled or the channel faults.
    ///
    /// A multi-byte character still incomplete after a read timeout, or when
    /// the worker stops, is rendered as U+FFFD.
    pub fn run(mut self) -> WorkerExit {
        let mut out = Vec::with_capacity(16);

        let exit = loop {
            if self.token.is_cancelled() {
                debug!("Receive worker cancelled");
                break WorkerExit::Cancelled;
            }

            out.clear();
            match self.channel.read_byte() {
                Ok(None) => self.renderer.finish(&mut out),
                Ok(Some(byte)) => self.renderer.render(byte, &mut out),
                Err(e) => {
                    warn!("Receive worker stopping: {}", e);
                    self.token.cancel();
                    break WorkerExit::ChannelFault;
                }
            }
            self.emit(&out);
        };

        out.clear();
        self.renderer.finish(&mut out);
        self.emit(&out);
        exit
    }

    fn emit(&self, out: &[u8]) {
        if out.is_empty() {
            return;
        }
        if let Err(e) = self.console.write_bytes(out) {
            debug!("Console write failed: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::testing::{MockChannel, ReadStep, SharedBuffer};

    fn render_all(display: bool, bytes: &[u8]) -> Vec<u8> {
        let mut renderer = ByteRenderer::new(display);
        let mut out = Vec::new();
        for &b in bytes {
            renderer.render(b, &mut out);
        }
        out
    }

    #[test]
    fn test_printable_set() {
        assert!(is_printable(b'a'));
        assert!(is_printable(b'~'));
        assert!(is_printable(b' '));
        assert!(is_printable(b'\r'));
        assert!(is_printable(0x0b));
        assert!(!is_printable(0x00));
        assert!(!is_printable(0x1b));
        assert!(!is_printable(0x7f));
        assert!(!is_printable(0x80));
    }

    #[test]
    fn test_display_escapes_non_printable() {
        assert_eq!(render_all(true, b"ok\r\n"), b"ok\r\n");
        assert_eq!(render_all(true, &[0x00, b'A', 0x1b, 0xff]), b"\\x00A\\x1b\\xff");
    }

    #[test]
    fn test_without_display_ascii_is_raw() {
        assert_eq!(render_all(false, b"\x1b[31mred\x07"), b"\x1b[31mred\x07");
    }

    #[test]
    fn test_utf8_is_assembled() {
        assert_eq!(render_all(false, "héllo → ✓".as_bytes()), "héllo → ✓".as_bytes());
    }

    #[test]
    fn test_malformed_utf8_is_replaced() {
        // Stray continuation byte
        assert_eq!(render_all(false, &[0x80, b'a']), "\u{FFFD}a".as_bytes());
        // Lead byte followed by ASCII
        assert_eq!(render_all(false, &[0xC3, b'a']), "\u{FFFD}a".as_bytes());
        // Overlong encoding of '/'
        assert_eq!(render_all(false, &[0xC0, 0xAF]), "\u{FFFD}".as_bytes());
    }

    #[test]
    fn test_incomplete_sequence_finished_as_replacement() {
        let mut renderer = ByteRenderer::new(false);
        let mut out = Vec::new();
        renderer.render(0xE2, &mut out);
        renderer.render(0x86, &mut out);
        assert!(out.is_empty());

        renderer.finish(&mut out);
        assert_eq!(out, "\u{FFFD}".as_bytes());

        // Nothing left to finish
        out.clear();
        renderer.finish(&mut out);
        renderer.render(b'z', &mut out);
        assert_eq!(out, b"z");
    }

    #[test]
    fn test_bare_line_feed_gets_carriage_return() {
        assert_eq!(render_all(false, b"one\ntwo\r\nthree"), b"one\r\ntwo\r\nthree");
        assert_eq!(render_all(true, b"a\n\n"), b"a\r\n\r\n");
        assert_eq!(render_all(false, b"\r\r\n"), b"\r\r\n");
    }

    #[test]
    fn test_reader_renders_in_order() {
        let channel = MockChannel::with_bytes(b"hi\x01");
        let buffer = SharedBuffer::new();
        let console = Console::new(buffer.clone());
        let token = CancellationToken::new();

        std::thread::scope(|s| {
            let reader = ChannelReader::new(&channel, &token, &console, true);
            let handle = s.spawn(move || reader.run());

            while buffer.bytes().len() < 6 {
                std::thread::yield_now();
            }
            token.cancel();
            assert_eq!(handle.join().unwrap(), WorkerExit::Cancelled);
        });

        assert_eq!(buffer.contents(), "hi\\x01");
    }

    #[test]
    fn test_fault_cancels_token() {
        let channel = MockChannel::with_bytes(b"ab");
        channel.push_read(ReadStep::Fault);
        let buffer = SharedBuffer::new();
        let console = Console::new(buffer.clone());
        let token = CancellationToken::new();

        let exit = ChannelReader::new(&channel, &token, &console, false).run();

        assert_eq!(exit, WorkerExit::ChannelFault);
        assert!(token.is_cancelled());
        assert_eq!(buffer.contents(), "ab");
        assert_eq!(channel.read_calls(), 3);
    }

    #[test]
    fn test_fault_mid_character_renders_replacement() {
        let channel = MockChannel::with_bytes(&[b'a', 0xC3]);
        channel.push_read(ReadStep::Fault);
        let buffer = SharedBuffer::new();
        let console = Console::new(buffer.clone());
        let token = CancellationToken::new();

        let exit = ChannelReader::new(&channel, &token, &console, false).run();

        assert_eq!(exit, WorkerExit::ChannelFault);
        assert_eq!(buffer.contents(), "a\u{FFFD}");
    }

    #[test]
    fn test_quiet_line_mid_character_renders_replacement() {
        let channel = MockChannel::with_bytes(&[0xF0, 0x9F]);
        channel.push_read(ReadStep::Timeout);
        channel.push_read(ReadStep::Byte(b'k'));
        channel.push_read(ReadStep::Fault);
        let buffer = SharedBuffer::new();
        let console = Console::new(buffer.clone());
        let token = CancellationToken::new();

        ChannelReader::new(&channel, &token, &console, false).run();

        assert_eq!(buffer.contents(), "\u{FFFD}k");
    }

    #[test]
    fn test_cancelled_reader_does_not_read() {
        let channel = MockChannel::with_bytes(b"x");
        let console = Console::new(SharedBuffer::new());
        let token = CancellationToken::new();
        token.cancel();

        let exit = ChannelReader::new(&channel, &token, &console, false).run();

        assert_eq!(exit, WorkerExit::Cancelled);
        assert_eq!(channel.read_calls(), 0);
    }
}

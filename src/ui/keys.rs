//! Keystroke input
//!
//! The transmit worker reads keys through the [`KeySource`] trait. The real
//! source is backed by crossterm events with the terminal in raw mode; raw
//! mode is held by a guard for the source's lifetime.

use std::io;
use std::time::Duration;

use bitflags::bitflags;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal;
use tracing::debug;

/// A key as seen by the transmit worker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    /// Any character, including control characters
    Char(char),
    Backspace,
    /// Carriage return (Enter)
    Enter,
    /// Interrupt (Ctrl+C)
    Cancel,
    /// End of input (Ctrl+D)
    EndOfInput,
}

/// A non-blocking source of keystrokes without echo
pub trait KeySource: Send {
    /// Whether a key event is ready to be read
    fn available(&mut self) -> io::Result<bool>;

    /// Read the pending event. Only valid after `available` returned true;
    /// events that are not key presses yield `None`.
    fn read_one(&mut self) -> io::Result<Option<Key>>;
}

bitflags! {
    /// Modifiers that change which byte a key produces. Shift is already
    /// folded into the character crossterm reports.
    #[derive(Clone, Copy, Debug, Default, PartialEq)]
    pub struct Modifiers: u8 {
        const CTRL = 0b01;
        const ALT  = 0b10;
    }
}

impl From<KeyModifiers> for Modifiers {
    fn from(mods: KeyModifiers) -> Self {
        let mut result = Modifiers::empty();
        if mods.contains(KeyModifiers::CONTROL) {
            result |= Modifiers::CTRL;
        }
        if mods.contains(KeyModifiers::ALT) {
            result |= Modifiers::ALT;
        }
        result
    }
}

/// Map a crossterm key event to a [`Key`]
pub fn map_key(event: &KeyEvent) -> Option<Key> {
    if event.kind != KeyEventKind::Press {
        return None;
    }
    let mods = Modifiers::from(event.modifiers);

    match event.code {
        KeyCode::Char(ch) if mods.contains(Modifiers::CTRL) && !mods.contains(Modifiers::ALT) => {
            match ch.to_ascii_lowercase() {
                'c' => Some(Key::Cancel),
                'd' => Some(Key::EndOfInput),
                c if c.is_ascii_alphabetic() || "@[\\]^_".contains(c) => {
                    Some(Key::Char(((c as u8) & 0x1f) as char))
                }
                _ => Some(Key::Char(ch)),
            }
        }
        KeyCode::Char(ch) => Some(Key::Char(ch)),
        KeyCode::Enter => Some(Key::Enter),
        KeyCode::Backspace => Some(Key::Backspace),
        KeyCode::Tab => Some(Key::Char('\t')),
        KeyCode::Esc => Some(Key::Char('\x1b')),
        KeyCode::Null => Some(Key::Char('\0')),
        _ => None,
    }
}

/// Keeps the terminal in raw mode until dropped
pub struct RawModeGuard(());

impl RawModeGuard {
    pub fn acquire() -> io::Result<Self> {
        terminal::enable_raw_mode()?;
        debug!("Raw mode enabled");
        Ok(Self(()))
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = terminal::disable_raw_mode();
        debug!("Raw mode restored");
    }
}

/// Keystrokes from the controlling terminal
pub struct CrosstermKeySource {
    _raw_mode: RawModeGuard,
}

impl CrosstermKeySource {
    pub fn new() -> io::Result<Self> {
        Ok(Self {
            _raw_mode: RawModeGuard::acquire()?,
        })
    }
}

impl KeySource for CrosstermKeySource {
    fn available(&mut self) -> io::Result<bool> {
        event::poll(Duration::ZERO)
    }

    fn read_one(&mut self) -> io::Result<Option<Key>> {
        match event::read()? {
            Event::Key(key_event) => Ok(map_key(&key_event)),
            _ => Ok(None),
        }
    }
}

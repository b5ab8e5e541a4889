//! Scripted collaborators for exercising sessions without hardware or a TTY

use std::collections::VecDeque;
use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use crate::config::PortSettings;
use crate::core::channel::{Channel, ChannelError, ChannelOpener, OpenError, Result};
use crate::ui::keys::{Key, KeySource};

/// How long an idle mock read blocks, standing in for the port timeout
const IDLE_READ: Duration = Duration::from_millis(2);

/// One scripted outcome of `read_byte`
#[derive(Debug, Clone, Copy)]
pub enum ReadStep {
    Byte(u8),
    /// Read timeout with no data
    Timeout,
    Fault,
}

/// Channel whose reads follow a script and whose writes are recorded
#[derive(Clone, Default)]
pub struct MockChannel {
    inner: Arc<MockInner>,
}

#[derive(Default)]
struct MockInner {
    reads: Mutex<VecDeque<ReadStep>>,
    writes: Mutex<Vec<Vec<u8>>>,
    fail_writes: AtomicBool,
    read_calls: AtomicUsize,
}

impl MockChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Channel that delivers `bytes` and then stays idle
    pub fn with_bytes(bytes: &[u8]) -> Self {
        let channel = Self::new();
        for &b in bytes {
            channel.push_read(ReadStep::Byte(b));
        }
        channel
    }

    /// Channel whose first read faults, like an unplugged adapter
    pub fn faulty() -> Self {
        let channel = Self::new();
        channel.push_read(ReadStep::Fault);
        channel
    }

    pub fn push_read(&self, step: ReadStep) {
        self.inner.reads.lock().unwrap().push_back(step);
    }

    pub fn fail_writes(&self) {
        self.inner.fail_writes.store(true, Ordering::SeqCst);
    }

    /// Every successful write call, in order
    pub fn writes(&self) -> Vec<Vec<u8>> {
        self.inner.writes.lock().unwrap().clone()
    }

    pub fn read_calls(&self) -> usize {
        self.inner.read_calls.load(Ordering::SeqCst)
    }
}

impl Channel for MockChannel {
    fn read_byte(&self) -> Result<Option<u8>> {
        self.inner.read_calls.fetch_add(1, Ordering::SeqCst);
        let step = self.inner.reads.lock().unwrap().pop_front();
        match step {
            Some(ReadStep::Byte(b)) => Ok(Some(b)),
            Some(ReadStep::Timeout) => Ok(None),
            Some(ReadStep::Fault) => Err(ChannelError::Read(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "device disconnected",
            ))),
            None => {
                thread::sleep(IDLE_READ);
                Ok(None)
            }
        }
    }

    fn write_all(&self, bytes: &[u8]) -> Result<()> {
        if self.inner.fail_writes.load(Ordering::SeqCst) {
            return Err(ChannelError::Write(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "device disconnected",
            )));
        }
        self.inner.writes.lock().unwrap().push(bytes.to_vec());
        Ok(())
    }
}

/// Key source replaying a fixed list of keys, then staying idle
#[derive(Default)]
pub struct ScriptedKeys {
    keys: VecDeque<Option<Key>>,
}

impl ScriptedKeys {
    pub fn new(keys: impl IntoIterator<Item = Key>) -> Self {
        Self {
            keys: keys.into_iter().map(Some).collect(),
        }
    }

    /// Keys for typing `text`, one character each; `\r` is the Enter key
    pub fn typed(text: &str) -> Self {
        Self::default().then_typed(text)
    }

    pub fn then_typed(mut self, text: &str) -> Self {
        self.keys.extend(text.chars().map(|c| match c {
            '\r' => Some(Key::Enter),
            c => Some(Key::Char(c)),
        }));
        self
    }

    pub fn then(mut self, key: Key) -> Self {
        self.keys.push_back(Some(key));
        self
    }

    /// Insert a non-key event (resize, focus, ...)
    pub fn then_other_event(mut self) -> Self {
        self.keys.push_back(None);
        self
    }

    pub fn remaining(&self) -> usize {
        self.keys.len()
    }
}

impl KeySource for ScriptedKeys {
    fn available(&mut self) -> io::Result<bool> {
        Ok(!self.keys.is_empty())
    }

    fn read_one(&mut self) -> io::Result<Option<Key>> {
        self.keys
            .pop_front()
            .ok_or_else(|| io::Error::new(io::ErrorKind::WouldBlock, "no key available"))
    }
}

/// One scripted outcome of `ChannelOpener::open`
pub enum OpenStep {
    Transient,
    Fatal,
    Open(MockChannel),
}

/// Opener replaying a script; fails fatally once the script runs out
pub struct ScriptedOpener {
    steps: VecDeque<OpenStep>,
    pub attempts: usize,
}

impl ScriptedOpener {
    pub fn new(steps: impl IntoIterator<Item = OpenStep>) -> Self {
        Self {
            steps: steps.into_iter().collect(),
            attempts: 0,
        }
    }
}

impl ChannelOpener for ScriptedOpener {
    fn open(&mut self, settings: &PortSettings) -> std::result::Result<Box<dyn Channel>, OpenError> {
        self.attempts += 1;
        match self.steps.pop_front() {
            Some(OpenStep::Open(channel)) => Ok(Box::new(channel)),
            Some(OpenStep::Transient) => Err(OpenError::Unavailable {
                port: settings.name.clone(),
                reason: "No such file or directory".to_string(),
            }),
            Some(OpenStep::Fatal) | None => Err(OpenError::InvalidSettings {
                port: settings.name.clone(),
                reason: "Invalid argument".to_string(),
            }),
        }
    }
}

/// Cloneable in-memory writer for capturing console output
#[derive(Clone, Default)]
pub struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl SharedBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bytes(&self) -> Vec<u8> {
        self.0.lock().unwrap().clone()
    }

    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.bytes()).into_owned()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

//! Connection supervisor
//!
//! Opens the channel, runs a [`DuplexSession`] on it, and reopens it when the
//! session ends because the device went away. Transient open failures are
//! retried forever; fatal ones end the program.

use std::thread;
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{debug, error, info, warn};

use super::channel::{Channel, ChannelOpener, OpenError};
use super::session::{DuplexSession, SessionOutcome};
use super::tx::KEY_POLL_INTERVAL;
use crate::config::Config;
use crate::ui::console::Console;
use crate::ui::keys::{Key, KeySource};

/// Delay between open attempts while the device is unavailable
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(1);

#[derive(Error, Debug)]
pub enum SupervisorError {
    #[error("Cannot open serial port: {0}")]
    FatalOpen(#[source] OpenError),
}

/// Result of one open attempt
pub enum ConnectionAttempt {
    Succeeded(Box<dyn Channel>),
    TransientFailure(OpenError),
    FatalFailure(OpenError),
}

/// Outer control loop owning the channel's open/close lifecycle
pub struct ConnectionSupervisor<O> {
    opener: O,
    config: Config,
    retry_delay: Duration,
}

impl<O: ChannelOpener> ConnectionSupervisor<O> {
    pub fn new(opener: O, config: Config) -> Self {
        Self {
            opener,
            config,
            retry_delay: DEFAULT_RETRY_DELAY,
        }
    }

    #[allow(dead_code)]
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    #[allow(dead_code)]
    pub fn opener(&self) -> &O {
        &self.opener
    }

    /// Try to open the channel once
    pub fn attempt(&mut self) -> ConnectionAttempt {
        match self.opener.open(&self.config.port) {
            Ok(channel) => ConnectionAttempt::Succeeded(channel),
            Err(e) if e.is_transient() => ConnectionAttempt::TransientFailure(e),
            Err(e) => ConnectionAttempt::FatalFailure(e),
        }
    }

    /// Run sessions until the user quits or the port can never be opened
    pub fn run(
        &mut self,
        console: &Console,
        keys: &mut dyn KeySource,
    ) -> Result<(), SupervisorError> {
        let port = self.config.port.name.clone();
        let mut waiting = false;

        loop {
            match self.attempt() {
                ConnectionAttempt::Succeeded(channel) => {
                    waiting = false;
                    info!("Opened {}", self.config.port);
                    notify(
                        console,
                        &format!(
                            "Serial monitor started: {}, {} mode, display {}",
                            self.config.port,
                            self.config.mode,
                            if self.config.display { "on" } else { "off" }
                        ),
                    );

                    let outcome = DuplexSession::new(
                        &*channel,
                        console,
                        keys,
                        self.config.mode,
                        self.config.display,
                    )
                    .run();

                    if outcome == SessionOutcome::UserTerminated {
                        info!("Exiting at user request");
                        return Ok(());
                    }

                    warn!("Lost connection to {}", port);
                    notify(
                        console,
                        &format!(
                            "[{}] Lost connection to {}",
                            chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
                            port
                        ),
                    );
                    drop(channel);
                    debug!("Closed {}", port);
                }
                ConnectionAttempt::TransientFailure(e) => {
                    if waiting {
                        debug!("Still waiting: {}", e);
                    } else {
                        waiting = true;
                        warn!("{}", e);
                        notify(console, &format!("Waiting to open {}...", port));
                    }
                    if self.wait_for_retry(keys) {
                        info!("Exiting at user request while waiting for {}", port);
                        return Ok(());
                    }
                }
                ConnectionAttempt::FatalFailure(e) => {
                    error!("{}", e);
                    return Err(SupervisorError::FatalOpen(e));
                }
            }
        }
    }

    /// Sleep out the retry delay while still honouring the quit keys.
    /// Returns true if the user asked to quit.
    fn wait_for_retry(&self, keys: &mut dyn KeySource) -> bool {
        let deadline = Instant::now() + self.retry_delay;

        loop {
            match keys.available() {
                Ok(true) => match keys.read_one() {
                    Ok(Some(Key::Cancel | Key::EndOfInput)) => return true,
                    Ok(_) => continue,
                    Err(e) => {
                        warn!("Keystroke source failed: {}", e);
                        return true;
                    }
                },
                Ok(false) => {}
                Err(e) => {
                    warn!("Keystroke source failed: {}", e);
                    return true;
                }
            }

            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            thread::sleep(KEY_POLL_INTERVAL.min(deadline - now));
        }
    }
}

fn notify(console: &Console, message: &str) {
    if let Err(e) = console.notice(message) {
        debug!("Console write failed: {}", e);
    }
}

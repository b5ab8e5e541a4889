//! Duplex session
//!
//! Runs the receive and transmit workers against one open channel. The
//! workers share a [`CancellationToken`]; whichever stops first cancels it
//! and the other notices on its next poll.
//!
//! ```text
//! Active ──(token cancelled)──> Faulted ──(both workers joined)──> Closed
//! ```

use std::thread;
use std::time::Duration;

use tracing::{debug, info, warn};

use super::cancel::CancellationToken;
use super::channel::Channel;
use super::rx::ChannelReader;
use super::tx::ChannelWriter;
use crate::config::Mode;
use crate::ui::console::Console;
use crate::ui::keys::KeySource;

/// How often the session checks on its workers
const OBSERVE_INTERVAL: Duration = Duration::from_millis(5);

/// Why a worker returned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerExit {
    /// The sibling worker requested the stop
    Cancelled,
    /// A read or write on the channel failed
    ChannelFault,
    /// The user asked to quit
    UserTerminated,
    /// The worker panicked
    Panicked,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Active,
    Faulted,
    Closed,
}

/// How a session ended, as reported to the supervisor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOutcome {
    /// The channel failed; reconnect
    ConnectionLost,
    /// The user quit; leave the program
    UserTerminated,
}

/// A receive and a transmit worker bound to one channel.
///
/// The session borrows the channel and never closes it.
pub struct DuplexSession<'a> {
    channel: &'a dyn Channel,
    console: &'a Console,
    keys: &'a mut dyn KeySource,
    mode: Mode,
    display: bool,
    token: CancellationToken,
    state: SessionState,
}

impl<'a> DuplexSession<'a> {
    pub fn new(
        channel: &'a dyn Channel,
        console: &'a Console,
        keys: &'a mut dyn KeySource,
        mode: Mode,
        display: bool,
    ) -> Self {
        Self {
            channel,
            console,
            keys,
            mode,
            display,
            token: CancellationToken::new(),
            state: SessionState::Active,
        }
    }

    #[allow(dead_code)]
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Start both workers and block until both have exited
    pub fn run(&mut self) -> SessionOutcome {
        if self.state == SessionState::Closed {
            return SessionOutcome::ConnectionLost;
        }

        let Self {
            channel,
            console,
            keys,
            mode,
            display,
            token,
            state,
        } = self;
        let token = &*token;
        let channel = *channel;
        let console = *console;

        let reader = ChannelReader::new(channel, token, console, *display);
        let writer = ChannelWriter::new(channel, token, console, &mut **keys, *mode);

        let (rx_exit, tx_exit) = thread::scope(|s| {
            let rx = s.spawn(move || reader.run());
            let tx = s.spawn(move || writer.run());
            *state = SessionState::Active;
            debug!("Session active ({} mode)", mode);

            loop {
                if *state == SessionState::Active && token.is_cancelled() {
                    *state = SessionState::Faulted;
                    debug!("Session stop requested");
                }
                if rx.is_finished() && tx.is_finished() {
                    break;
                }
                // A worker that panicked never cancelled the token
                if (rx.is_finished() || tx.is_finished()) && !token.is_cancelled() {
                    token.cancel();
                }
                thread::sleep(OBSERVE_INTERVAL);
            }

            (
                rx.join().unwrap_or(WorkerExit::Panicked),
                tx.join().unwrap_or(WorkerExit::Panicked),
            )
        });

        *state = SessionState::Closed;
        info!("Session closed (receive: {:?}, transmit: {:?})", rx_exit, tx_exit);

        if rx_exit == WorkerExit::Panicked || tx_exit == WorkerExit::Panicked {
            warn!("A session worker panicked");
        }

        if tx_exit == WorkerExit::UserTerminated {
            SessionOutcome::UserTerminated
        } else {
            SessionOutcome::ConnectionLost
        }
    }
}

//! Core serial terminal engine.
//!
//! - **escape**: Escape sequence codec for local-line mode
//! - **cancel**: Cancellation token shared by a session's workers
//! - **channel**: Serial channel traits and the `serialport` implementation
//! - **rx**: Receive worker (channel → console)
//! - **tx**: Transmit worker (keys → channel)
//! - **session**: Duplex session pairing the two workers
//! - **supervisor**: Open / run / reconnect loop
//!
//! # Architecture
//!
//! ```text
//! ConnectionSupervisor
//! └── DuplexSession (one per successful open)
//!     ├── ChannelReader ──┐
//!     ├── ChannelWriter ──┼── CancellationToken
//!     └── &dyn Channel ───┘
//! ```

pub mod cancel;
pub mod channel;
pub mod escape;
pub mod rx;
pub mod session;
pub mod supervisor;
pub mod tx;

#[cfg(test)]
pub mod testing;

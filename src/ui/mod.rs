//! Terminal-facing input and output.
//!
//! - **console**: Flushed output shared by the workers and the supervisor
//! - **keys**: Keystroke source (crossterm, raw mode) and key mapping

pub mod console;
pub mod keys;

pub use console::Console;
pub use keys::CrosstermKeySource;

//! Devices the VM talks to between instructions
//!
//! - [`console`]: byte-at-a-time, non-blocking character I/O for `getc`/`putc`
//! - [`clock`]: source of one event per elapsed second
//! - [`trace`]: sink for `debug` instruction output

pub mod clock;
pub mod console;
pub mod trace;

pub use clock::{Clock, ManualClock, SystemClock};
pub use console::{Console, NullConsole, ScriptedConsole, SharedOutput, TerminalConsole};
pub use trace::{TraceLine, TraceLog};

//! ptyshot-pty: run a command in a PTY and capture its final screen.
//!
//! This crate sits between the host terminal, the PTY running the command
//! and the [`ScreenBuffer`](ptyshot_vt::ScreenBuffer) that reconstructs what
//! ended up on screen. Output is shown live while it is captured, and input
//! typed on the host reaches the command as if it were running natively.
//!
//! # Architecture
//!
//! - [`PtyHandle`] — Low-level PTY process management (spawn, resize, wait, close).
//! - [`HostTerminal`] — The controlling terminal: size, raw mode, input and
//!   output. [`StdioTerminal`] is the real one, [`HeadlessTerminal`] a stand-in.
//! - [`RawModeGuard`] / [`ResizeWatcher`] — Per-command raw mode and SIGWINCH
//!   handling, both undone before `execute` returns.
//! - [`TerminalSession`] — Ties it together with one input relay thread and
//!   one output relay thread per command.
//!
//! Unix only: relays poll raw file descriptors and resizing follows SIGWINCH.

mod error;
mod fd;
pub mod host;
pub mod pty;
pub mod raw_mode;
mod relay;
pub mod resize;
pub mod session;

pub use error::{ExecuteError, PtyError};
pub use host::{HeadlessTerminal, HostTerminal, InputEvent, InputSource, SharedOutput, StdioTerminal};
pub use pty::{CloseSignal, PtyHandle, PtyResizer};
pub use raw_mode::RawModeGuard;
pub use resize::ResizeWatcher;
pub use session::{tokenize, TerminalSession, Terminator};

/// Run `command_line` on the real controlling terminal and return the
/// rendered capture.
///
/// Shorthand for `TerminalSession::new().execute(command_line)`.
pub fn execute(command_line: &str) -> Result<String, ExecuteError> {
    TerminalSession::new().execute(command_line)
}

//! ptyshot-vt: plain-text screen capture for ptyshot.
//!
//! Feeds raw PTY output through a `vte` parser into a fixed-size character
//! grid and renders whatever is left on screen as plain lines of text. Only
//! cursor positioning, cursor home and clear-screen are interpreted; every
//! other escape sequence is consumed without touching the grid.

pub mod buffer;
pub mod screen;

pub use buffer::ScreenBuffer;
pub use screen::CursorPosition;

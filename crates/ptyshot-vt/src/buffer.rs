use std::sync::{Mutex, MutexGuard};

use vte::Parser;

use crate::screen::{CursorPosition, Screen};

struct State {
    screen: Screen,
    parser: Parser,
}

/// A fixed-size terminal screen fed with raw PTY output.
///
/// Wraps a [`Screen`] grid and a VTE parser behind a single mutex so the
/// output relay can write from its own thread while the owner keeps an
/// `Arc` for rendering once the relay has finished. Parser state survives
/// across writes, so an escape sequence split between two PTY reads is still
/// recognised.
pub struct ScreenBuffer {
    state: Mutex<State>,
}

impl ScreenBuffer {
    /// Create a blank buffer. Zero dimensions are treated as 1.
    pub fn new(cols: u16, rows: u16) -> Self {
        Self {
            state: Mutex::new(State {
                screen: Screen::new(cols, rows),
                parser: Parser::new(),
            }),
        }
    }

    /// Feed raw output bytes into the grid.
    pub fn write(&self, bytes: &[u8]) {
        let mut state = self.lock();
        let State { screen, parser } = &mut *state;
        parser.advance(screen, bytes);
    }

    /// Render the visible grid as plain text with trailing whitespace and
    /// trailing blank lines removed.
    pub fn render(&self) -> String {
        self.lock().screen.render()
    }

    pub fn cols(&self) -> u16 {
        self.lock().screen.cols()
    }

    pub fn rows(&self) -> u16 {
        self.lock().screen.rows()
    }

    pub fn cursor(&self) -> CursorPosition {
        self.lock().screen.cursor()
    }

    /// Raw contents of a single row, padding included.
    pub fn row_text(&self, row: u16) -> Option<String> {
        self.lock().screen.row_text(usize::from(row))
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| {
            log::warn!("recovering from poisoned screen buffer lock");
            poisoned.into_inner()
        })
    }
}

impl std::fmt::Debug for ScreenBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScreenBuffer")
            .field("cols", &self.cols())
            .field("rows", &self.rows())
            .field("cursor", &self.cursor())
            .finish()
    }
}

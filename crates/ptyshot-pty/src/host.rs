//! The controlling terminal a session runs against.
//!
//! [`StdioTerminal`] is the real terminal behind stdin/stdout. [`HeadlessTerminal`]
//! stands in for it when there is no tty: a fixed size, scripted keystrokes and
//! an in-memory output sink.

use std::fs::File;
use std::io::{self, Read, Write};
use std::os::fd::{AsFd, AsRawFd};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use crossterm::terminal;

use crate::fd::{dup_file, poll_readable};

/// Result of one bounded wait on host input.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InputEvent {
    /// `n` bytes were read into the buffer.
    Data(usize),
    /// Nothing arrived before the timeout.
    Idle,
    /// The input reached end of stream.
    Closed,
}

/// A source of keystrokes that can be waited on with a timeout.
pub trait InputSource: Send {
    fn poll_read(&mut self, buf: &mut [u8], timeout: Duration) -> io::Result<InputEvent>;
}

/// The terminal the user is sitting at.
pub trait HostTerminal: Send + Sync {
    /// Current `(cols, rows)`.
    fn size(&self) -> io::Result<(u16, u16)>;

    /// Save the current mode and switch to raw mode.
    fn enter_raw_mode(&self) -> io::Result<()>;

    /// Put back the mode saved by `enter_raw_mode`. Must be safe to call
    /// more than once.
    fn restore_mode(&self) -> io::Result<()>;

    fn input(&self) -> io::Result<Box<dyn InputSource>>;

    fn output(&self) -> Box<dyn Write + Send>;
}

/// The real controlling terminal.
#[derive(Clone, Copy, Debug, Default)]
pub struct StdioTerminal;

impl HostTerminal for StdioTerminal {
    fn size(&self) -> io::Result<(u16, u16)> {
        terminal::size()
    }

    fn enter_raw_mode(&self) -> io::Result<()> {
        terminal::enable_raw_mode()
    }

    fn restore_mode(&self) -> io::Result<()> {
        // crossterm keeps the pre-raw termios and forgets it once restored,
        // so a second call is a no-op.
        terminal::disable_raw_mode()
    }

    fn input(&self) -> io::Result<Box<dyn InputSource>> {
        let file = dup_file(io::stdin().as_fd())?;
        Ok(Box::new(FdInput { file }))
    }

    fn output(&self) -> Box<dyn Write + Send> {
        Box::new(io::stdout())
    }
}

/// Reads a descriptor we own, polling first so the wait is bounded.
struct FdInput {
    file: File,
}

impl InputSource for FdInput {
    fn poll_read(&mut self, buf: &mut [u8], timeout: Duration) -> io::Result<InputEvent> {
        if !poll_readable(self.file.as_raw_fd(), timeout)? {
            return Ok(InputEvent::Idle);
        }
        match self.file.read(buf) {
            Ok(0) => Ok(InputEvent::Closed),
            Ok(n) => Ok(InputEvent::Data(n)),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => Ok(InputEvent::Idle),
            Err(e) => Err(e),
        }
    }
}

/// Cloneable in-memory sink; every clone appends to the same buffer.
#[derive(Clone, Debug, Default)]
pub struct SharedOutput(Arc<Mutex<Vec<u8>>>);

impl SharedOutput {
    pub fn contents(&self) -> Vec<u8> {
        self.lock().clone()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<u8>> {
        self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Write for SharedOutput {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// A terminal without a tty behind it.
///
/// Reports a fixed size, counts raw-mode transitions instead of performing
/// them, replays scripted input once and then stays idle, and collects live
/// output in a [`SharedOutput`].
#[derive(Debug)]
pub struct HeadlessTerminal {
    size: Mutex<(u16, u16)>,
    input: Vec<u8>,
    output: SharedOutput,
    raw_entries: AtomicUsize,
    restores: AtomicUsize,
    raw: AtomicBool,
}

impl HeadlessTerminal {
    pub fn new(cols: u16, rows: u16) -> Self {
        Self {
            size: Mutex::new((cols, rows)),
            input: Vec::new(),
            output: SharedOutput::default(),
            raw_entries: AtomicUsize::new(0),
            restores: AtomicUsize::new(0),
            raw: AtomicBool::new(false),
        }
    }

    /// Bytes delivered to the command as if typed, once per session.
    pub fn with_input(mut self, input: &[u8]) -> Self {
        self.input = input.to_vec();
        self
    }

    pub fn set_size(&self, cols: u16, rows: u16) {
        *self.size.lock().unwrap_or_else(|poisoned| poisoned.into_inner()) = (cols, rows);
    }

    /// Everything the command printed while running.
    pub fn output_bytes(&self) -> Vec<u8> {
        self.output.contents()
    }

    pub fn is_raw(&self) -> bool {
        self.raw.load(Ordering::SeqCst)
    }

    pub fn raw_entries(&self) -> usize {
        self.raw_entries.load(Ordering::SeqCst)
    }

    pub fn restores(&self) -> usize {
        self.restores.load(Ordering::SeqCst)
    }
}

impl HostTerminal for HeadlessTerminal {
    fn size(&self) -> io::Result<(u16, u16)> {
        Ok(*self.size.lock().unwrap_or_else(|poisoned| poisoned.into_inner()))
    }

    fn enter_raw_mode(&self) -> io::Result<()> {
        self.raw_entries.fetch_add(1, Ordering::SeqCst);
        self.raw.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn restore_mode(&self) -> io::Result<()> {
        if self.raw.swap(false, Ordering::SeqCst) {
            self.restores.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }

    fn input(&self) -> io::Result<Box<dyn InputSource>> {
        Ok(Box::new(ScriptedInput {
            pending: self.input.clone(),
        }))
    }

    fn output(&self) -> Box<dyn Write + Send> {
        Box::new(self.output.clone())
    }
}

struct ScriptedInput {
    pending: Vec<u8>,
}

impl InputSource for ScriptedInput {
    fn poll_read(&mut self, buf: &mut [u8], timeout: Duration) -> io::Result<InputEvent> {
        if self.pending.is_empty() {
            std::thread::sleep(timeout);
            return Ok(InputEvent::Idle);
        }
        let n = buf.len().min(self.pending.len());
        buf[..n].copy_from_slice(&self.pending[..n]);
        self.pending.drain(..n);
        Ok(InputEvent::Data(n))
    }
}

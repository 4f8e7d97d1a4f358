use std::sync::{Arc, Mutex, MutexGuard};

use portable_pty::ChildKiller;
use ptyshot_vt::ScreenBuffer;

use crate::error::ExecuteError;
use crate::host::{HostTerminal, StdioTerminal};
use crate::pty::PtyHandle;
use crate::raw_mode::RawModeGuard;
use crate::relay::{start_input_relay, start_output_relay};
use crate::resize::ResizeWatcher;

/// Runs commands inside a PTY attached to a host terminal and captures what
/// they leave on screen.
///
/// Each [`TerminalSession::execute`] call owns its own PTY, child process,
/// resize registration and [`ScreenBuffer`]; nothing is carried over from
/// one command to the next.
pub struct TerminalSession {
    host: Arc<dyn HostTerminal>,
    terminator: Terminator,
}

impl TerminalSession {
    /// A session on the real controlling terminal.
    pub fn new() -> Self {
        Self::with_host(Arc::new(StdioTerminal))
    }

    pub fn with_host(host: Arc<dyn HostTerminal>) -> Self {
        Self {
            host,
            terminator: Terminator::default(),
        }
    }

    /// Handle for killing whatever command this session is running.
    pub fn terminator(&self) -> Terminator {
        self.terminator.clone()
    }

    /// Run `command_line` interactively and return the rendered screen.
    ///
    /// The line is split on whitespace only: the first token is the program,
    /// the rest are passed through as literal arguments. Output is shown live
    /// on the host terminal while it is captured. A non-zero exit comes back
    /// as [`ExecuteError::Exited`] together with the captured text.
    pub fn execute(&self, command_line: &str) -> Result<String, ExecuteError> {
        let argv = tokenize(command_line);
        let Some((program, args)) = argv.split_first() else {
            return Err(ExecuteError::EmptyCommand);
        };

        let (cols, rows) = self.host.size().map_err(ExecuteError::TerminalSize)?;
        if cols == 0 || rows == 0 {
            // A tty whose window size was never set reports 0x0.
            return Err(ExecuteError::TerminalSize(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("terminal reports a {cols}x{rows} window"),
            )));
        }
        let mut pty = PtyHandle::spawn(program, args, cols, rows)?;
        log::debug!("running {argv:?} on a {cols}x{rows} pty");

        self.terminator.arm(pty.killer());
        let result = self.run(&mut pty, cols, rows);
        self.terminator.disarm();
        result
    }

    fn run(&self, pty: &mut PtyHandle, cols: u16, rows: u16) -> Result<String, ExecuteError> {
        let screen = Arc::new(ScreenBuffer::new(cols, rows));

        let mut watcher =
            ResizeWatcher::start(Arc::clone(&self.host), pty.resizer()).map_err(ExecuteError::Signal)?;
        let mut raw = RawModeGuard::enter(self.host.as_ref()).map_err(ExecuteError::RawMode)?;

        let input = self.host.input().map_err(ExecuteError::Relay)?;
        let pty_writer = pty.take_writer()?;
        let pty_reader = pty.clone_reader()?;

        let input_relay = start_input_relay(input, pty_writer, pty.close_signal())
            .map_err(ExecuteError::Relay)?;
        let output_relay = match start_output_relay(
            pty_reader,
            self.host.output(),
            Arc::clone(&screen),
            pty.close_signal(),
        ) {
            Ok(relay) => relay,
            Err(e) => {
                pty.close();
                let _ = input_relay.join();
                return Err(ExecuteError::Relay(e));
            }
        };

        if let Err(e) = pty.wait_exited() {
            log::debug!("waiting for exit without reaping failed: {e}");
        }
        self.terminator.disarm();
        let status = pty.wait();
        pty.close();

        for (name, relay) in [("input", input_relay), ("output", output_relay)] {
            if relay.join().is_err() {
                log::warn!("{name} relay panicked");
            }
        }
        watcher.stop();
        if let Err(e) = raw.restore() {
            log::warn!("failed to restore terminal mode: {e}");
        }

        let output = screen.render();
        let status = status.map_err(|e| match e {
            crate::error::PtyError::Io(e) => ExecuteError::Wait(e),
            other => ExecuteError::Pty(other),
        })?;

        if status.success() {
            Ok(output)
        } else {
            log::debug!("command exited with status {}", status.exit_code());
            Err(ExecuteError::Exited {
                code: status.exit_code(),
                output,
            })
        }
    }
}

impl Default for TerminalSession {
    fn default() -> Self {
        Self::new()
    }
}

/// Kills the command a [`TerminalSession`] is currently running.
///
/// `execute` blocks until the child exits; a caller that needs a timeout
/// keeps a terminator and fires it from another thread.
#[derive(Clone, Default)]
pub struct Terminator {
    killer: Arc<Mutex<Option<Box<dyn ChildKiller + Send + Sync>>>>,
}

impl Terminator {
    /// Kill the running command. Returns `false` when nothing was running.
    pub fn terminate(&self) -> std::io::Result<bool> {
        match self.lock().as_mut() {
            Some(killer) => {
                killer.kill()?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn arm(&self, killer: Box<dyn ChildKiller + Send + Sync>) {
        *self.lock() = Some(killer);
    }

    /// Once this returns no kill is in flight and none will be sent.
    fn disarm(&self) {
        self.lock().take();
    }

    fn lock(&self) -> MutexGuard<'_, Option<Box<dyn ChildKiller + Send + Sync>>> {
        self.killer.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Split a command line on whitespace. Quotes, escapes and shell operators
/// have no special meaning.
pub fn tokenize(command_line: &str) -> Vec<&str> {
    command_line.split_whitespace().collect()
}

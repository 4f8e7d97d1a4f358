use std::fs::File;
use std::io::Write;
use std::os::fd::BorrowedFd;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use portable_pty::{
    native_pty_system, Child, ChildKiller, CommandBuilder, ExitStatus, MasterPty, PtySize,
};

use crate::error::PtyError;
use crate::fd::dup_file;

type SharedMaster = Arc<Mutex<Option<Box<dyn MasterPty + Send>>>>;

/// Raised once when the PTY is closed; relays poll it to know the session
/// is over.
#[derive(Clone, Debug, Default)]
pub struct CloseSignal(Arc<AtomicBool>);

impl CloseSignal {
    pub fn is_closed(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub(crate) fn close(&self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

/// Owns a portable-pty child process and the master side of its PTY.
///
/// The slave side is dropped right after spawning, so once the child and
/// anything it forked have exited, reads on the master report end of stream.
pub struct PtyHandle {
    master: SharedMaster,
    child: Box<dyn Child + Send + Sync>,
    closed: CloseSignal,
}

impl PtyHandle {
    /// Spawn `program` with literal `args` on a new PTY of the given size.
    ///
    /// The child inherits the caller's environment and working directory.
    pub fn spawn<S: AsRef<str>>(
        program: &str,
        args: &[S],
        cols: u16,
        rows: u16,
    ) -> Result<Self, PtyError> {
        let pty_system = native_pty_system();

        let pair = pty_system
            .openpty(pty_size(cols, rows))
            .map_err(|e| PtyError::Open(e.to_string()))?;

        let mut cmd = CommandBuilder::new(program);
        for arg in args {
            cmd.arg(arg.as_ref());
        }
        if let Ok(cwd) = std::env::current_dir() {
            cmd.cwd(cwd);
        }
        if std::env::var_os("TERM").is_none() {
            cmd.env("TERM", "xterm-256color");
        }

        let child = pair
            .slave
            .spawn_command(cmd)
            .map_err(|e| PtyError::Spawn(format!("{program}: {e}")))?;
        drop(pair.slave);

        log::debug!("spawned {program} (pid {:?}) on {cols}x{rows} pty", child.process_id());

        Ok(Self {
            master: Arc::new(Mutex::new(Some(pair.master))),
            child,
            closed: CloseSignal::default(),
        })
    }

    pub fn pid(&self) -> Option<u32> {
        self.child.process_id()
    }

    /// Resize the PTY to new dimensions.
    pub fn resize(&self, cols: u16, rows: u16) -> Result<(), PtyError> {
        self.resizer().resize(cols, rows)
    }

    /// A handle that can resize this PTY from another thread until it is
    /// closed.
    pub fn resizer(&self) -> PtyResizer {
        PtyResizer {
            master: Arc::clone(&self.master),
        }
    }

    /// Duplicate the master descriptor into an independent reader.
    ///
    /// The reader owns its descriptor, so it can be polled and read on a
    /// dedicated thread while this handle keeps the master.
    pub fn clone_reader(&self) -> Result<File, PtyError> {
        let master = lock_master(&self.master);
        let master = master.as_ref().ok_or_else(closed_error)?;
        let fd = master
            .as_raw_fd()
            .ok_or_else(|| PtyError::Open("PTY master has no file descriptor".to_string()))?;

        // The master stays open for the duration of this borrow.
        let borrowed = unsafe { BorrowedFd::borrow_raw(fd) };
        Ok(dup_file(borrowed)?)
    }

    /// Take the writer for the master side (user input -> child).
    ///
    /// Can only be taken once.
    pub fn take_writer(&self) -> Result<Box<dyn Write + Send>, PtyError> {
        let master = lock_master(&self.master);
        let master = master.as_ref().ok_or_else(closed_error)?;
        master
            .take_writer()
            .map_err(|e| PtyError::Open(format!("failed to take writer: {e}")))
    }

    /// Signal observed by the relays once [`PtyHandle::close`] has run.
    pub fn close_signal(&self) -> CloseSignal {
        self.closed.clone()
    }

    /// A killer for the child that can be used from any thread.
    pub fn killer(&self) -> Box<dyn ChildKiller + Send + Sync> {
        self.child.clone_killer()
    }

    /// Block until the child has exited without reaping it.
    ///
    /// The pid stays reserved as a zombie until [`PtyHandle::wait`], so a
    /// killer that fires in between can never hit a recycled pid.
    pub fn wait_exited(&self) -> Result<(), PtyError> {
        let Some(pid) = self.pid() else {
            return Ok(());
        };
        loop {
            let mut info: libc::siginfo_t = unsafe { std::mem::zeroed() };
            let rc = unsafe {
                libc::waitid(
                    libc::P_PID,
                    pid as libc::id_t,
                    &mut info,
                    libc::WEXITED | libc::WNOWAIT,
                )
            };
            if rc == 0 {
                return Ok(());
            }
            let err = std::io::Error::last_os_error();
            if err.kind() != std::io::ErrorKind::Interrupted {
                return Err(err.into());
            }
        }
    }

    /// Block until the child exits and reap it.
    pub fn wait(&mut self) -> Result<ExitStatus, PtyError> {
        Ok(self.child.wait()?)
    }

    /// Check if the child process is still alive.
    pub fn is_alive(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(None))
    }

    /// Drop the master and raise the close signal. Idempotent.
    pub fn close(&self) {
        let master = lock_master(&self.master).take();
        if master.is_some() {
            log::debug!("closing pty for pid {:?}", self.pid());
        }
        drop(master);
        self.closed.close();
    }
}

impl Drop for PtyHandle {
    fn drop(&mut self) {
        if self.is_alive() {
            if let Err(e) = self.child.kill() {
                log::warn!("failed to kill pid {:?}: {e}", self.pid());
            } else {
                let _ = self.child.wait();
            }
        }
        self.close();
    }
}

/// Resizes a PTY from outside the owning thread. A no-op once the PTY has
/// been closed.
#[derive(Clone)]
pub struct PtyResizer {
    master: SharedMaster,
}

impl PtyResizer {
    pub fn resize(&self, cols: u16, rows: u16) -> Result<(), PtyError> {
        let master = lock_master(&self.master);
        match master.as_ref() {
            Some(master) => master
                .resize(pty_size(cols, rows))
                .map_err(|e| PtyError::Resize(e.to_string())),
            None => Ok(()),
        }
    }

    /// Current `(cols, rows)` of the PTY.
    pub fn size(&self) -> Result<(u16, u16), PtyError> {
        let master = lock_master(&self.master);
        let master = master.as_ref().ok_or_else(closed_error)?;
        let size = master
            .get_size()
            .map_err(|e| PtyError::Resize(e.to_string()))?;
        Ok((size.cols, size.rows))
    }
}

fn pty_size(cols: u16, rows: u16) -> PtySize {
    PtySize {
        rows,
        cols,
        pixel_width: 0,
        pixel_height: 0,
    }
}

fn closed_error() -> PtyError {
    PtyError::Open("PTY already closed".to_string())
}

fn lock_master(
    master: &Mutex<Option<Box<dyn MasterPty + Send>>>,
) -> MutexGuard<'_, Option<Box<dyn MasterPty + Send>>> {
    master.lock().unwrap_or_else(|poisoned| {
        log::warn!("recovering from poisoned pty master lock");
        poisoned.into_inner()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use std::thread;
    use std::time::{Duration, Instant};

    fn drain(mut reader: File) -> thread::JoinHandle<Vec<u8>> {
        thread::spawn(move || {
            let mut output = Vec::new();
            let mut buf = [0u8; 4096];
            loop {
                match reader.read(&mut buf) {
                    Ok(0) | Err(_) => return output,
                    Ok(n) => output.extend_from_slice(&buf[..n]),
                }
            }
        })
    }

    #[test]
    fn test_spawn_pty() {
        let handle = PtyHandle::spawn("sleep", &["5"], 80, 24);
        assert!(handle.is_ok(), "Failed to spawn PTY: {:?}", handle.err());
        let mut handle = handle.unwrap();
        assert!(handle.is_alive());
        assert!(handle.pid().is_some());
    }

    #[test]
    fn test_spawn_missing_program() {
        let result = PtyHandle::spawn::<&str>("/nonexistent/ptyshot-missing", &[], 80, 24);
        assert!(matches!(result, Err(PtyError::Spawn(_))));
    }

    #[test]
    fn test_read_echo_output() {
        let mut handle = PtyHandle::spawn("echo", &["PTYSHOT_TEST_OK"], 80, 24).unwrap();
        let reader = drain(handle.clone_reader().unwrap());

        let status = handle.wait().unwrap();
        assert!(status.success());
        handle.close();

        let output = reader.join().unwrap();
        let text = String::from_utf8_lossy(&output);
        assert!(
            text.contains("PTYSHOT_TEST_OK"),
            "Expected output to contain PTYSHOT_TEST_OK, got: {text}"
        );
    }

    #[test]
    fn test_write_reaches_child() {
        let mut handle = PtyHandle::spawn::<&str>("cat", &[], 80, 24).unwrap();
        let reader = drain(handle.clone_reader().unwrap());

        let mut writer = handle.take_writer().unwrap();
        writer.write_all(b"typed line\n\x04").unwrap();
        writer.flush().unwrap();

        assert!(handle.wait().unwrap().success());
        drop(writer);
        handle.close();

        let text = String::from_utf8_lossy(&reader.join().unwrap()).into_owned();
        assert!(text.contains("typed line"), "got: {text}");
    }

    #[test]
    fn test_resize() {
        let handle = PtyHandle::spawn("sleep", &["5"], 80, 24).unwrap();
        let result = handle.resize(120, 40);
        assert!(result.is_ok(), "Resize failed: {:?}", result.err());
        assert_eq!(handle.resizer().size().unwrap(), (120, 40));
    }

    #[test]
    fn test_child_exit_code() {
        let mut handle = PtyHandle::spawn("sh", &["-c", "exit 3"], 80, 24).unwrap();
        let status = handle.wait().unwrap();
        assert!(!status.success());
        assert_eq!(status.exit_code(), 3);
    }

    #[test]
    fn test_wait_exited_leaves_status_for_wait() {
        let mut handle = PtyHandle::spawn("sh", &["-c", "exit 5"], 80, 24).unwrap();
        handle.wait_exited().unwrap();
        handle.wait_exited().unwrap();

        // Still a zombie, so the pid is not free for reuse.
        let pid = handle.pid().unwrap() as libc::pid_t;
        assert_eq!(unsafe { libc::kill(pid, 0) }, 0);

        let status = handle.wait().unwrap();
        assert_eq!(status.exit_code(), 5);
    }

    #[test]
    fn test_close_is_idempotent_and_signals() {
        let handle = PtyHandle::spawn("sleep", &["5"], 80, 24).unwrap();
        let signal = handle.close_signal();
        let resizer = handle.resizer();
        assert!(!signal.is_closed());

        handle.close();
        handle.close();
        assert!(signal.is_closed());
        // Resizing a closed PTY is a no-op rather than an error.
        assert!(resizer.resize(100, 30).is_ok());
        assert!(resizer.size().is_err());
        assert!(handle.clone_reader().is_err());
    }

    #[test]
    fn test_killer_ends_child() {
        let mut handle = PtyHandle::spawn("sleep", &["30"], 80, 24).unwrap();
        let mut killer = handle.killer();
        killer.kill().unwrap();

        let started = Instant::now();
        let status = handle.wait().unwrap();
        assert!(!status.success());
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[test]
    fn test_drop_kills_running_child() {
        let handle = PtyHandle::spawn("sleep", &["30"], 80, 24).unwrap();
        let pid = handle.pid().unwrap() as libc::pid_t;
        drop(handle);

        // Reaped by drop, so the pid no longer refers to our child.
        let alive = unsafe { libc::kill(pid, 0) } == 0;
        assert!(!alive);
    }
}

use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use signal_hook::consts::SIGWINCH;
use signal_hook::iterator::{Handle, Signals};

use crate::host::HostTerminal;
use crate::pty::PtyResizer;

/// Follows SIGWINCH for the lifetime of one command.
///
/// Every notification re-queries the host size and applies it to the PTY.
/// The registration belongs to this watcher alone: [`ResizeWatcher::stop`]
/// (or dropping the watcher) unregisters it and joins the thread.
pub struct ResizeWatcher {
    handle: Handle,
    thread: Option<JoinHandle<()>>,
}

impl ResizeWatcher {
    pub fn start(host: Arc<dyn HostTerminal>, pty: PtyResizer) -> io::Result<Self> {
        let mut signals = Signals::new([SIGWINCH])?;
        let handle = signals.handle();

        let thread = thread::Builder::new()
            .name("pty-resize".to_string())
            .spawn(move || {
                for _ in signals.forever() {
                    match host.size() {
                        Ok((0, _)) | Ok((_, 0)) => log::debug!("ignoring empty terminal size"),
                        Ok((cols, rows)) => {
                            if let Err(e) = pty.resize(cols, rows) {
                                log::debug!("resize to {cols}x{rows} failed: {e}");
                            }
                        }
                        Err(e) => log::debug!("terminal size unavailable: {e}"),
                    }
                }
            });

        let thread = match thread {
            Ok(thread) => thread,
            Err(e) => {
                handle.close();
                return Err(e);
            }
        };

        Ok(Self {
            handle,
            thread: Some(thread),
        })
    }

    pub fn stop(&mut self) {
        self.handle.close();
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                log::warn!("resize watcher thread panicked");
            }
        }
    }
}

impl Drop for ResizeWatcher {
    fn drop(&mut self) {
        self.stop();
    }
}

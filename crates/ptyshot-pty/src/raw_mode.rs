use std::io;

use crate::host::HostTerminal;

/// Holds the host terminal in raw mode.
///
/// `restore` runs at most once no matter how often it is called, and `Drop`
/// calls it again so every early return still leaves the terminal usable.
pub struct RawModeGuard<'a> {
    host: &'a dyn HostTerminal,
    active: bool,
}

impl<'a> RawModeGuard<'a> {
    pub fn enter(host: &'a dyn HostTerminal) -> io::Result<Self> {
        host.enter_raw_mode()?;
        log::debug!("host terminal in raw mode");
        Ok(Self { host, active: true })
    }

    pub fn restore(&mut self) -> io::Result<()> {
        if !self.active {
            return Ok(());
        }
        self.active = false;
        log::debug!("restoring host terminal mode");
        self.host.restore_mode()
    }
}

impl Drop for RawModeGuard<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.restore() {
            log::warn!("failed to restore terminal mode: {e}");
        }
    }
}

use std::io;

use thiserror::Error;

/// Errors from PTY operations.
#[derive(Debug, Error)]
pub enum PtyError {
    #[error("failed to open PTY: {0}")]
    Open(String),
    #[error("failed to spawn command: {0}")]
    Spawn(String),
    #[error("PTY resize failed: {0}")]
    Resize(String),
    #[error("PTY I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Errors returned by [`crate::TerminalSession::execute`].
///
/// Everything except [`ExecuteError::Exited`] is a setup failure: nothing was
/// captured and the host terminal is back in the mode it started in.
#[derive(Debug, Error)]
pub enum ExecuteError {
    #[error("empty command")]
    EmptyCommand,
    #[error(transparent)]
    Pty(#[from] PtyError),
    #[error("error getting terminal size: {0}")]
    TerminalSize(#[source] io::Error),
    #[error("error setting raw mode: {0}")]
    RawMode(#[source] io::Error),
    #[error("error registering for resize signals: {0}")]
    Signal(#[source] io::Error),
    #[error("error starting I/O relay: {0}")]
    Relay(#[source] io::Error),
    #[error("error waiting for command: {0}")]
    Wait(#[source] io::Error),
    /// The command ran to completion with a non-zero status.
    #[error("command exited with status {code}")]
    Exited { code: u32, output: String },
}

impl ExecuteError {
    /// True when the command never ran to completion.
    pub fn is_setup(&self) -> bool {
        !matches!(self, ExecuteError::Exited { .. } | ExecuteError::Wait(_))
    }

    /// Text captured before the command failed, if it got that far.
    pub fn captured_output(&self) -> Option<&str> {
        match self {
            ExecuteError::Exited { output, .. } => Some(output),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_error_carries_output() {
        let err = ExecuteError::Exited {
            code: 2,
            output: "partial".to_string(),
        };
        assert!(!err.is_setup());
        assert_eq!(err.captured_output(), Some("partial"));
        assert_eq!(err.to_string(), "command exited with status 2");
    }

    #[test]
    fn test_setup_errors() {
        assert!(ExecuteError::EmptyCommand.is_setup());
        assert_eq!(ExecuteError::EmptyCommand.captured_output(), None);

        let err = ExecuteError::from(PtyError::Spawn("no such file".to_string()));
        assert!(err.is_setup());
        assert_eq!(err.to_string(), "failed to spawn command: no such file");
    }
}

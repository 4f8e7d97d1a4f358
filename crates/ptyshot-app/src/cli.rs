use clap::Parser;

const LONG_ABOUT: &str = "\
Runs COMMAND inside a pseudo-terminal attached to this terminal, then prints
what it left on screen as plain text.

The command line is split on whitespace only. Quotes, escapes, pipes and
redirects are passed to the program literally; wrap the command in `sh -c`
if it needs a shell.";

#[derive(Parser, Debug)]
#[command(name = "ptyshot")]
#[command(author, version)]
#[command(about = "Run a command in a PTY and capture its final screen")]
#[command(long_about = LONG_ABOUT)]
pub struct Cli {
    /// Print only the capture, without the "Captured output:" header
    #[arg(short, long)]
    pub quiet: bool,

    /// Log filter (e.g. "debug" or "ptyshot_pty=trace"); logs go to stderr
    #[arg(long, env = "PTYSHOT_LOG", default_value = "warn")]
    pub log_level: String,

    /// Command and arguments to run
    #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
    pub command: Vec<String>,
}

impl Cli {
    /// The command line handed to the session, re-joined with single spaces.
    pub fn command_line(&self) -> String {
        self.command.join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_trailing_args_keep_flags() {
        let cli = Cli::try_parse_from(["ptyshot", "-q", "ls", "-la", "/tmp"]).unwrap();
        assert!(cli.quiet);
        assert_eq!(cli.command_line(), "ls -la /tmp");
    }

    #[test]
    fn test_command_required() {
        assert!(Cli::try_parse_from(["ptyshot"]).is_err());
    }

    #[test]
    fn test_default_log_level() {
        let cli = Cli::try_parse_from(["ptyshot", "true"]).unwrap();
        assert!(!cli.quiet);
        assert!(!cli.log_level.is_empty());
    }
}

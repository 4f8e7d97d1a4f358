use std::io::IsTerminal;

use tracing_subscriber::EnvFilter;

/// Install the stderr subscriber.
///
/// The library crates log through the `log` facade; the subscriber's
/// `tracing-log` bridge picks those records up as well.
pub fn init_tracing(default_level: &str) {
    let env_filter =
        EnvFilter::try_new(default_level).unwrap_or_else(|_| EnvFilter::new("warn"));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_thread_names(true)
        .with_ansi(std::io::stderr().is_terminal())
        .with_writer(std::io::stderr);

    if subscriber.try_init().is_err() {
        eprintln!("Warning: logging already initialised");
    }
}

//! The two I/O threads of a session.
//!
//! Each relay runs on its own OS thread because terminal and PTY reads
//! block. Both wait with a bounded poll so they notice the [`CloseSignal`]
//! raised when the PTY is closed; read errors after that point are the
//! normal end of a session and are only logged.

use std::fs::File;
use std::io::{self, Read, Write};
use std::os::fd::AsRawFd;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use ptyshot_vt::ScreenBuffer;

use crate::fd::poll_readable;
use crate::host::{InputEvent, InputSource};
use crate::pty::CloseSignal;

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Quiet period that ends the drain once the PTY is closed.
const DRAIN_TIMEOUT: Duration = Duration::from_millis(20);

/// Hard cap on the drain. A background process that inherited the PTY can
/// keep writing after the command exits; it must not hold the session open.
const DRAIN_DEADLINE: Duration = Duration::from_millis(200);

/// Copy host keystrokes into the PTY until input ends, a write fails or
/// the PTY is closed.
pub(crate) fn start_input_relay(
    input: Box<dyn InputSource>,
    pty_writer: Box<dyn Write + Send>,
    closed: CloseSignal,
) -> io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("pty-input".to_string())
        .spawn(move || input_loop(input, pty_writer, closed))
}

fn input_loop(
    mut input: Box<dyn InputSource>,
    mut pty_writer: Box<dyn Write + Send>,
    closed: CloseSignal,
) {
    let mut buf = [0u8; 4096];

    while !closed.is_closed() {
        let n = match input.poll_read(&mut buf, POLL_INTERVAL) {
            Ok(InputEvent::Data(n)) => n,
            Ok(InputEvent::Idle) => continue,
            Ok(InputEvent::Closed) => {
                log::debug!("input relay: host input closed");
                return;
            }
            Err(e) => {
                log::debug!("input relay: read error: {e}");
                return;
            }
        };

        if let Err(e) = pty_writer
            .write_all(&buf[..n])
            .and_then(|()| pty_writer.flush())
        {
            log::debug!("input relay: pty write failed: {e}");
            return;
        }
    }
}

/// Copy PTY output to the host terminal and into the screen buffer until
/// the PTY reports end of stream, or it has been closed and either nothing
/// more is pending or the drain deadline has passed.
pub(crate) fn start_output_relay(
    pty_reader: File,
    live: Box<dyn Write + Send>,
    screen: Arc<ScreenBuffer>,
    closed: CloseSignal,
) -> io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("pty-output".to_string())
        .spawn(move || output_loop(pty_reader, live, &screen, closed))
}

fn output_loop(
    mut pty_reader: File,
    live: Box<dyn Write + Send>,
    screen: &ScreenBuffer,
    closed: CloseSignal,
) {
    let mut buf = [0u8; 65536];
    let mut live = Some(live);
    let fd = pty_reader.as_raw_fd();
    let mut deadline: Option<Instant> = None;

    loop {
        let draining = closed.is_closed();
        if draining {
            let deadline = *deadline.get_or_insert_with(|| Instant::now() + DRAIN_DEADLINE);
            if Instant::now() >= deadline {
                log::debug!("output relay: drain deadline reached with output pending");
                return;
            }
        }
        let timeout = if draining { DRAIN_TIMEOUT } else { POLL_INTERVAL };
        match poll_readable(fd, timeout) {
            Ok(true) => {}
            Ok(false) if draining => return,
            Ok(false) => continue,
            Err(e) => {
                log::debug!("output relay: poll failed: {e}");
                return;
            }
        }

        let n = match pty_reader.read(&mut buf) {
            Ok(0) => return,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            // EIO once the slave side is gone.
            Err(e) => {
                log::debug!("output relay: pty read ended: {e}");
                return;
            }
        };

        screen.write(&buf[..n]);

        if let Some(out) = live.as_mut() {
            if let Err(e) = out.write_all(&buf[..n]).and_then(|()| out.flush()) {
                log::debug!("output relay: live output disabled: {e}");
                live = None;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{HeadlessTerminal, HostTerminal, SharedOutput};
    use crate::pty::PtyHandle;
    use std::os::unix::net::UnixStream;

    #[test]
    fn test_output_relay_tees_to_screen_and_live() {
        let mut pty = PtyHandle::spawn("echo", &["tee"], 40, 5).unwrap();
        let screen = Arc::new(ScreenBuffer::new(40, 5));
        let live = SharedOutput::default();

        let relay = start_output_relay(
            pty.clone_reader().unwrap(),
            Box::new(live.clone()),
            Arc::clone(&screen),
            pty.close_signal(),
        )
        .unwrap();

        assert!(pty.wait().unwrap().success());
        pty.close();
        relay.join().unwrap();

        assert_eq!(screen.render(), "tee");
        assert!(String::from_utf8_lossy(&live.contents()).contains("tee"));
    }

    #[test]
    fn test_output_relay_stops_while_writer_keeps_going() {
        let (ours, theirs) = UnixStream::pair().unwrap();
        let closed = CloseSignal::default();
        let screen = Arc::new(ScreenBuffer::new(40, 5));

        let writer = thread::spawn(move || {
            let mut theirs = theirs;
            while theirs.write_all(b"y\n").is_ok() {}
        });
        let relay = start_output_relay(
            crate::fd::dup_file(std::os::fd::AsFd::as_fd(&ours)).unwrap(),
            Box::new(SharedOutput::default()),
            Arc::clone(&screen),
            closed.clone(),
        )
        .unwrap();

        thread::sleep(Duration::from_millis(50));
        let started = Instant::now();
        closed.close();
        relay.join().unwrap();
        assert!(started.elapsed() < Duration::from_secs(2));

        drop(ours);
        writer.join().unwrap();
        assert!(screen.render().contains('y'));
    }

    #[test]
    fn test_input_relay_stops_on_close() {
        let pty = PtyHandle::spawn("sleep", &["5"], 40, 5).unwrap();
        let host = HeadlessTerminal::new(40, 5);
        let relay = start_input_relay(
            host.input().unwrap(),
            pty.take_writer().unwrap(),
            pty.close_signal(),
        )
        .unwrap();

        pty.close();
        relay.join().unwrap();
    }

    #[test]
    fn test_input_relay_forwards_bytes() {
        let (ours, theirs) = UnixStream::pair().unwrap();
        let host = HeadlessTerminal::new(40, 5).with_input(b"keys");
        let closed = CloseSignal::default();

        let relay = start_input_relay(
            host.input().unwrap(),
            Box::new(theirs),
            closed.clone(),
        )
        .unwrap();

        let mut received = [0u8; 4];
        (&ours).read_exact(&mut received).unwrap();
        assert_eq!(&received, b"keys");

        closed.close();
        relay.join().unwrap();
    }
}

//! Subprocess execution with an optional deadline.
//!
//! `git` and `gh` calls that talk to the network can hang on a stalled
//! connection. [`output_within`] behaves like [`Command::output`] but kills
//! the child once the deadline passes and reports
//! [`std::io::ErrorKind::TimedOut`].

use std::io::{self, Read};
use std::process::{Command, Output, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use tracing::debug;

const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Run `command` to completion, capturing stdout and stderr.
///
/// With `timeout = None` this is [`Command::output`]. stdin is always closed
/// so credential prompts fail fast instead of waiting for input.
pub fn output_within(command: &mut Command, timeout: Option<Duration>) -> io::Result<Output> {
    command.stdin(Stdio::null());
    let Some(timeout) = timeout else {
        return command.output();
    };

    let mut child = command
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()?;

    // Pipes are drained while polling; a full pipe would stall the child.
    let stdout = child.stdout.take();
    let stderr = child.stderr.take();
    let stdout_reader = thread::spawn(move || drain(stdout));
    let stderr_reader = thread::spawn(move || drain(stderr));

    let deadline = Instant::now() + timeout;
    let status = loop {
        if let Some(status) = child.try_wait()? {
            break status;
        }
        if Instant::now() >= deadline {
            let _ = child.kill();
            let _ = child.wait();
            debug!(timeout_secs = timeout.as_secs(), "killed child after timeout");
            return Err(io::Error::new(
                io::ErrorKind::TimedOut,
                format!("no response within {}s", timeout.as_secs()),
            ));
        }
        thread::sleep(POLL_INTERVAL);
    };

    Ok(Output {
        status,
        stdout: stdout_reader.join().unwrap_or_default(),
        stderr: stderr_reader.join().unwrap_or_default(),
    })
}

fn drain<R: Read>(pipe: Option<R>) -> Vec<u8> {
    let mut buf = Vec::new();
    if let Some(mut pipe) = pipe {
        let _ = pipe.read_to_end(&mut buf);
    }
    buf
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn captures_output_without_timeout() {
        let output = output_within(Command::new("sh").args(["-c", "echo hi"]), None).unwrap();
        assert!(output.status.success());
        assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "hi");
    }

    #[test]
    fn captures_output_within_deadline() {
        let output = output_within(
            Command::new("sh").args(["-c", "echo out; echo err >&2; exit 3"]),
            Some(Duration::from_secs(10)),
        )
        .unwrap();
        assert_eq!(output.status.code(), Some(3));
        assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "out");
        assert_eq!(String::from_utf8_lossy(&output.stderr).trim(), "err");
    }

    #[test]
    fn kills_child_past_deadline() {
        let start = Instant::now();
        let err = output_within(
            Command::new("sh").args(["-c", "exec sleep 5"]),
            Some(Duration::from_millis(200)),
        )
        .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::TimedOut);
        assert!(start.elapsed() < Duration::from_secs(4));
    }
}

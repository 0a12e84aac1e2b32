// src/system/bridge.rs

//! Launches the child and relays the standard streams.
//!
//! Two modes:
//! - **Passthrough**: the child inherits all three streams and we wait.
//! - **Interactive**: the child gets pipes and a polling loop shuttles bytes
//!   between them and the caller until it exits, then drains what is left.

use crate::constants::FAILURE_EXIT_CODE;
use crate::system::executor::ExecutionError;
use std::io;
use std::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command, ExitStatus, Stdio};

#[cfg(unix)]
use crate::system::readiness::{is_readable, set_nonblocking};
#[cfg(unix)]
use std::io::{Read, Write};
#[cfg(unix)]
use std::os::fd::AsFd;
#[cfg(unix)]
use std::time::Duration;

/// Sleep between two rounds of the interactive loop.
#[cfg(unix)]
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Largest chunk moved in a single read.
#[cfg(unix)]
const CHUNK_SIZE: usize = 8192;

/// Reads per output stream per round, so one chatty stream cannot starve the others.
#[cfg(unix)]
const MAX_READS_PER_ROUND: usize = 16;

/// Lifecycle of one bridged child process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeState {
    NotStarted,
    Running,
    Draining,
    Terminated,
}

impl BridgeState {
    fn advance(&mut self, next: Self) {
        log::debug!("Bridge state: {:?} -> {:?}", self, next);
        *self = next;
    }
}

/// A running child with its pipes. Owned by the bridge until the exit code is known.
#[derive(Debug)]
pub struct ChildHandle {
    child: Child,
    stdin: Option<ChildStdin>,
    stdout: Option<ChildStdout>,
    stderr: Option<ChildStderr>,
    /// Caller input the child has not accepted yet.
    pending: Vec<u8>,
    exit_code: Option<i32>,
}

impl ChildHandle {
    fn new(mut child: Child) -> Self {
        Self {
            stdin: child.stdin.take(),
            stdout: child.stdout.take(),
            stderr: child.stderr.take(),
            child,
            pending: Vec::new(),
            exit_code: None,
        }
    }

    /// Process id of the child.
    pub fn pid(&self) -> u32 {
        self.child.id()
    }

    /// The exit code, once the child has been observed to terminate.
    pub fn exit_code(&self) -> Option<i32> {
        self.exit_code
    }

    /// Drops our end of the child's stdin, which the child sees as end-of-file.
    fn close_stdin(&mut self) {
        self.pending.clear();
        if self.stdin.take().is_some() {
            log::debug!("Closed stdin of child {}", self.pid());
        }
    }
}

/// Maps an exit status to a shell-style code: the child's own code, or
/// `128 + signal` when it was killed by a signal.
pub fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }
    FAILURE_EXIT_CODE
}

fn launch_failed(command: &Command) -> impl FnOnce(io::Error) -> ExecutionError + '_ {
    move |source| ExecutionError::ProcessLaunchFailed {
        program: command.get_program().to_string_lossy().into_owned(),
        source,
    }
}

/// Runs `command` with inherited stdio and waits for it.
///
/// # Errors
/// `ProcessLaunchFailed` if the process could not be started.
pub fn run_passthrough(mut command: Command) -> Result<i32, ExecutionError> {
    let mut state = BridgeState::NotStarted;
    command
        .stdin(Stdio::inherit())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit());

    let mut child = command.spawn().map_err(launch_failed(&command))?;
    state.advance(BridgeState::Running);

    let status = child
        .wait()
        .map_err(bridge_error("waiting for the child"))?;
    state.advance(BridgeState::Terminated);
    Ok(exit_code(status))
}

/// Runs `command` with piped stdio, relaying `input` to the child and the
/// child's output to `out` and `err` until it exits.
///
/// `input` is only read when it polls readable and the child has taken the
/// previous chunk. Writes to the child never block: what its stdin pipe does
/// not accept is kept for the next round, so a child that is busy writing
/// output keeps getting drained. Reaching the end of `input` closes the
/// child's stdin once everything before it was delivered. If relaying fails
/// midway the child is killed and reaped before the error is returned.
///
/// # Errors
/// `ProcessLaunchFailed` if the process could not be started, `Bridge` if
/// relaying fails.
#[cfg(unix)]
pub fn run_interactive<I, O, E>(
    mut command: Command,
    input: &mut I,
    out: &mut O,
    err: &mut E,
) -> Result<i32, ExecutionError>
where
    I: Read + AsFd,
    O: Write,
    E: Write,
{
    let mut state = BridgeState::NotStarted;
    command
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    let child = command.spawn().map_err(launch_failed(&command))?;
    let mut handle = scopeguard::guard(ChildHandle::new(child), |mut handle| {
        if handle.exit_code.is_none() {
            log::debug!("Bridge failed, killing child {}", handle.pid());
            let _ = handle.child.kill();
            let _ = handle.child.wait();
        }
    });
    if let Some(stdin) = &handle.stdin {
        set_nonblocking(stdin).map_err(bridge_error("configuring the child's stdin"))?;
    }
    state.advance(BridgeState::Running);

    let mut buf = vec![0u8; CHUNK_SIZE];
    let mut input_open = true;

    let status = loop {
        // 1. Caller -> child stdin.
        if input_open
            && handle.pending.is_empty()
            && is_readable(&*input).map_err(bridge_error("polling the caller's input"))?
        {
            let read = retry_interrupted(|| input.read(&mut buf))
                .map_err(bridge_error("reading the caller's input"))?;
            if read == 0 {
                input_open = false;
            } else if handle.stdin.is_some() {
                handle.pending.extend_from_slice(buf.get(..read).unwrap_or_default());
            }
        }
        forward_pending(&mut handle)?;
        if !input_open && handle.pending.is_empty() {
            handle.close_stdin();
        }

        // 2. Child stdout/stderr -> caller.
        relay_ready(&mut handle.stdout, out, &mut buf, MAX_READS_PER_ROUND)?;
        relay_ready(&mut handle.stderr, err, &mut buf, MAX_READS_PER_ROUND)?;

        // 3. Liveness.
        if let Some(status) = handle
            .child
            .try_wait()
            .map_err(bridge_error("checking the child's status"))?
        {
            break status;
        }
        std::thread::sleep(POLL_INTERVAL);
    };

    handle.exit_code = Some(exit_code(status));
    state.advance(BridgeState::Draining);
    handle.close_stdin();
    relay_ready(&mut handle.stdout, out, &mut buf, usize::MAX)?;
    relay_ready(&mut handle.stderr, err, &mut buf, usize::MAX)?;
    state.advance(BridgeState::Terminated);

    Ok(handle.exit_code.unwrap_or(FAILURE_EXIT_CODE))
}

/// Writes as much of the pending input as the child's stdin accepts right now.
#[cfg(unix)]
fn forward_pending(handle: &mut ChildHandle) -> Result<(), ExecutionError> {
    while !handle.pending.is_empty() {
        let Some(stdin) = handle.stdin.as_mut() else {
            handle.pending.clear();
            return Ok(());
        };
        match stdin.write(&handle.pending) {
            Ok(0) => {
                handle.close_stdin();
                return Ok(());
            }
            Ok(written) => {
                handle.pending.drain(..written);
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(()),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            // The child stopped reading; keep relaying its output.
            Err(e) if e.kind() == io::ErrorKind::BrokenPipe => {
                handle.close_stdin();
                return Ok(());
            }
            Err(e) => {
                return Err(ExecutionError::Bridge {
                    action: "writing to the child's stdin",
                    source: e,
                });
            }
        }
    }
    Ok(())
}

/// Copies whatever is ready on `pipe` to `sink`, up to `max_reads` chunks,
/// flushing after each write. Closes the pipe on end-of-file.
#[cfg(unix)]
fn relay_ready<P, W>(
    pipe: &mut Option<P>,
    sink: &mut W,
    buf: &mut [u8],
    max_reads: usize,
) -> Result<(), ExecutionError>
where
    P: Read + AsFd,
    W: Write,
{
    let mut reads = 0;
    while reads < max_reads {
        let Some(source) = pipe.as_mut() else {
            return Ok(());
        };
        if !is_readable(&*source).map_err(bridge_error("polling the child's output"))? {
            return Ok(());
        }
        let read = retry_interrupted(|| source.read(buf))
            .map_err(bridge_error("reading the child's output"))?;
        if read == 0 {
            *pipe = None;
            return Ok(());
        }
        sink.write_all(buf.get(..read).unwrap_or_default())
            .and_then(|()| sink.flush())
            .map_err(bridge_error("writing to the caller's output"))?;
        reads += 1;
    }
    Ok(())
}

#[cfg(unix)]
fn retry_interrupted<F>(mut read: F) -> io::Result<usize>
where
    F: FnMut() -> io::Result<usize>,
{
    loop {
        match read() {
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            other => return other,
        }
    }
}

fn bridge_error(action: &'static str) -> impl FnOnce(io::Error) -> ExecutionError {
    move |source| ExecutionError::Bridge { action, source }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::{Seek, SeekFrom};

    fn input_with(content: &str) -> File {
        let mut file = tempfile::tempfile().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.seek(SeekFrom::Start(0)).unwrap();
        file
    }

    fn sh(script: &str) -> Command {
        let mut command = Command::new("sh");
        command.arg("-c").arg(script);
        command
    }

    fn run(command: Command, input: &str) -> (i32, String, String) {
        let mut input = input_with(input);
        let mut out = Vec::new();
        let mut err = Vec::new();
        let code = run_interactive(command, &mut input, &mut out, &mut err).unwrap();
        (
            code,
            String::from_utf8(out).unwrap(),
            String::from_utf8(err).unwrap(),
        )
    }

    #[test]
    fn test_echoed_lines_are_neither_dropped_nor_duplicated() {
        for n in [1, 3, 10] {
            let messages: Vec<String> = (1..=n).map(|i| format!("message {i}")).collect();
            let mut input = messages.join("\n");
            input.push('\n');

            let (code, out, _) = run(Command::new("cat"), &input);
            let echoed: Vec<&str> = out.lines().collect();
            assert_eq!(code, 0);
            assert_eq!(echoed, messages, "n = {n}");
        }
    }

    #[test]
    fn test_exit_code_passthrough_in_both_modes() {
        let (code, _, _) = run(sh("exit 7"), "");
        assert_eq!(code, 7);
        assert_eq!(run_passthrough(sh("exit 7")).unwrap(), 7);
    }

    #[test]
    fn test_both_output_streams_are_relayed() {
        let (code, out, err) = run(sh("read line; echo \"out:$line\"; echo oops >&2; exit 3"), "hello\n");
        assert_eq!(code, 3);
        assert_eq!(out, "out:hello\n");
        assert_eq!(err, "oops\n");
    }

    #[test]
    fn test_output_after_input_ends_is_drained() {
        let (code, out, _) = run(sh("cat >/dev/null; i=0; while [ $i -lt 200 ]; do echo line$i; i=$((i+1)); done"), "x\n");
        assert_eq!(code, 0);
        assert_eq!(out.lines().count(), 200);
        assert_eq!(out.lines().last(), Some("line199"));
    }

    #[test]
    fn test_child_ignoring_stdin_still_finishes() {
        let big = "data\n".repeat(50_000);
        let (code, out, _) = run(sh("echo done"), &big);
        assert_eq!(code, 0);
        assert_eq!(out, "done\n");
    }

    #[test]
    fn test_busy_child_with_unread_input_does_not_stall() {
        let (done_tx, done_rx) = std::sync::mpsc::channel();
        std::thread::spawn(move || {
            let mut input = input_with(&"x".repeat(1 << 20));
            let (mut out, mut err) = (Vec::new(), Vec::new());
            let command = sh("sleep 0.3; head -c 3000000 /dev/zero; cat >/dev/null");
            let result = run_interactive(command, &mut input, &mut out, &mut err);
            let _ = done_tx.send((result.map_err(|e| e.to_string()), out.len()));
        });

        let (result, out_len) = done_rx
            .recv_timeout(Duration::from_secs(30))
            .expect("bridge stalled");
        assert_eq!(result, Ok(0));
        assert_eq!(out_len, 3_000_000);
    }

    #[test]
    fn test_input_larger_than_a_pipe_reaches_the_child_intact() {
        let input: String = (0..20_000).map(|i| format!("line {i}\n")).collect();
        assert!(input.len() > 64 * 1024);
        let (code, out, _) = run(Command::new("cat"), &input);
        assert_eq!(code, 0);
        assert_eq!(out, input);
    }

    #[test]
    fn test_signal_maps_to_128_plus_n() {
        let (code, _, _) = run(sh("kill -9 $$"), "");
        assert_eq!(code, 128 + 9);
    }

    #[test]
    fn test_launch_failure_is_reported() {
        let missing = Command::new("/nonexistent/phpx-missing-binary");
        let result = run_passthrough(missing);
        assert!(matches!(result, Err(ExecutionError::ProcessLaunchFailed { .. })));

        let mut input = input_with("");
        let (mut out, mut err) = (Vec::new(), Vec::new());
        let result = run_interactive(
            Command::new("/nonexistent/phpx-missing-binary"),
            &mut input,
            &mut out,
            &mut err,
        );
        assert!(matches!(result, Err(ExecutionError::ProcessLaunchFailed { .. })));
    }

    #[test]
    fn test_state_advances() {
        let mut state = BridgeState::NotStarted;
        state.advance(BridgeState::Running);
        state.advance(BridgeState::Draining);
        assert_eq!(state, BridgeState::Draining);
    }
}

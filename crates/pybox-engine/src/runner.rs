//! Worker supervision for one invocation.
//!
//! The runner spawns the interpreter with an embedded driver program,
//! streams the source over stdin, drains stdout into the capture channel
//! while the worker runs, and enforces the deadline by killing the worker.
//! The worker's exit status carries the fault classification; stderr carries
//! the diagnostic text.

use crate::capture::CaptureChannel;
use crate::config::EngineConfig;
use crate::context::ExecutionContext;
use crate::error::{EngineError, Result};
use crate::fault::{self, Fault, FaultKind};
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::time::timeout;

/// Exit codes reported by the driver program. The driver swallows
/// `SystemExit` from the source, so these cannot collide with a program
/// calling `sys.exit()`.
const EXIT_PARSE_FAULT: i32 = 10;
const EXIT_RUNTIME_FAULT: i32 = 11;
const EXIT_MEMORY_FAULT: i32 = 12;

/// SIGXCPU on Linux: delivered when the worker exhausts its CPU rlimit.
#[cfg(unix)]
const SIGXCPU: i32 = 24;

/// Cap on retained worker stderr (64 KiB). Only the tail line becomes the
/// diagnostic; the rest exists for logging.
const MAX_STDERR_BYTES: usize = 64 * 1024;

/// Driver program run inside the worker.
///
/// Protocol: the source arrives on stdin; optional rlimits arrive as argv.
/// The driver compiles first (so malformed source is reported without
/// executing anything), then runs the program in a namespace seeded only
/// with builtins. Its final stderr line is the formatted exception; its exit
/// code is the fault classification. `SystemExit` raised by the source is
/// intentional termination, not a fault.
const DRIVER: &str = r#"
import sys
import traceback

PARSE_FAULT = 10
RUNTIME_FAULT = 11
MEMORY_FAULT = 12


def apply_limits(memory_mb, cpu_secs):
    try:
        import resource
    except ImportError:
        return
    if memory_mb > 0:
        limit = memory_mb * 1024 * 1024
        try:
            resource.setrlimit(resource.RLIMIT_AS, (limit, limit))
        except (ValueError, OSError):
            pass
    if cpu_secs > 0:
        try:
            resource.setrlimit(resource.RLIMIT_CPU, (cpu_secs, cpu_secs + 1))
        except (ValueError, OSError):
            pass


def describe(exc):
    lines = traceback.format_exception_only(type(exc), exc)
    return lines[-1].strip() if lines else type(exc).__name__


def main():
    memory_mb = int(sys.argv[1]) if len(sys.argv) > 1 else 0
    cpu_secs = int(sys.argv[2]) if len(sys.argv) > 2 else 0
    apply_limits(memory_mb, cpu_secs)
    source = sys.stdin.read()
    try:
        program = compile(source, '<invocation>', 'exec')
    except (SyntaxError, ValueError) as exc:
        sys.stderr.write(describe(exc) + '\n')
        sys.exit(PARSE_FAULT)
    bindings = {'__name__': '__main__', '__builtins__': __builtins__}
    try:
        exec(program, bindings)
    except SystemExit:
        pass
    except MemoryError:
        sys.stdout.flush()
        sys.stderr.write('memory limit exceeded\n')
        sys.exit(MEMORY_FAULT)
    except BaseException as exc:
        sys.stdout.flush()
        sys.stderr.write(describe(exc) + '\n')
        sys.exit(RUNTIME_FAULT)
    sys.stdout.flush()


main()
"#;

/// Outcome of running one invocation to completion or failure.
#[derive(Debug)]
pub(crate) enum RunOutcome {
    /// The program ran to completion; output is in the capture channel.
    Success,
    /// The program faulted; partial output is in the capture channel.
    Fault(Fault),
}

/// Drives one invocation against an execution context and capture channel.
pub(crate) struct Runner<'a> {
    config: &'a EngineConfig,
}

impl<'a> Runner<'a> {
    pub fn new(config: &'a EngineConfig) -> Self {
        Self { config }
    }

    /// Run `source` in the worker defined by `context`, directing its output
    /// into `capture`.
    ///
    /// Returns `Err` only for host-side failures (spawn, pipe wiring); those
    /// are normalized by the gateway. Everything the program itself does
    /// wrong comes back as `RunOutcome::Fault`.
    pub async fn run(
        &self,
        source: &str,
        context: &ExecutionContext,
        capture: &Arc<CaptureChannel>,
    ) -> Result<RunOutcome> {
        let memory_mb = self.config.memory_limit_mb.unwrap_or(0);
        let cpu_secs = self.config.cpu_limit_secs.unwrap_or(0);

        let mut cmd = context.command();
        cmd.arg("-c")
            .arg(DRIVER)
            .arg(memory_mb.to_string())
            .arg(cpu_secs.to_string())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(EngineError::Spawn)?;
        tracing::debug!(invocation_id = %context.id(), "Worker spawned");

        let stdout = child.stdout.take().ok_or_else(|| {
            EngineError::WorkerIo(std::io::Error::other("worker stdout unavailable"))
        })?;
        let stderr = child.stderr.take().ok_or_else(|| {
            EngineError::WorkerIo(std::io::Error::other("worker stderr unavailable"))
        })?;
        let mut stdin = child.stdin.take().ok_or_else(|| {
            EngineError::WorkerIo(std::io::Error::other("worker stdin unavailable"))
        })?;

        // Drain pipes concurrently with the worker so write order is
        // preserved and partial output survives a deadline kill.
        let capture_task = {
            let capture = Arc::clone(capture);
            tokio::spawn(async move { capture.drain(stdout).await })
        };
        let stderr_task = tokio::spawn(read_bounded(stderr, MAX_STDERR_BYTES));

        // The driver reads stdin to EOF before executing anything, so the
        // source can be written in full up front.
        stdin
            .write_all(source.as_bytes())
            .await
            .map_err(EngineError::WorkerIo)?;
        drop(stdin);

        let status = match timeout(self.config.timeout, child.wait()).await {
            Ok(Ok(status)) => status,
            Ok(Err(e)) => {
                let _ = capture_task.await;
                let _ = stderr_task.await;
                return Err(EngineError::WorkerIo(e));
            }
            Err(_) => {
                tracing::warn!(
                    invocation_id = %context.id(),
                    timeout_secs = self.config.timeout.as_secs(),
                    "Deadline expired, killing worker"
                );
                if let Err(e) = child.start_kill() {
                    tracing::error!(invocation_id = %context.id(), error = %e, "Failed to kill worker");
                }
                let _ = child.wait().await;
                let _ = capture_task.await;
                let _ = stderr_task.await;
                return Ok(RunOutcome::Fault(Fault::new(
                    FaultKind::Resource,
                    format!(
                        "time limit exceeded after {}s",
                        self.config.timeout.as_secs()
                    ),
                )));
            }
        };

        let _ = capture_task.await;
        let stderr_text = stderr_task.await.unwrap_or_default();

        Ok(self.classify(context, status, &stderr_text))
    }

    /// Map the worker's exit status onto the fault taxonomy.
    fn classify(
        &self,
        context: &ExecutionContext,
        status: ExitStatus,
        stderr: &str,
    ) -> RunOutcome {
        if status.success() {
            return RunOutcome::Success;
        }

        let fault = match status.code() {
            Some(EXIT_PARSE_FAULT) => fault::normalize(FaultKind::Parse, stderr),
            Some(EXIT_RUNTIME_FAULT) => fault::normalize(FaultKind::Runtime, stderr),
            Some(EXIT_MEMORY_FAULT) => fault::normalize(FaultKind::Resource, stderr),
            Some(code) => {
                // The interpreter itself failed before the driver's protocol
                // could report anything (e.g. startup error).
                tracing::warn!(
                    invocation_id = %context.id(),
                    code,
                    "Worker exited outside the driver protocol"
                );
                fault::normalize_or(
                    FaultKind::Runtime,
                    stderr,
                    format!("worker exited with status {code}"),
                )
            }
            None => self.classify_signal(context, status),
        };

        RunOutcome::Fault(fault)
    }

    #[cfg(unix)]
    fn classify_signal(&self, context: &ExecutionContext, status: ExitStatus) -> Fault {
        use std::os::unix::process::ExitStatusExt;
        match status.signal() {
            Some(SIGXCPU) => Fault::new(FaultKind::Resource, "cpu time limit exceeded"),
            Some(signal) => {
                tracing::warn!(invocation_id = %context.id(), signal, "Worker killed by signal");
                Fault::new(
                    FaultKind::Runtime,
                    format!("worker terminated by signal {signal}"),
                )
            }
            None => Fault::new(FaultKind::Runtime, "worker terminated abnormally"),
        }
    }

    #[cfg(not(unix))]
    fn classify_signal(&self, _context: &ExecutionContext, _status: ExitStatus) -> Fault {
        Fault::new(FaultKind::Runtime, "worker terminated abnormally")
    }
}

/// Read a pipe to EOF, retaining at most `cap` bytes.
async fn read_bounded<R>(mut reader: R, cap: usize) -> String
where
    R: AsyncRead + Unpin,
{
    let mut buf = Vec::new();
    let mut chunk = [0u8; 8 * 1024];
    loop {
        match reader.read(&mut chunk).await {
            Ok(0) => break,
            Ok(n) => {
                let take = n.min(cap.saturating_sub(buf.len()));
                buf.extend_from_slice(&chunk[..take]);
            }
            Err(_) => break,
        }
    }
    String::from_utf8_lossy(&buf).into_owned()
}

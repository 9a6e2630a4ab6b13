//! Spawning, streaming, deadlines and two-phase termination.

use super::{AttemptOutcome, FailureDetail, RunReport, SupervisorError, TimeoutKind};
use crate::output::{OutputError, OutputValidator};
use crate::worker::WorkerCommand;
use crate::workspace::Workspace;
use chrono::{DateTime, Utc};
use mockable::Clock;
use std::process::ExitStatus;
use std::sync::Arc;
use std::time::Duration;
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader};
use tokio::process::Child;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep_until, timeout};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Lines buffered between the pipe readers and the log writer.
const LINE_BUFFER: usize = 256;

/// Upper bound on draining pipes after the worker is gone.
///
/// Grandchildren that outlive the worker can keep the pipes open.
const DRAIN_LIMIT: Duration = Duration::from_secs(2);

/// Deadlines applied to one attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    /// Longest allowed gap between output lines.
    pub idle: Duration,
    /// Longest allowed wall-clock run time.
    pub hard: Duration,
    /// Time between SIGTERM and SIGKILL.
    pub grace: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            idle: Duration::from_secs(300),
            hard: Duration::from_secs(1_800),
            grace: Duration::from_secs(10),
        }
    }
}

enum Stop {
    Exited(ExitStatus),
    Deadline(TimeoutKind),
    Cancelled,
    LogFailed(std::io::Error),
}

struct AttemptLog {
    file: File,
    path: camino::Utf8PathBuf,
    lines: u64,
    last_activity_at: DateTime<Utc>,
}

impl AttemptLog {
    async fn write_line(&mut self, line: &str, at: DateTime<Utc>) -> std::io::Result<()> {
        self.file.write_all(line.as_bytes()).await?;
        self.file.write_all(b"\n").await?;
        self.file.flush().await?;
        self.lines = self.lines.saturating_add(1);
        self.last_activity_at = at;
        Ok(())
    }

    fn failed(&self, source: std::io::Error) -> SupervisorError {
        SupervisorError::Log {
            path: self.path.clone(),
            source,
        }
    }
}

/// Runs worker attempts.
pub struct ProcessSupervisor<C>
where
    C: Clock + Send + Sync,
{
    command: WorkerCommand,
    clock: Arc<C>,
}

impl<C> ProcessSupervisor<C>
where
    C: Clock + Send + Sync,
{
    /// Creates a supervisor for `command`.
    #[must_use]
    pub const fn new(command: WorkerCommand, clock: Arc<C>) -> Self {
        Self { command, clock }
    }

    /// Returns the worker command.
    #[must_use]
    pub const fn command(&self) -> &WorkerCommand {
        &self.command
    }

    /// Runs one attempt in `workspace` until it exits, times out or is
    /// cancelled.
    ///
    /// Worker misbehaviour is reported through [`RunReport::outcome`]; only
    /// infrastructure problems are errors.
    ///
    /// # Errors
    ///
    /// Returns [`SupervisorError::Spawn`] when the worker cannot start,
    /// [`SupervisorError::Log`] when the attempt log cannot be written and
    /// [`SupervisorError::Wait`] when the process state cannot be observed.
    pub async fn run(
        &self,
        workspace: &Workspace,
        timeouts: Timeouts,
        cancel: &CancellationToken,
    ) -> Result<RunReport, SupervisorError> {
        let log_path = workspace.log_path();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)
            .await
            .map_err(|source| SupervisorError::Log {
                path: log_path.clone(),
                source,
            })?;
        let mut log = AttemptLog {
            file,
            path: log_path,
            lines: 0,
            last_activity_at: self.clock.utc(),
        };

        let mut child = self
            .command
            .build(workspace)
            .spawn()
            .map_err(|source| SupervisorError::Spawn {
                program: self.command.program.clone(),
                source,
            })?;
        info!(
            task_id = %workspace.task_id(),
            attempt = workspace.attempt().value(),
            pid = child.id(),
            command = %self.command.display_for(workspace),
            "worker started"
        );

        let (line_tx, mut lines) = mpsc::channel(LINE_BUFFER);
        let mut readers = Vec::with_capacity(2);
        if let Some(stdout) = child.stdout.take() {
            readers.push(forward_lines(stdout, line_tx.clone()));
        }
        if let Some(stderr) = child.stderr.take() {
            readers.push(forward_lines(stderr, line_tx.clone()));
        }
        drop(line_tx);

        let started = Instant::now();
        let hard_deadline = started + timeouts.hard;
        let mut idle_deadline = started + timeouts.idle;
        let mut streams_open = true;

        let stop = loop {
            tokio::select! {
                received = lines.recv(), if streams_open => match received {
                    Some(line) => {
                        if let Err(err) = log.write_line(&line, self.clock.utc()).await {
                            break Stop::LogFailed(err);
                        }
                        idle_deadline = Instant::now() + timeouts.idle;
                    }
                    None => streams_open = false,
                },
                status = child.wait() => break Stop::Exited(status.map_err(SupervisorError::Wait)?),
                () = sleep_until(idle_deadline) => break Stop::Deadline(TimeoutKind::Idle),
                () = sleep_until(hard_deadline) => break Stop::Deadline(TimeoutKind::Hard),
                () = cancel.cancelled() => break Stop::Cancelled,
            }
        };

        let (outcome, exit_status) = match stop {
            Stop::Exited(status) => {
                drain(&mut lines, &mut log, self.clock.as_ref()).await?;
                (Self::classify_exit(workspace, status).await, Some(status))
            }
            Stop::Deadline(kind) => {
                info!(
                    task_id = %workspace.task_id(),
                    attempt = workspace.attempt().value(),
                    timeout = %kind,
                    "worker deadline reached, terminating"
                );
                let status = terminate(&mut child, timeouts.grace).await?;
                drain(&mut lines, &mut log, self.clock.as_ref()).await?;
                (AttemptOutcome::TimedOut(kind), status)
            }
            Stop::Cancelled => {
                info!(
                    task_id = %workspace.task_id(),
                    attempt = workspace.attempt().value(),
                    "attempt cancelled, terminating worker"
                );
                let status = terminate(&mut child, timeouts.grace).await?;
                drain(&mut lines, &mut log, self.clock.as_ref()).await?;
                (AttemptOutcome::Killed, status)
            }
            Stop::LogFailed(err) => {
                terminate(&mut child, timeouts.grace).await?;
                abort_readers(readers);
                return Err(log.failed(err));
            }
        };
        abort_readers(readers);

        let exit_code = exit_status.and_then(|status| status.code());
        info!(
            task_id = %workspace.task_id(),
            attempt = workspace.attempt().value(),
            status = %outcome.status(),
            exit_code,
            log_lines = log.lines,
            "worker finished"
        );
        Ok(RunReport {
            outcome,
            exit_code,
            last_activity_at: log.last_activity_at,
            log_lines: log.lines,
        })
    }

    async fn classify_exit(workspace: &Workspace, status: ExitStatus) -> AttemptOutcome {
        if status.success() {
            return match OutputValidator::parse(workspace).await {
                Ok(result) => AttemptOutcome::Succeeded(result),
                Err(OutputError::Missing { .. }) => {
                    AttemptOutcome::Failed(FailureDetail::OutputMissing)
                }
                Err(err) => AttemptOutcome::Failed(FailureDetail::OutputInvalid(err)),
            };
        }
        let output_present = tokio::fs::try_exists(workspace.result_path())
            .await
            .unwrap_or(false);
        AttemptOutcome::Failed(FailureDetail::NonZeroExit {
            code: status.code(),
            output_present,
        })
    }
}

fn forward_lines<S>(stream: S, lines: mpsc::Sender<String>) -> JoinHandle<()>
where
    S: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut reader = BufReader::new(stream);
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf).await {
                Ok(0) => break,
                Ok(_) => {
                    let text = String::from_utf8_lossy(&buf);
                    let line = text.trim_end_matches(['\n', '\r']).to_owned();
                    if lines.send(line).await.is_err() {
                        break;
                    }
                }
                Err(err) => {
                    debug!(error = %err, "worker stream closed with an error");
                    break;
                }
            }
        }
    })
}

async fn drain(
    lines: &mut mpsc::Receiver<String>,
    log: &mut AttemptLog,
    clock: &(impl Clock + Send + Sync),
) -> Result<(), SupervisorError> {
    let drained = timeout(DRAIN_LIMIT, async {
        while let Some(line) = lines.recv().await {
            log.write_line(&line, clock.utc()).await?;
        }
        Ok::<(), std::io::Error>(())
    })
    .await;
    match drained {
        Ok(Ok(())) => Ok(()),
        Ok(Err(err)) => Err(log.failed(err)),
        Err(_elapsed) => {
            warn!(path = %log.path, "worker pipes still open after exit, log may be truncated");
            Ok(())
        }
    }
}

fn abort_readers(readers: Vec<JoinHandle<()>>) {
    for reader in readers {
        reader.abort();
    }
}

/// Sends SIGTERM to the worker's process group, waits `grace`, then kills.
async fn terminate(
    child: &mut Child,
    grace: Duration,
) -> Result<Option<ExitStatus>, SupervisorError> {
    request_stop(child);
    if let Ok(status) = timeout(grace, child.wait()).await {
        return status.map(Some).map_err(SupervisorError::Wait);
    }
    warn!(pid = child.id(), "worker ignored the stop request, killing");
    force_kill(child);
    child.wait().await.map(Some).map_err(SupervisorError::Wait)
}

#[cfg(unix)]
fn request_stop(child: &Child) {
    signal_group(child, nix::sys::signal::Signal::SIGTERM);
}

#[cfg(not(unix))]
fn request_stop(child: &mut Child) {
    force_kill(child);
}

#[cfg(unix)]
fn force_kill(child: &mut Child) {
    signal_group(child, nix::sys::signal::Signal::SIGKILL);
    if let Err(err) = child.start_kill() {
        debug!(error = %err, "worker already reaped");
    }
}

#[cfg(not(unix))]
fn force_kill(child: &mut Child) {
    if let Err(err) = child.start_kill() {
        debug!(error = %err, "worker already reaped");
    }
}

#[cfg(unix)]
fn signal_group(child: &Child, signal: nix::sys::signal::Signal) {
    use nix::errno::Errno;
    use nix::sys::signal::killpg;
    use nix::unistd::Pid;

    let Some(pid) = child.id().and_then(|id| i32::try_from(id).ok()) else {
        return;
    };
    match killpg(Pid::from_raw(pid), signal) {
        Ok(()) | Err(Errno::ESRCH) => {}
        Err(err) => warn!(pid, signal = %signal, error = %err, "failed to signal worker group"),
    }
}

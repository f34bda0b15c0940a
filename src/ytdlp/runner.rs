use async_trait::async_trait;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::args::ExtractorArgs;
use super::validate::{classify_stderr, FailureHint};
use crate::utils::truncate_for_log;

/// Captured result of one finished process
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProcessOutput {
    pub success: bool,
    /// Exit code, `None` when the process was killed by a signal
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl From<std::process::Output> for ProcessOutput {
    fn from(output: std::process::Output) -> Self {
        Self {
            success: output.status.success(),
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        }
    }
}

/// Why a process could not produce a [`ProcessOutput`]
#[derive(thiserror::Error, Debug)]
pub enum RunError {
    #[error("failed to start process: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("failed to collect process output: {0}")]
    Io(#[source] std::io::Error),

    #[error("process timed out after {0:?}")]
    TimedOut(Duration),

    #[error("process cancelled")]
    Cancelled,
}

/// Capability to run an external program to completion
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    async fn run(
        &self,
        program: &str,
        args: &[String],
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<ProcessOutput, RunError>;
}

/// How long to wait for a killed process group to disappear
#[cfg(unix)]
const GROUP_EXIT_GRACE: Duration = Duration::from_secs(2);

type PipeReader = JoinHandle<std::io::Result<Vec<u8>>>;

/// Runs programs with `tokio::process`.
///
/// On unix the child leads its own process group, so the helpers it starts
/// (ffmpeg for conversion and merging) are killed along with it. The group is
/// always torn down before `run` returns, whatever the outcome.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioProcessRunner;

#[async_trait]
impl ProcessRunner for TokioProcessRunner {
    async fn run(
        &self,
        program: &str,
        args: &[String],
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<ProcessOutput, RunError> {
        let mut command = Command::new(program);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        command.process_group(0);

        let mut child = command.spawn().map_err(RunError::Spawn)?;
        let pid = child.id();
        let mut stdout = tokio::spawn(read_pipe(child.stdout.take()));
        let mut stderr = tokio::spawn(read_pipe(child.stderr.take()));

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(RunError::Cancelled),
            finished = tokio::time::timeout(timeout, collect_output(&mut child, &mut stdout, &mut stderr)) => {
                finished.unwrap_or(Err(RunError::TimedOut(timeout)))
            }
        };

        terminate_tree(&mut child, pid).await;
        stdout.abort();
        stderr.abort();

        result
    }
}

async fn read_pipe<R: AsyncRead + Unpin>(pipe: Option<R>) -> std::io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    if let Some(mut pipe) = pipe {
        pipe.read_to_end(&mut buf).await?;
    }
    Ok(buf)
}

async fn collect_output(
    child: &mut Child,
    stdout: &mut PipeReader,
    stderr: &mut PipeReader,
) -> Result<ProcessOutput, RunError> {
    let status = child.wait().await.map_err(RunError::Io)?;
    let stdout = join_pipe(stdout).await?;
    let stderr = join_pipe(stderr).await?;

    Ok(std::process::Output { status, stdout, stderr }.into())
}

async fn join_pipe(reader: &mut PipeReader) -> Result<Vec<u8>, RunError> {
    match reader.await {
        Ok(read) => read.map_err(RunError::Io),
        Err(e) => Err(RunError::Io(std::io::Error::other(e))),
    }
}

/// Kill the child's whole process group and wait until it is gone
#[cfg(unix)]
async fn terminate_tree(child: &mut Child, pid: Option<u32>) {
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;
    use tokio::time::Instant;

    let Some(group) = pid.and_then(|pid| i32::try_from(pid).ok()).map(Pid::from_raw) else {
        let _ = child.start_kill();
        let _ = child.wait().await;
        return;
    };

    if killpg(group, Signal::SIGKILL).is_ok() {
        tracing::debug!(pgid = %group, "killed extractor process group");
    }
    let _ = child.wait().await;

    // Signal 0 only checks whether any member is left.
    let deadline = Instant::now() + GROUP_EXIT_GRACE;
    while killpg(group, None::<Signal>).is_ok() {
        if Instant::now() >= deadline {
            tracing::warn!(pgid = %group, "extractor process group still present after kill");
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

#[cfg(not(unix))]
async fn terminate_tree(child: &mut Child, _pid: Option<u32>) {
    let _ = child.start_kill();
    let _ = child.wait().await;
}

/// Why a single runtime attempt was rejected
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum AttemptFailure {
    #[error("could not run extractor: {0}")]
    Spawn(String),

    #[error("extractor timed out after {0:?}")]
    TimedOut(Duration),

    #[error("extractor exited with status {code:?}")]
    Process { code: Option<i32>, stderr: String },

    #[error("extractor printed nothing")]
    EmptyOutput { stderr: String },

    #[error("malformed extractor response: {0}")]
    MalformedResponse(String),

    #[error("printed artifact {0} does not exist")]
    MissingArtifact(String),

    #[error("printed artifact {0} is empty")]
    EmptyArtifact(String),
}

impl AttemptFailure {
    /// Captured stderr, when the failure came with any
    pub fn stderr(&self) -> Option<&str> {
        match self {
            AttemptFailure::Process { stderr, .. } | AttemptFailure::EmptyOutput { stderr } => Some(stderr),
            _ => None,
        }
    }

    /// Advisory reading of the captured stderr
    pub fn hint(&self) -> FailureHint {
        self.stderr().map(classify_stderr).unwrap_or(FailureHint::Unknown)
    }
}

/// A failed attempt and the runtime it ran with
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptRecord {
    pub runtime: String,
    pub failure: AttemptFailure,
}

/// Terminal outcome of a fallback run that produced no result
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum FallbackError {
    #[error("cancelled during attempt with runtime {runtime}")]
    Cancelled { runtime: String },

    #[error("all {} runtime attempts failed", attempts.len())]
    Exhausted { attempts: Vec<AttemptRecord> },
}

/// States of the fallback loop
enum FallbackState<T> {
    Trying(usize),
    Succeeded(T),
    ExhaustedFailed,
}

/// Runs the extractor once per JS runtime, in priority order, until an attempt
/// is accepted. Attempts never run concurrently.
#[derive(Clone)]
pub struct FallbackExecutor {
    binary: String,
    runtimes: Arc<[String]>,
    runner: Arc<dyn ProcessRunner>,
}

impl FallbackExecutor {
    pub fn new(binary: impl Into<String>, runtimes: Arc<[String]>, runner: Arc<dyn ProcessRunner>) -> Self {
        Self {
            binary: binary.into(),
            runtimes,
            runner,
        }
    }

    /// Run the fallback chain.
    ///
    /// `make_args` is called once per attempt so each attempt may draw fresh
    /// inputs (such as a different cookie file). `accept` turns a finished
    /// process into a result or rejects it. Cancellation ends the chain at once.
    pub async fn execute<T, A, F>(
        &self,
        timeout: Duration,
        cancel: &CancellationToken,
        mut make_args: A,
        mut accept: F,
    ) -> Result<T, FallbackError>
    where
        A: FnMut() -> ExtractorArgs,
        F: FnMut(&str, ProcessOutput) -> Result<T, AttemptFailure>,
    {
        let mut attempts = Vec::new();
        let mut state = FallbackState::Trying(0);

        loop {
            state = match state {
                FallbackState::Trying(index) if index >= self.runtimes.len() => FallbackState::ExhaustedFailed,
                FallbackState::Trying(index) => {
                    let runtime = &self.runtimes[index];

                    if cancel.is_cancelled() {
                        return Err(FallbackError::Cancelled { runtime: runtime.clone() });
                    }

                    let args = make_args();
                    tracing::debug!(runtime = %runtime, attempt = index + 1, "running {} {}", self.binary, args);

                    let outcome = match self
                        .runner
                        .run(&self.binary, &args.with_runtime(runtime), timeout, cancel)
                        .await
                    {
                        Ok(output) => accept(runtime, output),
                        Err(RunError::Cancelled) => {
                            return Err(FallbackError::Cancelled { runtime: runtime.clone() });
                        }
                        Err(RunError::TimedOut(after)) => Err(AttemptFailure::TimedOut(after)),
                        Err(err) => Err(AttemptFailure::Spawn(err.to_string())),
                    };

                    match outcome {
                        Ok(value) => FallbackState::Succeeded(value),
                        Err(failure) => {
                            let hint = failure.hint();
                            tracing::warn!(
                                runtime = %runtime,
                                error = %failure,
                                ?hint,
                                remediation = hint.remediation().unwrap_or_default(),
                                stderr = %truncate_for_log(failure.stderr().unwrap_or_default(), 500),
                                "extractor attempt failed"
                            );
                            attempts.push(AttemptRecord {
                                runtime: runtime.clone(),
                                failure,
                            });
                            FallbackState::Trying(index + 1)
                        }
                    }
                }
                FallbackState::Succeeded(value) => return Ok(value),
                FallbackState::ExhaustedFailed => return Err(FallbackError::Exhausted { attempts }),
            };
        }
    }
}

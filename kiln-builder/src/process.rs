//! Toolchain process supervision
//!
//! Runs toolchain command steps inside a workspace:
//! - Capturing stdout/stderr of every step
//! - Sharing one deadline across all steps of a stage
//! - Killing the step's whole process group when the deadline passes

use std::collections::HashMap;
use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::CommandStep;
use crate::error::{BuildError, Result};

/// How long to keep reading pipes after the process exited
const PIPE_DRAIN_GRACE: Duration = Duration::from_secs(5);

/// Result of a step that ran to completion
#[derive(Debug)]
pub struct StepOutcome {
    pub status: ExitStatus,
    pub output: String,
}

/// Runs all steps in order within `limit`
///
/// Stops at the first failing step.
///
/// # Returns
/// Combined output of all steps
pub async fn run_steps(
    steps: &[CommandStep],
    cwd: &Path,
    env: &HashMap<String, String>,
    limit: Duration,
) -> Result<String> {
    let deadline = Instant::now() + limit;
    let mut combined = String::new();

    for (idx, step) in steps.iter().enumerate() {
        info!("Running build step {}/{}: {}", idx + 1, steps.len(), step);

        let outcome = run_step(step, cwd, env, deadline, limit).await?;
        push_output(&mut combined, &outcome.output);

        if !outcome.status.success() {
            let exit_code = outcome.status.code();
            debug!(
                "Build step failed: cmd={} exit_code={:?} output_len={}",
                step,
                exit_code,
                combined.len()
            );
            return Err(BuildError::Compile {
                exit_code,
                output: combined,
            });
        }

        debug!(
            "Build step completed successfully: cmd={}, output_len={}",
            step,
            outcome.output.len()
        );
    }

    Ok(combined)
}

/// Runs one step, killing it if `deadline` passes first
///
/// On unix each step leads its own process group, so workers forked by the
/// toolchain are killed together with it.
pub async fn run_step(
    step: &CommandStep,
    cwd: &Path,
    env: &HashMap<String, String>,
    deadline: Instant,
    limit: Duration,
) -> Result<StepOutcome> {
    let mut cmd = Command::new(&step.program);
    cmd.args(&step.args)
        .current_dir(cwd)
        .envs(env)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    #[cfg(unix)]
    cmd.process_group(0);

    let mut child = cmd.spawn().map_err(|source| BuildError::Spawn {
        program: step.program.clone(),
        source,
    })?;

    let pid = child.id();
    debug!("Spawned '{}' (pid: {:?})", step.program, pid);

    let stdout = spawn_reader(child.stdout.take());
    let stderr = spawn_reader(child.stderr.take());

    let status = match tokio::time::timeout_at(deadline, child.wait()).await {
        Ok(status) => status.map_err(|source| BuildError::Spawn {
            program: step.program.clone(),
            source,
        })?,
        Err(_) => {
            warn!(
                "Build step '{}' exceeded {:?}, killing process group {:?}",
                step.program, limit, pid
            );
            if let Some(pid) = pid {
                if let Err(e) = kill_process_group(pid) {
                    warn!("Failed to kill process group {}: {}", pid, e);
                }
            }
            // kill() also waits for the leader, so it is reaped here
            if let Err(e) = child.kill().await {
                warn!("Failed to kill '{}': {}", step.program, e);
            }
            stdout.abort();
            stderr.abort();
            return Err(BuildError::Timeout { limit });
        }
    };

    let mut output = drain(stdout).await;
    push_output(&mut output, &drain(stderr).await);

    Ok(StepOutcome { status, output })
}

/// Sends SIGKILL to every process in the group led by `pid`
#[cfg(unix)]
fn kill_process_group(pid: u32) -> std::io::Result<()> {
    use rustix::process::{Pid, Signal};

    let Some(pgid) = i32::try_from(pid).ok().and_then(Pid::from_raw) else {
        return Ok(());
    };
    match rustix::process::kill_process_group(pgid, Signal::KILL) {
        Ok(()) => Ok(()),
        // Group already gone
        Err(rustix::io::Errno::SRCH) => Ok(()),
        Err(e) => Err(e.into()),
    }
}

#[cfg(not(unix))]
fn kill_process_group(_pid: u32) -> std::io::Result<()> {
    Ok(())
}

fn spawn_reader<R>(pipe: Option<R>) -> JoinHandle<String>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            if let Err(e) = pipe.read_to_end(&mut buf).await {
                debug!("Stopped reading process output: {}", e);
            }
        }
        String::from_utf8_lossy(&buf).into_owned()
    })
}

/// Waits briefly for a reader; a grandchild may keep the pipe open
async fn drain(reader: JoinHandle<String>) -> String {
    let abort = reader.abort_handle();
    match tokio::time::timeout(PIPE_DRAIN_GRACE, reader).await {
        Ok(Ok(output)) => output,
        Ok(Err(e)) => {
            debug!("Output reader failed: {}", e);
            String::new()
        }
        Err(_) => {
            abort.abort();
            warn!("Process output still open after exit, truncating");
            String::new()
        }
    }
}

fn push_output(buf: &mut String, chunk: &str) {
    if chunk.is_empty() {
        return;
    }
    if !buf.is_empty() && !buf.ends_with('\n') {
        buf.push('\n');
    }
    buf.push_str(chunk);
}

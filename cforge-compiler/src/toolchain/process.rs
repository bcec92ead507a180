//! Child-process toolchain
//!
//! The compiler is spawned directly (never through a shell) with a pinned
//! argument layout:
//!
//! ```text
//! <program> [launcher_args..] <workspace>/main.c -o <workspace>/main.wasm [extra_args..]
//! ```
//!
//! On unix the child leads its own process group so that a timeout or a
//! dropped request takes down every descendant, not just the direct child.

use super::{Toolchain, ToolchainOutcome, TIMEOUT_EXIT_CODE, TIMEOUT_MESSAGE};
use crate::error::ToolchainError;
use crate::workspace::CompileJob;
use async_trait::async_trait;
use cforge_common::ToolchainConfig;
use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Appended to a captured stream that hit the size cap
pub const TRUNCATION_MARKER: &str = "\n[output truncated]";

/// How long to wait for the output readers once the child is gone
const OUTPUT_DRAIN_GRACE: Duration = Duration::from_secs(2);

/// Toolchain backed by an external compiler executable
pub struct CommandToolchain {
    config: ToolchainConfig,
}

impl CommandToolchain {
    pub fn new(config: ToolchainConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ToolchainConfig {
        &self.config
    }

    fn command(&self, job: &CompileJob) -> Command {
        let mut cmd = Command::new(&self.config.program);
        cmd.args(&self.config.launcher_args)
            .arg(job.source_path())
            .arg("-o")
            .arg(job.artifact_path())
            .args(&self.config.extra_args)
            .current_dir(job.path())
            .env_clear()
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        for name in &self.config.pass_env {
            if let Some(value) = std::env::var_os(name) {
                cmd.env(name, value);
            }
        }

        #[cfg(unix)]
        self.confine(&mut cmd);

        cmd
    }

    #[cfg(unix)]
    fn confine(&self, cmd: &mut Command) {
        cmd.process_group(0);

        let memory = self.config.memory_limit_bytes;
        let cpu = self.config.cpu_limit_secs;
        if memory.is_none() && cpu.is_none() {
            return;
        }

        // SAFETY: the hook runs between fork and exec and only calls setrlimit,
        // which is async-signal-safe, and touches no shared state.
        unsafe {
            cmd.pre_exec(move || {
                if let Some(bytes) = memory {
                    let limit = rlimit(bytes, bytes);
                    if libc::setrlimit(libc::RLIMIT_AS, &limit) != 0 {
                        return Err(std::io::Error::last_os_error());
                    }
                }
                if let Some(secs) = cpu {
                    // soft limit delivers SIGXCPU, hard limit one second later SIGKILL
                    let limit = rlimit(secs, secs.saturating_add(1));
                    if libc::setrlimit(libc::RLIMIT_CPU, &limit) != 0 {
                        return Err(std::io::Error::last_os_error());
                    }
                }
                Ok(())
            });
        }
    }
}

#[async_trait]
impl Toolchain for CommandToolchain {
    async fn compile(
        &self,
        job: &CompileJob,
        source: &str,
    ) -> Result<ToolchainOutcome, ToolchainError> {
        tokio::fs::write(job.source_path(), source)
            .await
            .map_err(ToolchainError::WriteSource)?;

        info!(
            job_id = %job.id(),
            toolchain = %self.config.program,
            source_len = source.len(),
            "Invoking toolchain"
        );

        let start = Instant::now();
        let mut child = self
            .command(job)
            .spawn()
            .map_err(|source| ToolchainError::Spawn {
                program: self.config.program.clone(),
                source,
            })?;

        // Kills the whole group when dropped, including on cancellation.
        let group = ProcessGroup::new(child.id());

        let cap = self.config.max_output_bytes;
        let mut stdout_task = child.stdout.take().map(|s| tokio::spawn(read_capped(s, cap)));
        let mut stderr_task = child.stderr.take().map(|s| tokio::spawn(read_capped(s, cap)));

        let (status, timed_out) = match tokio::time::timeout(self.config.timeout, child.wait()).await
        {
            Ok(Ok(status)) => (Some(status), false),
            Ok(Err(e)) => {
                group.kill();
                let _ = child.kill().await;
                return Err(ToolchainError::Wait(e));
            }
            Err(_) => {
                warn!(
                    job_id = %job.id(),
                    timeout_ms = self.config.timeout.as_millis() as u64,
                    "Toolchain timed out, killing process group"
                );
                group.kill();
                let _ = child.kill().await;
                (None, true)
            }
        };
        drop(group);

        let stdout = collect(&mut stdout_task).await?;
        let stderr = collect(&mut stderr_task).await?;

        let exit_code = match status {
            Some(status) => exit_code(status),
            None => TIMEOUT_EXIT_CODE,
        };

        let artifact = job.artifact_path();
        let artifact_present = !timed_out
            && tokio::fs::metadata(&artifact)
                .await
                .map(|m| m.is_file())
                .unwrap_or(false);

        let duration_ms = start.elapsed().as_millis() as u64;
        debug!(
            job_id = %job.id(),
            exit_code,
            timed_out,
            artifact_present,
            elapsed_ms = duration_ms,
            "Toolchain finished"
        );

        Ok(ToolchainOutcome {
            exit_code,
            stdout: stdout.into_text(),
            stderr: if timed_out {
                TIMEOUT_MESSAGE.to_string()
            } else {
                stderr.into_text()
            },
            artifact_path: artifact_present.then_some(artifact),
            timed_out,
            duration_ms,
        })
    }

    fn name(&self) -> &str {
        &self.config.program
    }
}

/// Handle on the compiler's process group
struct ProcessGroup {
    #[cfg_attr(not(unix), allow(dead_code))]
    leader: Option<u32>,
}

impl ProcessGroup {
    fn new(leader: Option<u32>) -> Self {
        Self { leader }
    }

    /// SIGKILL every process in the group
    #[cfg(unix)]
    fn kill(&self) {
        let Some(pid) = self.leader.and_then(|pid| i32::try_from(pid).ok()) else {
            return;
        };
        // ESRCH just means the group is already gone.
        let rc = unsafe { libc::kill(-pid, libc::SIGKILL) };
        if rc != 0 {
            let err = std::io::Error::last_os_error();
            if err.raw_os_error() != Some(libc::ESRCH) {
                warn!(pgid = pid, error = %err, "Failed to kill toolchain process group");
            }
        }
    }

    #[cfg(not(unix))]
    fn kill(&self) {}
}

impl Drop for ProcessGroup {
    fn drop(&mut self) {
        self.kill();
    }
}

#[cfg(unix)]
fn rlimit(soft: u64, hard: u64) -> libc::rlimit {
    libc::rlimit {
        rlim_cur: soft as libc::rlim_t,
        rlim_max: hard as libc::rlim_t,
    }
}

fn exit_code(status: ExitStatus) -> i32 {
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
    -1
}

/// Bytes read from one output stream, capped in size
#[derive(Debug, Default)]
struct Captured {
    bytes: Vec<u8>,
    truncated: bool,
}

impl Captured {
    fn into_text(self) -> String {
        let mut text = String::from_utf8_lossy(&self.bytes).into_owned();
        if self.truncated {
            text.push_str(TRUNCATION_MARKER);
        }
        text
    }
}

/// Drain `reader` to EOF, keeping at most `cap` bytes
async fn read_capped<R>(mut reader: R, cap: usize) -> std::io::Result<Captured>
where
    R: AsyncRead + Unpin,
{
    let mut captured = Captured::default();
    let mut chunk = [0u8; 8192];

    loop {
        let n = reader.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        let room = cap.saturating_sub(captured.bytes.len());
        captured.bytes.extend_from_slice(&chunk[..n.min(room)]);
        if n > room {
            captured.truncated = true;
        }
    }

    Ok(captured)
}

async fn collect(
    task: &mut Option<JoinHandle<std::io::Result<Captured>>>,
) -> Result<Captured, ToolchainError> {
    let Some(handle) = task.as_mut() else {
        return Ok(Captured::default());
    };

    match tokio::time::timeout(OUTPUT_DRAIN_GRACE, &mut *handle).await {
        Ok(Ok(Ok(captured))) => Ok(captured),
        Ok(Ok(Err(e))) => Err(ToolchainError::Output(e.to_string())),
        Ok(Err(e)) => Err(ToolchainError::Output(e.to_string())),
        Err(_) => {
            handle.abort();
            Ok(Captured {
                bytes: Vec::new(),
                truncated: true,
            })
        }
    }
}

use std::{path::PathBuf, process::Stdio};

use async_trait::async_trait;
use hydra_model::{JobKind, JobSpec};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::{
    error::{ExecError, ExecResult},
    limits::{ProcessLimits, attach_limits},
    runner::Runner,
    util::{kill_graceful, shell_command},
};

/// Runs COMMAND jobs through the platform shell.
///
/// Stdout becomes the attempt result; on failure stderr travels as the error payload.
#[derive(Debug, Clone, Default)]
pub struct ShellExecutor {
    env: Vec<(String, String)>,
    cwd: Option<PathBuf>,
    limits: ProcessLimits,
    enforce_memory: bool,
}

impl ShellExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn with_cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    pub fn with_limits(mut self, limits: ProcessLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Cap the address space of each command at the memory its spec requests.
    pub fn enforce_memory(mut self, enforce: bool) -> Self {
        self.enforce_memory = enforce;
        self
    }

    fn limits_for(&self, spec: &JobSpec) -> ProcessLimits {
        let mut limits = self.limits.clone();
        if self.enforce_memory {
            limits.max_address_space_bytes =
                ProcessLimits::from_resources(spec.resources()).max_address_space_bytes;
        }
        limits
    }

    /// Run `script` and collect its stdout.
    pub async fn run_script(
        &self,
        script: &str,
        limits: &ProcessLimits,
        cancel: CancellationToken,
    ) -> ExecResult<Vec<u8>> {
        let mut cmd = shell_command(script);
        if let Some(cwd) = &self.cwd {
            cmd.current_dir(cwd);
        }
        for (k, v) in &self.env {
            cmd.env(k, v);
        }
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        attach_limits(&mut cmd, limits);

        trace!(target: "hydra.exec.shell", %script, "spawn");
        let mut child = cmd.spawn().map_err(|e| ExecError::Spawn(e.to_string()))?;

        let stdout = tokio::spawn(read_all(child.stdout.take()));
        let stderr = tokio::spawn(read_all(child.stderr.take()));

        tokio::select! {
            status = child.wait() => {
                let status = status?;
                let stdout = stdout.await.unwrap_or_default();
                let stderr = stderr.await.unwrap_or_default();

                if status.success() {
                    debug!(target: "hydra.exec.shell", bytes = stdout.len(), "exit success");
                    return Ok(stdout);
                }
                match status.code() {
                    Some(code) => {
                        debug!(target: "hydra.exec.shell", code, "exit non-zero");
                        Err(ExecError::NonZeroExit { code, stderr })
                    }
                    None => Err(ExecError::KilledBySignal { stderr }),
                }
            }
            _ = cancel.cancelled() => {
                debug!(target: "hydra.exec.shell", "cancelled; killing child");
                let _ = kill_graceful(&mut child).await;
                Err(ExecError::Cancelled)
            }
        }
    }
}

async fn read_all<R>(pipe: Option<R>) -> Vec<u8>
where
    R: AsyncRead + Unpin,
{
    let mut buf = Vec::new();
    if let Some(mut pipe) = pipe {
        if let Err(e) = pipe.read_to_end(&mut buf).await {
            trace!(target: "hydra.exec.shell", error = %e, "pipe read failed");
        }
    }
    buf
}

#[async_trait]
impl Runner for ShellExecutor {
    fn name(&self) -> &'static str {
        "shell"
    }

    fn supports(&self, spec: &JobSpec) -> bool {
        matches!(spec.kind(), JobKind::Command { .. })
    }

    async fn run(&self, spec: &JobSpec, cancel: CancellationToken) -> ExecResult<Option<Vec<u8>>> {
        let JobKind::Command { command } = spec.kind() else {
            return Err(ExecError::UnsupportedKind(spec.kind().kind()));
        };
        let limits = self.limits_for(spec);
        self.run_script(command, &limits, cancel).await.map(Some)
    }
}

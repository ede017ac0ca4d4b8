// src/exec/command_worker.rs

//! Bundled production worker that runs a drop's configured shell command.

use std::future::Future;
use std::pin::Pin;
use std::process::Stdio;

use anyhow::Context;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, info};

use crate::dag::ScheduledUnit;
use crate::deposit::Guidance;
use crate::exec::worker::{Worker, WorkerOutput};

/// Runs each drop's `cmd` through the platform shell; stdout lines become
/// the drop's reported artifacts. A drop without a `cmd` is a no-op that
/// succeeds with no artifacts.
#[derive(Debug, Default)]
pub struct CommandWorker;

impl CommandWorker {
    pub fn new() -> Self {
        Self
    }

    async fn run_command(unit: &ScheduledUnit, cmd_line: &str) -> anyhow::Result<WorkerOutput> {
        info!(unit = %unit.id, cmd = %cmd_line, "starting drop process");

        let mut cmd = if cfg!(windows) {
            let mut c = Command::new("cmd");
            c.arg("/C").arg(cmd_line);
            c
        } else {
            let mut c = Command::new("sh");
            c.arg("-c").arg(cmd_line);
            c
        };

        cmd.stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd
            .spawn()
            .with_context(|| format!("spawning process for drop '{}'", unit.id))?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        // Always consume stderr so buffers don't fill; log at debug.
        if let Some(stderr) = stderr {
            let unit_id = unit.id.clone();
            tokio::spawn(async move {
                let reader = BufReader::new(stderr);
                let mut lines = reader.lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!(unit = %unit_id, "stderr: {}", line);
                }
            });
        }

        let mut artifacts = Vec::new();
        if let Some(stdout) = stdout {
            let reader = BufReader::new(stdout);
            let mut lines = reader.lines();
            while let Ok(Some(line)) = lines.next_line().await {
                let line = line.trim().to_string();
                if !line.is_empty() {
                    artifacts.push(line);
                }
            }
        }

        let status = child
            .wait()
            .await
            .with_context(|| format!("waiting for process of drop '{}'", unit.id))?;

        if !status.success() {
            let code = status.code().unwrap_or(-1);
            anyhow::bail!("drop '{}' process exited with code {code}", unit.id);
        }

        info!(
            unit = %unit.id,
            artifacts = artifacts.len(),
            "drop process exited successfully"
        );

        Ok(WorkerOutput {
            artifacts,
            recommendations: Vec::new(),
        })
    }
}

impl Worker for CommandWorker {
    fn run_drop<'a>(
        &'a self,
        unit: &'a ScheduledUnit,
        guidance: Vec<Guidance>,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<WorkerOutput>> + Send + 'a>> {
        Box::pin(async move {
            if !guidance.is_empty() {
                debug!(
                    unit = %unit.id,
                    guidance = guidance.len(),
                    "drop received upstream guidance"
                );
            }
            match unit.cmd.as_deref() {
                Some(cmd_line) => Self::run_command(unit, cmd_line).await,
                None => {
                    debug!(unit = %unit.id, "drop has no cmd; succeeding as a no-op");
                    Ok(WorkerOutput::default())
                }
            }
        })
    }
}

use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tracing::{debug, info, warn};

use super::Solver;
use crate::config::SolverSettings;
use crate::error::{AppError, Result};

/// Runs `program args… <work_dir>` and forwards its output to the log.
#[derive(Debug, Clone)]
pub struct ProcessSolver {
    program: String,
    args: Vec<String>,
}

impl ProcessSolver {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    pub fn from_settings(settings: &SolverSettings) -> Self {
        Self::new(settings.program.clone(), settings.args.clone())
    }
}

#[async_trait]
impl Solver for ProcessSolver {
    async fn solve(&self, work_dir: &Path) -> Result<()> {
        debug!(program = %self.program, args = ?self.args, "Spawning solver");
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .arg(work_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let stdout = child.stdout.take().map(|out| tokio::spawn(forward(out, false)));
        let stderr = child.stderr.take().map(|err| tokio::spawn(forward(err, true)));

        let status = child.wait().await?;
        for pipe in [stdout, stderr].into_iter().flatten() {
            // A forwarder only ends early if the runtime is shutting down.
            let _ = pipe.await;
        }

        if status.success() {
            info!("Solver finished");
            Ok(())
        } else {
            Err(AppError::Solver {
                code: status.code(),
            })
        }
    }
}

async fn forward(pipe: impl AsyncRead + Unpin, is_stderr: bool) {
    let mut lines = BufReader::new(pipe).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) if is_stderr => warn!(target: "solver", "{line}"),
            Ok(Some(line)) => info!(target: "solver", "{line}"),
            Ok(None) => break,
            Err(e) => {
                warn!("Solver output unreadable: {e}");
                break;
            }
        }
    }
}

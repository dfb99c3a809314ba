// SPDX-License-Identifier: GPL-3.0-only
use anyhow::Context;
use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::steamcmd::job::{JobOutcome, SteamCmdJob};
use crate::steamcmd::output::OutputClassifier;
use crate::steamcmd::traits::JobExecutor;

/// Runs jobs through the SteamCMD binary, one session at a time
pub struct SteamCmdExecutor {
    steamcmd_path: PathBuf,
    classifier: OutputClassifier,
    // SteamCMD keeps per-user state on disk and cannot run concurrently
    session_lock: Mutex<()>,
}

impl SteamCmdExecutor {
    pub fn new(steamcmd_path: PathBuf) -> anyhow::Result<Self> {
        Ok(Self {
            steamcmd_path,
            classifier: OutputClassifier::new()?,
            session_lock: Mutex::new(()),
        })
    }
}

#[async_trait]
impl JobExecutor for SteamCmdExecutor {
    async fn submit(&self, job: SteamCmdJob) -> anyhow::Result<JobOutcome> {
        let _session = self.session_lock.lock().await;
        let requested = job.mod_ids();

        info!(
            job_id = %job.id,
            items = requested.len(),
            login = ?job.session.login,
            "Starting SteamCMD session"
        );

        // Dropping the child (e.g. on timeout) kills the process
        let mut child = Command::new(&self.steamcmd_path)
            .args(job.command_args())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("Failed to spawn {}", self.steamcmd_path.display()))?;

        let stdout = child.stdout.take().context("Failed to capture SteamCMD stdout")?;
        let stderr = child.stderr.take().context("Failed to capture SteamCMD stderr")?;

        let job_id = job.id;
        let stderr_task = tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                warn!(job_id = %job_id, line = %line, "SteamCMD stderr");
            }
        });

        let mut captured = String::new();
        let mut lines = BufReader::new(stdout).lines();
        while let Some(line) = lines
            .next_line()
            .await
            .context("Failed to read SteamCMD output")?
        {
            debug!(job_id = %job.id, line = %line, "SteamCMD");
            captured.push_str(&line);
            captured.push('\n');
        }

        let status = child.wait().await.context("Failed to wait for SteamCMD")?;
        let _ = stderr_task.await;

        let outcome = self.classifier.classify(&captured, &requested);
        info!(
            job_id = %job.id,
            exit_code = ?status.code(),
            failed_items = outcome.item_errors.len(),
            job_error = ?outcome.job_error,
            "SteamCMD session finished"
        );

        Ok(outcome)
    }
}

// SPDX-License-Identifier: GPL-3.0-only
use async_trait::async_trait;
use crate::steamcmd::job::{JobOutcome, SteamCmdJob};

#[async_trait]
pub trait JobExecutor: Send + Sync {
    /// Run one download session covering every item of the job.
    ///
    /// `Ok` carries whatever the tool reported, including per-item failures.
    /// `Err` means the session itself could not be run or observed.
    async fn submit(&self, job: SteamCmdJob) -> anyhow::Result<JobOutcome>;
}

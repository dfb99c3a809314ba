// SPDX-License-Identifier: GPL-3.0-only
//! Batch scheduler driving SteamCMD sessions.
//!
//! A single worker task drains a queue of request cycles, so at most one
//! cycle talks to the executor at any time. Within a cycle, mods are split
//! into batches of `batch_size`; each batch is one SteamCMD session. Any two
//! consecutive sessions are separated by at least `batch_delay`, also across
//! cycles.

use std::collections::BTreeSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{error, info, warn};

use crate::config::{Config, InstallPaths};
use crate::mod_installer::pipeline::{shared_key_files, InstallationPipeline};
use crate::registry::{ErrorStatus, InstallationStatus, ModStore, WorkshopMod};
use crate::steamcmd::{JobExecutor, JobOutcome, SessionParams, SteamCmdJob, WorkshopItemRequest};

#[derive(Debug, Clone)]
pub struct SchedulerSettings {
    /// Items per SteamCMD session; 1 downloads strictly one mod at a time
    pub batch_size: usize,
    /// Minimum pause between the end of one session and the start of the next
    pub batch_delay: Duration,
    /// Upper bound for one session
    pub job_timeout: Duration,
    pub session: SessionParams,
}

impl SchedulerSettings {
    pub fn from_config(config: &Config, paths: &InstallPaths) -> Self {
        Self {
            batch_size: config.batch_size.max(1),
            batch_delay: config.batch_delay(),
            job_timeout: config.job_timeout(),
            session: SessionParams::from_config(config, paths),
        }
    }
}

/// Where each mod of a finished cycle ended up
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleSummary {
    pub finished: Vec<u64>,
    pub failed: Vec<u64>,
    /// Mods removed from the store while the cycle was running
    pub vanished: Vec<u64>,
}

struct CycleRequest {
    mods: Vec<WorkshopMod>,
    completion: oneshot::Sender<CycleSummary>,
}

/// Handle for queueing request cycles on the install worker
#[derive(Clone)]
pub struct InstallScheduler {
    sender: mpsc::UnboundedSender<CycleRequest>,
}

impl InstallScheduler {
    /// Spawn the install worker. It runs until every scheduler handle is dropped.
    pub fn start(
        executor: Arc<dyn JobExecutor>,
        store: Arc<dyn ModStore>,
        pipeline: InstallationPipeline,
        settings: SchedulerSettings,
    ) -> (Self, JoinHandle<()>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let worker = InstallWorker {
            executor,
            store,
            pipeline,
            settings,
            last_session_end: None,
        };

        let handle = tokio::spawn(worker.run(receiver));
        (Self { sender }, handle)
    }

    /// Queue a cycle for mods already persisted as `IN_PROGRESS`. The
    /// receiver resolves once every mod reached a terminal state.
    pub fn enqueue(&self, mods: Vec<WorkshopMod>) -> anyhow::Result<oneshot::Receiver<CycleSummary>> {
        let (completion, receiver) = oneshot::channel();
        self.sender
            .send(CycleRequest { mods, completion })
            .map_err(|_| anyhow::anyhow!("Install worker is not running"))?;
        Ok(receiver)
    }
}

/// Attempts for a store call made while recording an installation result
const STORE_ATTEMPTS: u32 = 4;
const STORE_RETRY_DELAY: Duration = Duration::from_millis(250);

/// Run `operation` until it succeeds, backing off linearly between attempts
async fn retry_store<T, F, Fut>(mod_id: u64, action: &str, operation: F) -> anyhow::Result<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = anyhow::Result<T>>,
{
    let mut attempt = 1;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt < STORE_ATTEMPTS => {
                warn!(mod_id, action, attempt, error = %e, "Store call failed, retrying");
                tokio::time::sleep(STORE_RETRY_DELAY * attempt).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

struct InstallWorker {
    executor: Arc<dyn JobExecutor>,
    store: Arc<dyn ModStore>,
    pipeline: InstallationPipeline,
    settings: SchedulerSettings,
    last_session_end: Option<Instant>,
}

impl InstallWorker {
    async fn run(mut self, mut receiver: mpsc::UnboundedReceiver<CycleRequest>) {
        info!(
            batch_size = self.settings.batch_size,
            batch_delay_secs = self.settings.batch_delay.as_secs(),
            "Install worker started"
        );

        while let Some(request) = receiver.recv().await {
            let summary = self.run_cycle(&request.mods).await;
            // The caller may have stopped waiting
            let _ = request.completion.send(summary);
        }

        info!("Install worker stopped");
    }

    async fn run_cycle(&mut self, mods: &[WorkshopMod]) -> CycleSummary {
        let mut summary = CycleSummary::default();
        let batch_count = mods.len().div_ceil(self.settings.batch_size);
        info!(mods = mods.len(), batches = batch_count, "Starting install cycle");

        for (index, batch) in mods.chunks(self.settings.batch_size).enumerate() {
            self.wait_for_session_slot().await;

            info!(batch = index + 1, of = batch_count, items = batch.len(), "Downloading batch");
            let outcome = self.download(batch).await;

            for workshop_mod in batch {
                match self.handle_installation(workshop_mod.id, outcome.as_ref()).await {
                    Ok(Some(InstallationStatus::Finished)) => summary.finished.push(workshop_mod.id),
                    Ok(Some(_)) => summary.failed.push(workshop_mod.id),
                    Ok(None) => summary.vanished.push(workshop_mod.id),
                    Err(e) => {
                        error!(mod_id = workshop_mod.id, error = %e, "Failed to record installation result");
                        summary.failed.push(workshop_mod.id);
                    }
                }
            }
        }

        info!(
            finished = summary.finished.len(),
            failed = summary.failed.len(),
            vanished = summary.vanished.len(),
            "Install cycle completed"
        );
        summary
    }

    /// Sleep until `batch_delay` has passed since the previous session ended
    async fn wait_for_session_slot(&self) {
        let Some(last_end) = self.last_session_end else {
            return;
        };
        let ready_at = last_end + self.settings.batch_delay;
        if ready_at > Instant::now() {
            info!(
                delay_secs = (ready_at - Instant::now()).as_secs(),
                "Waiting before the next SteamCMD session"
            );
            tokio::time::sleep_until(ready_at).await;
        }
    }

    /// Run one SteamCMD session for the batch. `None` means the session
    /// itself faulted or timed out.
    async fn download(&mut self, batch: &[WorkshopMod]) -> Option<JobOutcome> {
        let items = batch
            .iter()
            .filter_map(|m| {
                m.server_type.map(|st| WorkshopItemRequest {
                    app_id: st.game_app_id(),
                    mod_id: m.id,
                    validate: true,
                })
            })
            .collect();
        let job = SteamCmdJob::new(self.settings.session.clone(), items);
        let job_id = job.id;

        let result = tokio::time::timeout(self.settings.job_timeout, self.executor.submit(job)).await;
        self.last_session_end = Some(Instant::now());

        match result {
            Ok(Ok(outcome)) => Some(outcome),
            Ok(Err(e)) => {
                error!(job_id = %job_id, error = %e, "SteamCMD session failed");
                None
            }
            Err(_) => {
                error!(
                    job_id = %job_id,
                    timeout_secs = self.settings.job_timeout.as_secs(),
                    "SteamCMD session timed out"
                );
                None
            }
        }
    }

    /// Move one mod to its terminal state. Returns `None` when the record
    /// disappeared in the meantime; it is not re-created. Store calls are
    /// retried so a transient failure does not leave the mod `IN_PROGRESS`.
    async fn handle_installation(
        &self,
        mod_id: u64,
        outcome: Option<&JobOutcome>,
    ) -> anyhow::Result<Option<InstallationStatus>> {
        let fetched = retry_store(mod_id, "get_mod", || self.store.get_mod(mod_id)).await?;
        let Some(mut workshop_mod) = fetched else {
            warn!(mod_id, "Mod was removed during installation, skipping");
            return Ok(None);
        };

        match outcome.map(|o| o.error_for(mod_id)) {
            None => workshop_mod.mark_failed(ErrorStatus::Generic),
            Some(Some(error_status)) => {
                error!(
                    mod_id,
                    name = %workshop_mod.name,
                    reason = %error_status,
                    "Download of mod failed"
                );
                workshop_mod.mark_failed(error_status);
            }
            Some(None) if !self.pipeline.is_downloaded(&workshop_mod) => {
                error!(
                    mod_id,
                    name = %workshop_mod.name,
                    "Downloaded mod directory not found even though the download finished"
                );
                workshop_mod.mark_failed(ErrorStatus::Generic);
            }
            Some(None) => {
                info!(mod_id, name = %workshop_mod.name, "Mod downloaded, now installing");
                workshop_mod = self.install(workshop_mod).await;
            }
        }

        let status = workshop_mod.installation_status;
        let updated = retry_store(mod_id, "update_mod", || self.store.update_mod(&workshop_mod)).await?;
        if !updated {
            warn!(mod_id, "Mod was removed during installation, dropping result");
            return Ok(None);
        }

        Ok(Some(status))
    }

    /// Keys other mods of the same family still have installed. If they
    /// cannot be listed, every current key of the mod is treated as shared
    /// so nothing another mod may need gets deleted.
    async fn shared_keys(&self, workshop_mod: &WorkshopMod) -> BTreeSet<String> {
        let Some(server_type) = workshop_mod.server_type else {
            return BTreeSet::new();
        };

        match retry_store(workshop_mod.id, "list_mods_for_server", || {
            self.store.list_mods_for_server(server_type)
        })
        .await
        {
            Ok(others) => shared_key_files(workshop_mod, &others),
            Err(e) => {
                warn!(mod_id = workshop_mod.id, error = %e, "Failed to list mods, keeping previous keys");
                workshop_mod.key_files.clone()
            }
        }
    }

    async fn install(&self, workshop_mod: WorkshopMod) -> WorkshopMod {
        let pipeline = self.pipeline.clone();
        let mod_id = workshop_mod.id;
        let shared = self.shared_keys(&workshop_mod).await;
        let mut working = workshop_mod.clone();

        let result = tokio::task::spawn_blocking(move || {
            let result = pipeline.install(&mut working, &shared);
            (working, result)
        })
        .await;

        match result {
            Ok((mut installed, Ok(()))) => {
                installed.mark_finished();
                installed
            }
            Ok((mut partial, Err(e))) => {
                error!(mod_id, error = %format!("{:#}", e), "Failed to install mod");
                partial.mark_failed(ErrorStatus::Io);
                partial
            }
            Err(e) => {
                error!(mod_id, error = %e, "Installation task panicked");
                let mut failed = workshop_mod;
                failed.mark_failed(ErrorStatus::Io);
                failed
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::ServerType;
    use crate::steamcmd::LoginMode;
    use crate::test_helpers::{
        create_install_paths, materialize_downloads, InMemoryModStore, ScriptedExecutor,
    };
    use async_trait::async_trait;
    use std::path::PathBuf;
    use tempfile::TempDir;
    use tokio::time::Instant;

    const DELAY: Duration = Duration::from_secs(15);

    fn settings(batch_size: usize, batch_delay: Duration) -> SchedulerSettings {
        SchedulerSettings {
            batch_size,
            batch_delay,
            job_timeout: Duration::from_secs(60),
            session: SessionParams {
                install_dir: PathBuf::from("/srv/workshop"),
                login: LoginMode::Anonymous,
            },
        }
    }

    async fn seed(store: &InMemoryModStore, ids: impl IntoIterator<Item = u64>) -> Vec<WorkshopMod> {
        let mods: Vec<WorkshopMod> = ids
            .into_iter()
            .map(|id| {
                let mut workshop_mod = WorkshopMod::new(id);
                workshop_mod.name = format!("Mod {}", id);
                workshop_mod.server_type = Some(ServerType::Arma3);
                workshop_mod.mark_in_progress();
                workshop_mod
            })
            .collect();
        store.save_all_mods(&mods).await.unwrap();
        mods
    }

    #[tokio::test(start_paused = true)]
    async fn test_batches_are_split_and_delayed() {
        let temp_dir = TempDir::new().unwrap();
        let paths = create_install_paths(temp_dir.path(), &[ServerType::Arma3]);
        let store = Arc::new(InMemoryModStore::new());
        let executor = Arc::new(ScriptedExecutor::new());
        let mods = seed(&store, 1..=12).await;

        let (scheduler, _worker) = InstallScheduler::start(
            executor.clone(),
            store.clone(),
            InstallationPipeline::new(paths),
            settings(5, DELAY),
        );
        let summary = scheduler.enqueue(mods).unwrap().await.unwrap();
        let completed_at = Instant::now();

        let submissions = executor.submissions();
        let sizes: Vec<usize> = submissions.iter().map(|s| s.mod_ids.len()).collect();
        assert_eq!(sizes, vec![5, 5, 2]);
        assert_eq!(submissions[0].mod_ids, vec![1, 2, 3, 4, 5]);
        assert_eq!(submissions[2].mod_ids, vec![11, 12]);

        assert!(submissions[1].at - submissions[0].at >= DELAY);
        assert!(submissions[2].at - submissions[1].at >= DELAY);
        assert!(completed_at - submissions[2].at < DELAY);

        // Nothing was actually downloaded
        assert_eq!(summary.failed.len(), 12);
        for id in 1..=12 {
            let stored = store.snapshot(id).unwrap();
            assert_eq!(stored.installation_status, InstallationStatus::Error);
            assert_eq!(stored.error_status, Some(ErrorStatus::Generic));
        }
    }

    #[tokio::test]
    async fn test_transport_fault_does_not_stop_the_cycle() {
        let temp_dir = TempDir::new().unwrap();
        let paths = create_install_paths(temp_dir.path(), &[ServerType::Arma3]);
        let store = Arc::new(InMemoryModStore::new());
        let executor = Arc::new(
            ScriptedExecutor::with_script(vec![
                Ok(JobOutcome::success()),
                Err(anyhow::anyhow!("steamcmd crashed")),
                Ok(JobOutcome::success()),
            ])
            .on_submit(materialize_downloads(paths.clone(), ServerType::Arma3)),
        );
        let mods = seed(&store, [101, 102, 103]).await;

        let (scheduler, _worker) = InstallScheduler::start(
            executor.clone(),
            store.clone(),
            InstallationPipeline::new(paths.clone()),
            settings(1, Duration::from_millis(10)),
        );
        let summary = scheduler.enqueue(mods).unwrap().await.unwrap();

        assert_eq!(executor.submissions().len(), 3);
        assert_eq!(summary.finished, vec![101, 103]);
        assert_eq!(summary.failed, vec![102]);

        let first = store.snapshot(101).unwrap();
        assert_eq!(first.installation_status, InstallationStatus::Finished);
        assert!(first.file_size.unwrap_or(0) > 0);
        assert!(paths.mod_link_path("@mod_101", ServerType::Arma3).symlink_metadata().is_ok());

        let second = store.snapshot(102).unwrap();
        assert_eq!(second.installation_status, InstallationStatus::Error);
        assert_eq!(second.error_status, Some(ErrorStatus::Generic));

        assert_eq!(store.snapshot(103).unwrap().installation_status, InstallationStatus::Finished);
    }

    #[tokio::test]
    async fn test_tool_reported_errors_pass_through() {
        let temp_dir = TempDir::new().unwrap();
        let paths = create_install_paths(temp_dir.path(), &[ServerType::Arma3]);
        let store = Arc::new(InMemoryModStore::new());
        let executor = Arc::new(
            ScriptedExecutor::with_script(vec![Ok(
                JobOutcome::success().with_item_error(202, ErrorStatus::NoSubscription)
            )])
            .on_submit(materialize_downloads(paths.clone(), ServerType::Arma3)),
        );
        let mods = seed(&store, [201, 202, 203]).await;

        let (scheduler, _worker) = InstallScheduler::start(
            executor.clone(),
            store.clone(),
            InstallationPipeline::new(paths),
            settings(5, DELAY),
        );
        let summary = scheduler.enqueue(mods).unwrap().await.unwrap();

        assert_eq!(executor.submissions().len(), 1);
        assert_eq!(summary.finished, vec![201, 203]);
        let failed = store.snapshot(202).unwrap();
        assert_eq!(failed.installation_status, InstallationStatus::Error);
        assert_eq!(failed.error_status, Some(ErrorStatus::NoSubscription));
    }

    #[tokio::test]
    async fn test_session_error_fails_whole_batch() {
        let temp_dir = TempDir::new().unwrap();
        let paths = create_install_paths(temp_dir.path(), &[ServerType::Arma3]);
        let store = Arc::new(InMemoryModStore::new());
        let executor = Arc::new(ScriptedExecutor::with_script(vec![Ok(JobOutcome::failed(
            ErrorStatus::RateLimit,
        ))]));
        let mods = seed(&store, [301, 302]).await;

        let (scheduler, _worker) = InstallScheduler::start(
            executor,
            store.clone(),
            InstallationPipeline::new(paths),
            settings(5, DELAY),
        );
        scheduler.enqueue(mods).unwrap().await.unwrap();

        for id in [301, 302] {
            assert_eq!(store.snapshot(id).unwrap().error_status, Some(ErrorStatus::RateLimit));
        }
    }

    #[tokio::test]
    async fn test_pipeline_failure_is_io_error() {
        let temp_dir = TempDir::new().unwrap();
        let paths = create_install_paths(temp_dir.path(), &[ServerType::Arma3]);
        std::fs::create_dir_all(paths.mod_link_path("@mod_401", ServerType::Arma3)).unwrap();
        let store = Arc::new(InMemoryModStore::new());
        let executor = Arc::new(
            ScriptedExecutor::new().on_submit(materialize_downloads(paths.clone(), ServerType::Arma3)),
        );
        let mods = seed(&store, [401]).await;

        let (scheduler, _worker) = InstallScheduler::start(
            executor,
            store.clone(),
            InstallationPipeline::new(paths),
            settings(5, DELAY),
        );
        scheduler.enqueue(mods).unwrap().await.unwrap();

        let stored = store.snapshot(401).unwrap();
        assert_eq!(stored.installation_status, InstallationStatus::Error);
        assert_eq!(stored.error_status, Some(ErrorStatus::Io));
    }

    struct HangingExecutor;

    #[async_trait]
    impl JobExecutor for HangingExecutor {
        async fn submit(&self, _job: SteamCmdJob) -> anyhow::Result<JobOutcome> {
            std::future::pending().await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_job_timeout_marks_generic_error() {
        let temp_dir = TempDir::new().unwrap();
        let paths = create_install_paths(temp_dir.path(), &[ServerType::Arma3]);
        let store = Arc::new(InMemoryModStore::new());
        let mods = seed(&store, [501]).await;

        let (scheduler, _worker) = InstallScheduler::start(
            Arc::new(HangingExecutor),
            store.clone(),
            InstallationPipeline::new(paths),
            settings(5, DELAY),
        );
        let summary = scheduler.enqueue(mods).unwrap().await.unwrap();

        assert_eq!(summary.failed, vec![501]);
        assert_eq!(store.snapshot(501).unwrap().error_status, Some(ErrorStatus::Generic));
    }

    #[tokio::test(start_paused = true)]
    async fn test_removed_mod_is_not_recreated() {
        let temp_dir = TempDir::new().unwrap();
        let paths = create_install_paths(temp_dir.path(), &[ServerType::Arma3]);
        let store = Arc::new(InMemoryModStore::new());
        let mods = seed(&store, [601, 602]).await;
        store.delete_mod(601).await.unwrap();

        let (scheduler, _worker) = InstallScheduler::start(
            Arc::new(ScriptedExecutor::new()),
            store.clone(),
            InstallationPipeline::new(paths),
            settings(5, DELAY),
        );
        let summary = scheduler.enqueue(mods).unwrap().await.unwrap();

        assert_eq!(summary.vanished, vec![601]);
        assert!(store.snapshot(601).is_none());
        assert!(store.snapshot(602).unwrap().is_terminal());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cycles_run_one_after_another() {
        let temp_dir = TempDir::new().unwrap();
        let paths = create_install_paths(temp_dir.path(), &[ServerType::Arma3]);
        let store = Arc::new(InMemoryModStore::new());
        let executor = Arc::new(ScriptedExecutor::new());
        let first = seed(&store, [701, 702]).await;
        let second = seed(&store, [703]).await;

        let (scheduler, _worker) = InstallScheduler::start(
            executor.clone(),
            store.clone(),
            InstallationPipeline::new(paths),
            settings(1, DELAY),
        );
        let first_done = scheduler.enqueue(first).unwrap();
        let second_done = scheduler.enqueue(second).unwrap();
        second_done.await.unwrap();
        first_done.await.unwrap();

        let submissions = executor.submissions();
        let order: Vec<Vec<u64>> = submissions.iter().map(|s| s.mod_ids.clone()).collect();
        assert_eq!(order, vec![vec![701], vec![702], vec![703]]);
        assert!(submissions[1].at - submissions[0].at >= DELAY);
        // The delay also separates the last session of one cycle from the next cycle
        assert!(submissions[2].at - submissions[1].at >= DELAY);

        // Every mod of both cycles reached a terminal state
        for id in [701, 702, 703] {
            assert!(store.snapshot(id).unwrap().is_terminal());
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_delay_applies_to_later_requests() {
        let temp_dir = TempDir::new().unwrap();
        let paths = create_install_paths(temp_dir.path(), &[ServerType::Arma3]);
        let store = Arc::new(InMemoryModStore::new());
        let executor = Arc::new(ScriptedExecutor::new());
        let first = seed(&store, [801]).await;
        let second = seed(&store, [802]).await;

        let (scheduler, _worker) = InstallScheduler::start(
            executor.clone(),
            store.clone(),
            InstallationPipeline::new(paths),
            settings(5, DELAY),
        );
        scheduler.enqueue(first).unwrap().await.unwrap();
        tokio::time::sleep(Duration::from_secs(5)).await;
        scheduler.enqueue(second).unwrap().await.unwrap();

        let submissions = executor.submissions();
        assert_eq!(submissions.len(), 2);
        assert!(submissions[1].at - submissions[0].at >= DELAY);
    }

    /// Store whose `update_mod` fails a given number of times before delegating
    struct FlakyStore {
        inner: InMemoryModStore,
        failures_left: std::sync::Mutex<u32>,
    }

    #[async_trait]
    impl ModStore for FlakyStore {
        async fn get_mod(&self, id: u64) -> anyhow::Result<Option<WorkshopMod>> {
            self.inner.get_mod(id).await
        }

        async fn list_mods(&self) -> anyhow::Result<Vec<WorkshopMod>> {
            self.inner.list_mods().await
        }

        async fn list_mods_for_server(&self, server_type: ServerType) -> anyhow::Result<Vec<WorkshopMod>> {
            self.inner.list_mods_for_server(server_type).await
        }

        async fn save_all_mods(&self, mods: &[WorkshopMod]) -> anyhow::Result<()> {
            self.inner.save_all_mods(mods).await
        }

        async fn update_mod(&self, workshop_mod: &WorkshopMod) -> anyhow::Result<bool> {
            {
                let mut failures_left = self.failures_left.lock().unwrap();
                if *failures_left > 0 {
                    *failures_left -= 1;
                    return Err(anyhow::anyhow!("database is locked"));
                }
            }
            self.inner.update_mod(workshop_mod).await
        }

        async fn update_file_size(&self, id: u64, file_size: u64) -> anyhow::Result<bool> {
            self.inner.update_file_size(id, file_size).await
        }

        async fn set_server_only(&self, id: u64, server_only: bool) -> anyhow::Result<bool> {
            self.inner.set_server_only(id, server_only).await
        }

        async fn delete_mod(&self, id: u64) -> anyhow::Result<()> {
            self.inner.delete_mod(id).await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_store_failure_is_retried() {
        let temp_dir = TempDir::new().unwrap();
        let paths = create_install_paths(temp_dir.path(), &[ServerType::Arma3]);
        let store = Arc::new(FlakyStore {
            inner: InMemoryModStore::new(),
            failures_left: std::sync::Mutex::new(1),
        });
        let mods = seed(&store.inner, [901]).await;

        let (scheduler, _worker) = InstallScheduler::start(
            Arc::new(
                ScriptedExecutor::new().on_submit(materialize_downloads(paths.clone(), ServerType::Arma3)),
            ),
            store.clone(),
            InstallationPipeline::new(paths),
            settings(5, DELAY),
        );
        let summary = scheduler.enqueue(mods).unwrap().await.unwrap();

        assert_eq!(summary.finished, vec![901]);
        assert_eq!(
            store.inner.snapshot(901).unwrap().installation_status,
            InstallationStatus::Finished
        );
    }

    #[tokio::test]
    async fn test_update_keeps_keys_of_other_mods() {
        let temp_dir = TempDir::new().unwrap();
        let paths = create_install_paths(temp_dir.path(), &[ServerType::Arma3]);
        let store = Arc::new(InMemoryModStore::new());
        let mut other = WorkshopMod::new(1001);
        other.name = "Other".to_string();
        other.server_type = Some(ServerType::Arma3);
        other.mark_finished();
        other.key_files.insert("shared.bikey".to_string());
        store.save_all_mods(&[other]).await.unwrap();
        crate::test_helpers::write_mod_content(&paths, 1001, ServerType::Arma3, &[("mod.cpp", "x")]);
        std::fs::create_dir_all(paths.server_keys_path(ServerType::Arma3)).unwrap();
        std::fs::write(paths.server_key_path("shared.bikey", ServerType::Arma3), "k").unwrap();

        // The updated mod previously shipped the same key but no longer does
        let mut updated = seed(&store, [1002]).await;
        updated[0].key_files.insert("shared.bikey".to_string());
        store.save_all_mods(&updated).await.unwrap();

        let (scheduler, _worker) = InstallScheduler::start(
            Arc::new(
                ScriptedExecutor::new().on_submit(materialize_downloads(paths.clone(), ServerType::Arma3)),
            ),
            store.clone(),
            InstallationPipeline::new(paths.clone()),
            settings(5, Duration::from_millis(10)),
        );
        let summary = scheduler.enqueue(updated).unwrap().await.unwrap();

        assert_eq!(summary.finished, vec![1002]);
        assert!(store.snapshot(1002).unwrap().key_files.is_empty());
        assert!(paths.server_key_path("shared.bikey", ServerType::Arma3).is_file());
    }
}

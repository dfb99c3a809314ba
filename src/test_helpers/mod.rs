// SPDX-License-Identifier: GPL-3.0-only
//! Test doubles for the installer's collaborators and scratch filesystem layouts.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::path::Path;
use std::sync::Mutex;
use tokio::time::Instant;

use crate::config::InstallPaths;
use crate::metadata::{MetadataError, MetadataResolver, ModMetadata};
use crate::registry::{ModStore, ServerType, WorkshopMod};
use crate::steamcmd::{JobExecutor, JobOutcome, SteamCmdJob};

/// Mod store backed by a map, for tests that must not touch SQLite
#[derive(Default)]
pub struct InMemoryModStore {
    mods: Mutex<BTreeMap<u64, WorkshopMod>>,
}

impl InMemoryModStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self, id: u64) -> Option<WorkshopMod> {
        self.mods.lock().unwrap().get(&id).cloned()
    }

    pub fn put(&self, workshop_mod: WorkshopMod) {
        self.mods.lock().unwrap().insert(workshop_mod.id, workshop_mod);
    }

    pub fn remove(&self, id: u64) {
        self.mods.lock().unwrap().remove(&id);
    }
}

#[async_trait]
impl ModStore for InMemoryModStore {
    async fn get_mod(&self, id: u64) -> anyhow::Result<Option<WorkshopMod>> {
        Ok(self.snapshot(id))
    }

    async fn list_mods(&self) -> anyhow::Result<Vec<WorkshopMod>> {
        Ok(self.mods.lock().unwrap().values().cloned().collect())
    }

    async fn list_mods_for_server(&self, server_type: ServerType) -> anyhow::Result<Vec<WorkshopMod>> {
        Ok(self
            .mods
            .lock()
            .unwrap()
            .values()
            .filter(|m| m.server_type == Some(server_type))
            .cloned()
            .collect())
    }

    async fn save_all_mods(&self, mods: &[WorkshopMod]) -> anyhow::Result<()> {
        let mut stored = self.mods.lock().unwrap();
        for workshop_mod in mods {
            stored.insert(workshop_mod.id, workshop_mod.clone());
        }
        Ok(())
    }

    async fn update_mod(&self, workshop_mod: &WorkshopMod) -> anyhow::Result<bool> {
        let mut stored = self.mods.lock().unwrap();
        match stored.get_mut(&workshop_mod.id) {
            Some(existing) => {
                *existing = workshop_mod.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn update_file_size(&self, id: u64, file_size: u64) -> anyhow::Result<bool> {
        let mut stored = self.mods.lock().unwrap();
        match stored.get_mut(&id) {
            Some(existing) if existing.needs_size_recalculation() => {
                existing.file_size = Some(file_size);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn set_server_only(&self, id: u64, server_only: bool) -> anyhow::Result<bool> {
        let mut stored = self.mods.lock().unwrap();
        match stored.get_mut(&id) {
            Some(existing) => {
                existing.server_only = server_only;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_mod(&self, id: u64) -> anyhow::Result<()> {
        self.mods.lock().unwrap().remove(&id);
        Ok(())
    }
}

/// One recorded call to [`ScriptedExecutor::submit`]
#[derive(Debug, Clone)]
pub struct Submission {
    pub at: Instant,
    pub mod_ids: Vec<u64>,
}

type SubmitHook = Box<dyn Fn(&SteamCmdJob) + Send + Sync>;

/// Executor that records submissions and replays scripted results.
///
/// Results are consumed in submission order; once the script runs out every
/// further job succeeds.
#[derive(Default)]
pub struct ScriptedExecutor {
    script: Mutex<VecDeque<anyhow::Result<JobOutcome>>>,
    submissions: Mutex<Vec<Submission>>,
    on_submit: Option<SubmitHook>,
}

impl ScriptedExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_script(results: Vec<anyhow::Result<JobOutcome>>) -> Self {
        Self {
            script: Mutex::new(results.into()),
            ..Self::default()
        }
    }

    /// Run `hook` for every submitted job, e.g. to materialize downloaded content
    pub fn on_submit(mut self, hook: impl Fn(&SteamCmdJob) + Send + Sync + 'static) -> Self {
        self.on_submit = Some(Box::new(hook));
        self
    }

    pub fn submissions(&self) -> Vec<Submission> {
        self.submissions.lock().unwrap().clone()
    }
}

#[async_trait]
impl JobExecutor for ScriptedExecutor {
    async fn submit(&self, job: SteamCmdJob) -> anyhow::Result<JobOutcome> {
        self.submissions.lock().unwrap().push(Submission {
            at: Instant::now(),
            mod_ids: job.mod_ids(),
        });

        let result = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(JobOutcome::success()));

        if result.as_ref().is_ok_and(|outcome| outcome.job_error.is_none()) {
            if let Some(hook) = &self.on_submit {
                hook(&job);
            }
        }

        result
    }
}

/// Resolver answering from a fixed table
#[derive(Default)]
pub struct StaticResolver {
    items: HashMap<u64, ModMetadata>,
}

impl StaticResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_item(mut self, mod_id: u64, name: &str, consumer_app_id: u32) -> Self {
        self.items.insert(
            mod_id,
            ModMetadata {
                name: name.to_string(),
                consumer_app_id,
            },
        );
        self
    }
}

#[async_trait]
impl MetadataResolver for StaticResolver {
    async fn resolve(&self, mod_id: u64) -> Result<ModMetadata, MetadataError> {
        self.items
            .get(&mod_id)
            .cloned()
            .ok_or(MetadataError::NotFound(mod_id))
    }
}

/// Install paths below `root`, with the given server directories created
pub fn create_install_paths(root: &Path, installed: &[ServerType]) -> InstallPaths {
    let paths = InstallPaths::new(
        root.join("workshop"),
        root.join("arma3"),
        root.join("dayz"),
        root.join("dayz_exp"),
    );
    for server_type in installed {
        std::fs::create_dir_all(paths.server_path(*server_type)).unwrap();
    }
    paths
}

/// Write files into the download directory of a mod, as SteamCMD would
pub fn write_mod_content(paths: &InstallPaths, mod_id: u64, server_type: ServerType, files: &[(&str, &str)]) {
    let root = paths.mod_installation_path(mod_id, server_type);
    for (relative, content) in files {
        let file = root.join(relative);
        std::fs::create_dir_all(file.parent().unwrap()).unwrap();
        std::fs::write(file, content).unwrap();
    }
}

/// Hook for [`ScriptedExecutor::on_submit`] creating a small download for every item
pub fn materialize_downloads(paths: InstallPaths, server_type: ServerType) -> impl Fn(&SteamCmdJob) + Send + Sync {
    move |job: &SteamCmdJob| {
        for id in job.mod_ids() {
            write_mod_content(&paths, id, server_type, &[("Addons/Content.PBO", "pbo data")]);
        }
    }
}

// SPDX-License-Identifier: GPL-3.0-only
use anyhow::Context;
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::mod_installer::error::InstallError;
use crate::mod_installer::pipeline::{shared_key_files, InstallationPipeline};
use crate::mod_installer::scheduler::{CycleSummary, InstallScheduler};
use crate::metadata::MetadataResolver;
use crate::registry::{ErrorStatus, InstallationStatus, ModStore, ServerType, WorkshopMod};

/// Result of an accepted install request
#[derive(Debug)]
pub struct ScheduledInstall {
    /// Records as persisted, all `IN_PROGRESS`
    pub mods: Vec<WorkshopMod>,
    /// Resolves when the request cycle completed; may be ignored
    pub completion: oneshot::Receiver<CycleSummary>,
}

/// Entry point for everything the API can do with workshop mods
pub struct ModsService {
    store: Arc<dyn ModStore>,
    resolver: Arc<dyn MetadataResolver>,
    pipeline: InstallationPipeline,
    scheduler: InstallScheduler,
}

impl ModsService {
    pub fn new(
        store: Arc<dyn ModStore>,
        resolver: Arc<dyn MetadataResolver>,
        pipeline: InstallationPipeline,
        scheduler: InstallScheduler,
    ) -> Self {
        Self {
            store,
            resolver,
            pipeline,
            scheduler,
        }
    }

    pub async fn get_mod(&self, id: u64) -> Result<WorkshopMod, InstallError> {
        self.store
            .get_mod(id)
            .await?
            .ok_or(InstallError::ModNotFound(id))
    }

    /// List mods, optionally only those of one server family. DayZ
    /// Experimental shares its content with DayZ and lists DayZ mods.
    pub async fn list_mods(&self, filter: Option<ServerType>) -> Result<Vec<WorkshopMod>, InstallError> {
        let mods = match filter {
            Some(ServerType::DayZExp) => self.store.list_mods_for_server(ServerType::DayZ).await?,
            Some(server_type) => self.store.list_mods_for_server(server_type).await?,
            None => self.store.list_mods().await?,
        };

        Ok(self.reconcile_sizes(mods).await)
    }

    /// Measure finished mods that have no recorded size yet and persist the
    /// results. Only the size column is written, and only while the stored
    /// record is still installed without a size. Failures are logged and
    /// leave the records as they were.
    async fn reconcile_sizes(&self, mut mods: Vec<WorkshopMod>) -> Vec<WorkshopMod> {
        let pending: Vec<(usize, u64, ServerType)> = mods
            .iter()
            .enumerate()
            .filter(|(_, m)| m.needs_size_recalculation())
            .filter_map(|(index, m)| m.server_type.map(|st| (index, m.id, st)))
            .collect();
        if pending.is_empty() {
            return mods;
        }

        let pipeline = self.pipeline.clone();
        let measured = tokio::task::spawn_blocking(move || {
            pending
                .into_iter()
                .filter_map(|(index, id, server_type)| match pipeline.measure_size(id, server_type) {
                    Ok(size) if size > 0 => Some((index, size)),
                    Ok(_) => {
                        warn!(mod_id = id, "Installed mod is empty on disk");
                        None
                    }
                    Err(e) => {
                        warn!(mod_id = id, error = %format!("{:#}", e), "Failed to calculate mod size");
                        None
                    }
                })
                .collect::<Vec<_>>()
        })
        .await;

        let measured = match measured {
            Ok(measured) => measured,
            Err(e) => {
                warn!(error = %e, "Size calculation task failed");
                return mods;
            }
        };

        let mut corrected = 0;
        for (index, size) in measured {
            let id = mods[index].id;
            match self.store.update_file_size(id, size).await {
                Ok(true) => {
                    mods[index].file_size = Some(size);
                    corrected += 1;
                }
                Ok(false) => debug!(mod_id = id, "Mod changed while measuring, size not recorded"),
                Err(e) => warn!(mod_id = id, error = %e, "Failed to persist recalculated mod size"),
            }
        }

        if corrected > 0 {
            info!(count = corrected, "Recalculated mod sizes");
        }
        mods
    }

    /// Validate every requested mod, mark them `IN_PROGRESS` and queue the
    /// downloads. Nothing is persisted when any id fails validation.
    pub async fn request_install_or_update(&self, ids: &[u64]) -> Result<ScheduledInstall, InstallError> {
        let mut unique = Vec::with_capacity(ids.len());
        for id in ids {
            if !unique.contains(id) {
                unique.push(*id);
            }
        }

        let mut mods = Vec::with_capacity(unique.len());
        for id in unique {
            let mut workshop_mod = self
                .store
                .get_mod(id)
                .await?
                .unwrap_or_else(|| WorkshopMod::new(id));

            let metadata = self.resolver.resolve(id).await?;
            let server_type = ServerType::from_consumer_app_id(metadata.consumer_app_id)
                .ok_or(InstallError::NotConsumedByGame(id))?;
            self.ensure_server_installed(server_type)?;

            workshop_mod.name = metadata.name;
            workshop_mod.server_type = Some(server_type);
            mods.push(workshop_mod);
        }

        for workshop_mod in &mut mods {
            workshop_mod.mark_in_progress();
        }
        self.store.save_all_mods(&mods).await?;

        let completion = self.scheduler.enqueue(mods.clone())?;
        info!(count = mods.len(), "Queued mods for installation");

        Ok(ScheduledInstall { mods, completion })
    }

    fn ensure_server_installed(&self, server_type: ServerType) -> Result<(), InstallError> {
        let paths = self.pipeline.paths();
        let installed = match server_type {
            ServerType::DayZ | ServerType::DayZExp => {
                paths.is_server_installed(ServerType::DayZ) || paths.is_server_installed(ServerType::DayZExp)
            }
            ServerType::Arma3 => paths.is_server_installed(ServerType::Arma3),
        };

        if installed {
            Ok(())
        } else {
            Err(InstallError::ServerNotInstalled(server_type))
        }
    }

    /// Re-download every known mod
    pub async fn update_all_mods(&self) -> Result<ScheduledInstall, InstallError> {
        let ids: Vec<u64> = self.store.list_mods().await?.iter().map(|m| m.id).collect();
        info!(count = ids.len(), "Updating all mods");
        self.request_install_or_update(&ids).await
    }

    /// Remove a mod's keys, links, content and record. Unknown ids are a no-op.
    pub async fn uninstall_mod(&self, id: u64) -> Result<(), InstallError> {
        let Some(workshop_mod) = self.store.get_mod(id).await? else {
            info!(mod_id = id, "Mod is not installed, nothing to uninstall");
            return Ok(());
        };

        let shared = match workshop_mod.server_type {
            Some(server_type) => {
                let others = self.store.list_mods_for_server(server_type).await?;
                shared_key_files(&workshop_mod, &others)
            }
            None => Default::default(),
        };

        let pipeline = self.pipeline.clone();
        let removing = workshop_mod.clone();
        tokio::task::spawn_blocking(move || pipeline.remove(&removing, &shared))
            .await
            .context("Uninstall task failed")??;

        self.store.delete_mod(id).await?;
        info!(mod_id = id, name = %workshop_mod.name, "Mod uninstalled");
        Ok(())
    }

    pub async fn set_mod_server_only(&self, id: u64, server_only: bool) -> Result<WorkshopMod, InstallError> {
        if !self.store.set_server_only(id, server_only).await? {
            return Err(InstallError::ModNotFound(id));
        }

        info!(mod_id = id, server_only, "Updated server-only flag");
        self.get_mod(id).await
    }

    pub async fn clear_cache(&self) -> Result<(), InstallError> {
        crate::steamcmd::clear_cache(self.pipeline.paths()).await?;
        Ok(())
    }

    /// Fail mods left `IN_PROGRESS` by a previous run. Call before any new
    /// request is accepted.
    pub async fn recover_interrupted(&self) -> Result<usize, InstallError> {
        let mut interrupted: Vec<WorkshopMod> = self
            .store
            .list_mods()
            .await?
            .into_iter()
            .filter(|m| m.installation_status == InstallationStatus::InProgress)
            .collect();

        for workshop_mod in &mut interrupted {
            warn!(mod_id = workshop_mod.id, name = %workshop_mod.name, "Installation was interrupted");
            workshop_mod.mark_failed(ErrorStatus::Interrupted);
        }

        if !interrupted.is_empty() {
            self.store.save_all_mods(&interrupted).await?;
        }
        Ok(interrupted.len())
    }
}

// SPDX-License-Identifier: GPL-3.0-only
use async_trait::async_trait;
use crate::registry::models::{ServerType, WorkshopMod};

#[async_trait]
pub trait ModStore: Send + Sync {
    /// Get a mod by its workshop ID
    async fn get_mod(&self, id: u64) -> anyhow::Result<Option<WorkshopMod>>;

    /// List all mods
    async fn list_mods(&self) -> anyhow::Result<Vec<WorkshopMod>>;

    /// List mods owned by the given server family
    async fn list_mods_for_server(&self, server_type: ServerType) -> anyhow::Result<Vec<WorkshopMod>>;

    /// Insert or replace all given mods in a single transaction
    async fn save_all_mods(&self, mods: &[WorkshopMod]) -> anyhow::Result<()>;

    /// Overwrite an existing mod. Returns `false` when no record with that ID
    /// exists anymore; the mod is not re-created in that case.
    async fn update_mod(&self, workshop_mod: &WorkshopMod) -> anyhow::Result<bool>;

    /// Record the measured size of an installed mod that has none yet.
    /// Returns `false` if the record is gone, not `FINISHED`, or already sized.
    async fn update_file_size(&self, id: u64, file_size: u64) -> anyhow::Result<bool>;

    /// Change only the server-only flag. Returns `false` for an unknown ID.
    async fn set_server_only(&self, id: u64, server_only: bool) -> anyhow::Result<bool>;

    /// Remove a mod; removing an unknown ID is not an error
    async fn delete_mod(&self, id: u64) -> anyhow::Result<()>;
}

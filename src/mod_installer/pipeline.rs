// SPDX-License-Identifier: GPL-3.0-only
//! Post-download installation steps.
//!
//! Everything here is blocking filesystem work; the scheduler runs it on the
//! blocking thread pool.

use anyhow::Context;
use chrono::Utc;
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};

use crate::config::InstallPaths;
use crate::registry::{ServerType, WorkshopMod};
use crate::utils::fs::{
    directory_size, ensure_symlink, find_files_with_extension, lowercase_tree,
    remove_dir_all_if_exists, remove_file_if_exists, remove_symlink_to,
};

const KEY_EXTENSION: &str = "bikey";

/// Turns a freshly downloaded mod directory into something the servers can load
#[derive(Debug, Clone)]
pub struct InstallationPipeline {
    paths: InstallPaths,
}

impl InstallationPipeline {
    pub fn new(paths: InstallPaths) -> Self {
        Self { paths }
    }

    pub fn paths(&self) -> &InstallPaths {
        &self.paths
    }

    /// Installed servers that receive the keys and links of a mod owned by `server_type`
    pub fn relevant_server_types(&self, server_type: ServerType) -> Vec<ServerType> {
        candidate_server_types(server_type)
            .into_iter()
            .filter(|candidate| self.paths.is_server_installed(*candidate))
            .collect()
    }

    /// Whether SteamCMD left a download directory for the mod
    pub fn is_downloaded(&self, workshop_mod: &WorkshopMod) -> bool {
        workshop_mod
            .server_type
            .is_some_and(|st| self.paths.mod_installation_path(workshop_mod.id, st).is_dir())
    }

    /// Run every installation step on `workshop_mod`, updating its key set,
    /// published link name, timestamp and size. Keys in `shared_keys` are
    /// still held by other mods and are never deleted. Stops at the first
    /// failing step without rolling back; running it again from scratch is safe.
    pub fn install(&self, workshop_mod: &mut WorkshopMod, shared_keys: &BTreeSet<String>) -> anyhow::Result<()> {
        let server_type = workshop_mod
            .server_type
            .with_context(|| format!("Mod {} has no server type", workshop_mod.id))?;
        let mod_dir = self.paths.mod_installation_path(workshop_mod.id, server_type);
        let relevant = self.relevant_server_types(server_type);

        let renamed = lowercase_tree(&mod_dir)?;
        debug!(mod_id = workshop_mod.id, renamed, "Converted mod files to lowercase");

        self.resync_keys(workshop_mod, &mod_dir, &relevant, shared_keys)?;
        self.publish_links(workshop_mod, &mod_dir, &relevant)?;

        workshop_mod.last_updated = Some(Utc::now());
        workshop_mod.file_size = Some(directory_size(&mod_dir)?);

        info!(
            mod_id = workshop_mod.id,
            name = %workshop_mod.name,
            servers = ?relevant,
            keys = workshop_mod.key_files.len(),
            size = workshop_mod.file_size,
            "Mod installed"
        );
        Ok(())
    }

    fn resync_keys(
        &self,
        workshop_mod: &mut WorkshopMod,
        mod_dir: &Path,
        relevant: &[ServerType],
        shared_keys: &BTreeSet<String>,
    ) -> anyhow::Result<()> {
        for key in workshop_mod.key_files.difference(shared_keys) {
            for server_type in relevant {
                let key_path = self.paths.server_key_path(key, *server_type);
                if let Err(e) = remove_file_if_exists(&key_path) {
                    warn!(mod_id = workshop_mod.id, path = %key_path.display(), error = %e, "Failed to delete old key");
                }
            }
        }
        workshop_mod.key_files.clear();

        for key in find_files_with_extension(mod_dir, KEY_EXTENSION)? {
            let Some(key_name) = key.file_name().and_then(|n| n.to_str()).map(str::to_string) else {
                continue;
            };

            for server_type in relevant {
                let keys_dir = self.paths.server_keys_path(*server_type);
                fs::create_dir_all(&keys_dir)
                    .with_context(|| format!("Failed to create {}", keys_dir.display()))?;
                let destination = keys_dir.join(&key_name);
                debug!(mod_id = workshop_mod.id, key = %key_name, server = %server_type, "Copying key");
                fs::copy(&key, &destination).with_context(|| {
                    format!("Failed to copy {} to {}", key.display(), destination.display())
                })?;
            }

            workshop_mod.key_files.insert(key_name);
        }

        Ok(())
    }

    fn publish_links(
        &self,
        workshop_mod: &mut WorkshopMod,
        mod_dir: &Path,
        relevant: &[ServerType],
    ) -> anyhow::Result<()> {
        let normalized = workshop_mod.normalized_name();

        // The workshop item was renamed since its links were published
        if let Some(previous) = workshop_mod.published_name.as_deref().filter(|p| *p != normalized) {
            let server_type = workshop_mod.server_type.context("Mod has no server type")?;
            for candidate in candidate_server_types(server_type) {
                let link = self.paths.mod_link_path(previous, candidate);
                if remove_symlink_to(&link, mod_dir)
                    .with_context(|| format!("Failed to delete link {}", link.display()))?
                {
                    debug!(mod_id = workshop_mod.id, link = %link.display(), "Removed link of previous mod name");
                }
            }
        }

        for server_type in relevant {
            let link = self.paths.mod_link_path(&normalized, *server_type);
            if ensure_symlink(&link, mod_dir)? {
                debug!(mod_id = workshop_mod.id, link = %link.display(), "Published mod link");
            }
        }

        workshop_mod.published_name = Some(normalized);
        Ok(())
    }

    /// Delete keys, links and downloaded content of a mod. Anything already
    /// absent is skipped, and so are keys in `shared_keys` and links that do
    /// not point at this mod.
    pub fn remove(&self, workshop_mod: &WorkshopMod, shared_keys: &BTreeSet<String>) -> anyhow::Result<()> {
        let Some(server_type) = workshop_mod.server_type else {
            return Ok(());
        };

        // Also covers servers that have been removed since the mod was installed
        let servers = candidate_server_types(server_type);
        let mod_dir = self.paths.mod_installation_path(workshop_mod.id, server_type);
        let mut link_names = BTreeSet::from([workshop_mod.normalized_name()]);
        link_names.extend(workshop_mod.published_name.clone());

        for server_type in &servers {
            for key in workshop_mod.key_files.difference(shared_keys) {
                let key_path = self.paths.server_key_path(key, *server_type);
                remove_file_if_exists(&key_path)
                    .with_context(|| format!("Failed to delete key {}", key_path.display()))?;
            }

            for name in &link_names {
                let link = self.paths.mod_link_path(name, *server_type);
                remove_symlink_to(&link, &mod_dir)
                    .with_context(|| format!("Failed to delete link {}", link.display()))?;
            }
        }

        remove_dir_all_if_exists(&mod_dir)
            .with_context(|| format!("Failed to delete {}", mod_dir.display()))?;

        info!(mod_id = workshop_mod.id, name = %workshop_mod.name, "Mod files removed");
        Ok(())
    }

    /// Size of the downloaded content on disk
    pub fn measure_size(&self, mod_id: u64, server_type: ServerType) -> anyhow::Result<u64> {
        directory_size(&self.paths.mod_installation_path(mod_id, server_type))
    }
}

/// Key files that mods other than `workshop_mod` still have installed on the
/// same servers
pub fn shared_key_files(workshop_mod: &WorkshopMod, others: &[WorkshopMod]) -> BTreeSet<String> {
    others
        .iter()
        .filter(|other| other.id != workshop_mod.id && other.server_type == workshop_mod.server_type)
        .flat_map(|other| other.key_files.iter().cloned())
        .collect()
}

/// Servers that may consume content owned by `server_type`
fn candidate_server_types(server_type: ServerType) -> Vec<ServerType> {
    match server_type {
        ServerType::DayZ => vec![ServerType::DayZ, ServerType::DayZExp],
        other => vec![other],
    }
}

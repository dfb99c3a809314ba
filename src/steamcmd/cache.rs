// SPDX-License-Identifier: GPL-3.0-only
use anyhow::Context;
use tracing::info;

use crate::config::InstallPaths;
use crate::utils::fs::remove_dir_all_if_exists;

/// Drop SteamCMD's metadata cache and partial downloads.
///
/// Installed content under `workshop/content` is left untouched.
pub async fn clear_cache(paths: &InstallPaths) -> anyhow::Result<()> {
    let steamapps = paths.steamapps_path();
    let targets = [
        steamapps.join("appcache"),
        steamapps.join("workshop").join("downloads"),
    ];

    tokio::task::spawn_blocking(move || {
        for target in &targets {
            let removed = remove_dir_all_if_exists(target)
                .with_context(|| format!("Failed to remove {}", target.display()))?;
            if removed {
                info!(path = %target.display(), "Cleared SteamCMD cache directory");
            }
        }
        Ok::<(), anyhow::Error>(())
    })
    .await?
}

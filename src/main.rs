// SPDX-License-Identifier: GPL-3.0-only
mod api;
mod config;
mod logging;
mod metadata;
mod mod_installer;
mod registry;
mod steamcmd;
mod utils;

#[cfg(test)]
mod test_helpers;

use std::sync::Arc;
use tokio::signal;
use tracing::{error, info, warn};

use api::HttpServer;
use config::{Config, InstallPaths};
use logging::setup_logging;
use metadata::{MetadataResolver, SteamWorkshopResolver};
use mod_installer::{InstallScheduler, InstallationPipeline, ModsService, SchedulerSettings};
use registry::{ModStore, SqliteModStore};
use steamcmd::{JobExecutor, SteamCmdExecutor};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load()?;

    setup_logging(&config.log_level, &config.log_format)?;

    info!("Starting WorkshopModDaemon v{}", env!("CARGO_PKG_VERSION"));

    let store: Arc<dyn ModStore> = Arc::new(SqliteModStore::new(&config.registry_db_path).await?);
    info!("Registry initialized at {}", config.registry_db_path.display());

    let paths = InstallPaths::from_config(&config);
    tokio::fs::create_dir_all(paths.mods_base_path()).await?;

    let resolver: Arc<dyn MetadataResolver> =
        Arc::new(SteamWorkshopResolver::new(config.workshop_api_url.clone())?);
    let executor: Arc<dyn JobExecutor> = Arc::new(SteamCmdExecutor::new(config.steamcmd_path.clone())?);
    if !config.steamcmd_path.exists() {
        warn!(path = %config.steamcmd_path.display(), "SteamCMD executable not found, downloads will fail");
    }

    let pipeline = InstallationPipeline::new(paths.clone());
    let settings = SchedulerSettings::from_config(&config, &paths);
    let (scheduler, worker_task) =
        InstallScheduler::start(executor, Arc::clone(&store), pipeline.clone(), settings);

    let service = Arc::new(ModsService::new(store, resolver, pipeline, scheduler));

    let interrupted = service.recover_interrupted().await?;
    if interrupted > 0 {
        warn!(count = interrupted, "Marked interrupted installations as failed");
    }

    let http_server = HttpServer::new(Arc::clone(&service), config.local_api_bind);
    let http_task = tokio::spawn(async move {
        if let Err(e) = http_server.serve().await {
            error!(error = %e, "HTTP server error");
        }
    });

    info!("All services started. Waiting for shutdown signal...");

    match signal::ctrl_c().await {
        Ok(()) => {
            info!("Received shutdown signal (Ctrl+C)");
        }
        Err(err) => {
            error!(error = %err, "Unable to listen for shutdown signal");
        }
    }

    info!("Initiating shutdown...");

    // Mods of an aborted cycle stay IN_PROGRESS and are recovered on the next start
    http_task.abort();
    worker_task.abort();

    info!("Shutdown complete");
    Ok(())
}

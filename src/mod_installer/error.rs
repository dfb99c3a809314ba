// SPDX-License-Identifier: GPL-3.0-only
use crate::metadata::MetadataError;
use crate::registry::ServerType;

/// Errors reported synchronously to callers of the mods service
#[derive(thiserror::Error, Debug)]
pub enum InstallError {
    #[error("Mod {0} not found")]
    ModNotFound(u64),

    #[error(transparent)]
    Metadata(#[from] MetadataError),

    #[error("Mod {0} is not consumed by any supported game")]
    NotConsumedByGame(u64),

    #[error("Mod installation failed: {} server is not installed", .0.display_name())]
    ServerNotInstalled(ServerType),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

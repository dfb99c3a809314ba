// SPDX-License-Identifier: GPL-3.0-only
use async_trait::async_trait;

/// Workshop details needed before a mod can be installed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModMetadata {
    pub name: String,
    /// Steam app id of the game consuming the item
    pub consumer_app_id: u32,
}

#[derive(thiserror::Error, Debug)]
pub enum MetadataError {
    #[error("Workshop item {0} not found")]
    NotFound(u64),

    #[error("Workshop request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Unexpected workshop response: {0}")]
    InvalidResponse(String),
}

#[async_trait]
pub trait MetadataResolver: Send + Sync {
    /// Look up the display name and owning game of a workshop item
    async fn resolve(&self, mod_id: u64) -> Result<ModMetadata, MetadataError>;
}

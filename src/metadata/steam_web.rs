// SPDX-License-Identifier: GPL-3.0-only
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info};
use crate::metadata::traits::{MetadataError, MetadataResolver, ModMetadata};

const DETAILS_PATH: &str = "ISteamRemoteStorage/GetPublishedFileDetails/v1/";

/// Steam's "OK" EResult
const RESULT_OK: i32 = 1;

#[derive(Debug, Deserialize)]
struct DetailsEnvelope {
    response: DetailsResponse,
}

#[derive(Debug, Deserialize)]
struct DetailsResponse {
    #[serde(default)]
    publishedfiledetails: Vec<PublishedFileDetails>,
}

#[derive(Debug, Deserialize)]
struct PublishedFileDetails {
    result: i32,
    title: Option<String>,
    consumer_app_id: Option<u32>,
}

/// Resolves workshop metadata through the public Steam Web API
#[derive(Debug, Clone)]
pub struct SteamWorkshopResolver {
    client: Client,
    base_url: String,
}

impl SteamWorkshopResolver {
    pub fn new(base_url: String) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .user_agent(concat!("WorkshopModDaemon/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { client, base_url })
    }

    fn details_url(&self) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), DETAILS_PATH)
    }
}

#[async_trait]
impl MetadataResolver for SteamWorkshopResolver {
    async fn resolve(&self, mod_id: u64) -> Result<ModMetadata, MetadataError> {
        debug!(mod_id, "Fetching workshop file details");

        let id = mod_id.to_string();
        let response = self
            .client
            .post(self.details_url())
            .form(&[("itemcount", "1"), ("publishedfileids[0]", id.as_str())])
            .send()
            .await?
            .error_for_status()?;

        let envelope: DetailsEnvelope = response.json().await?;
        let details = envelope
            .response
            .publishedfiledetails
            .into_iter()
            .next()
            .ok_or_else(|| MetadataError::InvalidResponse("empty publishedfiledetails".to_string()))?;

        if details.result != RESULT_OK {
            return Err(MetadataError::NotFound(mod_id));
        }

        let name = details
            .title
            .ok_or_else(|| MetadataError::InvalidResponse(format!("item {} has no title", mod_id)))?;
        let consumer_app_id = details.consumer_app_id.ok_or_else(|| {
            MetadataError::InvalidResponse(format!("item {} has no consumer_app_id", mod_id))
        })?;

        info!(mod_id, name = %name, consumer_app_id, "Resolved workshop item");
        Ok(ModMetadata { name, consumer_app_id })
    }
}

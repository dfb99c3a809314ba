// SPDX-License-Identifier: GPL-3.0-only
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::metadata::MetadataError;
use crate::mod_installer::{InstallError, ModsService};
use crate::registry::{ServerType, WorkshopMod};

#[derive(Debug, Serialize, Deserialize)]
pub struct InstallModsRequest {
    pub ids: Vec<u64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ServerOnlyRequest {
    pub server_only: bool,
}

#[derive(Debug, Deserialize)]
pub struct ListModsQuery {
    pub filter: Option<ServerType>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(message: String) -> ApiResponse<()> {
        ApiResponse {
            success: false,
            data: None,
            error: Some(message),
        }
    }
}

/// Mod as presented to API clients
#[derive(Debug, Serialize)]
pub struct ModView {
    #[serde(flatten)]
    pub workshop_mod: WorkshopMod,
    pub normalized_name: String,
    pub error_description: Option<&'static str>,
}

impl From<WorkshopMod> for ModView {
    fn from(workshop_mod: WorkshopMod) -> Self {
        Self {
            normalized_name: workshop_mod.normalized_name(),
            error_description: workshop_mod.error_status.map(|e| e.description()),
            workshop_mod,
        }
    }
}

pub type ApiError = (StatusCode, Json<ApiResponse<()>>);
pub type ApiResult<T> = Result<Json<ApiResponse<T>>, ApiError>;

pub fn status_for(error: &InstallError) -> StatusCode {
    match error {
        InstallError::ModNotFound(_) => StatusCode::NOT_FOUND,
        InstallError::Metadata(MetadataError::NotFound(_)) => StatusCode::NOT_FOUND,
        InstallError::Metadata(_) => StatusCode::BAD_GATEWAY,
        InstallError::NotConsumedByGame(_) => StatusCode::BAD_REQUEST,
        InstallError::ServerNotInstalled(_) => StatusCode::CONFLICT,
        InstallError::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn reject(action: &str, e: InstallError) -> ApiError {
    let status = status_for(&e);
    if status.is_server_error() {
        error!(error = %format!("{:#}", e), action, "Request failed");
    } else {
        warn!(error = %e, action, "Request rejected");
    }
    (status, Json(ApiResponse::<()>::error(e.to_string())))
}

pub struct ApiHandlers {
    service: Arc<ModsService>,
}

impl ApiHandlers {
    pub fn new(service: Arc<ModsService>) -> Self {
        Self { service }
    }
}

impl ApiHandlers {
    pub async fn health() -> Json<ApiResponse<&'static str>> {
        Json(ApiResponse::success("ok"))
    }

    pub async fn list_mods(&self, filter: Option<ServerType>) -> ApiResult<Vec<ModView>> {
        let mods = self
            .service
            .list_mods(filter)
            .await
            .map_err(|e| reject("list mods", e))?;
        Ok(Json(ApiResponse::success(mods.into_iter().map(ModView::from).collect())))
    }

    pub async fn get_mod(&self, id: u64) -> ApiResult<ModView> {
        let workshop_mod = self.service.get_mod(id).await.map_err(|e| reject("get mod", e))?;
        Ok(Json(ApiResponse::success(workshop_mod.into())))
    }

    pub async fn install_mods(&self, request: InstallModsRequest) -> ApiResult<Vec<ModView>> {
        info!(ids = ?request.ids, "Install request received");

        let scheduled = self
            .service
            .request_install_or_update(&request.ids)
            .await
            .map_err(|e| reject("install mods", e))?;
        Ok(Json(ApiResponse::success(
            scheduled.mods.into_iter().map(ModView::from).collect(),
        )))
    }

    pub async fn update_all_mods(&self) -> ApiResult<Vec<ModView>> {
        let scheduled = self
            .service
            .update_all_mods()
            .await
            .map_err(|e| reject("update all mods", e))?;
        Ok(Json(ApiResponse::success(
            scheduled.mods.into_iter().map(ModView::from).collect(),
        )))
    }

    pub async fn uninstall_mod(&self, id: u64) -> ApiResult<()> {
        self.service
            .uninstall_mod(id)
            .await
            .map_err(|e| reject("uninstall mod", e))?;
        Ok(Json(ApiResponse::success(())))
    }

    pub async fn set_server_only(&self, id: u64, request: ServerOnlyRequest) -> ApiResult<ModView> {
        let workshop_mod = self
            .service
            .set_mod_server_only(id, request.server_only)
            .await
            .map_err(|e| reject("set server-only", e))?;
        Ok(Json(ApiResponse::success(workshop_mod.into())))
    }

    pub async fn clear_cache(&self) -> ApiResult<()> {
        self.service.clear_cache().await.map_err(|e| reject("clear cache", e))?;
        Ok(Json(ApiResponse::success(())))
    }
}

// SPDX-License-Identifier: GPL-3.0-only
use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;

use crate::api::handlers::{
    ApiHandlers, ApiResponse, ApiResult, InstallModsRequest, ListModsQuery, ModView,
    ServerOnlyRequest,
};
use crate::mod_installer::ModsService;

pub struct HttpServer {
    handlers: ApiHandlers,
    addr: SocketAddr,
}

impl HttpServer {
    pub fn new(service: Arc<ModsService>, addr: SocketAddr) -> Self {
        Self {
            handlers: ApiHandlers::new(service),
            addr,
        }
    }

    pub fn router(handlers: Arc<ApiHandlers>) -> Router {
        Router::new()
            .route("/api/health", get(health_handler))
            .route("/api/mods", get(list_mods_handler))
            .route("/api/mods/:id", get(get_mod_handler))
            .route("/api/mods/install", post(install_mods_handler))
            .route("/api/mods/update-all", post(update_all_handler))
            .route("/api/mods/uninstall/:id", post(uninstall_mod_handler))
            .route("/api/mods/:id/server-only", post(server_only_handler))
            .route("/api/mods/clear-cache", post(clear_cache_handler))
            .with_state(handlers)
    }

    pub async fn serve(self) -> anyhow::Result<()> {
        let app = Self::router(Arc::new(self.handlers));

        info!(addr = %self.addr, "Starting HTTP server");

        let listener = tokio::net::TcpListener::bind(&self.addr).await?;
        axum::serve(listener, app).await?;

        Ok(())
    }
}

async fn health_handler() -> Json<ApiResponse<&'static str>> {
    ApiHandlers::health().await
}

async fn list_mods_handler(
    State(handlers): State<Arc<ApiHandlers>>,
    Query(query): Query<ListModsQuery>,
) -> ApiResult<Vec<ModView>> {
    handlers.list_mods(query.filter).await
}

async fn get_mod_handler(
    State(handlers): State<Arc<ApiHandlers>>,
    Path(id): Path<u64>,
) -> ApiResult<ModView> {
    handlers.get_mod(id).await
}

async fn install_mods_handler(
    State(handlers): State<Arc<ApiHandlers>>,
    Json(request): Json<InstallModsRequest>,
) -> ApiResult<Vec<ModView>> {
    handlers.install_mods(request).await
}

async fn update_all_handler(State(handlers): State<Arc<ApiHandlers>>) -> ApiResult<Vec<ModView>> {
    handlers.update_all_mods().await
}

async fn uninstall_mod_handler(
    State(handlers): State<Arc<ApiHandlers>>,
    Path(id): Path<u64>,
) -> ApiResult<()> {
    handlers.uninstall_mod(id).await
}

async fn server_only_handler(
    State(handlers): State<Arc<ApiHandlers>>,
    Path(id): Path<u64>,
    Json(request): Json<ServerOnlyRequest>,
) -> ApiResult<ModView> {
    handlers.set_server_only(id, request).await
}

async fn clear_cache_handler(State(handlers): State<Arc<ApiHandlers>>) -> ApiResult<()> {
    handlers.clear_cache().await
}

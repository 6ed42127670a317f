use axum::{extract::State, routing::get, Json, Router};

use crate::auth::AdminUser;
use crate::errors::{ErrorResponse, ServiceError};
use crate::services::settings::{SettingsResponse, UpdateSettingsRequest};
use crate::AppState;

pub async fn list_settings(
    State(state): State<AppState>,
) -> Result<Json<Vec<SettingsResponse>>, ServiceError> {
    Ok(Json(state.services.settings.list().await?))
}

/// The settings record, created with defaults when missing
#[utoipa::path(
    get,
    path = "/api/settings/current",
    responses((status = 200, description = "Company settings", body = SettingsResponse)),
    tag = "settings"
)]
pub async fn current_settings(
    State(state): State<AppState>,
) -> Result<Json<SettingsResponse>, ServiceError> {
    Ok(Json(state.services.settings.current().await?))
}

#[utoipa::path(
    put,
    path = "/api/settings/current",
    request_body = UpdateSettingsRequest,
    responses(
        (status = 200, description = "Settings updated", body = SettingsResponse),
        (status = 400, description = "Invalid values", body = ErrorResponse),
        (status = 403, description = "Administrator session required", body = ErrorResponse),
    ),
    tag = "settings"
)]
pub async fn update_settings(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Json(request): Json<UpdateSettingsRequest>,
) -> Result<Json<SettingsResponse>, ServiceError> {
    tracing::info!(admin = %admin.username, "settings update requested");
    Ok(Json(state.services.settings.update(request).await?))
}

pub fn settings_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_settings))
        .route("/current", get(current_settings).put(update_settings))
}

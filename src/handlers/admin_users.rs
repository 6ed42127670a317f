use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Response,
    routing::{get, post},
    Json, Router,
};
use uuid::Uuid;

use super::common::{message_response, MessageResponse};
use crate::auth::AdminUser;
use crate::errors::{ErrorResponse, ServiceError};
use crate::services::accounts::{CreateUserRequest, UpdateRoleRequest, UserSummary};
use crate::AppState;

#[utoipa::path(
    get,
    path = "/api/admin/users",
    responses(
        (status = 200, description = "All accounts", body = [UserSummary]),
        (status = 403, description = "Administrator session required", body = ErrorResponse),
    ),
    tag = "admin"
)]
pub async fn list_users(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> Result<Json<Vec<UserSummary>>, ServiceError> {
    Ok(Json(state.services.accounts.list_users().await?))
}

pub async fn create_user(
    State(state): State<AppState>,
    _admin: AdminUser,
    Json(request): Json<CreateUserRequest>,
) -> Result<Response, ServiceError> {
    state.services.accounts.create_user(request).await?;
    Ok(message_response(
        StatusCode::CREATED,
        "Usuario creado correctamente",
    ))
}

pub async fn update_role(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateRoleRequest>,
) -> Result<Json<MessageResponse>, ServiceError> {
    state
        .services
        .accounts
        .update_role(id, request.is_admin)
        .await?;
    Ok(Json(MessageResponse::new("Rol actualizado correctamente")))
}

pub async fn toggle_active(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<Uuid>,
) -> Result<Json<MessageResponse>, ServiceError> {
    let user = state.services.accounts.toggle_active(id).await?;
    let status = if user.activo { "activo" } else { "inactivo" };
    Ok(Json(MessageResponse::new(format!(
        "Usuario ahora está {}",
        status
    ))))
}

pub fn admin_user_routes() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users).post(create_user))
        .route("/users/:id/update_role", post(update_role))
        .route("/users/:id/toggle_active", post(toggle_active))
}

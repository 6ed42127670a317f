use axum::{
    extract::{Path, Query, State},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use uuid::Uuid;

use super::common::{created_response, SearchParams};
use crate::errors::{ErrorResponse, ServiceError};
use crate::services::clients::{ClientInput, ClientResponse, ClientSummary};
use crate::AppState;

#[utoipa::path(
    get,
    path = "/api/clients",
    responses((status = 200, description = "All clients by name", body = [ClientResponse])),
    tag = "clients"
)]
pub async fn list_clients(State(state): State<AppState>) -> Result<impl IntoResponse, ServiceError> {
    let clients = state.services.clients.list_clients().await?;
    Ok(Json(clients))
}

#[utoipa::path(
    post,
    path = "/api/clients",
    request_body = ClientInput,
    responses(
        (status = 201, description = "Client created", body = ClientResponse),
        (status = 400, description = "Invalid client data", body = ErrorResponse),
    ),
    tag = "clients"
)]
pub async fn create_client(
    State(state): State<AppState>,
    Json(input): Json<ClientInput>,
) -> Result<Response, ServiceError> {
    let client = state.services.clients.create_client(input).await?;
    Ok(created_response(client))
}

pub async fn get_client(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let client = state.services.clients.get_client(id).await?;
    Ok(Json(client))
}

pub async fn update_client(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(input): Json<ClientInput>,
) -> Result<impl IntoResponse, ServiceError> {
    let client = state.services.clients.update_client(id, input).await?;
    Ok(Json(client))
}

#[utoipa::path(
    get,
    path = "/api/clients/search",
    params(SearchParams),
    responses((status = 200, description = "Up to ten matches; empty when q is shorter than two characters", body = [ClientSummary])),
    tag = "clients"
)]
pub async fn search_clients(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<Vec<ClientSummary>>, ServiceError> {
    let hits = state
        .services
        .clients
        .search_clients(params.q.as_deref())
        .await?;
    Ok(Json(hits))
}

pub fn client_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_clients).post(create_client))
        .route("/search", get(search_clients))
        .route("/:id", get(get_client).put(update_client))
}

use axum::{
    extract::{Path, Query, State},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use uuid::Uuid;

use super::common::{created_response, no_content_response, SearchParams};
use crate::auth::AdminUser;
use crate::errors::ServiceError;
use crate::services::sample_catalogs::{CatalogRowInput, CatalogRowResponse};
use crate::AppState;

#[utoipa::path(
    get,
    path = "/api/tipos-muestra",
    responses((status = 200, description = "Sample types", body = [CatalogRowResponse])),
    tag = "catalog"
)]
pub async fn list_tipos(State(state): State<AppState>) -> Result<impl IntoResponse, ServiceError> {
    Ok(Json(state.services.sample_catalogs.list_tipos().await?))
}

pub async fn get_tipo(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    Ok(Json(state.services.sample_catalogs.get_tipo(id).await?))
}

pub async fn search_tipos(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<Vec<CatalogRowResponse>>, ServiceError> {
    Ok(Json(
        state
            .services
            .sample_catalogs
            .search_tipos(params.q.as_deref())
            .await?,
    ))
}

pub async fn create_tipo(
    State(state): State<AppState>,
    _admin: AdminUser,
    Json(input): Json<CatalogRowInput>,
) -> Result<Response, ServiceError> {
    let created = state.services.sample_catalogs.create_tipo(input).await?;
    Ok(created_response(created))
}

pub async fn update_tipo(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<Uuid>,
    Json(input): Json<CatalogRowInput>,
) -> Result<impl IntoResponse, ServiceError> {
    Ok(Json(
        state.services.sample_catalogs.update_tipo(id, input).await?,
    ))
}

pub async fn delete_tipo(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<Uuid>,
) -> Result<Response, ServiceError> {
    state.services.sample_catalogs.delete_tipo(id).await?;
    Ok(no_content_response())
}

pub async fn list_catalogo(State(state): State<AppState>) -> Result<impl IntoResponse, ServiceError> {
    Ok(Json(state.services.sample_catalogs.list_catalogo().await?))
}

pub async fn get_catalogo(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    Ok(Json(state.services.sample_catalogs.get_catalogo(id).await?))
}

pub async fn create_catalogo(
    State(state): State<AppState>,
    _admin: AdminUser,
    Json(input): Json<CatalogRowInput>,
) -> Result<Response, ServiceError> {
    let created = state.services.sample_catalogs.create_catalogo(input).await?;
    Ok(created_response(created))
}

pub async fn update_catalogo(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<Uuid>,
    Json(input): Json<CatalogRowInput>,
) -> Result<impl IntoResponse, ServiceError> {
    Ok(Json(
        state
            .services
            .sample_catalogs
            .update_catalogo(id, input)
            .await?,
    ))
}

pub async fn delete_catalogo(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<Uuid>,
) -> Result<Response, ServiceError> {
    state.services.sample_catalogs.delete_catalogo(id).await?;
    Ok(no_content_response())
}

pub fn tipo_muestra_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_tipos).post(create_tipo))
        .route("/search", get(search_tipos))
        .route("/:id", get(get_tipo).put(update_tipo).delete(delete_tipo))
}

pub fn catalogo_analisis_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_catalogo).post(create_catalogo))
        .route(
            "/:id",
            get(get_catalogo)
                .put(update_catalogo)
                .delete(delete_catalogo),
        )
}

//! Parameters, methods and techniques. Reads are public; writes need an
//! administrator session.

use axum::{
    extract::{Path, State},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use uuid::Uuid;

use super::common::{created_response, no_content_response};
use crate::auth::AdminUser;
use crate::entities::Category;
use crate::errors::{ErrorResponse, ServiceError};
use crate::services::catalog::{
    CatalogEntryInput, CatalogEntryResponse, ParameterInput, ParameterResponse,
};
use crate::AppState;

fn parse_category(raw: &str) -> Result<Category, ServiceError> {
    raw.parse().map_err(ServiceError::ValidationError)
}

// Parameters

#[utoipa::path(
    get,
    path = "/api/parameters",
    responses((status = 200, description = "All parameters", body = [ParameterResponse])),
    tag = "catalog"
)]
pub async fn list_parameters(State(state): State<AppState>) -> Result<impl IntoResponse, ServiceError> {
    Ok(Json(state.services.catalog.list_parameters().await?))
}

#[utoipa::path(
    get,
    path = "/api/parameters/by-category/{category}",
    params(("category" = String, Path, description = "agua, emisiones, ruido or logistica")),
    responses(
        (status = 200, description = "Active parameters of the category", body = [ParameterResponse]),
        (status = 400, description = "Unknown category", body = ErrorResponse),
    ),
    tag = "catalog"
)]
pub async fn parameters_by_category(
    State(state): State<AppState>,
    Path(category): Path<String>,
) -> Result<impl IntoResponse, ServiceError> {
    let category = parse_category(&category)?;
    Ok(Json(
        state.services.catalog.parameters_by_category(category).await?,
    ))
}

pub async fn get_parameter(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    Ok(Json(state.services.catalog.get_parameter(id).await?))
}

#[utoipa::path(
    post,
    path = "/api/parameters",
    request_body = ParameterInput,
    responses(
        (status = 201, description = "Parameter created", body = ParameterResponse),
        (status = 403, description = "Administrator session required", body = ErrorResponse),
    ),
    tag = "catalog"
)]
pub async fn create_parameter(
    State(state): State<AppState>,
    _admin: AdminUser,
    Json(input): Json<ParameterInput>,
) -> Result<Response, ServiceError> {
    let created = state.services.catalog.create_parameter(input).await?;
    Ok(created_response(created))
}

pub async fn update_parameter(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<Uuid>,
    Json(input): Json<ParameterInput>,
) -> Result<impl IntoResponse, ServiceError> {
    Ok(Json(state.services.catalog.update_parameter(id, input).await?))
}

pub async fn delete_parameter(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<Uuid>,
) -> Result<Response, ServiceError> {
    state.services.catalog.delete_parameter(id).await?;
    Ok(no_content_response())
}

// Methods

pub async fn list_methods(State(state): State<AppState>) -> Result<impl IntoResponse, ServiceError> {
    Ok(Json(state.services.catalog.list_methods().await?))
}

pub async fn methods_by_category(
    State(state): State<AppState>,
    Path(category): Path<String>,
) -> Result<Json<Vec<CatalogEntryResponse>>, ServiceError> {
    let category = parse_category(&category)?;
    Ok(Json(state.services.catalog.methods_by_category(category).await?))
}

pub async fn get_method(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    Ok(Json(state.services.catalog.get_method(id).await?))
}

pub async fn create_method(
    State(state): State<AppState>,
    _admin: AdminUser,
    Json(input): Json<CatalogEntryInput>,
) -> Result<Response, ServiceError> {
    let created = state.services.catalog.create_method(input).await?;
    Ok(created_response(created))
}

pub async fn update_method(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<Uuid>,
    Json(input): Json<CatalogEntryInput>,
) -> Result<impl IntoResponse, ServiceError> {
    Ok(Json(state.services.catalog.update_method(id, input).await?))
}

pub async fn delete_method(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<Uuid>,
) -> Result<Response, ServiceError> {
    state.services.catalog.delete_method(id).await?;
    Ok(no_content_response())
}

// Techniques

pub async fn list_techniques(State(state): State<AppState>) -> Result<impl IntoResponse, ServiceError> {
    Ok(Json(state.services.catalog.list_techniques().await?))
}

pub async fn techniques_by_category(
    State(state): State<AppState>,
    Path(category): Path<String>,
) -> Result<Json<Vec<CatalogEntryResponse>>, ServiceError> {
    let category = parse_category(&category)?;
    Ok(Json(
        state.services.catalog.techniques_by_category(category).await?,
    ))
}

pub async fn get_technique(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    Ok(Json(state.services.catalog.get_technique(id).await?))
}

pub async fn create_technique(
    State(state): State<AppState>,
    _admin: AdminUser,
    Json(input): Json<CatalogEntryInput>,
) -> Result<Response, ServiceError> {
    let created = state.services.catalog.create_technique(input).await?;
    Ok(created_response(created))
}

pub async fn update_technique(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<Uuid>,
    Json(input): Json<CatalogEntryInput>,
) -> Result<impl IntoResponse, ServiceError> {
    Ok(Json(state.services.catalog.update_technique(id, input).await?))
}

pub async fn delete_technique(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<Uuid>,
) -> Result<Response, ServiceError> {
    state.services.catalog.delete_technique(id).await?;
    Ok(no_content_response())
}

pub fn parameter_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_parameters).post(create_parameter))
        .route("/by-category/:category", get(parameters_by_category))
        .route(
            "/:id",
            get(get_parameter)
                .put(update_parameter)
                .delete(delete_parameter),
        )
}

pub fn method_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_methods).post(create_method))
        .route("/by-category/:category", get(methods_by_category))
        .route(
            "/:id",
            get(get_method).put(update_method).delete(delete_method),
        )
}

pub fn technique_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_techniques).post(create_technique))
        .route("/by-category/:category", get(techniques_by_category))
        .route(
            "/:id",
            get(get_technique)
                .put(update_technique)
                .delete(delete_technique),
        )
}

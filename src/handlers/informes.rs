use axum::{
    extract::{Path, State},
    response::Response,
    routing::get,
    Json, Router,
};
use uuid::Uuid;

use super::common::{created_response, html_response};
use crate::errors::{ErrorResponse, ServiceError};
use crate::services::reports::{CreateInformeRequest, InformeResponse, ResultadoResponse};
use crate::AppState;

pub async fn list_informes(
    State(state): State<AppState>,
) -> Result<Json<Vec<InformeResponse>>, ServiceError> {
    Ok(Json(state.services.reports.list_informes().await?))
}

/// Creates the informe of a proforma together with its result rows
#[utoipa::path(
    post,
    path = "/api/informes",
    request_body = CreateInformeRequest,
    responses(
        (status = 201, description = "Informe created", body = InformeResponse),
        (status = 400, description = "The proforma already has an informe, or a row is invalid", body = ErrorResponse),
        (status = 404, description = "Proforma not found", body = ErrorResponse),
    ),
    tag = "informes"
)]
pub async fn create_informe(
    State(state): State<AppState>,
    Json(request): Json<CreateInformeRequest>,
) -> Result<Response, ServiceError> {
    let informe = state.services.reports.create_informe(request).await?;
    Ok(created_response(informe))
}

pub async fn get_informe(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<InformeResponse>, ServiceError> {
    Ok(Json(state.services.reports.get_informe(id).await?))
}

pub async fn list_resultados(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<ResultadoResponse>>, ServiceError> {
    Ok(Json(state.services.reports.list_resultados(id).await?))
}

pub async fn preview_informe(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Response, ServiceError> {
    let html = state.services.reports.preview_html(id).await?;
    Ok(html_response(html))
}

pub fn informe_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_informes).post(create_informe))
        .route("/:id", get(get_informe))
        .route("/:id/resultados", get(list_resultados))
        .route("/:id/preview", get(preview_informe))
}

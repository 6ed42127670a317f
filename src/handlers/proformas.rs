use axum::{
    extract::{Path, Query, State},
    response::Response,
    routing::{delete, get, post},
    Json, Router,
};
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;

use super::common::{created_response, html_response, no_content_response, pdf_response};
use crate::auth::AuthUser;
use crate::errors::{ErrorResponse, ServiceError};
use crate::services::quotation::{
    AnalysisResponse, CreateProformaRequest, InformeSummaryResponse, LineItemInput,
    ProformaDetail, ProformaListQuery, ProformaSummary, StatusRequest,
};
use crate::AppState;

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct RemoveAnalysisRequest {
    pub analysis_id: Option<Uuid>,
}

#[utoipa::path(
    get,
    path = "/api/proformas",
    params(ProformaListQuery),
    responses((status = 200, description = "Proformas, newest first", body = [ProformaSummary])),
    tag = "proformas"
)]
pub async fn list_proformas(
    State(state): State<AppState>,
    Query(query): Query<ProformaListQuery>,
) -> Result<Json<Vec<ProformaSummary>>, ServiceError> {
    Ok(Json(state.services.quotation.list_proformas(query).await?))
}

/// Creates a proforma with its lines in one transaction. The creator is
/// taken from the session when there is one.
#[utoipa::path(
    post,
    path = "/api/proformas",
    request_body = CreateProformaRequest,
    responses(
        (status = 201, description = "Proforma created with its number and totals", body = ProformaDetail),
        (status = 400, description = "Invalid client, catalog reference or line", body = ErrorResponse),
        (status = 409, description = "Proforma counter contended", body = ErrorResponse),
    ),
    tag = "proformas"
)]
pub async fn create_proforma(
    State(state): State<AppState>,
    user: Option<AuthUser>,
    Json(request): Json<CreateProformaRequest>,
) -> Result<Response, ServiceError> {
    let created_by = user.map(|u| u.username);
    let proforma = state
        .services
        .quotation
        .create_proforma(request, created_by)
        .await?;
    Ok(created_response(proforma))
}

#[utoipa::path(
    get,
    path = "/api/proformas/{id}",
    params(("id" = Uuid, Path, description = "Proforma id")),
    responses(
        (status = 200, description = "Proforma with its lines", body = ProformaDetail),
        (status = 404, description = "Not found", body = ErrorResponse),
    ),
    tag = "proformas"
)]
pub async fn get_proforma(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ProformaDetail>, ServiceError> {
    Ok(Json(state.services.quotation.get_proforma(id).await?))
}

pub async fn delete_proforma(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Response, ServiceError> {
    state.services.quotation.delete_proforma(id).await?;
    Ok(no_content_response())
}

pub async fn update_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<StatusRequest>,
) -> Result<Json<ProformaSummary>, ServiceError> {
    Ok(Json(
        state
            .services
            .quotation
            .update_status(id, request.status)
            .await?,
    ))
}

#[utoipa::path(
    post,
    path = "/api/proformas/{id}/add_analysis",
    params(("id" = Uuid, Path, description = "Proforma id")),
    request_body = LineItemInput,
    responses(
        (status = 201, description = "Line appended; totals recalculated", body = AnalysisResponse),
        (status = 404, description = "Proforma not found", body = ErrorResponse),
    ),
    tag = "proformas"
)]
pub async fn add_analysis(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(item): Json<LineItemInput>,
) -> Result<Response, ServiceError> {
    let line = state.services.quotation.add_line_item(id, item).await?;
    Ok(created_response(line))
}

/// Body is `{analysis_id}`; a missing body or id is a 400 once the
/// proforma is known to exist.
pub async fn remove_analysis(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    body: Option<Json<RemoveAnalysisRequest>>,
) -> Result<Json<ProformaDetail>, ServiceError> {
    let analysis_id = body.and_then(|Json(body)| body.analysis_id);
    Ok(Json(
        state
            .services
            .quotation
            .remove_line_item(id, analysis_id)
            .await?,
    ))
}

pub async fn proforma_pdf(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Response, ServiceError> {
    let file = state.services.quotation.proforma_pdf(id).await?;
    Ok(pdf_response(file))
}

pub async fn informe_summary(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<InformeSummaryResponse>, ServiceError> {
    Ok(Json(state.services.quotation.informe_summary(id).await?))
}

pub async fn informe_pdf(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Response, ServiceError> {
    let file = state.services.reports.informe_pdf_for_proforma(id).await?;
    Ok(pdf_response(file))
}

pub async fn preview_proforma(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Response, ServiceError> {
    let html = state.services.quotation.preview_html(id).await?;
    Ok(html_response(html))
}

/// Renders an unsaved proforma without consuming a number
pub async fn preview_draft(
    State(state): State<AppState>,
    Json(request): Json<CreateProformaRequest>,
) -> Result<Response, ServiceError> {
    let html = state.services.quotation.preview_draft(request).await?;
    Ok(html_response(html))
}

pub fn proforma_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_proformas).post(create_proforma))
        .route("/preview", post(preview_draft))
        .route("/:id", get(get_proforma).delete(delete_proforma))
        .route("/:id/status", post(update_status))
        .route("/:id/add_analysis", post(add_analysis))
        .route("/:id/remove_analysis", delete(remove_analysis))
        .route("/:id/pdf", get(proforma_pdf))
        .route("/:id/informe", get(informe_summary))
        .route("/:id/informe_pdf", get(informe_pdf))
        .route("/:id/preview", get(preview_proforma))
}

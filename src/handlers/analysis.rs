use axum::{
    extract::{Path, Query, State},
    response::Response,
    routing::{get, post, put},
    Json, Router,
};
use uuid::Uuid;

use super::common::{created_response, no_content_response, MessageResponse};
use crate::errors::{ErrorResponse, ServiceError};
use crate::services::quotation::{
    AnalysisResponse, LineItemListQuery, NewAnalysisRequest, ReorderRequest,
    UpdateLineItemRequest,
};
use crate::AppState;

pub async fn list_analyses(
    State(state): State<AppState>,
    Query(query): Query<LineItemListQuery>,
) -> Result<Json<Vec<AnalysisResponse>>, ServiceError> {
    Ok(Json(state.services.quotation.list_line_items(query).await?))
}

pub async fn get_analysis(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<AnalysisResponse>, ServiceError> {
    Ok(Json(state.services.quotation.get_line_item(id).await?))
}

pub async fn create_analysis(
    State(state): State<AppState>,
    Json(request): Json<NewAnalysisRequest>,
) -> Result<Response, ServiceError> {
    let line = state.services.quotation.create_line_item(request).await?;
    Ok(created_response(line))
}

#[utoipa::path(
    put,
    path = "/api/analysis/{id}",
    params(("id" = Uuid, Path, description = "Analysis line id")),
    request_body = UpdateLineItemRequest,
    responses(
        (status = 200, description = "Line updated; subtotal and proforma totals recalculated", body = AnalysisResponse),
        (status = 400, description = "Invalid values or category mismatch", body = ErrorResponse),
        (status = 404, description = "Line not found", body = ErrorResponse),
    ),
    tag = "analysis"
)]
pub async fn update_analysis(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateLineItemRequest>,
) -> Result<Json<AnalysisResponse>, ServiceError> {
    Ok(Json(
        state
            .services
            .quotation
            .update_line_item(id, request)
            .await?,
    ))
}

pub async fn delete_analysis(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Response, ServiceError> {
    state.services.quotation.delete_line_item(id).await?;
    Ok(no_content_response())
}

#[utoipa::path(
    post,
    path = "/api/analysis/reorder",
    request_body = ReorderRequest,
    responses((status = 200, description = "Known ids reordered, unknown ids ignored", body = MessageResponse)),
    tag = "analysis"
)]
pub async fn reorder_analyses(
    State(state): State<AppState>,
    Json(request): Json<ReorderRequest>,
) -> Result<Json<MessageResponse>, ServiceError> {
    state.services.quotation.reorder_line_items(request).await?;
    Ok(Json(MessageResponse::new("Orden actualizado exitosamente")))
}

pub fn analysis_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_analyses).post(create_analysis))
        .route("/reorder", post(reorder_analyses))
        .route(
            "/:id",
            put(update_analysis).get(get_analysis).delete(delete_analysis),
        )
}

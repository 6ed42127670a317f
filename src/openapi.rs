use axum::Json;
use utoipa::openapi::security::{ApiKey, ApiKeyValue, HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

/// Registers the two ways a session token travels: the `session` cookie and a bearer header.
struct SessionAuth;

impl Modify for SessionAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "session_cookie",
                SecurityScheme::ApiKey(ApiKey::Cookie(ApiKeyValue::new(
                    crate::auth::SESSION_COOKIE,
                ))),
            );
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .build(),
                ),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Environovalab API",
        version = "1.0.0",
        description = r#"
# Environovalab back office

Client registry, analysis catalog, quotations (proformas) with automatic
numbering and totals, lab reports (informes) and their rendered documents.

## Authentication

`POST /api/login` returns a session token and sets the `session_id` cookie.
Either the cookie or `Authorization: Bearer <token>` is accepted on the
endpoints that require a session. User management and catalog writes need
an administrator session.

## Errors

Failures carry a JSON body with `error` and `message` fields. Validation failures
answer 400, missing records 404, missing sessions 401, non-admin sessions 403.
        "#,
    ),
    modifiers(&SessionAuth),
    tags(
        (name = "auth", description = "Registration, login and password recovery"),
        (name = "clients", description = "Client registry"),
        (name = "catalog", description = "Parameters, methods and techniques"),
        (name = "sample-catalogs", description = "Sample types and analysis catalog"),
        (name = "settings", description = "Company settings and tax rate"),
        (name = "proformas", description = "Quotations"),
        (name = "analysis", description = "Quotation line items"),
        (name = "informes", description = "Lab reports"),
        (name = "admin", description = "User administration"),
        (name = "health", description = "Health checks")
    ),
    paths(
        crate::handlers::auth::register,
        crate::handlers::auth::login,
        crate::handlers::auth::logout,
        crate::handlers::clients::list_clients,
        crate::handlers::clients::create_client,
        crate::handlers::clients::search_clients,
        crate::handlers::catalog::list_parameters,
        crate::handlers::catalog::parameters_by_category,
        crate::handlers::catalog::create_parameter,
        crate::handlers::sample_catalogs::list_tipos,
        crate::handlers::settings::current_settings,
        crate::handlers::settings::update_settings,
        crate::handlers::proformas::list_proformas,
        crate::handlers::proformas::create_proforma,
        crate::handlers::proformas::get_proforma,
        crate::handlers::proformas::add_analysis,
        crate::handlers::analysis::update_analysis,
        crate::handlers::analysis::reorder_analyses,
        crate::handlers::informes::create_informe,
        crate::handlers::admin_users::list_users,
        crate::handlers::health::health_check,
    ),
    components(
        schemas(
            crate::errors::ErrorResponse,
            crate::handlers::common::MessageResponse,
            crate::entities::Category,
            crate::entities::ProformaStatus,
            crate::services::accounts::RegisterRequest,
            crate::services::accounts::LoginRequest,
            crate::services::accounts::LoginResponse,
            crate::services::accounts::ForgotPasswordRequest,
            crate::services::accounts::ResetPasswordRequest,
            crate::services::accounts::CreateUserRequest,
            crate::services::accounts::UpdateRoleRequest,
            crate::services::accounts::UserSummary,
            crate::services::clients::ClientInput,
            crate::services::clients::ClientResponse,
            crate::services::clients::ClientSummary,
            crate::services::catalog::ParameterInput,
            crate::services::catalog::ParameterResponse,
            crate::services::catalog::CatalogEntryInput,
            crate::services::catalog::CatalogEntryResponse,
            crate::services::sample_catalogs::CatalogRowInput,
            crate::services::sample_catalogs::CatalogRowResponse,
            crate::services::settings::UpdateSettingsRequest,
            crate::services::settings::SettingsResponse,
            crate::services::quotation::LineItemInput,
            crate::services::quotation::CreateProformaRequest,
            crate::services::quotation::UpdateLineItemRequest,
            crate::services::quotation::NewAnalysisRequest,
            crate::services::quotation::AnalysisOrder,
            crate::services::quotation::ReorderRequest,
            crate::services::quotation::StatusRequest,
            crate::services::quotation::AnalysisResponse,
            crate::services::quotation::ProformaSummary,
            crate::services::quotation::ProformaDetail,
            crate::services::quotation::InformeAnalysisData,
            crate::services::quotation::InformeSummaryResponse,
            crate::services::reports::ResultadoInput,
            crate::services::reports::CreateInformeRequest,
            crate::services::reports::ResultadoResponse,
            crate::services::reports::InformeResponse,
            crate::handlers::proformas::RemoveAnalysisRequest,
            crate::handlers::health::HealthResponse,
            crate::handlers::health::ComponentHealth,
            crate::handlers::health::ComponentStatus,
        )
    )
)]
pub struct ApiDoc;

/// Serves the generated document at `/api-docs/openapi.json`
pub async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

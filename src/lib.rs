//! Environovalab back office API
//!
//! Client registry, analysis catalog, quotations with numbering and totals,
//! lab reports and their rendered documents.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod auth;
pub mod config;
pub mod db;
pub mod documents;
pub mod entities;
pub mod errors;
pub mod handlers;
pub mod middleware_helpers;
pub mod migrator;
pub mod money;
pub mod openapi;
pub mod services;
pub mod tracing;

use std::sync::Arc;

use axum::{
    http::{header, HeaderName, HeaderValue, Method},
    routing::get,
    Router,
};
use tower_cookies::CookieManagerLayer;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::config::AppConfig;
use crate::db::DbPool;
use crate::services::mailer::Mailer;

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DbPool>,
    pub config: Arc<AppConfig>,
    pub services: handlers::AppServices,
}

impl AppState {
    pub fn new(db: DbPool, config: AppConfig, mailer: Arc<dyn Mailer>) -> Self {
        let db = Arc::new(db);
        let services = handlers::AppServices::new(db.clone(), &config, mailer);
        Self {
            db,
            config: Arc::new(config),
            services,
        }
    }
}

/// Every `/api` route
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .merge(handlers::auth::auth_routes())
        .nest("/clients", handlers::clients::client_routes())
        .nest("/parameters", handlers::catalog::parameter_routes())
        .nest("/methods", handlers::catalog::method_routes())
        .nest("/techniques", handlers::catalog::technique_routes())
        .nest("/tipos-muestra", handlers::sample_catalogs::tipo_muestra_routes())
        .nest(
            "/catalogo-analisis",
            handlers::sample_catalogs::catalogo_analisis_routes(),
        )
        .nest("/settings", handlers::settings::settings_routes())
        .nest("/proformas", handlers::proformas::proforma_routes())
        .nest("/analysis", handlers::analysis::analysis_routes())
        .nest("/informes", handlers::informes::informe_routes())
        .nest("/admin", handlers::admin_users::admin_user_routes())
}

fn cors_layer(config: &AppConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .cors_origins()
        .iter()
        .filter_map(|origin| HeaderValue::from_str(origin).ok())
        .collect();

    if origins.is_empty() {
        ::tracing::info!("Using permissive CORS because explicit origins were not configured");
        return CorsLayer::permissive();
    }

    // Cookies need credentials, which rule out wildcard methods and headers
    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            HeaderName::from_static(middleware_helpers::request_id::REQUEST_ID_HEADER),
        ])
        .allow_credentials(true)
}

/// Full application router with its middleware stack
pub fn app_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config);

    Router::new()
        .route("/", get(|| async { "environovalab-api up" }))
        .nest("/api", api_routes())
        .nest("/health", handlers::health::health_routes())
        .route("/api-docs/openapi.json", get(openapi::openapi_json))
        .layer(CookieManagerLayer::new())
        .layer(TraceLayer::new_for_http().make_span_with(crate::tracing::RequestSpanMaker))
        .layer(cors)
        // Ensure every request carries a request id for traceability
        .layer(axum::middleware::from_fn(
            middleware_helpers::request_id::request_id_middleware,
        ))
        .with_state(state)
}

pub mod admin_users;
pub mod analysis;
pub mod auth;
pub mod catalog;
pub mod clients;
pub mod common;
pub mod health;
pub mod informes;
pub mod proformas;
pub mod sample_catalogs;
pub mod settings;

use std::sync::Arc;

use crate::config::AppConfig;
use crate::db::DbPool;
use crate::documents::DocumentRenderer;
use crate::services::{
    accounts::AccountService, catalog::CatalogService, clients::ClientService, mailer::Mailer,
    quotation::QuotationService, reports::ReportService, sample_catalogs::SampleCatalogService,
    settings::SettingsService,
};

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub clients: Arc<ClientService>,
    pub catalog: Arc<CatalogService>,
    pub sample_catalogs: Arc<SampleCatalogService>,
    pub settings: Arc<SettingsService>,
    pub quotation: Arc<QuotationService>,
    pub reports: Arc<ReportService>,
    pub accounts: Arc<AccountService>,
}

impl AppServices {
    pub fn new(db_pool: Arc<DbPool>, config: &AppConfig, mailer: Arc<dyn Mailer>) -> Self {
        let renderer = DocumentRenderer::new(config.documents_dir());
        let generate_on_write = config.generate_documents_on_write;

        Self {
            clients: Arc::new(ClientService::new(db_pool.clone())),
            catalog: Arc::new(CatalogService::new(db_pool.clone())),
            sample_catalogs: Arc::new(SampleCatalogService::new(db_pool.clone())),
            settings: Arc::new(SettingsService::new(db_pool.clone())),
            quotation: Arc::new(QuotationService::new(
                db_pool.clone(),
                renderer.clone(),
                generate_on_write,
            )),
            reports: Arc::new(ReportService::new(
                db_pool.clone(),
                renderer,
                generate_on_write,
            )),
            accounts: Arc::new(AccountService::new(db_pool, mailer, config)),
        }
    }
}

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::{
    body::{self, Body},
    http::{Method, Request},
    response::Response,
    Router,
};
use environovalab_api::{
    app_router,
    config::AppConfig,
    db,
    errors::ServiceError,
    services::mailer::{Mailer, OutgoingMail},
    AppState,
};
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

pub const ADMIN_USERNAME: &str = "admin";
pub const ADMIN_PASSWORD: &str = "admin-pass-123";

/// Keeps every message instead of delivering it.
#[derive(Default, Clone)]
pub struct RecordingMailer {
    sent: Arc<Mutex<Vec<OutgoingMail>>>,
}

impl RecordingMailer {
    pub fn sent(&self) -> Vec<OutgoingMail> {
        self.sent.lock().expect("mailer lock").clone()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, mail: OutgoingMail) -> Result<(), ServiceError> {
        self.sent.lock().expect("mailer lock").push(mail);
        Ok(())
    }
}

/// Application router backed by a throwaway SQLite file.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    pub mailer: RecordingMailer,
    _dir: TempDir,
}

impl TestApp {
    pub async fn new() -> Self {
        let dir = tempfile::tempdir().expect("temp dir");
        let db_path = dir.path().join("environovalab_test.db");

        let mut cfg = AppConfig::new(
            format!("sqlite://{}?mode=rwc", db_path.display()),
            "127.0.0.1".to_string(),
            18_080,
            "test".to_string(),
        );
        cfg.db_max_connections = 1;
        cfg.db_min_connections = 1;
        cfg.generate_documents_on_write = false;
        cfg.documents_output_dir = dir.path().join("documents").display().to_string();
        cfg.frontend_url = "http://front.test".to_string();

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");

        let mailer = RecordingMailer::default();
        let state = AppState::new(pool, cfg, Arc::new(mailer.clone()));
        state
            .services
            .settings
            .ensure_provisioned()
            .await
            .expect("provision settings");

        Self {
            router: app_router(state.clone()),
            state,
            mailer,
            _dir: dir,
        }
    }

    /// Send a request against the router with an optional bearer token.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);

        if let Some(tok) = token {
            builder = builder.header("authorization", format!("Bearer {}", tok));
        }

        let body = if let Some(json) = body {
            builder = builder.header("content-type", "application/json");
            Body::from(serde_json::to_vec(&json).expect("failed to serialize json request body"))
        } else {
            Body::empty()
        };

        let request = builder.body(body).expect("failed to build request");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }

    /// Provisions the default administrator and returns its session token.
    pub async fn admin_token(&self) -> String {
        self.state
            .services
            .accounts
            .ensure_admin(ADMIN_USERNAME, "admin@lab.test", ADMIN_PASSWORD)
            .await
            .expect("provision admin");
        self.login(ADMIN_USERNAME, ADMIN_PASSWORD).await
    }

    pub async fn login(&self, username: &str, password: &str) -> String {
        let response = self
            .request(
                Method::POST,
                "/api/login",
                Some(json!({ "username": username, "password": password })),
                None,
            )
            .await;
        assert_eq!(response.status(), 200, "login failed for {}", username);
        let body = response_json(response).await;
        body["token"].as_str().expect("token in login response").to_string()
    }

    pub async fn seed_client(&self, name: &str) -> Value {
        let response = self
            .request(
                Method::POST,
                "/api/clients",
                Some(json!({ "name": name, "ruc": "1790012345001", "contact_person": "Ana" })),
                None,
            )
            .await;
        assert_eq!(response.status(), 201);
        response_json(response).await
    }

    /// Creates a parameter and a method in the same category.
    pub async fn seed_catalog(
        &self,
        token: &str,
        parameter: &str,
        price: &str,
        unit: &str,
    ) -> (String, String) {
        let response = self
            .request(
                Method::POST,
                "/api/parameters",
                Some(json!({
                    "name": parameter,
                    "category": "agua",
                    "default_unit": unit,
                    "default_price": price
                })),
                Some(token),
            )
            .await;
        assert_eq!(response.status(), 201);
        let parameter = response_json(response).await;

        let response = self
            .request(
                Method::POST,
                "/api/methods",
                Some(json!({
                    "name": format!("Método {}", parameter["name"].as_str().unwrap_or_default()),
                    "category": "agua"
                })),
                Some(token),
            )
            .await;
        assert_eq!(response.status(), 201);
        let method = response_json(response).await;

        (
            parameter["id"].as_str().expect("parameter id").to_string(),
            method["id"].as_str().expect("method id").to_string(),
        )
    }

    /// Creates a method or technique (`kind` is the collection path) and returns its id.
    pub async fn seed_entry(&self, token: &str, kind: &str, name: &str, category: &str) -> String {
        let response = self
            .request(
                Method::POST,
                &format!("/api/{}", kind),
                Some(json!({ "name": name, "category": category })),
                Some(token),
            )
            .await;
        assert_eq!(response.status(), 201, "creating {} {}", kind, name);
        response_json(response).await["id"]
            .as_str()
            .expect("entry id")
            .to_string()
    }
}

pub async fn response_json(response: Response) -> Value {
    let bytes = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body bytes");
    serde_json::from_slice(&bytes).expect("json response")
}

pub async fn response_bytes(response: Response) -> Vec<u8> {
    body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body bytes")
        .to_vec()
}

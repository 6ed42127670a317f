//! Account lifecycle over HTTP: registration, login, admin gating,
//! deactivation and password recovery.

mod common;

use axum::http::{header, Method};
use common::{response_json, TestApp};
use serde_json::json;

async fn register(app: &TestApp, username: &str, email: &str) -> axum::response::Response {
    app.request(
        Method::POST,
        "/api/register",
        Some(json!({ "username": username, "password": "secret-123", "email": email })),
        None,
    )
    .await
}

#[tokio::test]
async fn register_then_login_sets_session_cookie() {
    let app = TestApp::new().await;

    let response = register(&app, "maria", "maria@lab.test").await;
    assert_eq!(response.status(), 201);
    assert_eq!(response_json(response).await["msg"], "Usuario creado correctamente");

    let response = app
        .request(
            Method::POST,
            "/api/login",
            Some(json!({ "username": "maria", "password": "secret-123" })),
            None,
        )
        .await;
    assert_eq!(response.status(), 200);
    let cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    assert!(cookie.starts_with("session_id="));
    assert!(cookie.contains("HttpOnly"));

    let body = response_json(response).await;
    assert_eq!(body["username"], "maria");
    assert_eq!(body["is_admin"], false);
    assert!(!body["token"].as_str().unwrap_or_default().is_empty());
}

#[tokio::test]
async fn duplicate_and_incomplete_registrations_are_rejected() {
    let app = TestApp::new().await;
    assert_eq!(register(&app, "maria", "maria@lab.test").await.status(), 201);

    let response = register(&app, "maria", "other@lab.test").await;
    assert_eq!(response.status(), 400);
    assert_eq!(response_json(response).await["message"], "Usuario ya existe");

    let response = register(&app, "pedro", "maria@lab.test").await;
    assert_eq!(response.status(), 400);
    assert_eq!(response_json(response).await["message"], "Email ya está en uso");

    let response = app
        .request(Method::POST, "/api/register", Some(json!({ "username": "x" })), None)
        .await;
    assert_eq!(response.status(), 400);
    assert_eq!(response_json(response).await["message"], "Faltan campos requeridos");
}

#[tokio::test]
async fn wrong_password_is_a_bad_request() {
    let app = TestApp::new().await;
    register(&app, "maria", "maria@lab.test").await;

    let response = app
        .request(
            Method::POST,
            "/api/login",
            Some(json!({ "username": "maria", "password": "nope" })),
            None,
        )
        .await;
    assert_eq!(response.status(), 400);
    assert_eq!(response_json(response).await["message"], "Credenciales incorrectas");
}

#[tokio::test]
async fn admin_routes_refuse_anonymous_and_regular_users() {
    let app = TestApp::new().await;
    register(&app, "maria", "maria@lab.test").await;
    let token = app.login("maria", "secret-123").await;

    let anonymous = app.request(Method::GET, "/api/admin/users", None, None).await;
    assert_eq!(anonymous.status(), 403);

    let regular = app
        .request(Method::GET, "/api/admin/users", None, Some(&token))
        .await;
    assert_eq!(regular.status(), 403);

    let admin = app.admin_token().await;
    let response = app
        .request(Method::GET, "/api/admin/users", None, Some(&admin))
        .await;
    assert_eq!(response.status(), 200);
    let users = response_json(response).await;
    assert_eq!(users.as_array().map(Vec::len), Some(2));
}

#[tokio::test]
async fn deactivated_user_cannot_log_in_and_loses_sessions() {
    let app = TestApp::new().await;
    register(&app, "maria", "maria@lab.test").await;
    let maria_token = app.login("maria", "secret-123").await;
    let admin = app.admin_token().await;

    let users = response_json(
        app.request(Method::GET, "/api/admin/users", None, Some(&admin))
            .await,
    )
    .await;
    let maria_id = users
        .as_array()
        .and_then(|list| list.iter().find(|u| u["username"] == "maria"))
        .and_then(|u| u["id"].as_str())
        .expect("maria listed")
        .to_string();

    let response = app
        .request(
            Method::POST,
            &format!("/api/admin/users/{}/toggle_active", maria_id),
            None,
            Some(&admin),
        )
        .await;
    assert_eq!(response.status(), 200);
    assert_eq!(response_json(response).await["msg"], "Usuario ahora está inactivo");

    let response = app
        .request(
            Method::POST,
            "/api/login",
            Some(json!({ "username": "maria", "password": "secret-123" })),
            None,
        )
        .await;
    assert_eq!(response.status(), 403);
    assert_eq!(
        response_json(response).await["message"],
        "Cuenta inactiva. Contacta con el administrador."
    );

    // The session opened before deactivation is gone
    assert!(app
        .state
        .services
        .accounts
        .resolve_session(&maria_token)
        .await
        .is_err());
}

#[tokio::test]
async fn logout_always_succeeds() {
    let app = TestApp::new().await;
    register(&app, "maria", "maria@lab.test").await;
    let token = app.login("maria", "secret-123").await;

    let response = app.request(Method::POST, "/api/logout", None, Some(&token)).await;
    assert_eq!(response.status(), 200);
    assert_eq!(response_json(response).await["msg"], "Sesión cerrada");
    assert!(app.state.services.accounts.resolve_session(&token).await.is_err());

    let response = app.request(Method::POST, "/api/logout", None, None).await;
    assert_eq!(response.status(), 200);
}

#[tokio::test]
async fn reset_token_is_single_use() {
    let app = TestApp::new().await;
    register(&app, "maria", "maria@lab.test").await;

    let response = app
        .request(
            Method::POST,
            "/api/forgot-password",
            Some(json!({ "email": "maria@lab.test" })),
            None,
        )
        .await;
    assert_eq!(response.status(), 200);

    let sent = app.mailer.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, "maria@lab.test");
    let prefix = "http://front.test/reset-password/";
    let start = sent[0].body.find(prefix).expect("reset link in body") + prefix.len();
    let token: String = sent[0].body[start..]
        .chars()
        .take_while(|c| c.is_ascii_hexdigit())
        .collect();
    assert_eq!(token.len(), 64);

    let uri = format!("/api/reset-password/{}", token);
    let response = app
        .request(Method::POST, &uri, Some(json!({ "new_password": "brand-new-1" })), None)
        .await;
    assert_eq!(response.status(), 200);
    assert_eq!(
        response_json(response).await["msg"],
        "Contraseña actualizada correctamente"
    );

    let response = app
        .request(Method::POST, &uri, Some(json!({ "new_password": "again-2" })), None)
        .await;
    assert_eq!(response.status(), 400);
    assert_eq!(response_json(response).await["message"], "Token inválido o expirado");

    app.login("maria", "brand-new-1").await;
}

#[tokio::test]
async fn forgot_password_for_unknown_email_is_not_found() {
    let app = TestApp::new().await;

    let response = app
        .request(
            Method::POST,
            "/api/forgot-password",
            Some(json!({ "email": "ghost@lab.test" })),
            None,
        )
        .await;
    assert_eq!(response.status(), 404);
    assert!(app.mailer.sent().is_empty());
}

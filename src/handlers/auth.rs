use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use tower_cookies::{
    cookie::{time::Duration as CookieDuration, SameSite},
    Cookie, Cookies,
};

use super::common::{message_response, MessageResponse};
use crate::auth::{SessionToken, SESSION_COOKIE};
use crate::errors::{ErrorResponse, ServiceError};
use crate::services::accounts::{
    ForgotPasswordRequest, LoginRequest, LoginResponse, RegisterRequest, ResetPasswordRequest,
};
use crate::AppState;

fn session_cookie(token: String, max_age_secs: i64, secure: bool) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(secure)
        .max_age(CookieDuration::seconds(max_age_secs))
        .build()
}

#[utoipa::path(
    post,
    path = "/api/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created", body = MessageResponse),
        (status = 400, description = "Missing fields or duplicate username/email", body = ErrorResponse),
    ),
    tag = "auth"
)]
pub async fn register(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> Result<Response, ServiceError> {
    state.services.accounts.register(request).await?;
    Ok(message_response(
        StatusCode::CREATED,
        "Usuario creado correctamente",
    ))
}

/// Opens a session and sets the `session_id` cookie. The token is also
/// returned for clients that prefer a bearer header.
#[utoipa::path(
    post,
    path = "/api/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Session opened", body = LoginResponse),
        (status = 400, description = "Bad credentials", body = ErrorResponse),
        (status = 403, description = "Inactive account", body = ErrorResponse),
    ),
    tag = "auth"
)]
pub async fn login(
    State(state): State<AppState>,
    cookies: Cookies,
    Json(request): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ServiceError> {
    let accounts = &state.services.accounts;
    let response = accounts.login(request).await?;
    cookies.add(session_cookie(
        response.token.clone(),
        accounts.session_ttl().num_seconds(),
        state.config.session_cookie_secure,
    ));
    Ok(Json(response))
}

#[utoipa::path(
    post,
    path = "/api/logout",
    responses((status = 200, description = "Session closed", body = MessageResponse)),
    tag = "auth"
)]
pub async fn logout(
    State(state): State<AppState>,
    cookies: Cookies,
    SessionToken(token): SessionToken,
) -> Result<Json<MessageResponse>, ServiceError> {
    state.services.accounts.logout(token.as_deref()).await?;
    cookies.remove(Cookie::build((SESSION_COOKIE, "")).path("/").build());
    Ok(Json(MessageResponse::new("Sesión cerrada")))
}

pub async fn forgot_password(
    State(state): State<AppState>,
    Json(request): Json<ForgotPasswordRequest>,
) -> Result<Json<MessageResponse>, ServiceError> {
    state.services.accounts.forgot_password(request).await?;
    Ok(Json(MessageResponse::new(
        "Correo enviado. Revisa tu correo para recuperar tu cuenta.",
    )))
}

pub async fn reset_password(
    State(state): State<AppState>,
    Path(token): Path<String>,
    Json(request): Json<ResetPasswordRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    state
        .services
        .accounts
        .reset_password(&token, request)
        .await?;
    Ok(Json(MessageResponse::new(
        "Contraseña actualizada correctamente",
    )))
}

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/forgot-password", post(forgot_password))
        .route("/reset-password/:token", post(reset_password))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_cookie_is_http_only_and_lax() {
        let cookie = session_cookie("abc".into(), 3600, true);
        assert_eq!(cookie.name(), SESSION_COOKIE);
        assert_eq!(cookie.value(), "abc");
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.same_site(), Some(SameSite::Lax));
        assert_eq!(cookie.secure(), Some(true));
        assert_eq!(cookie.path(), Some("/"));
    }
}

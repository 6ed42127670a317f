//! User accounts, sessions and password recovery.
//!
//! Session and reset tokens are random 256-bit values handed to the client
//! once; only their SHA-256 digests are stored.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use super::mailer::{Mailer, OutgoingMail};
use crate::auth::{
    generate_token, hash_password, hash_token, password_reset_token, session, user,
    verify_password, AuthUser,
};
use crate::config::AppConfig;
use crate::db::DbPool;
use crate::errors::ServiceError;

const USER_NOT_FOUND: &str = "Usuario no encontrado";
const INVALID_RESET_TOKEN: &str = "Token inválido o expirado";
const RESET_SUBJECT: &str = "Recuperación de contraseña - Environovalab";

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct RegisterRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub email: String,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct LoginRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LoginResponse {
    pub msg: String,
    pub username: String,
    pub is_admin: bool,
    pub token: String,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct ForgotPasswordRequest {
    #[serde(default)]
    pub email: String,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct ResetPasswordRequest {
    #[serde(default)]
    pub new_password: String,
}

/// Account creation by an administrator
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct CreateUserRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub is_admin: bool,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct UpdateRoleRequest {
    #[serde(default)]
    pub is_admin: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserSummary {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub is_admin: bool,
    pub activo: bool,
}

impl From<user::Model> for UserSummary {
    fn from(model: user::Model) -> Self {
        Self {
            id: model.id,
            username: model.username,
            email: model.email,
            is_admin: model.is_admin,
            activo: model.is_active,
        }
    }
}

fn required(values: &[&str], message: &str) -> Result<(), ServiceError> {
    if values.iter().any(|v| v.trim().is_empty()) {
        return Err(ServiceError::ValidationError(message.to_string()));
    }
    Ok(())
}

fn ttl(duration: std::time::Duration) -> Duration {
    Duration::from_std(duration).unwrap_or_else(|_| Duration::days(1))
}

/// Service for users, sessions and password resets
#[derive(Clone)]
pub struct AccountService {
    db_pool: Arc<DbPool>,
    mailer: Arc<dyn Mailer>,
    session_ttl: Duration,
    reset_token_ttl: Duration,
    frontend_url: String,
}

impl AccountService {
    pub fn new(db_pool: Arc<DbPool>, mailer: Arc<dyn Mailer>, config: &AppConfig) -> Self {
        Self {
            db_pool,
            mailer,
            session_ttl: ttl(config.session_ttl()),
            reset_token_ttl: ttl(config.reset_token_ttl()),
            frontend_url: config.frontend_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn session_ttl(&self) -> Duration {
        self.session_ttl
    }

    async fn insert_user(
        &self,
        username: &str,
        email: &str,
        password: &str,
        is_admin: bool,
    ) -> Result<user::Model, ServiceError> {
        let username = username.trim();
        let email = email.trim();
        let conn = &*self.db_pool;

        if user::Entity::find()
            .filter(user::Column::Username.eq(username))
            .one(conn)
            .await?
            .is_some()
        {
            return Err(ServiceError::ValidationError("Usuario ya existe".to_string()));
        }
        if user::Entity::find()
            .filter(user::Column::Email.eq(email))
            .one(conn)
            .await?
            .is_some()
        {
            return Err(ServiceError::ValidationError("Email ya está en uso".to_string()));
        }

        let password_hash = hash_password(password)?;
        let model = user::ActiveModel {
            id: Set(Uuid::new_v4()),
            username: Set(username.to_string()),
            email: Set(email.to_string()),
            password_hash: Set(password_hash),
            is_admin: Set(is_admin),
            is_active: Set(true),
            ..Default::default()
        }
        .insert(conn)
        .await
        .map_err(|e| ServiceError::from_unique_violation(e, "Usuario ya existe"))?;

        info!(user_id = %model.id, username = %model.username, is_admin, "user created");
        Ok(model)
    }

    /// Self-registration; never grants admin
    #[instrument(skip(self, request), fields(username = %request.username))]
    pub async fn register(&self, request: RegisterRequest) -> Result<UserSummary, ServiceError> {
        required(
            &[
                request.username.as_str(),
                request.password.as_str(),
                request.email.as_str(),
            ],
            "Faltan campos requeridos",
        )?;
        self.insert_user(&request.username, &request.email, &request.password, false)
            .await
            .map(Into::into)
    }

    /// Verifies credentials and opens a session. The raw token is returned
    /// once and only its digest is stored.
    #[instrument(skip(self, request), fields(username = %request.username))]
    pub async fn login(&self, request: LoginRequest) -> Result<LoginResponse, ServiceError> {
        let bad_credentials =
            || ServiceError::ValidationError("Credenciales incorrectas".to_string());

        let account = user::Entity::find()
            .filter(user::Column::Username.eq(request.username.trim()))
            .one(&*self.db_pool)
            .await?
            .ok_or_else(bad_credentials)?;

        if !verify_password(&request.password, &account.password_hash) {
            warn!("login rejected: bad password");
            return Err(bad_credentials());
        }
        if !account.is_active {
            return Err(ServiceError::Forbidden(
                "Cuenta inactiva. Contacta con el administrador.".to_string(),
            ));
        }

        let token = generate_token();
        let now = Utc::now();
        session::ActiveModel {
            id: Set(Uuid::new_v4()),
            token_hash: Set(hash_token(&token)),
            user_id: Set(account.id),
            username: Set(account.username.clone()),
            expires_at: Set(now + self.session_ttl),
            created_at: Set(now),
        }
        .insert(&*self.db_pool)
        .await?;

        info!(user_id = %account.id, "session opened");
        Ok(LoginResponse {
            msg: "Login correcto".to_string(),
            username: account.username,
            is_admin: account.is_admin,
            token,
        })
    }

    /// Deletes the session behind `token`, if any
    #[instrument(skip(self, token))]
    pub async fn logout(&self, token: Option<&str>) -> Result<(), ServiceError> {
        if let Some(token) = token {
            session::Entity::delete_many()
                .filter(session::Column::TokenHash.eq(hash_token(token)))
                .exec(&*self.db_pool)
                .await?;
        }
        Ok(())
    }

    /// Maps a raw session token to its live, active user
    pub async fn resolve_session(&self, token: &str) -> Result<AuthUser, ServiceError> {
        let invalid = || ServiceError::Unauthorized("Sesión inválida o expirada".to_string());
        let conn = &*self.db_pool;

        let session = session::Entity::find()
            .filter(session::Column::TokenHash.eq(hash_token(token)))
            .filter(session::Column::ExpiresAt.gt(Utc::now()))
            .one(conn)
            .await?
            .ok_or_else(invalid)?;
        let account = user::Entity::find_by_id(session.user_id)
            .one(conn)
            .await?
            .filter(|u| u.is_active)
            .ok_or_else(invalid)?;

        Ok(AuthUser {
            user_id: account.id,
            username: account.username,
            is_admin: account.is_admin,
        })
    }

    /// Stores a single-use reset token and mails the reset link
    #[instrument(skip(self, request))]
    pub async fn forgot_password(&self, request: ForgotPasswordRequest) -> Result<(), ServiceError> {
        required(
            &[request.email.as_str()],
            "El campo correo electrónico es requerido",
        )?;
        let account = user::Entity::find()
            .filter(user::Column::Email.eq(request.email.trim()))
            .one(&*self.db_pool)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound("Usuario no encontrado con ese correo".to_string())
            })?;

        let token = generate_token();
        let now = Utc::now();
        password_reset_token::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(account.id),
            token_hash: Set(hash_token(&token)),
            expires_at: Set(now + self.reset_token_ttl),
            created_at: Set(now),
            used_at: Set(None),
        }
        .insert(&*self.db_pool)
        .await?;

        let link = format!("{}/reset-password/{}", self.frontend_url, token);
        self.mailer
            .send(OutgoingMail {
                to: account.email.clone(),
                subject: RESET_SUBJECT.to_string(),
                body: format!(
                    "Hola {},\n\nPara restablecer tu contraseña ingresa al siguiente enlace:\n{}\n\nSi no solicitaste este cambio, ignora este mensaje.",
                    account.username, link
                ),
            })
            .await?;

        info!(user_id = %account.id, "password reset requested");
        Ok(())
    }

    /// Redeems a reset token: new hash, token marked used, sessions revoked
    #[instrument(skip(self, token, request))]
    pub async fn reset_password(
        &self,
        token: &str,
        request: ResetPasswordRequest,
    ) -> Result<(), ServiceError> {
        required(&[request.new_password.as_str()], "Contraseña requerida")?;
        let invalid = || ServiceError::ValidationError(INVALID_RESET_TOKEN.to_string());
        let now = Utc::now();

        let txn = self.db_pool.begin().await?;
        let reset = password_reset_token::Entity::find()
            .filter(password_reset_token::Column::TokenHash.eq(hash_token(token)))
            .one(&txn)
            .await?
            .filter(|t| t.is_redeemable(now))
            .ok_or_else(invalid)?;
        let account = user::Entity::find_by_id(reset.user_id)
            .one(&txn)
            .await?
            .ok_or_else(invalid)?;

        // Only one redemption of a token can succeed
        let consumed = password_reset_token::Entity::update_many()
            .col_expr(
                password_reset_token::Column::UsedAt,
                sea_orm::sea_query::Expr::value(Some(now)),
            )
            .filter(password_reset_token::Column::Id.eq(reset.id))
            .filter(password_reset_token::Column::UsedAt.is_null())
            .exec(&txn)
            .await?;
        if consumed.rows_affected != 1 {
            return Err(invalid());
        }

        let mut active: user::ActiveModel = account.into();
        active.password_hash = Set(hash_password(&request.new_password)?);
        let account = active.update(&txn).await?;
        session::Entity::delete_many()
            .filter(session::Column::UserId.eq(account.id))
            .exec(&txn)
            .await?;
        txn.commit().await?;

        info!(user_id = %account.id, "password reset completed");
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn list_users(&self) -> Result<Vec<UserSummary>, ServiceError> {
        let users = user::Entity::find()
            .order_by_asc(user::Column::Username)
            .all(&*self.db_pool)
            .await?;
        Ok(users.into_iter().map(Into::into).collect())
    }

    #[instrument(skip(self, request), fields(username = %request.username))]
    pub async fn create_user(&self, request: CreateUserRequest) -> Result<UserSummary, ServiceError> {
        required(
            &[
                request.username.as_str(),
                request.password.as_str(),
                request.email.as_str(),
            ],
            "Todos los campos son obligatorios",
        )?;
        self.insert_user(
            &request.username,
            &request.email,
            &request.password,
            request.is_admin,
        )
        .await
        .map(Into::into)
    }

    #[instrument(skip(self))]
    pub async fn update_role(&self, id: Uuid, is_admin: bool) -> Result<UserSummary, ServiceError> {
        let account = user::Entity::find_by_id(id)
            .one(&*self.db_pool)
            .await?
            .ok_or_else(|| ServiceError::NotFound(USER_NOT_FOUND.to_string()))?;
        let mut active: user::ActiveModel = account.into();
        active.is_admin = Set(is_admin);
        let updated = active.update(&*self.db_pool).await?;
        info!(user_id = %id, is_admin, "user role changed");
        Ok(updated.into())
    }

    /// Flips `is_active`; deactivation also ends the user's sessions
    #[instrument(skip(self))]
    pub async fn toggle_active(&self, id: Uuid) -> Result<UserSummary, ServiceError> {
        let txn = self.db_pool.begin().await?;
        let account = user::Entity::find_by_id(id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(USER_NOT_FOUND.to_string()))?;
        let now_active = !account.is_active;

        let mut active: user::ActiveModel = account.into();
        active.is_active = Set(now_active);
        let updated = active.update(&txn).await?;
        if !now_active {
            session::Entity::delete_many()
                .filter(session::Column::UserId.eq(id))
                .exec(&txn)
                .await?;
        }
        txn.commit().await?;

        info!(user_id = %id, active = now_active, "user activation toggled");
        Ok(updated.into())
    }

    /// Creates the account as an administrator, or promotes and
    /// reactivates it when it already exists. Used by the admin CLI.
    #[instrument(skip(self, password))]
    pub async fn ensure_admin(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<UserSummary, ServiceError> {
        required(&[username, email, password], "Todos los campos son obligatorios")?;
        let existing = user::Entity::find()
            .filter(
                Condition::any()
                    .add(user::Column::Username.eq(username.trim()))
                    .add(user::Column::Email.eq(email.trim())),
            )
            .one(&*self.db_pool)
            .await?;

        match existing {
            Some(account) => {
                let mut active: user::ActiveModel = account.into();
                active.is_admin = Set(true);
                active.is_active = Set(true);
                active.password_hash = Set(hash_password(password)?);
                let updated = active.update(&*self.db_pool).await?;
                info!(user_id = %updated.id, "existing user promoted to admin");
                Ok(updated.into())
            }
            None => self
                .insert_user(username, email, password, true)
                .await
                .map(Into::into),
        }
    }

    /// Removes expired sessions; returns how many were deleted
    pub async fn purge_expired_sessions(&self, now: DateTime<Utc>) -> Result<u64, ServiceError> {
        let result = session::Entity::delete_many()
            .filter(session::Column::ExpiresAt.lte(now))
            .exec(&*self.db_pool)
            .await?;
        Ok(result.rows_affected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::mailer::MockMailer;
    use std::sync::Mutex;

    async fn test_db(dir: &tempfile::TempDir) -> Arc<DbPool> {
        let url = format!("sqlite://{}?mode=rwc", dir.path().join("accounts.db").display());
        let pool = sea_orm::Database::connect(url).await.unwrap();
        crate::db::run_migrations(&pool).await.unwrap();
        Arc::new(pool)
    }

    fn config() -> AppConfig {
        let mut config = AppConfig::new(
            "sqlite::memory:".into(),
            "127.0.0.1".into(),
            8000,
            "test".into(),
        );
        config.frontend_url = "http://front.test/".into();
        config
    }

    fn register(username: &str, email: &str) -> RegisterRequest {
        RegisterRequest {
            username: username.into(),
            password: "pw1".into(),
            email: email.into(),
        }
    }

    #[tokio::test]
    async fn register_rejects_duplicates_and_missing_fields() {
        let dir = tempfile::tempdir().unwrap();
        let service = AccountService::new(test_db(&dir).await, Arc::new(MockMailer::new()), &config());

        let created = service.register(register("alice", "a@x.com")).await.unwrap();
        assert!(!created.is_admin);
        assert!(created.activo);

        let err = service.register(register("alice", "b@x.com")).await.unwrap_err();
        assert_eq!(err.response_message(), "Usuario ya existe");
        let err = service.register(register("bob", "a@x.com")).await.unwrap_err();
        assert_eq!(err.response_message(), "Email ya está en uso");
        let err = service.register(register("", "c@x.com")).await.unwrap_err();
        assert_eq!(err.response_message(), "Faltan campos requeridos");
    }

    #[tokio::test]
    async fn login_opens_a_resolvable_session() {
        let dir = tempfile::tempdir().unwrap();
        let service = AccountService::new(test_db(&dir).await, Arc::new(MockMailer::new()), &config());
        service.register(register("alice", "a@x.com")).await.unwrap();

        let wrong = service
            .login(LoginRequest {
                username: "alice".into(),
                password: "nope".into(),
            })
            .await
            .unwrap_err();
        assert_eq!(wrong.response_message(), "Credenciales incorrectas");

        let login = service
            .login(LoginRequest {
                username: "alice".into(),
                password: "pw1".into(),
            })
            .await
            .unwrap();
        let user = service.resolve_session(&login.token).await.unwrap();
        assert_eq!(user.username, "alice");

        service.logout(Some(&login.token)).await.unwrap();
        assert!(service.resolve_session(&login.token).await.is_err());
    }

    #[tokio::test]
    async fn deactivated_user_cannot_log_in_and_loses_sessions() {
        let dir = tempfile::tempdir().unwrap();
        let service = AccountService::new(test_db(&dir).await, Arc::new(MockMailer::new()), &config());
        let alice = service.register(register("alice", "a@x.com")).await.unwrap();
        let login = service
            .login(LoginRequest {
                username: "alice".into(),
                password: "pw1".into(),
            })
            .await
            .unwrap();

        let toggled = service.toggle_active(alice.id).await.unwrap();
        assert!(!toggled.activo);
        assert!(service.resolve_session(&login.token).await.is_err());

        let err = service
            .login(LoginRequest {
                username: "alice".into(),
                password: "pw1".into(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Forbidden(_)));
    }

    #[tokio::test]
    async fn reset_token_is_mailed_and_single_use() {
        let dir = tempfile::tempdir().unwrap();
        let sent: Arc<Mutex<Vec<OutgoingMail>>> = Arc::default();
        let mut mailer = MockMailer::new();
        let captured = sent.clone();
        mailer.expect_send().times(1).returning(move |mail| {
            captured.lock().unwrap().push(mail);
            Ok(())
        });

        let service = AccountService::new(test_db(&dir).await, Arc::new(mailer), &config());
        service.register(register("alice", "a@x.com")).await.unwrap();

        let missing = service
            .forgot_password(ForgotPasswordRequest {
                email: "zz@x.com".into(),
            })
            .await
            .unwrap_err();
        assert!(matches!(missing, ServiceError::NotFound(_)));

        service
            .forgot_password(ForgotPasswordRequest {
                email: "a@x.com".into(),
            })
            .await
            .unwrap();

        let mail = sent.lock().unwrap().pop().unwrap();
        assert_eq!(mail.subject, RESET_SUBJECT);
        let prefix = "http://front.test/reset-password/";
        let start = mail.body.find(prefix).unwrap() + prefix.len();
        let token: String = mail.body[start..]
            .chars()
            .take_while(|c| c.is_ascii_hexdigit())
            .collect();
        assert_eq!(token.len(), 64);

        let reset = ResetPasswordRequest {
            new_password: "pw2".into(),
        };
        service.reset_password(&token, reset.clone()).await.unwrap();
        let again = service.reset_password(&token, reset).await.unwrap_err();
        assert_eq!(again.response_message(), INVALID_RESET_TOKEN);

        assert!(service
            .login(LoginRequest {
                username: "alice".into(),
                password: "pw2".into(),
            })
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn ensure_admin_promotes_existing_user() {
        let dir = tempfile::tempdir().unwrap();
        let service = AccountService::new(test_db(&dir).await, Arc::new(MockMailer::new()), &config());
        service.register(register("alice", "a@x.com")).await.unwrap();

        let admin = service.ensure_admin("alice", "a@x.com", "secret").await.unwrap();
        assert!(admin.is_admin);
        assert_eq!(service.list_users().await.unwrap().len(), 1);
    }
}

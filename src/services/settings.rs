use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, Set,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use super::non_blank;
use crate::db::DbPool;
use crate::entities::company_settings::{self, SETTINGS_ID};
use crate::errors::ServiceError;
use crate::money::round_rate;

pub const DEFAULT_COMPANY_NAME: &str = "ENVIRONOVALAB";
pub const DEFAULT_COMPANY_ADDRESS: &str = "Dirección por defecto";
pub const DEFAULT_COMPANY_PHONE: &str = "000-000-0000";
pub const DEFAULT_COMPANY_EMAIL: &str = "info@environovalab.com";
pub const DEFAULT_COMPANY_RUC: &str = "0000000000000";
pub const DEFAULT_PROFORMA_PREFIX: &str = "PRF";
pub const DEFAULT_TAX_RATE: Decimal = dec!(0.12);

/// Attempts at claiming a proforma number before giving up
const COUNTER_MAX_ATTEMPTS: usize = 5;

fn default_settings() -> company_settings::ActiveModel {
    company_settings::ActiveModel {
        id: Set(SETTINGS_ID),
        company_name: Set(DEFAULT_COMPANY_NAME.to_string()),
        company_address: Set(DEFAULT_COMPANY_ADDRESS.to_string()),
        company_phone: Set(DEFAULT_COMPANY_PHONE.to_string()),
        company_email: Set(DEFAULT_COMPANY_EMAIL.to_string()),
        company_ruc: Set(DEFAULT_COMPANY_RUC.to_string()),
        company_logo: Set(None),
        proforma_prefix: Set(DEFAULT_PROFORMA_PREFIX.to_string()),
        next_proforma_number: Set(1),
        tax_rate: Set(round_rate(DEFAULT_TAX_RATE)),
        ..Default::default()
    }
}

/// Loads the settings record, creating it with defaults when absent.
pub async fn get_or_create<C: ConnectionTrait>(
    conn: &C,
) -> Result<company_settings::Model, ServiceError> {
    if let Some(settings) = company_settings::Entity::find_by_id(SETTINGS_ID).one(conn).await? {
        return Ok(settings);
    }

    info!("company settings missing, creating defaults");
    match default_settings().insert(conn).await {
        Ok(settings) => Ok(settings),
        // Another request created it first
        Err(err) => company_settings::Entity::find_by_id(SETTINGS_ID)
            .one(conn)
            .await?
            .ok_or(ServiceError::DatabaseError(err)),
    }
}

/// Tax rate in effect, falling back to the default when no record exists
pub async fn current_tax_rate<C: ConnectionTrait>(conn: &C) -> Result<Decimal, ServiceError> {
    Ok(company_settings::Entity::find_by_id(SETTINGS_ID)
        .one(conn)
        .await?
        .map(|s| s.tax_rate)
        .unwrap_or(DEFAULT_TAX_RATE))
}

/// Claims the next proforma sequence value with a compare-and-swap on the
/// stored counter. Returns the formatted number, e.g. `PRF-0001`.
pub async fn claim_proforma_number<C: ConnectionTrait>(conn: &C) -> Result<String, ServiceError> {
    for attempt in 1..=COUNTER_MAX_ATTEMPTS {
        let settings = get_or_create(conn).await?;
        let current = settings.next_proforma_number;

        let result = company_settings::Entity::update_many()
            .col_expr(
                company_settings::Column::NextProformaNumber,
                Expr::value(current + 1),
            )
            .filter(company_settings::Column::Id.eq(SETTINGS_ID))
            .filter(company_settings::Column::NextProformaNumber.eq(current))
            .exec(conn)
            .await?;

        if result.rows_affected == 1 {
            let number = settings.format_number(current);
            debug!(%number, attempt, "proforma number claimed");
            return Ok(number);
        }

        warn!(attempt, current, "proforma counter moved underneath us, retrying");
    }

    Err(ServiceError::Conflict(
        "No se pudo asignar un número de proforma, intente nuevamente".to_string(),
    ))
}

fn validate_tax_rate(rate: &Decimal) -> Result<(), ValidationError> {
    if *rate < Decimal::ZERO || *rate > Decimal::ONE {
        let mut err = ValidationError::new("tax_rate_range");
        err.message = Some("La tasa de impuesto debe estar entre 0 y 1".into());
        return Err(err);
    }
    if rate.normalize().scale() > 4 {
        let mut err = ValidationError::new("tax_rate_scale");
        err.message = Some("La tasa de impuesto admite máximo 4 decimales".into());
        return Err(err);
    }
    Ok(())
}

/// Partial update of the settings record. The counter is not editable.
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateSettingsRequest {
    #[validate(length(min = 1, max = 200))]
    pub company_name: Option<String>,
    #[validate(length(min = 1))]
    pub company_address: Option<String>,
    #[validate(length(min = 1, max = 20))]
    pub company_phone: Option<String>,
    #[validate(email(message = "Email inválido"))]
    pub company_email: Option<String>,
    #[validate(length(min = 1, max = 20))]
    pub company_ruc: Option<String>,
    /// Path to a logo image; an empty string clears it
    #[validate(length(max = 500))]
    pub company_logo: Option<String>,
    #[validate(length(min = 1, max = 10, message = "El prefijo admite de 1 a 10 caracteres"))]
    pub proforma_prefix: Option<String>,
    #[validate(custom = "validate_tax_rate")]
    #[schema(value_type = Option<String>, example = "0.12")]
    pub tax_rate: Option<Decimal>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SettingsResponse {
    pub id: Uuid,
    pub company_name: String,
    pub company_address: String,
    pub company_phone: String,
    pub company_email: String,
    pub company_ruc: String,
    pub company_logo: Option<String>,
    pub proforma_prefix: String,
    pub next_proforma_number: i32,
    #[schema(value_type = String, example = "0.1200")]
    pub tax_rate: Decimal,
    pub updated_at: DateTime<Utc>,
}

impl From<company_settings::Model> for SettingsResponse {
    fn from(model: company_settings::Model) -> Self {
        Self {
            id: model.id,
            company_name: model.company_name,
            company_address: model.company_address,
            company_phone: model.company_phone,
            company_email: model.company_email,
            company_ruc: model.company_ruc,
            company_logo: model.company_logo,
            proforma_prefix: model.proforma_prefix,
            next_proforma_number: model.next_proforma_number,
            tax_rate: round_rate(model.tax_rate),
            updated_at: model.updated_at,
        }
    }
}

/// Service for the company settings singleton
#[derive(Clone)]
pub struct SettingsService {
    db_pool: Arc<DbPool>,
}

impl SettingsService {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }

    /// Startup hook: make sure the singleton exists
    pub async fn ensure_provisioned(&self) -> Result<(), ServiceError> {
        get_or_create(&*self.db_pool).await.map(|_| ())
    }

    #[instrument(skip(self))]
    pub async fn current(&self) -> Result<SettingsResponse, ServiceError> {
        Ok(get_or_create(&*self.db_pool).await?.into())
    }

    /// All settings records; in practice the singleton
    #[instrument(skip(self))]
    pub async fn list(&self) -> Result<Vec<SettingsResponse>, ServiceError> {
        let rows = company_settings::Entity::find().all(&*self.db_pool).await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    #[instrument(skip(self, request))]
    pub async fn update(
        &self,
        request: UpdateSettingsRequest,
    ) -> Result<SettingsResponse, ServiceError> {
        request.validate()?;
        let settings = get_or_create(&*self.db_pool).await?;

        let mut active: company_settings::ActiveModel = settings.into();
        if let Some(name) = request.company_name {
            active.company_name = Set(name.trim().to_string());
        }
        if let Some(address) = request.company_address {
            active.company_address = Set(address.trim().to_string());
        }
        if let Some(phone) = request.company_phone {
            active.company_phone = Set(phone.trim().to_string());
        }
        if let Some(email) = request.company_email {
            active.company_email = Set(email.trim().to_string());
        }
        if let Some(ruc) = request.company_ruc {
            active.company_ruc = Set(ruc.trim().to_string());
        }
        if request.company_logo.is_some() {
            active.company_logo = Set(non_blank(request.company_logo));
        }
        if let Some(prefix) = request.proforma_prefix {
            active.proforma_prefix = Set(prefix.trim().to_string());
        }
        if let Some(rate) = request.tax_rate {
            active.tax_rate = Set(round_rate(rate));
        }

        let updated = active.update(&*self.db_pool).await?;
        info!("company settings updated");
        Ok(updated.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tax_rate_bounds() {
        assert!(validate_tax_rate(&dec!(0.12)).is_ok());
        assert!(validate_tax_rate(&dec!(0)).is_ok());
        assert!(validate_tax_rate(&dec!(1.5)).is_err());
        assert!(validate_tax_rate(&dec!(-0.01)).is_err());
        assert!(validate_tax_rate(&dec!(0.12345)).is_err());
    }

    #[test]
    fn prefix_longer_than_ten_is_rejected() {
        let request = UpdateSettingsRequest {
            proforma_prefix: Some("ABCDEFGHIJK".into()),
            ..Default::default()
        };
        assert!(request.validate().is_err());
    }
}

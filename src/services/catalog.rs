//! Parameters, methods and techniques: the normalized analysis catalog.
//!
//! Methods and techniques share one shape, so their inputs and responses
//! are the same types; the parameter additionally carries a default unit
//! and price used to prefill new analysis lines.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use super::non_blank;
use crate::db::DbPool;
use crate::entities::{analysis, method, parameter, technique, Category};
use crate::errors::ServiceError;
use crate::money::{round_money, MAX_UNIT_PRICE};

fn validate_price(price: &Decimal) -> Result<(), ValidationError> {
    if price.is_sign_negative() {
        let mut err = ValidationError::new("negative_price");
        err.message = Some("El precio no puede ser negativo".into());
        return Err(err);
    }
    if *price > MAX_UNIT_PRICE {
        let mut err = ValidationError::new("price_too_large");
        err.message = Some("El precio excede el máximo admitido".into());
        return Err(err);
    }
    Ok(())
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct ParameterInput {
    #[validate(length(min = 1, max = 100, message = "El nombre es requerido (máx. 100 caracteres)"))]
    pub name: String,
    pub category: Category,
    #[validate(length(max = 50))]
    pub default_unit: Option<String>,
    #[validate(custom = "validate_price")]
    #[schema(value_type = Option<String>, example = "25.00")]
    pub default_price: Option<Decimal>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ParameterResponse {
    pub id: Uuid,
    pub name: String,
    pub category: Category,
    pub category_display: String,
    pub default_unit: Option<String>,
    #[schema(value_type = Option<String>)]
    pub default_price: Option<Decimal>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl From<parameter::Model> for ParameterResponse {
    fn from(model: parameter::Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
            category_display: model.category.label().to_string(),
            category: model.category,
            default_unit: model.default_unit,
            default_price: model.default_price.map(round_money),
            is_active: model.is_active,
            created_at: model.created_at,
        }
    }
}

/// Method or technique fields
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CatalogEntryInput {
    #[validate(length(min = 1, max = 200, message = "El nombre es requerido (máx. 200 caracteres)"))]
    pub name: String,
    pub category: Category,
    pub description: Option<String>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CatalogEntryResponse {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub category: Category,
    pub category_display: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl From<method::Model> for CatalogEntryResponse {
    fn from(model: method::Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
            description: model.description,
            category_display: model.category.label().to_string(),
            category: model.category,
            is_active: model.is_active,
            created_at: model.created_at,
        }
    }
}

impl From<technique::Model> for CatalogEntryResponse {
    fn from(model: technique::Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
            description: model.description,
            category_display: model.category.label().to_string(),
            category: model.category,
            is_active: model.is_active,
            created_at: model.created_at,
        }
    }
}

fn not_found(message: &str) -> ServiceError {
    ServiceError::NotFound(message.to_string())
}

fn in_use(what: &str) -> ServiceError {
    ServiceError::ValidationError(format!(
        "No se puede eliminar {} porque está en uso en proformas",
        what
    ))
}

fn category_locked(what: &str) -> ServiceError {
    ServiceError::ValidationError(format!(
        "No se puede cambiar la categoría {} porque está en uso en proformas",
        what
    ))
}

/// Service for the normalized analysis catalog
#[derive(Clone)]
pub struct CatalogService {
    db_pool: Arc<DbPool>,
}

impl CatalogService {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }

    /// Analysis lines whose `column` points at `id`
    async fn lines_referencing(
        &self,
        column: analysis::Column,
        id: Uuid,
    ) -> Result<u64, ServiceError> {
        Ok(analysis::Entity::find()
            .filter(column.eq(id))
            .count(&*self.db_pool)
            .await?)
    }

    // Parameters

    #[instrument(skip(self))]
    pub async fn list_parameters(&self) -> Result<Vec<ParameterResponse>, ServiceError> {
        let rows = parameter::Entity::find()
            .order_by_asc(parameter::Column::Category)
            .order_by_asc(parameter::Column::Name)
            .all(&*self.db_pool)
            .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Active parameters of one category
    #[instrument(skip(self))]
    pub async fn parameters_by_category(
        &self,
        category: Category,
    ) -> Result<Vec<ParameterResponse>, ServiceError> {
        let rows = parameter::Entity::find()
            .filter(parameter::Column::Category.eq(category))
            .filter(parameter::Column::IsActive.eq(true))
            .order_by_asc(parameter::Column::Name)
            .all(&*self.db_pool)
            .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    #[instrument(skip(self))]
    pub async fn get_parameter(&self, id: Uuid) -> Result<ParameterResponse, ServiceError> {
        parameter::Entity::find_by_id(id)
            .one(&*self.db_pool)
            .await?
            .map(Into::into)
            .ok_or_else(|| not_found("Parámetro no encontrado"))
    }

    #[instrument(skip(self, input))]
    pub async fn create_parameter(
        &self,
        input: ParameterInput,
    ) -> Result<ParameterResponse, ServiceError> {
        input.validate()?;
        let model = parameter::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(input.name.trim().to_string()),
            category: Set(input.category),
            default_unit: Set(non_blank(input.default_unit)),
            default_price: Set(input.default_price.map(round_money)),
            is_active: Set(input.is_active.unwrap_or(true)),
            created_at: Set(Utc::now()),
        }
        .insert(&*self.db_pool)
        .await?;
        info!(parameter_id = %model.id, "parameter created");
        Ok(model.into())
    }

    #[instrument(skip(self, input))]
    pub async fn update_parameter(
        &self,
        id: Uuid,
        input: ParameterInput,
    ) -> Result<ParameterResponse, ServiceError> {
        input.validate()?;
        let existing = parameter::Entity::find_by_id(id)
            .one(&*self.db_pool)
            .await?
            .ok_or_else(|| not_found("Parámetro no encontrado"))?;

        if existing.category != input.category
            && self.lines_referencing(analysis::Column::ParameterId, id).await? > 0
        {
            return Err(category_locked("del parámetro"));
        }

        let mut active: parameter::ActiveModel = existing.into();
        active.name = Set(input.name.trim().to_string());
        active.category = Set(input.category);
        active.default_unit = Set(non_blank(input.default_unit));
        active.default_price = Set(input.default_price.map(round_money));
        if let Some(is_active) = input.is_active {
            active.is_active = Set(is_active);
        }
        Ok(active.update(&*self.db_pool).await?.into())
    }

    #[instrument(skip(self))]
    pub async fn delete_parameter(&self, id: Uuid) -> Result<(), ServiceError> {
        if self.lines_referencing(analysis::Column::ParameterId, id).await? > 0 {
            return Err(in_use("el parámetro"));
        }
        let result = parameter::Entity::delete_by_id(id)
            .exec(&*self.db_pool)
            .await?;
        if result.rows_affected == 0 {
            return Err(not_found("Parámetro no encontrado"));
        }
        Ok(())
    }

    // Methods

    #[instrument(skip(self))]
    pub async fn list_methods(&self) -> Result<Vec<CatalogEntryResponse>, ServiceError> {
        let rows = method::Entity::find()
            .order_by_asc(method::Column::Category)
            .order_by_asc(method::Column::Name)
            .all(&*self.db_pool)
            .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    #[instrument(skip(self))]
    pub async fn methods_by_category(
        &self,
        category: Category,
    ) -> Result<Vec<CatalogEntryResponse>, ServiceError> {
        let rows = method::Entity::find()
            .filter(method::Column::Category.eq(category))
            .filter(method::Column::IsActive.eq(true))
            .order_by_asc(method::Column::Name)
            .all(&*self.db_pool)
            .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    #[instrument(skip(self))]
    pub async fn get_method(&self, id: Uuid) -> Result<CatalogEntryResponse, ServiceError> {
        method::Entity::find_by_id(id)
            .one(&*self.db_pool)
            .await?
            .map(Into::into)
            .ok_or_else(|| not_found("Método no encontrado"))
    }

    #[instrument(skip(self, input))]
    pub async fn create_method(
        &self,
        input: CatalogEntryInput,
    ) -> Result<CatalogEntryResponse, ServiceError> {
        input.validate()?;
        let model = method::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(input.name.trim().to_string()),
            description: Set(non_blank(input.description)),
            category: Set(input.category),
            is_active: Set(input.is_active.unwrap_or(true)),
            created_at: Set(Utc::now()),
        }
        .insert(&*self.db_pool)
        .await?;
        info!(method_id = %model.id, "method created");
        Ok(model.into())
    }

    #[instrument(skip(self, input))]
    pub async fn update_method(
        &self,
        id: Uuid,
        input: CatalogEntryInput,
    ) -> Result<CatalogEntryResponse, ServiceError> {
        input.validate()?;
        let existing = method::Entity::find_by_id(id)
            .one(&*self.db_pool)
            .await?
            .ok_or_else(|| not_found("Método no encontrado"))?;

        if existing.category != input.category
            && self.lines_referencing(analysis::Column::MethodId, id).await? > 0
        {
            return Err(category_locked("del método"));
        }

        let mut active: method::ActiveModel = existing.into();
        active.name = Set(input.name.trim().to_string());
        active.description = Set(non_blank(input.description));
        active.category = Set(input.category);
        if let Some(is_active) = input.is_active {
            active.is_active = Set(is_active);
        }
        Ok(active.update(&*self.db_pool).await?.into())
    }

    #[instrument(skip(self))]
    pub async fn delete_method(&self, id: Uuid) -> Result<(), ServiceError> {
        if self.lines_referencing(analysis::Column::MethodId, id).await? > 0 {
            return Err(in_use("el método"));
        }
        let result = method::Entity::delete_by_id(id).exec(&*self.db_pool).await?;
        if result.rows_affected == 0 {
            return Err(not_found("Método no encontrado"));
        }
        Ok(())
    }

    // Techniques

    #[instrument(skip(self))]
    pub async fn list_techniques(&self) -> Result<Vec<CatalogEntryResponse>, ServiceError> {
        let rows = technique::Entity::find()
            .order_by_asc(technique::Column::Category)
            .order_by_asc(technique::Column::Name)
            .all(&*self.db_pool)
            .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    #[instrument(skip(self))]
    pub async fn techniques_by_category(
        &self,
        category: Category,
    ) -> Result<Vec<CatalogEntryResponse>, ServiceError> {
        let rows = technique::Entity::find()
            .filter(technique::Column::Category.eq(category))
            .filter(technique::Column::IsActive.eq(true))
            .order_by_asc(technique::Column::Name)
            .all(&*self.db_pool)
            .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    #[instrument(skip(self))]
    pub async fn get_technique(&self, id: Uuid) -> Result<CatalogEntryResponse, ServiceError> {
        technique::Entity::find_by_id(id)
            .one(&*self.db_pool)
            .await?
            .map(Into::into)
            .ok_or_else(|| not_found("Técnica no encontrada"))
    }

    #[instrument(skip(self, input))]
    pub async fn create_technique(
        &self,
        input: CatalogEntryInput,
    ) -> Result<CatalogEntryResponse, ServiceError> {
        input.validate()?;
        let model = technique::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(input.name.trim().to_string()),
            description: Set(non_blank(input.description)),
            category: Set(input.category),
            is_active: Set(input.is_active.unwrap_or(true)),
            created_at: Set(Utc::now()),
        }
        .insert(&*self.db_pool)
        .await?;
        info!(technique_id = %model.id, "technique created");
        Ok(model.into())
    }

    #[instrument(skip(self, input))]
    pub async fn update_technique(
        &self,
        id: Uuid,
        input: CatalogEntryInput,
    ) -> Result<CatalogEntryResponse, ServiceError> {
        input.validate()?;
        let existing = technique::Entity::find_by_id(id)
            .one(&*self.db_pool)
            .await?
            .ok_or_else(|| not_found("Técnica no encontrada"))?;

        if existing.category != input.category
            && self.lines_referencing(analysis::Column::TechniqueId, id).await? > 0
        {
            return Err(category_locked("de la técnica"));
        }

        let mut active: technique::ActiveModel = existing.into();
        active.name = Set(input.name.trim().to_string());
        active.description = Set(non_blank(input.description));
        active.category = Set(input.category);
        if let Some(is_active) = input.is_active {
            active.is_active = Set(is_active);
        }
        Ok(active.update(&*self.db_pool).await?.into())
    }

    #[instrument(skip(self))]
    pub async fn delete_technique(&self, id: Uuid) -> Result<(), ServiceError> {
        if self.lines_referencing(analysis::Column::TechniqueId, id).await? > 0 {
            return Err(in_use("la técnica"));
        }
        let result = technique::Entity::delete_by_id(id)
            .exec(&*self.db_pool)
            .await?;
        if result.rows_affected == 0 {
            return Err(not_found("Técnica no encontrada"));
        }
        Ok(())
    }
}

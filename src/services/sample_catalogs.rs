//! Flat reference catalogs: sample types and the priced analysis list.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, EntityTrait, QueryFilter, QueryOrder, QuerySelect, Set};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use super::{icontains, search_term, SEARCH_LIMIT};
use crate::db::DbPool;
use crate::entities::{analisis_catalogo, tipo_muestra};
use crate::errors::ServiceError;
use crate::money::{round_money, MAX_UNIT_PRICE};

fn validate_precio(precio: &Decimal) -> Result<(), ValidationError> {
    if precio.is_sign_negative() {
        let mut err = ValidationError::new("negative_price");
        err.message = Some("El precio no puede ser negativo".into());
        return Err(err);
    }
    if *precio > MAX_UNIT_PRICE {
        let mut err = ValidationError::new("price_too_large");
        err.message = Some("El precio excede el máximo admitido".into());
        return Err(err);
    }
    Ok(())
}

/// Row shape shared by both catalogs
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CatalogRowInput {
    #[validate(length(min = 1, max = 100))]
    pub tipo: String,
    #[validate(length(min = 1, max = 200))]
    pub parametro: String,
    #[validate(length(max = 50))]
    pub unidad: String,
    #[validate(length(max = 200))]
    pub metodo: String,
    #[validate(length(max = 200))]
    pub tecnica: String,
    #[validate(custom = "validate_precio")]
    #[schema(value_type = String, example = "15.00")]
    pub precio: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CatalogRowResponse {
    pub id: Uuid,
    pub tipo: String,
    pub parametro: String,
    pub unidad: String,
    pub metodo: String,
    pub tecnica: String,
    #[schema(value_type = String)]
    pub precio: Decimal,
    pub created_at: DateTime<Utc>,
}

impl From<tipo_muestra::Model> for CatalogRowResponse {
    fn from(m: tipo_muestra::Model) -> Self {
        Self {
            id: m.id,
            tipo: m.tipo,
            parametro: m.parametro,
            unidad: m.unidad,
            metodo: m.metodo,
            tecnica: m.tecnica,
            precio: round_money(m.precio),
            created_at: m.created_at,
        }
    }
}

impl From<analisis_catalogo::Model> for CatalogRowResponse {
    fn from(m: analisis_catalogo::Model) -> Self {
        Self {
            id: m.id,
            tipo: m.tipo,
            parametro: m.parametro,
            unidad: m.unidad,
            metodo: m.metodo,
            tecnica: m.tecnica,
            precio: round_money(m.precio),
            created_at: m.created_at,
        }
    }
}

const TIPO_NOT_FOUND: &str = "Tipo de muestra no encontrado";
const CATALOGO_NOT_FOUND: &str = "Análisis de catálogo no encontrado";

/// Service for sample types and the analysis catalog
#[derive(Clone)]
pub struct SampleCatalogService {
    db_pool: Arc<DbPool>,
}

impl SampleCatalogService {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }

    #[instrument(skip(self))]
    pub async fn list_tipos(&self) -> Result<Vec<CatalogRowResponse>, ServiceError> {
        let rows = tipo_muestra::Entity::find()
            .order_by_asc(tipo_muestra::Column::Tipo)
            .order_by_asc(tipo_muestra::Column::Parametro)
            .all(&*self.db_pool)
            .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    #[instrument(skip(self))]
    pub async fn get_tipo(&self, id: Uuid) -> Result<CatalogRowResponse, ServiceError> {
        tipo_muestra::Entity::find_by_id(id)
            .one(&*self.db_pool)
            .await?
            .map(Into::into)
            .ok_or_else(|| ServiceError::NotFound(TIPO_NOT_FOUND.to_string()))
    }

    /// `parametro` contains `q`; same short-term rule as client search
    #[instrument(skip(self))]
    pub async fn search_tipos(&self, q: Option<&str>) -> Result<Vec<CatalogRowResponse>, ServiceError> {
        let Some(term) = search_term(q) else {
            return Ok(Vec::new());
        };
        let rows = tipo_muestra::Entity::find()
            .filter(icontains(tipo_muestra::Column::Parametro, term))
            .order_by_asc(tipo_muestra::Column::Parametro)
            .limit(SEARCH_LIMIT)
            .all(&*self.db_pool)
            .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    #[instrument(skip(self, input))]
    pub async fn create_tipo(&self, input: CatalogRowInput) -> Result<CatalogRowResponse, ServiceError> {
        input.validate()?;
        let model = tipo_muestra::ActiveModel {
            id: Set(Uuid::new_v4()),
            tipo: Set(input.tipo.trim().to_string()),
            parametro: Set(input.parametro.trim().to_string()),
            unidad: Set(input.unidad.trim().to_string()),
            metodo: Set(input.metodo.trim().to_string()),
            tecnica: Set(input.tecnica.trim().to_string()),
            precio: Set(round_money(input.precio)),
            created_at: Set(Utc::now()),
        }
        .insert(&*self.db_pool)
        .await?;
        info!(tipo_id = %model.id, "sample type created");
        Ok(model.into())
    }

    #[instrument(skip(self, input))]
    pub async fn update_tipo(
        &self,
        id: Uuid,
        input: CatalogRowInput,
    ) -> Result<CatalogRowResponse, ServiceError> {
        input.validate()?;
        let existing = tipo_muestra::Entity::find_by_id(id)
            .one(&*self.db_pool)
            .await?
            .ok_or_else(|| ServiceError::NotFound(TIPO_NOT_FOUND.to_string()))?;
        let mut active: tipo_muestra::ActiveModel = existing.into();
        active.tipo = Set(input.tipo.trim().to_string());
        active.parametro = Set(input.parametro.trim().to_string());
        active.unidad = Set(input.unidad.trim().to_string());
        active.metodo = Set(input.metodo.trim().to_string());
        active.tecnica = Set(input.tecnica.trim().to_string());
        active.precio = Set(round_money(input.precio));
        Ok(active.update(&*self.db_pool).await?.into())
    }

    #[instrument(skip(self))]
    pub async fn delete_tipo(&self, id: Uuid) -> Result<(), ServiceError> {
        let result = tipo_muestra::Entity::delete_by_id(id)
            .exec(&*self.db_pool)
            .await?;
        if result.rows_affected == 0 {
            return Err(ServiceError::NotFound(TIPO_NOT_FOUND.to_string()));
        }
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn list_catalogo(&self) -> Result<Vec<CatalogRowResponse>, ServiceError> {
        let rows = analisis_catalogo::Entity::find()
            .order_by_asc(analisis_catalogo::Column::Tipo)
            .order_by_asc(analisis_catalogo::Column::Parametro)
            .all(&*self.db_pool)
            .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    #[instrument(skip(self))]
    pub async fn get_catalogo(&self, id: Uuid) -> Result<CatalogRowResponse, ServiceError> {
        analisis_catalogo::Entity::find_by_id(id)
            .one(&*self.db_pool)
            .await?
            .map(Into::into)
            .ok_or_else(|| ServiceError::NotFound(CATALOGO_NOT_FOUND.to_string()))
    }

    #[instrument(skip(self, input))]
    pub async fn create_catalogo(
        &self,
        input: CatalogRowInput,
    ) -> Result<CatalogRowResponse, ServiceError> {
        input.validate()?;
        let model = analisis_catalogo::ActiveModel {
            id: Set(Uuid::new_v4()),
            tipo: Set(input.tipo.trim().to_string()),
            parametro: Set(input.parametro.trim().to_string()),
            unidad: Set(input.unidad.trim().to_string()),
            metodo: Set(input.metodo.trim().to_string()),
            tecnica: Set(input.tecnica.trim().to_string()),
            precio: Set(round_money(input.precio)),
            created_at: Set(Utc::now()),
        }
        .insert(&*self.db_pool)
        .await?;
        Ok(model.into())
    }

    #[instrument(skip(self, input))]
    pub async fn update_catalogo(
        &self,
        id: Uuid,
        input: CatalogRowInput,
    ) -> Result<CatalogRowResponse, ServiceError> {
        input.validate()?;
        let existing = analisis_catalogo::Entity::find_by_id(id)
            .one(&*self.db_pool)
            .await?
            .ok_or_else(|| ServiceError::NotFound(CATALOGO_NOT_FOUND.to_string()))?;
        let mut active: analisis_catalogo::ActiveModel = existing.into();
        active.tipo = Set(input.tipo.trim().to_string());
        active.parametro = Set(input.parametro.trim().to_string());
        active.unidad = Set(input.unidad.trim().to_string());
        active.metodo = Set(input.metodo.trim().to_string());
        active.tecnica = Set(input.tecnica.trim().to_string());
        active.precio = Set(round_money(input.precio));
        Ok(active.update(&*self.db_pool).await?.into())
    }

    #[instrument(skip(self))]
    pub async fn delete_catalogo(&self, id: Uuid) -> Result<(), ServiceError> {
        let result = analisis_catalogo::Entity::delete_by_id(id)
            .exec(&*self.db_pool)
            .await?;
        if result.rows_affected == 0 {
            return Err(ServiceError::NotFound(CATALOGO_NOT_FOUND.to_string()));
        }
        Ok(())
    }
}

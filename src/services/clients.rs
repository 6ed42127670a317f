use std::sync::Arc;

use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, Condition, EntityTrait, QueryFilter, QueryOrder, QuerySelect, Set,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use super::{icontains, non_blank, search_term, SEARCH_LIMIT};
use crate::db::DbPool;
use crate::entities::client;
use crate::errors::ServiceError;

/// Client fields accepted on create and update
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct ClientInput {
    #[validate(length(min = 1, max = 200, message = "El nombre es requerido (máx. 200 caracteres)"))]
    pub name: String,
    #[validate(length(max = 20))]
    pub ruc: Option<String>,
    #[validate(length(max = 20))]
    pub phone: Option<String>,
    pub address: Option<String>,
    #[validate(email(message = "Email inválido"))]
    pub email: Option<String>,
    #[validate(length(max = 100))]
    pub contact_person: Option<String>,
}

impl ClientInput {
    fn normalized(self) -> Self {
        Self {
            name: self.name.trim().to_string(),
            ruc: non_blank(self.ruc),
            phone: non_blank(self.phone),
            address: non_blank(self.address),
            email: non_blank(self.email),
            contact_person: non_blank(self.contact_person),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ClientResponse {
    pub id: Uuid,
    pub name: String,
    pub ruc: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub email: Option<String>,
    pub contact_person: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<client::Model> for ClientResponse {
    fn from(model: client::Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
            ruc: model.ruc,
            phone: model.phone,
            address: model.address,
            email: model.email,
            contact_person: model.contact_person,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

/// Search hit: just enough to fill an autocomplete
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ClientSummary {
    pub id: Uuid,
    pub name: String,
    pub ruc: Option<String>,
}

/// Service for managing clients
#[derive(Clone)]
pub struct ClientService {
    db_pool: Arc<DbPool>,
}

impl ClientService {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }

    #[instrument(skip(self))]
    pub async fn list_clients(&self) -> Result<Vec<ClientResponse>, ServiceError> {
        let clients = client::Entity::find()
            .order_by_asc(client::Column::Name)
            .all(&*self.db_pool)
            .await?;
        Ok(clients.into_iter().map(Into::into).collect())
    }

    #[instrument(skip(self))]
    pub async fn get_client(&self, id: Uuid) -> Result<ClientResponse, ServiceError> {
        client::Entity::find_by_id(id)
            .one(&*self.db_pool)
            .await?
            .map(Into::into)
            .ok_or_else(|| ServiceError::NotFound("Cliente no encontrado".to_string()))
    }

    #[instrument(skip(self, input))]
    pub async fn create_client(&self, input: ClientInput) -> Result<ClientResponse, ServiceError> {
        let input = input.normalized();
        input.validate()?;

        let model = client::ActiveModel {
            name: Set(input.name),
            ruc: Set(input.ruc),
            phone: Set(input.phone),
            address: Set(input.address),
            email: Set(input.email),
            contact_person: Set(input.contact_person),
            ..Default::default()
        }
        .insert(&*self.db_pool)
        .await?;

        info!(client_id = %model.id, "client created");
        Ok(model.into())
    }

    #[instrument(skip(self, input))]
    pub async fn update_client(
        &self,
        id: Uuid,
        input: ClientInput,
    ) -> Result<ClientResponse, ServiceError> {
        let input = input.normalized();
        input.validate()?;

        let existing = client::Entity::find_by_id(id)
            .one(&*self.db_pool)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Cliente no encontrado".to_string()))?;

        let mut active: client::ActiveModel = existing.into();
        active.name = Set(input.name);
        active.ruc = Set(input.ruc);
        active.phone = Set(input.phone);
        active.address = Set(input.address);
        active.email = Set(input.email);
        active.contact_person = Set(input.contact_person);

        let model = active.update(&*self.db_pool).await?;
        Ok(model.into())
    }

    /// Name or RUC contains `q`, case-insensitive; at most ten hits
    #[instrument(skip(self))]
    pub async fn search_clients(&self, q: Option<&str>) -> Result<Vec<ClientSummary>, ServiceError> {
        let Some(term) = search_term(q) else {
            return Ok(Vec::new());
        };

        let clients = client::Entity::find()
            .filter(
                Condition::any()
                    .add(icontains(client::Column::Name, term))
                    .add(icontains(client::Column::Ruc, term)),
            )
            .order_by_asc(client::Column::Name)
            .limit(SEARCH_LIMIT)
            .all(&*self.db_pool)
            .await?;

        Ok(clients
            .into_iter()
            .map(|c| ClientSummary {
                id: c.id,
                name: c.name,
                ruc: c.ruc,
            })
            .collect())
    }
}

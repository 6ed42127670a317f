use crate::money::line_subtotal;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveValue, Set};
use serde::{Deserialize, Serialize};

/// A priced line item of a proforma.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "analyses")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub proforma_id: Uuid,
    pub parameter_id: Uuid,
    pub method_id: Uuid,
    pub technique_id: Option<Uuid>,
    pub unit: Option<String>,
    pub unit_price: Decimal,
    pub quantity: i32,
    pub subtotal: Decimal,
    pub position: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::proforma::Entity",
        from = "Column::ProformaId",
        to = "super::proforma::Column::Id",
        on_delete = "Cascade"
    )]
    Proforma,
    #[sea_orm(
        belongs_to = "super::parameter::Entity",
        from = "Column::ParameterId",
        to = "super::parameter::Column::Id"
    )]
    Parameter,
    #[sea_orm(
        belongs_to = "super::method::Entity",
        from = "Column::MethodId",
        to = "super::method::Column::Id"
    )]
    Method,
    #[sea_orm(
        belongs_to = "super::technique::Entity",
        from = "Column::TechniqueId",
        to = "super::technique::Column::Id"
    )]
    Technique,
}

impl Related<super::proforma::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Proforma.def()
    }
}

impl Related<super::parameter::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Parameter.def()
    }
}

impl Related<super::method::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Method.def()
    }
}

impl Related<super::technique::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Technique.def()
    }
}

fn current<V: Clone + Into<sea_orm::Value>>(value: &ActiveValue<V>) -> Option<V> {
    match value {
        ActiveValue::Set(v) | ActiveValue::Unchanged(v) => Some(v.clone()),
        ActiveValue::NotSet => None,
    }
}

#[async_trait]
impl ActiveModelBehavior for ActiveModel {
    /// Keeps `subtotal = unit_price * quantity` on every save.
    async fn before_save<C>(self, _db: &C, insert: bool) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        let mut active_model = self;
        let now = Utc::now();

        if let (Some(price), Some(quantity)) = (
            current(&active_model.unit_price),
            current(&active_model.quantity),
        ) {
            let subtotal =
                line_subtotal(price, quantity).map_err(|err| DbErr::Custom(err.to_string()))?;
            active_model.subtotal = Set(subtotal);
        }

        if insert {
            active_model.created_at = Set(now);
        }
        active_model.updated_at = Set(now);
        Ok(active_model)
    }
}

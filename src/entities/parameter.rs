use super::Category;
use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "parameters")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub name: String,
    pub category: Category,
    pub default_unit: Option<String>,
    pub default_price: Option<Decimal>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::analysis::Entity")]
    Analyses,
}

impl Related<super::analysis::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Analyses.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

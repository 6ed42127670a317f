use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "informes")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub proforma_id: Uuid,
    pub fecha_emision: DateTime<Utc>,
    pub tomado_por: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub procedimiento: Option<String>,
    pub analizado_por: Option<String>,
    pub pdf_path: Option<String>,
    pub created_at: DateTime<Utc>,
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
    #[sea_orm(has_many = "super::resultado::Entity")]
    Resultados,
}

impl Related<super::proforma::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Proforma.def()
    }
}

impl Related<super::resultado::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Resultados.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

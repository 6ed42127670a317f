use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// One measured value reported in an informe.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "resultados")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub informe_id: Uuid,
    pub parameter: String,
    pub unit: Option<String>,
    pub method: Option<String>,
    pub resultados: Option<String>,
    pub limite: Option<String>,
    pub incertidumbre: Option<String>,
    pub position: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::informe::Entity",
        from = "Column::InformeId",
        to = "super::informe::Column::Id",
        on_delete = "Cascade"
    )]
    Informe,
}

impl Related<super::informe::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Informe.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

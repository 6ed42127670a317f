use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::Set;
use serde::{Deserialize, Serialize};

/// Well-known id of the single settings record.
pub const SETTINGS_ID: Uuid = Uuid::from_u128(0x0000_0000_0000_4000_8000_0000_0000_0001);

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "company_settings")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub company_name: String,
    #[sea_orm(column_type = "Text")]
    pub company_address: String,
    pub company_phone: String,
    pub company_email: String,
    pub company_ruc: String,
    pub company_logo: Option<String>,
    pub proforma_prefix: String,
    pub next_proforma_number: i32,
    pub tax_rate: Decimal,
    pub updated_at: DateTime<Utc>,
}

impl Model {
    /// Formats a sequence value as a document number, e.g. `PRF-0007`
    pub fn format_number(&self, sequence: i32) -> String {
        format_proforma_number(&self.proforma_prefix, sequence)
    }
}

pub fn format_proforma_number(prefix: &str, sequence: i32) -> String {
    format!("{}-{:04}", prefix, sequence)
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

#[async_trait]
impl ActiveModelBehavior for ActiveModel {
    async fn before_save<C>(self, _db: &C, _insert: bool) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        let mut active_model = self;
        active_model.updated_at = Set(Utc::now());
        Ok(active_model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pads_sequence_to_four_digits() {
        assert_eq!(format_proforma_number("PRF", 1), "PRF-0001");
        assert_eq!(format_proforma_number("LAB", 42), "LAB-0042");
        assert_eq!(format_proforma_number("PRF", 12345), "PRF-12345");
    }
}

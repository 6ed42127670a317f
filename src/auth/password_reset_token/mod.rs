use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Single-use password reset token. Only the SHA-256 of the token is stored.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "password_reset_tokens")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(column_type = "Uuid")]
    pub user_id: Uuid,
    #[sea_orm(unique)]
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub used_at: Option<DateTime<Utc>>,
}

impl Model {
    /// Unused and not yet expired at `now`
    pub fn is_redeemable(&self, now: DateTime<Utc>) -> bool {
        self.used_at.is_none() && self.expires_at > now
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "crate::auth::user::Entity",
        from = "Column::UserId",
        to = "crate::auth::user::Column::Id",
        on_delete = "Cascade"
    )]
    User,
}

impl Related<crate::auth::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn token(expires_in: Duration, used: bool) -> Model {
        let now = Utc::now();
        Model {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            token_hash: "h".into(),
            expires_at: now + expires_in,
            created_at: now,
            used_at: used.then_some(now),
        }
    }

    #[test]
    fn redeemable_only_while_fresh_and_unused() {
        let now = Utc::now();
        assert!(token(Duration::minutes(5), false).is_redeemable(now));
        assert!(!token(Duration::minutes(5), true).is_redeemable(now));
        assert!(!token(Duration::minutes(-1), false).is_redeemable(now));
    }
}

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Service area a catalog entry belongs to.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize, ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "lowercase")]
pub enum Category {
    #[sea_orm(string_value = "agua")]
    Agua,
    #[sea_orm(string_value = "emisiones")]
    Emisiones,
    #[sea_orm(string_value = "ruido")]
    Ruido,
    #[sea_orm(string_value = "logistica")]
    Logistica,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::Agua,
        Category::Emisiones,
        Category::Ruido,
        Category::Logistica,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Category::Agua => "Agua",
            Category::Emisiones => "Emisiones",
            Category::Ruido => "Ruido",
            Category::Logistica => "Logística",
        }
    }
}

impl std::str::FromStr for Category {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "agua" => Ok(Category::Agua),
            "emisiones" => Ok(Category::Emisiones),
            "ruido" => Ok(Category::Ruido),
            "logistica" => Ok(Category::Logistica),
            other => Err(format!("Categoría inválida: {}", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Category::Logistica).unwrap(), "\"logistica\"");
        let parsed: Category = serde_json::from_str("\"emisiones\"").unwrap();
        assert_eq!(parsed, Category::Emisiones);
    }

    #[test]
    fn parses_case_insensitively() {
        assert_eq!("Ruido".parse::<Category>(), Ok(Category::Ruido));
        assert!("suelo".parse::<Category>().is_err());
    }

    #[test]
    fn labels_are_spanish() {
        assert_eq!(Category::Logistica.label(), "Logística");
        assert_eq!(Category::Agua.label(), "Agua");
    }
}

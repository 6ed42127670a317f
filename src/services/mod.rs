//! Business logic. Each service owns a slice of the schema and is shared
//! behind an `Arc` in [`crate::handlers::AppServices`].

use sea_orm::sea_query::{Expr, Func, LikeExpr, SimpleExpr};
use sea_orm::ColumnTrait;

pub mod accounts;
pub mod catalog;
pub mod clients;
pub mod mailer;
pub mod quotation;
pub mod reports;
pub mod sample_catalogs;
pub mod settings;

/// Search terms shorter than this return no results
pub const MIN_SEARCH_LEN: usize = 2;
/// Upper bound on search results
pub const SEARCH_LIMIT: u64 = 10;

/// Case-insensitive substring match that behaves the same on SQLite and Postgres
pub(crate) fn icontains<C: ColumnTrait>(column: C, needle: &str) -> SimpleExpr {
    let escaped = needle
        .to_lowercase()
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    Expr::expr(Func::lower(Expr::col(column)))
        .like(LikeExpr::new(format!("%{}%", escaped)).escape('\\'))
}

/// Trims a search term; `None` when it is too short to search
pub(crate) fn search_term(q: Option<&str>) -> Option<&str> {
    q.map(str::trim)
        .filter(|q| q.chars().count() >= MIN_SEARCH_LEN)
}

/// Treats empty or whitespace-only strings as absent
pub(crate) fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_terms_are_ignored() {
        assert_eq!(search_term(None), None);
        assert_eq!(search_term(Some(" a ")), None);
        assert_eq!(search_term(Some(" ac ")), Some("ac"));
    }

    #[test]
    fn blank_strings_become_none() {
        assert_eq!(non_blank(Some("  ".into())), None);
        assert_eq!(non_blank(Some(" x ".into())), Some("x".into()));
        assert_eq!(non_blank(None), None);
    }
}

//! Data models for the circulation server

pub mod book;
pub mod claims;
pub mod import_report;
pub mod member;
pub mod transaction;

use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};

// Re-export commonly used types
pub use book::{Book, BookFields};
pub use claims::{StaffClaims, StaffRole};
pub use member::{Member, MemberFields};
pub use transaction::{BookTransaction, TransactionStatus, TransactionType};

pub const DEFAULT_LIST_LIMIT: i64 = 50;
pub const MAX_LIST_LIMIT: i64 = 500;
pub const SEARCH_LIMIT: i64 = 20;

/// List query parameters
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct ListQuery {
    /// Maximum rows returned (default 50, at most 500)
    pub limit: Option<i64>,
}

impl ListQuery {
    pub fn effective_limit(&self) -> i64 {
        self.limit.unwrap_or(DEFAULT_LIST_LIMIT).clamp(1, MAX_LIST_LIMIT)
    }
}

/// Substring search parameters
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct SearchQuery {
    /// Substring to look for
    pub q: Option<String>,
}

/// Build an ILIKE pattern matching `query` anywhere, with LIKE wildcards escaped
pub fn like_pattern(query: &str) -> String {
    let escaped = query
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("tolkien"), "%tolkien%");
        assert_eq!(like_pattern("100%_done"), "%100\\%\\_done%");
    }

    #[test]
    fn test_limit_is_clamped() {
        assert_eq!(ListQuery::default().effective_limit(), 50);
        assert_eq!(ListQuery { limit: Some(0) }.effective_limit(), 1);
        assert_eq!(ListQuery { limit: Some(10_000) }.effective_limit(), 500);
    }
}

/**
 * Routes Module
 * API route handlers
 */
pub mod auth;
pub mod blog;
pub mod comment;
pub mod engagement;
pub mod health;
pub mod post;
pub mod report;
pub mod subscription;
pub mod tag;
pub mod upload;

use regex::Regex;
use serde::Serialize;

/// Error response shared by every endpoint.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Success response (for delete-style endpoints).
#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

lazy_static::lazy_static! {
    /// Valid slug pattern: lowercase letters, numbers, and hyphens
    static ref SLUG_REGEX: Regex = Regex::new(r"^[a-z0-9]+(?:-[a-z0-9]+)*$").unwrap();
}

/// The shared pool, or 503 when the database was never initialized.
pub(crate) fn pool() -> Result<std::sync::Arc<sqlx::PgPool>, crate::error::ApiError> {
    crate::db::get_pool().ok_or(crate::error::ApiError::Unavailable)
}

pub(crate) fn is_valid_slug(slug: &str) -> bool {
    SLUG_REGEX.is_match(slug)
}

/// Clamp pagination inputs and derive the SQL offset. Page size is capped
/// at 100, both values floor at 1.
pub(crate) fn clamp_page(page: i64, page_size: i64) -> (i64, i64, i64) {
    let page_size = page_size.clamp(1, 100);
    let page = page.max(1);
    (page, page_size, (page - 1) * page_size)
}

pub(crate) fn default_page() -> i64 {
    1
}

pub(crate) fn default_page_size() -> i64 {
    10
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slug_validation() {
        assert!(is_valid_slug("my-first-post"));
        assert!(is_valid_slug("a1"));
        assert!(!is_valid_slug("My-Post"));
        assert!(!is_valid_slug("-leading"));
        assert!(!is_valid_slug("trailing-"));
        assert!(!is_valid_slug("spaced out"));
        assert!(!is_valid_slug(""));
    }

    #[test]
    fn test_clamp_page_bounds() {
        assert_eq!(clamp_page(1, 10), (1, 10, 0));
        assert_eq!(clamp_page(0, 0), (1, 1, 0));
        assert_eq!(clamp_page(-5, 1000), (1, 100, 0));
        assert_eq!(clamp_page(3, 20), (3, 20, 40));
    }
}

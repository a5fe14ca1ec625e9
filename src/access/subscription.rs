//! Subscription request workflow: the state machine that turns a pending
//! request to join a private blog into a confirmed membership or a
//! rejection.
//!
//! States: `pending -[accept]-> accepted`, `pending -[reject]-> rejected`.
//! Accepted and rejected are terminal; `is_deleted` is true iff the state
//! is terminal, and resolved rows are retained as history. The dedup and
//! double-resolve races settle inside the database: a partial unique index
//! on live `(blog_id, user_id)` pairs for submission, and a conditional
//! UPDATE plus insert-if-absent membership write, in one transaction, for
//! resolution.

use sqlx::PgPool;
use uuid::Uuid;

use super::membership;
use crate::db::{self, models::SubscribeRequest};
use crate::error::ApiError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestStatus {
    Pending,
    Accepted,
    Rejected,
}

impl RequestStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            RequestStatus::Pending => "pending",
            RequestStatus::Accepted => "accepted",
            RequestStatus::Rejected => "rejected",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(RequestStatus::Pending),
            "accepted" => Some(RequestStatus::Accepted),
            "rejected" => Some(RequestStatus::Rejected),
            _ => None,
        }
    }
}

/// The two transitions a pending request can take.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Accept,
    Reject,
}

impl Decision {
    /// PATCH bodies carry the *target* status, so decisions parse from the
    /// terminal status names only.
    pub fn parse(s: &str) -> Option<Self> {
        match RequestStatus::parse(s)? {
            RequestStatus::Accepted => Some(Decision::Accept),
            RequestStatus::Rejected => Some(Decision::Reject),
            RequestStatus::Pending => None,
        }
    }

    fn terminal_status(self) -> RequestStatus {
        match self {
            Decision::Accept => RequestStatus::Accepted,
            Decision::Reject => RequestStatus::Rejected,
        }
    }
}

/// Submit a request to join a private blog.
///
/// Fails with `NotFound` for a missing blog, `Validation` when the blog is
/// not private, and `Conflict` when the user is already a member or a live
/// request already exists. Two concurrent submits race on the partial
/// unique index, so at most one can ever succeed.
pub async fn submit_request(
    pool: &PgPool,
    blog_id: Uuid,
    user_id: Uuid,
) -> Result<SubscribeRequest, ApiError> {
    let blog = super::blog_by_id(pool, blog_id)
        .await?
        .ok_or(ApiError::NotFound)?;

    if !blog.is_private {
        return Err(ApiError::Validation(
            "subscribe requests are only valid for private blogs".to_string(),
        ));
    }

    if membership::is_member(pool, blog.id, blog.owner_id, user_id).await? {
        return Err(ApiError::Conflict(
            "already a member of this blog".to_string(),
        ));
    }

    match sqlx::query_as::<_, SubscribeRequest>(
        r#"
        INSERT INTO subscribe_requests (blog_id, user_id)
        VALUES ($1, $2)
        RETURNING id, blog_id, user_id, requested_at, status, is_deleted
        "#,
    )
    .bind(blog.id)
    .bind(user_id)
    .fetch_one(pool)
    .await
    {
        Ok(request) => Ok(request),
        Err(e) if db::is_unique_violation(&e) => Err(ApiError::Conflict(
            "a subscribe request for this blog is already pending".to_string(),
        )),
        Err(e) => Err(e.into()),
    }
}

/// Resolve a pending request.
///
/// The terminal transition is a compare-and-swap: a conditional UPDATE
/// keyed on `is_deleted = false`. Zero rows updated means the request is
/// missing or was already resolved, so a concurrent double-resolve leaves
/// exactly one winner and the loser sees `NotFound`. On accept the
/// membership insert is insert-if-absent and commits atomically with the
/// transition.
pub async fn resolve_request(
    pool: &PgPool,
    request_id: Uuid,
    decision: Decision,
) -> Result<SubscribeRequest, ApiError> {
    let mut tx = pool.begin().await?;

    let resolved: Option<SubscribeRequest> = sqlx::query_as(
        r#"
        UPDATE subscribe_requests
        SET status = $2, is_deleted = true
        WHERE id = $1 AND is_deleted = false
        RETURNING id, blog_id, user_id, requested_at, status, is_deleted
        "#,
    )
    .bind(request_id)
    .bind(decision.terminal_status().as_str())
    .fetch_optional(&mut *tx)
    .await?;

    let Some(request) = resolved else {
        return Err(ApiError::NotFound);
    };

    if decision == Decision::Accept {
        sqlx::query(
            r#"
            INSERT INTO subscribers (blog_id, user_id)
            VALUES ($1, $2)
            ON CONFLICT (blog_id, user_id) DO NOTHING
            "#,
        )
        .bind(request.blog_id)
        .bind(request.user_id)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(request)
}

/// Fetch a request row regardless of resolution state. Routes use this to
/// authorize the resolver against the target blog before transitioning.
pub async fn request_by_id(
    pool: &PgPool,
    id: Uuid,
) -> Result<Option<SubscribeRequest>, sqlx::Error> {
    sqlx::query_as::<_, SubscribeRequest>(
        r#"
        SELECT id, blog_id, user_id, requested_at, status, is_deleted
        FROM subscribe_requests
        WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_parse_round_trip() {
        for status in [
            RequestStatus::Pending,
            RequestStatus::Accepted,
            RequestStatus::Rejected,
        ] {
            assert_eq!(RequestStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(RequestStatus::parse("deleted"), None);
        assert_eq!(RequestStatus::parse(""), None);
        assert_eq!(RequestStatus::parse("Accepted"), None);
    }

    #[test]
    fn test_decision_parses_terminal_statuses_only() {
        assert_eq!(Decision::parse("accepted"), Some(Decision::Accept));
        assert_eq!(Decision::parse("rejected"), Some(Decision::Reject));
        assert_eq!(Decision::parse("pending"), None);
        assert_eq!(Decision::parse("approve"), None);
    }

    #[test]
    fn test_decision_maps_to_terminal_status() {
        assert_eq!(Decision::Accept.terminal_status(), RequestStatus::Accepted);
        assert_eq!(Decision::Reject.terminal_status(), RequestStatus::Rejected);
    }
}

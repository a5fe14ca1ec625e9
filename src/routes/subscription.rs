/**
 * Subscription Routes
 * The subscribe-request workflow endpoints (submit, list, resolve) and the
 * confirmed-subscriber endpoints (list, remove). The transition logic
 * itself lives in `access::subscription`; these handlers add viewer
 * authorization on top.
 */
use axum::{
    extract::{Path, Query},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::access::{self, membership, subscription};
use crate::db::models::{Subscriber, SubscribeRequest};
use crate::error::{ApiError, ApiResult};
use crate::routes::auth::Viewer;
use crate::routes::SuccessResponse;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Request body for POST /api/subscribe-request
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitRequestBody {
    pub blog_id: Uuid,
}

/// Request body for PATCH /api/subscribe-request/:id. Carries the target
/// terminal status: `accepted` or `rejected`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolveRequestBody {
    pub status: String,
}

/// Query parameters for the owner-facing list endpoints
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlogScopedQuery {
    pub blog: Uuid,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestListResponse {
    pub items: Vec<SubscribeRequest>,
    pub total: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriberListResponse {
    pub items: Vec<Subscriber>,
    pub total: i64,
}

// ============================================================================
// Helpers
// ============================================================================

/// Require owner/co-author standing on a blog, resolving it first.
async fn require_blog_staff(
    pool: &sqlx::PgPool,
    blog_id: Uuid,
    viewer: &Viewer,
) -> ApiResult<()> {
    let blog = access::blog_by_id(pool, blog_id)
        .await?
        .ok_or(ApiError::NotFound)?;
    let allowed =
        membership::is_owner_or_author(pool, blog.id, blog.owner_id, viewer.user_id).await?;
    if !allowed {
        return Err(ApiError::NotAuthorized);
    }
    Ok(())
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /api/subscribe-request - Ask to join a private blog
pub async fn submit_request(
    viewer: Viewer,
    Json(payload): Json<SubmitRequestBody>,
) -> ApiResult<impl IntoResponse> {
    let pool = super::pool()?;

    let request =
        subscription::submit_request(pool.as_ref(), payload.blog_id, viewer.user_id).await?;

    tracing::info!(
        request_id = %request.id,
        blog_id = %request.blog_id,
        user_id = %request.user_id,
        "subscribe request submitted"
    );

    Ok((StatusCode::CREATED, Json(request)))
}

/// GET /api/subscribe-request?blog= - Pending requests for a blog
/// (owner/co-author only)
pub async fn list_requests(
    viewer: Viewer,
    Query(query): Query<BlogScopedQuery>,
) -> ApiResult<impl IntoResponse> {
    let pool = super::pool()?;
    require_blog_staff(pool.as_ref(), query.blog, &viewer).await?;

    let items: Vec<SubscribeRequest> = sqlx::query_as(
        r#"
        SELECT id, blog_id, user_id, requested_at, status, is_deleted
        FROM subscribe_requests
        WHERE blog_id = $1 AND is_deleted = false
        ORDER BY requested_at ASC
        "#,
    )
    .bind(query.blog)
    .fetch_all(pool.as_ref())
    .await?;

    let total = items.len() as i64;
    Ok(Json(RequestListResponse { items, total }))
}

/// PATCH /api/subscribe-request/:id - Accept or reject a pending request
/// (owner/co-author of the target blog only)
pub async fn resolve_request(
    viewer: Viewer,
    Path(id): Path<Uuid>,
    Json(payload): Json<ResolveRequestBody>,
) -> ApiResult<impl IntoResponse> {
    let decision = subscription::Decision::parse(&payload.status).ok_or_else(|| {
        ApiError::Validation("status must be \"accepted\" or \"rejected\"".to_string())
    })?;

    let pool = super::pool()?;

    // Authorize against the target blog before transitioning. A request
    // that is already resolved still 404s below, inside the CAS.
    let request = subscription::request_by_id(pool.as_ref(), id)
        .await?
        .ok_or(ApiError::NotFound)?;
    require_blog_staff(pool.as_ref(), request.blog_id, &viewer).await?;

    let resolved = subscription::resolve_request(pool.as_ref(), id, decision).await?;

    tracing::info!(
        request_id = %resolved.id,
        blog_id = %resolved.blog_id,
        user_id = %resolved.user_id,
        status = %resolved.status,
        "subscribe request resolved"
    );

    Ok(Json(resolved))
}

/// GET /api/subscriber?blog= - Confirmed subscribers of a blog
/// (owner/co-author only)
pub async fn list_subscribers(
    viewer: Viewer,
    Query(query): Query<BlogScopedQuery>,
) -> ApiResult<impl IntoResponse> {
    let pool = super::pool()?;
    require_blog_staff(pool.as_ref(), query.blog, &viewer).await?;

    let items: Vec<Subscriber> = sqlx::query_as(
        r#"
        SELECT id, blog_id, user_id, subscribed_at
        FROM subscribers
        WHERE blog_id = $1
        ORDER BY subscribed_at ASC
        "#,
    )
    .bind(query.blog)
    .fetch_all(pool.as_ref())
    .await?;

    let total = items.len() as i64;
    Ok(Json(SubscriberListResponse { items, total }))
}

/// DELETE /api/subscriber/:id - Drop a membership: the subscriber
/// unsubscribing themselves, or the blog staff removing them
pub async fn remove_subscriber(
    viewer: Viewer,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let pool = super::pool()?;

    let subscriber: Option<Subscriber> = sqlx::query_as(
        r#"
        SELECT id, blog_id, user_id, subscribed_at
        FROM subscribers
        WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(pool.as_ref())
    .await?;
    let subscriber = subscriber.ok_or(ApiError::NotFound)?;

    if subscriber.user_id != viewer.user_id {
        require_blog_staff(pool.as_ref(), subscriber.blog_id, &viewer).await?;
    }

    sqlx::query("DELETE FROM subscribers WHERE id = $1")
        .bind(id)
        .execute(pool.as_ref())
        .await?;

    tracing::info!(
        blog_id = %subscriber.blog_id,
        user_id = %subscriber.user_id,
        "subscriber removed"
    );

    Ok(Json(SuccessResponse { success: true }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::auth::mint_token;
    use axum::body::Body;
    use axum::http::Request;
    use axum::routing::{patch, post};
    use axum::Router;
    use tower::ServiceExt;

    fn test_router() -> Router {
        Router::new()
            .route("/api/subscribe-request", post(submit_request))
            .route("/api/subscribe-request/{id}", patch(resolve_request))
    }

    async fn send_json(
        method: &str,
        uri: &str,
        token: Option<&str>,
        json: serde_json::Value,
    ) -> StatusCode {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json");
        if let Some(t) = token {
            builder = builder.header("authorization", format!("Bearer {}", t));
        }
        let req = builder
            .body(Body::from(serde_json::to_vec(&json).unwrap()))
            .unwrap();
        test_router().oneshot(req).await.unwrap().status()
    }

    #[tokio::test]
    async fn test_submit_requires_auth() {
        let status = send_json(
            "POST",
            "/api/subscribe-request",
            None,
            serde_json::json!({"blogId": Uuid::new_v4()}),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_submit_without_pool_returns_unavailable() {
        let token = mint_token(Uuid::new_v4(), None);
        let status = send_json(
            "POST",
            "/api/subscribe-request",
            Some(&token),
            serde_json::json!({"blogId": Uuid::new_v4()}),
        )
        .await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_resolve_rejects_unknown_status() {
        let token = mint_token(Uuid::new_v4(), None);
        let uri = format!("/api/subscribe-request/{}", Uuid::new_v4());
        let status = send_json(
            "PATCH",
            &uri,
            Some(&token),
            serde_json::json!({"status": "approved"}),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_resolve_rejects_pending_as_target_status() {
        let token = mint_token(Uuid::new_v4(), None);
        let uri = format!("/api/subscribe-request/{}", Uuid::new_v4());
        let status = send_json(
            "PATCH",
            &uri,
            Some(&token),
            serde_json::json!({"status": "pending"}),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}

/**
 * Comment Routes
 * Comment listing and creation on visible posts. Replies must target a
 * comment on the same post.
 */
use axum::{
    extract::{Path, Query},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::access::{self, membership, visibility};
use crate::db::models::Comment;
use crate::error::{ApiError, ApiResult};
use crate::routes::auth::{MaybeViewer, Viewer};
use crate::routes::{clamp_page, default_page, default_page_size, SuccessResponse};

// ============================================================================
// Request/Response Types
// ============================================================================

/// Query parameters for GET /api/comment (list)
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentListQuery {
    pub post: Uuid,
    #[serde(default = "default_page")]
    pub page: i64,
    #[serde(default = "default_page_size")]
    pub page_size: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentListResponse {
    pub items: Vec<Comment>,
    pub page: i64,
    pub page_size: i64,
    pub total: i64,
}

/// Request body for POST /api/comment (create)
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCommentRequest {
    pub post_id: Uuid,
    pub content: String,
    pub reply_to: Option<Uuid>,
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /api/comment?post= - List comments on a visible post
pub async fn list_comments(
    MaybeViewer(viewer): MaybeViewer,
    Query(query): Query<CommentListQuery>,
) -> ApiResult<impl IntoResponse> {
    let pool = super::pool()?;
    let (page, page_size, offset) = clamp_page(query.page, query.page_size);

    let post = access::post_by_id(pool.as_ref(), query.post)
        .await?
        .ok_or(ApiError::NotFound)?;
    if !visibility::can_view_post(pool.as_ref(), viewer, &post).await? {
        return Err(ApiError::NotAuthorized);
    }

    let items: Vec<Comment> = sqlx::query_as(
        r#"
        SELECT id, post_id, author_id, content, reply_to, created_at
        FROM comments
        WHERE post_id = $1
        ORDER BY created_at ASC
        LIMIT $2 OFFSET $3
        "#,
    )
    .bind(post.id)
    .bind(page_size)
    .bind(offset)
    .fetch_all(pool.as_ref())
    .await?;

    let total: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM comments WHERE post_id = $1")
        .bind(post.id)
        .fetch_one(pool.as_ref())
        .await?;

    Ok(Json(CommentListResponse {
        items,
        page,
        page_size,
        total: total.0,
    }))
}

/// POST /api/comment - Comment on a visible post
pub async fn create_comment(
    viewer: Viewer,
    Json(payload): Json<CreateCommentRequest>,
) -> ApiResult<impl IntoResponse> {
    if payload.content.trim().is_empty() {
        return Err(ApiError::Validation("content is required".to_string()));
    }

    let pool = super::pool()?;

    let post = access::post_by_id(pool.as_ref(), payload.post_id)
        .await?
        .ok_or(ApiError::NotFound)?;
    if !visibility::can_engage(pool.as_ref(), viewer.user_id, &post).await? {
        return Err(ApiError::NotAuthorized);
    }

    // No cross-post reply chains: the parent must live on the same post.
    if let Some(reply_to) = payload.reply_to {
        let parent = access::comment_by_id(pool.as_ref(), reply_to)
            .await?
            .ok_or_else(|| ApiError::Validation("reply target does not exist".to_string()))?;
        if parent.post_id != post.id {
            return Err(ApiError::Validation(
                "reply must target a comment on the same post".to_string(),
            ));
        }
    }

    let comment: Comment = sqlx::query_as(
        r#"
        INSERT INTO comments (post_id, author_id, content, reply_to)
        VALUES ($1, $2, $3, $4)
        RETURNING id, post_id, author_id, content, reply_to, created_at
        "#,
    )
    .bind(post.id)
    .bind(viewer.user_id)
    .bind(payload.content.trim())
    .bind(payload.reply_to)
    .fetch_one(pool.as_ref())
    .await?;

    Ok((StatusCode::CREATED, Json(comment)))
}

/// DELETE /api/comment/:id - Remove a comment (its author, or the blog's
/// owner/co-author)
pub async fn delete_comment(viewer: Viewer, Path(id): Path<Uuid>) -> ApiResult<impl IntoResponse> {
    let pool = super::pool()?;

    let comment = access::comment_by_id(pool.as_ref(), id)
        .await?
        .ok_or(ApiError::NotFound)?;

    if comment.author_id != viewer.user_id {
        let post = access::post_by_id(pool.as_ref(), comment.post_id)
            .await?
            .ok_or(ApiError::NotFound)?;
        let allowed = membership::is_owner_or_author(
            pool.as_ref(),
            post.blog_id,
            post.blog_owner_id,
            viewer.user_id,
        )
        .await?;
        if !allowed {
            return Err(ApiError::NotAuthorized);
        }
    }

    sqlx::query("DELETE FROM comments WHERE id = $1")
        .bind(id)
        .execute(pool.as_ref())
        .await?;

    Ok(Json(SuccessResponse { success: true }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::auth::mint_token;
    use axum::body::Body;
    use axum::http::Request;
    use axum::routing::{get, post};
    use axum::Router;
    use tower::ServiceExt;

    fn test_router() -> Router {
        Router::new()
            .route("/api/comment", get(list_comments).post(create_comment))
    }

    async fn post_json(uri: &str, token: Option<&str>, json: serde_json::Value) -> StatusCode {
        let mut builder = Request::post(uri).header("content-type", "application/json");
        if let Some(t) = token {
            builder = builder.header("authorization", format!("Bearer {}", t));
        }
        let req = builder
            .body(Body::from(serde_json::to_vec(&json).unwrap()))
            .unwrap();
        test_router().oneshot(req).await.unwrap().status()
    }

    #[tokio::test]
    async fn test_create_comment_requires_auth() {
        let status = post_json(
            "/api/comment",
            None,
            serde_json::json!({"postId": Uuid::new_v4(), "content": "hi"}),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_create_comment_empty_content_returns_bad_request() {
        let token = mint_token(Uuid::new_v4(), None);
        let status = post_json(
            "/api/comment",
            Some(&token),
            serde_json::json!({"postId": Uuid::new_v4(), "content": "   "}),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_create_comment_without_pool_returns_unavailable() {
        let token = mint_token(Uuid::new_v4(), None);
        let status = post_json(
            "/api/comment",
            Some(&token),
            serde_json::json!({"postId": Uuid::new_v4(), "content": "hi"}),
        )
        .await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }
}

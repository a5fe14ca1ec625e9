/**
 * Engagement Routes
 * Likes, comment likes, and saved posts. Every insertion is gated by the
 * visibility filter against the target's owning blog; duplicates conflict
 * on the primary key.
 */
use axum::{extract::Path, http::StatusCode, response::IntoResponse, Json};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::access::{self, visibility};
use crate::db::{
    self,
    models::{CommentLike, Like, PostWithBlog, SavedPost},
};
use crate::error::{ApiError, ApiResult};
use crate::routes::auth::Viewer;
use crate::routes::SuccessResponse;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LikeBody {
    pub post_id: Uuid,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LikeCommentBody {
    pub comment_id: Uuid,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavePostBody {
    pub post_id: Uuid,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedPostListResponse {
    pub items: Vec<crate::routes::post::PostResponse>,
    pub total: i64,
}

// ============================================================================
// Helpers
// ============================================================================

/// Fetch the target post and run the engagement gate.
async fn engageable_post(
    pool: &sqlx::PgPool,
    post_id: Uuid,
    viewer: &Viewer,
) -> ApiResult<PostWithBlog> {
    let post = access::post_by_id(pool, post_id)
        .await?
        .ok_or(ApiError::NotFound)?;
    if !visibility::can_engage(pool, viewer.user_id, &post).await? {
        return Err(ApiError::NotAuthorized);
    }
    Ok(post)
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /api/like - Like a visible post
pub async fn create_like(viewer: Viewer, Json(payload): Json<LikeBody>) -> ApiResult<impl IntoResponse> {
    let pool = super::pool()?;
    let post = engageable_post(pool.as_ref(), payload.post_id, &viewer).await?;

    let like: Like = match sqlx::query_as(
        r#"
        INSERT INTO likes (post_id, user_id)
        VALUES ($1, $2)
        RETURNING post_id, user_id, liked_at
        "#,
    )
    .bind(post.id)
    .bind(viewer.user_id)
    .fetch_one(pool.as_ref())
    .await
    {
        Ok(like) => like,
        Err(e) if db::is_unique_violation(&e) => {
            return Err(ApiError::Conflict("post already liked".to_string()));
        }
        Err(e) => return Err(e.into()),
    };

    Ok((StatusCode::CREATED, Json(like)))
}

/// DELETE /api/like/:postId - Remove the viewer's like
pub async fn delete_like(viewer: Viewer, Path(post_id): Path<Uuid>) -> ApiResult<impl IntoResponse> {
    let pool = super::pool()?;

    let result = sqlx::query("DELETE FROM likes WHERE post_id = $1 AND user_id = $2")
        .bind(post_id)
        .bind(viewer.user_id)
        .execute(pool.as_ref())
        .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::NotFound);
    }
    Ok(Json(SuccessResponse { success: true }))
}

/// POST /api/like-comment - Like a comment on a visible post
pub async fn create_comment_like(
    viewer: Viewer,
    Json(payload): Json<LikeCommentBody>,
) -> ApiResult<impl IntoResponse> {
    let pool = super::pool()?;

    let comment = access::comment_by_id(pool.as_ref(), payload.comment_id)
        .await?
        .ok_or(ApiError::NotFound)?;
    engageable_post(pool.as_ref(), comment.post_id, &viewer).await?;

    let like: CommentLike = match sqlx::query_as(
        r#"
        INSERT INTO comment_likes (comment_id, user_id)
        VALUES ($1, $2)
        RETURNING comment_id, user_id, liked_at
        "#,
    )
    .bind(comment.id)
    .bind(viewer.user_id)
    .fetch_one(pool.as_ref())
    .await
    {
        Ok(like) => like,
        Err(e) if db::is_unique_violation(&e) => {
            return Err(ApiError::Conflict("comment already liked".to_string()));
        }
        Err(e) => return Err(e.into()),
    };

    Ok((StatusCode::CREATED, Json(like)))
}

/// DELETE /api/like-comment/:commentId - Remove the viewer's comment like
pub async fn delete_comment_like(
    viewer: Viewer,
    Path(comment_id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let pool = super::pool()?;

    let result = sqlx::query("DELETE FROM comment_likes WHERE comment_id = $1 AND user_id = $2")
        .bind(comment_id)
        .bind(viewer.user_id)
        .execute(pool.as_ref())
        .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::NotFound);
    }
    Ok(Json(SuccessResponse { success: true }))
}

/// POST /api/saved-post - Save a visible post for later
pub async fn create_saved_post(
    viewer: Viewer,
    Json(payload): Json<SavePostBody>,
) -> ApiResult<impl IntoResponse> {
    let pool = super::pool()?;
    let post = engageable_post(pool.as_ref(), payload.post_id, &viewer).await?;

    let saved: SavedPost = match sqlx::query_as(
        r#"
        INSERT INTO saved_posts (post_id, user_id)
        VALUES ($1, $2)
        RETURNING post_id, user_id, saved_at
        "#,
    )
    .bind(post.id)
    .bind(viewer.user_id)
    .fetch_one(pool.as_ref())
    .await
    {
        Ok(saved) => saved,
        Err(e) if db::is_unique_violation(&e) => {
            return Err(ApiError::Conflict("post already saved".to_string()));
        }
        Err(e) => return Err(e.into()),
    };

    Ok((StatusCode::CREATED, Json(saved)))
}

/// DELETE /api/saved-post/:postId - Remove a saved post
pub async fn delete_saved_post(
    viewer: Viewer,
    Path(post_id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let pool = super::pool()?;

    let result = sqlx::query("DELETE FROM saved_posts WHERE post_id = $1 AND user_id = $2")
        .bind(post_id)
        .bind(viewer.user_id)
        .execute(pool.as_ref())
        .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::NotFound);
    }
    Ok(Json(SuccessResponse { success: true }))
}

/// GET /api/saved-post - The viewer's saved posts, visibility-filtered.
/// Saving a post does not freeze access: posts whose blog has since gone
/// private on the viewer are filtered out like anywhere else.
pub async fn list_saved_posts(viewer: Viewer) -> ApiResult<impl IntoResponse> {
    let pool = super::pool()?;

    let candidates: Vec<PostWithBlog> = sqlx::query_as(
        r#"
        SELECT p.id, p.blog_id, p.author_id, p.title, p.slug, p.content,
               p.is_active, p.is_private, p.created_at,
               b.owner_id AS blog_owner_id,
               b.is_active AS blog_is_active,
               b.is_private AS blog_is_private
        FROM saved_posts sp
        JOIN posts p ON p.id = sp.post_id
        JOIN blogs b ON b.id = p.blog_id
        WHERE sp.user_id = $1
        ORDER BY sp.saved_at DESC
        "#,
    )
    .bind(viewer.user_id)
    .fetch_all(pool.as_ref())
    .await?;

    let visible =
        visibility::filter_posts(pool.as_ref(), Some(viewer.user_id), candidates).await?;

    let ids: Vec<Uuid> = visible.iter().map(|p| p.id).collect();
    let mut tags = super::post::tags_for_posts(pool.as_ref(), &ids).await?;

    let items: Vec<crate::routes::post::PostResponse> = visible
        .into_iter()
        .map(|row| {
            let post_tags = tags.remove(&row.id).unwrap_or_default();
            crate::routes::post::PostResponse::from_row(row, post_tags)
        })
        .collect();

    let total = items.len() as i64;
    Ok(Json(SavedPostListResponse { items, total }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::auth::mint_token;
    use axum::body::Body;
    use axum::http::Request;
    use axum::routing::post;
    use axum::Router;
    use tower::ServiceExt;

    fn test_router() -> Router {
        Router::new()
            .route("/api/like", post(create_like))
            .route("/api/like-comment", post(create_comment_like))
            .route("/api/saved-post", post(create_saved_post))
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
    async fn test_like_requires_auth() {
        let status = post_json(
            "/api/like",
            None,
            serde_json::json!({"postId": Uuid::new_v4()}),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_like_comment_requires_auth() {
        let status = post_json(
            "/api/like-comment",
            None,
            serde_json::json!({"commentId": Uuid::new_v4()}),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_save_post_without_pool_returns_unavailable() {
        let token = mint_token(Uuid::new_v4(), None);
        let status = post_json(
            "/api/saved-post",
            Some(&token),
            serde_json::json!({"postId": Uuid::new_v4()}),
        )
        .await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }
}

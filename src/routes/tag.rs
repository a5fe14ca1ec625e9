/**
 * Tag Routes
 * Public tag listing and per-viewer follow/unfollow. Tags themselves are
 * created implicitly by post saves, never through this surface.
 */
use axum::{
    extract::{Path, Query},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::{
    self,
    models::{FollowTag, Tag},
};
use crate::error::{ApiError, ApiResult};
use crate::routes::auth::Viewer;
use crate::routes::SuccessResponse;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TagListQuery {
    pub search: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TagListResponse {
    pub items: Vec<Tag>,
    pub total: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FollowTagBody {
    pub tag_id: Uuid,
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /api/tag - List tags, optionally filtered by name
pub async fn list_tags(Query(query): Query<TagListQuery>) -> ApiResult<impl IntoResponse> {
    let pool = super::pool()?;

    let items: Vec<Tag> = sqlx::query_as(
        r#"
        SELECT id, name
        FROM tags
        WHERE ($1::text IS NULL OR name ILIKE '%' || $1 || '%')
        ORDER BY name
        "#,
    )
    .bind(&query.search)
    .fetch_all(pool.as_ref())
    .await?;

    let total = items.len() as i64;
    Ok(Json(TagListResponse { items, total }))
}

/// POST /api/follow-tag - Follow a tag
pub async fn create_follow_tag(
    viewer: Viewer,
    Json(payload): Json<FollowTagBody>,
) -> ApiResult<impl IntoResponse> {
    let pool = super::pool()?;

    let follow: FollowTag = match sqlx::query_as(
        r#"
        INSERT INTO follow_tags (tag_id, user_id)
        VALUES ($1, $2)
        RETURNING tag_id, user_id, followed_at
        "#,
    )
    .bind(payload.tag_id)
    .bind(viewer.user_id)
    .fetch_one(pool.as_ref())
    .await
    {
        Ok(follow) => follow,
        Err(e) if db::is_unique_violation(&e) => {
            return Err(ApiError::Conflict("tag already followed".to_string()));
        }
        Err(e) if db::is_foreign_key_violation(&e) => {
            return Err(ApiError::NotFound);
        }
        Err(e) => return Err(e.into()),
    };

    Ok((StatusCode::CREATED, Json(follow)))
}

/// DELETE /api/follow-tag/:tagId - Unfollow a tag
pub async fn delete_follow_tag(
    viewer: Viewer,
    Path(tag_id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let pool = super::pool()?;

    let result = sqlx::query("DELETE FROM follow_tags WHERE tag_id = $1 AND user_id = $2")
        .bind(tag_id)
        .bind(viewer.user_id)
        .execute(pool.as_ref())
        .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::NotFound);
    }
    Ok(Json(SuccessResponse { success: true }))
}

/// GET /api/follow-tag - Tags the viewer follows
pub async fn list_followed_tags(viewer: Viewer) -> ApiResult<impl IntoResponse> {
    let pool = super::pool()?;

    let items: Vec<Tag> = sqlx::query_as(
        r#"
        SELECT t.id, t.name
        FROM follow_tags ft
        JOIN tags t ON t.id = ft.tag_id
        WHERE ft.user_id = $1
        ORDER BY t.name
        "#,
    )
    .bind(viewer.user_id)
    .fetch_all(pool.as_ref())
    .await?;

    let total = items.len() as i64;
    Ok(Json(TagListResponse { items, total }))
}

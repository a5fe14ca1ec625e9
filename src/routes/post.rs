/**
 * Post Routes
 * CRUD endpoints for posts. Reads run through the visibility filter;
 * writes require owner/co-author standing on the owning blog. Tags are
 * auto-created on save; embedded images are cleaned up on replace/delete.
 */
use std::collections::HashMap;

use axum::{
    extract::{Path, Query},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::access::{self, membership, visibility};
use crate::db::{self, models::PostWithBlog};
use crate::error::{ApiError, ApiResult};
use crate::routes::auth::{MaybeViewer, Viewer};
use crate::routes::{clamp_page, default_page, default_page_size, is_valid_slug, SuccessResponse};
use crate::storage::BlobStore;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Query parameters for GET /api/post (list)
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostListQuery {
    #[serde(default = "default_page")]
    pub page: i64,
    #[serde(default = "default_page_size")]
    pub page_size: i64,
    pub blog: Option<Uuid>,
    pub author: Option<Uuid>,
    pub is_active: Option<bool>,
    pub search: Option<String>,
}

/// Response for GET /api/post (list)
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostListResponse {
    pub items: Vec<PostResponse>,
    pub page: i64,
    pub page_size: i64,
    pub total: i64,
}

/// Full post response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostResponse {
    pub id: Uuid,
    pub blog_id: Uuid,
    pub author_id: Uuid,
    pub title: String,
    pub slug: String,
    pub content: String,
    pub tags: Vec<String>,
    pub is_active: bool,
    pub is_private: bool,
    pub created_at: DateTime<Utc>,
}

impl PostResponse {
    pub(crate) fn from_row(row: PostWithBlog, tags: Vec<String>) -> Self {
        PostResponse {
            id: row.id,
            blog_id: row.blog_id,
            author_id: row.author_id,
            title: row.title,
            slug: row.slug,
            content: row.content,
            tags,
            is_active: row.is_active,
            is_private: row.is_private,
            created_at: row.created_at,
        }
    }
}

/// Request body for POST /api/post (create)
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePostRequest {
    pub blog_id: Uuid,
    pub title: String,
    pub slug: String,
    pub content: String,
    #[serde(default)]
    pub is_private: bool,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Request body for PATCH /api/post/:id (update)
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePostRequest {
    pub title: Option<String>,
    pub content: Option<String>,
    pub is_active: Option<bool>,
    pub is_private: Option<bool>,
    pub tags: Option<Vec<String>>,
}

// ============================================================================
// Helpers
// ============================================================================

/// Sanitize HTML content using ammonia
fn sanitize_html(html: &str) -> String {
    ammonia::clean(html)
}

/// Trim, lowercase, drop empties, and dedupe tag names while preserving
/// their order of first appearance.
fn normalize_tags(tags: &[String]) -> Vec<String> {
    let mut seen = Vec::new();
    for tag in tags {
        let name = tag.trim().to_lowercase();
        if !name.is_empty() && !seen.contains(&name) {
            seen.push(name);
        }
    }
    seen
}

/// Replace a post's tag set. Unknown tags are created on first use;
/// re-creating an existing tag is a no-op.
async fn set_post_tags(
    tx: &mut Transaction<'_, Postgres>,
    post_id: Uuid,
    names: &[String],
) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM post_tags WHERE post_id = $1")
        .bind(post_id)
        .execute(&mut **tx)
        .await?;

    for name in names {
        sqlx::query("INSERT INTO tags (name) VALUES ($1) ON CONFLICT (name) DO NOTHING")
            .bind(name)
            .execute(&mut **tx)
            .await?;
        sqlx::query(
            r#"
            INSERT INTO post_tags (post_id, tag_id)
            SELECT $1, id FROM tags WHERE name = $2
            ON CONFLICT (post_id, tag_id) DO NOTHING
            "#,
        )
        .bind(post_id)
        .bind(name)
        .execute(&mut **tx)
        .await?;
    }

    Ok(())
}

pub(crate) async fn tags_for_posts(
    pool: &PgPool,
    post_ids: &[Uuid],
) -> Result<HashMap<Uuid, Vec<String>>, sqlx::Error> {
    if post_ids.is_empty() {
        return Ok(HashMap::new());
    }
    let rows: Vec<(Uuid, String)> = sqlx::query_as(
        r#"
        SELECT pt.post_id, t.name
        FROM post_tags pt
        JOIN tags t ON t.id = pt.tag_id
        WHERE pt.post_id = ANY($1)
        ORDER BY t.name
        "#,
    )
    .bind(post_ids)
    .fetch_all(pool)
    .await?;

    let mut map: HashMap<Uuid, Vec<String>> = HashMap::new();
    for (post_id, name) in rows {
        map.entry(post_id).or_default().push(name);
    }
    Ok(map)
}

/// Fetch a post and require owner/co-author standing on its blog.
async fn editable_post(pool: &PgPool, id: Uuid, viewer: &Viewer) -> ApiResult<PostWithBlog> {
    let post = access::post_by_id(pool, id).await?.ok_or(ApiError::NotFound)?;
    let allowed =
        membership::is_owner_or_author(pool, post.blog_id, post.blog_owner_id, viewer.user_id)
            .await?;
    if !allowed {
        return Err(ApiError::NotAuthorized);
    }
    Ok(post)
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /api/post - List posts visible to the viewer, with pagination
pub async fn list_posts(
    MaybeViewer(viewer): MaybeViewer,
    Query(query): Query<PostListQuery>,
) -> ApiResult<impl IntoResponse> {
    let pool = super::pool()?;
    let (page, page_size, offset) = clamp_page(query.page, query.page_size);

    let candidates: Vec<PostWithBlog> = sqlx::query_as(
        r#"
        SELECT p.id, p.blog_id, p.author_id, p.title, p.slug, p.content,
               p.is_active, p.is_private, p.created_at,
               b.owner_id AS blog_owner_id,
               b.is_active AS blog_is_active,
               b.is_private AS blog_is_private
        FROM posts p
        JOIN blogs b ON b.id = p.blog_id
        WHERE ($1::uuid IS NULL OR p.blog_id = $1)
          AND ($2::uuid IS NULL OR p.author_id = $2)
          AND ($3::boolean IS NULL OR p.is_active = $3)
          AND ($4::text IS NULL
               OR p.title ILIKE '%' || $4 || '%'
               OR p.content ILIKE '%' || $4 || '%')
        ORDER BY p.created_at DESC
        LIMIT $5 OFFSET $6
        "#,
    )
    .bind(query.blog)
    .bind(query.author)
    .bind(query.is_active)
    .bind(&query.search)
    .bind(page_size)
    .bind(offset)
    .fetch_all(pool.as_ref())
    .await?;

    let total: (i64,) = sqlx::query_as(
        r#"
        SELECT COUNT(*)
        FROM posts p
        WHERE ($1::uuid IS NULL OR p.blog_id = $1)
          AND ($2::uuid IS NULL OR p.author_id = $2)
          AND ($3::boolean IS NULL OR p.is_active = $3)
          AND ($4::text IS NULL
               OR p.title ILIKE '%' || $4 || '%'
               OR p.content ILIKE '%' || $4 || '%')
        "#,
    )
    .bind(query.blog)
    .bind(query.author)
    .bind(query.is_active)
    .bind(&query.search)
    .fetch_one(pool.as_ref())
    .await?;

    let visible = visibility::filter_posts(pool.as_ref(), viewer, candidates).await?;

    let ids: Vec<Uuid> = visible.iter().map(|p| p.id).collect();
    let mut tags = tags_for_posts(pool.as_ref(), &ids).await?;

    let items = visible
        .into_iter()
        .map(|row| {
            let post_tags = tags.remove(&row.id).unwrap_or_default();
            PostResponse::from_row(row, post_tags)
        })
        .collect();

    Ok(Json(PostListResponse {
        items,
        page,
        page_size,
        total: total.0,
    }))
}

/// POST /api/post - Create a post; the author must be the blog owner or a
/// co-author at write time
pub async fn create_post(
    viewer: Viewer,
    Json(payload): Json<CreatePostRequest>,
) -> ApiResult<impl IntoResponse> {
    if payload.title.trim().is_empty() {
        return Err(ApiError::Validation("title is required".to_string()));
    }
    if !is_valid_slug(&payload.slug) {
        return Err(ApiError::Validation(
            "slug must contain only lowercase letters, numbers, and hyphens".to_string(),
        ));
    }

    let pool = super::pool()?;

    let blog = access::blog_by_id(pool.as_ref(), payload.blog_id)
        .await?
        .ok_or(ApiError::NotFound)?;
    let allowed =
        membership::is_owner_or_author(pool.as_ref(), blog.id, blog.owner_id, viewer.user_id)
            .await?;
    if !allowed {
        return Err(ApiError::NotAuthorized);
    }

    let content = sanitize_html(&payload.content);
    let tags = normalize_tags(&payload.tags);

    let mut tx = pool.begin().await?;

    let inserted: Result<(Uuid,), sqlx::Error> = sqlx::query_as(
        r#"
        INSERT INTO posts (blog_id, author_id, title, slug, content, is_private)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING id
        "#,
    )
    .bind(blog.id)
    .bind(viewer.user_id)
    .bind(&payload.title)
    .bind(&payload.slug)
    .bind(&content)
    .bind(payload.is_private)
    .fetch_one(&mut *tx)
    .await;

    let (post_id,) = match inserted {
        Ok(row) => row,
        Err(e) if db::is_unique_violation(&e) => {
            return Err(ApiError::Conflict("slug already exists".to_string()));
        }
        Err(e) => return Err(e.into()),
    };

    set_post_tags(&mut tx, post_id, &tags).await?;
    tx.commit().await?;

    tracing::info!(post_id = %post_id, blog_id = %blog.id, "post created");

    let post = access::post_by_id(pool.as_ref(), post_id)
        .await?
        .ok_or(ApiError::NotFound)?;
    Ok((StatusCode::CREATED, Json(PostResponse::from_row(post, tags))))
}

/// GET /api/post/:id - Post detail; non-visible private posts fail with 403
pub async fn get_post(
    MaybeViewer(viewer): MaybeViewer,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let pool = super::pool()?;

    let post = access::post_by_id(pool.as_ref(), id)
        .await?
        .ok_or(ApiError::NotFound)?;

    if !visibility::can_view_post(pool.as_ref(), viewer, &post).await? {
        return Err(ApiError::NotAuthorized);
    }

    let mut tags = tags_for_posts(pool.as_ref(), &[post.id]).await?;
    let post_tags = tags.remove(&post.id).unwrap_or_default();
    Ok(Json(PostResponse::from_row(post, post_tags)))
}

/// PATCH /api/post/:id - Update a post (owner/co-author only)
pub async fn update_post(
    viewer: Viewer,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdatePostRequest>,
) -> ApiResult<impl IntoResponse> {
    let pool = super::pool()?;
    let existing = editable_post(pool.as_ref(), id, &viewer).await?;

    let title = payload.title.unwrap_or_else(|| existing.title.clone());
    if title.trim().is_empty() {
        return Err(ApiError::Validation("title is required".to_string()));
    }
    let content = payload
        .content
        .as_deref()
        .map(sanitize_html)
        .unwrap_or_else(|| existing.content.clone());
    let is_active = payload.is_active.unwrap_or(existing.is_active);
    let is_private = payload.is_private.unwrap_or(existing.is_private);
    let tags = payload.tags.as_deref().map(normalize_tags);

    let mut tx = pool.begin().await?;

    sqlx::query(
        r#"
        UPDATE posts
        SET title = $1, content = $2, is_active = $3, is_private = $4
        WHERE id = $5
        "#,
    )
    .bind(&title)
    .bind(&content)
    .bind(is_active)
    .bind(is_private)
    .bind(id)
    .execute(&mut *tx)
    .await?;

    if let Some(tags) = &tags {
        set_post_tags(&mut tx, id, tags).await?;
    }

    tx.commit().await?;

    // Images embedded in the old content but gone from the new one are
    // orphans; removing their blobs must not fail the update.
    let store = BlobStore::from_env();
    let new_refs = store.embedded_refs(&content);
    for reference in store.embedded_refs(&existing.content) {
        if !new_refs.contains(&reference) {
            store.delete(&reference).await;
        }
    }

    let post = access::post_by_id(pool.as_ref(), id)
        .await?
        .ok_or(ApiError::NotFound)?;
    let mut all_tags = tags_for_posts(pool.as_ref(), &[id]).await?;
    let post_tags = all_tags.remove(&id).unwrap_or_default();
    Ok(Json(PostResponse::from_row(post, post_tags)))
}

/// DELETE /api/post/:id - Delete a post (owner/co-author only)
pub async fn delete_post(viewer: Viewer, Path(id): Path<Uuid>) -> ApiResult<impl IntoResponse> {
    let pool = super::pool()?;
    let post = editable_post(pool.as_ref(), id, &viewer).await?;

    sqlx::query("DELETE FROM posts WHERE id = $1")
        .bind(id)
        .execute(pool.as_ref())
        .await?;

    let store = BlobStore::from_env();
    for reference in store.embedded_refs(&post.content) {
        store.delete(&reference).await;
    }

    tracing::info!(post_id = %id, "post deleted");
    Ok(Json(SuccessResponse { success: true }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::auth::mint_token;
    use axum::body::Body;
    use axum::http::Request;
    use axum::routing::get;
    use axum::Router;
    use tower::ServiceExt;

    fn test_router() -> Router {
        Router::new()
            .route("/api/post", get(list_posts).post(create_post))
            .route(
                "/api/post/{id}",
                get(get_post).patch(update_post).delete(delete_post),
            )
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

    #[test]
    fn test_normalize_tags_trims_lowercases_and_dedupes() {
        let tags = vec![
            "  Rust ".to_string(),
            "rust".to_string(),
            "".to_string(),
            "Web".to_string(),
        ];
        assert_eq!(normalize_tags(&tags), vec!["rust", "web"]);
    }

    #[test]
    fn test_sanitize_html_strips_scripts() {
        let dirty = r#"<p>hello</p><script>alert(1)</script>"#;
        let clean = sanitize_html(dirty);
        assert!(clean.contains("<p>hello</p>"));
        assert!(!clean.contains("script"));
    }

    #[tokio::test]
    async fn test_create_post_requires_auth() {
        let status = post_json(
            "/api/post",
            None,
            serde_json::json!({
                "blogId": Uuid::new_v4(),
                "title": "T",
                "slug": "t",
                "content": "c"
            }),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_create_post_invalid_slug_returns_bad_request() {
        let token = mint_token(Uuid::new_v4(), None);
        let status = post_json(
            "/api/post",
            Some(&token),
            serde_json::json!({
                "blogId": Uuid::new_v4(),
                "title": "T",
                "slug": "Bad Slug!",
                "content": "c"
            }),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_create_post_without_pool_returns_unavailable() {
        let token = mint_token(Uuid::new_v4(), None);
        let status = post_json(
            "/api/post",
            Some(&token),
            serde_json::json!({
                "blogId": Uuid::new_v4(),
                "title": "T",
                "slug": "t",
                "content": "c"
            }),
        )
        .await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }
}

/**
 * Blog Routes
 * CRUD endpoints for blogs, co-author management, and logo upload.
 * Reads are visibility-filtered; writes are owner-only.
 */
use axum::{
    extract::{Multipart, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use crate::access::{self, visibility};
use crate::db::{self, models::Blog};
use crate::error::{ApiError, ApiResult};
use crate::routes::auth::{MaybeViewer, Viewer};
use crate::routes::{clamp_page, default_page, default_page_size, is_valid_slug, SuccessResponse};
use crate::storage::BlobStore;

const MAX_LOGO_SIZE: usize = 5 * 1024 * 1024; // 5MB

// ============================================================================
// Request/Response Types
// ============================================================================

/// Query parameters for GET /api/blog (list)
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlogListQuery {
    #[serde(default = "default_page")]
    pub page: i64,
    #[serde(default = "default_page_size")]
    pub page_size: i64,
    pub owner: Option<Uuid>,
    pub is_active: Option<bool>,
    pub search: Option<String>,
}

/// Response for GET /api/blog (list)
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BlogListResponse {
    pub items: Vec<BlogResponse>,
    pub page: i64,
    pub page_size: i64,
    pub total: i64,
}

/// Full blog representation returned by list and detail endpoints.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BlogResponse {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub co_authors: Vec<Uuid>,
    pub title: String,
    pub slug: String,
    pub description: Option<String>,
    pub logo: Option<String>,
    pub is_active: bool,
    pub is_private: bool,
    pub posts_count: i64,
    pub created_at: DateTime<Utc>,
}

/// Blog row joined with its post count.
#[derive(Debug, sqlx::FromRow)]
struct BlogWithCount {
    id: Uuid,
    owner_id: Uuid,
    title: String,
    slug: String,
    description: Option<String>,
    logo_ref: Option<String>,
    is_active: bool,
    is_private: bool,
    created_at: DateTime<Utc>,
    posts_count: i64,
}

impl BlogWithCount {
    fn into_response_with(self, co_authors: Vec<Uuid>) -> BlogResponse {
        BlogResponse {
            id: self.id,
            owner_id: self.owner_id,
            co_authors,
            title: self.title,
            slug: self.slug,
            description: self.description,
            logo: self.logo_ref,
            is_active: self.is_active,
            is_private: self.is_private,
            posts_count: self.posts_count,
            created_at: self.created_at,
        }
    }

    fn gate(&self) -> Blog {
        Blog {
            id: self.id,
            owner_id: self.owner_id,
            title: self.title.clone(),
            slug: self.slug.clone(),
            description: None,
            logo_ref: None,
            is_active: self.is_active,
            is_private: self.is_private,
            created_at: self.created_at,
        }
    }
}

/// Request body for POST /api/blog (create)
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBlogRequest {
    pub title: String,
    pub slug: String,
    pub description: Option<String>,
    #[serde(default)]
    pub is_private: bool,
}

/// Request body for PATCH /api/blog/:id (update)
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateBlogRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub is_active: Option<bool>,
    pub is_private: Option<bool>,
    pub co_authors: Option<Vec<Uuid>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogoResponse {
    pub logo: String,
}

// ============================================================================
// Helpers
// ============================================================================

async fn co_authors_of(pool: &PgPool, blog_id: Uuid) -> Result<Vec<Uuid>, sqlx::Error> {
    let rows: Vec<(Uuid,)> =
        sqlx::query_as("SELECT user_id FROM blog_authors WHERE blog_id = $1 ORDER BY user_id")
            .bind(blog_id)
            .fetch_all(pool)
            .await?;
    Ok(rows.into_iter().map(|(id,)| id).collect())
}

async fn blog_with_count(pool: &PgPool, id: Uuid) -> Result<Option<BlogWithCount>, sqlx::Error> {
    sqlx::query_as::<_, BlogWithCount>(
        r#"
        SELECT b.id, b.owner_id, b.title, b.slug, b.description, b.logo_ref,
               b.is_active, b.is_private, b.created_at,
               (SELECT COUNT(*) FROM posts WHERE blog_id = b.id) AS posts_count
        FROM blogs b
        WHERE b.id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await
}

/// Fetch a blog and require the viewer to be its owner.
async fn owned_blog(pool: &PgPool, id: Uuid, viewer: &Viewer) -> ApiResult<Blog> {
    let blog = access::blog_by_id(pool, id).await?.ok_or(ApiError::NotFound)?;
    if blog.owner_id != viewer.user_id {
        return Err(ApiError::NotAuthorized);
    }
    Ok(blog)
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /api/blog - List blogs visible to the viewer, with pagination
pub async fn list_blogs(
    MaybeViewer(viewer): MaybeViewer,
    Query(query): Query<BlogListQuery>,
) -> ApiResult<impl IntoResponse> {
    let pool = super::pool()?;
    let (page, page_size, offset) = clamp_page(query.page, query.page_size);

    let candidates: Vec<BlogWithCount> = sqlx::query_as(
        r#"
        SELECT b.id, b.owner_id, b.title, b.slug, b.description, b.logo_ref,
               b.is_active, b.is_private, b.created_at,
               (SELECT COUNT(*) FROM posts WHERE blog_id = b.id) AS posts_count
        FROM blogs b
        WHERE ($1::uuid IS NULL OR b.owner_id = $1)
          AND ($2::boolean IS NULL OR b.is_active = $2)
          AND ($3::text IS NULL
               OR b.title ILIKE '%' || $3 || '%'
               OR b.description ILIKE '%' || $3 || '%')
        ORDER BY b.created_at DESC
        LIMIT $4 OFFSET $5
        "#,
    )
    .bind(query.owner)
    .bind(query.is_active)
    .bind(&query.search)
    .bind(page_size)
    .bind(offset)
    .fetch_all(pool.as_ref())
    .await?;

    let total: (i64,) = sqlx::query_as(
        r#"
        SELECT COUNT(*)
        FROM blogs b
        WHERE ($1::uuid IS NULL OR b.owner_id = $1)
          AND ($2::boolean IS NULL OR b.is_active = $2)
          AND ($3::text IS NULL
               OR b.title ILIKE '%' || $3 || '%'
               OR b.description ILIKE '%' || $3 || '%')
        "#,
    )
    .bind(query.owner)
    .bind(query.is_active)
    .bind(&query.search)
    .fetch_one(pool.as_ref())
    .await?;

    // Two-phase: candidates above, visibility filter here.
    let mut items = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        if !visibility::can_view(pool.as_ref(), viewer, &candidate.gate()).await? {
            continue;
        }
        let co_authors = co_authors_of(pool.as_ref(), candidate.id).await?;
        items.push(candidate.into_response_with(co_authors));
    }

    Ok(Json(BlogListResponse {
        items,
        page,
        page_size,
        total: total.0,
    }))
}

/// POST /api/blog - Create a blog; the caller becomes its owner
pub async fn create_blog(
    viewer: Viewer,
    Json(payload): Json<CreateBlogRequest>,
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

    let blog = match sqlx::query_as::<_, Blog>(
        r#"
        INSERT INTO blogs (owner_id, title, slug, description, is_private)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING id, owner_id, title, slug, description, logo_ref, is_active, is_private, created_at
        "#,
    )
    .bind(viewer.user_id)
    .bind(&payload.title)
    .bind(&payload.slug)
    .bind(&payload.description)
    .bind(payload.is_private)
    .fetch_one(pool.as_ref())
    .await
    {
        Ok(blog) => blog,
        Err(e) if db::is_unique_violation(&e) => {
            return Err(ApiError::Conflict("slug already exists".to_string()));
        }
        Err(e) => return Err(e.into()),
    };

    tracing::info!(blog_id = %blog.id, owner = %viewer.user_id, "blog created");

    Ok((
        StatusCode::CREATED,
        Json(BlogResponse {
            id: blog.id,
            owner_id: blog.owner_id,
            co_authors: vec![],
            title: blog.title,
            slug: blog.slug,
            description: blog.description,
            logo: blog.logo_ref,
            is_active: blog.is_active,
            is_private: blog.is_private,
            posts_count: 0,
            created_at: blog.created_at,
        }),
    ))
}

/// GET /api/blog/:id - Blog detail, gated by the visibility filter
pub async fn get_blog(
    MaybeViewer(viewer): MaybeViewer,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let pool = super::pool()?;

    let blog = blog_with_count(pool.as_ref(), id)
        .await?
        .ok_or(ApiError::NotFound)?;

    if !visibility::can_view(pool.as_ref(), viewer, &blog.gate()).await? {
        return Err(ApiError::NotAuthorized);
    }

    let co_authors = co_authors_of(pool.as_ref(), blog.id).await?;
    Ok(Json(blog.into_response_with(co_authors)))
}

/// PATCH /api/blog/:id - Reconfigure a blog (owner only)
pub async fn update_blog(
    viewer: Viewer,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateBlogRequest>,
) -> ApiResult<impl IntoResponse> {
    let pool = super::pool()?;
    let existing = owned_blog(pool.as_ref(), id, &viewer).await?;

    let title = payload.title.unwrap_or(existing.title);
    if title.trim().is_empty() {
        return Err(ApiError::Validation("title is required".to_string()));
    }
    let description = payload.description.or(existing.description);
    let is_active = payload.is_active.unwrap_or(existing.is_active);
    let is_private = payload.is_private.unwrap_or(existing.is_private);

    let mut tx = pool.begin().await?;

    sqlx::query(
        r#"
        UPDATE blogs
        SET title = $1, description = $2, is_active = $3, is_private = $4
        WHERE id = $5
        "#,
    )
    .bind(&title)
    .bind(&description)
    .bind(is_active)
    .bind(is_private)
    .bind(id)
    .execute(&mut *tx)
    .await?;

    if let Some(co_authors) = &payload.co_authors {
        sqlx::query("DELETE FROM blog_authors WHERE blog_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        for user_id in co_authors {
            // The owner is implicitly a member; never duplicate them into
            // the co-author set.
            if *user_id == existing.owner_id {
                continue;
            }
            sqlx::query(
                r#"
                INSERT INTO blog_authors (blog_id, user_id)
                VALUES ($1, $2)
                ON CONFLICT (blog_id, user_id) DO NOTHING
                "#,
            )
            .bind(id)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        }
    }

    tx.commit().await?;

    let blog = blog_with_count(pool.as_ref(), id)
        .await?
        .ok_or(ApiError::NotFound)?;
    let co_authors = co_authors_of(pool.as_ref(), id).await?;
    Ok(Json(blog.into_response_with(co_authors)))
}

/// DELETE /api/blog/:id - Delete a blog (owner only); cascades to posts,
/// memberships, and requests; the logo blob delete is best-effort.
pub async fn delete_blog(viewer: Viewer, Path(id): Path<Uuid>) -> ApiResult<impl IntoResponse> {
    let pool = super::pool()?;
    let blog = owned_blog(pool.as_ref(), id, &viewer).await?;

    sqlx::query("DELETE FROM blogs WHERE id = $1")
        .bind(id)
        .execute(pool.as_ref())
        .await?;

    if let Some(logo_ref) = &blog.logo_ref {
        BlobStore::from_env().delete(logo_ref).await;
    }

    tracing::info!(blog_id = %id, "blog deleted");
    Ok(Json(SuccessResponse { success: true }))
}

/// POST /api/blog/:id/logo - Replace the blog logo (owner only)
pub async fn upload_logo(
    viewer: Viewer,
    Path(id): Path<Uuid>,
    mut multipart: Multipart,
) -> ApiResult<impl IntoResponse> {
    let pool = super::pool()?;
    let blog = owned_blog(pool.as_ref(), id, &viewer).await?;

    let field = multipart
        .next_field()
        .await
        .map_err(|_| ApiError::Validation("malformed multipart body".to_string()))?
        .ok_or_else(|| ApiError::Validation("no file provided".to_string()))?;

    let bytes = field
        .bytes()
        .await
        .map_err(|_| ApiError::Validation("failed to read file".to_string()))?;

    if bytes.len() > MAX_LOGO_SIZE {
        return Err(ApiError::Validation("file exceeds the 5MB limit".to_string()));
    }

    let store = BlobStore::from_env();
    let (reference, _mime) = store.put(&bytes).await?;

    sqlx::query("UPDATE blogs SET logo_ref = $1 WHERE id = $2")
        .bind(&reference)
        .bind(id)
        .execute(pool.as_ref())
        .await?;

    // Replaced logo is orphaned now; removal failures only get logged.
    if let Some(old_ref) = &blog.logo_ref {
        store.delete(old_ref).await;
    }

    Ok(Json(LogoResponse { logo: reference }))
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
            .route("/api/blog", get(list_blogs).post(create_blog))
            .route(
                "/api/blog/{id}",
                get(get_blog).patch(update_blog).delete(delete_blog),
            )
            .route("/api/blog/{id}/logo", post(upload_logo))
    }

    async fn post_json(
        uri: &str,
        token: Option<&str>,
        json: serde_json::Value,
    ) -> StatusCode {
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
    async fn test_create_blog_requires_auth() {
        let status = post_json(
            "/api/blog",
            None,
            serde_json::json!({"title": "Blog", "slug": "blog"}),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_create_blog_empty_title_returns_bad_request() {
        let token = mint_token(Uuid::new_v4(), None);
        let status = post_json(
            "/api/blog",
            Some(&token),
            serde_json::json!({"title": "  ", "slug": "blog"}),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_create_blog_invalid_slug_returns_bad_request() {
        let token = mint_token(Uuid::new_v4(), None);
        let status = post_json(
            "/api/blog",
            Some(&token),
            serde_json::json!({"title": "Blog", "slug": "Not A Slug"}),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_create_blog_without_pool_returns_unavailable() {
        let token = mint_token(Uuid::new_v4(), None);
        let status = post_json(
            "/api/blog",
            Some(&token),
            serde_json::json!({"title": "Blog", "slug": "blog"}),
        )
        .await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_list_blogs_without_pool_returns_unavailable() {
        let req = Request::get("/api/blog").body(Body::empty()).unwrap();
        let res = test_router().oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}

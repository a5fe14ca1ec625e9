/**
 * Report Routes
 * Moderation reports: free insertion by any authenticated viewer, list and
 * status updates for moderators. No workflow beyond the status field.
 */
use axum::{
    extract::{Path, Query},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::{self, models::Report};
use crate::error::{ApiError, ApiResult};
use crate::routes::auth::{Moderator, Viewer};
use crate::routes::{clamp_page, default_page, default_page_size};

/// Closed set of report statuses.
const REPORT_STATUSES: &[&str] = &["open", "reviewed", "resolved", "dismissed"];

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateReportRequest {
    pub blog_id: Option<Uuid>,
    pub post_id: Option<Uuid>,
    pub comment_id: Option<Uuid>,
    pub content: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateReportRequest {
    pub status: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportListQuery {
    #[serde(default = "default_page")]
    pub page: i64,
    #[serde(default = "default_page_size")]
    pub page_size: i64,
    pub status: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportListResponse {
    pub items: Vec<Report>,
    pub page: i64,
    pub page_size: i64,
    pub total: i64,
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /api/report - File a report against a blog, post, or comment
pub async fn create_report(
    viewer: Viewer,
    Json(payload): Json<CreateReportRequest>,
) -> ApiResult<impl IntoResponse> {
    if payload.content.trim().is_empty() {
        return Err(ApiError::Validation("content is required".to_string()));
    }
    if payload.blog_id.is_none() && payload.post_id.is_none() && payload.comment_id.is_none() {
        return Err(ApiError::Validation(
            "a report must reference a blog, post, or comment".to_string(),
        ));
    }

    let pool = super::pool()?;

    let report: Report = match sqlx::query_as(
        r#"
        INSERT INTO reports (reporter_id, blog_id, post_id, comment_id, content)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING id, reporter_id, blog_id, post_id, comment_id, content, status, reported_at
        "#,
    )
    .bind(viewer.user_id)
    .bind(payload.blog_id)
    .bind(payload.post_id)
    .bind(payload.comment_id)
    .bind(payload.content.trim())
    .fetch_one(pool.as_ref())
    .await
    {
        Ok(report) => report,
        Err(e) if db::is_foreign_key_violation(&e) => {
            return Err(ApiError::NotFound);
        }
        Err(e) => return Err(e.into()),
    };

    tracing::info!(report_id = %report.id, reporter = %viewer.user_id, "report filed");
    Ok((StatusCode::CREATED, Json(report)))
}

/// GET /api/report - List reports (moderators only)
pub async fn list_reports(
    _moderator: Moderator,
    Query(query): Query<ReportListQuery>,
) -> ApiResult<impl IntoResponse> {
    if let Some(status) = &query.status {
        if !REPORT_STATUSES.contains(&status.as_str()) {
            return Err(ApiError::Validation(format!(
                "unknown report status: {}",
                status
            )));
        }
    }

    let pool = super::pool()?;
    let (page, page_size, offset) = clamp_page(query.page, query.page_size);

    let items: Vec<Report> = sqlx::query_as(
        r#"
        SELECT id, reporter_id, blog_id, post_id, comment_id, content, status, reported_at
        FROM reports
        WHERE ($1::text IS NULL OR status = $1)
        ORDER BY reported_at DESC
        LIMIT $2 OFFSET $3
        "#,
    )
    .bind(&query.status)
    .bind(page_size)
    .bind(offset)
    .fetch_all(pool.as_ref())
    .await?;

    let total: (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM reports WHERE ($1::text IS NULL OR status = $1)")
            .bind(&query.status)
            .fetch_one(pool.as_ref())
            .await?;

    Ok(Json(ReportListResponse {
        items,
        page,
        page_size,
        total: total.0,
    }))
}

/// PATCH /api/report/:id - Update a report's status (moderators only)
pub async fn update_report(
    _moderator: Moderator,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateReportRequest>,
) -> ApiResult<impl IntoResponse> {
    if !REPORT_STATUSES.contains(&payload.status.as_str()) {
        return Err(ApiError::Validation(format!(
            "unknown report status: {}",
            payload.status
        )));
    }

    let pool = super::pool()?;

    let report: Option<Report> = sqlx::query_as(
        r#"
        UPDATE reports
        SET status = $2
        WHERE id = $1
        RETURNING id, reporter_id, blog_id, post_id, comment_id, content, status, reported_at
        "#,
    )
    .bind(id)
    .bind(&payload.status)
    .fetch_optional(pool.as_ref())
    .await?;

    let report = report.ok_or(ApiError::NotFound)?;
    Ok(Json(report))
}

//! Database models - structs representing database tables (used by sqlx/serde).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Blog model. `owner_id` is an opaque user reference issued by the
/// external auth service; co-authors live in `blog_authors`.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Blog {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub title: String,
    pub slug: String,
    pub description: Option<String>,
    pub logo_ref: Option<String>,
    pub is_active: bool,
    pub is_private: bool,
    pub created_at: DateTime<Utc>,
}

/// Confirmed membership of a private blog. Created only by an accepted
/// subscribe request, never directly.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscriber {
    pub id: Uuid,
    pub blog_id: Uuid,
    pub user_id: Uuid,
    pub subscribed_at: DateTime<Utc>,
}

/// A user's pending/resolved attempt to join a private blog.
/// `status` is one of `pending`, `accepted`, `rejected`; `is_deleted` is
/// true iff the request has reached a terminal state.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscribeRequest {
    pub id: Uuid,
    pub blog_id: Uuid,
    pub user_id: Uuid,
    pub requested_at: DateTime<Utc>,
    pub status: String,
    pub is_deleted: bool,
}

/// Post model.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: Uuid,
    pub blog_id: Uuid,
    pub author_id: Uuid,
    pub title: String,
    pub slug: String,
    pub content: String,
    pub is_active: bool,
    pub is_private: bool,
    pub created_at: DateTime<Utc>,
}

/// Post joined with the owning blog's gate columns. List and detail
/// endpoints fetch this shape so the visibility filter can run without a
/// second lookup per item.
#[derive(Debug, Clone, FromRow)]
pub struct PostWithBlog {
    pub id: Uuid,
    pub blog_id: Uuid,
    pub author_id: Uuid,
    pub title: String,
    pub slug: String,
    pub content: String,
    pub is_active: bool,
    pub is_private: bool,
    pub created_at: DateTime<Utc>,
    pub blog_owner_id: Uuid,
    pub blog_is_active: bool,
    pub blog_is_private: bool,
}

/// Comment model. `reply_to`, when set, must reference a comment on the
/// same post.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: Uuid,
    pub post_id: Uuid,
    pub author_id: Uuid,
    pub content: String,
    pub reply_to: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tag {
    pub id: Uuid,
    pub name: String,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Like {
    pub post_id: Uuid,
    pub user_id: Uuid,
    pub liked_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentLike {
    pub comment_id: Uuid,
    pub user_id: Uuid,
    pub liked_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedPost {
    pub post_id: Uuid,
    pub user_id: Uuid,
    pub saved_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FollowTag {
    pub tag_id: Uuid,
    pub user_id: Uuid,
    pub followed_at: DateTime<Utc>,
}

/// Moderation report. Free insertion; `status` is a plain field with no
/// workflow behind it.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub id: Uuid,
    pub reporter_id: Uuid,
    pub blog_id: Option<Uuid>,
    pub post_id: Option<Uuid>,
    pub comment_id: Option<Uuid>,
    pub content: String,
    pub status: String,
    pub reported_at: DateTime<Utc>,
}

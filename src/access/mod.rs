//! Access control for private-blog content: the membership store, the
//! subscription request workflow, and the visibility filter. Routes treat
//! these as precondition gates before any read or write on blog content.

pub mod membership;
pub mod subscription;
pub mod visibility;

use sqlx::PgPool;
use uuid::Uuid;

use crate::db::models::{Blog, Comment, PostWithBlog};

pub async fn blog_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Blog>, sqlx::Error> {
    sqlx::query_as::<_, Blog>(
        r#"
        SELECT id, owner_id, title, slug, description, logo_ref, is_active, is_private, created_at
        FROM blogs
        WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await
}

pub async fn post_by_id(pool: &PgPool, id: Uuid) -> Result<Option<PostWithBlog>, sqlx::Error> {
    sqlx::query_as::<_, PostWithBlog>(
        r#"
        SELECT p.id, p.blog_id, p.author_id, p.title, p.slug, p.content,
               p.is_active, p.is_private, p.created_at,
               b.owner_id AS blog_owner_id,
               b.is_active AS blog_is_active,
               b.is_private AS blog_is_private
        FROM posts p
        JOIN blogs b ON b.id = p.blog_id
        WHERE p.id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await
}

pub async fn comment_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Comment>, sqlx::Error> {
    sqlx::query_as::<_, Comment>(
        r#"
        SELECT id, post_id, author_id, content, reply_to, created_at
        FROM comments
        WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await
}

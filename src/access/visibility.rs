//! Visibility filter: per-item access checks gating reads and engagement
//! on blog content. Policy decisions are pure functions over the entity
//! flags and the viewer's membership; the async wrappers only resolve
//! membership. List endpoints fetch a candidate set first and then apply
//! the filter as a pure pass over it.

use std::collections::HashMap;

use sqlx::PgPool;
use uuid::Uuid;

use super::membership::{self, Membership};
use crate::db::models::{Blog, PostWithBlog};

/// Blog-level policy. Inactive blogs are visible to the owner and
/// co-authors only; public active blogs to anyone; private active blogs
/// to members.
pub fn blog_visible(is_active: bool, is_private: bool, m: Membership) -> bool {
    if !is_active {
        return m.is_owner_or_author();
    }
    !is_private || m.is_member()
}

/// Post-level policy: the blog rule first, then inactive or private
/// (draft) posts require owner/co-author standing.
pub fn post_visible(
    blog_active: bool,
    blog_private: bool,
    post_active: bool,
    post_private: bool,
    m: Membership,
) -> bool {
    if !blog_visible(blog_active, blog_private, m) {
        return false;
    }
    if post_active && !post_private {
        return true;
    }
    m.is_owner_or_author()
}

pub async fn can_view(
    pool: &PgPool,
    viewer: Option<Uuid>,
    blog: &Blog,
) -> Result<bool, sqlx::Error> {
    // Fully public content needs no membership lookup.
    if blog.is_active && !blog.is_private {
        return Ok(true);
    }
    let m = membership::membership_of(pool, blog.id, blog.owner_id, viewer).await?;
    Ok(blog_visible(blog.is_active, blog.is_private, m))
}

pub async fn can_view_post(
    pool: &PgPool,
    viewer: Option<Uuid>,
    post: &PostWithBlog,
) -> Result<bool, sqlx::Error> {
    if post.blog_is_active && !post.blog_is_private && post.is_active && !post.is_private {
        return Ok(true);
    }
    let m = membership::membership_of(pool, post.blog_id, post.blog_owner_id, viewer).await?;
    Ok(post_visible(
        post.blog_is_active,
        post.blog_is_private,
        post.is_active,
        post.is_private,
        m,
    ))
}

/// Engagement (like, comment-like, save, comment) uses the same rule as
/// viewing, with an authenticated viewer. One rule for every engagement
/// type.
pub async fn can_engage(
    pool: &PgPool,
    user_id: Uuid,
    post: &PostWithBlog,
) -> Result<bool, sqlx::Error> {
    can_view_post(pool, Some(user_id), post).await
}

/// Filter a fetched candidate set down to the posts the viewer may see.
/// Membership is resolved at most once per distinct blog in the set;
/// filtering never mutates the sequence being walked.
pub async fn filter_posts(
    pool: &PgPool,
    viewer: Option<Uuid>,
    candidates: Vec<PostWithBlog>,
) -> Result<Vec<PostWithBlog>, sqlx::Error> {
    let mut memberships: HashMap<Uuid, Membership> = HashMap::new();
    let mut visible = Vec::with_capacity(candidates.len());

    for post in candidates {
        if post.blog_is_active && !post.blog_is_private && post.is_active && !post.is_private {
            visible.push(post);
            continue;
        }
        let m = match memberships.get(&post.blog_id) {
            Some(m) => *m,
            None => {
                let m =
                    membership::membership_of(pool, post.blog_id, post.blog_owner_id, viewer)
                        .await?;
                memberships.insert(post.blog_id, m);
                m
            }
        };
        if post_visible(
            post.blog_is_active,
            post.blog_is_private,
            post.is_active,
            post.is_private,
            m,
        ) {
            visible.push(post);
        }
    }

    Ok(visible)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_active_blog_visible_to_anyone() {
        assert!(blog_visible(true, false, Membership::None));
        assert!(blog_visible(true, false, Membership::Subscriber));
        assert!(blog_visible(true, false, Membership::Owner));
    }

    #[test]
    fn test_private_blog_visible_iff_member() {
        assert!(!blog_visible(true, true, Membership::None));
        assert!(blog_visible(true, true, Membership::Subscriber));
        assert!(blog_visible(true, true, Membership::Author));
        assert!(blog_visible(true, true, Membership::Owner));
    }

    #[test]
    fn test_inactive_blog_visible_to_owner_and_authors_only() {
        assert!(!blog_visible(false, false, Membership::None));
        assert!(!blog_visible(false, false, Membership::Subscriber));
        assert!(blog_visible(false, false, Membership::Author));
        assert!(blog_visible(false, true, Membership::Owner));
    }

    #[test]
    fn test_draft_post_requires_owner_or_author() {
        // Private (draft) post on a public blog.
        assert!(!post_visible(true, false, true, true, Membership::None));
        assert!(!post_visible(true, false, true, true, Membership::Subscriber));
        assert!(post_visible(true, false, true, true, Membership::Author));

        // Inactive post behaves the same way.
        assert!(!post_visible(true, false, false, false, Membership::Subscriber));
        assert!(post_visible(true, false, false, false, Membership::Owner));
    }

    #[test]
    fn test_post_on_private_blog_needs_membership_first() {
        // A plainly public post still hides behind its private blog.
        assert!(!post_visible(true, true, true, false, Membership::None));
        assert!(post_visible(true, true, true, false, Membership::Subscriber));
    }

    #[test]
    fn test_post_on_inactive_blog_hidden_from_subscribers() {
        assert!(!post_visible(false, true, true, false, Membership::Subscriber));
        assert!(post_visible(false, true, true, false, Membership::Author));
    }
}

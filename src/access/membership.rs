//! Membership store: answers "what standing does viewer V have towards
//! blog B?". Read-only; populated by the subscription workflow (and by
//! blog owners editing the co-author set).

use sqlx::PgPool;
use uuid::Uuid;

/// A viewer's standing towards a blog, ordered from weakest to strongest.
/// The ordering is load-bearing: `>= Subscriber` means "member",
/// `>= Author` means "owner or co-author".
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Membership {
    None,
    Subscriber,
    Author,
    Owner,
}

impl Membership {
    pub fn is_member(self) -> bool {
        self >= Membership::Subscriber
    }

    pub fn is_owner_or_author(self) -> bool {
        self >= Membership::Author
    }
}

/// Resolve the viewer's standing with a single round-trip. Anonymous
/// viewers are always `None`; the owner check needs no query at all.
pub async fn membership_of(
    pool: &PgPool,
    blog_id: Uuid,
    owner_id: Uuid,
    viewer: Option<Uuid>,
) -> Result<Membership, sqlx::Error> {
    let Some(user_id) = viewer else {
        return Ok(Membership::None);
    };
    if user_id == owner_id {
        return Ok(Membership::Owner);
    }

    let (is_author, is_subscriber): (bool, bool) = sqlx::query_as(
        r#"
        SELECT
            EXISTS(SELECT 1 FROM blog_authors WHERE blog_id = $1 AND user_id = $2),
            EXISTS(SELECT 1 FROM subscribers WHERE blog_id = $1 AND user_id = $2)
        "#,
    )
    .bind(blog_id)
    .bind(user_id)
    .fetch_one(pool)
    .await?;

    Ok(if is_author {
        Membership::Author
    } else if is_subscriber {
        Membership::Subscriber
    } else {
        Membership::None
    })
}

/// True iff the user is the blog's owner, a co-author, or a confirmed
/// subscriber.
pub async fn is_member(
    pool: &PgPool,
    blog_id: Uuid,
    owner_id: Uuid,
    user_id: Uuid,
) -> Result<bool, sqlx::Error> {
    Ok(membership_of(pool, blog_id, owner_id, Some(user_id))
        .await?
        .is_member())
}

/// The stricter owner/co-author-only check used for write permission:
/// creating posts, viewing drafts, resolving subscribe requests.
pub async fn is_owner_or_author(
    pool: &PgPool,
    blog_id: Uuid,
    owner_id: Uuid,
    user_id: Uuid,
) -> Result<bool, sqlx::Error> {
    Ok(membership_of(pool, blog_id, owner_id, Some(user_id))
        .await?
        .is_owner_or_author())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_membership_ordering() {
        assert!(Membership::Owner > Membership::Author);
        assert!(Membership::Author > Membership::Subscriber);
        assert!(Membership::Subscriber > Membership::None);
    }

    #[test]
    fn test_member_levels() {
        assert!(!Membership::None.is_member());
        assert!(Membership::Subscriber.is_member());
        assert!(Membership::Author.is_member());
        assert!(Membership::Owner.is_member());
    }

    #[test]
    fn test_owner_or_author_levels() {
        assert!(!Membership::None.is_owner_or_author());
        assert!(!Membership::Subscriber.is_owner_or_author());
        assert!(Membership::Author.is_owner_or_author());
        assert!(Membership::Owner.is_owner_or_author());
    }
}

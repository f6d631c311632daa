//! Domain entities mirrored from persistent storage.

use std::fmt;

use time::OffsetDateTime;
use uuid::Uuid;

/// Character budget for a post's short display form, used wherever a post is
/// referred to outside its own page (listing link titles, log lines).
pub const POST_PREVIEW_CHARS: usize = 15;

#[derive(Debug, Clone, PartialEq)]
pub struct UserRecord {
    pub id: Uuid,
    pub username: String,
    pub display_name: String,
    pub password_salt: String,
    pub password_digest: Vec<u8>,
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GroupRecord {
    pub id: Uuid,
    pub title: String,
    pub slug: String,
    pub description: String,
    pub created_at: OffsetDateTime,
}

impl fmt::Display for GroupRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.title)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PostRecord {
    pub id: Uuid,
    pub text: String,
    /// Stamped once at creation; edits never touch it.
    pub pub_date: OffsetDateTime,
    pub author_id: Uuid,
    pub group_id: Option<Uuid>,
    pub image_path: Option<String>,
}

impl PostRecord {
    /// First [`POST_PREVIEW_CHARS`] characters of the text, counted in
    /// characters rather than bytes so multibyte scripts truncate cleanly.
    pub fn preview(&self) -> String {
        self.text.chars().take(POST_PREVIEW_CHARS).collect()
    }
}

impl fmt::Display for PostRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.preview())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CommentRecord {
    pub id: Uuid,
    pub post_id: Uuid,
    pub author_id: Uuid,
    pub text: String,
    /// Stamped once at creation; immutable thereafter.
    pub created: OffsetDateTime,
}

/// Directed follow edge: `user_id` wants `author_id`'s posts in their feed.
/// The pair carries no uniqueness constraint; duplicate edges are valid data
/// and feed queries must stay membership-based to tolerate them.
#[derive(Debug, Clone, PartialEq)]
pub struct FollowRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub author_id: Uuid,
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub token_digest: Vec<u8>,
    pub expires_at: OffsetDateTime,
    pub created_at: OffsetDateTime,
}

//! Repository traits describing persistence adapters.

use async_trait::async_trait;
use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::application::pagination::PageWindow;
use crate::domain::entities::{
    CommentRecord, FollowRecord, GroupRecord, PostRecord, SessionRecord, UserRecord,
};

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("duplicate record violates unique constraint `{constraint}`")]
    Duplicate { constraint: String },
    #[error("resource not found")]
    NotFound,
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("integrity error: {message}")]
    Integrity { message: String },
    #[error("database timeout")]
    Timeout,
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }
}

/// Which slice of the post table a listing query covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostScope {
    /// Every post, newest first. Backs the front page.
    Global,
    /// Posts filed under one group.
    Group(Uuid),
    /// Posts written by one author.
    Author(Uuid),
    /// Posts written by any author the given user follows.
    FollowedBy(Uuid),
}

#[derive(Debug, Clone)]
pub struct NewUserParams {
    pub username: String,
    pub display_name: String,
    pub password_salt: String,
    pub password_digest: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct NewPostParams {
    pub text: String,
    pub author_id: Uuid,
    pub group_id: Option<Uuid>,
    pub image_path: Option<String>,
}

#[derive(Debug, Clone)]
pub struct UpdatePostParams {
    pub id: Uuid,
    pub text: String,
    /// `None` detaches the post from its group.
    pub group_id: Option<Uuid>,
    /// `None` keeps the stored image untouched.
    pub image_path: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewCommentParams {
    pub post_id: Uuid,
    pub author_id: Uuid,
    pub text: String,
}

#[derive(Debug, Clone)]
pub struct NewSessionParams {
    pub user_id: Uuid,
    pub token_digest: Vec<u8>,
    pub expires_at: OffsetDateTime,
}

/// Group columns a post listing needs for its card links.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupRef {
    pub title: String,
    pub slug: String,
}

/// A post joined with the author and group columns every listing renders.
#[derive(Debug, Clone, PartialEq)]
pub struct PostFeedItem {
    pub post: PostRecord,
    pub author_username: String,
    pub author_display_name: String,
    pub group: Option<GroupRef>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CommentWithAuthor {
    pub comment: CommentRecord,
    pub author_username: String,
    pub author_display_name: String,
}

#[async_trait]
pub trait UsersRepo: Send + Sync {
    async fn create_user(&self, params: NewUserParams) -> Result<UserRecord, RepoError>;

    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<UserRecord>, RepoError>;

    async fn find_user_by_username(&self, username: &str)
    -> Result<Option<UserRecord>, RepoError>;
}

#[async_trait]
pub trait GroupsRepo: Send + Sync {
    async fn list_groups(&self) -> Result<Vec<GroupRecord>, RepoError>;

    async fn find_group_by_slug(&self, slug: &str) -> Result<Option<GroupRecord>, RepoError>;

    async fn find_group_by_id(&self, id: Uuid) -> Result<Option<GroupRecord>, RepoError>;
}

#[async_trait]
pub trait PostsRepo: Send + Sync {
    async fn count_posts(&self, scope: PostScope) -> Result<u64, RepoError>;

    /// List one window of a scope, newest first with a stable tiebreak, so
    /// two posts sharing a publication instant never swap between pages.
    async fn list_posts(
        &self,
        scope: PostScope,
        window: PageWindow,
    ) -> Result<Vec<PostFeedItem>, RepoError>;

    async fn find_post(&self, id: Uuid) -> Result<Option<PostFeedItem>, RepoError>;
}

#[async_trait]
pub trait PostsWriteRepo: Send + Sync {
    async fn create_post(&self, params: NewPostParams) -> Result<PostRecord, RepoError>;

    /// Rewrites text and group membership but never `pub_date`.
    async fn update_post(&self, params: UpdatePostParams) -> Result<PostRecord, RepoError>;
}

#[async_trait]
pub trait CommentsRepo: Send + Sync {
    async fn list_comments(&self, post_id: Uuid) -> Result<Vec<CommentWithAuthor>, RepoError>;

    async fn create_comment(&self, params: NewCommentParams) -> Result<CommentRecord, RepoError>;
}

#[async_trait]
pub trait FollowsRepo: Send + Sync {
    /// Inserts a new edge unconditionally; the pair carries no unique
    /// constraint, so repeated follows accumulate rows.
    async fn create_follow(&self, user_id: Uuid, author_id: Uuid)
    -> Result<FollowRecord, RepoError>;

    /// Removes every edge for the pair, returning how many went away.
    async fn delete_follows(&self, user_id: Uuid, author_id: Uuid) -> Result<u64, RepoError>;

    async fn follow_exists(&self, user_id: Uuid, author_id: Uuid) -> Result<bool, RepoError>;
}

#[async_trait]
pub trait SessionsRepo: Send + Sync {
    async fn create_session(&self, params: NewSessionParams) -> Result<SessionRecord, RepoError>;

    async fn find_session(&self, token_digest: &[u8])
    -> Result<Option<SessionRecord>, RepoError>;

    async fn delete_session(&self, token_digest: &[u8]) -> Result<(), RepoError>;
}

/// Cheap connectivity check backing the health endpoint.
#[async_trait]
pub trait HealthProbe: Send + Sync {
    async fn ping(&self) -> Result<(), RepoError>;
}

use std::sync::Arc;

use thiserror::Error;
use uuid::Uuid;

use crate::application::repos::{
    CommentWithAuthor, CommentsRepo, GroupsRepo, NewCommentParams, NewPostParams, PostFeedItem,
    PostsRepo, PostsWriteRepo, RepoError, UpdatePostParams,
};
use crate::domain::entities::{CommentRecord, GroupRecord, PostRecord};

/// Write side of the post lifecycle: creation, author-only edits, and
/// comments, plus the detail read that backs the post page.
#[derive(Clone)]
pub struct PostService {
    posts: Arc<dyn PostsRepo>,
    posts_write: Arc<dyn PostsWriteRepo>,
    comments: Arc<dyn CommentsRepo>,
    groups: Arc<dyn GroupsRepo>,
}

/// Form input for creating or editing a post, after HTTP-level decoding.
#[derive(Debug, Clone, Default)]
pub struct PostDraft {
    pub text: String,
    pub group_id: Option<Uuid>,
    /// Relative media path of a freshly stored upload. `None` on edit keeps
    /// the existing image.
    pub image_path: Option<String>,
}

/// Field-level validation messages for the post form.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PostFormErrors {
    pub text: Option<&'static str>,
    pub group: Option<&'static str>,
}

impl PostFormErrors {
    pub fn is_empty(&self) -> bool {
        self.text.is_none() && self.group.is_none()
    }
}

#[derive(Debug, Error)]
pub enum PostWriteError {
    #[error("post form rejected")]
    Rejected(PostFormErrors),
    #[error("unknown post")]
    UnknownPost,
    #[error("viewer is not the author")]
    NotAuthor,
    #[error(transparent)]
    Repo(#[from] RepoError),
}

/// Everything the post page renders.
#[derive(Debug, Clone)]
pub struct PostDetail {
    pub item: PostFeedItem,
    pub comments: Vec<CommentWithAuthor>,
}

#[derive(Debug, Clone)]
pub enum CommentOutcome {
    Added(CommentRecord),
    /// Blank text. The post page is re-shown without a new comment.
    Rejected,
}

impl PostService {
    pub fn new(
        posts: Arc<dyn PostsRepo>,
        posts_write: Arc<dyn PostsWriteRepo>,
        comments: Arc<dyn CommentsRepo>,
        groups: Arc<dyn GroupsRepo>,
    ) -> Self {
        Self {
            posts,
            posts_write,
            comments,
            groups,
        }
    }

    /// Groups offered by the post form's group selector.
    pub async fn groups_for_form(&self) -> Result<Vec<GroupRecord>, RepoError> {
        self.groups.list_groups().await
    }

    pub async fn detail(&self, post_id: Uuid) -> Result<Option<PostDetail>, RepoError> {
        let Some(item) = self.posts.find_post(post_id).await? else {
            return Ok(None);
        };
        let comments = self.comments.list_comments(post_id).await?;
        Ok(Some(PostDetail { item, comments }))
    }

    /// The publication date is stamped by the store at insert time.
    pub async fn create_post(
        &self,
        author_id: Uuid,
        draft: PostDraft,
    ) -> Result<PostRecord, PostWriteError> {
        let draft = self.validate(draft).await?;
        let record = self
            .posts_write
            .create_post(NewPostParams {
                text: draft.text,
                author_id,
                group_id: draft.group_id,
                image_path: draft.image_path,
            })
            .await?;
        Ok(record)
    }

    /// Load a post for the edit form, enforcing that the viewer wrote it.
    pub async fn load_for_edit(
        &self,
        editor_id: Uuid,
        post_id: Uuid,
    ) -> Result<PostFeedItem, PostWriteError> {
        let item = self
            .posts
            .find_post(post_id)
            .await?
            .ok_or(PostWriteError::UnknownPost)?;
        if item.post.author_id != editor_id {
            return Err(PostWriteError::NotAuthor);
        }
        Ok(item)
    }

    /// Rewrite an existing post's text, group, and optionally its image. The
    /// original publication date stays put, so an edited post keeps its slot
    /// in every chronological listing.
    pub async fn edit_post(
        &self,
        editor_id: Uuid,
        post_id: Uuid,
        draft: PostDraft,
    ) -> Result<PostRecord, PostWriteError> {
        self.load_for_edit(editor_id, post_id).await?;
        let draft = self.validate(draft).await?;
        let record = self
            .posts_write
            .update_post(UpdatePostParams {
                id: post_id,
                text: draft.text,
                group_id: draft.group_id,
                image_path: draft.image_path,
            })
            .await?;
        Ok(record)
    }

    /// Attach a comment to an existing post. Blank text is rejected without
    /// touching the store; a missing post is the caller's 404.
    pub async fn add_comment(
        &self,
        author_id: Uuid,
        post_id: Uuid,
        text: &str,
    ) -> Result<CommentOutcome, PostWriteError> {
        if self.posts.find_post(post_id).await?.is_none() {
            return Err(PostWriteError::UnknownPost);
        }
        let text = text.trim();
        if text.is_empty() {
            return Ok(CommentOutcome::Rejected);
        }
        let record = self
            .comments
            .create_comment(NewCommentParams {
                post_id,
                author_id,
                text: text.to_string(),
            })
            .await?;
        Ok(CommentOutcome::Added(record))
    }

    async fn validate(&self, mut draft: PostDraft) -> Result<PostDraft, PostWriteError> {
        let mut errors = PostFormErrors::default();
        draft.text = draft.text.trim().to_string();
        if draft.text.is_empty() {
            errors.text = Some("Post text cannot be empty.");
        }
        if let Some(group_id) = draft.group_id {
            if self.groups.find_group_by_id(group_id).await?.is_none() {
                errors.group = Some("Select one of the listed groups.");
            }
        }
        if errors.is_empty() {
            Ok(draft)
        } else {
            Err(PostWriteError::Rejected(errors))
        }
    }
}

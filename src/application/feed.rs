use std::num::NonZeroU32;
use std::sync::Arc;

use thiserror::Error;
use uuid::Uuid;

use crate::application::pagination::{Page, PageRequest, resolve_window};
use crate::application::repos::{
    FollowsRepo, GroupsRepo, PostFeedItem, PostScope, PostsRepo, RepoError, UsersRepo,
};
use crate::domain::entities::{GroupRecord, UserRecord};

/// Read side of every listing page: the front page, group pages, author
/// profiles, and the signed-in follow feed.
#[derive(Clone)]
pub struct FeedService {
    posts: Arc<dyn PostsRepo>,
    groups: Arc<dyn GroupsRepo>,
    users: Arc<dyn UsersRepo>,
    follows: Arc<dyn FollowsRepo>,
    posts_per_page: NonZeroU32,
}

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("unknown group")]
    UnknownGroup,
    #[error("unknown user")]
    UnknownUser,
    #[error(transparent)]
    Repo(#[from] RepoError),
}

/// A group page: the group's own fields plus one window of its posts.
#[derive(Debug, Clone)]
pub struct GroupFeed {
    pub group: GroupRecord,
    pub page: Page<PostFeedItem>,
}

/// A profile page: the author, one window of their posts, and whether the
/// viewer currently follows them. `page.total_items` is the author's full
/// post count.
#[derive(Debug, Clone)]
pub struct ProfileFeed {
    pub author: UserRecord,
    pub page: Page<PostFeedItem>,
    pub following: bool,
}

impl FeedService {
    pub fn new(
        posts: Arc<dyn PostsRepo>,
        groups: Arc<dyn GroupsRepo>,
        users: Arc<dyn UsersRepo>,
        follows: Arc<dyn FollowsRepo>,
        posts_per_page: NonZeroU32,
    ) -> Self {
        Self {
            posts,
            groups,
            users,
            follows,
            posts_per_page,
        }
    }

    /// All posts, newest first.
    pub async fn global_page(
        &self,
        request: PageRequest,
    ) -> Result<Page<PostFeedItem>, FeedError> {
        self.scoped_page(PostScope::Global, request).await
    }

    /// Posts filed under the group with the given slug.
    pub async fn group_page(
        &self,
        slug: &str,
        request: PageRequest,
    ) -> Result<GroupFeed, FeedError> {
        let group = self
            .groups
            .find_group_by_slug(slug)
            .await?
            .ok_or(FeedError::UnknownGroup)?;
        let page = self.scoped_page(PostScope::Group(group.id), request).await?;
        Ok(GroupFeed { group, page })
    }

    /// Posts by the author with the given username, plus the viewer's follow
    /// state. An anonymous viewer, and an author looking at their own page,
    /// both read as not following.
    pub async fn profile_page(
        &self,
        username: &str,
        viewer: Option<Uuid>,
        request: PageRequest,
    ) -> Result<ProfileFeed, FeedError> {
        let author = self
            .users
            .find_user_by_username(username)
            .await?
            .ok_or(FeedError::UnknownUser)?;
        let (page, following) = futures::try_join!(
            self.scoped_page(PostScope::Author(author.id), request),
            self.viewer_follows(viewer, author.id),
        )?;
        Ok(ProfileFeed {
            author,
            page,
            following,
        })
    }

    /// Posts by every author the viewer follows. Duplicate follow edges do
    /// not duplicate posts because the scope filters by membership.
    pub async fn follow_page(
        &self,
        viewer: Uuid,
        request: PageRequest,
    ) -> Result<Page<PostFeedItem>, FeedError> {
        self.scoped_page(PostScope::FollowedBy(viewer), request)
            .await
    }

    async fn scoped_page(
        &self,
        scope: PostScope,
        request: PageRequest,
    ) -> Result<Page<PostFeedItem>, FeedError> {
        let total_items = self.posts.count_posts(scope).await?;
        let window = resolve_window(request, total_items, self.posts_per_page);
        let items = self.posts.list_posts(scope, window).await?;
        Ok(Page::assemble(window, total_items, items))
    }

    async fn viewer_follows(
        &self,
        viewer: Option<Uuid>,
        author_id: Uuid,
    ) -> Result<bool, FeedError> {
        match viewer {
            Some(viewer_id) if viewer_id != author_id => {
                Ok(self.follows.follow_exists(viewer_id, author_id).await?)
            }
            _ => Ok(false),
        }
    }
}

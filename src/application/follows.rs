use std::sync::Arc;

use thiserror::Error;
use uuid::Uuid;

use crate::application::repos::{FollowsRepo, RepoError, UsersRepo};

/// Maintains the directed follow graph between members.
#[derive(Clone)]
pub struct FollowService {
    users: Arc<dyn UsersRepo>,
    follows: Arc<dyn FollowsRepo>,
}

#[derive(Debug, Error)]
pub enum FollowError {
    #[error("unknown user")]
    UnknownUser,
    #[error(transparent)]
    Repo(#[from] RepoError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FollowOutcome {
    Created,
    /// Following yourself is silently ignored; no edge is written.
    SelfFollow,
}

impl FollowService {
    pub fn new(users: Arc<dyn UsersRepo>, follows: Arc<dyn FollowsRepo>) -> Self {
        Self { users, follows }
    }

    /// Add a follow edge from the viewer to the named author. Repeated calls
    /// insert repeated edges; readers of the graph tolerate that.
    pub async fn follow(
        &self,
        viewer_id: Uuid,
        target_username: &str,
    ) -> Result<FollowOutcome, FollowError> {
        let target = self
            .users
            .find_user_by_username(target_username)
            .await?
            .ok_or(FollowError::UnknownUser)?;
        if target.id == viewer_id {
            return Ok(FollowOutcome::SelfFollow);
        }
        self.follows.create_follow(viewer_id, target.id).await?;
        Ok(FollowOutcome::Created)
    }

    /// Drop every edge from the viewer to the named author. Unfollowing
    /// someone never followed is a no-op.
    pub async fn unfollow(
        &self,
        viewer_id: Uuid,
        target_username: &str,
    ) -> Result<u64, FollowError> {
        let target = self
            .users
            .find_user_by_username(target_username)
            .await?
            .ok_or(FollowError::UnknownUser)?;
        Ok(self.follows.delete_follows(viewer_id, target.id).await?)
    }
}

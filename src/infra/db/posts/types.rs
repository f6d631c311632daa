use time::OffsetDateTime;
use uuid::Uuid;

use crate::application::repos::{GroupRef, PostFeedItem};
use crate::domain::entities::PostRecord;

#[derive(sqlx::FromRow)]
pub(crate) struct PostRow {
    pub(crate) id: Uuid,
    pub(crate) text: String,
    pub(crate) pub_date: OffsetDateTime,
    pub(crate) author_id: Uuid,
    pub(crate) group_id: Option<Uuid>,
    pub(crate) image_path: Option<String>,
}

impl From<PostRow> for PostRecord {
    fn from(row: PostRow) -> Self {
        Self {
            id: row.id,
            text: row.text,
            pub_date: row.pub_date,
            author_id: row.author_id,
            group_id: row.group_id,
            image_path: row.image_path,
        }
    }
}

/// A post row joined with its author and optional group, as every listing
/// and the detail page consume it.
#[derive(sqlx::FromRow)]
pub(crate) struct PostListRow {
    pub(crate) id: Uuid,
    pub(crate) text: String,
    pub(crate) pub_date: OffsetDateTime,
    pub(crate) author_id: Uuid,
    pub(crate) group_id: Option<Uuid>,
    pub(crate) image_path: Option<String>,
    pub(crate) author_username: String,
    pub(crate) author_display_name: String,
    pub(crate) group_title: Option<String>,
    pub(crate) group_slug: Option<String>,
}

impl From<PostListRow> for PostFeedItem {
    fn from(row: PostListRow) -> Self {
        let group = match (row.group_title, row.group_slug) {
            (Some(title), Some(slug)) => Some(GroupRef { title, slug }),
            _ => None,
        };
        Self {
            post: PostRecord {
                id: row.id,
                text: row.text,
                pub_date: row.pub_date,
                author_id: row.author_id,
                group_id: row.group_id,
                image_path: row.image_path,
            },
            author_username: row.author_username,
            author_display_name: row.author_display_name,
            group,
        }
    }
}

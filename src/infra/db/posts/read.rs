use async_trait::async_trait;
use sqlx::QueryBuilder;
use uuid::Uuid;

use crate::application::pagination::PageWindow;
use crate::application::repos::{PostFeedItem, PostScope, PostsRepo, RepoError};

use super::PostgresRepositories;
use super::types::PostListRow;
use crate::infra::db::map_sqlx_error;

/// Shared join for every post read: author columns always, group columns
/// when the post is filed under one.
const POST_FEED_SELECT: &str = "SELECT p.id, p.text, p.pub_date, p.author_id, p.group_id, \
     p.image_path, \
     u.username AS author_username, u.display_name AS author_display_name, \
     g.title AS group_title, g.slug AS group_slug \
     FROM posts p \
     INNER JOIN users u ON u.id = p.author_id \
     LEFT JOIN groups g ON g.id = p.group_id \
     WHERE 1=1 ";

#[async_trait]
impl PostsRepo for PostgresRepositories {
    async fn count_posts(&self, scope: PostScope) -> Result<u64, RepoError> {
        let mut qb = QueryBuilder::new("SELECT COUNT(*) FROM posts p WHERE 1=1 ");
        Self::apply_scope_conditions(&mut qb, scope);

        let count: i64 = qb
            .build_query_scalar()
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Self::convert_count(count)
    }

    async fn list_posts(
        &self,
        scope: PostScope,
        window: PageWindow,
    ) -> Result<Vec<PostFeedItem>, RepoError> {
        let mut qb = QueryBuilder::new(POST_FEED_SELECT);
        Self::apply_scope_conditions(&mut qb, scope);

        // pub_date alone is not a total order; the tiebreaks keep rows from
        // drifting between adjacent pages.
        qb.push(" ORDER BY p.pub_date DESC, p.author_id ASC, p.id ASC ");
        qb.push(" LIMIT ");
        qb.push_bind(window.limit);
        qb.push(" OFFSET ");
        qb.push_bind(window.offset);

        let rows = qb
            .build_query_as::<PostListRow>()
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(PostFeedItem::from).collect())
    }

    async fn find_post(&self, id: Uuid) -> Result<Option<PostFeedItem>, RepoError> {
        let mut qb = QueryBuilder::new(POST_FEED_SELECT);
        qb.push(" AND p.id = ");
        qb.push_bind(id);

        let row = qb
            .build_query_as::<PostListRow>()
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(row.map(PostFeedItem::from))
    }
}

use async_trait::async_trait;
use uuid::Uuid;

use crate::application::repos::{NewPostParams, PostsWriteRepo, RepoError, UpdatePostParams};
use crate::domain::entities::PostRecord;

use super::PostgresRepositories;
use super::types::PostRow;
use crate::infra::db::map_sqlx_error;

#[async_trait]
impl PostsWriteRepo for PostgresRepositories {
    async fn create_post(&self, params: NewPostParams) -> Result<PostRecord, RepoError> {
        let NewPostParams {
            text,
            author_id,
            group_id,
            image_path,
        } = params;

        let id = Uuid::new_v4();
        let row = sqlx::query_as::<_, PostRow>(
            r#"
            INSERT INTO posts (id, text, author_id, group_id, image_path)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, text, pub_date, author_id, group_id, image_path
            "#,
        )
        .bind(id)
        .bind(text)
        .bind(author_id)
        .bind(group_id)
        .bind(image_path)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(PostRecord::from(row))
    }

    async fn update_post(&self, params: UpdatePostParams) -> Result<PostRecord, RepoError> {
        let UpdatePostParams {
            id,
            text,
            group_id,
            image_path,
        } = params;

        // pub_date is deliberately absent: edits keep the original slot in
        // chronological listings. A NULL image_path keeps the stored image.
        let row = sqlx::query_as::<_, PostRow>(
            r#"
            UPDATE posts
            SET text = $2, group_id = $3, image_path = COALESCE($4, image_path)
            WHERE id = $1
            RETURNING id, text, pub_date, author_id, group_id, image_path
            "#,
        )
        .bind(id)
        .bind(text)
        .bind(group_id)
        .bind(image_path)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        row.map(PostRecord::from).ok_or(RepoError::NotFound)
    }
}

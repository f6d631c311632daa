use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::application::repos::{NewUserParams, RepoError, UsersRepo};
use crate::domain::entities::UserRecord;

use super::PostgresRepositories;
use crate::infra::db::map_sqlx_error;

#[derive(sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    username: String,
    display_name: String,
    password_salt: String,
    password_digest: Vec<u8>,
    created_at: OffsetDateTime,
}

impl From<UserRow> for UserRecord {
    fn from(row: UserRow) -> Self {
        Self {
            id: row.id,
            username: row.username,
            display_name: row.display_name,
            password_salt: row.password_salt,
            password_digest: row.password_digest,
            created_at: row.created_at,
        }
    }
}

const USER_SELECT: &str = "SELECT id, username, display_name, password_salt, password_digest, \
     created_at FROM users";

#[async_trait]
impl UsersRepo for PostgresRepositories {
    async fn create_user(&self, params: NewUserParams) -> Result<UserRecord, RepoError> {
        let NewUserParams {
            username,
            display_name,
            password_salt,
            password_digest,
        } = params;

        let id = Uuid::new_v4();
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            INSERT INTO users (id, username, display_name, password_salt, password_digest)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, username, display_name, password_salt, password_digest, created_at
            "#,
        )
        .bind(id)
        .bind(username)
        .bind(display_name)
        .bind(password_salt)
        .bind(password_digest)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(UserRecord::from(row))
    }

    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<UserRecord>, RepoError> {
        let sql = format!("{USER_SELECT} WHERE id = $1");
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(id)
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(row.map(UserRecord::from))
    }

    async fn find_user_by_username(
        &self,
        username: &str,
    ) -> Result<Option<UserRecord>, RepoError> {
        let sql = format!("{USER_SELECT} WHERE username = $1");
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(username)
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(row.map(UserRecord::from))
    }
}

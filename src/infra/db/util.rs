use sqlx::error::DatabaseError;

use crate::application::repos::RepoError;

/// Collapse sqlx errors into the repository error taxonomy. Postgres does
/// not expose structured error kinds through sqlx for every case we care
/// about, so this matches on message fragments.
pub fn map_sqlx_error(err: sqlx::Error) -> RepoError {
    match err {
        sqlx::Error::RowNotFound => RepoError::NotFound,
        sqlx::Error::Database(db) => classify_database_error(db.as_ref()),
        other => RepoError::from_persistence(other),
    }
}

fn classify_database_error(db: &dyn DatabaseError) -> RepoError {
    let message = db.message().to_string();

    if message.contains("duplicate key") {
        let constraint = db.constraint().unwrap_or("unknown").to_string();
        return RepoError::Duplicate { constraint };
    }
    if message.contains("violates foreign key constraint")
        || message.contains("invalid input syntax")
    {
        return RepoError::InvalidInput { message };
    }
    if message.contains("violates") {
        return RepoError::Integrity { message };
    }
    if message.contains("canceling statement due to user request") {
        return RepoError::Timeout;
    }

    RepoError::Persistence(message)
}

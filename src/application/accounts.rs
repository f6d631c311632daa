use std::sync::Arc;

use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use thiserror::Error;
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use crate::application::repos::{
    NewSessionParams, NewUserParams, RepoError, SessionsRepo, UsersRepo,
};
use crate::domain::entities::UserRecord;

const USERNAME_MIN_CHARS: usize = 3;
const USERNAME_MAX_CHARS: usize = 30;
const PASSWORD_MIN_CHARS: usize = 8;

#[derive(Debug, Error)]
pub enum AccountError {
    #[error("signup form rejected")]
    Rejected(AccountFormErrors),
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error(transparent)]
    Repo(#[from] RepoError),
}

/// Field-level validation messages for the signup form.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AccountFormErrors {
    pub username: Option<&'static str>,
    pub password: Option<&'static str>,
}

impl AccountFormErrors {
    pub fn is_empty(&self) -> bool {
        self.username.is_none() && self.password.is_none()
    }
}

#[derive(Debug, Clone)]
pub struct SignupForm {
    pub username: String,
    pub display_name: String,
    pub password: String,
}

/// A freshly opened session. The bearer token exists only here and in the
/// cookie it is sent through; the store keeps its SHA-256 digest.
#[derive(Debug, Clone)]
pub struct IssuedSession {
    pub user: UserRecord,
    pub token: String,
    pub expires_at: OffsetDateTime,
}

/// Registration, login, and cookie-session authentication.
#[derive(Clone)]
pub struct AccountService {
    users: Arc<dyn UsersRepo>,
    sessions: Arc<dyn SessionsRepo>,
    session_ttl: Duration,
}

impl AccountService {
    pub fn new(
        users: Arc<dyn UsersRepo>,
        sessions: Arc<dyn SessionsRepo>,
        session_ttl: Duration,
    ) -> Self {
        Self {
            users,
            sessions,
            session_ttl,
        }
    }

    /// Register a new member and log them straight in.
    pub async fn sign_up(&self, form: SignupForm) -> Result<IssuedSession, AccountError> {
        let username = form.username.trim().to_string();
        let display_name = form.display_name.trim().to_string();
        let errors = validate_signup(&username, &form.password);
        if !errors.is_empty() {
            return Err(AccountError::Rejected(errors));
        }

        let salt = Self::generate_salt();
        let password_digest = hash_password(&salt, &form.password);
        let display_name = if display_name.is_empty() {
            username.clone()
        } else {
            display_name
        };

        let user = match self
            .users
            .create_user(NewUserParams {
                username,
                display_name,
                password_salt: salt,
                password_digest,
            })
            .await
        {
            Ok(user) => user,
            Err(RepoError::Duplicate { .. }) => {
                return Err(AccountError::Rejected(AccountFormErrors {
                    username: Some("That username is already taken."),
                    password: None,
                }));
            }
            Err(err) => return Err(err.into()),
        };

        self.open_session(user).await
    }

    /// Check credentials and open a session. Unknown usernames and wrong
    /// passwords are indistinguishable to the caller.
    pub async fn log_in(
        &self,
        username: &str,
        password: &str,
    ) -> Result<IssuedSession, AccountError> {
        let user = self
            .users
            .find_user_by_username(username.trim())
            .await?
            .ok_or(AccountError::InvalidCredentials)?;

        let hashed_input = hash_password(&user.password_salt, password);
        if user.password_digest.ct_eq(&hashed_input).unwrap_u8() == 0 {
            return Err(AccountError::InvalidCredentials);
        }

        self.open_session(user).await
    }

    /// Discard the session behind a bearer token. Unknown tokens are fine;
    /// logout must always succeed from the client's point of view.
    pub async fn log_out(&self, token: &str) -> Result<(), RepoError> {
        self.sessions.delete_session(&hash_token(token)).await
    }

    /// Resolve a bearer token to its user, if the session is still live.
    pub async fn authenticate(&self, token: &str) -> Result<Option<UserRecord>, RepoError> {
        let Some(session) = self.sessions.find_session(&hash_token(token)).await? else {
            return Ok(None);
        };
        if session.expires_at <= OffsetDateTime::now_utc() {
            return Ok(None);
        }
        self.users.find_user_by_id(session.user_id).await
    }

    async fn open_session(&self, user: UserRecord) -> Result<IssuedSession, AccountError> {
        let token = Self::generate_token();
        let expires_at = OffsetDateTime::now_utc() + self.session_ttl;
        self.sessions
            .create_session(NewSessionParams {
                user_id: user.id,
                token_digest: hash_token(&token),
                expires_at,
            })
            .await?;
        Ok(IssuedSession {
            user,
            token,
            expires_at,
        })
    }

    fn generate_salt() -> String {
        Uuid::new_v4().simple().to_string()
    }

    fn generate_token() -> String {
        format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple())
    }
}

fn validate_signup(username: &str, password: &str) -> AccountFormErrors {
    let mut errors = AccountFormErrors::default();
    let length = username.chars().count();
    if !(USERNAME_MIN_CHARS..=USERNAME_MAX_CHARS).contains(&length) {
        errors.username = Some("Usernames are 3 to 30 characters long.");
    } else if !username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
    {
        errors.username = Some("Usernames use letters, digits, and . _ - only.");
    }
    if password.chars().count() < PASSWORD_MIN_CHARS {
        errors.password = Some("Passwords need at least 8 characters.");
    }
    errors
}

fn hash_password(salt: &str, password: &str) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    hasher.finalize().to_vec()
}

fn hash_token(token: &str) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hasher.finalize().to_vec()
}

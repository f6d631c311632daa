//! Cookie sessions for the public surface.
//!
//! `load_current_user` runs once per request and turns the session cookie
//! into a [`CurrentUser`] request extension. Handlers read it back through
//! the [`MaybeUser`] extractor and decide themselves whether a guest gets a
//! login redirect.

use std::convert::Infallible;

use axum::{
    body::Body,
    extract::{FromRequestParts, State},
    http::{
        HeaderMap, HeaderValue, Request,
        header::{COOKIE, SET_COOKIE},
        request::Parts,
    },
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use time::OffsetDateTime;
use tracing::warn;

use crate::domain::entities::UserRecord;

use super::public::HttpState;

pub const SESSION_COOKIE: &str = "breva_session";

/// The signed-in member, inserted into request extensions by
/// [`load_current_user`].
#[derive(Debug, Clone)]
pub struct CurrentUser(pub UserRecord);

/// Extractor reading the resolved viewer, if any. Never rejects; anonymous
/// requests extract as `MaybeUser(None)`.
#[derive(Debug, Clone)]
pub struct MaybeUser(pub Option<UserRecord>);

impl<S> FromRequestParts<S> for MaybeUser
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(
            parts
                .extensions
                .get::<CurrentUser>()
                .map(|current| current.0.clone()),
        ))
    }
}

/// Resolve the session cookie into a [`CurrentUser`] extension. Requests
/// without a cookie, with an expired session, or hitting a store error all
/// continue as anonymous; authentication failures never fail a page load.
pub async fn load_current_user(
    State(state): State<HttpState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    if let Some(token) = session_token(request.headers()) {
        match state.accounts.authenticate(&token).await {
            Ok(Some(user)) => {
                request.extensions_mut().insert(CurrentUser(user));
            }
            Ok(None) => {}
            Err(err) => {
                warn!(
                    target = "breva::http::auth",
                    error = %err,
                    "session lookup failed, continuing as anonymous"
                );
            }
        }
    }
    next.run(request).await
}

/// Send a guest to the login page, preserving where they were headed.
pub(super) fn login_redirect(next: &str) -> Response {
    let encoded: String = url::form_urlencoded::byte_serialize(next.as_bytes()).collect();
    Redirect::to(&format!("/auth/login/?next={encoded}")).into_response()
}

pub(super) fn session_token(headers: &HeaderMap) -> Option<String> {
    let header = headers.get(COOKIE)?.to_str().ok()?;
    header.split(';').find_map(|pair| {
        let (name, value) = pair.trim().split_once('=')?;
        (name == SESSION_COOKIE).then(|| value.to_string())
    })
}

pub(super) fn set_session_cookie(response: &mut Response, token: &str, expires_at: OffsetDateTime) {
    let max_age = (expires_at - OffsetDateTime::now_utc())
        .whole_seconds()
        .max(0);
    let cookie =
        format!("{SESSION_COOKIE}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={max_age}");
    if let Ok(value) = HeaderValue::from_str(&cookie) {
        response.headers_mut().append(SET_COOKIE, value);
    }
}

pub(super) fn clear_session_cookie(response: &mut Response) {
    let cookie = format!("{SESSION_COOKIE}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0");
    if let Ok(value) = HeaderValue::from_str(&cookie) {
        response.headers_mut().append(SET_COOKIE, value);
    }
}

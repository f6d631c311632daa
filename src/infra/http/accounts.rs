//! Signup, login, and logout handlers.

use axum::{
    Form,
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tracing::warn;

use crate::{
    application::{
        accounts::{AccountError, AccountFormErrors, SignupForm},
        error::HttpError,
    },
    presentation::views::{
        LayoutContext, LoginContext, LoginTemplate, SignupContext, SignupTemplate, ViewerView,
        render_template_response, viewer_context,
    },
};

use super::{
    auth::{self, MaybeUser},
    public::HttpState,
    repo_error_to_http,
};

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(super) struct NextQuery {
    next: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(super) struct SignupPayload {
    #[serde(default)]
    username: String,
    #[serde(default)]
    display_name: String,
    #[serde(default)]
    password: String,
}

#[derive(Debug, Deserialize)]
pub(super) struct LoginPayload {
    #[serde(default)]
    username: String,
    #[serde(default)]
    password: String,
    #[serde(default)]
    next: Option<String>,
}

pub(super) async fn signup_form(MaybeUser(viewer): MaybeUser) -> Response {
    render_signup(
        viewer_context(viewer.as_ref()),
        String::new(),
        String::new(),
        AccountFormErrors::default(),
    )
}

pub(super) async fn signup_submit(
    State(state): State<HttpState>,
    MaybeUser(viewer): MaybeUser,
    Form(form): Form<SignupPayload>,
) -> Response {
    const SOURCE: &str = "infra::http::accounts::signup_submit";

    let submission = SignupForm {
        username: form.username.clone(),
        display_name: form.display_name.clone(),
        password: form.password,
    };

    match state.accounts.sign_up(submission).await {
        // A fresh member is signed in on the spot.
        Ok(issued) => {
            let mut response = Redirect::to("/").into_response();
            auth::set_session_cookie(&mut response, &issued.token, issued.expires_at);
            response
        }
        Err(AccountError::Rejected(errors)) => render_signup(
            viewer_context(viewer.as_ref()),
            form.username,
            form.display_name,
            errors,
        ),
        Err(AccountError::Repo(err)) => repo_error_to_http(SOURCE, err).into_response(),
        Err(err) => HttpError::from_error(
            SOURCE,
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to sign up",
            &err,
        )
        .into_response(),
    }
}

pub(super) async fn login_form(
    MaybeUser(viewer): MaybeUser,
    Query(query): Query<NextQuery>,
) -> Response {
    render_login(
        viewer_context(viewer.as_ref()),
        String::new(),
        query.next.unwrap_or_default(),
        None,
    )
}

pub(super) async fn login_submit(
    State(state): State<HttpState>,
    MaybeUser(viewer): MaybeUser,
    Form(form): Form<LoginPayload>,
) -> Response {
    const SOURCE: &str = "infra::http::accounts::login_submit";

    match state.accounts.log_in(&form.username, &form.password).await {
        Ok(issued) => {
            let destination = safe_next(form.next.as_deref());
            let mut response = Redirect::to(destination).into_response();
            auth::set_session_cookie(&mut response, &issued.token, issued.expires_at);
            response
        }
        Err(AccountError::InvalidCredentials) => render_login(
            viewer_context(viewer.as_ref()),
            form.username,
            form.next.unwrap_or_default(),
            Some("Invalid username or password."),
        ),
        Err(AccountError::Repo(err)) => repo_error_to_http(SOURCE, err).into_response(),
        Err(err) => HttpError::from_error(
            SOURCE,
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to log in",
            &err,
        )
        .into_response(),
    }
}

pub(super) async fn logout(State(state): State<HttpState>, headers: HeaderMap) -> Response {
    if let Some(token) = auth::session_token(&headers) {
        if let Err(err) = state.accounts.log_out(&token).await {
            warn!(
                target = "breva::http::accounts",
                error = %err,
                "failed to discard session on logout"
            );
        }
    }
    let mut response = Redirect::to("/").into_response();
    auth::clear_session_cookie(&mut response);
    response
}

fn render_signup(
    viewer: Option<ViewerView>,
    username: String,
    display_name: String,
    errors: AccountFormErrors,
) -> Response {
    let content = SignupContext {
        username,
        display_name,
        username_error: errors.username,
        password_error: errors.password,
    };
    let view = LayoutContext::new(viewer, content);
    render_template_response(SignupTemplate { view }, StatusCode::OK)
}

fn render_login(
    viewer: Option<ViewerView>,
    username: String,
    next: String,
    error: Option<&'static str>,
) -> Response {
    let content = LoginContext {
        username,
        next,
        error,
    };
    let view = LayoutContext::new(viewer, content);
    render_template_response(LoginTemplate { view }, StatusCode::OK)
}

/// Only site-relative destinations are honoured after login; anything else
/// falls back to the front page.
fn safe_next(next: Option<&str>) -> &str {
    match next {
        Some(path) if path.starts_with('/') && !path.starts_with("//") => path,
        _ => "/",
    }
}

//! Follow-graph handlers: the follow feed and the follow/unfollow links.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};

use crate::{
    application::{error::ErrorReport, follows::FollowError},
    domain::entities::UserRecord,
    presentation::views::{
        FeedContext, FollowTemplate, LayoutContext, render_not_found_response,
        render_template_response, viewer_context,
    },
};

use super::{
    auth::{MaybeUser, login_redirect},
    public::{HttpState, PageQuery, feed_error_to_response},
    repo_error_to_http,
};

pub(super) async fn follow_index(
    State(state): State<HttpState>,
    MaybeUser(viewer): MaybeUser,
    Query(query): Query<PageQuery>,
) -> Response {
    let Some(viewer) = viewer else {
        return login_redirect("/follow/");
    };

    match state.feed.follow_page(viewer.id, query.request()).await {
        Ok(page) => {
            let view = LayoutContext::new(viewer_context(Some(&viewer)), FeedContext::new(&page));
            render_template_response(FollowTemplate { view }, StatusCode::OK)
        }
        Err(err) => feed_error_to_response(
            "infra::http::follows::follow_index",
            err,
            viewer_context(Some(&viewer)),
        ),
    }
}

pub(super) async fn follow_author(
    State(state): State<HttpState>,
    MaybeUser(viewer): MaybeUser,
    Path(username): Path<String>,
) -> Response {
    const SOURCE: &str = "infra::http::follows::follow_author";

    let Some(viewer) = viewer else {
        return login_redirect(&format!("/profile/{username}/follow/"));
    };

    match state.follows.follow(viewer.id, &username).await {
        // Either way the viewer lands back on the profile; a self-follow
        // writes nothing.
        Ok(_) => Redirect::to(&profile_path(&username)).into_response(),
        Err(err) => follow_error_to_response(SOURCE, err, &viewer),
    }
}

pub(super) async fn unfollow_author(
    State(state): State<HttpState>,
    MaybeUser(viewer): MaybeUser,
    Path(username): Path<String>,
) -> Response {
    const SOURCE: &str = "infra::http::follows::unfollow_author";

    let Some(viewer) = viewer else {
        return login_redirect(&format!("/profile/{username}/unfollow/"));
    };

    match state.follows.unfollow(viewer.id, &username).await {
        Ok(_) => Redirect::to(&profile_path(&username)).into_response(),
        Err(err) => follow_error_to_response(SOURCE, err, &viewer),
    }
}

fn follow_error_to_response(
    source: &'static str,
    err: FollowError,
    viewer: &UserRecord,
) -> Response {
    match err {
        FollowError::UnknownUser => {
            let mut response = render_not_found_response(viewer_context(Some(viewer)));
            ErrorReport::from_message(source, StatusCode::NOT_FOUND, "unknown user")
                .attach(&mut response);
            response
        }
        FollowError::Repo(err) => repo_error_to_http(source, err).into_response(),
    }
}

fn profile_path(username: &str) -> String {
    format!("/profile/{username}/")
}

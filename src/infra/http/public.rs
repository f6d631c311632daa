use std::{io::ErrorKind, sync::Arc};

use axum::{
    Router,
    body::Body,
    extract::{DefaultBodyLimit, Path, Query, State},
    http::{
        HeaderValue, StatusCode,
        header::{CACHE_CONTROL, CONTENT_LENGTH, CONTENT_TYPE},
    },
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use bytes::Bytes;
use serde::Deserialize;
use tracing::error;
use uuid::Uuid;

use crate::{
    application::{
        accounts::AccountService,
        error::{ErrorReport, HttpError},
        feed::{FeedError, FeedService},
        follows::FollowService,
        pagination::PageRequest,
        posts::PostService,
        repos::HealthProbe,
    },
    cache::{PageCache, response_cache_layer},
    infra::uploads::{MediaStorage, MediaStoreError},
    presentation::views::{
        FeedContext, GroupContext, GroupTemplate, IndexTemplate, LayoutContext, PostDetailContext,
        PostDetailTemplate, ProfileContext, ProfileTemplate, StaticPageTemplate, ViewerView,
        render_not_found_response, render_template_response, viewer_context,
    },
};

use super::{
    accounts,
    auth::{self, MaybeUser},
    db_health_response, follows,
    middleware::{log_responses, set_request_context},
    posts, repo_error_to_http,
};

#[derive(Clone)]
pub struct HttpState {
    pub feed: Arc<FeedService>,
    pub posts: Arc<PostService>,
    pub follows: Arc<FollowService>,
    pub accounts: Arc<AccountService>,
    pub media: Arc<MediaStorage>,
    pub health: Arc<dyn HealthProbe>,
    pub cache: Option<PageCache>,
    pub upload_limit_bytes: usize,
}

pub fn build_router(state: HttpState) -> Router {
    // Only the front page sits behind the response cache.
    let cached_routes = Router::new().route("/", get(index));

    let cached_routes = if let Some(cache) = state.cache.clone() {
        cached_routes.layer(middleware::from_fn_with_state(cache, response_cache_layer))
    } else {
        cached_routes
    };

    let uncached_routes = Router::new()
        .route("/group/{slug}/", get(group_index))
        .route("/profile/{username}/", get(profile))
        .route("/posts/{id}/", get(post_detail))
        .route(
            "/posts/{id}/comment/",
            get(posts::comment_redirect).post(posts::add_comment),
        )
        .route(
            "/posts/{id}/edit/",
            get(posts::edit_form).post(posts::edit_submit),
        )
        .route(
            "/create/",
            get(posts::create_form).post(posts::create_submit),
        )
        .route("/follow/", get(follows::follow_index))
        .route("/profile/{username}/follow/", get(follows::follow_author))
        .route(
            "/profile/{username}/unfollow/",
            get(follows::unfollow_author),
        )
        .route("/about/author/", get(about_author))
        .route("/about/tech/", get(about_tech))
        .route(
            "/auth/signup/",
            get(accounts::signup_form).post(accounts::signup_submit),
        )
        .route(
            "/auth/login/",
            get(accounts::login_form).post(accounts::login_submit),
        )
        .route("/auth/logout/", post(accounts::logout))
        .route("/media/{*path}", get(serve_media))
        .route("/_health/db", get(health));

    let upload_limit = state.upload_limit_bytes;

    cached_routes
        .merge(uncached_routes)
        .fallback(fallback_not_found)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::load_current_user,
        ))
        .layer(DefaultBodyLimit::max(upload_limit))
        .with_state(state)
        .layer(middleware::from_fn(log_responses))
        .layer(middleware::from_fn(set_request_context))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(super) struct PageQuery {
    // Kept as a raw string: malformed numbers mean "page 1", never a 400.
    page: Option<String>,
}

impl PageQuery {
    pub(super) fn request(&self) -> PageRequest {
        PageRequest::from_query(self.page.as_deref())
    }
}

async fn index(
    State(state): State<HttpState>,
    MaybeUser(viewer): MaybeUser,
    Query(query): Query<PageQuery>,
) -> Response {
    match state.feed.global_page(query.request()).await {
        Ok(page) => {
            let view =
                LayoutContext::new(viewer_context(viewer.as_ref()), FeedContext::new(&page));
            render_template_response(IndexTemplate { view }, StatusCode::OK)
        }
        Err(err) => feed_error_to_response(
            "infra::http::public::index",
            err,
            viewer_context(viewer.as_ref()),
        ),
    }
}

async fn group_index(
    State(state): State<HttpState>,
    MaybeUser(viewer): MaybeUser,
    Path(slug): Path<String>,
    Query(query): Query<PageQuery>,
) -> Response {
    match state.feed.group_page(&slug, query.request()).await {
        Ok(feed) => {
            let view = LayoutContext::new(
                viewer_context(viewer.as_ref()),
                GroupContext::new(&feed.group, &feed.page),
            );
            render_template_response(GroupTemplate { view }, StatusCode::OK)
        }
        Err(err) => feed_error_to_response(
            "infra::http::public::group_index",
            err,
            viewer_context(viewer.as_ref()),
        ),
    }
}

async fn profile(
    State(state): State<HttpState>,
    MaybeUser(viewer): MaybeUser,
    Path(username): Path<String>,
    Query(query): Query<PageQuery>,
) -> Response {
    let viewer_id = viewer.as_ref().map(|user| user.id);
    match state
        .feed
        .profile_page(&username, viewer_id, query.request())
        .await
    {
        Ok(feed) => {
            let is_self = viewer_id == Some(feed.author.id);
            let view = LayoutContext::new(
                viewer_context(viewer.as_ref()),
                ProfileContext::new(&feed, is_self),
            );
            render_template_response(ProfileTemplate { view }, StatusCode::OK)
        }
        Err(err) => feed_error_to_response(
            "infra::http::public::profile",
            err,
            viewer_context(viewer.as_ref()),
        ),
    }
}

async fn post_detail(
    State(state): State<HttpState>,
    MaybeUser(viewer): MaybeUser,
    Path(id): Path<String>,
) -> Response {
    let Ok(post_id) = Uuid::parse_str(&id) else {
        return render_not_found_response(viewer_context(viewer.as_ref()));
    };

    match state.posts.detail(post_id).await {
        Ok(Some(detail)) => {
            let view = LayoutContext::new(
                viewer_context(viewer.as_ref()),
                PostDetailContext::new(&detail, viewer.as_ref()),
            );
            render_template_response(PostDetailTemplate { view }, StatusCode::OK)
        }
        Ok(None) => render_not_found_response(viewer_context(viewer.as_ref())),
        Err(err) => repo_error_to_http("infra::http::public::post_detail", err).into_response(),
    }
}

async fn about_author(MaybeUser(viewer): MaybeUser) -> Response {
    render_template_response(
        StaticPageTemplate::about_author(viewer_context(viewer.as_ref())),
        StatusCode::OK,
    )
}

async fn about_tech(MaybeUser(viewer): MaybeUser) -> Response {
    render_template_response(
        StaticPageTemplate::about_tech(viewer_context(viewer.as_ref())),
        StatusCode::OK,
    )
}

async fn serve_media(State(state): State<HttpState>, Path(path): Path<String>) -> Response {
    const SOURCE: &str = "infra::http::public::serve_media";

    match state.media.read(&path).await {
        Ok(bytes) => build_media_response(&path, bytes),
        Err(MediaStoreError::InvalidPath) => HttpError::new(
            SOURCE,
            StatusCode::NOT_FOUND,
            "Media not found",
            "The requested file is not available",
        )
        .into_response(),
        Err(MediaStoreError::Io(err)) if err.kind() == ErrorKind::NotFound => HttpError::new(
            SOURCE,
            StatusCode::NOT_FOUND,
            "Media not found",
            "The requested file is not available",
        )
        .into_response(),
        Err(err) => {
            error!(
                target = SOURCE,
                path = %path,
                error = %err,
                "failed to read stored media"
            );
            HttpError::new(
                SOURCE,
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to read media file",
                err.to_string(),
            )
            .into_response()
        }
    }
}

fn build_media_response(path: &str, bytes: Bytes) -> Response {
    let mut response = Response::new(Body::from(bytes.clone()));
    *response.status_mut() = StatusCode::OK;

    let headers = response.headers_mut();
    let mime = mime_guess::from_path(path).first_or_octet_stream();
    if let Ok(value) = HeaderValue::from_str(mime.as_ref()) {
        headers.insert(CONTENT_TYPE, value);
    }
    if let Ok(value) = HeaderValue::from_str(&bytes.len().to_string()) {
        headers.insert(CONTENT_LENGTH, value);
    }
    headers.insert(
        CACHE_CONTROL,
        HeaderValue::from_static("public, max-age=31536000, immutable"),
    );

    response
}

async fn health(State(state): State<HttpState>) -> Response {
    db_health_response(state.health.ping().await)
}

async fn fallback_not_found(MaybeUser(viewer): MaybeUser) -> Response {
    render_not_found_response(viewer_context(viewer.as_ref()))
}

/// Unknown groups and users become the custom 404 page; everything else is a
/// plain HTTP error.
pub(super) fn feed_error_to_response(
    source: &'static str,
    err: FeedError,
    viewer: Option<ViewerView>,
) -> Response {
    match err {
        FeedError::UnknownGroup | FeedError::UnknownUser => {
            let detail = err.to_string();
            let mut response = render_not_found_response(viewer);
            ErrorReport::from_message(source, StatusCode::NOT_FOUND, detail).attach(&mut response);
            response
        }
        FeedError::Repo(err) => repo_error_to_http(source, err).into_response(),
    }
}

//! Handlers for the post form and comments.

use axum::{
    Form,
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use bytes::Bytes;
use serde::Deserialize;
use tracing::warn;
use uuid::Uuid;

use crate::{
    application::{
        error::HttpError,
        posts::{CommentOutcome, PostDraft, PostFormErrors, PostWriteError},
    },
    domain::entities::UserRecord,
    presentation::views::{
        GroupOption, LayoutContext, PostFormContext, PostFormTemplate, media_url,
        render_not_found_response, render_template_response, viewer_context,
    },
};

use super::{
    auth::{MaybeUser, login_redirect},
    public::HttpState,
    repo_error_to_http,
};

pub(super) async fn create_form(
    State(state): State<HttpState>,
    MaybeUser(viewer): MaybeUser,
) -> Response {
    let Some(viewer) = viewer else {
        return login_redirect("/create/");
    };
    render_post_form(
        &state,
        &viewer,
        FormSeed::create(),
        PostFormErrors::default(),
        None,
    )
    .await
}

pub(super) async fn create_submit(
    State(state): State<HttpState>,
    MaybeUser(viewer): MaybeUser,
    multipart: Multipart,
) -> Response {
    const SOURCE: &str = "infra::http::posts::create_submit";

    let Some(viewer) = viewer else {
        return login_redirect("/create/");
    };

    let input = match read_post_form(multipart).await {
        Ok(input) => input,
        Err(err) => return form_read_error_response(SOURCE, err),
    };

    let seed = FormSeed::create().with_input(&input);
    if input.image_rejected {
        return render_post_form(
            &state,
            &viewer,
            seed,
            PostFormErrors::default(),
            Some(IMAGE_ERROR),
        )
        .await;
    }

    let stored_path = match store_image(&state, SOURCE, input.image).await {
        Ok(stored_path) => stored_path,
        Err(err) => return err.into_response(),
    };

    let draft = PostDraft {
        text: input.text,
        group_id: parse_group(&input.group_raw),
        image_path: stored_path.clone(),
    };

    match state.posts.create_post(viewer.id, draft).await {
        Ok(_) => Redirect::to(&format!("/profile/{}/", viewer.username)).into_response(),
        Err(PostWriteError::Rejected(errors)) => {
            discard_stored_image(&state, stored_path.as_deref()).await;
            render_post_form(&state, &viewer, seed, errors, None).await
        }
        Err(PostWriteError::Repo(err)) => {
            discard_stored_image(&state, stored_path.as_deref()).await;
            repo_error_to_http(SOURCE, err).into_response()
        }
        Err(err) => {
            discard_stored_image(&state, stored_path.as_deref()).await;
            HttpError::from_error(
                SOURCE,
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to create post",
                &err,
            )
            .into_response()
        }
    }
}

pub(super) async fn edit_form(
    State(state): State<HttpState>,
    MaybeUser(viewer): MaybeUser,
    Path(id): Path<String>,
) -> Response {
    const SOURCE: &str = "infra::http::posts::edit_form";

    let Some(viewer) = viewer else {
        return login_redirect(&format!("/posts/{id}/edit/"));
    };
    let Ok(post_id) = Uuid::parse_str(&id) else {
        return render_not_found_response(viewer_context(Some(&viewer)));
    };

    match state.posts.load_for_edit(viewer.id, post_id).await {
        Ok(item) => {
            let seed = FormSeed {
                action: format!("/posts/{post_id}/edit/"),
                is_edit: true,
                text: item.post.text.clone(),
                selected_group: item.post.group_id,
                current_image: item.post.image_path.as_deref().map(media_url),
            };
            render_post_form(&state, &viewer, seed, PostFormErrors::default(), None).await
        }
        Err(err) => edit_error_response(SOURCE, err, post_id, &viewer),
    }
}

pub(super) async fn edit_submit(
    State(state): State<HttpState>,
    MaybeUser(viewer): MaybeUser,
    Path(id): Path<String>,
    multipart: Multipart,
) -> Response {
    const SOURCE: &str = "infra::http::posts::edit_submit";

    let Some(viewer) = viewer else {
        return login_redirect(&format!("/posts/{id}/edit/"));
    };
    let Ok(post_id) = Uuid::parse_str(&id) else {
        return render_not_found_response(viewer_context(Some(&viewer)));
    };

    // Authorisation runs before the body is touched, and the pre-edit row is
    // kept so a replaced image file can be removed afterwards.
    let existing = match state.posts.load_for_edit(viewer.id, post_id).await {
        Ok(item) => item,
        Err(err) => return edit_error_response(SOURCE, err, post_id, &viewer),
    };

    let input = match read_post_form(multipart).await {
        Ok(input) => input,
        Err(err) => return form_read_error_response(SOURCE, err),
    };

    let seed = FormSeed {
        action: format!("/posts/{post_id}/edit/"),
        is_edit: true,
        text: String::new(),
        selected_group: None,
        current_image: existing.post.image_path.as_deref().map(media_url),
    }
    .with_input(&input);

    if input.image_rejected {
        return render_post_form(
            &state,
            &viewer,
            seed,
            PostFormErrors::default(),
            Some(IMAGE_ERROR),
        )
        .await;
    }

    let stored_path = match store_image(&state, SOURCE, input.image).await {
        Ok(stored_path) => stored_path,
        Err(err) => return err.into_response(),
    };

    let draft = PostDraft {
        text: input.text,
        group_id: parse_group(&input.group_raw),
        image_path: stored_path.clone(),
    };

    match state.posts.edit_post(viewer.id, post_id, draft).await {
        Ok(_) => {
            if stored_path.is_some() {
                discard_stored_image(&state, existing.post.image_path.as_deref()).await;
            }
            Redirect::to(&detail_path(post_id)).into_response()
        }
        Err(PostWriteError::Rejected(errors)) => {
            discard_stored_image(&state, stored_path.as_deref()).await;
            render_post_form(&state, &viewer, seed, errors, None).await
        }
        Err(err) => {
            discard_stored_image(&state, stored_path.as_deref()).await;
            edit_error_response(SOURCE, err, post_id, &viewer)
        }
    }
}

/// A bare GET of the comment endpoint happens after a login redirect; there
/// is no comment page of its own, so the viewer continues to the post.
pub(super) async fn comment_redirect(
    MaybeUser(viewer): MaybeUser,
    Path(id): Path<String>,
) -> Response {
    let Some(viewer) = viewer else {
        return login_redirect(&format!("/posts/{id}/comment/"));
    };
    match Uuid::parse_str(&id) {
        Ok(post_id) => Redirect::to(&detail_path(post_id)).into_response(),
        Err(_) => render_not_found_response(viewer_context(Some(&viewer))),
    }
}

#[derive(Debug, Deserialize)]
pub(super) struct CommentForm {
    #[serde(default)]
    text: String,
}

pub(super) async fn add_comment(
    State(state): State<HttpState>,
    MaybeUser(viewer): MaybeUser,
    Path(id): Path<String>,
    Form(form): Form<CommentForm>,
) -> Response {
    const SOURCE: &str = "infra::http::posts::add_comment";

    let Some(viewer) = viewer else {
        return login_redirect(&format!("/posts/{id}/comment/"));
    };
    let Ok(post_id) = Uuid::parse_str(&id) else {
        return render_not_found_response(viewer_context(Some(&viewer)));
    };

    match state.posts.add_comment(viewer.id, post_id, &form.text).await {
        // Both outcomes land back on the detail page; a blank comment simply
        // leaves no trace there.
        Ok(CommentOutcome::Added(_) | CommentOutcome::Rejected) => {
            Redirect::to(&detail_path(post_id)).into_response()
        }
        Err(PostWriteError::UnknownPost) => {
            render_not_found_response(viewer_context(Some(&viewer)))
        }
        Err(PostWriteError::Repo(err)) => repo_error_to_http(SOURCE, err).into_response(),
        Err(err) => HttpError::from_error(
            SOURCE,
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to add comment",
            &err,
        )
        .into_response(),
    }
}

const IMAGE_ERROR: &str = "Upload a valid image.";

/// Decoded `multipart/form-data` for the post form.
#[derive(Default)]
struct PostFormInput {
    text: String,
    group_raw: String,
    image: Option<ImagePart>,
    /// A file arrived that does not look like an image.
    image_rejected: bool,
}

struct ImagePart {
    filename: String,
    bytes: Bytes,
}

enum PostFormReadError {
    TooLarge,
    Invalid(String),
}

async fn read_post_form(mut multipart: Multipart) -> Result<PostFormInput, PostFormReadError> {
    let mut input = PostFormInput::default();

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(err) => {
                return Err(if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
                    PostFormReadError::TooLarge
                } else {
                    PostFormReadError::Invalid(err.to_string())
                });
            }
        };

        match field.name() {
            Some("text") => {
                input.text = field
                    .text()
                    .await
                    .map_err(|err| PostFormReadError::Invalid(err.to_string()))?;
            }
            Some("group") => {
                input.group_raw = field
                    .text()
                    .await
                    .map_err(|err| PostFormReadError::Invalid(err.to_string()))?;
            }
            Some("image") => {
                let filename = field.file_name().unwrap_or_default().to_string();
                // Browsers send an empty unnamed part when no file was picked.
                if filename.trim().is_empty() {
                    continue;
                }
                let is_image = field
                    .content_type()
                    .is_some_and(|mime| mime.starts_with("image/"));
                if !is_image {
                    input.image_rejected = true;
                    continue;
                }
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|err| match err.status() {
                        StatusCode::PAYLOAD_TOO_LARGE => PostFormReadError::TooLarge,
                        _ => PostFormReadError::Invalid(err.to_string()),
                    })?;
                if bytes.is_empty() {
                    continue;
                }
                input.image = Some(ImagePart { filename, bytes });
            }
            _ => {}
        }
    }

    Ok(input)
}

fn form_read_error_response(source: &'static str, err: PostFormReadError) -> Response {
    match err {
        PostFormReadError::TooLarge => HttpError::new(
            source,
            StatusCode::PAYLOAD_TOO_LARGE,
            "Upload too large",
            "multipart payload exceeded the configured limit",
        )
        .into_response(),
        PostFormReadError::Invalid(detail) => HttpError::new(
            source,
            StatusCode::BAD_REQUEST,
            "Malformed form submission",
            detail,
        )
        .into_response(),
    }
}

/// Prefill values for the post form template.
struct FormSeed {
    action: String,
    is_edit: bool,
    text: String,
    selected_group: Option<Uuid>,
    current_image: Option<String>,
}

impl FormSeed {
    fn create() -> Self {
        Self {
            action: "/create/".to_string(),
            is_edit: false,
            text: String::new(),
            selected_group: None,
            current_image: None,
        }
    }

    /// Carry submitted values back into the redisplayed form.
    fn with_input(mut self, input: &PostFormInput) -> Self {
        self.text = input.text.clone();
        self.selected_group = parse_group(&input.group_raw);
        self
    }
}

async fn render_post_form(
    state: &HttpState,
    viewer: &UserRecord,
    seed: FormSeed,
    errors: PostFormErrors,
    image_error: Option<&'static str>,
) -> Response {
    const SOURCE: &str = "infra::http::posts::render_post_form";

    let groups = match state.posts.groups_for_form().await {
        Ok(groups) => groups,
        Err(err) => return repo_error_to_http(SOURCE, err).into_response(),
    };

    let content = PostFormContext {
        is_edit: seed.is_edit,
        action: seed.action,
        text: seed.text,
        selected_group: seed
            .selected_group
            .map(|id| id.to_string())
            .unwrap_or_default(),
        groups: groups
            .iter()
            .map(|group| GroupOption {
                id: group.id.to_string(),
                title: group.title.clone(),
            })
            .collect(),
        text_error: errors.text,
        group_error: errors.group,
        image_error,
        current_image: seed.current_image,
    };
    let view = LayoutContext::new(viewer_context(Some(viewer)), content);
    render_template_response(PostFormTemplate { view }, StatusCode::OK)
}

fn edit_error_response(
    source: &'static str,
    err: PostWriteError,
    post_id: Uuid,
    viewer: &UserRecord,
) -> Response {
    match err {
        PostWriteError::UnknownPost => render_not_found_response(viewer_context(Some(viewer))),
        // Someone else's post: quietly send the viewer to the detail page.
        PostWriteError::NotAuthor => Redirect::to(&detail_path(post_id)).into_response(),
        PostWriteError::Repo(err) => repo_error_to_http(source, err).into_response(),
        err => HttpError::from_error(
            source,
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to edit post",
            &err,
        )
        .into_response(),
    }
}

async fn store_image(
    state: &HttpState,
    source: &'static str,
    image: Option<ImagePart>,
) -> Result<Option<String>, HttpError> {
    let Some(part) = image else {
        return Ok(None);
    };
    match state.media.store(&part.filename, part.bytes).await {
        Ok(stored) => Ok(Some(stored.stored_path)),
        Err(err) => Err(HttpError::from_error(
            source,
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to store uploaded image",
            &err,
        )),
    }
}

async fn discard_stored_image(state: &HttpState, stored_path: Option<&str>) {
    if let Some(path) = stored_path {
        if let Err(err) = state.media.delete(path).await {
            warn!(
                target = "breva::http::posts",
                path = %path,
                error = %err,
                "failed to remove unreferenced upload"
            );
        }
    }
}

fn parse_group(raw: &str) -> Option<Uuid> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    // A tampered selector value can never match a stored group; validation
    // reports it as an unknown choice.
    Some(Uuid::parse_str(raw).unwrap_or(Uuid::nil()))
}

fn detail_path(post_id: Uuid) -> String {
    format!("/posts/{post_id}/")
}

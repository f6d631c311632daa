use askama::{Error as AskamaError, Template};
use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use thiserror::Error;
use time::{OffsetDateTime, format_description::FormatItem, macros::format_description};

use crate::application::error::{ErrorReport, HttpError};
use crate::application::feed::ProfileFeed;
use crate::application::pagination::Page;
use crate::application::posts::PostDetail;
use crate::application::repos::{CommentWithAuthor, PostFeedItem};
use crate::domain::entities::{GroupRecord, UserRecord};

pub const TIMESTAMP_FORMAT: &[FormatItem<'static>] =
    format_description!("[day padding:none] [month repr:short] [year], [hour]:[minute]");

#[derive(Debug, Error)]
#[error("{public_message}")]
pub struct TemplateRenderError {
    pub(crate) source: &'static str,
    pub(crate) public_message: &'static str,
    #[source]
    pub(crate) error: AskamaError,
}

impl TemplateRenderError {
    pub fn new(source: &'static str, public_message: &'static str, error: AskamaError) -> Self {
        Self {
            source,
            public_message,
            error,
        }
    }
}

impl From<TemplateRenderError> for HttpError {
    fn from(err: TemplateRenderError) -> Self {
        let TemplateRenderError {
            source,
            public_message,
            error,
        } = err;

        HttpError::from_error(
            source,
            StatusCode::INTERNAL_SERVER_ERROR,
            public_message,
            &error,
        )
    }
}

pub fn render_template<T: Template>(template: T) -> Result<Html<String>, HttpError> {
    template.render().map(Html).map_err(|err| {
        TemplateRenderError::new(
            "presentation::views::render_template",
            "Template rendering failed",
            err,
        )
        .into()
    })
}

pub fn render_template_response<T: Template>(template: T, status: StatusCode) -> Response {
    match render_template(template) {
        Ok(html) => (status, html).into_response(),
        Err(err) => err.into_response(),
    }
}

pub fn render_not_found_response(viewer: Option<ViewerView>) -> Response {
    let view = LayoutContext::new(viewer, ());
    let mut response = render_template_response(NotFoundTemplate { view }, StatusCode::NOT_FOUND);
    ErrorReport::from_message(
        "presentation::views::render_not_found_response",
        StatusCode::NOT_FOUND,
        "Resource not found",
    )
    .attach(&mut response);
    response
}

/// The signed-in member as the navigation chrome shows them.
#[derive(Debug, Clone)]
pub struct ViewerView {
    pub username: String,
    pub display_name: String,
}

impl ViewerView {
    pub fn from_user(user: &UserRecord) -> Self {
        Self {
            username: user.username.clone(),
            display_name: user.display_name.clone(),
        }
    }
}

pub fn viewer_context(user: Option<&UserRecord>) -> Option<ViewerView> {
    user.map(ViewerView::from_user)
}

/// Everything the base layout wraps around a page body.
#[derive(Debug, Clone)]
pub struct LayoutContext<T> {
    pub viewer: Option<ViewerView>,
    pub content: T,
}

impl<T> LayoutContext<T> {
    pub fn new(viewer: Option<ViewerView>, content: T) -> Self {
        Self { viewer, content }
    }
}

#[derive(Debug, Clone)]
pub struct GroupLink {
    pub title: String,
    pub slug: String,
}

/// One post as every listing and the detail page render it.
#[derive(Debug, Clone)]
pub struct PostCard {
    pub id: String,
    pub text: String,
    pub preview: String,
    pub published: String,
    pub author_username: String,
    pub author_display_name: String,
    pub group: Option<GroupLink>,
    pub image_url: Option<String>,
}

impl PostCard {
    pub fn from_item(item: &PostFeedItem) -> Self {
        Self {
            id: item.post.id.to_string(),
            text: item.post.text.clone(),
            preview: item.post.preview(),
            published: format_timestamp(item.post.pub_date),
            author_username: item.author_username.clone(),
            author_display_name: item.author_display_name.clone(),
            group: item.group.as_ref().map(|group| GroupLink {
                title: group.title.clone(),
                slug: group.slug.clone(),
            }),
            image_url: item.post.image_path.as_deref().map(media_url),
        }
    }
}

/// Public URL of a stored media file.
pub fn media_url(stored_path: &str) -> String {
    format!("/media/{stored_path}")
}

pub fn format_timestamp(at: OffsetDateTime) -> String {
    at.format(TIMESTAMP_FORMAT).expect("valid timestamp")
}

#[derive(Debug, Clone)]
pub struct PaginatorView {
    pub number: u32,
    pub total_pages: u32,
    pub total_items: u64,
    pub has_previous: bool,
    pub has_next: bool,
    pub previous_number: u32,
    pub next_number: u32,
}

impl PaginatorView {
    pub fn from_page<T>(page: &Page<T>) -> Self {
        Self {
            number: page.number,
            total_pages: page.total_pages,
            total_items: page.total_items,
            has_previous: page.has_previous(),
            has_next: page.has_next(),
            previous_number: page.previous_number().unwrap_or(page.number),
            next_number: page.next_number().unwrap_or(page.number),
        }
    }
}

/// The front page and the follow feed: a window of posts plus paging
/// controls.
pub struct FeedContext {
    pub posts: Vec<PostCard>,
    pub paginator: PaginatorView,
}

impl FeedContext {
    pub fn new(page: &Page<PostFeedItem>) -> Self {
        Self {
            posts: page.items.iter().map(PostCard::from_item).collect(),
            paginator: PaginatorView::from_page(page),
        }
    }
}

pub struct GroupView {
    pub title: String,
    pub slug: String,
    pub description: String,
}

pub struct GroupContext {
    pub group: GroupView,
    pub posts: Vec<PostCard>,
    pub paginator: PaginatorView,
}

impl GroupContext {
    pub fn new(group: &GroupRecord, page: &Page<PostFeedItem>) -> Self {
        Self {
            group: GroupView {
                title: group.title.clone(),
                slug: group.slug.clone(),
                description: group.description.clone(),
            },
            posts: page.items.iter().map(PostCard::from_item).collect(),
            paginator: PaginatorView::from_page(page),
        }
    }
}

pub struct ProfileContext {
    pub author_username: String,
    pub author_display_name: String,
    /// The author's full post count, independent of the current page.
    pub post_count: u64,
    pub following: bool,
    /// Viewing your own profile hides the follow controls entirely.
    pub is_self: bool,
    pub posts: Vec<PostCard>,
    pub paginator: PaginatorView,
}

impl ProfileContext {
    pub fn new(feed: &ProfileFeed, is_self: bool) -> Self {
        Self {
            author_username: feed.author.username.clone(),
            author_display_name: feed.author.display_name.clone(),
            post_count: feed.page.total_items,
            following: feed.following,
            is_self,
            posts: feed.page.items.iter().map(PostCard::from_item).collect(),
            paginator: PaginatorView::from_page(&feed.page),
        }
    }
}

pub struct CommentView {
    pub author_username: String,
    pub author_display_name: String,
    pub created: String,
    pub text: String,
}

impl CommentView {
    pub fn from_comment(comment: &CommentWithAuthor) -> Self {
        Self {
            author_username: comment.author_username.clone(),
            author_display_name: comment.author_display_name.clone(),
            created: format_timestamp(comment.comment.created),
            text: comment.comment.text.clone(),
        }
    }
}

pub struct PostDetailContext {
    pub post: PostCard,
    pub comments: Vec<CommentView>,
    pub can_comment: bool,
    pub can_edit: bool,
}

impl PostDetailContext {
    pub fn new(detail: &PostDetail, viewer: Option<&UserRecord>) -> Self {
        let can_edit = viewer.is_some_and(|user| user.id == detail.item.post.author_id);
        Self {
            post: PostCard::from_item(&detail.item),
            comments: detail
                .comments
                .iter()
                .map(CommentView::from_comment)
                .collect(),
            can_comment: viewer.is_some(),
            can_edit,
        }
    }
}

pub struct GroupOption {
    pub id: String,
    pub title: String,
}

pub struct PostFormContext {
    pub is_edit: bool,
    pub action: String,
    pub text: String,
    /// Uuid of the chosen group as a string, or empty for "no group".
    pub selected_group: String,
    pub groups: Vec<GroupOption>,
    pub text_error: Option<&'static str>,
    pub group_error: Option<&'static str>,
    pub image_error: Option<&'static str>,
    pub current_image: Option<String>,
}

pub struct SignupContext {
    pub username: String,
    pub display_name: String,
    pub username_error: Option<&'static str>,
    pub password_error: Option<&'static str>,
}

pub struct LoginContext {
    pub username: String,
    pub next: String,
    pub error: Option<&'static str>,
}

pub struct StaticPageView {
    pub title: &'static str,
    pub paragraphs: &'static [&'static str],
}

#[derive(Template)]
#[template(path = "index.html")]
pub struct IndexTemplate {
    pub view: LayoutContext<FeedContext>,
}

#[derive(Template)]
#[template(path = "follow.html")]
pub struct FollowTemplate {
    pub view: LayoutContext<FeedContext>,
}

#[derive(Template)]
#[template(path = "group.html")]
pub struct GroupTemplate {
    pub view: LayoutContext<GroupContext>,
}

#[derive(Template)]
#[template(path = "profile.html")]
pub struct ProfileTemplate {
    pub view: LayoutContext<ProfileContext>,
}

#[derive(Template)]
#[template(path = "post_detail.html")]
pub struct PostDetailTemplate {
    pub view: LayoutContext<PostDetailContext>,
}

#[derive(Template)]
#[template(path = "post_form.html")]
pub struct PostFormTemplate {
    pub view: LayoutContext<PostFormContext>,
}

#[derive(Template)]
#[template(path = "signup.html")]
pub struct SignupTemplate {
    pub view: LayoutContext<SignupContext>,
}

#[derive(Template)]
#[template(path = "login.html")]
pub struct LoginTemplate {
    pub view: LayoutContext<LoginContext>,
}

#[derive(Template)]
#[template(path = "static_page.html")]
pub struct StaticPageTemplate {
    pub view: LayoutContext<StaticPageView>,
}

impl StaticPageTemplate {
    pub fn about_author(viewer: Option<ViewerView>) -> Self {
        Self {
            view: LayoutContext::new(
                viewer,
                StaticPageView {
                    title: "About the author",
                    paragraphs: &[
                        "Breva is written and run by a small group of people who \
                         like short-form writing and old-school web forums.",
                        "The code is the documentation of its authors' taste: plain \
                         pages, no client-side framework, and a database schema you \
                         can read in one sitting.",
                    ],
                },
            ),
        }
    }

    pub fn about_tech(viewer: Option<ViewerView>) -> Self {
        Self {
            view: LayoutContext::new(
                viewer,
                StaticPageView {
                    title: "Technology",
                    paragraphs: &[
                        "The server is a single Rust binary built on axum and \
                         tokio, with PostgreSQL behind sqlx for storage and askama \
                         templates for the pages you are reading.",
                        "The front page is cached for a few seconds at a time; \
                         everything else is rendered per request.",
                    ],
                },
            ),
        }
    }
}

#[derive(Template)]
#[template(path = "not_found.html")]
pub struct NotFoundTemplate {
    pub view: LayoutContext<()>,
}

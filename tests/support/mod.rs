#![allow(dead_code)]

use std::collections::HashSet;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header},
    response::Response,
};
use http_body_util::BodyExt;
use tempfile::TempDir;
use time::OffsetDateTime;
use tokio::sync::Mutex;
use tower::ServiceExt;
use uuid::Uuid;

use breva::application::accounts::AccountService;
use breva::application::feed::FeedService;
use breva::application::follows::FollowService;
use breva::application::pagination::PageWindow;
use breva::application::posts::PostService;
use breva::application::repos::{
    CommentWithAuthor, CommentsRepo, FollowsRepo, GroupRef, GroupsRepo, HealthProbe,
    NewCommentParams, NewPostParams, NewSessionParams, NewUserParams, PostFeedItem, PostScope,
    PostsRepo, PostsWriteRepo, RepoError, SessionsRepo, UpdatePostParams, UsersRepo,
};
use breva::cache::PageCache;
use breva::domain::entities::{
    CommentRecord, FollowRecord, GroupRecord, PostRecord, SessionRecord, UserRecord,
};
use breva::infra::http::{HttpState, build_router};
use breva::infra::uploads::MediaStorage;

pub const PASSWORD: &str = "correct-horse";

/// In-memory repository doubles backing the HTTP tests. Each collection
/// mirrors one table; scope filtering and ordering match the SQL queries.
#[derive(Default)]
pub struct MemoryRepos {
    pub users: Mutex<Vec<UserRecord>>,
    pub groups: Mutex<Vec<GroupRecord>>,
    pub posts: Mutex<Vec<PostRecord>>,
    pub comments: Mutex<Vec<CommentRecord>>,
    pub follows: Mutex<Vec<FollowRecord>>,
    pub sessions: Mutex<Vec<SessionRecord>>,
    /// When set, post listings fail with a persistence error.
    pub fail_post_listings: AtomicBool,
    /// When set, the health probe reports the store unreachable.
    pub fail_health: AtomicBool,
}

impl MemoryRepos {
    pub async fn seed_user(&self, username: &str) -> UserRecord {
        let user = UserRecord {
            id: Uuid::new_v4(),
            username: username.to_string(),
            display_name: username.to_string(),
            password_salt: "seed".to_string(),
            password_digest: Vec::new(),
            created_at: OffsetDateTime::now_utc(),
        };
        self.users.lock().await.push(user.clone());
        user
    }

    pub async fn seed_group(&self, title: &str, slug: &str) -> GroupRecord {
        let group = GroupRecord {
            id: Uuid::new_v4(),
            title: title.to_string(),
            slug: slug.to_string(),
            description: format!("Posts about {title}"),
            created_at: OffsetDateTime::now_utc(),
        };
        self.groups.lock().await.push(group.clone());
        group
    }

    pub async fn seed_post(
        &self,
        author: &UserRecord,
        group: Option<&GroupRecord>,
        text: &str,
        pub_date: OffsetDateTime,
    ) -> PostRecord {
        let post = PostRecord {
            id: Uuid::new_v4(),
            text: text.to_string(),
            pub_date,
            author_id: author.id,
            group_id: group.map(|group| group.id),
            image_path: None,
        };
        self.posts.lock().await.push(post.clone());
        post
    }

    pub async fn seed_comment(
        &self,
        post: &PostRecord,
        author: &UserRecord,
        text: &str,
    ) -> CommentRecord {
        let comment = CommentRecord {
            id: Uuid::new_v4(),
            post_id: post.id,
            author_id: author.id,
            text: text.to_string(),
            created: OffsetDateTime::now_utc(),
        };
        self.comments.lock().await.push(comment.clone());
        comment
    }

    pub async fn user_by_username(&self, username: &str) -> Option<UserRecord> {
        self.users
            .lock()
            .await
            .iter()
            .find(|user| user.username == username)
            .cloned()
    }

    pub async fn post(&self, id: Uuid) -> Option<PostRecord> {
        self.posts
            .lock()
            .await
            .iter()
            .find(|post| post.id == id)
            .cloned()
    }

    pub async fn latest_post(&self) -> Option<PostRecord> {
        self.posts.lock().await.last().cloned()
    }

    pub async fn post_count(&self) -> usize {
        self.posts.lock().await.len()
    }

    pub async fn comment_count(&self) -> usize {
        self.comments.lock().await.len()
    }

    pub async fn follow_count(&self) -> usize {
        self.follows.lock().await.len()
    }

    async fn scoped(&self, scope: PostScope) -> Vec<PostRecord> {
        let posts = self.posts.lock().await.clone();
        match scope {
            PostScope::Global => posts,
            PostScope::Group(group_id) => posts
                .into_iter()
                .filter(|post| post.group_id == Some(group_id))
                .collect(),
            PostScope::Author(author_id) => posts
                .into_iter()
                .filter(|post| post.author_id == author_id)
                .collect(),
            PostScope::FollowedBy(user_id) => {
                let followed: HashSet<Uuid> = self
                    .follows
                    .lock()
                    .await
                    .iter()
                    .filter(|edge| edge.user_id == user_id)
                    .map(|edge| edge.author_id)
                    .collect();
                posts
                    .into_iter()
                    .filter(|post| followed.contains(&post.author_id))
                    .collect()
            }
        }
    }

    async fn feed_item(&self, post: PostRecord) -> PostFeedItem {
        let author = {
            let users = self.users.lock().await;
            users.iter().find(|user| user.id == post.author_id).cloned()
        };
        let group = {
            let groups = self.groups.lock().await;
            post.group_id
                .and_then(|id| groups.iter().find(|group| group.id == id).cloned())
                .map(|group| GroupRef {
                    title: group.title,
                    slug: group.slug,
                })
        };
        let (author_username, author_display_name) = author
            .map(|user| (user.username, user.display_name))
            .unwrap_or_default();
        PostFeedItem {
            post,
            author_username,
            author_display_name,
            group,
        }
    }
}

fn sort_newest_first(posts: &mut [PostRecord]) {
    posts.sort_by(|a, b| {
        b.pub_date
            .cmp(&a.pub_date)
            .then_with(|| a.author_id.cmp(&b.author_id))
            .then_with(|| a.id.cmp(&b.id))
    });
}

#[async_trait]
impl UsersRepo for MemoryRepos {
    async fn create_user(&self, params: NewUserParams) -> Result<UserRecord, RepoError> {
        let mut users = self.users.lock().await;
        if users.iter().any(|user| user.username == params.username) {
            return Err(RepoError::Duplicate {
                constraint: "users_username_key".to_string(),
            });
        }
        let user = UserRecord {
            id: Uuid::new_v4(),
            username: params.username,
            display_name: params.display_name,
            password_salt: params.password_salt,
            password_digest: params.password_digest,
            created_at: OffsetDateTime::now_utc(),
        };
        users.push(user.clone());
        Ok(user)
    }

    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<UserRecord>, RepoError> {
        Ok(self
            .users
            .lock()
            .await
            .iter()
            .find(|user| user.id == id)
            .cloned())
    }

    async fn find_user_by_username(
        &self,
        username: &str,
    ) -> Result<Option<UserRecord>, RepoError> {
        Ok(self.user_by_username(username).await)
    }
}

#[async_trait]
impl GroupsRepo for MemoryRepos {
    async fn list_groups(&self) -> Result<Vec<GroupRecord>, RepoError> {
        let mut groups = self.groups.lock().await.clone();
        groups.sort_by(|a, b| a.title.cmp(&b.title));
        Ok(groups)
    }

    async fn find_group_by_slug(&self, slug: &str) -> Result<Option<GroupRecord>, RepoError> {
        Ok(self
            .groups
            .lock()
            .await
            .iter()
            .find(|group| group.slug == slug)
            .cloned())
    }

    async fn find_group_by_id(&self, id: Uuid) -> Result<Option<GroupRecord>, RepoError> {
        Ok(self
            .groups
            .lock()
            .await
            .iter()
            .find(|group| group.id == id)
            .cloned())
    }
}

#[async_trait]
impl PostsRepo for MemoryRepos {
    async fn count_posts(&self, scope: PostScope) -> Result<u64, RepoError> {
        if self.fail_post_listings.load(Ordering::SeqCst) {
            return Err(RepoError::Persistence("post store offline".to_string()));
        }
        Ok(self.scoped(scope).await.len() as u64)
    }

    async fn list_posts(
        &self,
        scope: PostScope,
        window: PageWindow,
    ) -> Result<Vec<PostFeedItem>, RepoError> {
        if self.fail_post_listings.load(Ordering::SeqCst) {
            return Err(RepoError::Persistence("post store offline".to_string()));
        }
        let mut posts = self.scoped(scope).await;
        sort_newest_first(&mut posts);
        let start = usize::try_from(window.offset).unwrap_or(0).min(posts.len());
        let end = start
            .saturating_add(usize::try_from(window.limit).unwrap_or(0))
            .min(posts.len());
        let mut items = Vec::with_capacity(end - start);
        for post in posts[start..end].to_vec() {
            items.push(self.feed_item(post).await);
        }
        Ok(items)
    }

    async fn find_post(&self, id: Uuid) -> Result<Option<PostFeedItem>, RepoError> {
        let Some(post) = self.post(id).await else {
            return Ok(None);
        };
        Ok(Some(self.feed_item(post).await))
    }
}

#[async_trait]
impl PostsWriteRepo for MemoryRepos {
    async fn create_post(&self, params: NewPostParams) -> Result<PostRecord, RepoError> {
        let post = PostRecord {
            id: Uuid::new_v4(),
            text: params.text,
            pub_date: OffsetDateTime::now_utc(),
            author_id: params.author_id,
            group_id: params.group_id,
            image_path: params.image_path,
        };
        self.posts.lock().await.push(post.clone());
        Ok(post)
    }

    async fn update_post(&self, params: UpdatePostParams) -> Result<PostRecord, RepoError> {
        let mut posts = self.posts.lock().await;
        let post = posts
            .iter_mut()
            .find(|post| post.id == params.id)
            .ok_or(RepoError::NotFound)?;
        post.text = params.text;
        post.group_id = params.group_id;
        if let Some(image_path) = params.image_path {
            post.image_path = Some(image_path);
        }
        Ok(post.clone())
    }
}

#[async_trait]
impl CommentsRepo for MemoryRepos {
    async fn list_comments(&self, post_id: Uuid) -> Result<Vec<CommentWithAuthor>, RepoError> {
        let mut comments: Vec<CommentRecord> = self
            .comments
            .lock()
            .await
            .iter()
            .filter(|comment| comment.post_id == post_id)
            .cloned()
            .collect();
        comments.sort_by(|a, b| {
            b.created
                .cmp(&a.created)
                .then_with(|| a.author_id.cmp(&b.author_id))
                .then_with(|| a.id.cmp(&b.id))
        });
        let users = self.users.lock().await;
        Ok(comments
            .into_iter()
            .map(|comment| {
                let author = users.iter().find(|user| user.id == comment.author_id);
                CommentWithAuthor {
                    author_username: author.map(|u| u.username.clone()).unwrap_or_default(),
                    author_display_name: author.map(|u| u.display_name.clone()).unwrap_or_default(),
                    comment,
                }
            })
            .collect())
    }

    async fn create_comment(&self, params: NewCommentParams) -> Result<CommentRecord, RepoError> {
        let comment = CommentRecord {
            id: Uuid::new_v4(),
            post_id: params.post_id,
            author_id: params.author_id,
            text: params.text,
            created: OffsetDateTime::now_utc(),
        };
        self.comments.lock().await.push(comment.clone());
        Ok(comment)
    }
}

#[async_trait]
impl FollowsRepo for MemoryRepos {
    async fn create_follow(
        &self,
        user_id: Uuid,
        author_id: Uuid,
    ) -> Result<FollowRecord, RepoError> {
        let edge = FollowRecord {
            id: Uuid::new_v4(),
            user_id,
            author_id,
            created_at: OffsetDateTime::now_utc(),
        };
        self.follows.lock().await.push(edge.clone());
        Ok(edge)
    }

    async fn delete_follows(&self, user_id: Uuid, author_id: Uuid) -> Result<u64, RepoError> {
        let mut follows = self.follows.lock().await;
        let before = follows.len();
        follows.retain(|edge| !(edge.user_id == user_id && edge.author_id == author_id));
        Ok((before - follows.len()) as u64)
    }

    async fn follow_exists(&self, user_id: Uuid, author_id: Uuid) -> Result<bool, RepoError> {
        Ok(self
            .follows
            .lock()
            .await
            .iter()
            .any(|edge| edge.user_id == user_id && edge.author_id == author_id))
    }
}

#[async_trait]
impl SessionsRepo for MemoryRepos {
    async fn create_session(&self, params: NewSessionParams) -> Result<SessionRecord, RepoError> {
        let session = SessionRecord {
            id: Uuid::new_v4(),
            user_id: params.user_id,
            token_digest: params.token_digest,
            expires_at: params.expires_at,
            created_at: OffsetDateTime::now_utc(),
        };
        self.sessions.lock().await.push(session.clone());
        Ok(session)
    }

    async fn find_session(
        &self,
        token_digest: &[u8],
    ) -> Result<Option<SessionRecord>, RepoError> {
        Ok(self
            .sessions
            .lock()
            .await
            .iter()
            .find(|session| session.token_digest == token_digest)
            .cloned())
    }

    async fn delete_session(&self, token_digest: &[u8]) -> Result<(), RepoError> {
        self.sessions
            .lock()
            .await
            .retain(|session| session.token_digest != token_digest);
        Ok(())
    }
}

#[async_trait]
impl HealthProbe for MemoryRepos {
    async fn ping(&self) -> Result<(), RepoError> {
        if self.fail_health.load(Ordering::SeqCst) {
            return Err(RepoError::Timeout);
        }
        Ok(())
    }
}

/// The whole application wired over [`MemoryRepos`], exercised through the
/// real router.
pub struct TestApp {
    pub router: Router,
    pub repos: Arc<MemoryRepos>,
    pub cache: Option<PageCache>,
    _media_dir: TempDir,
}

impl TestApp {
    pub fn new() -> Self {
        Self::assemble(10, None, 1 << 20)
    }

    pub fn with_posts_per_page(posts_per_page: u32) -> Self {
        Self::assemble(posts_per_page, None, 1 << 20)
    }

    pub fn with_cache(ttl: Duration) -> Self {
        Self::assemble(10, Some(ttl), 1 << 20)
    }

    pub fn with_upload_limit(bytes: usize) -> Self {
        Self::assemble(10, None, bytes)
    }

    fn assemble(posts_per_page: u32, cache_ttl: Option<Duration>, upload_limit: usize) -> Self {
        let repos = Arc::new(MemoryRepos::default());

        let posts_repo: Arc<dyn PostsRepo> = repos.clone();
        let posts_write_repo: Arc<dyn PostsWriteRepo> = repos.clone();
        let groups_repo: Arc<dyn GroupsRepo> = repos.clone();
        let users_repo: Arc<dyn UsersRepo> = repos.clone();
        let comments_repo: Arc<dyn CommentsRepo> = repos.clone();
        let follows_repo: Arc<dyn FollowsRepo> = repos.clone();
        let sessions_repo: Arc<dyn SessionsRepo> = repos.clone();
        let health: Arc<dyn HealthProbe> = repos.clone();

        let per_page = NonZeroU32::new(posts_per_page).expect("non-zero page size");
        let feed = Arc::new(FeedService::new(
            posts_repo.clone(),
            groups_repo.clone(),
            users_repo.clone(),
            follows_repo.clone(),
            per_page,
        ));
        let posts = Arc::new(PostService::new(
            posts_repo,
            posts_write_repo,
            comments_repo,
            groups_repo,
        ));
        let follows = Arc::new(FollowService::new(users_repo.clone(), follows_repo));
        let accounts = Arc::new(AccountService::new(
            users_repo,
            sessions_repo,
            time::Duration::days(14),
        ));

        let media_dir = TempDir::new().expect("temp media directory");
        let media =
            Arc::new(MediaStorage::new(media_dir.path().to_path_buf()).expect("media storage"));

        let cache = cache_ttl.map(PageCache::new);

        let state = HttpState {
            feed,
            posts,
            follows,
            accounts,
            media,
            health,
            cache: cache.clone(),
            upload_limit_bytes: upload_limit,
        };

        Self {
            router: build_router(state),
            repos,
            cache,
            _media_dir: media_dir,
        }
    }

    pub async fn get(&self, path: &str) -> Response {
        self.send(Method::GET, path, None, None, Body::empty())
            .await
    }

    pub async fn get_as(&self, path: &str, cookie: &str) -> Response {
        self.send(Method::GET, path, Some(cookie), None, Body::empty())
            .await
    }

    pub async fn post_form(&self, path: &str, body: &str) -> Response {
        self.send(
            Method::POST,
            path,
            None,
            Some("application/x-www-form-urlencoded"),
            Body::from(body.to_string()),
        )
        .await
    }

    pub async fn post_form_as(&self, path: &str, cookie: &str, body: &str) -> Response {
        self.send(
            Method::POST,
            path,
            Some(cookie),
            Some("application/x-www-form-urlencoded"),
            Body::from(body.to_string()),
        )
        .await
    }

    pub async fn post_multipart_as(&self, path: &str, cookie: &str, body: Vec<u8>) -> Response {
        self.send(
            Method::POST,
            path,
            Some(cookie),
            Some(&multipart_content_type()),
            Body::from(body),
        )
        .await
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        cookie: Option<&str>,
        content_type: Option<&str>,
        body: Body,
    ) -> Response {
        let mut builder = Request::builder().method(method).uri(path);
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        if let Some(content_type) = content_type {
            builder = builder.header(header::CONTENT_TYPE, content_type);
        }
        let request = builder.body(body).expect("request should build");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router should respond")
    }

    /// Register a member through the signup form and hand back the session
    /// cookie it set, ready for a `Cookie` header.
    pub async fn register(&self, username: &str) -> String {
        let body = format!("username={username}&display_name=&password={PASSWORD}");
        let response = self.post_form("/auth/signup/", &body).await;
        assert_eq!(
            response.status(),
            StatusCode::SEE_OTHER,
            "signup should redirect"
        );
        session_cookie(&response).expect("signup should set a session cookie")
    }

    pub async fn user(&self, username: &str) -> UserRecord {
        self.repos
            .user_by_username(username)
            .await
            .expect("user should exist")
    }
}

/// The session cookie pair from a response's `Set-Cookie`, if one was set
/// with a value.
pub fn session_cookie(response: &Response) -> Option<String> {
    let value = response.headers().get(header::SET_COOKIE)?.to_str().ok()?;
    let pair = value.split(';').next()?.trim();
    let token = pair.strip_prefix("breva_session=")?;
    (!token.is_empty()).then(|| pair.to_string())
}

pub fn location(response: &Response) -> &str {
    response
        .headers()
        .get(header::LOCATION)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
}

pub async fn read_body(response: Response) -> String {
    let bytes = read_body_bytes(response).await;
    String::from_utf8(bytes).expect("body should be utf-8")
}

pub async fn read_body_bytes(response: Response) -> Vec<u8> {
    response
        .into_body()
        .collect()
        .await
        .expect("body should buffer")
        .to_bytes()
        .to_vec()
}

/// A one-pixel GIF, small enough to inline and valid enough for a browser.
pub const SMALL_GIF: &[u8] = &[
    0x47, 0x49, 0x46, 0x38, 0x39, 0x61, 0x01, 0x00, 0x01, 0x00, 0x80, 0x00, 0x00, 0x00, 0x00,
    0x00, 0xff, 0xff, 0xff, 0x21, 0xf9, 0x04, 0x00, 0x00, 0x00, 0x00, 0x00, 0x2c, 0x00, 0x00,
    0x00, 0x00, 0x01, 0x00, 0x01, 0x00, 0x00, 0x02, 0x02, 0x44, 0x01, 0x00, 0x3b,
];

const BOUNDARY: &str = "breva-test-boundary";

pub fn multipart_content_type() -> String {
    format!("multipart/form-data; boundary={BOUNDARY}")
}

/// Encode the post form the way a browser would. `file` is the optional
/// image part as (filename, content type, bytes).
pub fn multipart_body(fields: &[(&str, &str)], file: Option<(&str, &str, &[u8])>) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        body.extend_from_slice(
            format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes(),
        );
        body.extend_from_slice(value.as_bytes());
        body.extend_from_slice(b"\r\n");
    }
    if let Some((filename, content_type, bytes)) = file {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        body.extend_from_slice(
            format!("Content-Disposition: form-data; name=\"image\"; filename=\"{filename}\"\r\n")
                .as_bytes(),
        );
        body.extend_from_slice(format!("Content-Type: {content_type}\r\n\r\n").as_bytes());
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

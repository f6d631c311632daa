use std::{
    future::{self, IntoFuture},
    process,
    sync::Arc,
    time::Duration,
};

use breva::{
    application::{
        accounts::AccountService,
        error::AppError,
        feed::FeedService,
        follows::FollowService,
        posts::PostService,
        repos::{
            CommentsRepo, FollowsRepo, GroupsRepo, HealthProbe, PostsRepo, PostsWriteRepo,
            SessionsRepo, UsersRepo,
        },
    },
    cache::PageCache,
    config::{self, Command, ServeArgs, Settings},
    infra::{
        db::PostgresRepositories,
        error::InfraError,
        http::{HttpState, build_router},
        telemetry,
        uploads::MediaStorage,
    },
};
use tokio::{net::TcpListener, signal};
use tracing::{Dispatch, Level, dispatcher, error, info};

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

/// Log a fatal error through the configured subscriber when one exists, or
/// through a throwaway stderr subscriber when the failure happened before
/// telemetry came up.
fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application failed");
        return;
    }

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(Level::ERROR)
        .finish();
    dispatcher::with_default(&Dispatch::new(subscriber), || {
        error!(error = %error, "application failed");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli, settings) = config::load_with_cli()
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;
    let command = cli
        .command
        .unwrap_or(Command::Serve(Box::<ServeArgs>::default()));

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match command {
        Command::Serve(_) => run_serve(settings).await,
        Command::Migrate(_) => run_migrate(settings).await,
    }
}

async fn run_serve(settings: Settings) -> Result<(), AppError> {
    let repositories = init_repositories(&settings).await?;
    let state = build_http_state(repositories, &settings)?;
    serve_http(&settings, state).await
}

/// `init_repositories` applies pending migrations as part of connecting; the
/// subcommand exists so deploys can migrate without starting the listener.
async fn run_migrate(settings: Settings) -> Result<(), AppError> {
    init_repositories(&settings).await?;
    info!(target = "breva::migrate", "database migrations applied");
    Ok(())
}

async fn init_repositories(settings: &Settings) -> Result<Arc<PostgresRepositories>, AppError> {
    let database_url = settings
        .database
        .url
        .as_deref()
        .ok_or_else(|| InfraError::configuration("database url is not configured"))
        .map_err(AppError::from)?;

    let pool =
        PostgresRepositories::connect(database_url, settings.database.max_connections.get())
            .await
            .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;
    PostgresRepositories::run_migrations(&pool)
        .await
        .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;

    Ok(Arc::new(PostgresRepositories::new(pool)))
}

fn build_http_state(
    repositories: Arc<PostgresRepositories>,
    settings: &Settings,
) -> Result<HttpState, AppError> {
    let posts_repo: Arc<dyn PostsRepo> = repositories.clone();
    let posts_write_repo: Arc<dyn PostsWriteRepo> = repositories.clone();
    let groups_repo: Arc<dyn GroupsRepo> = repositories.clone();
    let users_repo: Arc<dyn UsersRepo> = repositories.clone();
    let comments_repo: Arc<dyn CommentsRepo> = repositories.clone();
    let follows_repo: Arc<dyn FollowsRepo> = repositories.clone();
    let sessions_repo: Arc<dyn SessionsRepo> = repositories.clone();
    let health: Arc<dyn HealthProbe> = repositories;

    let session_ttl = time::Duration::try_from(settings.sessions.ttl)
        .map_err(|err| AppError::unexpected(format!("session ttl out of range: {err}")))?;

    let feed = Arc::new(FeedService::new(
        posts_repo.clone(),
        groups_repo.clone(),
        users_repo.clone(),
        follows_repo.clone(),
        settings.feed.posts_per_page,
    ));
    let posts = Arc::new(PostService::new(
        posts_repo,
        posts_write_repo,
        comments_repo,
        groups_repo,
    ));
    let follows = Arc::new(FollowService::new(users_repo.clone(), follows_repo));
    let accounts = Arc::new(AccountService::new(users_repo, sessions_repo, session_ttl));

    let media = Arc::new(
        MediaStorage::new(settings.uploads.directory.clone())
            .map_err(|err| AppError::from(InfraError::Io(err)))?,
    );

    let cache = settings
        .cache
        .enabled
        .then(|| PageCache::new(settings.cache.ttl));

    Ok(HttpState {
        feed,
        posts,
        follows,
        accounts,
        media,
        health,
        cache,
        upload_limit_bytes: settings.uploads.max_request_bytes.get() as usize,
    })
}

async fn serve_http(settings: &Settings, state: HttpState) -> Result<(), AppError> {
    let router = build_router(state);

    let listener = TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| AppError::from(InfraError::Io(err)))?;
    info!(target = "breva::server", addr = %settings.server.addr, "listening");

    let grace = settings.server.graceful_shutdown;
    let server = axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(async {
            shutdown_signal().await;
            info!(target = "breva::server", "shutdown signal received, draining connections");
        })
        .into_future();

    tokio::select! {
        result = server => {
            result.map_err(|err| AppError::unexpected(format!("server error: {err}")))
        }
        () = drain_deadline(grace) => {
            error!(
                target = "breva::server",
                grace_seconds = grace.as_secs(),
                "graceful shutdown window elapsed, aborting open connections"
            );
            Ok(())
        }
    }
}

/// Completes one grace period after the first shutdown signal, bounding how
/// long draining may hold the process open.
async fn drain_deadline(grace: Duration) {
    shutdown_signal().await;
    tokio::time::sleep(grace).await;
}

/// Resolves on SIGINT or SIGTERM. A signal handler that cannot be installed
/// is treated as one that never fires.
async fn shutdown_signal() {
    let ctrl_c = async {
        if signal::ctrl_c().await.is_err() {
            future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(_) => future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

//! Response cache middleware.
//!
//! Wraps the routes whose rendered pages may be served slightly stale.
//! Cached entries are keyed on path and query, so each page number of a
//! listing caches separately.

use axum::{
    body::Body,
    extract::State,
    http::{Method, Request, Uri},
    middleware::Next,
    response::Response,
};
use metrics::counter;
use tracing::{debug, instrument, warn};

use super::store::{PageCache, should_store_response};

/// Key prefix for the front page listing.
pub const INDEX_CACHE_PREFIX: &str = "index_page";

const METRIC_CACHE_HIT: &str = "breva_page_cache_hit_total";
const METRIC_CACHE_MISS: &str = "breva_page_cache_miss_total";
const METRIC_CACHE_STORE: &str = "breva_page_cache_store_total";
const METRIC_CACHE_BYPASS: &str = "breva_page_cache_bypass_total";

/// Serve GET responses out of the page cache, rendering and storing on miss.
/// Non-GET requests pass straight through, as do responses the store refuses
/// (non-200, or anything setting a cookie).
#[instrument(skip_all, fields(path = %request.uri().path()))]
pub async fn response_cache_layer(
    State(cache): State<PageCache>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if request.method() != Method::GET {
        return next.run(request).await;
    }

    let key = cache_key(INDEX_CACHE_PREFIX, request.uri());

    if let Some(cached) = cache.get(&key).await {
        counter!(METRIC_CACHE_HIT).increment(1);
        debug!(cache = "page", outcome = "hit", key, "serving cached response");
        return cached;
    }

    counter!(METRIC_CACHE_MISS).increment(1);
    debug!(cache = "page", outcome = "miss", key, "rendering fresh response");

    let response = next.run(request).await;

    if !should_store_response(&response) {
        counter!(METRIC_CACHE_BYPASS).increment(1);
        return response;
    }

    match cache.store_response(&key, response).await {
        Ok(rebuilt) => {
            counter!(METRIC_CACHE_STORE).increment(1);
            rebuilt
        }
        Err((rebuilt, error)) => {
            warn!(cache = "page", key, error = %error, "failed to store response");
            rebuilt
        }
    }
}

/// Cache key for a request: prefix, path, and the query string when present.
pub fn cache_key(prefix: &str, uri: &Uri) -> String {
    match uri.query() {
        Some(query) => format!("{prefix}:{}?{query}", uri.path()),
        None => format!("{prefix}:{}", uri.path()),
    }
}

//! Short-lived page cache.
//!
//! The front page is rebuilt from the same tables on every request, so it is
//! served through a small in-memory response cache instead. Entries expire on
//! a fixed TTL; writes never invalidate, which means a freshly published post
//! can lag behind on the front page for up to the TTL.
//!
//! Configured via the `[cache]` section:
//!
//! ```toml
//! [cache]
//! enabled = true
//! ttl_seconds = 20
//! ```

mod middleware;
mod store;

pub use middleware::{INDEX_CACHE_PREFIX, cache_key, response_cache_layer};
pub use store::{
    CacheStoreError, CachedResponse, PageCache, buffer_response, should_store_response,
};

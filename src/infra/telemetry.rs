use std::sync::Once;

use metrics::{Unit, describe_counter};
use tracing_error::ErrorLayer;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::{LogFormat, LoggingSettings};

use super::error::InfraError;

static METRIC_DESCRIPTIONS: Once = Once::new();

const CACHE_COUNTERS: [(&str, &str); 4] = [
    (
        "breva_page_cache_hit_total",
        "Total number of page cache hits.",
    ),
    (
        "breva_page_cache_miss_total",
        "Total number of page cache misses.",
    ),
    (
        "breva_page_cache_store_total",
        "Total number of responses written into the page cache.",
    ),
    (
        "breva_page_cache_bypass_total",
        "Total number of cacheable requests answered fresh because the response was not storable.",
    ),
];

/// Install a global tracing subscriber using the provided logging settings.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    describe_metrics();

    let env_filter = EnvFilter::builder()
        .with_default_directive(logging.level.into())
        .from_env_lossy();

    let registry = tracing_subscriber::registry()
        .with(env_filter)
        .with(ErrorLayer::default());

    let installed = match logging.format {
        LogFormat::Json => registry
            .with(
                fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_span_list(true)
                    .with_target(true),
            )
            .try_init(),
        LogFormat::Compact => registry
            .with(fmt::layer().compact().with_target(true))
            .try_init(),
    };

    installed
        .map_err(|err| InfraError::telemetry(format!("tracing subscriber install failed: {err}")))
}

fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        for (name, help) in CACHE_COUNTERS {
            describe_counter!(name, Unit::Count, help);
        }
    });
}

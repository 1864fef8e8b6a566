use std::{io, sync::Once};

use metrics::{Unit, describe_counter, describe_gauge, describe_histogram};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::config::{LogFormat, LoggingSettings};

use super::error::InfraError;

static METRIC_DESCRIPTIONS: Once = Once::new();

/// Install a global tracing subscriber using the provided logging settings.
///
/// Output goes to stderr; stdout carries command results.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    describe_metrics();

    let env_filter = EnvFilter::builder()
        .with_default_directive(logging.level.into())
        .from_env_lossy();

    let fmt_layer = match logging.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .with_writer(io::stderr)
            .boxed(),
        LogFormat::Compact => fmt::layer()
            .compact()
            .with_target(true)
            .with_writer(io::stderr)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(ErrorLayer::default())
        .with(fmt_layer)
        .try_init()
        .map_err(|err| {
            InfraError::telemetry(format!("failed to install tracing subscriber: {err}"))
        })
}

fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            "finquiz_cache_hit_total",
            Unit::Count,
            "Reads answered from a fresh cache entry."
        );
        describe_counter!(
            "finquiz_cache_miss_total",
            Unit::Count,
            "Reads that started a network fetch."
        );
        describe_counter!(
            "finquiz_cache_coalesced_total",
            Unit::Count,
            "Reads that joined a fetch already in flight."
        );
        describe_histogram!(
            "finquiz_cache_fetch_ms",
            Unit::Milliseconds,
            "Query fetch latency in milliseconds."
        );
        describe_counter!(
            "finquiz_cache_evict_total",
            Unit::Count,
            "Entries removed by the garbage collector."
        );
        describe_gauge!(
            "finquiz_cache_event_queue_len",
            Unit::Count,
            "Current number of pending cache events in the queue."
        );
        describe_histogram!(
            "finquiz_cache_consume_ms",
            Unit::Milliseconds,
            "Cache consumption latency in milliseconds."
        );
        describe_counter!(
            "finquiz_cache_invalidated_total",
            Unit::Count,
            "Entries marked stale by tag invalidation."
        );
        describe_counter!(
            "finquiz_cache_patched_total",
            Unit::Count,
            "Entries rewritten in place by patch events."
        );
        describe_counter!(
            "finquiz_mutation_total",
            Unit::Count,
            "Write requests sent, labelled by mutation and outcome."
        );
    });
}

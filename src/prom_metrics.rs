//! # Prometheus Metrics — Exposition for Container Orchestration
//!
//! Exposes pluginhub operational metrics in the Prometheus text exposition format
//! for scraping by Prometheus, Grafana Agent, or any OpenMetrics-compatible collector.
//!
//! ## Metrics Exposed
//!
//! | Metric | Type | Labels | Description |
//! |--------|------|--------|-------------|
//! | `pluginhub_http_request_duration_seconds` | Histogram | `method`, `path` | Request latency |
//! | `pluginhub_release_transitions_total` | Counter | `state` | State changes by target state |
//! | `pluginhub_release_deletions_total` | Counter | — | Deleted releases |
//! | `pluginhub_announcements_total` | Counter | `outcome` | Issue-tracker announcement posts |
//!
//! ## Integration
//!
//! The request middleware in `server` records durations; the release lifecycle
//! and the announcement worker bump their counters. The `/metrics` endpoint
//! renders the current registry state on each scrape.

use prometheus_client::encoding::text::encode;
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::histogram::{exponential_buckets, Histogram};
use prometheus_client::registry::Registry;

/// Label set for HTTP request duration.
#[derive(Clone, Debug, Hash, PartialEq, Eq, prometheus_client::encoding::EncodeLabelSet)]
pub struct HttpLabel {
    pub method: String,
    pub path: String,
}

/// Label set for release transitions, keyed by the human name of the target state.
#[derive(Clone, Debug, Hash, PartialEq, Eq, prometheus_client::encoding::EncodeLabelSet)]
pub struct StateLabel {
    pub state: String,
}

/// Label set for announcement delivery outcomes (`ok`, `failed`, `skipped`).
#[derive(Clone, Debug, Hash, PartialEq, Eq, prometheus_client::encoding::EncodeLabelSet)]
pub struct OutcomeLabel {
    pub outcome: String,
}

type HistogramFamily = Family<HttpLabel, Histogram, fn() -> Histogram>;

fn request_histogram() -> Histogram {
    // 5ms .. ~10s
    Histogram::new(exponential_buckets(0.005, 2.0, 12))
}

/// Thread-safe metrics registry for the pluginhub server.
///
/// `Family` handles are cheap clones sharing the same underlying storage, so the
/// announcement worker can hold its own copy of `announcements`.
pub struct Metrics {
    pub registry: Registry,
    pub http_request_duration: HistogramFamily,
    pub release_transitions: Family<StateLabel, Counter>,
    pub release_deletions: Counter,
    pub announcements: Family<OutcomeLabel, Counter>,
}

impl Metrics {
    pub fn new() -> Self {
        let mut registry = Registry::default();

        let http_request_duration: HistogramFamily =
            Family::new_with_constructor(request_histogram as fn() -> Histogram);
        registry.register(
            "pluginhub_http_request_duration_seconds",
            "HTTP request duration by method and normalized path",
            http_request_duration.clone(),
        );

        let release_transitions = Family::<StateLabel, Counter>::default();
        registry.register(
            "pluginhub_release_transitions",
            "Release state transitions by target state",
            release_transitions.clone(),
        );

        let release_deletions = Counter::default();
        registry.register(
            "pluginhub_release_deletions",
            "Releases deleted through the release state endpoint",
            release_deletions.clone(),
        );

        let announcements = Family::<OutcomeLabel, Counter>::default();
        registry.register(
            "pluginhub_announcements",
            "Release announcement comments posted to the issue tracker",
            announcements.clone(),
        );

        Self {
            registry,
            http_request_duration,
            release_transitions,
            release_deletions,
            announcements,
        }
    }

    /// Render all metrics in Prometheus text exposition format.
    pub fn encode(&self) -> String {
        let mut buf = String::new();
        if let Err(e) = encode(&mut buf, &self.registry) {
            tracing::warn!(error = %e, "failed to encode metrics");
        }
        buf
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

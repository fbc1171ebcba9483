use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use once_cell::sync::OnceCell;
use serde::Serialize;
use tracing_subscriber::EnvFilter;

static TRACING_INIT: OnceCell<()> = OnceCell::new();

/// Which part of a route result was replaced by a deterministic default.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackKind {
    Coordinate,
    Analysis,
}

#[derive(Debug, Default)]
pub struct AppMetrics {
    requests_total: AtomicU64,
    completion_calls_total: AtomicU64,
    completion_failures_total: AtomicU64,
    coordinate_fallback_total: AtomicU64,
    analysis_fallback_total: AtomicU64,
    routes_persisted_total: AtomicU64,
    total_latency_millis: AtomicU64,
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub requests_total: u64,
    pub completion_calls_total: u64,
    pub completion_failures_total: u64,
    pub coordinate_fallback_total: u64,
    pub analysis_fallback_total: u64,
    pub routes_persisted_total: u64,
    pub avg_latency_millis: f64,
}

impl AppMetrics {
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn inc_request(&self) {
        self.requests_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_completion_call(&self) {
        self.completion_calls_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_completion_failure(&self) {
        self.completion_failures_total
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_fallback(&self, kind: FallbackKind) {
        let counter = match kind {
            FallbackKind::Coordinate => &self.coordinate_fallback_total,
            FallbackKind::Analysis => &self.analysis_fallback_total,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_route_persisted(&self) {
        self.routes_persisted_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn observe_latency(&self, duration: Duration) {
        self.total_latency_millis
            .fetch_add(duration.as_millis() as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let requests = self.requests_total.load(Ordering::Relaxed);
        let latency = self.total_latency_millis.load(Ordering::Relaxed);

        MetricsSnapshot {
            requests_total: requests,
            completion_calls_total: self.completion_calls_total.load(Ordering::Relaxed),
            completion_failures_total: self.completion_failures_total.load(Ordering::Relaxed),
            coordinate_fallback_total: self.coordinate_fallback_total.load(Ordering::Relaxed),
            analysis_fallback_total: self.analysis_fallback_total.load(Ordering::Relaxed),
            routes_persisted_total: self.routes_persisted_total.load(Ordering::Relaxed),
            avg_latency_millis: if requests == 0 {
                0.0
            } else {
                latency as f64 / requests as f64
            },
        }
    }
}

pub fn init_tracing(service_name: &str) {
    TRACING_INIT.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "{}=info,camroute_api=info,camroute_agents=info,camroute_storage=info",
                service_name
            ))
        });

        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_current_span(true)
            .with_span_list(true)
            .init();
    });
}

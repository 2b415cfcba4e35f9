//! Prometheus metrics for the HTTP surface and the blocking executor

use prometheus::{Encoder, Histogram, HistogramOpts, IntCounter, IntGauge, Registry, TextEncoder};

use crate::core::blocking::BlockingStats;

/// Metrics collected by a running server.
///
/// Each server owns its own prometheus registry, so several servers in one
/// process (tests, peer instances) do not collide on metric names.
pub struct Metrics {
    registry: Registry,
    pub http_requests_total: IntCounter,
    pub http_request_duration_seconds: Histogram,
    pub http_requests_in_flight: IntGauge,
    pub http_requests_failed_total: IntCounter,
    pub blocking_operations_total: IntCounter,
    pub blocking_operations_failed_total: IntCounter,
    pub blocking_operations_queued: IntGauge,
}

impl Metrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let http_requests_total =
            IntCounter::new("http_requests_total", "Total number of HTTP requests")?;
        let http_request_duration_seconds = Histogram::with_opts(HistogramOpts::new(
            "http_request_duration_seconds",
            "HTTP request duration in seconds",
        ))?;
        let http_requests_in_flight =
            IntGauge::new("http_requests_in_flight", "HTTP requests currently in flight")?;
        let http_requests_failed_total = IntCounter::new(
            "http_requests_failed_total",
            "HTTP requests answered with a 5xx status",
        )?;
        let blocking_operations_total = IntCounter::new(
            "blocking_operations_total",
            "Blocking operations completed by the worker pool",
        )?;
        let blocking_operations_failed_total = IntCounter::new(
            "blocking_operations_failed_total",
            "Blocking operations that failed or panicked",
        )?;
        let blocking_operations_queued = IntGauge::new(
            "blocking_operations_queued",
            "Blocking operations waiting for a worker",
        )?;

        registry.register(Box::new(http_requests_total.clone()))?;
        registry.register(Box::new(http_request_duration_seconds.clone()))?;
        registry.register(Box::new(http_requests_in_flight.clone()))?;
        registry.register(Box::new(http_requests_failed_total.clone()))?;
        registry.register(Box::new(blocking_operations_total.clone()))?;
        registry.register(Box::new(blocking_operations_failed_total.clone()))?;
        registry.register(Box::new(blocking_operations_queued.clone()))?;

        Ok(Self {
            registry,
            http_requests_total,
            http_request_duration_seconds,
            http_requests_in_flight,
            http_requests_failed_total,
            blocking_operations_total,
            blocking_operations_failed_total,
            blocking_operations_queued,
        })
    }

    /// Advance the blocking counters to the executor's snapshot.
    ///
    /// Executor counters only grow, so each call adds the difference since
    /// the previous snapshot.
    pub fn observe_blocking(&self, stats: &BlockingStats) {
        advance_to(&self.blocking_operations_total, stats.completed);
        advance_to(&self.blocking_operations_failed_total, stats.failed);
        self.blocking_operations_queued.set(stats.queued as i64);
    }

    /// Export all metrics in the Prometheus text format.
    pub fn export(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

fn advance_to(counter: &IntCounter, total: u64) {
    let delta = total.saturating_sub(counter.get());
    if delta > 0 {
        counter.inc_by(delta);
    }
}

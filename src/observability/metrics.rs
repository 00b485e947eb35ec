//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Install the Prometheus exporter when enabled
//! - Provide `Timer` and `Meter`, which feed the global recorder and keep a
//!   local count readable without one
//!
//! # Metrics
//! - `bidder_interceptor_execute_seconds` (histogram): per controller, per interceptor
//! - `bidder_receiver_requests_total` (counter): per receiver, per outcome
//! - `bidder_receiver_request_seconds` (histogram): per receiver
//! - `bidder_click_no_redirect_total` (counter)
//! - `bidder_price_decode_failures_total` (counter): per failure reason
//!
//! # Design Decisions
//! - Handles are resolved once at construction, updates are atomic
//! - The local counts make every metric observable in tests

use metrics::{Counter, Histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

pub const INTERCEPTOR_EXECUTE_SECONDS: &str = "bidder_interceptor_execute_seconds";
pub const RECEIVER_REQUESTS_TOTAL: &str = "bidder_receiver_requests_total";
pub const RECEIVER_REQUEST_SECONDS: &str = "bidder_receiver_request_seconds";
pub const CLICK_NO_REDIRECT_TOTAL: &str = "bidder_click_no_redirect_total";
pub const PRICE_DECODE_FAILURES_TOTAL: &str = "bidder_price_decode_failures_total";

/// Install the Prometheus recorder with its own scrape listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

/// Latency distribution plus a local invocation count.
#[derive(Debug)]
pub struct Timer {
    histogram: Histogram,
    count: AtomicU64,
    total_nanos: AtomicU64,
}

impl Timer {
    pub fn new(histogram: Histogram) -> Self {
        Self {
            histogram,
            count: AtomicU64::new(0),
            total_nanos: AtomicU64::new(0),
        }
    }

    /// Timer for one interceptor inside one controller.
    pub fn interceptor(controller: &str, interceptor: &str) -> Self {
        Self::new(metrics::histogram!(
            INTERCEPTOR_EXECUTE_SECONDS,
            "controller" => controller.to_string(),
            "interceptor" => interceptor.to_string()
        ))
    }

    /// Timer for the whole request inside one receiver.
    pub fn receiver(receiver: &'static str) -> Self {
        Self::new(metrics::histogram!(RECEIVER_REQUEST_SECONDS, "receiver" => receiver))
    }

    /// Start timing; the elapsed time is recorded when the guard drops.
    pub fn time(&self) -> TimerGuard<'_> {
        TimerGuard {
            timer: self,
            start: Instant::now(),
        }
    }

    pub fn record(&self, elapsed: Duration) {
        self.histogram.record(elapsed.as_secs_f64());
        self.count.fetch_add(1, Ordering::Relaxed);
        self.total_nanos.fetch_add(
            u64::try_from(elapsed.as_nanos()).unwrap_or(u64::MAX),
            Ordering::Relaxed,
        );
    }

    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    pub fn total(&self) -> Duration {
        Duration::from_nanos(self.total_nanos.load(Ordering::Relaxed))
    }
}

/// Records into its timer on drop, so early returns and panics are timed too.
pub struct TimerGuard<'a> {
    timer: &'a Timer,
    start: Instant,
}

impl Drop for TimerGuard<'_> {
    fn drop(&mut self) {
        self.timer.record(self.start.elapsed());
    }
}

/// Event counter plus a local count.
#[derive(Debug)]
pub struct Meter {
    counter: Counter,
    count: AtomicU64,
}

impl Meter {
    pub fn new(counter: Counter) -> Self {
        Self {
            counter,
            count: AtomicU64::new(0),
        }
    }

    /// Outcome meter for a receiver.
    pub fn receiver(receiver: &'static str, outcome: &'static str) -> Self {
        Self::new(metrics::counter!(
            RECEIVER_REQUESTS_TOTAL,
            "receiver" => receiver,
            "outcome" => outcome
        ))
    }

    pub fn named(name: &'static str) -> Self {
        Self::new(metrics::counter!(name))
    }

    pub fn mark(&self) {
        self.counter.increment(1);
        self.count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }
}

/// Count a winning price token that failed to decode.
pub fn record_price_decode_failure(reason: &'static str) {
    metrics::counter!(PRICE_DECODE_FAILURES_TOTAL, "reason" => reason).increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timer_counts_without_recorder() {
        let timer = Timer::interceptor("bid", "trace");
        {
            let _guard = timer.time();
        }
        timer.record(Duration::from_millis(2));
        assert_eq!(timer.count(), 2);
        assert!(timer.total() >= Duration::from_millis(2));
    }

    #[test]
    fn test_meter_marks() {
        let meter = Meter::receiver("bid", "success");
        meter.mark();
        meter.mark();
        assert_eq!(meter.count(), 2);
    }
}

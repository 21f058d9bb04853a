//! Poll metrics tracking using OpenTelemetry.

use opentelemetry::metrics::{Counter, Gauge, Histogram, Meter};
use std::sync::Arc;
use std::time::Instant;

/// Metrics collector for a blob subscription.
///
/// # Examples
///
/// ```rust,no_run
/// use viteset_client::metrics::PollMetrics;
/// use opentelemetry::global;
///
/// let metrics = PollMetrics::new(global::meter("viteset-client"));
///
/// let timer = metrics.start_poll();
/// // ... fetch the blob ...
/// metrics.record_changed(timer);
/// ```
#[derive(Clone)]
pub struct PollMetrics {
    polls: Counter<u64>,
    changed: Counter<u64>,
    unchanged: Counter<u64>,
    failures: Counter<u64>,
    fetch_duration: Histogram<f64>,
    value_age_seconds: Gauge<i64>,
    last_change: Arc<parking_lot::Mutex<Instant>>,
}

impl PollMetrics {
    /// Create a new metrics collector with the provided meter.
    pub fn new(meter: Meter) -> Self {
        let polls = meter
            .u64_counter("viteset_client.poll.attempts")
            .with_description("Total number of blob polls")
            .build();

        let changed = meter
            .u64_counter("viteset_client.poll.changed")
            .with_description("Polls that returned a new value")
            .build();

        let unchanged = meter
            .u64_counter("viteset_client.poll.unchanged")
            .with_description("Polls answered with 304 Not Modified")
            .build();

        let failures = meter
            .u64_counter("viteset_client.poll.failures")
            .with_description("Polls that failed")
            .build();

        let fetch_duration = meter
            .f64_histogram("viteset_client.poll.duration")
            .with_description("Duration of blob fetches in seconds")
            .with_unit("s")
            .build();

        let value_age_seconds = meter
            .i64_gauge("viteset_client.value.age")
            .with_description("Time since the blob value last changed in seconds")
            .with_unit("s")
            .build();

        Self {
            polls,
            changed,
            unchanged,
            failures,
            fetch_duration,
            value_age_seconds,
            last_change: Arc::new(parking_lot::Mutex::new(Instant::now())),
        }
    }

    /// Start a poll timer.
    ///
    /// Pass the returned `Instant` to one of the `record_*` methods once the
    /// fetch completes.
    pub fn start_poll(&self) -> Instant {
        self.polls.add(1, &[]);
        Instant::now()
    }

    /// Record a poll that delivered a new value.
    pub fn record_changed(&self, start: Instant) {
        self.changed.add(1, &[]);
        self.fetch_duration.record(start.elapsed().as_secs_f64(), &[]);

        *self.last_change.lock() = Instant::now();
        self.value_age_seconds.record(0, &[]);
    }

    /// Record a poll answered with "not modified".
    pub fn record_unchanged(&self, start: Instant) {
        self.unchanged.add(1, &[]);
        self.fetch_duration.record(start.elapsed().as_secs_f64(), &[]);
        self.update_value_age();
    }

    /// Record a failed poll.
    pub fn record_failure(&self, start: Instant) {
        self.failures.add(1, &[]);
        self.fetch_duration.record(start.elapsed().as_secs_f64(), &[]);
        self.update_value_age();
    }

    /// When a poll last returned a new value.
    pub fn last_change(&self) -> Instant {
        *self.last_change.lock()
    }

    fn update_value_age(&self) {
        let age_secs = self.last_change.lock().elapsed().as_secs() as i64;
        self.value_age_seconds.record(age_secs, &[]);
    }
}

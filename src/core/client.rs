//! The subscription controller and its polling task.

use crate::core::{ClientConfig, MIN_RECOMMENDED_INTERVAL, Update};
use crate::error::{ClientError, Result};
use crate::sources::{BlobFetcher, FetchOutcome, HttpFetcher};
use arc_swap::ArcSwapOption;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info, warn};

#[cfg(feature = "metrics")]
use crate::metrics::PollMetrics;

/// Updates held in the channel before the polling task waits for the reader.
const UPDATE_BUFFER: usize = 1;

/// Watches one blob and sends an [`Update`] whenever its value changes.
///
/// The client polls immediately on [`subscribe`](Client::subscribe) and then
/// once per configured interval, using ETags so that unchanged values are not
/// re-transmitted.
///
/// A client supports exactly one subscription. After [`cancel`](Client::cancel)
/// it cannot be subscribed again; create a new client instead.
///
/// # Examples
///
/// ```rust,no_run
/// use viteset_client::prelude::*;
///
/// # async fn example() -> Result<()> {
/// let mut client = Client::new(ClientConfig::new("feature-flags", "client-secret"));
/// let mut updates = client.subscribe()?;
///
/// while let Some(update) = updates.recv().await {
///     match update {
///         Update::Value(value) => println!("new value: {}", String::from_utf8_lossy(&value)),
///         // Keep using the last value; the next poll will likely succeed.
///         Update::Error(err) => eprintln!("poll failed: {}", err),
///     }
/// }
/// # Ok(())
/// # }
/// ```
pub struct Client {
    config: ClientConfig,
    lifecycle: Lifecycle,
    latest: Arc<ArcSwapOption<Vec<u8>>>,
    fetcher: Option<Arc<dyn BlobFetcher>>,
    #[cfg(feature = "metrics")]
    metrics: Option<PollMetrics>,
}

enum Lifecycle {
    Idle,
    Active(Subscription),
    Canceled,
}

/// Handles the controller keeps to stop a running poller.
struct Subscription {
    token: CancellationToken,
    gate: Arc<DeliveryGate>,
}

impl Subscription {
    fn stop(&self) {
        self.gate.close();
        self.token.cancel();
    }
}

impl Client {
    /// Create a client. Nothing is validated or fetched until `subscribe`.
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config,
            lifecycle: Lifecycle::Idle,
            latest: Arc::new(ArcSwapOption::empty()),
            fetcher: None,
            #[cfg(feature = "metrics")]
            metrics: None,
        }
    }

    /// Record poll metrics for this client's subscription.
    #[cfg(feature = "metrics")]
    pub fn with_metrics(mut self, metrics: PollMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    #[cfg(test)]
    pub(crate) fn with_fetcher(mut self, fetcher: Arc<dyn BlobFetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    /// Start watching the blob.
    ///
    /// Returns the receiving end of the update channel. The first poll runs
    /// right away, so the current value arrives without waiting a full
    /// interval. Polling continues until [`cancel`](Client::cancel) is
    /// called, the client is dropped, or the receiver is dropped.
    ///
    /// The polling task waits for the reader before polling again, so an
    /// unread channel pauses polling rather than dropping updates.
    ///
    /// # Errors
    ///
    /// - [`ClientError::AlreadyActive`] if this client was already subscribed,
    ///   including a subscription that has since been canceled
    /// - [`ClientError::MissingField`] if `blob` or `secret` is empty
    /// - [`ClientError::NoRuntime`] if called outside a Tokio runtime
    /// - [`ClientError::HttpClient`] if the HTTP client cannot be built
    pub fn subscribe(&mut self) -> Result<mpsc::Receiver<Update>> {
        if !matches!(self.lifecycle, Lifecycle::Idle) {
            return Err(ClientError::AlreadyActive);
        }

        let config = self.config.clone().validated()?;
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| ClientError::NoRuntime)?;

        if config.interval < MIN_RECOMMENDED_INTERVAL {
            warn!(
                interval = ?config.interval,
                recommended = ?MIN_RECOMMENDED_INTERVAL,
                "polling interval is below the recommended minimum"
            );
        }

        let fetcher = match &self.fetcher {
            Some(fetcher) => Arc::clone(fetcher),
            None => Arc::new(HttpFetcher::new(&config)?),
        };

        let (tx, rx) = mpsc::channel(UPDATE_BUFFER);
        let token = CancellationToken::new();
        let gate = Arc::new(DeliveryGate::default());

        let poller = Poller {
            fetcher,
            interval: config.interval,
            tx,
            token: token.clone(),
            gate: Arc::clone(&gate),
            state: SubscriptionState {
                validator: None,
                value: Arc::clone(&self.latest),
            },
            #[cfg(feature = "metrics")]
            metrics: self.metrics.clone(),
        };

        let span = tracing::info_span!("viteset_poll", blob = %config.blob);
        runtime.spawn(poller.run().instrument(span));

        info!(blob = %config.blob, host = %config.host, interval = ?config.interval, "subscribed");
        self.config = config;
        self.lifecycle = Lifecycle::Active(Subscription { token, gate });
        Ok(rx)
    }

    /// Stop polling.
    ///
    /// Once this returns, nothing more is written to the update channel. The
    /// receiver sees the end of the stream after draining anything already
    /// buffered. Calling `cancel` on an inactive client does nothing.
    pub fn cancel(&mut self) {
        if let Lifecycle::Active(subscription) = &self.lifecycle {
            subscription.stop();
            self.lifecycle = Lifecycle::Canceled;
            info!(blob = %self.config.blob, "subscription canceled");
        }
    }

    /// Returns `true` while this client holds a live polling task.
    ///
    /// Turns `false` once the subscription is canceled, or once polling has
    /// stopped because the update receiver was dropped.
    pub fn is_active(&self) -> bool {
        match &self.lifecycle {
            Lifecycle::Active(subscription) => !subscription.token.is_cancelled(),
            Lifecycle::Idle | Lifecycle::Canceled => false,
        }
    }

    /// The most recently delivered value, if any.
    pub fn latest(&self) -> Option<Arc<Vec<u8>>> {
        self.latest.load_full()
    }

    /// The client configuration. Defaults are filled in once subscribed.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        if let Lifecycle::Active(subscription) = &self.lifecycle {
            subscription.stop();
        }
    }
}

/// Blocks deliveries once the controller has canceled.
///
/// The poller only writes to the channel while holding this lock, so after
/// `close` returns no further write can happen.
#[derive(Default)]
struct DeliveryGate {
    closed: parking_lot::Mutex<bool>,
}

impl DeliveryGate {
    fn close(&self) {
        *self.closed.lock() = true;
    }

    fn deliver(&self, permit: mpsc::Permit<'_, Update>, update: Update) -> bool {
        let closed = self.closed.lock();
        if *closed {
            return false;
        }
        permit.send(update);
        true
    }
}

/// Cache owned by the polling task.
///
/// `value` is shared with the controller for reading only.
struct SubscriptionState {
    validator: Option<String>,
    value: Arc<ArcSwapOption<Vec<u8>>>,
}

impl SubscriptionState {
    fn record_change(&mut self, value: Vec<u8>, validator: Option<String>) {
        self.value.store(Some(Arc::new(value)));
        self.validator = validator;
    }
}

struct Poller {
    fetcher: Arc<dyn BlobFetcher>,
    interval: Duration,
    tx: mpsc::Sender<Update>,
    token: CancellationToken,
    gate: Arc<DeliveryGate>,
    state: SubscriptionState,
    #[cfg(feature = "metrics")]
    metrics: Option<PollMetrics>,
}

impl Poller {
    async fn run(mut self) {
        let mut ticker = tokio::time::interval(self.interval);
        // A tick that fires during a slow fetch or a blocked delivery is dropped.
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;
                _ = self.token.cancelled() => break,
                _ = ticker.tick() => {}
            }

            if self.tx.is_closed() {
                debug!("update receiver dropped");
                break;
            }

            #[cfg(feature = "metrics")]
            let timer = self.metrics.as_ref().map(PollMetrics::start_poll);

            let outcome = tokio::select! {
                biased;
                _ = self.token.cancelled() => break,
                outcome = self.fetcher.fetch(self.state.validator.as_deref()) => outcome,
            };

            #[cfg(feature = "metrics")]
            self.record_metrics(&outcome, timer);

            match outcome {
                FetchOutcome::Unchanged => {
                    debug!("blob unchanged");
                }
                FetchOutcome::Failed(err) => {
                    warn!(error = %err, "failed to fetch blob");
                    if !self.deliver(Update::Error(err)).await {
                        break;
                    }
                }
                FetchOutcome::Changed { value, validator } => {
                    debug!(bytes = value.len(), etag = ?validator, "blob changed");
                    // The receiver owns the delivered bytes; the cache behind
                    // `latest()` keeps its own copy, stored only once delivered.
                    if !self.deliver(Update::Value(value.clone())).await {
                        break;
                    }
                    self.state.record_change(value, validator);
                }
            }
        }

        // Marks the subscription inactive when polling ends on its own.
        self.token.cancel();
        debug!("polling stopped");
    }

    /// Wait for channel capacity, then send unless canceled meanwhile.
    async fn deliver(&self, update: Update) -> bool {
        let permit = tokio::select! {
            biased;
            _ = self.token.cancelled() => return false,
            permit = self.tx.reserve() => match permit {
                Ok(permit) => permit,
                Err(_) => {
                    debug!("update receiver dropped");
                    return false;
                }
            },
        };
        self.gate.deliver(permit, update)
    }

    #[cfg(feature = "metrics")]
    fn record_metrics(&self, outcome: &FetchOutcome, timer: Option<std::time::Instant>) {
        let (Some(metrics), Some(timer)) = (&self.metrics, timer) else {
            return;
        };
        match outcome {
            FetchOutcome::Unchanged => metrics.record_unchanged(timer),
            FetchOutcome::Changed { .. } => metrics.record_changed(timer),
            FetchOutcome::Failed(_) => metrics.record_failure(timer),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FetchError;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::time::timeout;

    const INTERVAL: Duration = Duration::from_secs(15);

    /// Plays back a fixed list of outcomes, then reports `Unchanged` forever.
    #[derive(Default)]
    struct ScriptedFetcher {
        script: parking_lot::Mutex<VecDeque<FetchOutcome>>,
        validators: parking_lot::Mutex<Vec<Option<String>>>,
    }

    impl ScriptedFetcher {
        fn new(script: Vec<FetchOutcome>) -> Arc<Self> {
            Arc::new(Self {
                script: parking_lot::Mutex::new(script.into()),
                validators: parking_lot::Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> usize {
            self.validators.lock().len()
        }
    }

    #[async_trait]
    impl BlobFetcher for ScriptedFetcher {
        async fn fetch(&self, last_validator: Option<&str>) -> FetchOutcome {
            self.validators
                .lock()
                .push(last_validator.map(str::to_string));
            self.script
                .lock()
                .pop_front()
                .unwrap_or(FetchOutcome::Unchanged)
        }
    }

    /// Returns a new value on every poll.
    #[derive(Default)]
    struct CountingFetcher {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl BlobFetcher for CountingFetcher {
        async fn fetch(&self, _last_validator: Option<&str>) -> FetchOutcome {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            FetchOutcome::Changed {
                value: n.to_string().into_bytes(),
                validator: Some(format!("\"{}\"", n)),
            }
        }
    }

    fn changed(value: &str, etag: &str) -> FetchOutcome {
        FetchOutcome::Changed {
            value: value.as_bytes().to_vec(),
            validator: Some(etag.to_string()),
        }
    }

    fn server_error() -> FetchOutcome {
        FetchOutcome::Failed(FetchError::UnexpectedStatus {
            expected: 200,
            actual: 500,
            body: "boom".to_string(),
        })
    }

    fn client_with(fetcher: Arc<dyn BlobFetcher>) -> Client {
        Client::new(ClientConfig::new("feature-flags", "s3cret").with_interval(INTERVAL))
            .with_fetcher(fetcher)
    }

    async fn next(rx: &mut mpsc::Receiver<Update>) -> Update {
        timeout(INTERVAL * 10, rx.recv())
            .await
            .expect("timed out waiting for update")
            .expect("channel closed")
    }

    #[tokio::test(start_paused = true)]
    async fn test_delivers_changes_and_errors_in_order() {
        let fetcher = ScriptedFetcher::new(vec![
            changed("A", "a"),
            FetchOutcome::Unchanged,
            changed("B", "b"),
            server_error(),
            FetchOutcome::Unchanged,
            changed("C", "c"),
        ]);
        let mut client = client_with(fetcher.clone());
        let mut rx = client.subscribe().unwrap();

        assert_eq!(next(&mut rx).await.value(), Some(&b"A"[..]));
        assert_eq!(next(&mut rx).await.value(), Some(&b"B"[..]));
        let err = next(&mut rx).await;
        assert_eq!(err.error().and_then(FetchError::status), Some(500));
        assert_eq!(next(&mut rx).await.value(), Some(&b"C"[..]));

        // The script is exhausted; only Unchanged polls follow.
        assert!(timeout(INTERVAL * 5, rx.recv()).await.is_err());
        assert_eq!(client.latest().as_deref().map(Vec::as_slice), Some(&b"C"[..]));
        assert!(fetcher.calls() > 6);
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_poll_is_immediate() {
        let fetcher = ScriptedFetcher::new(vec![changed("A", "a")]);
        let mut client = client_with(fetcher);
        let mut rx = client.subscribe().unwrap();

        let start = tokio::time::Instant::now();
        next(&mut rx).await;
        assert!(start.elapsed() < INTERVAL);
    }

    #[tokio::test(start_paused = true)]
    async fn test_validator_round_trip() {
        let fetcher = ScriptedFetcher::new(vec![
            changed("A", "\"v1\""),
            FetchOutcome::Unchanged,
            server_error(),
            changed("B", "\"v2\""),
        ]);
        let mut client = client_with(fetcher.clone());
        let mut rx = client.subscribe().unwrap();

        next(&mut rx).await;
        next(&mut rx).await;
        next(&mut rx).await;
        while fetcher.calls() < 5 {
            tokio::time::sleep(INTERVAL).await;
        }
        client.cancel();

        let validators = fetcher.validators.lock().clone();
        assert_eq!(validators[0], None);
        assert_eq!(validators[1].as_deref(), Some("\"v1\""));
        assert_eq!(validators[2].as_deref(), Some("\"v1\""));
        assert_eq!(validators[3].as_deref(), Some("\"v1\""));
        assert_eq!(validators[4].as_deref(), Some("\"v2\""));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unchanged_keeps_cached_value() {
        let fetcher = ScriptedFetcher::new(vec![changed("A", "a")]);
        let mut client = client_with(fetcher.clone());
        let mut rx = client.subscribe().unwrap();

        next(&mut rx).await;
        while fetcher.calls() < 3 {
            tokio::time::sleep(INTERVAL).await;
        }
        assert!(timeout(INTERVAL, rx.recv()).await.is_err());
        assert_eq!(client.latest().as_deref().map(Vec::as_slice), Some(&b"A"[..]));
    }

    #[tokio::test(start_paused = true)]
    async fn test_errors_keep_polling() {
        let fetcher = ScriptedFetcher::new(vec![server_error(), server_error(), changed("A", "a")]);
        let mut client = client_with(fetcher);
        let mut rx = client.subscribe().unwrap();

        assert!(next(&mut rx).await.is_error());
        assert!(client.latest().is_none());
        assert!(next(&mut rx).await.is_error());
        assert_eq!(next(&mut rx).await.value(), Some(&b"A"[..]));
        assert!(client.is_active());
    }

    #[tokio::test]
    async fn test_missing_fields_rejected() {
        let fetcher: Arc<dyn BlobFetcher> = ScriptedFetcher::new(vec![]);

        let mut client = Client::new(ClientConfig::new("", "s3cret")).with_fetcher(Arc::clone(&fetcher));
        assert!(matches!(client.subscribe(), Err(ClientError::MissingField("blob"))));
        assert!(!client.is_active());

        let mut client = Client::new(ClientConfig::new("flags", "")).with_fetcher(fetcher);
        assert!(matches!(client.subscribe(), Err(ClientError::MissingField("secret"))));
        assert!(!client.is_active());
    }

    #[tokio::test]
    async fn test_missing_fields_start_no_task() {
        let fetcher = ScriptedFetcher::new(vec![]);
        let mut client = Client::new(ClientConfig::new("", "")).with_fetcher(fetcher.clone());
        assert!(client.subscribe().is_err());

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(fetcher.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_subscribe_twice_rejected() {
        let fetcher = Arc::new(CountingFetcher::default());
        let mut client = client_with(fetcher);
        let mut rx = client.subscribe().unwrap();

        assert!(matches!(client.subscribe(), Err(ClientError::AlreadyActive)));
        assert!(client.is_active());

        assert_eq!(next(&mut rx).await.value(), Some(&b"0"[..]));
        assert_eq!(next(&mut rx).await.value(), Some(&b"1"[..]));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_stops_delivery() {
        let fetcher = Arc::new(CountingFetcher::default());
        let mut client = client_with(fetcher.clone());
        let mut rx = client.subscribe().unwrap();

        next(&mut rx).await;
        client.cancel();
        assert!(!client.is_active());

        // At most the one update already buffered before cancel, then end of stream.
        let mut after_cancel = 0;
        while timeout(INTERVAL * 10, rx.recv())
            .await
            .expect("channel was not closed")
            .is_some()
        {
            after_cancel += 1;
        }
        assert!(after_cancel <= UPDATE_BUFFER);

        let calls = fetcher.calls.load(Ordering::SeqCst);
        tokio::time::sleep(INTERVAL * 10).await;
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), calls);
    }

    #[tokio::test(start_paused = true)]
    async fn test_resubscribe_after_cancel_rejected() {
        let mut client = client_with(Arc::new(CountingFetcher::default()));
        let _rx = client.subscribe().unwrap();
        client.cancel();

        assert!(matches!(client.subscribe(), Err(ClientError::AlreadyActive)));
        assert!(!client.is_active());
    }

    #[tokio::test]
    async fn test_cancel_is_idempotent() {
        let mut client = client_with(Arc::new(CountingFetcher::default()));
        client.cancel();
        assert!(!client.is_active());

        let _rx = client.subscribe().unwrap();
        client.cancel();
        client.cancel();
        assert!(!client.is_active());
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_client_ends_stream() {
        let mut client = client_with(Arc::new(CountingFetcher::default()));
        let mut rx = client.subscribe().unwrap();
        next(&mut rx).await;
        drop(client);

        while timeout(INTERVAL * 10, rx.recv())
            .await
            .expect("channel was not closed")
            .is_some()
        {}
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_receiver_stops_polling() {
        let fetcher = ScriptedFetcher::new(vec![]);
        let mut client = client_with(fetcher.clone());
        let rx = client.subscribe().unwrap();

        tokio::time::sleep(INTERVAL * 2).await;
        assert!(client.is_active());
        drop(rx);
        tokio::time::sleep(INTERVAL * 2).await;
        let calls = fetcher.calls();
        tokio::time::sleep(INTERVAL * 10).await;
        assert_eq!(fetcher.calls(), calls);
        assert!(!client.is_active());

        // A stopped subscription still cannot be restarted.
        assert!(matches!(client.subscribe(), Err(ClientError::AlreadyActive)));
        client.cancel();
        assert!(!client.is_active());
    }

    #[cfg(feature = "metrics")]
    #[tokio::test(start_paused = true)]
    async fn test_metrics_record_every_outcome() {
        use crate::metrics::PollMetrics;

        let metrics = PollMetrics::new(opentelemetry::global::meter("test"));
        let before = metrics.last_change();
        std::thread::sleep(Duration::from_millis(2));

        let fetcher = ScriptedFetcher::new(vec![
            changed("A", "a"),
            FetchOutcome::Unchanged,
            server_error(),
        ]);
        let mut client = client_with(fetcher.clone()).with_metrics(metrics.clone());
        let mut rx = client.subscribe().unwrap();

        assert_eq!(next(&mut rx).await.value(), Some(&b"A"[..]));
        let changed_at = metrics.last_change();
        assert!(changed_at > before);

        assert!(next(&mut rx).await.is_error());
        while fetcher.calls() < 4 {
            tokio::time::sleep(INTERVAL).await;
        }
        // Unchanged and failed polls leave the change timestamp alone.
        assert_eq!(metrics.last_change(), changed_at);
        assert!(client.is_active());
        client.cancel();
    }

    #[test]
    fn test_subscribe_outside_runtime() {
        let mut client = client_with(ScriptedFetcher::new(vec![]));
        assert!(matches!(client.subscribe(), Err(ClientError::NoRuntime)));
        assert!(!client.is_active());
    }

    #[tokio::test]
    async fn test_config_defaults_after_subscribe() {
        let mut client = Client::new(ClientConfig::new("flags", "s3cret"))
            .with_fetcher(ScriptedFetcher::new(vec![]));
        assert_eq!(client.config().host, "");

        let _rx = client.subscribe().unwrap();
        assert_eq!(client.config().host, crate::core::DEFAULT_HOST);
        assert_eq!(client.config().interval, crate::core::DEFAULT_INTERVAL);
        client.cancel();
    }
}

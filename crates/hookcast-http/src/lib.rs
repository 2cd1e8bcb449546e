// # HTTP Webhook Sink
//
// This crate provides the HTTP delivery implementation of `WebhookSink` for
// the hookcast dispatch worker.
//
// ## Behavior
//
// - One pooled `reqwest::Client`, built once and shared by every delivery
// - One tokio task per endpoint per event; `dispatch()` never awaits
// - A semaphore bounds in-flight deliveries to the configured concurrency
// - Deliveries are counted before their task is spawned, so draining never
//   misses one that has not started yet
// - Statuses 500/502/503/504 and transport errors are retried with
//   exponential backoff; any other non-success status is terminal
// - Only a read timeout is applied; connecting is never timed out
// - Each finished delivery is reported to a `DeliveryObserver`
//
// ## Payload
//
// Every endpoint receives the same body:
//
// ```json
// { "content": "<the event's fields, serialized as a JSON string>" }
// ```
//
// ## Security
//
// Endpoint URLs commonly embed secrets (tokens in the path), so they are
// never included in the Debug output of the sink.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use hookcast_core::traits::WebhookSink;
use hookcast_core::{DispatchConfig, Error, Result, WebhookEvent};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::{Notify, Semaphore};
use tracing::{debug, info, warn};

/// Statuses that are retried; every other non-success status is final
const RETRYABLE_STATUSES: [u16; 4] = [500, 502, 503, 504];

/// Retry behavior for a single endpoint delivery
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Retries after the first attempt (0 disables retrying)
    pub retries: u32,

    /// Sleep before retry n is `backoff_factor * 2^(n-1)` seconds
    pub backoff_factor: f64,
}

impl RetryPolicy {
    /// Delay before the given retry (1-based)
    ///
    /// With a factor of 0.25 the delays are 0.25s, 0.5s, 1s, ...
    pub fn delay_before(&self, retry: u32) -> Duration {
        if retry == 0 {
            return Duration::ZERO;
        }
        let exponent = i32::try_from(retry - 1).unwrap_or(i32::MAX);
        let secs = self.backoff_factor * 2f64.powi(exponent);
        Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
    }

    /// Whether a response status is worth another attempt
    pub fn is_retryable_status(status: u16) -> bool {
        RETRYABLE_STATUSES.contains(&status)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: 3,
            backoff_factor: 0.25,
        }
    }
}

/// Configuration for [`HttpWebhookSink`]
#[derive(Debug, Clone)]
pub struct DeliveryConfig {
    /// Destination endpoint URLs
    pub webhooks: Vec<String>,

    /// Per-request read timeout
    pub timeout: Duration,

    /// Retry behavior per endpoint
    pub retry: RetryPolicy,

    /// Connection pool size and maximum in-flight deliveries
    pub concurrency: usize,
}

impl DeliveryConfig {
    /// Derive the delivery settings from a dispatch configuration
    pub fn from_dispatch_config(config: &DispatchConfig) -> Self {
        Self {
            webhooks: config.webhooks.clone(),
            timeout: config.timeout(),
            retry: RetryPolicy {
                retries: config.retries,
                backoff_factor: config.backoff_factor,
            },
            concurrency: config.concurrency,
        }
    }
}

/// Final result of delivering one event to one endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// Endpoint answered with a success status
    Delivered { status: u16, attempts: u32 },

    /// Endpoint answered with a non-success status (terminal or retries exhausted)
    Rejected { status: u16, attempts: u32 },

    /// No response could be obtained (connect error, read timeout, ...)
    Failed { error: String, attempts: u32 },
}

impl DeliveryOutcome {
    /// Number of HTTP attempts made
    pub fn attempts(&self) -> u32 {
        match self {
            DeliveryOutcome::Delivered { attempts, .. }
            | DeliveryOutcome::Rejected { attempts, .. }
            | DeliveryOutcome::Failed { attempts, .. } => *attempts,
        }
    }

    /// Whether the endpoint accepted the event
    pub fn is_delivered(&self) -> bool {
        matches!(self, DeliveryOutcome::Delivered { .. })
    }
}

/// Completion hook invoked once per endpoint per dispatched event
pub trait DeliveryObserver: Send + Sync {
    /// Called from the delivery task once `endpoint` has a final outcome
    fn on_complete(&self, endpoint: &str, outcome: &DeliveryOutcome);
}

/// Observer that ignores every completion
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl DeliveryObserver for NoopObserver {
    fn on_complete(&self, _endpoint: &str, _outcome: &DeliveryOutcome) {}
}

/// Fire-and-forget HTTP delivery to every configured endpoint
pub struct HttpWebhookSink {
    /// Pooled client shared by all deliveries
    client: reqwest::Client,

    /// Destination URLs
    /// ⚠️ May embed secrets; never log in full
    endpoints: Arc<[String]>,

    retry: RetryPolicy,

    /// Bounds in-flight deliveries
    permits: Arc<Semaphore>,

    /// Deliveries spawned and not yet finished
    pending: Arc<Pending>,

    observer: Arc<dyn DeliveryObserver>,
}

// Custom Debug implementation that hides the endpoint URLs
impl std::fmt::Debug for HttpWebhookSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpWebhookSink")
            .field("endpoints", &format!("<{} REDACTED>", self.endpoints.len()))
            .field("retry", &self.retry)
            .field("available_permits", &self.permits.available_permits())
            .field("pending", &self.pending.count.load(Ordering::SeqCst))
            .finish()
    }
}

impl HttpWebhookSink {
    /// Create a new HTTP sink
    ///
    /// # Errors
    ///
    /// `Error::Config` for a zero concurrency, `Error::Http` if the client
    /// cannot be built.
    pub fn new(config: DeliveryConfig) -> Result<Self> {
        if config.concurrency == 0 {
            return Err(Error::config("Webhook concurrency must be > 0"));
        }
        if config.concurrency > Semaphore::MAX_PERMITS {
            return Err(Error::config("Webhook concurrency is too large"));
        }

        let client = reqwest::Client::builder()
            .pool_max_idle_per_host(config.concurrency)
            .read_timeout(config.timeout)
            .build()
            .map_err(|e| Error::http(format!("Failed to build HTTP client: {}", e)))?;

        if config.webhooks.is_empty() {
            warn!("HTTP webhook sink created without webhooks; events will be dropped");
        }

        Ok(Self {
            client,
            endpoints: config.webhooks.into(),
            retry: config.retry,
            permits: Arc::new(Semaphore::new(config.concurrency)),
            pending: Arc::new(Pending::default()),
            observer: Arc::new(NoopObserver),
        })
    }

    /// Create a sink from a dispatch configuration
    pub fn from_config(config: &DispatchConfig) -> Result<Self> {
        Self::new(DeliveryConfig::from_dispatch_config(config))
    }

    /// Replace the completion observer
    pub fn with_observer(mut self, observer: Arc<dyn DeliveryObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Number of configured endpoints
    pub fn endpoint_count(&self) -> usize {
        self.endpoints.len()
    }

    /// Retry policy in use
    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    /// Handle for waiting on in-flight deliveries after the sink is handed off
    pub fn drain_handle(&self) -> DrainHandle {
        DrainHandle {
            pending: Arc::clone(&self.pending),
        }
    }
}

/// Count of spawned deliveries that have not finished
#[derive(Debug, Default)]
struct Pending {
    count: AtomicUsize,
    /// Signalled when `count` drops to zero
    idle: Notify,
}

impl Pending {
    /// Record a delivery; the returned guard releases it when dropped
    fn track(self: &Arc<Self>) -> PendingGuard {
        self.count.fetch_add(1, Ordering::SeqCst);
        PendingGuard(Arc::clone(self))
    }

    async fn wait_idle(&self) {
        loop {
            let notified = self.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.count.load(Ordering::SeqCst) == 0 {
                return;
            }
            notified.await;
        }
    }
}

/// Held by a delivery task for its whole lifetime, including cancellation
struct PendingGuard(Arc<Pending>);

impl Drop for PendingGuard {
    fn drop(&mut self) {
        if self.0.count.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.0.idle.notify_waiters();
        }
    }
}

/// Waits for every delivery queued so far to finish
#[derive(Debug, Clone)]
pub struct DrainHandle {
    pending: Arc<Pending>,
}

impl DrainHandle {
    /// Resolve once all deliveries queued before this call have completed
    ///
    /// Deliveries are counted inside `dispatch()`, before their task first
    /// runs. Deliveries queued while waiting are waited for too.
    pub async fn wait(&self) {
        self.pending.wait_idle().await
    }

    /// Deliveries spawned and not yet finished
    pub fn pending(&self) -> usize {
        self.pending.count.load(Ordering::SeqCst)
    }
}

impl WebhookSink for HttpWebhookSink {
    fn dispatch(&self, event: &WebhookEvent) -> Result<()> {
        if self.endpoints.is_empty() {
            warn!("Called dispatch() without webhooks, dropping {} event", event.kind());
            return Ok(());
        }

        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| Error::delivery(format!("No async runtime for delivery: {}", e)))?;

        let payload = Arc::new(serde_json::json!({ "content": event.fields_json()? }));

        for endpoint in self.endpoints.iter() {
            let delivery = Delivery {
                client: self.client.clone(),
                endpoint: endpoint.clone(),
                payload: Arc::clone(&payload),
                retry: self.retry,
            };
            let permits = Arc::clone(&self.permits);
            let observer = Arc::clone(&self.observer);
            let guard = self.pending.track();

            runtime.spawn(async move {
                let _guard = guard;
                // Closed only if the sink is gone; nothing left to report to
                let Ok(_permit) = permits.acquire_owned().await else {
                    return;
                };
                let outcome = delivery.run().await;
                delivery.log(&outcome);
                observer.on_complete(&delivery.endpoint, &outcome);
            });
        }

        debug!(
            "Queued {} event for {} endpoint(s)",
            event.kind(),
            self.endpoints.len()
        );
        Ok(())
    }

    fn sink_name(&self) -> &'static str {
        "http"
    }
}

/// One event on its way to one endpoint
struct Delivery {
    client: reqwest::Client,
    endpoint: String,
    payload: Arc<Value>,
    retry: RetryPolicy,
}

impl Delivery {
    /// POST the payload, retrying transient failures
    async fn run(&self) -> DeliveryOutcome {
        let mut attempts = 0;

        loop {
            attempts += 1;
            let retries_left = attempts <= self.retry.retries;

            match self
                .client
                .post(&self.endpoint)
                .json(self.payload.as_ref())
                .send()
                .await
            {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return DeliveryOutcome::Delivered {
                            status: status.as_u16(),
                            attempts,
                        };
                    }
                    if !(retries_left && RetryPolicy::is_retryable_status(status.as_u16())) {
                        return DeliveryOutcome::Rejected {
                            status: status.as_u16(),
                            attempts,
                        };
                    }
                    debug!("Webhook endpoint answered {}, retrying", status);
                }
                Err(e) => {
                    if !retries_left {
                        return DeliveryOutcome::Failed {
                            error: e.to_string(),
                            attempts,
                        };
                    }
                    debug!("Webhook request failed ({}), retrying", e);
                }
            }

            tokio::time::sleep(self.retry.delay_before(attempts)).await;
        }
    }

    fn log(&self, outcome: &DeliveryOutcome) {
        let target = redact(&self.endpoint);
        match outcome {
            DeliveryOutcome::Delivered { status, attempts } => {
                info!("Webhook delivered to {} ({}, attempts: {})", target, status, attempts);
            }
            DeliveryOutcome::Rejected { status, attempts }
                if RetryPolicy::is_retryable_status(*status) =>
            {
                warn!(
                    "Webhook to {} still failing after {} attempts ({})",
                    target, attempts, status
                );
            }
            DeliveryOutcome::Rejected { status, .. } => {
                warn!("Webhook endpoint {} rejected the event ({})", target, status);
            }
            DeliveryOutcome::Failed { error, attempts } => {
                warn!(
                    "Webhook to {} failed after {} attempts: {}",
                    target, attempts, error
                );
            }
        }
    }
}

/// Scheme and host of an endpoint, without the path that may carry a token
fn redact(endpoint: &str) -> String {
    match reqwest::Url::parse(endpoint) {
        Ok(url) => format!(
            "{}://{}",
            url.scheme(),
            url.host_str().unwrap_or("<unknown>")
        ),
        Err(_) => "<invalid url>".to_string(),
    }
}

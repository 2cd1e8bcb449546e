// # hookcastd - Webhook Dispatch Daemon
//
// This daemon is a thin integration layer: all dispatch decisions live in
// hookcast-core and all network delivery lives in hookcast-http.
//
// The hookcastd daemon is responsible for:
// 1. Reading configuration from environment variables
// 2. Initializing logging and the runtime
// 3. Feeding newline-delimited JSON envelopes from stdin into the queue
// 4. Running the dispatch engine until stdin closes or a signal arrives
//
// ## Input
//
// One envelope per line: `{"type": "pokemon", "message": {...}}`.
// Malformed lines are logged and skipped.
//
// ## Configuration
//
// All configuration is done via environment variables:
//
// - `HOOKCAST_WEBHOOKS`: Comma-separated endpoint URLs
// - `HOOKCAST_TIMEOUT_SECS`: Per-request read timeout (default 1.0)
// - `HOOKCAST_RETRIES`: Retries on transient failures (default 3)
// - `HOOKCAST_BACKOFF_FACTOR`: Exponential backoff factor (default 0.25)
// - `HOOKCAST_CONCURRENCY`: Connection pool size (default 25)
// - `HOOKCAST_ENCOUNTER_BLACKLIST`: Comma-separated species ids
// - `HOOKCAST_WARNING_THRESHOLD`: Backlog warning threshold (default 100)
// - `HOOKCAST_CACHE_CAPACITY`: Dedup cache capacity (default 2500)
// - `HOOKCAST_LOG_LEVEL`: trace, debug, info, warn, error (default info)
//
// ## Example
//
// ```bash
// export HOOKCAST_WEBHOOKS=https://hooks.example.com/a,https://hooks.example.com/b
// export HOOKCAST_ENCOUNTER_BLACKLIST=13,16,19
//
// scanner --emit-ndjson | hookcastd
// ```

use anyhow::{Context, Result};
use hookcast_core::{
    DispatchConfig, DispatchEngine, IdentityKey, LfuCache, MemoryQueue, QueueHandle, WebhookEvent,
};
use hookcast_http::HttpWebhookSink;
use std::env;
use std::process::ExitCode;
use std::str::FromStr;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::oneshot;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::LinesStream;
use tracing::{Level, debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

/// How long in-flight deliveries may take to finish after the engine stops
const DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// Exit codes for different termination scenarios
///
/// These codes follow systemd conventions:
/// - 0: Clean shutdown
/// - 1: Configuration or startup error
/// - 2: Runtime error (unexpected)
#[derive(Debug, Clone, Copy)]
enum HookcastExitCode {
    /// Clean shutdown (normal exit)
    CleanShutdown = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime error (unexpected failure)
    RuntimeError = 2,
}

impl From<HookcastExitCode> for ExitCode {
    fn from(code: HookcastExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Application configuration
struct Config {
    dispatch: DispatchConfig,
    log_level: String,
}

impl Config {
    /// Load configuration from environment variables
    fn from_env() -> Result<Self> {
        let mut dispatch = DispatchConfig::new();

        dispatch.webhooks = list_var("HOOKCAST_WEBHOOKS");
        if let Some(timeout) = parsed_var("HOOKCAST_TIMEOUT_SECS")? {
            dispatch.timeout_secs = timeout;
        }
        if let Some(retries) = parsed_var("HOOKCAST_RETRIES")? {
            dispatch.retries = retries;
        }
        if let Some(factor) = parsed_var("HOOKCAST_BACKOFF_FACTOR")? {
            dispatch.backoff_factor = factor;
        }
        if let Some(concurrency) = parsed_var("HOOKCAST_CONCURRENCY")? {
            dispatch.concurrency = concurrency;
        }
        dispatch.encounter_blacklist = list_var("HOOKCAST_ENCOUNTER_BLACKLIST")
            .iter()
            .map(|id| {
                id.parse::<u16>()
                    .with_context(|| format!("HOOKCAST_ENCOUNTER_BLACKLIST: invalid species id '{}'", id))
            })
            .collect::<Result<_>>()?;
        if let Some(threshold) = parsed_var("HOOKCAST_WARNING_THRESHOLD")? {
            dispatch.warning_threshold = threshold;
        }
        if let Some(capacity) = parsed_var("HOOKCAST_CACHE_CAPACITY")? {
            dispatch.cache_capacity = capacity;
        }

        Ok(Self {
            dispatch,
            log_level: env::var("HOOKCAST_LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
        })
    }

    /// Validate the configuration
    ///
    /// On top of the dispatch configuration's own checks this enforces the
    /// operational ranges the daemon supports.
    fn validate(&self) -> Result<()> {
        self.dispatch.validate()?;

        if self.dispatch.webhooks.is_empty() {
            eprintln!(
                "WARNING: HOOKCAST_WEBHOOKS is empty. \
                Events will be processed but never delivered."
            );
        }

        for url in &self.dispatch.webhooks {
            if url.starts_with("http://") {
                eprintln!(
                    "WARNING: webhook endpoint uses HTTP (not HTTPS). \
                    Consider using HTTPS."
                );
                break;
            }
        }

        if self.dispatch.retries > 10 {
            anyhow::bail!(
                "HOOKCAST_RETRIES must be between 0 and 10. Got: {}",
                self.dispatch.retries
            );
        }

        if self.dispatch.timeout_secs > 300.0 {
            anyhow::bail!(
                "HOOKCAST_TIMEOUT_SECS must be at most 300 seconds. Got: {}",
                self.dispatch.timeout_secs
            );
        }

        if self.dispatch.concurrency > 1000 {
            anyhow::bail!(
                "HOOKCAST_CONCURRENCY must be between 1 and 1000. Got: {}",
                self.dispatch.concurrency
            );
        }

        if self.dispatch.warning_threshold == 0 {
            anyhow::bail!("HOOKCAST_WARNING_THRESHOLD must be > 0");
        }

        parse_log_level(&self.log_level)?;

        Ok(())
    }
}

/// Comma-separated list variable; unset means empty
fn list_var(name: &str) -> Vec<String> {
    env::var(name)
        .unwrap_or_default()
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Optional variable parsed into `T`; a malformed value is an error
fn parsed_var<T>(name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map(Some)
            .with_context(|| format!("{} has an invalid value: '{}'", name, raw)),
        _ => Ok(None),
    }
}

fn parse_log_level(level: &str) -> Result<Level> {
    match level.to_lowercase().as_str() {
        "trace" => Ok(Level::TRACE),
        "debug" => Ok(Level::DEBUG),
        "info" => Ok(Level::INFO),
        "warn" => Ok(Level::WARN),
        "error" => Ok(Level::ERROR),
        _ => anyhow::bail!(
            "HOOKCAST_LOG_LEVEL '{}' is not valid. \
            Valid levels: trace, debug, info, warn, error",
            level
        ),
    }
}

fn main() -> ExitCode {
    // Load configuration from environment
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {:#}", e);
            return HookcastExitCode::ConfigError.into();
        }
    };

    // Validate configuration
    if let Err(e) = config.validate() {
        eprintln!("Configuration validation error: {:#}", e);
        return HookcastExitCode::ConfigError.into();
    }

    // Initialize tracing
    let log_level = parse_log_level(&config.log_level).unwrap_or(Level::INFO);
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return HookcastExitCode::ConfigError.into();
    }

    info!("Starting hookcastd daemon");
    info!(
        "Configuration loaded: {} webhook(s), cache capacity {}",
        config.dispatch.webhooks.len(),
        config.dispatch.cache_capacity
    );

    // Enter tokio runtime
    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return HookcastExitCode::RuntimeError.into();
        }
    };

    let result = rt.block_on(async {
        if let Err(e) = run_daemon(config).await {
            error!("Daemon error: {:#}", e);
            HookcastExitCode::RuntimeError
        } else {
            HookcastExitCode::CleanShutdown
        }
    });

    // A pending stdin read holds a blocking thread; don't wait on it forever
    rt.shutdown_timeout(Duration::from_secs(1));

    result.into()
}

/// Run the daemon
async fn run_daemon(config: Config) -> Result<()> {
    let (queue, handle) = MemoryQueue::new();

    let sink = HttpWebhookSink::from_config(&config.dispatch)
        .context("Failed to create HTTP webhook sink")?;
    let drain = sink.drain_handle();

    let cache = LfuCache::<IdentityKey, WebhookEvent>::new(config.dispatch.cache_capacity)
        .context("Failed to create dedup cache")?;

    let (engine, events) = DispatchEngine::new(
        Box::new(queue),
        Box::new(sink),
        Box::new(cache),
        config.dispatch,
    )
    .context("Failed to create dispatch engine")?;
    // Monitoring events are not consumed by the daemon; the engine logs its own decisions
    drop(events);

    let producer = tokio::spawn(async move {
        let stdin = BufReader::new(tokio::io::stdin());
        match read_events(stdin, &handle).await {
            Ok(accepted) => debug!("Input closed after {} event(s)", accepted),
            Err(e) => error!("Stopped reading input: {}", e),
        }
    });

    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    let signals = tokio::spawn(async move {
        match wait_for_shutdown().await {
            Ok(signal) => {
                info!("Received shutdown signal: {}", signal);
                let _ = shutdown_tx.send(());
            }
            Err(e) => error!("Shutdown signal handling failed: {:#}", e),
        }
    });

    info!("Dispatch engine starting");
    engine.run_with_shutdown(Some(shutdown_rx)).await?;

    signals.abort();
    producer.abort();

    info!("Waiting for in-flight deliveries");
    if tokio::time::timeout(DRAIN_TIMEOUT, drain.wait()).await.is_err() {
        warn!(
            "In-flight deliveries did not finish within {:?}, exiting anyway",
            DRAIN_TIMEOUT
        );
    }

    info!("Shutting down daemon");
    Ok(())
}

/// Feed newline-delimited envelopes into the queue until EOF
///
/// Malformed lines are logged and skipped. Read failures and a closed queue
/// end the producer. Dropping the handle afterwards closes the queue, so the
/// engine stops once the remaining events are processed.
///
/// # Returns
///
/// The number of events enqueued.
async fn read_events<R>(reader: R, handle: &QueueHandle) -> hookcast_core::Result<u64>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = LinesStream::new(reader.lines());
    let mut accepted: u64 = 0;

    while let Some(line) = lines.next().await {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        match WebhookEvent::from_json_line(&line) {
            Ok(event) => {
                handle.push(event)?;
                accepted += 1;
            }
            Err(e) => warn!("Dropping malformed input line: {}", e),
        }
    }

    Ok(accepted)
}

/// Wait for shutdown signals (SIGTERM, SIGINT)
///
/// # Returns
///
/// Returns the name of the signal received.
#[cfg(unix)]
async fn wait_for_shutdown() -> Result<&'static str> {
    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGINT handler: {}", e))?;

    Ok(tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    })
}

/// Wait for shutdown signals (SIGINT only)
///
/// Fallback implementation for non-Unix platforms.
#[cfg(not(unix))]
async fn wait_for_shutdown() -> Result<&'static str> {
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to wait for CTRL-C: {}", e))?;
    Ok("SIGINT")
}

//! Active health checking.
//!
//! # Responsibilities
//! - Probe a backend with a GET request and a bounded timeout
//! - Run the per-connection heartbeat loop
//! - Update the connection's health state based on results

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use http::{header, Request, StatusCode};
use http_body_util::{BodyExt, Empty};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use thiserror::Error;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use url::Url;

use crate::config::HealthCheckConfig;
use crate::health::state::{HealthCell, HealthState};
use crate::http::apply_basic_auth;

/// Smallest interval a heartbeat accepts.
const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Largest interval a heartbeat accepts; keeps the first deadline representable.
const MAX_INTERVAL: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Reason a probe marked its connection broken.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("failed to build probe request: {0}")]
    Request(#[from] http::Error),

    #[error("connection error: {0}")]
    Connect(#[from] hyper_util::client::legacy::Error),

    #[error("non-success status {0}")]
    Status(StatusCode),

    #[error("timeout after {0:?}")]
    Timeout(Duration),
}

/// Issues health probes.
#[derive(Debug, Clone)]
pub struct Prober {
    client: Client<HttpConnector, Empty<Bytes>>,
    user_agent: String,
    timeout: Duration,
}

impl Prober {
    pub fn new(config: &HealthCheckConfig) -> Self {
        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());

        Self {
            client,
            user_agent: config.user_agent.clone(),
            timeout: config.timeout(),
        }
    }

    /// GET the bare target URL. Only `200 OK` counts as healthy.
    ///
    /// Credentials in the URL are sent as Basic authentication.
    pub async fn probe(&self, url: &Url) -> Result<(), ProbeError> {
        let mut url = url.clone();
        url.set_fragment(None);

        let mut request = Request::builder()
            .method("GET")
            .uri(url.as_str())
            .header(header::USER_AGENT, self.user_agent.as_str())
            .body(Empty::<Bytes>::new())?;
        apply_basic_auth(&mut request)?;

        let exchange = async {
            let response = self.client.request(request).await?;
            let status = response.status();
            // Drain so the pooled connection can be reused.
            let _ = response.into_body().collect().await;
            Ok::<_, ProbeError>(status)
        };

        let status = time::timeout(self.timeout, exchange)
            .await
            .map_err(|_| ProbeError::Timeout(self.timeout))??;

        if status == StatusCode::OK {
            Ok(())
        } else {
            Err(ProbeError::Status(status))
        }
    }
}

/// Probe target plus its cached health, shared with the heartbeat task.
#[derive(Debug)]
pub struct Monitor {
    url: Url,
    prober: Prober,
    health: HealthCell,
}

impl Monitor {
    pub fn new(url: Url, config: &HealthCheckConfig) -> Self {
        Self {
            url,
            prober: Prober::new(config),
            health: HealthCell::default(),
        }
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn health(&self) -> HealthState {
        self.health.get()
    }

    /// Overwrite the state while no heartbeat is running.
    pub(crate) fn reset(&self, state: HealthState) {
        self.health.set(state);
    }

    /// Run one probe and store its outcome.
    pub async fn check(&self) -> HealthState {
        let next = match self.prober.probe(&self.url).await {
            Ok(()) => HealthState::Healthy,
            Err(e) => {
                tracing::warn!(url = %self.url, error = %e, "Health check failed");
                HealthState::Broken
            }
        };

        let previous = self.health.set(next);
        if previous != next {
            tracing::info!(url = %self.url, from = %previous, to = %next, "Connection health changed");
        } else {
            tracing::debug!(url = %self.url, state = %next, "Health check done");
        }
        next
    }
}

/// A running heartbeat task.
#[derive(Debug)]
pub struct Heartbeat {
    stop: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

impl Heartbeat {
    /// Spawn the loop. With `probe_now` the first probe runs immediately,
    /// otherwise after one full period.
    pub fn start(monitor: Arc<Monitor>, period: Duration, probe_now: bool) -> Self {
        let (stop, stop_rx) = oneshot::channel();
        let period = period.clamp(MIN_INTERVAL, MAX_INTERVAL);
        let handle = tokio::spawn(run(monitor, period, probe_now, stop_rx));
        Self { stop, handle }
    }

    /// Signal the loop and wait until it has exited.
    pub async fn stop(self) {
        let _ = self.stop.send(());
        if let Err(e) = self.handle.await {
            if e.is_panic() {
                tracing::error!(error = %e, "Heartbeat task panicked");
            }
        }
    }

    /// Stop without waiting; used when the owner is dropped.
    pub fn abort(&self) {
        self.handle.abort();
    }
}

async fn run(monitor: Arc<Monitor>, period: Duration, probe_now: bool, mut stop: oneshot::Receiver<()>) {
    let start = if probe_now {
        Instant::now()
    } else {
        Instant::now() + period
    };
    let mut ticker = time::interval_at(start, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    tracing::debug!(url = %monitor.url(), interval = ?period, "Heartbeat starting");

    loop {
        tokio::select! {
            biased;
            _ = &mut stop => break,
            _ = ticker.tick() => {}
        }
        tokio::select! {
            biased;
            _ = &mut stop => break,
            _ = monitor.check() => {}
        }
    }

    tracing::debug!(url = %monitor.url(), "Heartbeat stopped");
}

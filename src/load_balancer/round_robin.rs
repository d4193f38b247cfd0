//! Round-robin load balancing strategy.

use std::sync::{Arc, Mutex, MutexGuard};

use futures_util::future::join_all;

use crate::config::{BalancerConfig, HealthCheckConfig};
use crate::error::{Error, Result};
use crate::load_balancer::connection::{Connection, HttpConnection, Target};
use crate::load_balancer::Balancer;

#[derive(Debug)]
struct RoundRobinState {
    conns: Vec<Arc<dyn Connection>>,
    /// Index of the next candidate; always < conns.len() when non-empty.
    idx: usize,
}

impl RoundRobinState {
    /// Examine at most one full turn, advancing the cursor once per candidate.
    fn next(&mut self) -> Option<Arc<dyn Connection>> {
        let len = self.conns.len();
        for _ in 0..len {
            let candidate = &self.conns[self.idx];
            self.idx = (self.idx + 1) % len;
            if candidate.is_healthy() {
                return Some(candidate.clone());
            }
        }
        None
    }
}

/// Round-robin selector over a fixed set of connections.
#[derive(Debug)]
pub struct RoundRobin {
    state: Mutex<RoundRobinState>,
}

impl RoundRobin {
    pub fn new(conns: Vec<Arc<dyn Connection>>) -> Self {
        Self {
            state: Mutex::new(RoundRobinState { conns, idx: 0 }),
        }
    }

    /// Build health-checked connections for `urls`, in order.
    ///
    /// Every URL is parsed before any connection is created; the first
    /// invalid one aborts the whole batch. Connections then run their first
    /// probe concurrently.
    pub async fn from_urls<I, S>(urls: I, config: &HealthCheckConfig) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let targets = urls
            .into_iter()
            .map(|url| Target::parse(url.as_ref()))
            .collect::<Result<Vec<_>>>()?;

        let conns = join_all(
            targets
                .into_iter()
                .map(|target| HttpConnection::connect(target.url().clone(), config)),
        )
        .await
        .into_iter()
        .map(|conn| Arc::new(conn) as Arc<dyn Connection>)
        .collect::<Vec<_>>();

        tracing::info!(
            members = conns.len(),
            healthy = conns.iter().filter(|c| c.is_healthy()).count(),
            "Round-robin balancer ready"
        );

        Ok(Self::new(conns))
    }

    /// Build from the `backends` and `health_check` sections of a config.
    pub async fn from_config(config: &BalancerConfig) -> Result<Self> {
        Self::from_urls(&config.backends, &config.health_check).await
    }

    pub fn len(&self) -> usize {
        self.lock().conns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().conns.is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, RoundRobinState> {
        // Selection never panics while holding the lock; recover the state anyway.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Balancer for RoundRobin {
    fn get(&self) -> Result<Arc<dyn Connection>> {
        let mut state = self.lock();
        match state.next() {
            Some(conn) => Ok(conn),
            None => {
                tracing::debug!(members = state.conns.len(), "No healthy connection found");
                Err(Error::NoConnection)
            }
        }
    }

    fn connections(&self) -> Vec<Arc<dyn Connection>> {
        self.lock().conns.clone()
    }
}

//! Periodic upstream health probing.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use axum::body::Body;
use axum::http::{Method, Request, Uri};
use hyper_util::client::legacy::{connect::HttpConnector, Client};
use hyper_util::rt::TokioExecutor;
use tokio::sync::broadcast;
use tokio::task::JoinSet;

use crate::clock::Clock;
use crate::config::HealthCheckConfig;
use crate::health::status::{ServiceHealth, TargetStatus};

struct Inner {
    status: HashMap<String, TargetStatus>,
    healthy: Vec<String>,
}

/// Probes a route's targets on a fixed interval and tracks which of them
/// may receive traffic. A target flips unhealthy after `max_failures`
/// consecutive probe failures and recovers on the first success.
pub struct HealthChecker {
    targets: Vec<String>,
    endpoint: String,
    interval: Duration,
    timeout: Duration,
    max_failures: u32,
    inner: RwLock<Inner>,
    client: Client<HttpConnector, Body>,
    clock: Arc<dyn Clock>,
}

impl HealthChecker {
    pub fn new(targets: Vec<String>, config: &HealthCheckConfig, clock: Arc<dyn Clock>) -> Self {
        let now = clock.now();
        let assume_healthy = config.assume_healthy_on_start;

        let status = targets
            .iter()
            .map(|t| {
                (
                    t.clone(),
                    TargetStatus {
                        target: t.clone(),
                        is_healthy: assume_healthy,
                        last_check: now,
                        last_success: None,
                        last_failure: None,
                        failure_count: 0,
                    },
                )
            })
            .collect();

        let healthy = if assume_healthy {
            targets.clone()
        } else {
            Vec::new()
        };

        Self {
            targets,
            endpoint: config.path.clone(),
            interval: Duration::from_secs(config.interval_secs),
            timeout: Duration::from_secs(config.timeout_secs),
            max_failures: config.max_failures,
            inner: RwLock::new(Inner { status, healthy }),
            client: Client::builder(TokioExecutor::new()).build(HttpConnector::new()),
            clock,
        }
    }

    /// Spawn the probe loop. One round runs immediately; the loop exits when
    /// the shutdown signal fires.
    pub fn start(self: Arc<Self>, mut shutdown: broadcast::Receiver<()>) {
        tokio::spawn(async move {
            tracing::info!(
                targets = self.targets.len(),
                interval_secs = self.interval.as_secs(),
                "Health checker started"
            );

            Arc::clone(&self).check_all().await;

            let mut ticker = tokio::time::interval(self.interval);
            ticker.tick().await; // the immediate tick; the round above covered it

            loop {
                tokio::select! {
                    _ = ticker.tick() => Arc::clone(&self).check_all().await,
                    _ = shutdown.recv() => {
                        tracing::info!("Health checker stopped");
                        break;
                    }
                }
            }
        });
    }

    /// Probe every target concurrently, then recompute the healthy subset.
    async fn check_all(self: Arc<Self>) {
        let mut probes = JoinSet::new();
        for target in self.targets.clone() {
            let checker = Arc::clone(&self);
            probes.spawn(async move {
                let ok = checker.probe(&target).await;
                (target, ok)
            });
        }

        while let Some(joined) = probes.join_next().await {
            if let Ok((target, ok)) = joined {
                if ok {
                    self.record_success(&target);
                } else {
                    self.record_failure(&target);
                }
            }
        }

        self.update_healthy_targets();
    }

    /// A target is healthy iff the probe answers 2xx/3xx within the timeout.
    async fn probe(&self, target: &str) -> bool {
        let url = format!("{}{}", target, self.endpoint);
        let uri: Uri = match url.parse() {
            Ok(uri) => uri,
            Err(e) => {
                tracing::warn!(target = %target, error = %e, "Invalid health probe URL");
                return false;
            }
        };

        let request = match Request::builder()
            .method(Method::GET)
            .uri(uri)
            .body(Body::empty())
        {
            Ok(request) => request,
            Err(_) => return false,
        };

        match tokio::time::timeout(self.timeout, self.client.request(request)).await {
            Ok(Ok(response)) => {
                let status = response.status().as_u16();
                (200..400).contains(&status)
            }
            Ok(Err(_)) | Err(_) => false,
        }
    }

    pub(crate) fn record_success(&self, target: &str) {
        let now = self.clock.now();
        let mut inner = self.inner.write().expect("health lock poisoned");
        if let Some(status) = inner.status.get_mut(target) {
            status.last_check = now;
            status.last_success = Some(now);
            status.failure_count = 0;

            if !status.is_healthy {
                tracing::info!(target = %target, "Target is now healthy");
                status.is_healthy = true;
            }
        }
    }

    pub(crate) fn record_failure(&self, target: &str) {
        let max_failures = self.max_failures;
        let now = self.clock.now();
        let mut inner = self.inner.write().expect("health lock poisoned");
        if let Some(status) = inner.status.get_mut(target) {
            status.last_check = now;
            status.last_failure = Some(now);
            status.failure_count += 1;

            if status.is_healthy && status.failure_count >= max_failures {
                tracing::warn!(
                    target = %target,
                    failures = status.failure_count,
                    "Target is now unhealthy"
                );
                status.is_healthy = false;
            }
        }
    }

    /// Recompute the healthy subset atomically so readers never observe a
    /// half-updated list.
    pub(crate) fn update_healthy_targets(&self) {
        let mut inner = self.inner.write().expect("health lock poisoned");
        let healthy: Vec<String> = self
            .targets
            .iter()
            .filter(|t| inner.status.get(*t).map(|s| s.is_healthy).unwrap_or(false))
            .cloned()
            .collect();
        inner.healthy = healthy;

        for target in &self.targets {
            if let Some(status) = inner.status.get(target) {
                crate::observability::metrics::record_target_health(target, status.is_healthy);
            }
        }
    }

    /// The targets a request may currently be dispatched to. Returns a copy.
    pub fn healthy_targets(&self) -> Vec<String> {
        self.inner.read().expect("health lock poisoned").healthy.clone()
    }

    pub fn all_targets(&self) -> Vec<String> {
        self.targets.clone()
    }

    pub fn status(&self, target: &str) -> Option<TargetStatus> {
        self.inner
            .read()
            .expect("health lock poisoned")
            .status
            .get(target)
            .cloned()
    }

    /// Snapshot of every target's state, in configuration order.
    pub fn all_status(&self) -> Vec<TargetStatus> {
        let inner = self.inner.read().expect("health lock poisoned");
        self.targets
            .iter()
            .filter_map(|t| inner.status.get(t).cloned())
            .collect()
    }

    pub fn overall_health(&self) -> ServiceHealth {
        let inner = self.inner.read().expect("health lock poisoned");
        let healthy_count = inner.healthy.len();

        if healthy_count == 0 {
            ServiceHealth::Unhealthy
        } else if healthy_count < self.targets.len() {
            ServiceHealth::Degraded
        } else {
            ServiceHealth::Healthy
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    fn checker(targets: &[&str]) -> Arc<HealthChecker> {
        let config = HealthCheckConfig {
            max_failures: 3,
            ..Default::default()
        };
        Arc::new(HealthChecker::new(
            targets.iter().map(|t| t.to_string()).collect(),
            &config,
            Arc::new(ManualClock::at_epoch()),
        ))
    }

    #[test]
    fn targets_start_healthy() {
        let checker = checker(&["http://a", "http://b"]);
        assert_eq!(checker.healthy_targets().len(), 2);
        assert_eq!(checker.overall_health(), ServiceHealth::Healthy);
    }

    #[test]
    fn unhealthy_after_threshold_failures() {
        let checker = checker(&["http://a", "http://b"]);

        checker.record_failure("http://a");
        checker.record_failure("http://a");
        checker.update_healthy_targets();
        assert_eq!(checker.healthy_targets().len(), 2, "below threshold");

        checker.record_failure("http://a");
        checker.update_healthy_targets();
        assert_eq!(checker.healthy_targets(), vec!["http://b".to_string()]);
        assert_eq!(checker.overall_health(), ServiceHealth::Degraded);
    }

    #[test]
    fn success_resets_the_failure_streak() {
        let checker = checker(&["http://a"]);

        checker.record_failure("http://a");
        checker.record_failure("http://a");
        checker.record_success("http://a");
        checker.record_failure("http://a");
        checker.record_failure("http://a");
        checker.update_healthy_targets();

        assert_eq!(checker.healthy_targets().len(), 1, "streak was broken");
    }

    #[test]
    fn recovery_flips_back_on_first_success() {
        let checker = checker(&["http://a"]);

        for _ in 0..3 {
            checker.record_failure("http://a");
        }
        checker.update_healthy_targets();
        assert!(checker.healthy_targets().is_empty());
        assert_eq!(checker.overall_health(), ServiceHealth::Unhealthy);

        checker.record_success("http://a");
        checker.update_healthy_targets();
        assert_eq!(checker.healthy_targets().len(), 1);
        assert_eq!(checker.status("http://a").unwrap().failure_count, 0);
    }

    #[test]
    fn snapshots_are_copies() {
        let checker = checker(&["http://a"]);
        let snapshot = checker.healthy_targets();
        checker.record_failure("http://a");
        checker.record_failure("http://a");
        checker.record_failure("http://a");
        checker.update_healthy_targets();
        // The earlier snapshot is unaffected by the update.
        assert_eq!(snapshot.len(), 1);
        assert!(checker.healthy_targets().is_empty());
    }
}

use async_trait::async_trait;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::timeout;

use crate::vendor::StellrAdapter;

const CHECK_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub dependencies: HashMap<String, DependencyStatus>,
}

impl HealthResponse {
    pub fn is_unhealthy(&self) -> bool {
        self.status == "unhealthy"
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DependencyStatus {
    Healthy { status: String, latency_ms: u64 },
    Unhealthy { status: String, error: String },
}

impl DependencyStatus {
    fn healthy(start: Instant) -> Self {
        DependencyStatus::Healthy {
            status: "healthy".to_string(),
            latency_ms: start.elapsed().as_millis() as u64,
        }
    }

    fn unhealthy(error: impl Into<String>) -> Self {
        DependencyStatus::Unhealthy {
            status: "unhealthy".to_string(),
            error: error.into(),
        }
    }
}

#[async_trait]
pub trait DependencyChecker: Send + Sync {
    async fn check(&self) -> DependencyStatus;
}

pub struct PostgresChecker {
    pool: sqlx::PgPool,
}

impl PostgresChecker {
    pub fn new(pool: sqlx::PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DependencyChecker for PostgresChecker {
    async fn check(&self) -> DependencyStatus {
        let start = Instant::now();
        match sqlx::query("SELECT 1").execute(&self.pool).await {
            Ok(_) => DependencyStatus::healthy(start),
            Err(e) => DependencyStatus::unhealthy(e.to_string()),
        }
    }
}

/// Reports the Stellr circuit breaker; an open circuit means calls are being shed.
pub struct StellrCircuitChecker {
    adapter: Arc<StellrAdapter>,
}

impl StellrCircuitChecker {
    pub fn new(adapter: Arc<StellrAdapter>) -> Self {
        Self { adapter }
    }
}

#[async_trait]
impl DependencyChecker for StellrCircuitChecker {
    async fn check(&self) -> DependencyStatus {
        let start = Instant::now();
        match self.adapter.circuit_state().as_str() {
            "closed" => DependencyStatus::healthy(start),
            state => DependencyStatus::unhealthy(format!("circuit breaker {}", state)),
        }
    }
}

struct RegisteredCheck {
    name: String,
    critical: bool,
    checker: Arc<dyn DependencyChecker>,
}

/// Runs every registered dependency check concurrently. A failing critical
/// dependency makes the service unhealthy, any other failure only degrades it.
pub struct HealthMonitor {
    checks: Vec<RegisteredCheck>,
    started_at: Instant,
}

impl Default for HealthMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl HealthMonitor {
    pub fn new() -> Self {
        Self {
            checks: Vec::new(),
            started_at: Instant::now(),
        }
    }

    pub fn with_check(
        mut self,
        name: impl Into<String>,
        critical: bool,
        checker: Arc<dyn DependencyChecker>,
    ) -> Self {
        self.checks.push(RegisteredCheck {
            name: name.into(),
            critical,
            checker,
        });
        self
    }

    pub async fn check_health(&self) -> HealthResponse {
        let results = join_all(self.checks.iter().map(|c| async move {
            let status = timeout(CHECK_TIMEOUT, c.checker.check())
                .await
                .unwrap_or_else(|_| DependencyStatus::unhealthy("timeout"));
            (c, status)
        }))
        .await;

        let mut has_critical_failure = false;
        let mut has_non_critical_failure = false;
        let mut dependencies = HashMap::new();
        for (check, status) in results {
            if matches!(status, DependencyStatus::Unhealthy { .. }) {
                if check.critical {
                    has_critical_failure = true;
                } else {
                    has_non_critical_failure = true;
                }
            }
            dependencies.insert(check.name.clone(), status);
        }

        let status = if has_critical_failure {
            "unhealthy"
        } else if has_non_critical_failure {
            "degraded"
        } else {
            "healthy"
        };

        HealthResponse {
            status: status.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            uptime_seconds: self.started_at.elapsed().as_secs(),
            dependencies,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(bool);

    #[async_trait]
    impl DependencyChecker for Fixed {
        async fn check(&self) -> DependencyStatus {
            if self.0 {
                DependencyStatus::healthy(Instant::now())
            } else {
                DependencyStatus::unhealthy("down")
            }
        }
    }

    #[tokio::test]
    async fn test_all_healthy() {
        let monitor = HealthMonitor::new().with_check("postgres", true, Arc::new(Fixed(true)));
        let response = monitor.check_health().await;
        assert_eq!(response.status, "healthy");
        assert!(response.dependencies.contains_key("postgres"));
    }

    #[tokio::test]
    async fn test_non_critical_failure_degrades() {
        let monitor = HealthMonitor::new()
            .with_check("postgres", true, Arc::new(Fixed(true)))
            .with_check("stellr", false, Arc::new(Fixed(false)));
        assert_eq!(monitor.check_health().await.status, "degraded");
    }

    #[tokio::test]
    async fn test_critical_failure_is_unhealthy() {
        let monitor = HealthMonitor::new()
            .with_check("postgres", true, Arc::new(Fixed(false)))
            .with_check("stellr", false, Arc::new(Fixed(true)));
        let response = monitor.check_health().await;
        assert!(response.is_unhealthy());
    }

    #[tokio::test]
    async fn test_stellr_circuit_checker_reports_closed_circuit() {
        let adapter = Arc::new(StellrAdapter::new(
            "http://localhost:1".to_string(),
            "key".to_string(),
            Duration::from_millis(100),
        ));
        let status = StellrCircuitChecker::new(adapter).check().await;
        assert!(matches!(status, DependencyStatus::Healthy { .. }));
    }
}

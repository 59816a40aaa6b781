//! Health checks for readiness and liveness checks

use crate::amqp::AmqpConnection;
use crate::match_flow::{MatchOrchestrator, MatchStatus, OrchestratorStats};
use anyhow::Result;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{Mutex, RwLock};

/// The orchestrator as the runtime shares it between tasks
pub type SharedOrchestrator = Arc<Mutex<MatchOrchestrator>>;

/// Health check status
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

impl HealthStatus {
    /// Gauge value (0=unhealthy, 1=degraded, 2=healthy)
    pub fn code(self) -> u8 {
        match self {
            HealthStatus::Healthy => 2,
            HealthStatus::Degraded => 1,
            HealthStatus::Unhealthy => 0,
        }
    }

    fn worst(self, other: HealthStatus) -> HealthStatus {
        if self.code() <= other.code() {
            self
        } else {
            other
        }
    }
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HealthStatus::Healthy => write!(f, "✅ healthy"),
            HealthStatus::Degraded => write!(f, "⚠️  degraded"),
            HealthStatus::Unhealthy => write!(f, "❌ unhealthy"),
        }
    }
}

/// Handles the health endpoints need, cloned out of the app state
#[derive(Clone)]
pub struct HealthTarget {
    pub service_name: String,
    pub orchestrator: SharedOrchestrator,
    pub running: Arc<RwLock<bool>>,
    /// `None` when running without a broker
    pub amqp: Option<Arc<AmqpConnection>>,
    pub started_at: Instant,
}

impl HealthTarget {
    pub async fn is_running(&self) -> bool {
        *self.running.read().await
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}

/// Health check response
#[derive(Debug, Clone, Serialize)]
pub struct HealthCheck {
    pub status: HealthStatus,
    pub service: String,
    pub version: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub uptime_seconds: u64,
    pub checks: Vec<ComponentCheck>,
    pub status_snapshot: MatchStatus,
    pub stats: OrchestratorStats,
}

/// Individual component health check
#[derive(Debug, Clone, Serialize)]
pub struct ComponentCheck {
    pub name: String,
    pub status: HealthStatus,
    pub message: Option<String>,
    pub duration_ms: u64,
}

impl HealthCheck {
    /// Full check with every component and a match snapshot
    pub async fn check(target: &HealthTarget) -> Result<Self> {
        let checks = vec![
            Self::check_service_running(target).await,
            Self::check_amqp(target),
        ];
        let status = checks
            .iter()
            .fold(HealthStatus::Healthy, |acc, check| acc.worst(check.status));

        let (status_snapshot, stats) = {
            let orchestrator = target.orchestrator.lock().await;
            (orchestrator.status(), orchestrator.stats().clone())
        };

        Ok(HealthCheck {
            status,
            service: target.service_name.clone(),
            version: crate::VERSION.to_string(),
            timestamp: crate::utils::current_timestamp(),
            uptime_seconds: target.uptime_seconds(),
            checks,
            status_snapshot,
            stats,
        })
    }

    pub async fn liveness_check(target: &HealthTarget) -> Result<HealthStatus> {
        if target.is_running().await {
            Ok(HealthStatus::Healthy)
        } else {
            Ok(HealthStatus::Unhealthy)
        }
    }

    /// Ready once running; degraded while no broker is attached
    pub async fn readiness_check(target: &HealthTarget) -> Result<HealthStatus> {
        if !target.is_running().await {
            return Ok(HealthStatus::Unhealthy);
        }
        Ok(Self::check_amqp(target).status)
    }

    async fn check_service_running(target: &HealthTarget) -> ComponentCheck {
        let start = Instant::now();

        let (status, message) = if target.is_running().await {
            (HealthStatus::Healthy, None)
        } else {
            (
                HealthStatus::Unhealthy,
                Some("Service is not running".to_string()),
            )
        };

        ComponentCheck {
            name: "service_running".to_string(),
            status,
            message,
            duration_ms: start.elapsed().as_millis() as u64,
        }
    }

    fn check_amqp(target: &HealthTarget) -> ComponentCheck {
        let start = Instant::now();

        let (status, message) = match &target.amqp {
            Some(connection) if connection.is_alive() => (HealthStatus::Healthy, None),
            Some(_) => (
                HealthStatus::Unhealthy,
                Some("AMQP connection is closed".to_string()),
            ),
            None => (
                HealthStatus::Degraded,
                Some("No AMQP broker attached".to_string()),
            ),
        };

        ComponentCheck {
            name: "amqp_connection".to_string(),
            status,
            message,
            duration_ms: start.elapsed().as_millis() as u64,
        }
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| anyhow::anyhow!("Failed to serialize health check: {}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::match_flow::MatchPhase;
    use crate::players::InMemoryPlayerDirectory;

    fn health_target(running: bool) -> HealthTarget {
        let config = AppConfig::with_defaults();
        let directory = Arc::new(InMemoryPlayerDirectory::new());
        HealthTarget {
            service_name: "mix-scrims".to_string(),
            orchestrator: Arc::new(Mutex::new(MatchOrchestrator::with_seed(
                &config, directory, 1,
            ))),
            running: Arc::new(RwLock::new(running)),
            amqp: None,
            started_at: Instant::now(),
        }
    }

    #[tokio::test]
    async fn test_without_broker_is_degraded() {
        let target = health_target(true);
        let health = HealthCheck::check(&target).await.unwrap();

        assert_eq!(health.status, HealthStatus::Degraded);
        assert_eq!(health.checks.len(), 2);
        assert_eq!(health.status_snapshot.phase, MatchPhase::Warmup);
        assert_eq!(
            HealthCheck::readiness_check(&target).await.unwrap(),
            HealthStatus::Degraded
        );
        assert!(health.to_json().unwrap().contains("\"amqp_connection\""));
    }

    #[tokio::test]
    async fn test_stopped_service_is_unhealthy() {
        let target = health_target(false);
        assert_eq!(
            HealthCheck::liveness_check(&target).await.unwrap(),
            HealthStatus::Unhealthy
        );
        assert_eq!(
            HealthCheck::check(&target).await.unwrap().status,
            HealthStatus::Unhealthy
        );
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(HealthStatus::Healthy.code(), 2);
        assert_eq!(
            HealthStatus::Healthy.worst(HealthStatus::Degraded),
            HealthStatus::Degraded
        );
        assert_eq!(format!("{}", HealthStatus::Unhealthy), "❌ unhealthy");
    }
}

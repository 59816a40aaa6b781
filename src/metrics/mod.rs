//! Metrics and monitoring for the mix-scrims service

pub mod collector;
pub mod health;

pub use collector::{MatchMetrics, MetricsCollector, PerformanceMetrics, ServiceMetrics};
pub use health::{HealthEndpoints, HealthServer, HealthServerConfig};

use std::sync::Arc;

/// Collector plus the HTTP server exposing it
#[derive(Clone)]
pub struct MetricsService {
    collector: Arc<MetricsCollector>,
    health_server: Arc<HealthServer>,
}

impl MetricsService {
    /// Pair a collector with the server that exposes it
    pub fn new(collector: Arc<MetricsCollector>, health_server: Arc<HealthServer>) -> Self {
        Self {
            collector,
            health_server,
        }
    }

    /// Shared handle to the collector
    pub fn collector(&self) -> Arc<MetricsCollector> {
        self.collector.clone()
    }

    /// Shared handle to the health and metrics server
    pub fn health_server(&self) -> Arc<HealthServer> {
        self.health_server.clone()
    }

    /// Serve until [`MetricsService::stop`] is called
    pub async fn start(&self) -> anyhow::Result<()> {
        self.health_server.start().await
    }

    /// Shut the HTTP server down
    pub async fn stop(&self) -> anyhow::Result<()> {
        self.health_server.stop().await
    }
}

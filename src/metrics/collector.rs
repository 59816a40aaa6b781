//! Metrics collection using Prometheus
//!
//! Counters mirror [`OrchestratorStats`]; the orchestrator itself never
//! touches the registry. The service copies stats over after every event and
//! tick with [`MetricsCollector::update_from_stats`].

use crate::match_flow::{Effect, MatchStatus, OrchestratorStats};
use anyhow::Result;
use prometheus::{
    Histogram, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, IntGaugeVec,
    Opts, Registry,
};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Main metrics collector for the orchestrator service
#[derive(Clone)]
pub struct MetricsCollector {
    registry: Arc<Registry>,
    service_metrics: ServiceMetrics,
    match_metrics: MatchMetrics,
    performance_metrics: PerformanceMetrics,
}

/// Service-level metrics
#[derive(Clone)]
pub struct ServiceMetrics {
    pub uptime_seconds: IntGauge,

    /// AMQP messages handled, by message name and status
    pub amqp_messages_total: IntCounterVec,

    pub amqp_errors_total: IntCounterVec,

    /// Health check status (0=unhealthy, 1=degraded, 2=healthy)
    pub health_status: IntGauge,

    pub component_health: IntGaugeVec,

    /// Invite webhook posts, by outcome
    pub webhook_posts_total: IntCounterVec,
}

/// Match lifecycle metrics
#[derive(Clone)]
pub struct MatchMetrics {
    /// Current phase as its numeric code
    pub phase: IntGauge,
    pub phase_transitions_total: IntCounter,
    /// Commands by outcome (accepted, rejected)
    pub commands_total: IntCounterVec,
    pub map_votes_total: IntCounter,
    pub matches_started_total: IntCounter,
    pub timeouts_started_total: IntCounter,
    pub disconnect_repairs_total: IntCounter,
    pub resets_total: IntCounter,
    pub stale_tasks_skipped_total: IntCounter,
    /// Effects forwarded to the bus, by kind
    pub effects_published_total: IntCounterVec,
    pub connected_players: IntGauge,
    pub ready_players: IntGauge,
    pub scheduled_tasks: IntGauge,
}

/// Performance metrics
#[derive(Clone)]
pub struct PerformanceMetrics {
    /// Time spent inside the orchestrator per event
    pub event_processing_duration: HistogramVec,

    /// Time spent advancing the timeline per tick
    pub tick_duration: Histogram,
}

impl MetricsCollector {
    pub fn new() -> Result<Self> {
        let registry = Arc::new(Registry::new());
        Self::with_registry(registry)
    }

    pub fn with_registry(registry: Arc<Registry>) -> Result<Self> {
        let service_metrics = ServiceMetrics::new(&registry)?;
        let match_metrics = MatchMetrics::new(&registry)?;
        let performance_metrics = PerformanceMetrics::new(&registry)?;

        Ok(Self {
            registry,
            service_metrics,
            match_metrics,
            performance_metrics,
        })
    }

    pub fn registry(&self) -> Arc<Registry> {
        self.registry.clone()
    }

    pub fn service(&self) -> &ServiceMetrics {
        &self.service_metrics
    }

    pub fn matches(&self) -> &MatchMetrics {
        &self.match_metrics
    }

    pub fn performance(&self) -> &PerformanceMetrics {
        &self.performance_metrics
    }

    /// Bring counters up to the orchestrator's running totals and refresh
    /// the gauges from the status snapshot
    pub fn update_from_stats(&self, stats: &OrchestratorStats, status: &MatchStatus) {
        let m = &self.match_metrics;
        catch_up(&m.phase_transitions_total, stats.phase_transitions);
        catch_up(
            &m.commands_total.with_label_values(&["accepted"]),
            stats.commands_accepted,
        );
        catch_up(
            &m.commands_total.with_label_values(&["rejected"]),
            stats.commands_rejected,
        );
        catch_up(&m.map_votes_total, stats.map_votes);
        catch_up(&m.matches_started_total, stats.matches_started);
        catch_up(&m.timeouts_started_total, stats.timeouts_started);
        catch_up(&m.disconnect_repairs_total, stats.disconnect_repairs);
        catch_up(&m.resets_total, stats.resets);
        catch_up(&m.stale_tasks_skipped_total, stats.stale_tasks_skipped);

        m.phase.set(status.phase.code());
        m.connected_players.set(status.connected as i64);
        m.ready_players.set(status.ready as i64);
        m.scheduled_tasks.set(status.scheduled_tasks as i64);
    }

    pub fn record_effects(&self, effects: &[Effect]) {
        for effect in effects {
            self.match_metrics
                .effects_published_total
                .with_label_values(&[effect.kind()])
                .inc();
        }
    }

    pub fn record_event(&self, event: &str, duration: Duration) {
        self.performance_metrics
            .event_processing_duration
            .with_label_values(&[event])
            .observe(duration.as_secs_f64());
    }

    pub fn record_tick(&self, duration: Duration) {
        self.performance_metrics
            .tick_duration
            .observe(duration.as_secs_f64());
    }

    pub fn record_amqp_message(&self, message: &str, success: bool) {
        let status = if success { "success" } else { "error" };

        self.service_metrics
            .amqp_messages_total
            .with_label_values(&[message, status])
            .inc();

        if !success {
            self.service_metrics
                .amqp_errors_total
                .with_label_values(&[message])
                .inc();
        }
    }

    pub fn record_webhook_posts(&self, delivered: usize, attempted: usize) {
        self.service_metrics
            .webhook_posts_total
            .with_label_values(&["delivered"])
            .inc_by(delivered as u64);
        self.service_metrics
            .webhook_posts_total
            .with_label_values(&["failed"])
            .inc_by(attempted.saturating_sub(delivered) as u64);
    }

    pub fn update_health_status(&self, status: u8) {
        self.service_metrics.health_status.set(status as i64);
    }

    pub fn update_component_health(&self, component: &str, healthy: bool) {
        let status = if healthy { 1 } else { 0 };
        self.service_metrics
            .component_health
            .with_label_values(&[component])
            .set(status);
    }

    pub fn start_timer(&self) -> MetricsTimer {
        MetricsTimer::new()
    }
}

fn catch_up(counter: &IntCounter, total: u64) {
    let current = counter.get();
    if total > current {
        counter.inc_by(total - current);
    }
}

/// Timer for measuring operation durations
pub struct MetricsTimer {
    start: Instant,
}

impl MetricsTimer {
    fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    pub fn stop(self) -> Duration {
        self.elapsed()
    }
}

impl ServiceMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let uptime_seconds =
            IntGauge::new("mix_scrims_uptime_seconds", "Service uptime in seconds")?;
        registry.register(Box::new(uptime_seconds.clone()))?;

        let amqp_messages_total = IntCounterVec::new(
            Opts::new(
                "mix_scrims_amqp_messages_total",
                "Total AMQP messages processed",
            ),
            &["message", "status"],
        )?;
        registry.register(Box::new(amqp_messages_total.clone()))?;

        let amqp_errors_total = IntCounterVec::new(
            Opts::new("mix_scrims_amqp_errors_total", "Total AMQP errors"),
            &["message"],
        )?;
        registry.register(Box::new(amqp_errors_total.clone()))?;

        let health_status = IntGauge::new(
            "mix_scrims_health_status",
            "Health status (0=unhealthy, 1=degraded, 2=healthy)",
        )?;
        registry.register(Box::new(health_status.clone()))?;

        let component_health = IntGaugeVec::new(
            Opts::new("mix_scrims_component_health", "Component health status"),
            &["component"],
        )?;
        registry.register(Box::new(component_health.clone()))?;

        let webhook_posts_total = IntCounterVec::new(
            Opts::new("mix_scrims_webhook_posts_total", "Invite webhook posts"),
            &["outcome"],
        )?;
        registry.register(Box::new(webhook_posts_total.clone()))?;

        Ok(Self {
            uptime_seconds,
            amqp_messages_total,
            amqp_errors_total,
            health_status,
            component_health,
            webhook_posts_total,
        })
    }
}

impl MatchMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let phase = IntGauge::new("mix_scrims_phase", "Current match phase code")?;
        registry.register(Box::new(phase.clone()))?;

        let phase_transitions_total = IntCounter::new(
            "mix_scrims_phase_transitions_total",
            "Total phase transitions",
        )?;
        registry.register(Box::new(phase_transitions_total.clone()))?;

        let commands_total = IntCounterVec::new(
            Opts::new("mix_scrims_commands_total", "Commands handled"),
            &["outcome"],
        )?;
        registry.register(Box::new(commands_total.clone()))?;

        let map_votes_total =
            IntCounter::new("mix_scrims_map_votes_total", "Map votes registered")?;
        registry.register(Box::new(map_votes_total.clone()))?;

        let matches_started_total =
            IntCounter::new("mix_scrims_matches_started_total", "Matches started")?;
        registry.register(Box::new(matches_started_total.clone()))?;

        let timeouts_started_total =
            IntCounter::new("mix_scrims_timeouts_started_total", "Timeouts started")?;
        registry.register(Box::new(timeouts_started_total.clone()))?;

        let disconnect_repairs_total = IntCounter::new(
            "mix_scrims_disconnect_repairs_total",
            "Disconnects that required state repair",
        )?;
        registry.register(Box::new(disconnect_repairs_total.clone()))?;

        let resets_total = IntCounter::new("mix_scrims_resets_total", "Full match resets")?;
        registry.register(Box::new(resets_total.clone()))?;

        let stale_tasks_skipped_total = IntCounter::new(
            "mix_scrims_stale_tasks_skipped_total",
            "Scheduled tasks dropped after their scope ended",
        )?;
        registry.register(Box::new(stale_tasks_skipped_total.clone()))?;

        let effects_published_total = IntCounterVec::new(
            Opts::new("mix_scrims_effects_published_total", "Effects published"),
            &["kind"],
        )?;
        registry.register(Box::new(effects_published_total.clone()))?;

        let connected_players =
            IntGauge::new("mix_scrims_connected_players", "Connected players")?;
        registry.register(Box::new(connected_players.clone()))?;

        let ready_players = IntGauge::new("mix_scrims_ready_players", "Ready players")?;
        registry.register(Box::new(ready_players.clone()))?;

        let scheduled_tasks =
            IntGauge::new("mix_scrims_scheduled_tasks", "Pending timeline tasks")?;
        registry.register(Box::new(scheduled_tasks.clone()))?;

        Ok(Self {
            phase,
            phase_transitions_total,
            commands_total,
            map_votes_total,
            matches_started_total,
            timeouts_started_total,
            disconnect_repairs_total,
            resets_total,
            stale_tasks_skipped_total,
            effects_published_total,
            connected_players,
            ready_players,
            scheduled_tasks,
        })
    }
}

impl PerformanceMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let event_processing_duration = HistogramVec::new(
            HistogramOpts::new(
                "mix_scrims_event_processing_duration_seconds",
                "Orchestrator time per event",
            )
            .buckets(vec![0.00001, 0.0001, 0.001, 0.005, 0.01, 0.05, 0.1]),
            &["event"],
        )?;
        registry.register(Box::new(event_processing_duration.clone()))?;

        let tick_duration = Histogram::with_opts(
            HistogramOpts::new(
                "mix_scrims_tick_duration_seconds",
                "Orchestrator time per timeline tick",
            )
            .buckets(vec![0.00001, 0.0001, 0.001, 0.005, 0.01, 0.05]),
        )?;
        registry.register(Box::new(tick_duration.clone()))?;

        Ok(Self {
            event_processing_duration,
            tick_duration,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::match_flow::{MatchPhase, Notice};

    fn status(phase: MatchPhase) -> MatchStatus {
        MatchStatus {
            phase,
            map: Some("de_mirage".to_string()),
            connected: 8,
            ready: 5,
            required: 10,
            captain_ct: None,
            captain_t: None,
            roster_ct: vec![],
            roster_t: vec![],
            timeouts_ct: 3,
            timeouts_t: 3,
            scheduled_tasks: 4,
        }
    }

    #[test]
    fn test_metrics_collector_creation() {
        let collector = MetricsCollector::new().expect("Failed to create metrics collector");
        let _service = collector.service();
        let _matches = collector.matches();
        let _performance = collector.performance();
    }

    #[test]
    fn test_update_from_stats_catches_up_without_double_counting() {
        let collector = MetricsCollector::new().unwrap();
        let mut stats = OrchestratorStats {
            phase_transitions: 3,
            commands_accepted: 5,
            commands_rejected: 1,
            ..OrchestratorStats::default()
        };

        collector.update_from_stats(&stats, &status(MatchPhase::MapVoting));
        collector.update_from_stats(&stats, &status(MatchPhase::MapVoting));
        assert_eq!(collector.matches().phase_transitions_total.get(), 3);

        stats.phase_transitions = 4;
        stats.commands_rejected = 2;
        collector.update_from_stats(&stats, &status(MatchPhase::MapChosen));

        let m = collector.matches();
        assert_eq!(m.phase_transitions_total.get(), 4);
        assert_eq!(m.commands_total.with_label_values(&["accepted"]).get(), 5);
        assert_eq!(m.commands_total.with_label_values(&["rejected"]).get(), 2);
        assert_eq!(m.phase.get(), MatchPhase::MapChosen.code());
        assert_eq!(m.connected_players.get(), 8);
        assert_eq!(m.scheduled_tasks.get(), 4);
    }

    #[test]
    fn test_effects_counted_by_kind() {
        let collector = MetricsCollector::new().unwrap();
        collector.record_effects(&[
            Effect::Broadcast {
                notice: Notice::MatchEnded,
            },
            Effect::Broadcast {
                notice: Notice::HalftimeSwap,
            },
            Effect::SendInvite { missing_players: 1 },
        ]);

        let published = &collector.matches().effects_published_total;
        assert_eq!(published.with_label_values(&["broadcast"]).get(), 2);
        assert_eq!(published.with_label_values(&["send_invite"]).get(), 1);
    }

    #[test]
    fn test_health_and_timers() {
        let collector = MetricsCollector::new().unwrap();
        collector.update_health_status(2);
        collector.update_component_health("amqp", false);
        collector.record_amqp_message("command", false);
        collector.record_webhook_posts(1, 3);

        assert_eq!(collector.service().health_status.get(), 2);
        assert_eq!(
            collector
                .service()
                .webhook_posts_total
                .with_label_values(&["failed"])
                .get(),
            2
        );

        let timer = collector.start_timer();
        collector.record_tick(timer.stop());
        collector.record_event("round_start", Duration::from_micros(40));
        assert_eq!(collector.performance().tick_duration.get_sample_count(), 1);
    }
}

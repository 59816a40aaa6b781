//! Main application state and service coordination
//!
//! The orchestrator sits behind one async mutex. Bridge deliveries and timeline
//! ticks both take that lock, run synchronously, and hand the resulting effects
//! to the [`EffectRouter`] after the lock is released.

use crate::amqp::connection::{AmqpConfig, AmqpConnection};
use crate::amqp::handlers::{BridgeConsumer, BridgeMessageHandler};
use crate::amqp::messages::BridgeMessage;
use crate::amqp::publisher::{
    AmqpEffectPublisher, EffectPublisher, MockEffectPublisher, PublisherConfig,
};
use crate::config::AppConfig;
use crate::error::{Result as ServiceResult, ServiceError};
use crate::match_flow::{Effect, MatchEvent, MatchOrchestrator};
use crate::metrics::{HealthServer, HealthServerConfig, MetricsCollector, MetricsService};
use crate::notify::InviteNotifier;
use crate::players::InMemoryPlayerDirectory;
use crate::service::health::{HealthCheck, HealthTarget, SharedOrchestrator};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::Duration;
use tracing::{debug, error, info, warn};

/// Carries effects out of the process
pub struct EffectRouter {
    publisher: Arc<dyn EffectPublisher>,
    notifier: Option<Arc<InviteNotifier>>,
    metrics: Arc<MetricsCollector>,
}

impl EffectRouter {
    pub fn new(
        publisher: Arc<dyn EffectPublisher>,
        notifier: Option<Arc<InviteNotifier>>,
        metrics: Arc<MetricsCollector>,
    ) -> Self {
        Self {
            publisher,
            notifier,
            metrics,
        }
    }

    /// Publish a batch in order. Invite requests additionally fire the
    /// webhooks in the background. Delivery failures are logged only.
    pub async fn dispatch(&self, effects: Vec<Effect>) {
        if effects.is_empty() {
            return;
        }
        self.metrics.record_effects(&effects);

        for effect in &effects {
            if let Effect::SendInvite { missing_players } = effect {
                self.spawn_invite(*missing_players);
            }
        }

        if let Err(e) = self.publisher.publish_effects(&effects).await {
            error!("Failed to publish {} effects: {}", effects.len(), e);
        }
    }

    fn spawn_invite(&self, missing_players: usize) {
        let Some(notifier) = self.notifier.clone() else {
            warn!("Invite requested but the notifier is disabled");
            return;
        };
        let metrics = self.metrics.clone();
        tokio::spawn(async move {
            let delivered = notifier.notify(missing_players).await;
            metrics.record_webhook_posts(delivered, notifier.webhook_count());
        });
    }
}

/// Feeds bridge messages into the orchestrator
pub struct MatchBridge {
    orchestrator: SharedOrchestrator,
    directory: Arc<InMemoryPlayerDirectory>,
    router: Arc<EffectRouter>,
    metrics: Arc<MetricsCollector>,
}

impl MatchBridge {
    pub fn new(
        orchestrator: SharedOrchestrator,
        directory: Arc<InMemoryPlayerDirectory>,
        router: Arc<EffectRouter>,
        metrics: Arc<MetricsCollector>,
    ) -> Self {
        Self {
            orchestrator,
            directory,
            router,
            metrics,
        }
    }

    /// Mirror presence into the directory, then translate to a match event
    fn mirror(&self, message: BridgeMessage) -> Option<MatchEvent> {
        match message {
            BridgeMessage::PlayerConnected { player } => {
                let id = player.id;
                self.directory.connect(player);
                Some(MatchEvent::PlayerConnected { player: id })
            }
            BridgeMessage::PlayerDisconnected { player_id, name } => {
                if self.directory.disconnect(player_id).is_none() {
                    debug!("Disconnect for unknown player {}", player_id);
                }
                Some(MatchEvent::PlayerDisconnected {
                    player: player_id,
                    name,
                })
            }
            BridgeMessage::PlayerTeamChanged { player_id, team } => {
                if !self.directory.set_team(player_id, team) {
                    debug!("Team change for unknown player {}", player_id);
                }
                None
            }
            BridgeMessage::Game { event } => Some(event),
        }
    }
}

#[async_trait]
impl BridgeMessageHandler for MatchBridge {
    async fn handle_message(&self, message: BridgeMessage) -> ServiceResult<()> {
        let name = message.name();
        let Some(event) = self.mirror(message) else {
            self.metrics.record_amqp_message(name, true);
            return Ok(());
        };

        let timer = self.metrics.start_timer();
        let effects = {
            let mut orchestrator = self.orchestrator.lock().await;
            let effects = orchestrator.handle(event);
            self.metrics
                .update_from_stats(orchestrator.stats(), &orchestrator.status());
            effects
        };
        self.metrics.record_event(name, timer.stop());
        self.metrics.record_amqp_message(name, true);

        self.router.dispatch(effects).await;
        Ok(())
    }

    async fn handle_error(&self, error: anyhow::Error, message_data: &[u8]) {
        self.metrics.record_amqp_message("invalid", false);
        error!(
            "Bridge message rejected - error: '{}', message_size: {} bytes",
            error,
            message_data.len()
        );

        if !message_data.is_empty() {
            let preview_len = std::cmp::min(100, message_data.len());
            let preview = String::from_utf8_lossy(&message_data[..preview_len]);
            error!("Message preview: {:?}", preview);
        }
    }
}

/// Main application state containing all service components
pub struct AppState {
    config: AppConfig,
    orchestrator: SharedOrchestrator,
    directory: Arc<InMemoryPlayerDirectory>,
    /// `None` when running without a broker
    amqp_connection: Option<Arc<AmqpConnection>>,
    router: Arc<EffectRouter>,
    metrics_service: Arc<MetricsService>,
    background_tasks: Vec<JoinHandle<()>>,
    consumer: Option<BridgeConsumer>,
    is_running: Arc<RwLock<bool>>,
    started_at: Instant,
}

impl AppState {
    /// Connect to the broker and build every component
    pub async fn new(config: AppConfig) -> Result<Self, ServiceError> {
        info!("Initializing mix-scrims match orchestrator");
        info!(
            "Configuration: service={}, amqp_url={}, maps={}",
            config.service.name,
            config.amqp.url,
            config.maps.len()
        );

        let amqp_connection = Self::initialize_amqp(&config).await?;
        let channel =
            amqp_connection
                .open_channel()
                .await
                .map_err(|e| ServiceError::Initialization {
                    message: format!("Failed to open publisher channel: {}", e),
                })?;
        let publisher = AmqpEffectPublisher::new(channel, PublisherConfig::from(&config.amqp))
            .await
            .map_err(|e| ServiceError::Initialization {
                message: format!("Failed to initialize effect publisher: {}", e),
            })?;

        Self::assemble(config, Arc::new(publisher), Some(amqp_connection))
    }

    /// Build without a broker; effects are only recorded
    pub fn without_broker(
        config: AppConfig,
        publisher: Arc<MockEffectPublisher>,
    ) -> Result<Self, ServiceError> {
        info!("Initializing mix-scrims without an AMQP broker");
        Self::assemble(config, publisher, None)
    }

    fn assemble(
        config: AppConfig,
        publisher: Arc<dyn EffectPublisher>,
        amqp_connection: Option<Arc<AmqpConnection>>,
    ) -> Result<Self, ServiceError> {
        let collector =
            Arc::new(
                MetricsCollector::new().map_err(|e| ServiceError::Initialization {
                    message: format!("Failed to create metrics collector: {}", e),
                })?,
            );

        let notifier = if config.invite.webhooks.is_empty() {
            info!("No invite webhooks configured");
            None
        } else {
            let notifier = InviteNotifier::from_settings(&config.invite).map_err(|e| {
                ServiceError::Initialization {
                    message: format!("Failed to create invite notifier: {}", e),
                }
            })?;
            Some(Arc::new(notifier))
        };

        let directory = Arc::new(InMemoryPlayerDirectory::new());
        let orchestrator = Arc::new(Mutex::new(MatchOrchestrator::new(
            &config,
            directory.clone(),
        )));
        let router = Arc::new(EffectRouter::new(publisher, notifier, collector.clone()));
        let is_running = Arc::new(RwLock::new(false));
        let started_at = Instant::now();

        let target = HealthTarget {
            service_name: config.service.name.clone(),
            orchestrator: orchestrator.clone(),
            running: is_running.clone(),
            amqp: amqp_connection.clone(),
            started_at,
        };
        let health_server = HealthServer::new(
            HealthServerConfig {
                port: config.service.metrics_port,
                host: "0.0.0.0".to_string(),
            },
            collector.clone(),
        )
        .with_target(target);
        let metrics_service = Arc::new(MetricsService::new(collector, Arc::new(health_server)));

        Ok(Self {
            config,
            orchestrator,
            directory,
            amqp_connection,
            router,
            metrics_service,
            background_tasks: Vec::new(),
            consumer: None,
            is_running,
            started_at,
        })
    }

    /// Start the health endpoints, the consumer and the timeline ticker
    pub async fn start(&mut self) -> Result<(), ServiceError> {
        info!("Starting mix-scrims service");

        *self.is_running.write().await = true;

        self.start_metrics_service().await?;
        if self.amqp_connection.is_some() {
            self.start_amqp_consumption().await?;
        }
        self.start_background_tasks();

        info!("✅ Mix-scrims service started successfully");
        Ok(())
    }

    pub async fn shutdown(&mut self) -> Result<(), ServiceError> {
        info!("Starting graceful shutdown of mix-scrims service");

        *self.is_running.write().await = false;

        if let Some(consumer) = &self.consumer {
            if let Err(e) = consumer.stop_consuming().await {
                warn!("Failed to stop AMQP consumer: {}", e);
            } else {
                info!("✅ AMQP message consumption stopped");
            }
        }

        self.stop_background_tasks().await;

        if let Err(e) = self.metrics_service.stop().await {
            warn!("Failed to stop metrics service: {}", e);
        } else {
            info!("✅ Metrics service stopped");
        }

        let final_stats = self.orchestrator.lock().await.stats().clone();
        info!("Final orchestrator statistics: {:?}", final_stats);

        if let Some(connection) = self.amqp_connection.take() {
            match Arc::try_unwrap(connection) {
                Ok(connection) => {
                    if let Err(e) = connection.close().await {
                        warn!("Failed to close AMQP connection: {}", e);
                    }
                }
                Err(_) => debug!("AMQP connection still shared, leaving it to drop"),
            }
        }

        info!("✅ Mix-scrims service shutdown completed");
        Ok(())
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub async fn is_running(&self) -> bool {
        *self.is_running.read().await
    }

    pub fn orchestrator(&self) -> SharedOrchestrator {
        self.orchestrator.clone()
    }

    pub fn directory(&self) -> Arc<InMemoryPlayerDirectory> {
        self.directory.clone()
    }

    pub fn metrics_service(&self) -> Arc<MetricsService> {
        self.metrics_service.clone()
    }

    /// The handler the AMQP consumer feeds; also usable without a broker
    pub fn bridge(&self) -> MatchBridge {
        MatchBridge::new(
            self.orchestrator.clone(),
            self.directory.clone(),
            self.router.clone(),
            self.metrics_service.collector(),
        )
    }

    pub fn health_target(&self) -> HealthTarget {
        HealthTarget {
            service_name: self.config.service.name.clone(),
            orchestrator: self.orchestrator.clone(),
            running: self.is_running.clone(),
            amqp: self.amqp_connection.clone(),
            started_at: self.started_at,
        }
    }

    async fn initialize_amqp(config: &AppConfig) -> Result<Arc<AmqpConnection>, ServiceError> {
        info!("Connecting to AMQP broker: {}", config.amqp.url);

        let amqp_config =
            AmqpConfig::from_settings(&config.amqp).map_err(|e| ServiceError::AmqpConnection {
                message: format!("Failed to parse AMQP URL: {}", e),
            })?;

        let connect = AmqpConnection::new(amqp_config);
        let connection = tokio::time::timeout(config.amqp_connection_timeout(), connect)
            .await
            .map_err(|_| ServiceError::AmqpConnection {
                message: format!(
                    "Timed out after {:?} connecting to AMQP",
                    config.amqp_connection_timeout()
                ),
            })?
            .map_err(|e| ServiceError::AmqpConnection {
                message: format!("Failed to connect to AMQP: {}", e),
            })?;

        Ok(Arc::new(connection))
    }

    async fn start_metrics_service(&mut self) -> Result<(), ServiceError> {
        let metrics_service = self.metrics_service.clone();
        let port = self.config.service.metrics_port;

        let metrics_handle = tokio::spawn(async move {
            if let Err(e) = metrics_service.start().await {
                error!("Metrics service failed: {}", e);
            } else {
                info!("Metrics service task completed");
            }
        });
        self.background_tasks.push(metrics_handle);

        tokio::time::sleep(std::time::Duration::from_millis(100)).await;

        info!("✅ Metrics service started on port {}", port);
        Ok(())
    }

    async fn start_amqp_consumption(&mut self) -> Result<(), ServiceError> {
        let Some(connection) = &self.amqp_connection else {
            return Ok(());
        };
        let queue = self.config.amqp.events_queue.clone();

        let channel = connection
            .open_channel()
            .await
            .map_err(|e| ServiceError::AmqpConnection {
                message: format!("Failed to open consumer channel: {}", e),
            })?;

        let queue_declare_args = amqprs::channel::QueueDeclareArguments::new(&queue)
            .durable(true)
            .auto_delete(false)
            .finish();

        channel
            .queue_declare(queue_declare_args)
            .await
            .map_err(|e| ServiceError::AmqpConnection {
                message: format!("Failed to declare queue {}: {}", queue, e),
            })?;
        info!("Queue '{}' declared", queue);

        let consumer = BridgeConsumer::new(Arc::new(self.bridge()), channel);
        consumer
            .start_consuming(&queue)
            .await
            .map_err(|e| ServiceError::AmqpConnection {
                message: format!("Failed to start consuming messages: {}", e),
            })?;

        self.consumer = Some(consumer);
        info!("Listening for bridge events on '{}'", queue);
        Ok(())
    }

    fn start_background_tasks(&mut self) {
        let tick_task = {
            let orchestrator = self.orchestrator.clone();
            let router = self.router.clone();
            let metrics = self.metrics_service.collector();
            let is_running = self.is_running.clone();
            let tick_interval = self.config.tick_interval();

            tokio::spawn(async move {
                let mut interval = tokio::time::interval(tick_interval);
                interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
                let mut last_tick = tokio::time::Instant::now();
                info!("Timeline ticker started ({:?} interval)", tick_interval);

                while *is_running.read().await {
                    interval.tick().await;
                    let now = tokio::time::Instant::now();
                    let elapsed = now.duration_since(last_tick);
                    last_tick = now;

                    let timer = metrics.start_timer();
                    let effects = {
                        let mut orchestrator = orchestrator.lock().await;
                        let effects = orchestrator.advance(elapsed);
                        metrics.update_from_stats(orchestrator.stats(), &orchestrator.status());
                        effects
                    };
                    metrics.record_tick(timer.stop());

                    router.dispatch(effects).await;
                }

                info!("Timeline ticker stopped");
            })
        };

        let health_metrics_task = {
            let metrics = self.metrics_service.collector();
            let target = self.health_target();

            tokio::spawn(async move {
                let mut interval = tokio::time::interval(Duration::from_secs(15));

                while target.is_running().await {
                    interval.tick().await;

                    metrics
                        .service()
                        .uptime_seconds
                        .set(target.uptime_seconds() as i64);

                    match HealthCheck::check(&target).await {
                        Ok(health) => {
                            metrics.update_health_status(health.status.code());
                            for check in &health.checks {
                                metrics.update_component_health(
                                    &check.name,
                                    check.status.code() > 0,
                                );
                            }
                        }
                        Err(e) => warn!("Health check failed: {}", e),
                    }
                }

                info!("Health metrics task stopped");
            })
        };

        self.background_tasks.push(tick_task);
        self.background_tasks.push(health_metrics_task);
        info!("Background tasks started");
    }

    async fn stop_background_tasks(&mut self) {
        let task_count = self.background_tasks.len();
        if task_count == 0 {
            return;
        }

        for (i, task) in self.background_tasks.drain(..).enumerate() {
            debug!("Aborting background task {}/{}", i + 1, task_count);
            task.abort();
        }

        tokio::time::sleep(std::time::Duration::from_millis(200)).await;
        info!("✅ All {} background tasks stopped", task_count);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::match_flow::{MatchPhase, Notice};
    use crate::players::PlayerDirectory;
    use crate::types::{Issuer, PlayerInfo, Team};

    fn offline_state() -> (AppState, Arc<MockEffectPublisher>) {
        let mut config = AppConfig::with_defaults();
        config.service.rng_seed = Some(4);
        config.mix.minimum_ready_players = 2;
        let publisher = Arc::new(MockEffectPublisher::new());
        let state = AppState::without_broker(config, publisher.clone()).unwrap();
        (state, publisher)
    }

    #[tokio::test]
    async fn test_bridge_mirrors_presence_and_publishes() {
        let (state, publisher) = offline_state();
        let bridge = state.bridge();

        bridge
            .handle_message(BridgeMessage::PlayerConnected {
                player: PlayerInfo::human(1, "Alice", Team::CT),
            })
            .await
            .unwrap();
        assert!(state.directory().is_connected(1));

        bridge
            .handle_message(BridgeMessage::Game {
                event: MatchEvent::Command {
                    issuer: Issuer::player(1),
                    line: "!ready".to_string(),
                },
            })
            .await
            .unwrap();

        let published = publisher.published();
        assert!(published.iter().any(|effect| matches!(
            effect,
            Effect::Broadcast {
                notice: Notice::PlayerReady { ready: 1, required: 2, .. }
            }
        )));

        let collector = state.metrics_service().collector();
        assert_eq!(
            collector
                .matches()
                .commands_total
                .with_label_values(&["accepted"])
                .get(),
            1
        );
    }

    #[tokio::test]
    async fn test_team_change_only_touches_directory() {
        let (state, publisher) = offline_state();
        let bridge = state.bridge();

        bridge
            .handle_message(BridgeMessage::PlayerConnected {
                player: PlayerInfo::human(2, "Bob", Team::Spectator),
            })
            .await
            .unwrap();
        publisher.clear();

        bridge
            .handle_message(BridgeMessage::PlayerTeamChanged {
                player_id: 2,
                team: Team::T,
            })
            .await
            .unwrap();

        assert_eq!(state.directory().player(2).unwrap().team, Team::T);
        assert!(publisher.published().is_empty());
        assert_eq!(state.orchestrator().lock().await.phase(), MatchPhase::Warmup);
    }

    #[tokio::test]
    async fn test_router_counts_effects() {
        let publisher = Arc::new(MockEffectPublisher::new());
        let metrics = Arc::new(MetricsCollector::new().unwrap());
        let router = EffectRouter::new(publisher.clone(), None, metrics.clone());

        router.dispatch(Vec::new()).await;
        router
            .dispatch(vec![Effect::Broadcast {
                notice: Notice::MatchEnded,
            }])
            .await;

        assert_eq!(publisher.published_kinds(), vec!["broadcast"]);
        assert_eq!(
            metrics
                .matches()
                .effects_published_total
                .with_label_values(&["broadcast"])
                .get(),
            1
        );
    }
}

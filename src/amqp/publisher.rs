//! AMQP publisher for outbound effects

use crate::amqp::messages::{MessageEnvelope, MessageUtils};
use crate::config::AmqpSettings;
use crate::error::{Result, ServiceError};
use crate::match_flow::Effect;
use amqprs::{
    channel::{BasicPublishArguments, Channel, ExchangeDeclareArguments},
    BasicProperties,
};
use async_trait::async_trait;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

/// Forwards orchestrator effects to whatever executes them
#[async_trait]
pub trait EffectPublisher: Send + Sync {
    /// Publish a batch in emission order. Stops at the first failure.
    async fn publish_effects(&self, effects: &[Effect]) -> Result<()>;
}

/// Configuration for effect publishing
#[derive(Debug, Clone)]
pub struct PublisherConfig {
    pub exchange: String,
    pub max_retries: u32,
    pub retry_delay_ms: u64,
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            exchange: crate::amqp::messages::EFFECTS_EXCHANGE.to_string(),
            max_retries: 3,
            retry_delay_ms: 500,
        }
    }
}

impl From<&AmqpSettings> for PublisherConfig {
    fn from(settings: &AmqpSettings) -> Self {
        Self {
            exchange: settings.effects_exchange.clone(),
            max_retries: settings.max_retry_attempts,
            retry_delay_ms: settings.retry_delay_ms,
        }
    }
}

/// Publishes each effect to a topic exchange under `effect.<kind>`
pub struct AmqpEffectPublisher {
    channel: Channel,
    config: PublisherConfig,
}

impl AmqpEffectPublisher {
    pub async fn new(channel: Channel, config: PublisherConfig) -> Result<Self> {
        let publisher = Self { channel, config };
        publisher.setup_exchange().await?;
        Ok(publisher)
    }

    async fn setup_exchange(&self) -> Result<()> {
        let mut args = ExchangeDeclareArguments::new(&self.config.exchange, "topic");
        args.durable(true);
        self.channel
            .exchange_declare(args)
            .await
            .map_err(|e| ServiceError::AmqpConnection {
                message: format!(
                    "Failed to declare effects exchange {}: {}",
                    self.config.exchange, e
                ),
            })?;

        info!("Declared effects exchange {}", self.config.exchange);
        Ok(())
    }

    /// Publish one envelope with retry and exponential backoff
    async fn publish_with_retry(&self, envelope: &MessageEnvelope<Effect>) -> Result<()> {
        let mut retry_count = 0;
        let mut delay = Duration::from_millis(self.config.retry_delay_ms);

        loop {
            match self.try_publish(envelope).await {
                Ok(_) => {
                    debug!(
                        "Published {} as {}",
                        envelope.routing_key, envelope.correlation_id
                    );
                    return Ok(());
                }
                Err(e) => {
                    retry_count += 1;
                    if retry_count > self.config.max_retries {
                        error!(
                            "Failed to publish {} after {} retries: {}",
                            envelope.routing_key, self.config.max_retries, e
                        );
                        return Err(e);
                    }

                    warn!(
                        "Publish attempt {} failed for {}: {}. Retrying in {:?}",
                        retry_count, envelope.routing_key, e, delay
                    );

                    sleep(delay).await;
                    delay = Duration::from_millis((delay.as_millis() as u64 * 2).min(5000));
                }
            }
        }
    }

    async fn try_publish(&self, envelope: &MessageEnvelope<Effect>) -> Result<()> {
        let payload = envelope.to_bytes()?;

        let args = BasicPublishArguments::new(&self.config.exchange, &envelope.routing_key);
        let mut properties = BasicProperties::default();
        properties
            .with_message_id(&envelope.correlation_id)
            .with_timestamp(envelope.timestamp.timestamp() as u64)
            .with_content_type("application/json");

        self.channel
            .basic_publish(properties, payload, args)
            .await
            .map_err(|e| ServiceError::AmqpConnection {
                message: format!("Failed to publish message: {}", e),
            })?;

        Ok(())
    }
}

#[async_trait]
impl EffectPublisher for AmqpEffectPublisher {
    async fn publish_effects(&self, effects: &[Effect]) -> Result<()> {
        for effect in effects {
            let envelope =
                MessageEnvelope::new(effect.clone(), MessageUtils::effect_routing_key(effect));
            self.publish_with_retry(&envelope).await?;
        }
        Ok(())
    }
}

/// Publisher that only records what it was given. Used by `--dry-run`,
/// the simulator and tests.
#[derive(Debug, Default)]
pub struct MockEffectPublisher {
    published: std::sync::Mutex<Vec<Effect>>,
}

impl MockEffectPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn published(&self) -> Vec<Effect> {
        self.published
            .lock()
            .map(|effects| effects.clone())
            .unwrap_or_default()
    }

    /// Routing kinds in publish order
    pub fn published_kinds(&self) -> Vec<&'static str> {
        self.published
            .lock()
            .map(|effects| effects.iter().map(Effect::kind).collect())
            .unwrap_or_default()
    }

    pub fn clear(&self) {
        if let Ok(mut effects) = self.published.lock() {
            effects.clear();
        }
    }
}

#[async_trait]
impl EffectPublisher for MockEffectPublisher {
    async fn publish_effects(&self, effects: &[Effect]) -> Result<()> {
        if let Ok(mut published) = self.published.lock() {
            published.extend_from_slice(effects);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::match_flow::{EngineCommand, Notice};
    use crate::types::Team;

    #[test]
    fn test_publisher_config_from_settings() {
        let settings = AmqpSettings {
            effects_exchange: "scrims.fx".to_string(),
            max_retry_attempts: 7,
            ..AmqpSettings::default()
        };
        let config = PublisherConfig::from(&settings);
        assert_eq!(config.exchange, "scrims.fx");
        assert_eq!(config.max_retries, 7);
        assert_eq!(PublisherConfig::default().exchange, "mix.effects");
    }

    #[tokio::test]
    async fn test_mock_publisher_keeps_order() {
        let publisher = MockEffectPublisher::new();
        let batch = vec![
            Effect::Engine {
                command: EngineCommand::PauseMatch,
            },
            Effect::TellTeam {
                team: Team::CT,
                notice: Notice::TimeoutVotePassed { team: Team::CT },
            },
        ];
        publisher.publish_effects(&batch).await.unwrap();
        publisher
            .publish_effects(&[Effect::SendInvite { missing_players: 3 }])
            .await
            .unwrap();

        assert_eq!(
            publisher.published_kinds(),
            vec!["engine", "tell_team", "send_invite"]
        );
        assert_eq!(publisher.published()[0], batch[0]);

        publisher.clear();
        assert!(publisher.published().is_empty());
    }
}

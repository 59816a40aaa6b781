//! AMQP consumer for the game-server bridge
//!
//! Deliveries are decoded into [`BridgeMessage`]s and handed to a
//! [`BridgeMessageHandler`] one at a time, so events reach the orchestrator
//! strictly in arrival order. Every delivery is acked once handled; a message
//! that cannot be decoded will never succeed and is dropped after logging.

use crate::amqp::messages::{BridgeMessage, MessageUtils};
use crate::error::{Result, ServiceError};
use amqprs::{
    channel::{BasicAckArguments, BasicCancelArguments, BasicConsumeArguments, Channel},
    consumer::AsyncConsumer,
    BasicProperties, Deliver,
};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Receives decoded bridge messages
#[async_trait]
pub trait BridgeMessageHandler: Send + Sync {
    async fn handle_message(&self, message: BridgeMessage) -> Result<()>;

    /// Called when decoding or handling failed
    async fn handle_error(&self, error: anyhow::Error, message_data: &[u8]);
}

/// Consumer bound to the bridge events queue
pub struct BridgeConsumer {
    handler: Arc<dyn BridgeMessageHandler>,
    channel: Channel,
    consumer_tag: String,
}

impl BridgeConsumer {
    pub fn new(handler: Arc<dyn BridgeMessageHandler>, channel: Channel) -> Self {
        let consumer_tag = format!(
            "mix-consumer-{}",
            crate::utils::generate_correlation_id()
        );

        Self {
            handler,
            channel,
            consumer_tag,
        }
    }

    pub fn consumer_tag(&self) -> &str {
        &self.consumer_tag
    }

    pub async fn start_consuming(&self, queue_name: &str) -> Result<()> {
        let args = BasicConsumeArguments::new(queue_name, &self.consumer_tag);

        self.channel
            .basic_consume(DeliveryConsumer::new(self.handler.clone()), args)
            .await
            .map_err(|e| ServiceError::AmqpConnection {
                message: format!("Failed to start consuming: {}", e),
            })?;

        info!("Started consuming bridge events from queue: {}", queue_name);
        Ok(())
    }

    pub async fn stop_consuming(&self) -> Result<()> {
        let args = BasicCancelArguments::new(&self.consumer_tag);

        self.channel
            .basic_cancel(args)
            .await
            .map_err(|e| ServiceError::AmqpConnection {
                message: format!("Failed to stop consuming: {}", e),
            })?;

        info!("Stopped consuming bridge events");
        Ok(())
    }
}

struct DeliveryConsumer {
    handler: Arc<dyn BridgeMessageHandler>,
}

impl DeliveryConsumer {
    fn new(handler: Arc<dyn BridgeMessageHandler>) -> Self {
        Self { handler }
    }
}

#[async_trait]
impl AsyncConsumer for DeliveryConsumer {
    async fn consume(
        &mut self,
        channel: &Channel,
        deliver: Deliver,
        _basic_properties: BasicProperties,
        content: Vec<u8>,
    ) {
        let delivery_tag = deliver.delivery_tag();
        debug!(
            "AMQP message received - delivery_tag: {}, routing_key: '{}', size: {} bytes",
            delivery_tag,
            deliver.routing_key(),
            content.len()
        );

        let start_time = std::time::Instant::now();

        match process_delivery(self.handler.as_ref(), &content).await {
            Ok(name) => {
                debug!(
                    "Bridge message '{}' processed - delivery_tag: {}, processing_time: {:.2}ms",
                    name,
                    delivery_tag,
                    start_time.elapsed().as_secs_f64() * 1000.0
                );
            }
            Err(e) => {
                error!(
                    "Bridge message failed - delivery_tag: {}, processing_time: {:.2}ms, error: {}",
                    delivery_tag,
                    start_time.elapsed().as_secs_f64() * 1000.0,
                    e
                );
                self.handler.handle_error(e, &content).await;
            }
        }

        if let Err(e) = channel
            .basic_ack(BasicAckArguments::new(delivery_tag, false))
            .await
        {
            warn!("Failed to ack delivery {}: {}", delivery_tag, e);
        }
    }
}

/// Decode and dispatch one delivery, returning the message name
pub async fn process_delivery(
    handler: &dyn BridgeMessageHandler,
    content: &[u8],
) -> Result<&'static str> {
    let envelope = MessageUtils::decode_bridge_message(content)?;
    let name = envelope.payload.name();
    debug!(
        "Bridge message '{}' correlation_id={}",
        name, envelope.correlation_id
    );
    handler.handle_message(envelope.payload).await?;
    Ok(name)
}

/// Handler that records what it receives, for tests
pub struct MockBridgeHandler {
    pub received: Arc<tokio::sync::Mutex<Vec<BridgeMessage>>>,
    pub errors: Arc<tokio::sync::Mutex<Vec<String>>>,
}

impl Default for MockBridgeHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl MockBridgeHandler {
    pub fn new() -> Self {
        Self {
            received: Arc::new(tokio::sync::Mutex::new(Vec::new())),
            errors: Arc::new(tokio::sync::Mutex::new(Vec::new())),
        }
    }
}

#[async_trait]
impl BridgeMessageHandler for MockBridgeHandler {
    async fn handle_message(&self, message: BridgeMessage) -> Result<()> {
        self.received.lock().await.push(message);
        Ok(())
    }

    async fn handle_error(&self, error: anyhow::Error, _message_data: &[u8]) {
        self.errors.lock().await.push(error.to_string());
    }
}

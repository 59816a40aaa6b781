//! AMQP integration for the match orchestrator
//!
//! Bridge events come in on a queue, effects go out on a topic exchange.

pub mod connection;
pub mod handlers;
pub mod messages;
pub mod publisher;

pub use connection::{AmqpConfig, AmqpConnection};
pub use handlers::{BridgeConsumer, BridgeMessageHandler};
pub use messages::*;
pub use publisher::{AmqpEffectPublisher, EffectPublisher, MockEffectPublisher, PublisherConfig};

//! Outbound notifications that leave the AMQP bus

pub mod webhook;

pub use webhook::{InviteNotifier, ReqwestTransport, WebhookTransport};

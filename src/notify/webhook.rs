//! Invite webhooks

use crate::config::InviteSettings;
use crate::error::{Result, ServiceError};
use crate::utils::format_invite_message;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// HTTP seam for webhook delivery
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait WebhookTransport: Send + Sync {
    /// POST a JSON body. Non-success statuses are errors.
    async fn post_json(&self, url: &str, body: Value) -> Result<()>;
}

/// reqwest-backed transport
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ServiceError::Initialization {
                message: format!("Failed to create HTTP client: {}", e),
            })?;
        Ok(Self { client })
    }
}

#[async_trait]
impl WebhookTransport for ReqwestTransport {
    async fn post_json(&self, url: &str, body: Value) -> Result<()> {
        let response = self
            .client
            .post(url)
            .json(&body)
            .send()
            .await
            .map_err(|e| ServiceError::WebhookDelivery {
                message: format!("Failed to reach {}: {}", url, e),
            })?;

        if !response.status().is_success() {
            return Err(ServiceError::WebhookDelivery {
                message: format!("{} answered {}", url, response.status()),
            }
            .into());
        }
        Ok(())
    }
}

/// Posts the invite text to every configured webhook
pub struct InviteNotifier {
    transport: Arc<dyn WebhookTransport>,
    settings: InviteSettings,
}

impl InviteNotifier {
    pub fn new(transport: Arc<dyn WebhookTransport>, settings: InviteSettings) -> Self {
        Self {
            transport,
            settings,
        }
    }

    /// Build the production notifier from settings
    pub fn from_settings(settings: &InviteSettings) -> Result<Self> {
        let transport = ReqwestTransport::new(Duration::from_secs(
            settings.request_timeout_seconds.max(1),
        ))?;
        Ok(Self::new(Arc::new(transport), settings.clone()))
    }

    pub fn webhook_count(&self) -> usize {
        self.settings.webhooks.len()
    }

    /// Deliver the invite. Failures are logged, never returned; the result
    /// is the number of webhooks that accepted the post.
    pub async fn notify(&self, missing_players: usize) -> usize {
        if self.settings.webhooks.is_empty() {
            warn!("Invite requested but no webhooks are configured");
            return 0;
        }

        let mut delivered = 0;
        for webhook in &self.settings.webhooks {
            let content = format_invite_message(
                &webhook.message,
                missing_players,
                &self.settings.server_address,
            );
            match self
                .transport
                .post_json(&webhook.url, json!({ "content": content }))
                .await
            {
                Ok(()) => delivered += 1,
                Err(e) => error!("Invite webhook delivery failed: {}", e),
            }
        }

        info!(
            "Invite for {} missing players delivered to {}/{} webhooks",
            missing_players,
            delivered,
            self.settings.webhooks.len()
        );
        delivered
    }
}

//! Client for the outbound notification (email) service.
//!
//! Notifications are best-effort. Failures are logged by the hook that calls [`Notifier::send`] and never reach the
//! request that triggered them.
use std::time::Duration;

use dispatch_engine::events::NotificationRequest;
use log::*;
use thiserror::Error;

use crate::config::NotifierConfig;

const NOTIFIER_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum NotifierError {
    #[error("Could not reach the notification service. {0}")]
    Transport(#[from] reqwest::Error),
    #[error("The notification service rejected the request with status {0}")]
    Rejected(u16),
}

#[derive(Clone, Debug)]
pub struct Notifier {
    client: reqwest::Client,
    config: NotifierConfig,
}

impl Notifier {
    pub fn new(config: NotifierConfig) -> Self {
        let client = reqwest::Client::builder().timeout(NOTIFIER_TIMEOUT).build().unwrap_or_else(|e| {
            warn!("📬️ Could not configure the notification client. Using the defaults. {e}");
            reqwest::Client::new()
        });
        Self { client, config }
    }

    pub fn is_enabled(&self) -> bool {
        self.config.url.is_some()
    }

    /// POSTs the request as JSON. Without a configured URL the request is only logged.
    pub async fn send(&self, request: &NotificationRequest) -> Result<(), NotifierError> {
        let Some(url) = &self.config.url else {
            info!("📬️ [not sent] {:?} to {}: {}", request.template, request.receiver, request.subject);
            return Ok(());
        };
        let mut builder = self.client.post(url).json(request);
        if !self.config.api_key.is_empty() {
            builder = builder.bearer_auth(self.config.api_key.reveal());
        }
        let response = builder.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(NotifierError::Rejected(status.as_u16()));
        }
        debug!("📬️ {:?} notification delivered to {}", request.template, request.receiver);
        Ok(())
    }
}

//! Delivery of challenge and temporary tokens.
//!
//! The protocol only knows the [`Notifier`] trait. Which channel carries the
//! token (mail, chat, webhook) is decided by whoever builds the protocol.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::info;

#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver a confirmation challenge for a new or unconfirmed account.
    async fn send_challenge(&self, realm: &str, user_id: &str, challenge: &str) -> Result<()>;

    /// Deliver a temporary token that can be exchanged for a bearer token.
    async fn send_token(&self, realm: &str, user_id: &str, token: &str) -> Result<()>;
}

/// What a notification carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Challenge,
    Token,
}

/// One delivered (or to be delivered) notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub kind: NotificationKind,
    pub realm: String,
    pub user_id: String,
    pub token: String,
    /// Confirmation link, only set for challenges.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
}

fn challenge_link(endpoint: &str, challenge: &str) -> String {
    format!("{}/login/{}", endpoint.trim_end_matches('/'), challenge)
}

/// Writes notifications to the log. Used by the CLI and local setups.
pub struct LogNotifier {
    endpoint: String,
}

impl LogNotifier {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl Notifier for LogNotifier {
    async fn send_challenge(&self, realm: &str, user_id: &str, challenge: &str) -> Result<()> {
        info!(
            "Challenge for {}/{}: {}",
            realm,
            user_id,
            challenge_link(&self.endpoint, challenge)
        );
        Ok(())
    }

    async fn send_token(&self, realm: &str, user_id: &str, token: &str) -> Result<()> {
        info!("Temporary token for {}/{}: {}", realm, user_id, token);
        Ok(())
    }
}

/// Posts each notification as JSON to a webhook.
pub struct WebhookNotifier {
    url: String,
    endpoint: String,
    client: reqwest::Client,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>, endpoint: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .user_agent(concat!("realm-auth/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            url: url.into(),
            endpoint: endpoint.into(),
            client,
        })
    }

    async fn post(&self, notification: &Notification) -> Result<()> {
        let response = self
            .client
            .post(&self.url)
            .json(notification)
            .send()
            .await
            .with_context(|| format!("Failed to reach webhook {}", self.url))?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("Webhook {} answered {}", self.url, status);
        }
        Ok(())
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn send_challenge(&self, realm: &str, user_id: &str, challenge: &str) -> Result<()> {
        self.post(&Notification {
            kind: NotificationKind::Challenge,
            realm: realm.to_string(),
            user_id: user_id.to_string(),
            token: challenge.to_string(),
            link: Some(challenge_link(&self.endpoint, challenge)),
        })
        .await
    }

    async fn send_token(&self, realm: &str, user_id: &str, token: &str) -> Result<()> {
        self.post(&Notification {
            kind: NotificationKind::Token,
            realm: realm.to_string(),
            user_id: user_id.to_string(),
            token: token.to_string(),
            link: None,
        })
        .await
    }
}

/// Keeps every notification in memory.
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn sent(&self) -> Vec<Notification> {
        self.sent.lock().await.clone()
    }

    /// Most recent challenge sent to `user_id`.
    pub async fn last_challenge(&self, user_id: &str) -> Option<String> {
        self.last(NotificationKind::Challenge, user_id).await
    }

    /// Most recent temporary token sent to `user_id`.
    pub async fn last_token(&self, user_id: &str) -> Option<String> {
        self.last(NotificationKind::Token, user_id).await
    }

    async fn last(&self, kind: NotificationKind, user_id: &str) -> Option<String> {
        self.sent
            .lock()
            .await
            .iter()
            .rev()
            .find(|n| n.kind == kind && n.user_id == user_id)
            .map(|n| n.token.clone())
    }

    async fn record(&self, kind: NotificationKind, realm: &str, user_id: &str, token: &str) {
        self.sent.lock().await.push(Notification {
            kind,
            realm: realm.to_string(),
            user_id: user_id.to_string(),
            token: token.to_string(),
            link: None,
        });
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send_challenge(&self, realm: &str, user_id: &str, challenge: &str) -> Result<()> {
        self.record(NotificationKind::Challenge, realm, user_id, challenge)
            .await;
        Ok(())
    }

    async fn send_token(&self, realm: &str, user_id: &str, token: &str) -> Result<()> {
        self.record(NotificationKind::Token, realm, user_id, token).await;
        Ok(())
    }
}

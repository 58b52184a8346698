//! Delivery channels for formatted notifications.
//!
//! The channel decides how a message actually leaves the process (mail relay
//! API, SMTP bridge, etc.) and returns `Ok`/`Err`; the worker owns retries.

use crate::auth::principal::SenderConfig;
use crate::APP_USER_AGENT;
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use secrecy::ExposeSecret;
use serde::Serialize;
use std::time::Duration;
use tracing::info;
use url::Url;

#[async_trait]
pub trait NotificationChannel: Send + Sync {
    /// Deliver one message or return an error so the worker can retry it.
    ///
    /// # Errors
    /// Returns an error when delivery fails.
    async fn send(
        &self,
        sender: &SenderConfig,
        to: &str,
        subject: &str,
        text_body: &str,
        html_body: &str,
    ) -> Result<()>;
}

/// Local dev channel that logs the message instead of delivering it.
#[derive(Clone, Debug)]
pub struct LogMailer;

#[async_trait]
impl NotificationChannel for LogMailer {
    async fn send(
        &self,
        sender: &SenderConfig,
        to: &str,
        subject: &str,
        _text_body: &str,
        _html_body: &str,
    ) -> Result<()> {
        info!(
            from = %sender.from,
            to = %to,
            subject = %subject,
            "mail send stub"
        );
        Ok(())
    }
}

/// Delivers through a mail relay's JSON API.
pub struct HttpMailer {
    endpoint: Url,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct RelayMessage<'a> {
    from: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_to: Option<&'a str>,
    to: &'a str,
    subject: &'a str,
    text_body: &'a str,
    html_body: &'a str,
}

impl HttpMailer {
    /// # Errors
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(endpoint: Url) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(APP_USER_AGENT)
            .timeout(Duration::from_secs(10))
            .build()
            .context("failed to build mail relay client")?;

        Ok(Self { endpoint, client })
    }
}

#[async_trait]
impl NotificationChannel for HttpMailer {
    async fn send(
        &self,
        sender: &SenderConfig,
        to: &str,
        subject: &str,
        text_body: &str,
        html_body: &str,
    ) -> Result<()> {
        let message = RelayMessage {
            from: &sender.from,
            reply_to: sender.reply_to.as_deref(),
            to,
            subject,
            text_body,
            html_body,
        };

        let mut request = self.client.post(self.endpoint.clone()).json(&message);

        if let Some(username) = &sender.username {
            let password = sender.password.as_ref().map(ExposeSecret::expose_secret);
            request = request.basic_auth(username, password);
        }

        let response = request.send().await.context("mail relay request failed")?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(anyhow!("mail relay returned {}", response.status()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sender() -> SenderConfig {
        SenderConfig {
            host: "mail.example.com".to_string(),
            port: 587,
            from: "noreply@example.com".to_string(),
            reply_to: None,
            username: None,
            password: None,
        }
    }

    #[tokio::test]
    async fn log_mailer_always_succeeds() -> Result<()> {
        LogMailer
            .send(&sender(), "holder@example.com", "subject", "text", "html")
            .await
    }

    #[test]
    fn http_mailer_builds_from_url() -> Result<()> {
        let endpoint = Url::parse("https://relay.example.com/v1/send")?;
        let _mailer = HttpMailer::new(endpoint)?;
        Ok(())
    }

    #[test]
    fn relay_message_omits_empty_reply_to() -> Result<()> {
        let message = RelayMessage {
            from: "noreply@example.com",
            reply_to: None,
            to: "holder@example.com",
            subject: "s",
            text_body: "t",
            html_body: "h",
        };
        let json = serde_json::to_string(&message)?;
        assert!(!json.contains("reply_to"));
        Ok(())
    }
}

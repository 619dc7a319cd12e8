use anyhow::Context;
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;

use crate::config::MailConfig;

/// Delivery of verification codes. Only the trigger point lives here;
/// templating and provider behaviour are the provider's business.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send_verification(&self, email: &str, username: &str, code: &str)
        -> anyhow::Result<()>;
}

/// Writes the code to the log instead of sending it. Used when no mail
/// provider is configured.
#[derive(Debug, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send_verification(
        &self,
        email: &str,
        username: &str,
        code: &str,
    ) -> anyhow::Result<()> {
        tracing::info!(%email, %username, %code, "Verification code issued (mail delivery disabled)");
        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct SendEmailBody<'a> {
    from: &'a str,
    to: [&'a str; 1],
    subject: &'a str,
    text: String,
}

/// Posts a JSON payload to a transactional mail API with a bearer key.
#[derive(Debug, Clone)]
pub struct HttpMailer {
    client: Client,
    config: MailConfig,
}

impl HttpMailer {
    pub fn new(config: MailConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }
}

#[async_trait]
impl Mailer for HttpMailer {
    async fn send_verification(
        &self,
        email: &str,
        username: &str,
        code: &str,
    ) -> anyhow::Result<()> {
        let body = SendEmailBody {
            from: &self.config.from,
            to: [email],
            subject: "Feedbox verification code",
            text: format!(
                "Hello {},\n\nYour verification code is {}.\nIf you did not sign up, ignore this email.",
                username, code
            ),
        };

        let response = self
            .client
            .post(&self.config.api_url)
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await
            .context("mail API request failed")?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            anyhow::bail!("mail API returned {}: {}", status, detail);
        }

        tracing::debug!(%email, "Verification email sent");
        Ok(())
    }
}

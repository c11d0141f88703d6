use anyhow::Context;
use async_trait::async_trait;
use serde::Serialize;
use tracing::info;

use crate::config::MailerConfig;

#[derive(Debug, Clone, Serialize)]
pub struct OutgoingEmail {
    pub to: Vec<String>,
    pub subject: String,
    pub html: String,
}

/// Notification collaborator. A send is all-or-nothing: either the relay
/// accepted the message for every recipient or the call fails.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, mail: &OutgoingEmail) -> anyhow::Result<()>;
}

/// HTTP mail-relay client.
pub struct HttpMailer {
    client: reqwest::Client,
    url: String,
    from: String,
}

impl HttpMailer {
    pub fn new(cfg: &MailerConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(cfg.timeout_secs))
            .build()
            .context("build mailer http client")?;
        Ok(Self {
            client,
            url: cfg.url.clone(),
            from: cfg.from.clone(),
        })
    }
}

#[derive(Serialize)]
struct RelayPayload<'a> {
    from: &'a str,
    to: &'a [String],
    subject: &'a str,
    html: &'a str,
}

#[async_trait]
impl Mailer for HttpMailer {
    async fn send(&self, mail: &OutgoingEmail) -> anyhow::Result<()> {
        let payload = RelayPayload {
            from: &self.from,
            to: &mail.to,
            subject: &mail.subject,
            html: &mail.html,
        };
        self.client
            .post(&self.url)
            .json(&payload)
            .send()
            .await
            .context("mail relay request")?
            .error_for_status()
            .context("mail relay response status")?;
        info!(recipients = mail.to.len(), subject = %mail.subject, "email dispatched");
        Ok(())
    }
}

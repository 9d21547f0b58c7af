use std::sync::Arc;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::OnceCell;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::MailConfig;
use crate::error::{Error, Result};
use crate::services::storage_service::{StorageService, PREVIEWS_DIR};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MailAttachment {
    pub filename: String,
    pub reference: String,
    pub content_type: String,
}

#[derive(Debug, Clone)]
pub struct MailMessage {
    pub from: String,
    pub to: String,
    pub cc: Option<String>,
    pub subject: String,
    pub text: String,
    pub html: String,
    pub attachments: Vec<MailAttachment>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportKind {
    Relay,
    Sandbox,
}

#[derive(Debug, Clone, Serialize)]
pub struct DispatchReceipt {
    pub transport: TransportKind,
    pub message_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preview_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sandbox_account: Option<String>,
}

#[derive(Debug)]
struct RelayTransport {
    client: Client,
    url: String,
    api_key: String,
}

#[derive(Debug)]
struct SandboxTransport {
    account: String,
}

#[derive(Debug)]
enum MailTransport {
    Relay(RelayTransport),
    Sandbox(SandboxTransport),
}

#[derive(Debug, Deserialize)]
struct RelayResponse {
    id: Option<String>,
}

/// Sends mail through the relay when credentials are configured, otherwise
/// captures it into the preview sandbox. The transport is chosen and built at
/// most once, on first use, and shared by every clone of the service.
#[derive(Clone)]
pub struct MailService {
    config: MailConfig,
    storage: StorageService,
    transport: Arc<OnceCell<MailTransport>>,
}

impl MailService {
    pub fn new(config: MailConfig, storage: StorageService) -> Self {
        Self {
            config,
            storage,
            transport: Arc::new(OnceCell::new()),
        }
    }

    pub fn sender(&self) -> &str {
        &self.config.from
    }

    pub fn recruiter_cc(&self) -> Option<&str> {
        self.config.recruiter_cc.as_deref()
    }

    pub async fn transport_kind(&self) -> Result<TransportKind> {
        Ok(match self.transport().await? {
            MailTransport::Relay(_) => TransportKind::Relay,
            MailTransport::Sandbox(_) => TransportKind::Sandbox,
        })
    }

    async fn transport(&self) -> Result<&MailTransport> {
        self.transport
            .get_or_try_init(|| self.build_transport())
            .await
    }

    async fn build_transport(&self) -> Result<MailTransport> {
        match self.config.relay_credentials() {
            Some((url, api_key)) => {
                let client = Client::builder()
                    .timeout(Duration::from_secs(15))
                    .build()
                    .map_err(|e| Error::DispatchFailure(e.to_string()))?;
                info!(relay = %url, "mail relay transport configured");
                Ok(MailTransport::Relay(RelayTransport {
                    client,
                    url: url.to_string(),
                    api_key: api_key.to_string(),
                }))
            }
            None => {
                tokio::fs::create_dir_all(self.storage.root().join(PREVIEWS_DIR))
                    .await
                    .map_err(|e| Error::DispatchFailure(e.to_string()))?;
                let account = format!("sandbox-{}", Uuid::new_v4().simple());
                warn!(
                    account = %account,
                    "mail relay credentials missing, capturing mail in the preview sandbox"
                );
                Ok(MailTransport::Sandbox(SandboxTransport { account }))
            }
        }
    }

    pub async fn send(&self, message: &MailMessage) -> Result<DispatchReceipt> {
        match self.transport().await? {
            MailTransport::Relay(relay) => self.send_via_relay(relay, message).await,
            MailTransport::Sandbox(sandbox) => self.capture(sandbox, message).await,
        }
    }

    async fn send_via_relay(
        &self,
        relay: &RelayTransport,
        message: &MailMessage,
    ) -> Result<DispatchReceipt> {
        let mut attachments = Vec::with_capacity(message.attachments.len());
        for attachment in &message.attachments {
            let bytes = self.storage.read(&attachment.reference).await.map_err(|e| {
                Error::DispatchFailure(format!("attachment {}: {}", attachment.filename, e))
            })?;
            attachments.push(json!({
                "filename": attachment.filename,
                "content_type": attachment.content_type,
                "content": BASE64.encode(bytes),
            }));
        }

        let payload = json!({
            "from": message.from,
            "to": [message.to],
            "cc": message.cc.iter().collect::<Vec<_>>(),
            "subject": message.subject,
            "text": message.text,
            "html": message.html,
            "attachments": attachments,
        });

        let response = relay
            .client
            .post(&relay.url)
            .bearer_auth(&relay.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|e| Error::DispatchFailure(e.to_string()))?
            .error_for_status()
            .map_err(|e| Error::DispatchFailure(e.to_string()))?;

        let message_id = response
            .json::<RelayResponse>()
            .await
            .ok()
            .and_then(|body| body.id)
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        Ok(DispatchReceipt {
            transport: TransportKind::Relay,
            message_id,
            preview_url: None,
            sandbox_account: None,
        })
    }

    async fn capture(
        &self,
        sandbox: &SandboxTransport,
        message: &MailMessage,
    ) -> Result<DispatchReceipt> {
        let message_id = Uuid::new_v4();
        let html = self.preview_html(&sandbox.account, message, Utc::now());
        let stored = self
            .storage
            .store_preview(message_id, &html)
            .await
            .map_err(|e| Error::DispatchFailure(e.to_string()))?;
        let preview_url = self.storage.public_url(&stored.reference);
        info!(preview_url = %preview_url, "mail captured by sandbox transport");

        Ok(DispatchReceipt {
            transport: TransportKind::Sandbox,
            message_id: message_id.to_string(),
            preview_url: Some(preview_url),
            sandbox_account: Some(sandbox.account.clone()),
        })
    }

    fn preview_html(&self, account: &str, message: &MailMessage, at: DateTime<Utc>) -> String {
        let attachments: String = message
            .attachments
            .iter()
            .map(|a| {
                format!(
                    "<li><a href=\"{}\">{}</a></li>",
                    escape_html(&self.storage.public_url(&a.reference)),
                    escape_html(&a.filename)
                )
            })
            .collect();
        format!(
            "<!doctype html><html><head><meta charset=\"utf-8\"><title>{subject}</title></head><body>\
             <table><tr><th>Account</th><td>{account}</td></tr>\
             <tr><th>Date</th><td>{date}</td></tr>\
             <tr><th>From</th><td>{from}</td></tr>\
             <tr><th>To</th><td>{to}</td></tr>\
             <tr><th>Cc</th><td>{cc}</td></tr>\
             <tr><th>Subject</th><td>{subject}</td></tr></table>\
             <hr>{html}<hr><pre>{text}</pre><ul>{attachments}</ul></body></html>",
            account = escape_html(account),
            date = at.to_rfc3339(),
            from = escape_html(&message.from),
            to = escape_html(&message.to),
            cc = escape_html(message.cc.as_deref().unwrap_or("")),
            subject = escape_html(&message.subject),
            html = message.html,
            text = escape_html(&message.text),
            attachments = attachments,
        )
    }
}

pub fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// What the applicant is told in the confirmation mail.
#[derive(Debug, Clone)]
pub struct ConfirmationDetails<'a> {
    pub applicant_name: &'a str,
    pub job_title: &'a str,
    pub company_name: &'a str,
    pub submitted_at: DateTime<Utc>,
    pub tracking_url: &'a str,
}

pub struct RenderedMail {
    pub subject: String,
    pub text: String,
    pub html: String,
}

pub fn guest_confirmation(details: &ConfirmationDetails<'_>) -> RenderedMail {
    let subject = format!(
        "Application received: {} at {}",
        details.job_title, details.company_name
    );
    let submitted = details.submitted_at.format("%Y-%m-%d %H:%M UTC");
    let text = format!(
        "Hi {name},\n\n\
         Thanks for applying for {title} at {company}. We received your application on {submitted}.\n\n\
         You can check its status at any time here (you will be asked for this email address):\n\
         {url}\n\n\
         A summary of your submission is attached.\n",
        name = details.applicant_name,
        title = details.job_title,
        company = details.company_name,
        submitted = submitted,
        url = details.tracking_url,
    );
    let html = format!(
        "<p>Hi {name},</p>\
         <p>Thanks for applying for <strong>{title}</strong> at <strong>{company}</strong>. \
         We received your application on {submitted}.</p>\
         <p>You can check its status at any time here (you will be asked for this email address):</p>\
         <p><a href=\"{url}\">{url}</a></p>\
         <p>A summary of your submission is attached.</p>",
        name = escape_html(details.applicant_name),
        title = escape_html(details.job_title),
        company = escape_html(details.company_name),
        submitted = submitted,
        url = escape_html(details.tracking_url),
    );
    RenderedMail {
        subject,
        text,
        html,
    }
}

//! Outbound notifications (reset mails).
//!
//! The service only needs "deliver this HTML body to this address"; transport
//! is an adapter concern. `SmtpNotifier` hands mail to a relay, `LogNotifier`
//! only records that a mail would have gone out, and `InMemoryOutbox` keeps
//! messages for inspection.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use thiserror::Error;

use crate::config::SmtpSettings;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NotifyError {
    #[error("invalid mail address {address:?}: {reason}")]
    Address { address: String, reason: String },

    #[error("notification transport failed: {0}")]
    Transport(String),
}

/// One outbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMail {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub html_body: String,
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, to: &str, subject: &str, html_body: &str) -> Result<(), NotifyError>;
}

/// Writes a structured log line per message. Bodies are not logged since
/// they carry reset links.
#[derive(Debug, Clone)]
pub struct LogNotifier {
    from: String,
}

impl LogNotifier {
    pub fn new(from: impl Into<String>) -> Self {
        Self { from: from.into() }
    }
}

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, to: &str, subject: &str, _html_body: &str) -> Result<(), NotifyError> {
        tracing::info!(from = %self.from, to = %to, subject = %subject, "mail dispatched");
        Ok(())
    }
}

/// Delivers through an SMTP relay (plain connection, optional AUTH).
pub struct SmtpNotifier {
    from: Mailbox,
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl core::fmt::Debug for SmtpNotifier {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SmtpNotifier")
            .field("from", &self.from.to_string())
            .finish_non_exhaustive()
    }
}

impl SmtpNotifier {
    const TIMEOUT: Duration = Duration::from_secs(10);

    pub fn new(settings: &SmtpSettings, from: &str) -> Result<Self, NotifyError> {
        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(settings.host.as_str())
            .port(settings.port)
            .timeout(Some(Self::TIMEOUT));
        if let Some((user, password)) = &settings.credentials {
            builder = builder.credentials(Credentials::new(user.clone(), password.clone()));
        }

        Ok(Self {
            from: mailbox(from)?,
            transport: builder.build(),
        })
    }
}

fn mailbox(address: &str) -> Result<Mailbox, NotifyError> {
    address.parse::<Mailbox>().map_err(|e| NotifyError::Address {
        address: address.to_string(),
        reason: e.to_string(),
    })
}

fn compose(from: &Mailbox, to: &str, subject: &str, html_body: &str) -> Result<Message, NotifyError> {
    Message::builder()
        .from(from.clone())
        .to(mailbox(to)?)
        .subject(subject)
        .header(ContentType::TEXT_HTML)
        .body(html_body.to_string())
        .map_err(|e| NotifyError::Transport(e.to_string()))
}

#[async_trait]
impl Notifier for SmtpNotifier {
    async fn send(&self, to: &str, subject: &str, html_body: &str) -> Result<(), NotifyError> {
        let message = compose(&self.from, to, subject, html_body)?;
        self.transport
            .send(message)
            .await
            .map_err(|e| NotifyError::Transport(e.to_string()))?;
        tracing::info!(to = %to, subject = %subject, "mail relayed");
        Ok(())
    }
}

/// Records every message in memory.
#[derive(Debug, Default)]
pub struct InMemoryOutbox {
    from: String,
    sent: Mutex<Vec<OutboundMail>>,
}

impl InMemoryOutbox {
    pub fn new(from: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            sent: Mutex::new(Vec::new()),
        }
    }

    /// Snapshot of everything sent so far, oldest first.
    pub fn sent(&self) -> Vec<OutboundMail> {
        self.sent
            .lock()
            .map(|sent| sent.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl Notifier for InMemoryOutbox {
    async fn send(&self, to: &str, subject: &str, html_body: &str) -> Result<(), NotifyError> {
        let mut sent = self
            .sent
            .lock()
            .map_err(|_| NotifyError::Transport("outbox lock poisoned".to_string()))?;
        sent.push(OutboundMail {
            from: self.from.clone(),
            to: to.to_string(),
            subject: subject.to_string(),
            html_body: html_body.to_string(),
        });
        Ok(())
    }
}

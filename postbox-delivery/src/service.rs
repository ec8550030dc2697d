use std::path::Path;

use mailparse::MailHeaderMap;
use postbox_common::{address::extract_address, internal};
use postbox_spool::{Disposition, MessageStore};
use serde::Deserialize;

use crate::{
    error::{Result, SendFailure},
    transaction::RelaySession,
    types::{PassSummary, SmtpTimeouts},
};

fn default_helo_domain() -> String {
    "localhost".into()
}

/// Drains a message store's pending directory through an upstream relay.
#[derive(Debug, Deserialize)]
pub struct SmtpDeliveryService {
    /// Relay address as `host` or `host:port`; the port defaults to 25
    pub relay: String,

    /// Domain announced in EHLO
    #[serde(default = "default_helo_domain")]
    pub helo_domain: String,

    /// Username for AUTH; authentication only runs when both credentials
    /// are configured
    #[serde(default)]
    pub username: Option<String>,

    /// Password for AUTH
    #[serde(default)]
    pub password: Option<String>,

    /// Fixed envelope sender; when unset the sender comes from each
    /// message's From header
    #[serde(default)]
    pub envelope_sender: Option<String>,

    #[serde(default)]
    pub timeouts: SmtpTimeouts,

    /// Serializes passes so a watcher trigger cannot overlap a manual drain
    #[serde(skip)]
    pass_lock: tokio::sync::Mutex<()>,
}

impl SmtpDeliveryService {
    pub fn new(relay: impl Into<String>) -> Self {
        Self {
            relay: relay.into(),
            helo_domain: default_helo_domain(),
            username: None,
            password: None,
            envelope_sender: None,
            timeouts: SmtpTimeouts::default(),
            pass_lock: tokio::sync::Mutex::new(()),
        }
    }

    #[must_use]
    pub fn with_helo_domain(mut self, domain: impl Into<String>) -> Self {
        self.helo_domain = domain.into();
        self
    }

    #[must_use]
    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    #[must_use]
    pub fn with_envelope_sender(mut self, sender: impl Into<String>) -> Self {
        self.envelope_sender = Some(sender.into());
        self
    }

    #[must_use]
    pub fn with_timeouts(mut self, timeouts: SmtpTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    fn relay_addr(&self) -> String {
        if self.relay.contains(':') {
            self.relay.clone()
        } else {
            format!("{}:25", self.relay)
        }
    }

    /// Runs one delivery pass over everything currently pending in `store`.
    ///
    /// An empty outbox costs nothing: no connection is made. Otherwise one
    /// relay session carries the whole batch. Messages the relay accepts
    /// move to the sent directory immediately; messages that fail on their
    /// own (unreadable, unparseable, rejected) are quarantined into the
    /// failed directory after the batch completes. Pass-level failures
    /// (connect, greeting, AUTH) leave the pending directory untouched so
    /// the next pass retries the whole batch.
    ///
    /// # Errors
    ///
    /// Returns an error when the pending directory cannot be listed or when
    /// the relay session cannot be established or authenticated.
    pub async fn deliver_pending(&self, store: &MessageStore) -> Result<PassSummary> {
        let _pass = self.pass_lock.lock().await;

        let pending = store.list_pending().await?;

        if pending.is_empty() {
            internal!(level = DEBUG, "Outbox is empty, nothing to deliver");
            return Ok(PassSummary::default());
        }

        let mut summary = PassSummary {
            total: pending.len(),
            ..PassSummary::default()
        };

        internal!(
            level = INFO,
            "Starting delivery pass over {} messages",
            summary.total
        );

        let mut session =
            RelaySession::open(&self.relay_addr(), &self.helo_domain, self.timeouts).await?;

        if let (Some(username), Some(password)) = (&self.username, &self.password) {
            if let Err(error) = session.authenticate(username, password).await {
                session.close().await;
                return Err(error);
            }
        }

        let mut failures = Vec::new();

        for path in &pending {
            match self.send_file(&mut session, path).await {
                Ok(()) => {
                    internal!(
                        level = INFO,
                        "Delivered {} to {}",
                        path.display(),
                        self.relay
                    );

                    if let Err(error) = store.move_to(path, Disposition::Sent).await {
                        // The relay has the message; losing the move means
                        // the file stays pending and may be sent twice.
                        tracing::error!("Failed to archive {}: {error}", path.display());
                    }

                    summary.sent += 1;
                }
                Err(failure) => {
                    tracing::error!("Failed to deliver {}: {failure}", path.display());
                    failures.push(path.clone());
                    session.reset().await;
                }
            }
        }

        summary.failed = failures.len();

        for path in &failures {
            if let Err(error) = store.move_to(path, Disposition::Failed).await {
                tracing::error!("Failed to quarantine {}: {error}", path.display());
            }
        }

        session.close().await;

        internal!(level = INFO, "Delivery pass complete: {summary}");

        Ok(summary)
    }

    /// Reads, parses, and submits one spooled message over the session.
    async fn send_file(&self, session: &mut RelaySession, path: &Path) -> Result<(), SendFailure> {
        let raw = tokio::fs::read(path).await?;
        let parsed = mailparse::parse_mail(&raw)?;

        let sender = match &self.envelope_sender {
            Some(sender) => sender.clone(),
            None => {
                let from = parsed
                    .headers
                    .get_first_value("From")
                    .ok_or(SendFailure::MissingHeader("From"))?;
                let address = extract_address(&from);

                if address.is_empty() {
                    return Err(SendFailure::MissingHeader("From"));
                }

                address.to_string()
            }
        };

        let to = parsed
            .headers
            .get_first_value("To")
            .ok_or(SendFailure::MissingHeader("To"))?;

        let recipients: Vec<String> = to
            .split(',')
            .map(extract_address)
            .filter(|address| !address.is_empty())
            .map(str::to_string)
            .collect();

        if recipients.is_empty() {
            return Err(SendFailure::NoRecipients);
        }

        let content = String::from_utf8_lossy(&raw);

        session.submit(&sender, &recipients, &content).await
    }
}

//! Message identity and composition.

use std::time::{SystemTime, UNIX_EPOCH};

use rand::{Rng, distr::Alphanumeric};

use crate::error::ComposeError;

/// Length of the random component of a message ID.
const TOKEN_LEN: usize = 10;

/// Identifier for an outbox message.
///
/// Serves as both the tracking ID and the filename stem for stored
/// messages: `{unix-epoch-seconds}.{ten random alphanumerics}`, with the
/// `.eml` extension appended on disk. The identity never changes across
/// state transitions; only the containing directory does.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MessageId {
    secs: u64,
    token: String,
}

impl MessageId {
    /// Generate a new unique message ID stamped with the current time.
    #[must_use]
    pub fn generate() -> Self {
        let secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();

        let token = rand::rng()
            .sample_iter(Alphanumeric)
            .take(TOKEN_LEN)
            .map(char::from)
            .collect();

        Self { secs, token }
    }

    /// Parse a message ID from a filename like `1724161234.aB3xYz9QwE.eml`.
    ///
    /// Validates the filename shape to prevent path traversal: no path
    /// separators, a numeric timestamp, and exactly ten alphanumeric
    /// characters in the random component.
    pub fn from_filename(filename: &str) -> Option<Self> {
        // Reject filenames with path separators
        if filename.contains('/') || filename.contains('\\') {
            return None;
        }

        let stem = filename.strip_suffix(".eml")?;
        let (secs, token) = stem.split_once('.')?;

        let secs = secs.parse().ok()?;
        if token.len() != TOKEN_LEN || !token.bytes().all(|b| b.is_ascii_alphanumeric()) {
            return None;
        }

        Some(Self {
            secs,
            token: token.to_string(),
        })
    }

    /// The on-disk filename for this message.
    #[must_use]
    pub fn filename(&self) -> String {
        format!("{self}.eml")
    }

    /// Seconds since the Unix epoch at which this ID was generated.
    #[must_use]
    pub const fn created_secs(&self) -> u64 {
        self.secs
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.secs, self.token)
    }
}

/// An email ready to be deposited into the outbox.
///
/// Carries the envelope-facing headers (subject, recipients, optional
/// sender) and one or both bodies. The sender may be left unset and
/// resolved against the store's configured default at deposit time.
///
/// # Examples
///
/// ```no_run
/// use postbox_spool::Email;
///
/// let email = Email::builder()
///     .subject("Welcome")
///     .recipient("jane@example.com")
///     .sender("noreply@example.com")
///     .body_plain("Hello!")
///     .build()
///     .unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct Email {
    subject: String,
    recipients: Vec<String>,
    sender: Option<String>,
    body_plain: Option<String>,
    body_html: Option<String>,
}

impl Email {
    /// Creates a new empty email builder.
    #[must_use]
    pub fn builder() -> EmailBuilder {
        EmailBuilder::default()
    }

    /// The explicit sender, if one was set.
    #[must_use]
    pub fn sender(&self) -> Option<&str> {
        self.sender.as_deref()
    }

    /// Serialize to RFC 5322 text with the given effective sender.
    ///
    /// Headers are CRLF-terminated; a message with both bodies becomes a
    /// `multipart/alternative` with the plain part first.
    #[must_use]
    pub fn to_rfc5322(&self, sender: &str) -> String {
        let mut message = String::with_capacity(1024);

        message.push_str(&format!("Subject: {}\r\n", self.subject));
        message.push_str(&format!("From: {sender}\r\n"));
        message.push_str(&format!("To: {}\r\n", self.recipients.join(", ")));
        message.push_str(&format!("Date: {}\r\n", chrono::Utc::now().to_rfc2822()));
        message.push_str("MIME-Version: 1.0\r\n");

        match (&self.body_plain, &self.body_html) {
            (Some(plain), Some(html)) => {
                let boundary = generate_boundary();

                message.push_str(&format!(
                    "Content-Type: multipart/alternative; boundary=\"{boundary}\"\r\n"
                ));
                message.push_str("\r\n");

                message.push_str(&format!("--{boundary}\r\n"));
                message.push_str("Content-Type: text/plain; charset=utf-8\r\n");
                message.push_str("\r\n");
                message.push_str(plain);
                message.push_str("\r\n");

                message.push_str(&format!("--{boundary}\r\n"));
                message.push_str("Content-Type: text/html; charset=utf-8\r\n");
                message.push_str("\r\n");
                message.push_str(html);
                message.push_str("\r\n");

                message.push_str(&format!("--{boundary}--\r\n"));
            }
            (Some(plain), None) => {
                message.push_str("Content-Type: text/plain; charset=utf-8\r\n");
                message.push_str("\r\n");
                message.push_str(plain);
            }
            (None, Some(html)) => {
                message.push_str("Content-Type: text/html; charset=utf-8\r\n");
                message.push_str("\r\n");
                message.push_str(html);
            }
            // Unreachable through the builder, which demands a body.
            (None, None) => message.push_str("\r\n"),
        }

        message
    }
}

/// Builder for [`Email`].
#[derive(Debug, Clone, Default)]
pub struct EmailBuilder {
    subject: String,
    recipients: Vec<String>,
    sender: Option<String>,
    body_plain: Option<String>,
    body_html: Option<String>,
}

impl EmailBuilder {
    /// Sets the Subject header.
    #[must_use]
    pub fn subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = subject.into();
        self
    }

    /// Adds a recipient to the To header.
    #[must_use]
    pub fn recipient(mut self, recipient: impl Into<String>) -> Self {
        self.recipients.push(recipient.into());
        self
    }

    /// Adds multiple recipients to the To header.
    #[must_use]
    pub fn recipients(mut self, recipients: &[impl AsRef<str>]) -> Self {
        for recipient in recipients {
            self.recipients.push(recipient.as_ref().to_string());
        }
        self
    }

    /// Sets the From header.
    #[must_use]
    pub fn sender(mut self, sender: impl Into<String>) -> Self {
        self.sender = Some(sender.into());
        self
    }

    /// Sets the plain-text body.
    #[must_use]
    pub fn body_plain(mut self, body: impl Into<String>) -> Self {
        self.body_plain = Some(body.into());
        self
    }

    /// Sets the HTML body.
    #[must_use]
    pub fn body_html(mut self, body: impl Into<String>) -> Self {
        self.body_html = Some(body.into());
        self
    }

    /// Builds the final email.
    ///
    /// # Errors
    ///
    /// Returns an error if no recipients were added or no body was set.
    pub fn build(self) -> Result<Email, ComposeError> {
        if self.recipients.is_empty() {
            return Err(ComposeError::NoRecipients);
        }

        if self.body_plain.is_none() && self.body_html.is_none() {
            return Err(ComposeError::NoBody);
        }

        Ok(Email {
            subject: self.subject,
            recipients: self.recipients,
            sender: self.sender,
            body_plain: self.body_plain,
            body_html: self.body_html,
        })
    }
}

/// Generates a unique MIME boundary string.
fn generate_boundary() -> String {
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();

    format!("----=_Part_{timestamp}")
}

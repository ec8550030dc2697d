use postbox_common::internal;
use postbox_smtp::{ClientError, Response, SmtpClient};
use tokio::time::timeout;

use crate::{
    error::{DeliveryError, SendFailure},
    types::SmtpTimeouts,
};

/// One open session with the relay, shared by every message in a pass.
///
/// Pass-level steps (connect, greeting, EHLO, AUTH) fail with
/// [`DeliveryError`]; per-message steps fail with [`SendFailure`] so the
/// caller can quarantine that message and carry on with the batch.
pub(crate) struct RelaySession {
    client: SmtpClient,
    capabilities: Vec<String>,
    timeouts: SmtpTimeouts,
}

impl RelaySession {
    pub(crate) async fn open(
        relay: &str,
        helo_domain: &str,
        timeouts: SmtpTimeouts,
    ) -> Result<Self, DeliveryError> {
        let mut client = timeout(timeouts.connect(), SmtpClient::connect(relay))
            .await
            .map_err(|_| DeliveryError::Timeout {
                operation: "Connect",
                seconds: timeouts.connect_secs,
            })?
            .map_err(DeliveryError::Connection)?;

        let greeting = timeout(timeouts.connect(), client.read_greeting())
            .await
            .map_err(|_| DeliveryError::Timeout {
                operation: "Greeting",
                seconds: timeouts.connect_secs,
            })?
            .map_err(DeliveryError::Connection)?;

        if !greeting.is_success() {
            return Err(DeliveryError::Connection(rejection(&greeting)));
        }

        let ehlo = timeout(timeouts.command(), client.ehlo(helo_domain))
            .await
            .map_err(|_| DeliveryError::Timeout {
                operation: "EHLO",
                seconds: timeouts.command_secs,
            })?
            .map_err(DeliveryError::Connection)?;

        let capabilities = if ehlo.is_success() {
            ehlo.lines
        } else {
            // Older relays reject EHLO outright; HELO gets a plain session
            // with no advertised extensions.
            let helo = timeout(timeouts.command(), client.helo(helo_domain))
                .await
                .map_err(|_| DeliveryError::Timeout {
                    operation: "HELO",
                    seconds: timeouts.command_secs,
                })?
                .map_err(DeliveryError::Connection)?;

            if !helo.is_success() {
                return Err(DeliveryError::Connection(rejection(&helo)));
            }

            Vec::new()
        };

        internal!(
            level = DEBUG,
            "Relay {relay} greeted: {}",
            greeting.message()
        );

        Ok(Self {
            client,
            capabilities,
            timeouts,
        })
    }

    /// Authenticates with the relay, preferring PLAIN over LOGIN.
    pub(crate) async fn authenticate(
        &mut self,
        username: &str,
        password: &str,
    ) -> Result<(), DeliveryError> {
        let mechanisms = self
            .capabilities
            .iter()
            .find_map(|line| {
                line.to_uppercase()
                    .strip_prefix("AUTH ")
                    .map(str::to_string)
            })
            .ok_or(DeliveryError::AuthUnsupported)?;

        let command = self.timeouts.command();
        let attempt = if mechanisms.split_whitespace().any(|m| m == "PLAIN") {
            timeout(command, self.client.auth_plain(username, password)).await
        } else if mechanisms.split_whitespace().any(|m| m == "LOGIN") {
            timeout(command, self.client.auth_login(username, password)).await
        } else {
            return Err(DeliveryError::AuthUnsupported);
        };

        let response = attempt
            .map_err(|_| DeliveryError::Timeout {
                operation: "AUTH",
                seconds: self.timeouts.command_secs,
            })?
            .map_err(DeliveryError::Authentication)?;

        if !response.is_success() {
            return Err(DeliveryError::Authentication(rejection(&response)));
        }

        internal!(level = DEBUG, "Authenticated with relay");

        Ok(())
    }

    /// Runs one full MAIL/RCPT/DATA transaction for a single message.
    pub(crate) async fn submit(
        &mut self,
        sender: &str,
        recipients: &[String],
        content: &str,
    ) -> Result<(), SendFailure> {
        let command_secs = self.timeouts.command_secs;

        let response = timeout(self.timeouts.command(), self.client.mail_from(sender))
            .await
            .map_err(|_| SendFailure::Timeout {
                operation: "MAIL FROM",
                seconds: command_secs,
            })??;

        if !response.is_success() {
            return Err(SendFailure::Submit(rejection(&response)));
        }

        for recipient in recipients {
            let response = timeout(self.timeouts.command(), self.client.rcpt_to(recipient))
                .await
                .map_err(|_| SendFailure::Timeout {
                    operation: "RCPT TO",
                    seconds: command_secs,
                })??;

            if !response.is_success() {
                return Err(SendFailure::Submit(rejection(&response)));
            }
        }

        let response = timeout(self.timeouts.command(), self.client.data())
            .await
            .map_err(|_| SendFailure::Timeout {
                operation: "DATA",
                seconds: command_secs,
            })??;

        if !response.is_intermediate() {
            return Err(SendFailure::Submit(rejection(&response)));
        }

        let response = timeout(self.timeouts.data(), self.client.send_data(content))
            .await
            .map_err(|_| SendFailure::Timeout {
                operation: "Message data",
                seconds: self.timeouts.data_secs,
            })??;

        if !response.is_success() {
            return Err(SendFailure::Submit(rejection(&response)));
        }

        Ok(())
    }

    /// Clears relay state after a failed transaction so the next message
    /// starts clean. A relay that mishandles RSET is worth a warning, not
    /// an aborted pass.
    pub(crate) async fn reset(&mut self) {
        match timeout(self.timeouts.command(), self.client.rset()).await {
            Ok(Ok(response)) if response.is_success() => {}
            Ok(Ok(response)) => {
                tracing::warn!(
                    "Relay rejected RSET: {} {}",
                    response.code,
                    response.message()
                );
            }
            Ok(Err(error)) => tracing::warn!("RSET failed: {error}"),
            Err(_) => {
                tracing::warn!("RSET timed out after {}s", self.timeouts.command_secs);
            }
        }
    }

    /// Says goodbye to the relay. Failures here cannot affect any message,
    /// so they are only warned about.
    pub(crate) async fn close(mut self) {
        match timeout(self.timeouts.quit(), self.client.quit()).await {
            Ok(Ok(response)) if response.is_success() => {}
            Ok(Ok(response)) => {
                tracing::warn!(
                    "Relay rejected QUIT: {} {}",
                    response.code,
                    response.message()
                );
            }
            Ok(Err(error)) => tracing::warn!("QUIT failed: {error}"),
            Err(_) => {
                tracing::warn!("QUIT timed out after {}s", self.timeouts.quit_secs);
            }
        }
    }
}

fn rejection(response: &Response) -> ClientError {
    ClientError::SmtpError {
        code: response.code,
        message: response.message(),
    }
}

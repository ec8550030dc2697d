use std::{fmt, time::Duration};

use serde::Deserialize;

/// Timeout configuration for SMTP operations against the relay.
///
/// All timeouts are in seconds. DATA gets a larger default since message
/// bodies can be arbitrarily large.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
pub struct SmtpTimeouts {
    /// Timeout for establishing the TCP connection and reading the greeting
    #[serde(default = "default_connect_timeout")]
    pub connect_secs: u64,

    /// Timeout for single-command exchanges (EHLO, MAIL, RCPT, AUTH, RSET)
    #[serde(default = "default_command_timeout")]
    pub command_secs: u64,

    /// Timeout for transmitting the message content after DATA
    #[serde(default = "default_data_timeout")]
    pub data_secs: u64,

    /// Timeout for the closing QUIT exchange
    #[serde(default = "default_quit_timeout")]
    pub quit_secs: u64,
}

const fn default_connect_timeout() -> u64 {
    30
}

const fn default_command_timeout() -> u64 {
    30
}

const fn default_data_timeout() -> u64 {
    120
}

const fn default_quit_timeout() -> u64 {
    10
}

impl Default for SmtpTimeouts {
    fn default() -> Self {
        Self {
            connect_secs: default_connect_timeout(),
            command_secs: default_command_timeout(),
            data_secs: default_data_timeout(),
            quit_secs: default_quit_timeout(),
        }
    }
}

impl SmtpTimeouts {
    #[must_use]
    pub const fn connect(&self) -> Duration {
        Duration::from_secs(self.connect_secs)
    }

    #[must_use]
    pub const fn command(&self) -> Duration {
        Duration::from_secs(self.command_secs)
    }

    #[must_use]
    pub const fn data(&self) -> Duration {
        Duration::from_secs(self.data_secs)
    }

    #[must_use]
    pub const fn quit(&self) -> Duration {
        Duration::from_secs(self.quit_secs)
    }
}

/// Outcome of one delivery pass over the pending directory.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PassSummary {
    /// Messages found in the pending directory at the start of the pass
    pub total: usize,
    /// Messages accepted by the relay and moved to the sent directory
    pub sent: usize,
    /// Messages quarantined into the failed directory
    pub failed: usize,
}

impl fmt::Display for PassSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} sent, {} failed of {} scanned",
            self.sent, self.failed, self.total
        )
    }
}

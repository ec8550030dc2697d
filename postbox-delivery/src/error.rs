use std::io;

use postbox_smtp::ClientError;
use postbox_spool::{SpoolError, WatchError};

/// Errors that abort an entire delivery pass.
///
/// When one of these is returned no message has been moved out of the
/// pending directory by the failing pass, so the next pass retries the
/// whole batch.
#[derive(thiserror::Error, Debug)]
pub enum DeliveryError {
    #[error("Connection to relay failed: {0}")]
    Connection(#[source] ClientError),

    #[error("Authentication with relay failed: {0}")]
    Authentication(#[source] ClientError),

    #[error("Relay offers no supported AUTH mechanism")]
    AuthUnsupported,

    #[error(transparent)]
    Spool(#[from] SpoolError),

    #[error(transparent)]
    Watch(#[from] WatchError),

    #[error("{operation} timed out after {seconds}s")]
    Timeout {
        operation: &'static str,
        seconds: u64,
    },
}

/// Errors scoped to a single message within a pass.
///
/// These quarantine the offending file into the failed directory and leave
/// the rest of the batch alone.
#[derive(thiserror::Error, Debug)]
pub enum SendFailure {
    #[error("Failed to read message: {0}")]
    Read(#[from] io::Error),

    #[error("Failed to parse message: {0}")]
    Parse(#[from] mailparse::MailParseError),

    #[error("Message has no usable {0} header")]
    MissingHeader(&'static str),

    #[error("Message has no deliverable recipients")]
    NoRecipients,

    #[error("Relay rejected message: {0}")]
    Submit(#[from] ClientError),

    #[error("{operation} timed out after {seconds}s")]
    Timeout {
        operation: &'static str,
        seconds: u64,
    },
}

pub type Result<T, E = DeliveryError> = std::result::Result<T, E>;

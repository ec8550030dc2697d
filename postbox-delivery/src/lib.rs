//! Batch SMTP delivery for the filesystem outbox.
//!
//! [`SmtpDeliveryService`] drains the pending directory of a
//! [`MessageStore`](postbox_spool::MessageStore) in a single pass: one relay
//! connection per pass, one SMTP transaction per message, with per-message
//! failures quarantined so the rest of the batch still goes out.
//! [`DeliveryDriver`] ties a service to the store's directory watcher so a
//! pass runs whenever new mail lands in the outbox.

pub mod driver;
pub mod error;
pub mod service;
mod transaction;
pub mod types;

pub use driver::{DeliveryDriver, WatchConfig};
pub use error::{DeliveryError, Result, SendFailure};
pub use service::SmtpDeliveryService;
pub use types::{PassSummary, SmtpTimeouts};

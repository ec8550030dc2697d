//! SMTP submission client for draining a filesystem outbox.

pub mod client;

pub use client::{ClientError, Response, ResponseLine, Result, SmtpClient};

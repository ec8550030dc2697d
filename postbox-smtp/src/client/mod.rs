//! SMTP client implementation for submitting messages to a relay.
//!
//! The client speaks just enough ESMTP for an outbox drain: EHLO,
//! optional authentication via AUTH PLAIN or AUTH LOGIN, and the
//! MAIL FROM / RCPT TO / DATA transaction, over a plain TCP connection.
//!
//! # Examples
//!
//! ```no_run
//! use postbox_smtp::client::SmtpClient;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut client = SmtpClient::connect("localhost:2525").await?;
//! client.read_greeting().await?;
//! client.ehlo("client.example.com").await?;
//! client.mail_from("sender@example.com").await?;
//! client.rcpt_to("recipient@example.com").await?;
//! client.data().await?;
//! client.send_data("Subject: Test\r\n\r\nHello World").await?;
//! client.quit().await?;
//! # Ok(())
//! # }
//! ```

mod error;
mod response;
mod smtp_client;

pub use error::{ClientError, Result};
pub use response::{Response, ResponseLine};
pub use smtp_client::SmtpClient;

//! SMTP client implementation over a plain TCP connection.

use base64::{Engine, prelude::BASE64_STANDARD};
use postbox_common::{incoming, outgoing};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpStream,
};

use super::error::{ClientError, Result};
use super::response::Response;

/// Initial size of the read buffer for SMTP responses.
const BUFFER_SIZE: usize = 8192;

/// Maximum size of the read buffer to prevent unbounded growth (1MB).
const MAX_BUFFER_SIZE: usize = 1024 * 1024;

/// An SMTP client for sending commands and receiving responses.
pub struct SmtpClient {
    connection: Option<TcpStream>,
    buffer: Vec<u8>,
    buffer_pos: usize,
    responses: Vec<Response>,
}

impl SmtpClient {
    /// Creates a new SMTP client by connecting to the specified address.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection fails.
    pub async fn connect(addr: &str) -> Result<Self> {
        let stream = TcpStream::connect(addr).await.map_err(ClientError::Io)?;

        Ok(Self {
            connection: Some(stream),
            buffer: vec![0u8; BUFFER_SIZE],
            buffer_pos: 0,
            responses: Vec::new(),
        })
    }

    /// Reads the initial server greeting (220 response).
    ///
    /// # Errors
    ///
    /// Returns an error if reading fails or the greeting is invalid.
    pub async fn read_greeting(&mut self) -> Result<Response> {
        self.read_response().await
    }

    /// Sends a command to the server.
    ///
    /// # Errors
    ///
    /// Returns an error if sending fails.
    pub async fn send_command(&mut self, command: &str) -> Result<()> {
        outgoing!("{command}");
        self.transmit(format!("{command}\r\n").as_bytes()).await
    }

    /// Sends a raw command and reads the response.
    ///
    /// # Errors
    ///
    /// Returns an error if sending or reading fails.
    pub async fn command(&mut self, command: &str) -> Result<Response> {
        self.send_command(command).await?;
        self.read_response().await
    }

    /// Sends EHLO with the specified domain.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails.
    pub async fn ehlo(&mut self, domain: &str) -> Result<Response> {
        self.command(&format!("EHLO {domain}")).await
    }

    /// Sends HELO with the specified domain.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails.
    pub async fn helo(&mut self, domain: &str) -> Result<Response> {
        self.command(&format!("HELO {domain}")).await
    }

    /// Sends MAIL FROM command.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails.
    pub async fn mail_from(&mut self, from: &str) -> Result<Response> {
        self.command(&format!("MAIL FROM:<{from}>")).await
    }

    /// Sends RCPT TO command.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails.
    pub async fn rcpt_to(&mut self, to: &str) -> Result<Response> {
        self.command(&format!("RCPT TO:<{to}>")).await
    }

    /// Sends DATA command.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails.
    pub async fn data(&mut self) -> Result<Response> {
        self.command("DATA").await
    }

    /// Sends the message content followed by the end-of-data marker.
    ///
    /// Line endings are normalized to CRLF and lines beginning with a
    /// dot are dot-stuffed per RFC 5321 section 4.5.2.
    ///
    /// # Errors
    ///
    /// Returns an error if sending fails.
    pub async fn send_data(&mut self, data: &str) -> Result<Response> {
        let payload = dot_stuff(data);

        outgoing!("[{} bytes of message data]", payload.len());
        self.transmit(payload.as_bytes()).await?;
        self.transmit(b".\r\n").await?;

        self.read_response().await
    }

    /// Authenticates with AUTH PLAIN (RFC 4616).
    ///
    /// Returns the server's final response; 235 indicates acceptance.
    ///
    /// # Errors
    ///
    /// Returns an error if sending or reading fails.
    pub async fn auth_plain(&mut self, username: &str, password: &str) -> Result<Response> {
        let credentials = BASE64_STANDARD.encode(format!("\0{username}\0{password}"));

        outgoing!("AUTH PLAIN [redacted]");
        self.transmit(format!("AUTH PLAIN {credentials}\r\n").as_bytes())
            .await?;
        self.read_response().await
    }

    /// Authenticates with AUTH LOGIN, answering the two 334 challenges.
    ///
    /// Returns the server's final response; 235 indicates acceptance.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::UnexpectedResponse` if the server fails to
    /// issue a 334 challenge mid-exchange, or an error if I/O fails.
    pub async fn auth_login(&mut self, username: &str, password: &str) -> Result<Response> {
        let response = self.command("AUTH LOGIN").await?;
        if !response.is_intermediate() {
            return Err(ClientError::UnexpectedResponse {
                code: response.code,
                message: response.message(),
            });
        }

        outgoing!("[redacted username]");
        self.transmit(format!("{}\r\n", BASE64_STANDARD.encode(username)).as_bytes())
            .await?;
        let response = self.read_response().await?;
        if !response.is_intermediate() {
            return Err(ClientError::UnexpectedResponse {
                code: response.code,
                message: response.message(),
            });
        }

        outgoing!("[redacted password]");
        self.transmit(format!("{}\r\n", BASE64_STANDARD.encode(password)).as_bytes())
            .await?;
        self.read_response().await
    }

    /// Sends RSET command to reset the transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails.
    pub async fn rset(&mut self) -> Result<Response> {
        self.command("RSET").await
    }

    /// Sends QUIT command.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails.
    pub async fn quit(&mut self) -> Result<Response> {
        self.command("QUIT").await
    }

    /// Returns all responses received so far.
    #[must_use]
    pub fn responses(&self) -> &[Response] {
        &self.responses
    }

    /// Writes raw bytes to the connection.
    async fn transmit(&mut self, data: &[u8]) -> Result<()> {
        self.connection
            .as_mut()
            .ok_or(ClientError::ConnectionClosed)?
            .write_all(data)
            .await?;
        Ok(())
    }

    /// Reads a complete SMTP response from the server.
    ///
    /// # Errors
    ///
    /// Returns an error if reading fails or the response is malformed.
    async fn read_response(&mut self) -> Result<Response> {
        loop {
            // Try to parse a complete response from the buffer
            if let Some((response, consumed)) =
                Response::parse_response(&self.buffer[..self.buffer_pos])?
            {
                // Remove consumed bytes from buffer
                self.buffer.copy_within(consumed..self.buffer_pos, 0);
                self.buffer_pos -= consumed;

                incoming!("{} {}", response.code, response.message());
                self.responses.push(response.clone());

                return Ok(response);
            }

            // Need more data - read from connection
            if self.buffer_pos >= self.buffer.len() {
                // Buffer is full but no complete response - expand buffer
                let new_size = self.buffer.len() * 2;
                if new_size > MAX_BUFFER_SIZE {
                    return Err(ClientError::ParseError(format!(
                        "Response too large (exceeds {MAX_BUFFER_SIZE} bytes)"
                    )));
                }
                self.buffer.resize(new_size, 0);
            }

            let connection = self
                .connection
                .as_mut()
                .ok_or(ClientError::ConnectionClosed)?;
            let n = connection.read(&mut self.buffer[self.buffer_pos..]).await?;
            if n == 0 {
                return Err(ClientError::ConnectionClosed);
            }
            self.buffer_pos += n;
        }
    }
}

/// Normalize line endings to CRLF and escape leading dots.
fn dot_stuff(data: &str) -> String {
    let mut payload = String::with_capacity(data.len() + 2);

    for line in data.split_inclusive('\n') {
        let content = line
            .strip_suffix('\n')
            .map_or(line, |rest| rest.strip_suffix('\r').unwrap_or(rest));

        if content.starts_with('.') {
            payload.push('.');
        }
        payload.push_str(content);
        payload.push_str("\r\n");
    }

    payload
}

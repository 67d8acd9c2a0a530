//! LSP message framing layer
//!
//! Wraps a raw transport with the base-protocol header framing:
//! `Content-Length: <length>\r\n\r\n<content>`

use crate::io::transport::Transport;
use async_trait::async_trait;
use std::collections::VecDeque;
use tracing::trace;

/// Error types for LSP framing
#[derive(Debug, thiserror::Error)]
pub enum LspFramingError<T: std::error::Error + Send + Sync + 'static> {
    #[error("Transport error: {0}")]
    Transport(T),

    #[error("Invalid LSP message format: {0}")]
    InvalidFormat(String),

    #[error("Invalid content length: {0}")]
    InvalidContentLength(String),

    #[error("Message too large: {size} bytes (max: {max})")]
    MessageTooLarge { size: usize, max: usize },
}

/// Maximum message size to prevent memory exhaustion
const MAX_MESSAGE_SIZE: usize = 16 * 1024 * 1024; // 16MB

const HEADER_SEPARATOR: &str = "\r\n\r\n";

/// LSP message framing wrapper around any transport
pub struct LspFraming<T: Transport> {
    transport: T,
    receive_buffer: String,
    message_queue: VecDeque<String>,
}

impl<T: Transport> LspFraming<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            receive_buffer: String::new(),
            message_queue: VecDeque::new(),
        }
    }

    #[cfg(test)]
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Frame a message body for sending
    pub fn frame(message: &str) -> String {
        format!("Content-Length: {}{}{}", message.len(), HEADER_SEPARATOR, message)
    }

    /// Returns Some(message) if a complete message sits at the front of the buffer
    fn try_parse_message(&mut self) -> Result<Option<String>, LspFramingError<T::Error>> {
        let Some(header_end) = self.receive_buffer.find(HEADER_SEPARATOR) else {
            return Ok(None);
        };

        let content_length = Self::parse_content_length(&self.receive_buffer[..header_end])?;
        let content_start = header_end + HEADER_SEPARATOR.len();
        let content_end = content_start + content_length;

        if self.receive_buffer.len() < content_end {
            trace!(
                "LspFraming: Incomplete message - need {} more bytes",
                content_end - self.receive_buffer.len()
            );
            return Ok(None);
        }

        let message = self
            .receive_buffer
            .get(content_start..content_end)
            .ok_or_else(|| {
                LspFramingError::InvalidFormat(
                    "Content-Length does not end on a character boundary".to_string(),
                )
            })?
            .to_string();
        self.receive_buffer.drain(..content_end);

        trace!("LspFraming: Parsed complete message ({} bytes)", content_length);
        Ok(Some(message))
    }

    fn parse_content_length(header: &str) -> Result<usize, LspFramingError<T::Error>> {
        let length_str = header
            .lines()
            .find_map(|line| line.strip_prefix("Content-Length:"))
            .map(str::trim)
            .ok_or_else(|| {
                LspFramingError::InvalidFormat("Missing Content-Length header".to_string())
            })?;

        let length = length_str
            .parse::<usize>()
            .map_err(|_| LspFramingError::InvalidContentLength(length_str.to_string()))?;

        if length > MAX_MESSAGE_SIZE {
            return Err(LspFramingError::MessageTooLarge {
                size: length,
                max: MAX_MESSAGE_SIZE,
            });
        }

        Ok(length)
    }
}

#[async_trait]
impl<T: Transport> Transport for LspFraming<T> {
    type Error = LspFramingError<T::Error>;

    async fn send(&mut self, message: &str) -> Result<(), Self::Error> {
        trace!("LspFraming: Sending framed message ({} bytes content)", message.len());

        self.transport
            .send(&Self::frame(message))
            .await
            .map_err(LspFramingError::Transport)
    }

    async fn receive(&mut self) -> Result<String, Self::Error> {
        loop {
            if let Some(message) = self.message_queue.pop_front() {
                return Ok(message);
            }

            let new_data = self
                .transport
                .receive()
                .await
                .map_err(LspFramingError::Transport)?;
            self.receive_buffer.push_str(&new_data);

            while let Some(message) = self.try_parse_message()? {
                self.message_queue.push_back(message);
            }
        }
    }

    async fn close(&mut self) -> Result<(), Self::Error> {
        self.transport
            .close()
            .await
            .map_err(LspFramingError::Transport)
    }
}

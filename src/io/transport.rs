//! Transport layer - Pure I/O abstraction for message exchange
//!
//! Moves raw text between this process and a language server without any
//! knowledge of message framing or process lifecycle.

use async_trait::async_trait;
#[cfg(test)]
use std::collections::VecDeque;
use std::io;
#[cfg(test)]
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::{ChildStdin, ChildStdout};
use tokio::sync::mpsc;
use tracing::{error, trace};

/// Size of a single stdout read
const READ_CHUNK_SIZE: usize = 8 * 1024;

/// Core transport trait for bidirectional message exchange
#[async_trait]
pub trait Transport: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Send a message (raw string)
    async fn send(&mut self, message: &str) -> Result<(), Self::Error>;

    /// Receive the next chunk of raw text
    async fn receive(&mut self) -> Result<String, Self::Error>;

    /// Close the transport
    async fn close(&mut self) -> Result<(), Self::Error>;
}

// ============================================================================
// Stdio Transport Implementation
// ============================================================================

/// Error types for stdio transport
#[derive(Debug, thiserror::Error)]
pub enum StdioTransportError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Transport is disconnected")]
    Disconnected,

    #[error("Channel error: {0}")]
    Channel(String),
}

/// Transport implementation using a child's stdin/stdout streams
pub struct StdioTransport {
    stdin_sender: Option<mpsc::UnboundedSender<String>>,
    stdout_receiver: Option<mpsc::UnboundedReceiver<String>>,
    connected: bool,
}

impl StdioTransport {
    /// Create a new StdioTransport from child process streams
    pub fn new(stdin: ChildStdin, stdout: ChildStdout) -> Self {
        let (stdin_sender, stdin_receiver) = mpsc::unbounded_channel();
        let (stdout_sender, stdout_receiver) = mpsc::unbounded_channel();

        tokio::spawn(Self::stdin_writer_task(stdin, stdin_receiver));
        tokio::spawn(Self::stdout_reader_task(stdout, stdout_sender));

        Self {
            stdin_sender: Some(stdin_sender),
            stdout_receiver: Some(stdout_receiver),
            connected: true,
        }
    }

    async fn stdin_writer_task(
        mut stdin: ChildStdin,
        mut receiver: mpsc::UnboundedReceiver<String>,
    ) {
        while let Some(message) = receiver.recv().await {
            trace!("StdioTransport: Writing to stdin: {}", message);

            if let Err(e) = stdin.write_all(message.as_bytes()).await {
                error!("Failed to write to stdin: {}", e);
                break;
            }

            if let Err(e) = stdin.flush().await {
                error!("Failed to flush stdin: {}", e);
                break;
            }
        }

        trace!("StdioTransport: stdin writer task finished");
    }

    /// Reads raw bytes from stdout and forwards every complete UTF-8 prefix.
    ///
    /// LSP bodies are not newline terminated, so reading line by line would
    /// hold the last message of a burst until the server writes again.
    async fn stdout_reader_task(mut stdout: ChildStdout, sender: mpsc::UnboundedSender<String>) {
        let mut chunk = vec![0u8; READ_CHUNK_SIZE];
        let mut pending: Vec<u8> = Vec::new();

        loop {
            match stdout.read(&mut chunk).await {
                Ok(0) => {
                    trace!("StdioTransport: stdout reader reached EOF");
                    break;
                }
                Ok(n) => {
                    pending.extend_from_slice(&chunk[..n]);
                    let text = take_utf8_prefix(&mut pending);
                    if text.is_empty() {
                        continue;
                    }

                    trace!("StdioTransport: Read {} bytes from stdout", text.len());
                    if sender.send(text).is_err() {
                        trace!("StdioTransport: stdout receiver dropped, stopping reader");
                        break;
                    }
                }
                Err(e) => {
                    error!("Failed to read from stdout: {}", e);
                    break;
                }
            }
        }

        trace!("StdioTransport: stdout reader task finished");
    }
}

/// Drain the longest valid UTF-8 prefix out of `buffer`.
///
/// A multi-byte character split across two reads stays in the buffer until
/// the rest of it arrives. Invalid sequences are replaced rather than kept.
fn take_utf8_prefix(buffer: &mut Vec<u8>) -> String {
    let valid_up_to = match std::str::from_utf8(buffer) {
        Ok(_) => buffer.len(),
        Err(e) if e.error_len().is_none() => e.valid_up_to(),
        Err(_) => {
            let text = String::from_utf8_lossy(buffer).into_owned();
            buffer.clear();
            return text;
        }
    };

    let rest = buffer.split_off(valid_up_to);
    let prefix = std::mem::replace(buffer, rest);
    // Validated above
    String::from_utf8(prefix).unwrap_or_default()
}

#[async_trait]
impl Transport for StdioTransport {
    type Error = StdioTransportError;

    async fn send(&mut self, message: &str) -> Result<(), Self::Error> {
        if !self.connected {
            return Err(StdioTransportError::Disconnected);
        }

        let sender = self
            .stdin_sender
            .as_ref()
            .ok_or(StdioTransportError::Disconnected)?;

        sender
            .send(message.to_string())
            .map_err(|e| StdioTransportError::Channel(e.to_string()))?;

        Ok(())
    }

    async fn receive(&mut self) -> Result<String, Self::Error> {
        if !self.connected {
            return Err(StdioTransportError::Disconnected);
        }

        let receiver = self
            .stdout_receiver
            .as_mut()
            .ok_or(StdioTransportError::Disconnected)?;

        receiver
            .recv()
            .await
            .ok_or(StdioTransportError::Disconnected)
    }

    async fn close(&mut self) -> Result<(), Self::Error> {
        self.connected = false;
        self.stdin_sender.take();
        self.stdout_receiver.take();
        Ok(())
    }
}

// ============================================================================
// Mock Transport Implementation
// ============================================================================

#[cfg(test)]
/// Error type for mock transport
#[derive(Debug, thiserror::Error)]
pub enum MockTransportError {
    #[error("Transport is disconnected")]
    Disconnected,
    #[error("No more responses available")]
    NoMoreResponses,
}

#[cfg(test)]
/// Mock transport for testing - records sent messages and replays scripted responses
#[derive(Clone)]
pub struct MockTransport {
    sent_messages: Arc<Mutex<Vec<String>>>,
    responses: Arc<Mutex<VecDeque<String>>>,
    connected: bool,
}

#[cfg(test)]
impl MockTransport {
    pub fn new() -> Self {
        Self {
            sent_messages: Arc::new(Mutex::new(Vec::new())),
            responses: Arc::new(Mutex::new(VecDeque::new())),
            connected: true,
        }
    }

    /// Create a mock transport with predefined responses
    pub fn with_responses(responses: Vec<String>) -> Self {
        let transport = Self::new();
        transport.responses.lock().unwrap().extend(responses);
        transport
    }

    /// Get all messages that were sent via this transport
    pub fn sent_messages(&self) -> Vec<String> {
        self.sent_messages.lock().unwrap().clone()
    }
}

#[cfg(test)]
impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[async_trait]
impl Transport for MockTransport {
    type Error = MockTransportError;

    async fn send(&mut self, message: &str) -> Result<(), Self::Error> {
        if !self.connected {
            return Err(MockTransportError::Disconnected);
        }

        self.sent_messages.lock().unwrap().push(message.to_string());
        Ok(())
    }

    async fn receive(&mut self) -> Result<String, Self::Error> {
        if !self.connected {
            return Err(MockTransportError::Disconnected);
        }

        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .ok_or(MockTransportError::NoMoreResponses)
    }

    async fn close(&mut self) -> Result<(), Self::Error> {
        self.connected = false;
        Ok(())
    }
}

// ============================================================================
// Channel Transport (for testing)
// ============================================================================

/// Transport whose peer is driven from a test through a [`ChannelTransportHandle`]
///
/// Unlike [`MockTransport`], `receive()` waits for the test to push data,
/// which lets a test act as a language server answering requests.
#[cfg(test)]
pub struct ChannelTransport {
    outgoing: mpsc::UnboundedSender<String>,
    incoming: mpsc::UnboundedReceiver<String>,
    connected: bool,
}

/// Test-side end of a [`ChannelTransport`]
#[cfg(test)]
pub struct ChannelTransportHandle {
    pub sent: mpsc::UnboundedReceiver<String>,
    pub inbound: mpsc::UnboundedSender<String>,
}

#[cfg(test)]
impl ChannelTransport {
    pub fn pair() -> (Self, ChannelTransportHandle) {
        let (outgoing, sent) = mpsc::unbounded_channel();
        let (inbound, incoming) = mpsc::unbounded_channel();
        (
            Self {
                outgoing,
                incoming,
                connected: true,
            },
            ChannelTransportHandle { sent, inbound },
        )
    }
}

#[cfg(test)]
#[async_trait]
impl Transport for ChannelTransport {
    type Error = MockTransportError;

    async fn send(&mut self, message: &str) -> Result<(), Self::Error> {
        self.outgoing
            .send(message.to_string())
            .map_err(|_| MockTransportError::Disconnected)
    }

    async fn receive(&mut self) -> Result<String, Self::Error> {
        self.incoming
            .recv()
            .await
            .ok_or(MockTransportError::Disconnected)
    }

    async fn close(&mut self) -> Result<(), Self::Error> {
        self.connected = false;
        self.incoming.close();
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

//! Message queue protocol between background workers and the caller.
//!
//! Every invocation gets its own channel. The worker owns the
//! [`MessageSender`], the caller owns the [`MessageReceiver`] and polls it
//! until a terminal message arrives. A sender can only emit its terminal
//! message by consuming itself, so nothing can follow it and it cannot be
//! sent twice. A sender dropped without finishing (worker panic, failed
//! thread spawn) emits a terminal error from its `Drop`.

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Topic used when a sender is dropped without reporting a result.
const ABANDONED_TOPIC: &str = "worker";

// =============================================================================
// Messages
// =============================================================================

/// Status tag carried by every message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    /// Progress or payload.
    Info,
    /// Completed successfully.
    Success,
    /// Tolerated anomaly, e.g. an output line that could not be parsed.
    Warning,
    /// Failure.
    Error,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Success => "success",
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One unit of the protocol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub status: Status,
    /// Short category: the operation name or phase.
    pub topic: String,
    /// Human-readable detail or raw captured output.
    pub data: String,
    #[serde(default)]
    terminal: bool,
}

impl Message {
    /// Creates a non-terminal message.
    pub fn new(status: Status, topic: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            status,
            topic: topic.into(),
            data: data.into(),
            terminal: false,
        }
    }

    pub fn info(topic: impl Into<String>, data: impl Into<String>) -> Self {
        Self::new(Status::Info, topic, data)
    }

    pub fn warning(topic: impl Into<String>, data: impl Into<String>) -> Self {
        Self::new(Status::Warning, topic, data)
    }

    fn terminal(success: bool, topic: impl Into<String>, data: impl Into<String>) -> Self {
        let status = if success { Status::Success } else { Status::Error };
        Self {
            terminal: true,
            ..Self::new(status, topic, data)
        }
    }

    /// True for the single success-or-error message that closes a queue.
    pub fn is_terminal(&self) -> bool {
        self.terminal
    }

    pub fn is_success(&self) -> bool {
        self.status == Status::Success
    }

    pub fn is_error(&self) -> bool {
        self.status == Status::Error
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.topic.is_empty() {
            write!(f, "[{}] {}", self.status, self.data)
        } else {
            write!(f, "[{}] {}: {}", self.status, self.topic, self.data)
        }
    }
}

// =============================================================================
// Channel
// =============================================================================

/// Creates the queue for one invocation.
pub fn message_channel() -> (MessageSender, MessageReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (
        MessageSender {
            tx,
            finished: false,
        },
        MessageReceiver { rx },
    )
}

/// Producer half, owned by exactly one worker.
#[derive(Debug)]
pub struct MessageSender {
    tx: mpsc::UnboundedSender<Message>,
    finished: bool,
}

impl MessageSender {
    /// Enqueues a non-terminal message.
    ///
    /// A caller that stopped polling has dropped its receiver; the message is
    /// discarded and the worker carries on.
    pub fn send(&self, message: Message) {
        debug_assert!(!message.is_terminal());
        self.push(message);
    }

    pub fn info(&self, topic: &str, data: impl Into<String>) {
        self.send(Message::info(topic, data));
    }

    pub fn warning(&self, topic: &str, data: impl Into<String>) {
        self.send(Message::warning(topic, data));
    }

    /// Closes the invocation with a success message.
    pub fn finish_success(self, topic: &str, data: impl Into<String>) {
        self.finish(Message::terminal(true, topic, data));
    }

    /// Closes the invocation with an error message.
    pub fn finish_error(self, topic: &str, data: impl Into<String>) {
        self.finish(Message::terminal(false, topic, data));
    }

    fn finish(mut self, message: Message) {
        debug!(topic = %message.topic, status = %message.status, "Invocation finished");
        self.finished = true;
        self.push(message);
    }

    fn push(&self, message: Message) {
        if self.tx.send(message).is_err() {
            debug!("Receiver dropped, discarding message");
        }
    }
}

impl Drop for MessageSender {
    fn drop(&mut self) {
        if !self.finished {
            warn!("Worker stopped without reporting a result");
            self.push(Message::terminal(
                false,
                ABANDONED_TOPIC,
                "Background worker stopped before reporting a result",
            ));
        }
    }
}

/// Consumer half, owned by the caller.
#[derive(Debug)]
pub struct MessageReceiver {
    rx: mpsc::UnboundedReceiver<Message>,
}

impl MessageReceiver {
    /// Returns the next queued message without blocking.
    ///
    /// Intended for UI timers: `None` means nothing is queued yet.
    pub fn try_next(&mut self) -> Option<Message> {
        self.rx.try_recv().ok()
    }

    /// Waits for the next message. Returns `None` once the queue is closed
    /// and empty.
    pub async fn recv(&mut self) -> Option<Message> {
        self.rx.recv().await
    }

    /// Blocking variant of [`recv`](Self::recv).
    ///
    /// Must not be called from inside an async runtime.
    pub fn recv_blocking(&mut self) -> Option<Message> {
        self.rx.blocking_recv()
    }

    /// Blocks until the terminal message and returns everything received, in
    /// order, terminal message last.
    pub fn drain_until_terminal(&mut self) -> Vec<Message> {
        let mut messages = Vec::new();
        while let Some(message) = self.recv_blocking() {
            let done = message.is_terminal();
            messages.push(message);
            if done {
                break;
            }
        }
        messages
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_preserved_and_terminal_last() {
        let (tx, mut rx) = message_channel();
        tx.info("compile", "one");
        tx.warning("compile", "two");
        tx.send(Message::new(Status::Success, "compile", "three"));
        tx.finish_success("compile", "done");

        let messages = rx.drain_until_terminal();
        let data: Vec<_> = messages.iter().map(|m| m.data.as_str()).collect();
        assert_eq!(data, vec!["one", "two", "three", "done"]);
        assert_eq!(messages.iter().filter(|m| m.is_terminal()).count(), 1);
        assert!(messages.last().unwrap().is_terminal());
        assert!(messages.last().unwrap().is_success());
        assert!(rx.try_next().is_none());
    }

    #[test]
    fn test_non_terminal_success_record() {
        let m = Message::new(Status::Success, "upload", "{}");
        assert!(m.is_success());
        assert!(!m.is_terminal());
    }

    #[test]
    fn test_dropped_sender_emits_terminal_error() {
        let (tx, mut rx) = message_channel();
        tx.info("download", "Downloaded 10%");
        drop(tx);

        let messages = rx.drain_until_terminal();
        assert_eq!(messages.len(), 2);
        let last = &messages[1];
        assert!(last.is_terminal());
        assert!(last.is_error());
        assert_eq!(last.topic, ABANDONED_TOPIC);
    }

    #[test]
    fn test_send_after_receiver_dropped_is_harmless() {
        let (tx, rx) = message_channel();
        drop(rx);
        tx.info("version", "ignored");
        tx.finish_error("version", "ignored");
    }

    #[test]
    fn test_try_next_empty_queue() {
        let (_tx, mut rx) = message_channel();
        assert!(rx.try_next().is_none());
    }

    #[tokio::test]
    async fn test_async_recv() {
        let (tx, mut rx) = message_channel();
        std::thread::spawn(move || {
            tx.info("version", "working");
            tx.finish_success("version", "0.35.3");
        });

        let first = rx.recv().await.unwrap();
        assert_eq!(first.status, Status::Info);
        let second = rx.recv().await.unwrap();
        assert!(second.is_terminal());
        assert_eq!(second.data, "0.35.3");
        assert!(rx.recv().await.is_none());
    }

    #[test]
    fn test_message_display() {
        let m = Message::warning("compile", "garbage");
        assert_eq!(m.to_string(), "[warning] compile: garbage");
    }

    #[test]
    fn test_status_serializes_lowercase() {
        let json = serde_json::to_string(&Status::Warning).unwrap();
        assert_eq!(json, "\"warning\"");
    }
}

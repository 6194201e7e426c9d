use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::TransportMessage;
use crate::error::ConsumerError;

/// Pulls messages from a transport
#[async_trait]
pub trait MessageConsumer: Send {
    /// Wait up to `timeout` for the next message. `Ok(None)` means nothing
    /// arrived in time or the stream has ended.
    async fn next_message(&mut self, timeout: Duration) -> Result<Option<TransportMessage>, ConsumerError>;
}

/// In-process consumer fed through a tokio channel
pub struct ChannelConsumer {
    receiver: mpsc::Receiver<TransportMessage>,
    shutdown: CancellationToken,
}

impl ChannelConsumer {
    pub fn new(receiver: mpsc::Receiver<TransportMessage>) -> Self {
        Self {
            receiver,
            shutdown: CancellationToken::new(),
        }
    }

    /// Create a consumer and the sender that feeds it
    pub fn channel(capacity: usize) -> (mpsc::Sender<TransportMessage>, Self) {
        let (sender, receiver) = mpsc::channel(capacity);
        (sender, Self::new(receiver))
    }

    pub fn with_shutdown(mut self, token: CancellationToken) -> Self {
        self.shutdown = token;
        self
    }
}

#[async_trait]
impl MessageConsumer for ChannelConsumer {
    async fn next_message(&mut self, timeout: Duration) -> Result<Option<TransportMessage>, ConsumerError> {
        tokio::select! {
            _ = self.shutdown.cancelled() => Err(ConsumerError::Interrupted),
            received = tokio::time::timeout(timeout, self.receiver.recv()) => Ok(received.ok().flatten()),
        }
    }
}

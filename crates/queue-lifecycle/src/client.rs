//! Client traits for the managed queue service.
//!
//! The service exposes two surfaces: an administrative API that provisions
//! queues and a data-plane API that moves messages. Both are remote and may
//! fail on any call.

use crate::error::QueueError;
use crate::message::{OutgoingMessage, QueueName, ReceivedMessage, SequenceNumber};
use crate::queue::{QueueConfig, ReceiverOptions, SubQueue};
use async_trait::async_trait;

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;

/// Management endpoint of the queue service
#[async_trait]
pub trait AdministrationClient: Send + Sync {
    /// Check whether a queue with this name exists
    async fn queue_exists(&self, name: &QueueName) -> Result<bool, QueueError>;

    /// Create a queue. `Ok(None)` means the service accepted the call but
    /// returned no description; callers retry.
    async fn create_queue(&self, config: &QueueConfig) -> Result<Option<QueueConfig>, QueueError>;

    /// Delete a queue
    async fn delete_queue(&self, name: &QueueName) -> Result<(), QueueError>;

    /// Read a queue description. Fails while the queue is absent or still provisioning.
    async fn get_queue(&self, name: &QueueName) -> Result<QueueConfig, QueueError>;
}

/// Data-plane endpoint of the queue service
#[async_trait]
pub trait MessagingClient: Send + Sync {
    /// Create a sender bound to one queue
    async fn create_sender(&self, queue: &QueueName) -> Result<Box<dyn MessageSender>, QueueError>;

    /// Create a peek-lock receiver bound to one queue or its dead-letter sub-queue
    async fn create_receiver(
        &self,
        queue: &QueueName,
        options: ReceiverOptions,
    ) -> Result<Box<dyn MessageReceiver>, QueueError>;

    /// Close the client. Senders and receivers created afterwards fail.
    async fn close(&self) -> Result<(), QueueError>;

    /// Check if close has been called
    fn is_closed(&self) -> bool;
}

/// Sends batches of messages to one queue
#[async_trait]
pub trait MessageSender: Send + Sync {
    /// Create an empty batch sized to the service's limit
    async fn create_batch(&self) -> Result<MessageBatch, QueueError>;

    /// Send every message in the batch atomically
    async fn send_batch(&self, batch: MessageBatch) -> Result<(), QueueError>;

    /// Release the sender
    async fn close(&self) -> Result<(), QueueError>;

    /// Queue this sender writes to
    fn queue_name(&self) -> &QueueName;
}

/// Peek-lock receiver over one queue or sub-queue
#[async_trait]
pub trait MessageReceiver: Send + Sync {
    /// Read up to `max_messages` from the head without locking
    async fn peek_messages(&self, max_messages: u32) -> Result<Vec<ReceivedMessage>, QueueError>;

    /// Lock and return up to `max_messages` active messages
    async fn receive_messages(&self, max_messages: u32)
        -> Result<Vec<ReceivedMessage>, QueueError>;

    /// Lock and return a deferred message addressed by sequence number
    async fn receive_deferred_message(
        &self,
        sequence_number: SequenceNumber,
    ) -> Result<ReceivedMessage, QueueError>;

    /// Remove a locked message permanently
    async fn complete_message(&self, message: &ReceivedMessage) -> Result<(), QueueError>;

    /// Release the lock so the message can be received again
    async fn abandon_message(&self, message: &ReceivedMessage) -> Result<(), QueueError>;

    /// Set a locked message aside; it can then only be received by sequence number
    async fn defer_message(&self, message: &ReceivedMessage) -> Result<(), QueueError>;

    /// Move a locked message to the dead-letter sub-queue
    async fn dead_letter_message(
        &self,
        message: &ReceivedMessage,
        reason: &str,
        error_description: Option<&str>,
    ) -> Result<(), QueueError>;

    /// Release the receiver
    async fn close(&self) -> Result<(), QueueError>;

    /// Queue this receiver reads from
    fn queue_name(&self) -> &QueueName;

    /// Sub-queue this receiver reads from
    fn sub_queue(&self) -> SubQueue;
}

/// Size-bounded set of messages sent in one call
#[derive(Debug)]
pub struct MessageBatch {
    max_size_in_bytes: usize,
    size_in_bytes: usize,
    messages: Vec<OutgoingMessage>,
}

impl MessageBatch {
    /// Create empty batch with a size limit
    pub fn new(max_size_in_bytes: usize) -> Self {
        Self {
            max_size_in_bytes,
            size_in_bytes: 0,
            messages: Vec::new(),
        }
    }

    /// Add a message if it fits, otherwise hand it back unchanged
    pub fn try_add_message(&mut self, message: OutgoingMessage) -> Result<(), OutgoingMessage> {
        let size = message.size_in_bytes();
        if self.size_in_bytes + size > self.max_size_in_bytes {
            return Err(message);
        }

        self.size_in_bytes += size;
        self.messages.push(message);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn size_in_bytes(&self) -> usize {
        self.size_in_bytes
    }

    pub fn max_size_in_bytes(&self) -> usize {
        self.max_size_in_bytes
    }

    pub fn messages(&self) -> &[OutgoingMessage] {
        &self.messages
    }

    pub fn into_messages(self) -> Vec<OutgoingMessage> {
        self.messages
    }
}

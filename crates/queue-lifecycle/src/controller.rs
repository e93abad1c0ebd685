//! # Queue Lifecycle Controller
//!
//! Drives one named queue through provisioning, population and draining.
//!
//! The controller owns no message state. Every read returns the snapshots it
//! observed and the caller decides where to keep them (see
//! [`LocalCaches`](crate::caches::LocalCaches)). Both service handles are
//! injected and closed explicitly through [`QueueLifecycleController::close`].
//!
//! Polling loops are bounded by the [`RetryPolicy`] values in
//! [`LifecycleSettings`]; exhausting one yields [`QueueError::Timeout`].

use crate::client::{AdministrationClient, MessageReceiver, MessageSender, MessagingClient};
use crate::error::{QueueError, ValidationError};
use crate::message::{MessageState, OutgoingMessage, QueueName, ReceivedMessage, SequenceNumber, Timestamp};
use crate::queue::{QueueConfig, ReceiverOptions, SubQueue};
use crate::retry::RetryPolicy;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

#[cfg(test)]
#[path = "controller_tests.rs"]
mod tests;

/// Reason recorded when the controller dead-letters a message itself
pub const EXPLICIT_DEAD_LETTER_REASON: &str = "ExplicitDeadLetter";

/// Description recorded when the controller dead-letters a message itself
pub const EXPLICIT_DEAD_LETTER_DESCRIPTION: &str = "Moved to the dead-letter sub-queue on request";

// ============================================================================
// Settings and Results
// ============================================================================

/// Retry bounds for the two polling loops
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LifecycleSettings {
    /// Bound on create calls answered without a queue description
    pub provisioning: RetryPolicy,

    /// Bound on failed reads while a new queue becomes readable
    pub readiness: RetryPolicy,
}

/// Result of [`QueueLifecycleController::ensure_queue_exists`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProvisionOutcome {
    /// A queue with this name was already present
    AlreadyExists,

    /// The create call returned a description
    Created,

    /// The create call failed; the failure was logged and swallowed
    CreationFailed { error: String },
}

impl ProvisionOutcome {
    /// Check if the queue is known to exist after provisioning
    pub fn is_available(&self) -> bool {
        matches!(self, Self::AlreadyExists | Self::Created)
    }
}

/// What a send operation put on the wire
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendSummary {
    pub messages_sent: usize,
    pub batches: usize,
}

/// Outcome of releasing locks early
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbandonSummary {
    pub released: usize,
    pub failed: usize,
}

// ============================================================================
// Controller
// ============================================================================

/// Lifecycle operations over injected administration and data-plane clients
pub struct QueueLifecycleController {
    admin: Arc<dyn AdministrationClient>,
    messaging: Arc<dyn MessagingClient>,
    settings: LifecycleSettings,
}

impl QueueLifecycleController {
    /// Create a controller over already-opened client handles
    pub fn new(
        admin: Arc<dyn AdministrationClient>,
        messaging: Arc<dyn MessagingClient>,
        settings: LifecycleSettings,
    ) -> Self {
        Self {
            admin,
            messaging,
            settings,
        }
    }

    pub fn settings(&self) -> &LifecycleSettings {
        &self.settings
    }

    /// Idempotent create.
    ///
    /// A failed existence check is treated as "absent". A create call that
    /// returns no description is retried under the provisioning policy. A
    /// create call that fails is logged and reported as
    /// [`ProvisionOutcome::CreationFailed`] without aborting the caller.
    ///
    /// # Errors
    ///
    /// * [`QueueError::ValidationError`] if `config` is invalid
    /// * [`QueueError::Timeout`] if every create attempt returned no description
    #[instrument(skip(self, config), fields(queue = %config.name))]
    pub async fn ensure_queue_exists(&self, config: &QueueConfig) -> Result<ProvisionOutcome, QueueError> {
        config.validate()?;

        let exists = match self.admin.queue_exists(&config.name).await {
            Ok(exists) => exists,
            Err(e) => {
                warn!(error = %e, "Existence check failed, assuming queue is absent");
                false
            }
        };

        if exists {
            debug!("Queue already exists");
            return Ok(ProvisionOutcome::AlreadyExists);
        }

        let policy = &self.settings.provisioning;
        let mut attempts = 0;

        loop {
            attempts += 1;
            match self.admin.create_queue(config).await {
                Ok(Some(_)) => {
                    info!(attempts, "Queue created");
                    return Ok(ProvisionOutcome::Created);
                }
                Ok(None) => {
                    if !policy.should_retry(attempts) {
                        return Err(QueueError::Timeout {
                            operation: format!("create queue '{}'", config.name),
                            attempts,
                        });
                    }

                    let delay = policy.calculate_delay(attempts - 1);
                    debug!(
                        attempts,
                        delay_ms = delay.as_millis() as u64,
                        "Create returned no description, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    warn!(error = %e, "Queue creation failed, continuing without it");
                    return Ok(ProvisionOutcome::CreationFailed {
                        error: e.to_string(),
                    });
                }
            }
        }
    }

    /// Delete the queue if present. Returns whether a delete was issued.
    #[instrument(skip(self), fields(queue = %name))]
    pub async fn delete_queue_if_exists(&self, name: &QueueName) -> Result<bool, QueueError> {
        if !self.admin.queue_exists(name).await? {
            debug!("Queue absent, nothing to delete");
            return Ok(false);
        }

        match self.admin.delete_queue(name).await {
            Ok(()) => {
                info!("Queue deleted");
                Ok(true)
            }
            // Removed between the check and the delete.
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Poll the management endpoint until the queue description can be read.
    ///
    /// # Errors
    ///
    /// [`QueueError::Timeout`] once the readiness policy is exhausted.
    #[instrument(skip(self), fields(queue = %name))]
    pub async fn wait_until_ready(&self, name: &QueueName) -> Result<QueueConfig, QueueError> {
        let policy = &self.settings.readiness;
        let mut attempts = 0;

        loop {
            attempts += 1;
            match self.admin.get_queue(name).await {
                Ok(config) => {
                    info!(attempts, "Queue is ready for consumption");
                    return Ok(config);
                }
                Err(e) => {
                    if !policy.should_retry(attempts) {
                        return Err(QueueError::Timeout {
                            operation: format!("wait for queue '{}'", name),
                            attempts,
                        });
                    }

                    let delay = e
                        .retry_after()
                        .unwrap_or_else(|| policy.calculate_delay(attempts - 1))
                        .min(policy.max_delay);
                    warn!(
                        attempts,
                        error = %e,
                        "Queue not readable yet, service may still be provisioning it"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    /// Delete, recreate and wait for the queue so a scenario starts empty
    #[instrument(skip(self, config), fields(queue = %config.name))]
    pub async fn clean_up(&self, config: &QueueConfig) -> Result<ProvisionOutcome, QueueError> {
        self.delete_queue_if_exists(&config.name).await?;
        let outcome = self.ensure_queue_exists(config).await?;
        self.wait_until_ready(&config.name).await?;
        info!("Queue clean up complete");
        Ok(outcome)
    }

    // ------------------------------------------------------------------------
    // Sending
    // ------------------------------------------------------------------------

    /// Send `count` generated messages with a per-message time-to-live
    pub async fn send_messages(
        &self,
        queue: &QueueName,
        count: usize,
        ttl: Duration,
    ) -> Result<SendSummary, QueueError> {
        let messages = (0..count)
            .map(|i| {
                OutgoingMessage::new(Bytes::from(format!(
                    "message body: UTC time: {} - Item number: {} ",
                    Timestamp::now(),
                    i
                )))
                .with_ttl(ttl)
            })
            .collect();

        self.send_batched(queue, messages).await
    }

    /// Send `count` generated messages that become visible after `delay`
    pub async fn send_scheduled_messages(
        &self,
        queue: &QueueName,
        count: usize,
        delay: Duration,
    ) -> Result<SendSummary, QueueError> {
        let enqueue_at = Timestamp::now()
            .checked_add(delay)
            .ok_or_else(|| ValidationError::OutOfRange {
                field: "schedule_delay".to_string(),
                message: "scheduled enqueue time is not representable".to_string(),
            })?;

        let messages = (0..count)
            .map(|i| {
                OutgoingMessage::new(Bytes::from(format!(
                    "message body: UTC time: {} - Item number: {} - Scheduled for: {} ",
                    Timestamp::now(),
                    i,
                    enqueue_at
                )))
                .with_scheduled_enqueue_time(enqueue_at)
            })
            .collect();

        self.send_batched(queue, messages).await
    }

    /// Send `count` messages whose bodies are `body_size` bytes
    pub async fn send_large_messages(
        &self,
        queue: &QueueName,
        count: usize,
        ttl: Duration,
        body_size: usize,
    ) -> Result<SendSummary, QueueError> {
        let messages = (0..count)
            .map(|i| {
                let mut body = format!("large message - Item number: {} ", i).into_bytes();
                body.resize(body_size.max(body.len()), b'.');
                OutgoingMessage::new(Bytes::from(body)).with_ttl(ttl)
            })
            .collect();

        self.send_batched(queue, messages).await
    }

    /// Send prepared messages, packing batches greedily in order.
    ///
    /// Each batch takes messages until the next one does not fit, then is
    /// flushed and a new batch is started with that message.
    ///
    /// # Errors
    ///
    /// [`QueueError::PayloadTooLarge`] if a message does not fit into an
    /// empty batch. The batch it was offered to is not sent.
    #[instrument(skip(self, messages), fields(queue = %queue, count = messages.len()))]
    pub async fn send_batched(
        &self,
        queue: &QueueName,
        messages: Vec<OutgoingMessage>,
    ) -> Result<SendSummary, QueueError> {
        let sender = self.messaging.create_sender(queue).await?;
        let result = send_greedy(sender.as_ref(), messages).await;

        if let Err(e) = sender.close().await {
            warn!(error = %e, "Failed to close sender");
        }

        if let Ok(summary) = &result {
            info!(
                messages_sent = summary.messages_sent,
                batches = summary.batches,
                "Send complete"
            );
        }
        result
    }

    // ------------------------------------------------------------------------
    // Receiving and settlement
    // ------------------------------------------------------------------------

    /// Open a peek-lock receiver on the queue or its dead-letter sub-queue
    pub async fn open_receiver(
        &self,
        queue: &QueueName,
        sub_queue: SubQueue,
    ) -> Result<Box<dyn MessageReceiver>, QueueError> {
        self.messaging
            .create_receiver(queue, ReceiverOptions { sub_queue })
            .await
    }

    /// Non-destructive read from the head of the receiver's queue
    pub async fn peek(
        &self,
        receiver: &dyn MessageReceiver,
        count: u32,
    ) -> Result<Vec<ReceivedMessage>, QueueError> {
        let messages = receiver.peek_messages(count).await?;
        debug!(
            queue = %receiver.queue_name(),
            sub_queue = %receiver.sub_queue(),
            peeked = messages.len(),
            "Peeked messages"
        );
        Ok(messages)
    }

    /// Lock up to `count` messages. The caller must settle each before its lock expires.
    pub async fn receive(
        &self,
        receiver: &dyn MessageReceiver,
        count: u32,
    ) -> Result<Vec<ReceivedMessage>, QueueError> {
        let messages = receiver.receive_messages(count).await?;
        debug!(
            queue = %receiver.queue_name(),
            sub_queue = %receiver.sub_queue(),
            received = messages.len(),
            "Received messages"
        );
        Ok(messages)
    }

    /// Release every lock early. Per-message failures are logged and counted.
    pub async fn abandon_received(
        &self,
        receiver: &dyn MessageReceiver,
        received: &[ReceivedMessage],
    ) -> AbandonSummary {
        let mut summary = AbandonSummary::default();

        for message in received {
            match receiver.abandon_message(message).await {
                Ok(()) => summary.released += 1,
                Err(e) => {
                    warn!(
                        sequence_number = %message.sequence_number,
                        error = %e,
                        "Lock release failed"
                    );
                    summary.failed += 1;
                }
            }
        }

        info!(
            queue = %receiver.queue_name(),
            released = summary.released,
            failed = summary.failed,
            "Explicit lock release complete"
        );
        summary
    }

    /// Defer every received message. Deferred messages are only reachable by sequence number.
    pub async fn defer_messages(
        &self,
        receiver: &dyn MessageReceiver,
        received: &[ReceivedMessage],
    ) -> Result<usize, QueueError> {
        for message in received {
            receiver.defer_message(message).await?;
        }

        info!(queue = %receiver.queue_name(), deferred = received.len(), "Messages deferred");
        Ok(received.len())
    }

    /// Resolve each snapshot by sequence number and complete it.
    ///
    /// # Errors
    ///
    /// [`QueueError::LockConflict`] if a snapshot no longer addresses an
    /// unlocked deferred message, for example because it expired or was
    /// settled elsewhere. Messages completed before the failure stay completed.
    pub async fn complete_deferred(
        &self,
        receiver: &dyn MessageReceiver,
        snapshots: &[ReceivedMessage],
    ) -> Result<usize, QueueError> {
        for snapshot in snapshots {
            let locked = receiver
                .receive_deferred_message(snapshot.sequence_number)
                .await?;
            receiver.complete_message(&locked).await?;
        }

        info!(queue = %receiver.queue_name(), completed = snapshots.len(), "Deferred messages completed");
        Ok(snapshots.len())
    }

    /// Dead-letter the messages that were peeked.
    ///
    /// Peeked snapshots carry no lock, so the head of the queue is received
    /// and the messages whose sequence numbers were peeked are dead-lettered.
    /// Any other message locked along the way is abandoned.
    pub async fn dead_letter_peeked(
        &self,
        receiver: &dyn MessageReceiver,
        peeked: &[ReceivedMessage],
    ) -> Result<usize, QueueError> {
        if peeked.is_empty() {
            return Ok(0);
        }

        let wanted: BTreeSet<SequenceNumber> =
            peeked.iter().map(|m| m.sequence_number).collect();
        let max_messages = u32::try_from(peeked.len()).unwrap_or(u32::MAX);
        let received = receiver.receive_messages(max_messages).await?;

        let mut dead_lettered = 0;
        for message in &received {
            if wanted.contains(&message.sequence_number) {
                receiver
                    .dead_letter_message(
                        message,
                        EXPLICIT_DEAD_LETTER_REASON,
                        Some(EXPLICIT_DEAD_LETTER_DESCRIPTION),
                    )
                    .await?;
                dead_lettered += 1;
            } else if let Err(e) = receiver.abandon_message(message).await {
                warn!(
                    sequence_number = %message.sequence_number,
                    error = %e,
                    "Lock release failed for message that was not peeked"
                );
            }
        }

        info!(queue = %receiver.queue_name(), dead_lettered, "Peeked messages dead-lettered");
        Ok(dead_lettered)
    }

    /// Resolve each deferred snapshot by sequence number and dead-letter it.
    /// Snapshots that are not deferred are skipped.
    pub async fn dead_letter_deferred(
        &self,
        receiver: &dyn MessageReceiver,
        snapshots: &[ReceivedMessage],
    ) -> Result<usize, QueueError> {
        let mut dead_lettered = 0;

        for snapshot in snapshots {
            if snapshot.state != MessageState::Deferred {
                debug!(
                    sequence_number = %snapshot.sequence_number,
                    state = %snapshot.state,
                    "Skipping message that is not deferred"
                );
                continue;
            }

            let locked = receiver
                .receive_deferred_message(snapshot.sequence_number)
                .await?;
            receiver
                .dead_letter_message(
                    &locked,
                    EXPLICIT_DEAD_LETTER_REASON,
                    Some(EXPLICIT_DEAD_LETTER_DESCRIPTION),
                )
                .await?;
            dead_lettered += 1;
        }

        info!(queue = %receiver.queue_name(), dead_lettered, "Deferred messages dead-lettered");
        Ok(dead_lettered)
    }

    /// Close the data-plane client. Receivers and senders cannot be opened afterwards.
    pub async fn close(&self) -> Result<(), QueueError> {
        self.messaging.close().await?;
        info!("Messaging client closed");
        Ok(())
    }
}

async fn send_greedy(
    sender: &dyn MessageSender,
    messages: Vec<OutgoingMessage>,
) -> Result<SendSummary, QueueError> {
    let mut pending: VecDeque<OutgoingMessage> = messages.into();
    let mut summary = SendSummary::default();
    let mut next_index = 0;

    while !pending.is_empty() {
        let mut batch = sender.create_batch().await?;

        while let Some(message) = pending.pop_front() {
            if let Err(rejected) = batch.try_add_message(message) {
                if batch.is_empty() {
                    return Err(QueueError::PayloadTooLarge {
                        message_index: next_index,
                        size: rejected.size_in_bytes(),
                        max_size: batch.max_size_in_bytes(),
                    });
                }
                pending.push_front(rejected);
                break;
            }
            next_index += 1;
        }

        let batch_len = batch.len();
        sender.send_batch(batch).await?;
        summary.messages_sent += batch_len;
        summary.batches += 1;
        debug!(
            queue = %sender.queue_name(),
            batch_len,
            remaining = pending.len(),
            "Batch sent"
        );
    }

    Ok(summary)
}

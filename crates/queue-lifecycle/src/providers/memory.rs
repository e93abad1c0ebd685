//! In-memory queue service for testing and development.
//!
//! This module provides a fully functional in-memory implementation of both
//! the administrative and the data-plane APIs that:
//! - Assigns per-queue sequence numbers
//! - Implements peek-lock receive with lock expiry and delivery counting
//! - Honours deferral, scheduled enqueue, and receive-by-sequence-number
//! - Dead-letters expired messages and messages over the delivery limit
//! - Drops duplicates inside the duplicate-detection window
//!
//! Time is measured with [`tokio::time::Instant`], so tests running on a
//! paused runtime observe TTL expiry and lock expiry as the clock advances.
//!
//! This provider is intended for:
//! - Unit and integration testing of the lifecycle controller
//! - Running the scenario catalogue without a cloud namespace

use crate::client::{
    AdministrationClient, MessageBatch, MessageReceiver, MessageSender, MessagingClient,
};
use crate::error::QueueError;
use crate::message::{
    DeadLetterDetails, LockToken, MessageId, MessageState, QueueName, ReceivedMessage,
    SequenceNumber, Timestamp,
};
use crate::queue::{QueueConfig, ReceiverOptions, SubQueue};
use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use tokio::time::Instant;
use tracing::debug;

#[cfg(test)]
#[path = "memory_tests.rs"]
mod tests;

/// Default batch limit, matching a standard-tier namespace
pub const DEFAULT_MAX_BATCH_SIZE_BYTES: usize = 256 * 1024;

/// Dead-letter reason recorded for expired messages
pub const TTL_EXPIRED_REASON: &str = "TTLExpiredException";

/// Dead-letter reason recorded when the delivery limit is exceeded
pub const MAX_DELIVERY_COUNT_REASON: &str = "MaxDeliveryCountExceeded";

/// In-memory broker configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InMemoryBrokerConfig {
    /// Largest batch a sender may submit
    pub max_batch_size_bytes: usize,
    /// Number of create calls answered with no description before one succeeds
    pub unavailable_create_attempts: u32,
    /// Number of failed reads of a newly created queue before it is ready
    pub provisioning_reads: u32,
}

impl Default for InMemoryBrokerConfig {
    fn default() -> Self {
        Self {
            max_batch_size_bytes: DEFAULT_MAX_BATCH_SIZE_BYTES,
            unavailable_create_attempts: 0,
            provisioning_reads: 0,
        }
    }
}

/// Broker-side lifecycle position of a message, for inspection in tests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrokerMessageState {
    Active,
    Scheduled,
    Locked,
    Deferred,
    DeadLettered,
    Completed,
}

// ============================================================================
// Internal Storage Structures
// ============================================================================

/// Wall-clock view of the tokio clock
struct BrokerClock {
    origin_instant: Instant,
    origin: Timestamp,
}

impl BrokerClock {
    fn new() -> Self {
        Self {
            origin_instant: Instant::now(),
            origin: Timestamp::now(),
        }
    }

    fn now(&self) -> Timestamp {
        self.origin
            .checked_add(self.origin_instant.elapsed())
            .unwrap_or(self.origin)
    }
}

/// Thread-safe storage for all queues
struct BrokerState {
    config: InMemoryBrokerConfig,
    clock: BrokerClock,
    queues: HashMap<QueueName, InMemoryQueue>,
    create_calls: HashMap<QueueName, u32>,
    unavailable_creates_remaining: u32,
}

impl BrokerState {
    fn new(config: InMemoryBrokerConfig) -> Self {
        let unavailable_creates_remaining = config.unavailable_create_attempts;
        Self {
            config,
            clock: BrokerClock::new(),
            queues: HashMap::new(),
            create_calls: HashMap::new(),
            unavailable_creates_remaining,
        }
    }
}

/// Internal state for a single queue
struct InMemoryQueue {
    config: QueueConfig,
    /// Reads that still fail while the queue is provisioning
    pending_reads: u32,
    next_sequence: i64,
    active: BTreeMap<SequenceNumber, StoredMessage>,
    dead_letter: BTreeMap<SequenceNumber, StoredMessage>,
    completed: BTreeSet<SequenceNumber>,
    recent_ids: HashMap<MessageId, Timestamp>,
    sent_batches: Vec<Vec<MessageId>>,
}

impl InMemoryQueue {
    fn new(config: QueueConfig, pending_reads: u32) -> Self {
        Self {
            config,
            pending_reads,
            next_sequence: 1,
            active: BTreeMap::new(),
            dead_letter: BTreeMap::new(),
            completed: BTreeSet::new(),
            recent_ids: HashMap::new(),
            sent_batches: Vec::new(),
        }
    }

    fn messages_mut(&mut self, sub_queue: SubQueue) -> &mut BTreeMap<SequenceNumber, StoredMessage> {
        match sub_queue {
            SubQueue::None => &mut self.active,
            SubQueue::DeadLetter => &mut self.dead_letter,
        }
    }

    fn messages(&self, sub_queue: SubQueue) -> &BTreeMap<SequenceNumber, StoredMessage> {
        match sub_queue {
            SubQueue::None => &self.active,
            SubQueue::DeadLetter => &self.dead_letter,
        }
    }

    /// Apply every time-driven transition that is due at `now`
    fn refresh(&mut self, now: Timestamp) {
        let max_delivery_count = self.config.max_delivery_count;
        let dead_letter_on_expiry = self.config.dead_lettering_on_message_expiration;
        let mut to_dead_letter = Vec::new();
        let mut to_drop = Vec::new();

        for (sequence, message) in self.active.iter_mut() {
            if message.state == MessageState::Scheduled
                && message.scheduled_for.is_some_and(|at| at <= now)
            {
                message.state = MessageState::Active;
            }

            if message.lock.as_ref().is_some_and(|lock| lock.expires_at <= now) {
                message.lock = None;
                if message.delivery_count >= max_delivery_count {
                    to_dead_letter.push((*sequence, max_delivery_details(max_delivery_count)));
                    continue;
                }
            }

            // Deferred messages are exempt from expiry.
            if message.state == MessageState::Active
                && message.lock.is_none()
                && message.expires_at.is_some_and(|at| at <= now)
            {
                if dead_letter_on_expiry {
                    to_dead_letter.push((
                        *sequence,
                        DeadLetterDetails {
                            reason: TTL_EXPIRED_REASON.to_string(),
                            source: None,
                            error_description: Some(
                                "The message expired and was dead lettered.".to_string(),
                            ),
                        },
                    ));
                } else {
                    to_drop.push(*sequence);
                }
            }
        }

        for sequence in to_drop {
            debug!(queue = %self.config.name, sequence = %sequence, "Expired message dropped");
            self.active.remove(&sequence);
        }

        for (sequence, details) in to_dead_letter {
            self.move_to_dead_letter(sequence, details);
        }

        for message in self.dead_letter.values_mut() {
            if message.lock.as_ref().is_some_and(|lock| lock.expires_at <= now) {
                message.lock = None;
            }
        }
    }

    fn move_to_dead_letter(&mut self, sequence: SequenceNumber, mut details: DeadLetterDetails) {
        if let Some(mut message) = self.active.remove(&sequence) {
            debug!(
                queue = %self.config.name,
                sequence = %sequence,
                reason = %details.reason,
                "Message moved to dead-letter sub-queue"
            );
            details.source.get_or_insert_with(|| self.config.name.to_string());
            message.state = MessageState::Active;
            message.lock = None;
            message.scheduled_for = None;
            message.dead_letter = Some(details);
            self.dead_letter.insert(sequence, message);
        }
    }

    /// Find a message whose lock is held by the caller's snapshot
    fn locked_message_mut(
        &mut self,
        sub_queue: SubQueue,
        message: &ReceivedMessage,
        now: Timestamp,
    ) -> Result<&mut StoredMessage, QueueError> {
        let sequence = message.sequence_number;
        let token = message.lock_token.as_ref().ok_or_else(|| {
            QueueError::lock_lost(format!("message {} was not received with a lock", sequence))
        })?;

        let stored = self
            .messages_mut(sub_queue)
            .get_mut(&sequence)
            .ok_or_else(|| QueueError::lock_lost(format!("sequence number {}", sequence)))?;

        let held = matches!(
            &stored.lock,
            Some(lock) if lock.token == *token && lock.expires_at > now
        );
        if !held {
            return Err(QueueError::lock_lost(format!("sequence number {}", sequence)));
        }
        Ok(stored)
    }
}

/// A message stored in the queue with broker metadata
#[derive(Clone)]
struct StoredMessage {
    message_id: MessageId,
    body: Bytes,
    properties: HashMap<String, String>,
    sequence_number: SequenceNumber,
    enqueued_at: Timestamp,
    scheduled_for: Option<Timestamp>,
    expires_at: Option<Timestamp>,
    state: MessageState,
    delivery_count: u32,
    lock: Option<MessageLock>,
    dead_letter: Option<DeadLetterDetails>,
}

impl StoredMessage {
    fn snapshot(&self) -> ReceivedMessage {
        ReceivedMessage {
            message_id: self.message_id.clone(),
            body: self.body.clone(),
            properties: self.properties.clone(),
            sequence_number: self.sequence_number,
            enqueued_at: self.enqueued_at,
            expires_at: self.expires_at,
            state: self.state,
            delivery_count: self.delivery_count,
            lock_token: None,
            locked_until: None,
            dead_letter: self.dead_letter.clone(),
        }
    }

    /// Take a fresh lock and return the snapshot carrying it
    fn lock_for(&mut self, now: Timestamp, lock_duration: std::time::Duration) -> ReceivedMessage {
        let lock = MessageLock {
            token: LockToken::new(),
            expires_at: now.checked_add(lock_duration).unwrap_or(now),
        };
        self.delivery_count += 1;

        let mut snapshot = self.snapshot();
        snapshot.lock_token = Some(lock.token.clone());
        snapshot.locked_until = Some(lock.expires_at);
        self.lock = Some(lock);
        snapshot
    }
}

#[derive(Clone)]
struct MessageLock {
    token: LockToken,
    expires_at: Timestamp,
}

fn max_delivery_details(max_delivery_count: u32) -> DeadLetterDetails {
    DeadLetterDetails {
        reason: MAX_DELIVERY_COUNT_REASON.to_string(),
        source: None,
        error_description: Some(format!(
            "Message could not be consumed after {} delivery attempts.",
            max_delivery_count
        )),
    }
}

fn poisoned() -> QueueError {
    QueueError::Fatal {
        message: "in-memory broker state lock poisoned".to_string(),
    }
}

fn queue_not_found(name: &QueueName) -> QueueError {
    QueueError::NotFound {
        entity: format!("queue '{}'", name),
    }
}

/// Run `f` against a refreshed queue under the write lock
fn with_queue<R>(
    storage: &RwLock<BrokerState>,
    name: &QueueName,
    f: impl FnOnce(&mut InMemoryQueue, Timestamp) -> Result<R, QueueError>,
) -> Result<R, QueueError> {
    let mut guard = storage.write().map_err(|_| poisoned())?;
    let state = &mut *guard;
    let now = state.clock.now();
    let queue = state
        .queues
        .get_mut(name)
        .ok_or_else(|| queue_not_found(name))?;
    queue.refresh(now);
    f(queue, now)
}

// ============================================================================
// InMemoryServiceBus
// ============================================================================

/// In-memory queue service implementing both client APIs
#[derive(Clone)]
pub struct InMemoryServiceBus {
    storage: Arc<RwLock<BrokerState>>,
    closed: Arc<AtomicBool>,
}

impl InMemoryServiceBus {
    /// Create new in-memory service with configuration
    pub fn new(config: InMemoryBrokerConfig) -> Self {
        Self {
            storage: Arc::new(RwLock::new(BrokerState::new(config))),
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Number of create calls that reached the service for a queue name
    pub fn create_queue_calls(&self, name: &QueueName) -> Result<u32, QueueError> {
        let state = self.storage.read().map_err(|_| poisoned())?;
        Ok(state.create_calls.get(name).copied().unwrap_or(0))
    }

    /// Message IDs of every batch sent to a queue, in send order
    pub fn sent_batches(&self, name: &QueueName) -> Result<Vec<Vec<MessageId>>, QueueError> {
        let state = self.storage.read().map_err(|_| poisoned())?;
        let queue = state.queues.get(name).ok_or_else(|| queue_not_found(name))?;
        Ok(queue.sent_batches.clone())
    }

    /// Number of messages currently held in a queue or its dead-letter sub-queue
    pub fn message_count(&self, name: &QueueName, sub_queue: SubQueue) -> Result<usize, QueueError> {
        with_queue(&self.storage, name, |queue, _| Ok(queue.messages(sub_queue).len()))
    }

    /// Where the broker currently holds the message with this sequence number
    pub fn message_state(
        &self,
        name: &QueueName,
        sequence_number: SequenceNumber,
    ) -> Result<Option<BrokerMessageState>, QueueError> {
        with_queue(&self.storage, name, |queue, _| {
            if queue.completed.contains(&sequence_number) {
                return Ok(Some(BrokerMessageState::Completed));
            }
            if queue.dead_letter.contains_key(&sequence_number) {
                return Ok(Some(BrokerMessageState::DeadLettered));
            }
            Ok(queue.active.get(&sequence_number).map(|message| {
                if message.lock.is_some() {
                    BrokerMessageState::Locked
                } else {
                    match message.state {
                        MessageState::Active => BrokerMessageState::Active,
                        MessageState::Deferred => BrokerMessageState::Deferred,
                        MessageState::Scheduled => BrokerMessageState::Scheduled,
                    }
                }
            }))
        })
    }
}

impl Default for InMemoryServiceBus {
    fn default() -> Self {
        Self::new(InMemoryBrokerConfig::default())
    }
}

#[async_trait]
impl AdministrationClient for InMemoryServiceBus {
    async fn queue_exists(&self, name: &QueueName) -> Result<bool, QueueError> {
        let state = self.storage.read().map_err(|_| poisoned())?;
        Ok(state.queues.contains_key(name))
    }

    async fn create_queue(&self, config: &QueueConfig) -> Result<Option<QueueConfig>, QueueError> {
        config.validate()?;

        let mut state = self.storage.write().map_err(|_| poisoned())?;
        *state.create_calls.entry(config.name.clone()).or_insert(0) += 1;

        if state.queues.contains_key(&config.name) {
            return Err(QueueError::EntityExists {
                name: config.name.to_string(),
            });
        }

        if state.unavailable_creates_remaining > 0 {
            state.unavailable_creates_remaining -= 1;
            debug!(queue = %config.name, "Create call answered without a description");
            return Ok(None);
        }

        let pending_reads = state.config.provisioning_reads;
        state.queues.insert(
            config.name.clone(),
            InMemoryQueue::new(config.clone(), pending_reads),
        );
        Ok(Some(config.clone()))
    }

    async fn delete_queue(&self, name: &QueueName) -> Result<(), QueueError> {
        let mut state = self.storage.write().map_err(|_| poisoned())?;
        state
            .queues
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| queue_not_found(name))
    }

    async fn get_queue(&self, name: &QueueName) -> Result<QueueConfig, QueueError> {
        let mut state = self.storage.write().map_err(|_| poisoned())?;
        let queue = state
            .queues
            .get_mut(name)
            .ok_or_else(|| queue_not_found(name))?;

        if queue.pending_reads > 0 {
            queue.pending_reads -= 1;
            return Err(QueueError::Transient {
                message: format!("queue '{}' is still being provisioned", name),
            });
        }

        Ok(queue.config.clone())
    }
}

#[async_trait]
impl MessagingClient for InMemoryServiceBus {
    async fn create_sender(&self, queue: &QueueName) -> Result<Box<dyn MessageSender>, QueueError> {
        self.ensure_open()?;
        Ok(Box::new(InMemorySender {
            storage: Arc::clone(&self.storage),
            queue_name: queue.clone(),
            closed: AtomicBool::new(false),
        }))
    }

    async fn create_receiver(
        &self,
        queue: &QueueName,
        options: ReceiverOptions,
    ) -> Result<Box<dyn MessageReceiver>, QueueError> {
        self.ensure_open()?;
        Ok(Box::new(InMemoryReceiver {
            storage: Arc::clone(&self.storage),
            queue_name: queue.clone(),
            sub_queue: options.sub_queue,
            closed: AtomicBool::new(false),
        }))
    }

    async fn close(&self) -> Result<(), QueueError> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl InMemoryServiceBus {
    fn ensure_open(&self) -> Result<(), QueueError> {
        if self.is_closed() {
            return Err(QueueError::Fatal {
                message: "messaging client has been closed".to_string(),
            });
        }
        Ok(())
    }
}

// ============================================================================
// InMemorySender
// ============================================================================

/// In-memory sender bound to one queue
pub struct InMemorySender {
    storage: Arc<RwLock<BrokerState>>,
    queue_name: QueueName,
    closed: AtomicBool,
}

impl InMemorySender {
    fn ensure_open(&self) -> Result<(), QueueError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(QueueError::Fatal {
                message: format!("sender for '{}' has been closed", self.queue_name),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl MessageSender for InMemorySender {
    async fn create_batch(&self) -> Result<MessageBatch, QueueError> {
        self.ensure_open()?;
        let state = self.storage.read().map_err(|_| poisoned())?;
        if !state.queues.contains_key(&self.queue_name) {
            return Err(queue_not_found(&self.queue_name));
        }
        Ok(MessageBatch::new(state.config.max_batch_size_bytes))
    }

    async fn send_batch(&self, batch: MessageBatch) -> Result<(), QueueError> {
        self.ensure_open()?;
        let max_size = self
            .storage
            .read()
            .map_err(|_| poisoned())?
            .config
            .max_batch_size_bytes;
        if batch.size_in_bytes() > max_size {
            return Err(QueueError::PayloadTooLarge {
                message_index: 0,
                size: batch.size_in_bytes(),
                max_size,
            });
        }

        with_queue(&self.storage, &self.queue_name, |queue, now| {
            let window = queue.config.duplicate_detection_history_time_window;
            queue
                .recent_ids
                .retain(|_, seen_at| seen_at.checked_add(window).is_some_and(|until| until > now));

            let mut batch_ids = Vec::with_capacity(batch.len());
            for message in batch.into_messages() {
                batch_ids.push(message.message_id.clone());

                if queue.config.requires_duplicate_detection {
                    if queue.recent_ids.contains_key(&message.message_id) {
                        debug!(
                            queue = %queue.config.name,
                            message_id = %message.message_id,
                            "Duplicate message dropped"
                        );
                        continue;
                    }
                    queue.recent_ids.insert(message.message_id.clone(), now);
                }

                let sequence_number = SequenceNumber::new(queue.next_sequence);
                queue.next_sequence += 1;

                let scheduled_for = message.scheduled_enqueue_time.filter(|at| *at > now);
                let default_ttl = queue.config.default_message_time_to_live;
                let ttl = message
                    .time_to_live
                    .map_or(default_ttl, |ttl| ttl.min(default_ttl));
                let expires_at = scheduled_for.unwrap_or(now).checked_add(ttl);

                queue.active.insert(
                    sequence_number,
                    StoredMessage {
                        message_id: message.message_id,
                        body: message.body,
                        properties: message.properties,
                        sequence_number,
                        enqueued_at: now,
                        scheduled_for,
                        expires_at,
                        state: if scheduled_for.is_some() {
                            MessageState::Scheduled
                        } else {
                            MessageState::Active
                        },
                        delivery_count: 0,
                        lock: None,
                        dead_letter: None,
                    },
                );
            }

            queue.sent_batches.push(batch_ids);
            Ok(())
        })
    }

    async fn close(&self) -> Result<(), QueueError> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn queue_name(&self) -> &QueueName {
        &self.queue_name
    }
}

// ============================================================================
// InMemoryReceiver
// ============================================================================

/// In-memory peek-lock receiver
pub struct InMemoryReceiver {
    storage: Arc<RwLock<BrokerState>>,
    queue_name: QueueName,
    sub_queue: SubQueue,
    closed: AtomicBool,
}

impl InMemoryReceiver {
    fn ensure_open(&self) -> Result<(), QueueError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(QueueError::Fatal {
                message: format!("receiver for '{}' has been closed", self.queue_name),
            });
        }
        Ok(())
    }

    fn with_queue<R>(
        &self,
        f: impl FnOnce(&mut InMemoryQueue, Timestamp) -> Result<R, QueueError>,
    ) -> Result<R, QueueError> {
        self.ensure_open()?;
        with_queue(&self.storage, &self.queue_name, f)
    }
}

#[async_trait]
impl MessageReceiver for InMemoryReceiver {
    async fn peek_messages(&self, max_messages: u32) -> Result<Vec<ReceivedMessage>, QueueError> {
        let sub_queue = self.sub_queue;
        self.with_queue(|queue, _| {
            Ok(queue
                .messages(sub_queue)
                .values()
                .take(max_messages as usize)
                .map(StoredMessage::snapshot)
                .collect())
        })
    }

    async fn receive_messages(
        &self,
        max_messages: u32,
    ) -> Result<Vec<ReceivedMessage>, QueueError> {
        let sub_queue = self.sub_queue;
        self.with_queue(|queue, now| {
            let lock_duration = queue.config.lock_duration;
            Ok(queue
                .messages_mut(sub_queue)
                .values_mut()
                .filter(|message| message.state == MessageState::Active && message.lock.is_none())
                .take(max_messages as usize)
                .map(|message| message.lock_for(now, lock_duration))
                .collect())
        })
    }

    async fn receive_deferred_message(
        &self,
        sequence_number: SequenceNumber,
    ) -> Result<ReceivedMessage, QueueError> {
        let sub_queue = self.sub_queue;
        self.with_queue(|queue, now| {
            let lock_duration = queue.config.lock_duration;
            match queue.messages_mut(sub_queue).get_mut(&sequence_number) {
                Some(message) if message.state == MessageState::Deferred && message.lock.is_none() => {
                    Ok(message.lock_for(now, lock_duration))
                }
                _ => Err(QueueError::lock_lost(format!(
                    "sequence number {}",
                    sequence_number
                ))),
            }
        })
    }

    async fn complete_message(&self, message: &ReceivedMessage) -> Result<(), QueueError> {
        let sub_queue = self.sub_queue;
        self.with_queue(|queue, now| {
            queue.locked_message_mut(sub_queue, message, now)?;
            queue.messages_mut(sub_queue).remove(&message.sequence_number);
            queue.completed.insert(message.sequence_number);
            Ok(())
        })
    }

    async fn abandon_message(&self, message: &ReceivedMessage) -> Result<(), QueueError> {
        let sub_queue = self.sub_queue;
        self.with_queue(|queue, now| {
            let max_delivery_count = queue.config.max_delivery_count;
            let stored = queue.locked_message_mut(sub_queue, message, now)?;
            stored.lock = None;
            stored.state = MessageState::Active;
            let exhausted = stored.delivery_count >= max_delivery_count;

            if exhausted && sub_queue == SubQueue::None {
                queue.move_to_dead_letter(
                    message.sequence_number,
                    max_delivery_details(max_delivery_count),
                );
            }
            Ok(())
        })
    }

    async fn defer_message(&self, message: &ReceivedMessage) -> Result<(), QueueError> {
        let sub_queue = self.sub_queue;
        self.with_queue(|queue, now| {
            let stored = queue.locked_message_mut(sub_queue, message, now)?;
            stored.lock = None;
            stored.state = MessageState::Deferred;
            Ok(())
        })
    }

    async fn dead_letter_message(
        &self,
        message: &ReceivedMessage,
        reason: &str,
        error_description: Option<&str>,
    ) -> Result<(), QueueError> {
        if self.sub_queue == SubQueue::DeadLetter {
            return Err(QueueError::Fatal {
                message: format!(
                    "message {} is already in the dead-letter sub-queue",
                    message.sequence_number
                ),
            });
        }

        self.with_queue(|queue, now| {
            queue.locked_message_mut(SubQueue::None, message, now)?;
            queue.move_to_dead_letter(
                message.sequence_number,
                DeadLetterDetails {
                    reason: reason.to_string(),
                    source: None,
                    error_description: error_description.map(str::to_string),
                },
            );
            Ok(())
        })
    }

    async fn close(&self) -> Result<(), QueueError> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn queue_name(&self) -> &QueueName {
        &self.queue_name
    }

    fn sub_queue(&self) -> SubQueue {
        self.sub_queue
    }
}

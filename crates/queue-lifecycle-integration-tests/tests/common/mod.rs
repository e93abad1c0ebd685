//! Common test utilities for queue-lifecycle integration tests
//!
//! This module provides:
//! - A recording administration client wrapping the in-memory broker
//! - Controller builders with short retry bounds
//! - Message builders with known sizes

use async_trait::async_trait;
use bytes::Bytes;
use queue_lifecycle::{
    AdministrationClient, InMemoryBrokerConfig, InMemoryServiceBus, LifecycleSettings, MessageId,
    OutgoingMessage, QueueConfig, QueueError, QueueLifecycleController, QueueName, RetryPolicy,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;

// ============================================================================
// Recording Administration Client
// ============================================================================

/// Administration client that records every create call before delegating
#[derive(Clone)]
#[allow(dead_code)]
pub struct RecordingAdmin {
    inner: InMemoryServiceBus,
    create_calls: Arc<Mutex<Vec<QueueName>>>,
}

impl RecordingAdmin {
    #[allow(dead_code)]
    pub fn new(inner: InMemoryServiceBus) -> Self {
        Self {
            inner,
            create_calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    #[allow(dead_code)]
    pub fn create_calls(&self) -> Vec<QueueName> {
        self.create_calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl AdministrationClient for RecordingAdmin {
    async fn queue_exists(&self, name: &QueueName) -> Result<bool, QueueError> {
        self.inner.queue_exists(name).await
    }

    async fn create_queue(&self, config: &QueueConfig) -> Result<Option<QueueConfig>, QueueError> {
        self.create_calls.lock().unwrap().push(config.name.clone());
        self.inner.create_queue(config).await
    }

    async fn delete_queue(&self, name: &QueueName) -> Result<(), QueueError> {
        self.inner.delete_queue(name).await
    }

    async fn get_queue(&self, name: &QueueName) -> Result<QueueConfig, QueueError> {
        self.inner.get_queue(name).await
    }
}

// ============================================================================
// Builders
// ============================================================================

#[allow(dead_code)]
pub fn queue_name(name: &str) -> QueueName {
    QueueName::new(name.to_string()).expect("valid queue name")
}

/// Retry bounds short enough for tests on a real clock
#[allow(dead_code)]
pub fn fast_settings() -> LifecycleSettings {
    LifecycleSettings {
        provisioning: RetryPolicy::fixed(5, Duration::from_millis(5)),
        readiness: RetryPolicy::fixed(5, Duration::from_millis(5)),
    }
}

/// Broker with the given batch limit
#[allow(dead_code)]
pub fn broker_with_batch_limit(max_batch_size_bytes: usize) -> InMemoryServiceBus {
    InMemoryServiceBus::new(InMemoryBrokerConfig {
        max_batch_size_bytes,
        ..Default::default()
    })
}

/// Controller whose administration and data-plane clients both use `bus`
#[allow(dead_code)]
pub fn controller_over(bus: &InMemoryServiceBus) -> QueueLifecycleController {
    QueueLifecycleController::new(Arc::new(bus.clone()), Arc::new(bus.clone()), fast_settings())
}

/// Create `name` with default settings and wait until it reads back
#[allow(dead_code)]
pub async fn provisioned_queue(controller: &QueueLifecycleController, name: &str) -> QueueConfig {
    let config = QueueConfig::new(queue_name(name));
    controller
        .clean_up(&config)
        .await
        .expect("queue provisioned");
    config
}

/// Message whose batch size is exactly `size` bytes
#[allow(dead_code)]
pub fn message_of_size(id: &str, size: usize) -> OutgoingMessage {
    let shell = OutgoingMessage::new(Bytes::new()).with_message_id(message_id(id));
    let body_len = size
        .checked_sub(shell.size_in_bytes())
        .expect("size covers the message overhead");
    OutgoingMessage::new(Bytes::from(vec![b'x'; body_len])).with_message_id(message_id(id))
}

#[allow(dead_code)]
pub fn message_id(id: &str) -> MessageId {
    id.parse().expect("valid message id")
}

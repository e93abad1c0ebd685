//! # Queue Lifecycle
//!
//! Client-side lifecycle orchestration for a managed message-queue service.
//!
//! This library provides:
//! - Typed administration and data-plane client traits
//! - An in-memory implementation of both for tests and local runs
//! - A lifecycle controller for provisioning, sending, peeking, receiving,
//!   deferring, dead-lettering and completing messages
//! - Bounded retry for provisioning and readiness polling
//! - A parameterised scenario workflow with a catalogue of presets
//!
//! ## Module Organization
//!
//! - [`error`] - Error taxonomy for every remote call
//! - [`message`] - Identifiers, outgoing messages and received snapshots
//! - [`queue`] - Queue configuration and receiver options
//! - [`client`] - Client traits and message batches
//! - [`providers`] - Client implementations
//! - [`retry`] - Bounded retry policy
//! - [`controller`] - Queue lifecycle controller
//! - [`caches`] - Snapshot caches threaded through a scenario
//! - [`scenario`] - Scenario workflow and catalogue

// Module declarations
pub mod caches;
pub mod client;
pub mod controller;
pub mod error;
pub mod message;
pub mod providers;
pub mod queue;
pub mod retry;
pub mod scenario;

// Re-export commonly used types at crate root for convenience
pub use caches::{CacheSummary, LocalCaches};
pub use client::{AdministrationClient, MessageBatch, MessageReceiver, MessageSender, MessagingClient};
pub use controller::{
    AbandonSummary, LifecycleSettings, ProvisionOutcome, QueueLifecycleController, SendSummary,
};
pub use error::{ConfigurationError, QueueError, ValidationError};
pub use message::{
    DeadLetterDetails, LockToken, MessageId, MessageSnapshot, MessageState, OutgoingMessage,
    QueueName, ReceivedMessage, SequenceNumber, Timestamp,
};
pub use providers::{BrokerMessageState, InMemoryBrokerConfig, InMemoryServiceBus};
pub use queue::{AccessRights, AuthorizationRule, QueueConfig, ReceiverOptions, SubQueue};
pub use retry::RetryPolicy;
pub use scenario::{
    delete_all_scenario_queues, run_scenario, Disposition, PhaseReport, ScenarioConfig,
    ScenarioKind, ScenarioOptions, ScenarioReport, SendMode,
};

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;

//! Queue service implementations.
//!
//! This module contains concrete implementations of the `AdministrationClient`
//! and `MessagingClient` traits.

pub mod memory;

pub use memory::{BrokerMessageState, InMemoryBrokerConfig, InMemoryServiceBus};

//! Queue configuration and receiver options.

use crate::error::ValidationError;
use crate::message::QueueName;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::time::Duration;

/// Longest lock the broker grants on a message
pub const MAX_LOCK_DURATION: Duration = Duration::from_secs(5 * 60);

/// Capability granted by an authorization rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessRights {
    Manage,
    Send,
    Listen,
}

/// Named principal and the capabilities it holds on the queue
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationRule {
    pub key_name: String,
    pub rights: BTreeSet<AccessRights>,
}

impl AuthorizationRule {
    /// Create rule with validation. `Manage` requires `Send` and `Listen`.
    pub fn new(
        key_name: impl Into<String>,
        rights: impl IntoIterator<Item = AccessRights>,
    ) -> Result<Self, ValidationError> {
        let rule = Self {
            key_name: key_name.into(),
            rights: rights.into_iter().collect(),
        };
        rule.validate()?;
        Ok(rule)
    }

    /// Rule granting every right
    pub fn all_claims() -> Self {
        Self {
            key_name: "allClaims".to_string(),
            rights: [AccessRights::Manage, AccessRights::Send, AccessRights::Listen]
                .into_iter()
                .collect(),
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.key_name.is_empty() {
            return Err(ValidationError::Required {
                field: "authorization_rule.key_name".to_string(),
            });
        }

        if self.rights.is_empty() {
            return Err(ValidationError::Required {
                field: "authorization_rule.rights".to_string(),
            });
        }

        if self.rights.contains(&AccessRights::Manage)
            && !(self.rights.contains(&AccessRights::Send)
                && self.rights.contains(&AccessRights::Listen))
        {
            return Err(ValidationError::InvalidFormat {
                field: "authorization_rule.rights".to_string(),
                message: "manage requires send and listen".to_string(),
            });
        }

        Ok(())
    }
}

/// Options a queue is created with. Immutable once the create call is issued.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueConfig {
    pub name: QueueName,
    pub auto_delete_on_idle: Duration,
    pub default_message_time_to_live: Duration,
    pub duplicate_detection_history_time_window: Duration,
    pub enable_batched_operations: bool,
    pub dead_lettering_on_message_expiration: bool,
    pub enable_partitioning: bool,
    pub forward_to: Option<QueueName>,
    pub forward_dead_lettered_messages_to: Option<QueueName>,
    pub lock_duration: Duration,
    pub max_delivery_count: u32,
    pub max_size_in_megabytes: u64,
    pub requires_duplicate_detection: bool,
    pub requires_session: bool,
    pub user_metadata: Option<String>,
    pub authorization_rules: Vec<AuthorizationRule>,
}

impl QueueConfig {
    /// Create configuration with the provisioning defaults used by every scenario
    pub fn new(name: QueueName) -> Self {
        Self {
            name,
            auto_delete_on_idle: Duration::from_secs(7 * 24 * 60 * 60),
            default_message_time_to_live: Duration::from_secs(60),
            duplicate_detection_history_time_window: Duration::from_secs(60),
            enable_batched_operations: true,
            dead_lettering_on_message_expiration: true,
            enable_partitioning: false,
            forward_to: None,
            forward_dead_lettered_messages_to: None,
            lock_duration: Duration::from_secs(45),
            max_delivery_count: 10,
            max_size_in_megabytes: 2048,
            requires_duplicate_detection: true,
            requires_session: false,
            user_metadata: Some("some metadata".to_string()),
            authorization_rules: vec![AuthorizationRule::all_claims()],
        }
    }

    /// Set default time-to-live applied to messages without a shorter TTL
    pub fn with_default_message_ttl(mut self, ttl: Duration) -> Self {
        self.default_message_time_to_live = ttl;
        self
    }

    /// Set message lock duration
    pub fn with_lock_duration(mut self, duration: Duration) -> Self {
        self.lock_duration = duration;
        self
    }

    /// Set delivery attempts allowed before dead-lettering
    pub fn with_max_delivery_count(mut self, count: u32) -> Self {
        self.max_delivery_count = count;
        self
    }

    /// Enable or disable dead-lettering of expired messages
    pub fn with_dead_lettering_on_expiration(mut self, enabled: bool) -> Self {
        self.dead_lettering_on_message_expiration = enabled;
        self
    }

    /// Enable or disable duplicate detection
    pub fn with_duplicate_detection(mut self, enabled: bool, window: Duration) -> Self {
        self.requires_duplicate_detection = enabled;
        self.duplicate_detection_history_time_window = window;
        self
    }

    /// Require session-aware receivers
    pub fn with_requires_session(mut self, requires_session: bool) -> Self {
        self.requires_session = requires_session;
        self
    }

    /// Add an authorization rule
    pub fn with_authorization_rule(mut self, rule: AuthorizationRule) -> Self {
        self.authorization_rules.push(rule);
        self
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.lock_duration.is_zero() || self.lock_duration > MAX_LOCK_DURATION {
            return Err(ValidationError::OutOfRange {
                field: "lock_duration".to_string(),
                message: "must be between 1 second and 5 minutes".to_string(),
            });
        }

        if self.max_delivery_count == 0 {
            return Err(ValidationError::OutOfRange {
                field: "max_delivery_count".to_string(),
                message: "must be at least 1".to_string(),
            });
        }

        if self.default_message_time_to_live.is_zero() {
            return Err(ValidationError::OutOfRange {
                field: "default_message_time_to_live".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }

        if self.forward_to.as_ref() == Some(&self.name) {
            return Err(ValidationError::InvalidFormat {
                field: "forward_to".to_string(),
                message: "a queue cannot forward to itself".to_string(),
            });
        }

        for rule in &self.authorization_rules {
            rule.validate()?;
        }

        Ok(())
    }
}

/// Sub-queue a receiver reads from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubQueue {
    #[default]
    None,
    DeadLetter,
}

impl std::fmt::Display for SubQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => write!(f, "main"),
            Self::DeadLetter => write!(f, "dead-letter"),
        }
    }
}

/// Receiver creation options. Receivers always operate in peek-lock mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReceiverOptions {
    pub sub_queue: SubQueue,
}

impl ReceiverOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn dead_letter() -> Self {
        Self {
            sub_queue: SubQueue::DeadLetter,
        }
    }
}

#[cfg(test)]
#[path = "queue_tests.rs"]
mod tests;

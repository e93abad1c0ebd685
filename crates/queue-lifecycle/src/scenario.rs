//! # Scenario Orchestrator
//!
//! Every lifecycle scenario is one run of [`run_scenario`] over a
//! [`ScenarioConfig`]. The fixed order is:
//!
//! 1. clean up (delete, recreate, wait until ready) when requested
//! 2. send according to [`SendMode`]
//! 3. wait `expiry_wait_factor` times the message TTL when expiry is awaited
//! 4. open a receiver on the queue or its dead-letter sub-queue
//! 5. peek and apply the [`Disposition`]
//! 6. record each observed phase in the [`ScenarioReport`] and clear the caches
//!
//! A failing remote call aborts the rest of the scenario; nothing is rolled back.
//!
//! [`ScenarioKind`] names the preset configurations of the catalogue.

use crate::caches::{CacheSummary, LocalCaches};
use crate::client::MessageReceiver;
use crate::controller::{QueueLifecycleController, SendSummary};
use crate::error::{QueueError, ValidationError};
use crate::message::{MessageSnapshot, QueueName};
use crate::queue::{QueueConfig, SubQueue};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use tracing::{info, warn};

#[cfg(test)]
#[path = "scenario_tests.rs"]
mod tests;

/// Messages sent by a scenario unless configured otherwise
pub const DEFAULT_MESSAGE_COUNT: usize = 10;

/// Broker-side expiry runs as a background job, so scenarios wait twice the TTL
pub const DEFAULT_EXPIRY_WAIT_FACTOR: u32 = 2;

const ONE_DAY: Duration = Duration::from_secs(86_400);
const AUTO_EXPIRY_TTL: Duration = Duration::from_secs(30);
const LARGE_MESSAGE_COUNT: usize = 2;
const LARGE_MESSAGE_BODY_BYTES: usize = 200 * 1024;

// ============================================================================
// Configuration
// ============================================================================

/// How a scenario populates its queue
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum SendMode {
    /// Work on messages left by an earlier scenario
    None,
    Immediate,
    Scheduled { delay: Duration },
    Large { body_size: usize },
}

/// What a scenario does with the messages it reads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Disposition {
    /// Only peek
    InspectOnly,
    Receive,
    /// Receive, then release every lock early
    ReceiveAndAbandon,
    DeadLetterPeeked,
    /// Receive, defer, then peek the deferred messages
    Defer,
    DeadLetterDeferred,
    /// Peek deferred messages and complete each by sequence number
    CompleteDeferred,
}

/// One parameterised lifecycle workflow
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenarioConfig {
    pub title: String,
    pub queue_name: QueueName,
    pub message_count: usize,
    pub message_ttl: Duration,
    pub send_mode: SendMode,
    /// Delete, recreate and wait for the queue before sending
    pub clean_up: bool,
    /// Sleep past the message TTL after sending
    pub wait_for_expiry: bool,
    pub use_dead_letter_sub_queue: bool,
    /// Receive and defer before completing deferred messages
    pub defer_before_complete: bool,
    pub peek_first: bool,
    pub disposition: Disposition,
}

impl ScenarioConfig {
    /// Self-contained send-and-receive workflow; adjust with the `with_*` builders
    pub fn new(title: impl Into<String>, queue_name: QueueName, disposition: Disposition) -> Self {
        Self {
            title: title.into(),
            queue_name,
            message_count: DEFAULT_MESSAGE_COUNT,
            message_ttl: Duration::from_secs(60),
            send_mode: SendMode::Immediate,
            clean_up: true,
            wait_for_expiry: false,
            use_dead_letter_sub_queue: false,
            defer_before_complete: false,
            peek_first: false,
            disposition,
        }
    }

    pub fn with_message_count(mut self, count: usize) -> Self {
        self.message_count = count;
        self
    }

    pub fn with_message_ttl(mut self, ttl: Duration) -> Self {
        self.message_ttl = ttl;
        self
    }

    pub fn with_send_mode(mut self, send_mode: SendMode) -> Self {
        self.send_mode = send_mode;
        self
    }

    /// Reuse the queue and its messages as an earlier scenario left them
    pub fn continuing(mut self) -> Self {
        self.clean_up = false;
        self.send_mode = SendMode::None;
        self
    }

    pub fn with_expiry_wait(mut self) -> Self {
        self.wait_for_expiry = true;
        self
    }

    pub fn on_dead_letter_sub_queue(mut self) -> Self {
        self.use_dead_letter_sub_queue = true;
        self
    }

    pub fn with_defer_before_complete(mut self) -> Self {
        self.defer_before_complete = true;
        self
    }

    pub fn with_peek_first(mut self) -> Self {
        self.peek_first = true;
        self
    }

    pub fn sub_queue(&self) -> SubQueue {
        if self.use_dead_letter_sub_queue {
            SubQueue::DeadLetter
        } else {
            SubQueue::None
        }
    }

    /// Queue created during clean up
    pub fn queue_config(&self) -> QueueConfig {
        QueueConfig::new(self.queue_name.clone())
    }
}

/// Knobs shared by every scenario run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenarioOptions {
    pub expiry_wait_factor: u32,
}

impl Default for ScenarioOptions {
    fn default() -> Self {
        Self {
            expiry_wait_factor: DEFAULT_EXPIRY_WAIT_FACTOR,
        }
    }
}

// ============================================================================
// Report
// ============================================================================

/// State printed at one point of a scenario
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseReport {
    pub label: String,
    pub caches: CacheSummary,
    pub messages: Vec<MessageSnapshot>,
}

/// Everything a scenario observed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenarioReport {
    pub title: String,
    pub queue_name: QueueName,
    pub sub_queue: SubQueue,
    pub sent: Option<SendSummary>,
    pub phases: Vec<PhaseReport>,
    pub deferred: usize,
    pub completed: usize,
    pub dead_lettered: usize,
    pub abandoned: usize,
    /// Messages seen by the closing peek, for workflows that end with one
    pub final_peek: Option<usize>,
}

impl ScenarioReport {
    fn new(config: &ScenarioConfig) -> Self {
        Self {
            title: config.title.clone(),
            queue_name: config.queue_name.clone(),
            sub_queue: config.sub_queue(),
            sent: None,
            phases: Vec::new(),
            deferred: 0,
            completed: 0,
            dead_lettered: 0,
            abandoned: 0,
            final_peek: None,
        }
    }

    fn record_phase(&mut self, label: &str, caches: &LocalCaches) {
        self.phases.push(PhaseReport {
            label: label.to_string(),
            caches: caches.summary(),
            messages: caches.printable().iter().map(MessageSnapshot::from).collect(),
        });
    }

    /// Pretty-printed JSON rendering
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

impl fmt::Display for ScenarioReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "====== Scenario: {} ======", self.title)?;
        writeln!(f, "Queue: '{}' ({})", self.queue_name, self.sub_queue)?;
        if let Some(sent) = self.sent {
            writeln!(
                f,
                "Sent {} messages in {} batches",
                sent.messages_sent, sent.batches
            )?;
        }

        for phase in &self.phases {
            writeln!(f)?;
            writeln!(f, "---- {} ----", phase.label)?;
            writeln!(f, "**** Queue: '{}' - State ****", self.queue_name)?;
            writeln!(f, "{}", phase.caches)?;
            writeln!(f, "**** End ****")?;
            for message in &phase.messages {
                writeln!(f, " {}", message)?;
            }
        }

        writeln!(f)?;
        writeln!(
            f,
            "Deferred: {} - Completed: {} - Dead-lettered: {} - Abandoned: {}",
            self.deferred, self.completed, self.dead_lettered, self.abandoned
        )?;
        if let Some(remaining) = self.final_peek {
            writeln!(f, "Messages remaining on final peek: {}", remaining)?;
        }
        write!(f, "====== End: {} ======", self.title)
    }
}

// ============================================================================
// Workflow
// ============================================================================

/// Run one scenario to completion.
///
/// # Errors
///
/// The first failing remote call, unchanged. Creation and lock-release
/// failures are logged by the controller and do not surface here.
pub async fn run_scenario(
    controller: &QueueLifecycleController,
    config: &ScenarioConfig,
    options: &ScenarioOptions,
) -> Result<ScenarioReport, QueueError> {
    let name = &config.queue_name;
    info!(scenario = %config.title, queue = %name, "Scenario started");

    let mut report = ScenarioReport::new(config);
    let mut caches = LocalCaches::new();

    if config.clean_up {
        controller.clean_up(&config.queue_config()).await?;
    }

    let count = config.message_count;
    report.sent = match &config.send_mode {
        SendMode::None => None,
        SendMode::Immediate => Some(controller.send_messages(name, count, config.message_ttl).await?),
        SendMode::Scheduled { delay } => {
            Some(controller.send_scheduled_messages(name, count, *delay).await?)
        }
        SendMode::Large { body_size } => Some(
            controller
                .send_large_messages(name, count, config.message_ttl, *body_size)
                .await?,
        ),
    };

    if config.wait_for_expiry {
        let wait = config.message_ttl.saturating_mul(options.expiry_wait_factor);
        info!(
            wait_secs = wait.as_secs(),
            ttl_secs = config.message_ttl.as_secs(),
            "Waiting for broker-side expiry"
        );
        tokio::time::sleep(wait).await;
    }

    let receiver = controller.open_receiver(name, config.sub_queue()).await?;
    let result = apply_disposition(controller, receiver.as_ref(), config, &mut caches, &mut report).await;

    if let Err(e) = receiver.close().await {
        warn!(queue = %name, error = %e, "Failed to close receiver");
    }
    result?;

    caches.clear();
    info!(
        scenario = %config.title,
        deferred = report.deferred,
        completed = report.completed,
        dead_lettered = report.dead_lettered,
        "Scenario complete"
    );
    Ok(report)
}

async fn apply_disposition(
    controller: &QueueLifecycleController,
    receiver: &dyn MessageReceiver,
    config: &ScenarioConfig,
    caches: &mut LocalCaches,
    report: &mut ScenarioReport,
) -> Result<(), QueueError> {
    let sub_queue = config.sub_queue();
    let count = u32::try_from(config.message_count).unwrap_or(u32::MAX);

    if config.peek_first {
        caches.record_peeked(sub_queue, controller.peek(receiver, count).await?);
    }

    match config.disposition {
        Disposition::InspectOnly => {}
        Disposition::Receive => {
            caches.record_received(controller.receive(receiver, count).await?);
        }
        Disposition::ReceiveAndAbandon => {
            caches.record_received(controller.receive(receiver, count).await?);
            let summary = controller.abandon_received(receiver, caches.received()).await;
            report.abandoned = summary.released;
        }
        Disposition::DeadLetterPeeked => {
            report.dead_lettered = controller
                .dead_letter_peeked(receiver, caches.peeked_from(sub_queue))
                .await?;
        }
        Disposition::DeadLetterDeferred => {
            report.dead_lettered = controller
                .dead_letter_deferred(receiver, caches.peeked_from(sub_queue))
                .await?;
        }
        Disposition::Defer => {
            if !caches.is_empty() {
                report.record_phase("peeked", caches);
                caches.clear();
            }

            caches.record_received(controller.receive(receiver, count).await?);
            report.deferred = controller.defer_messages(receiver, caches.received()).await?;
            report.record_phase("deferred", caches);
            caches.clear();

            return final_peek(controller, receiver, count, sub_queue, caches, report).await;
        }
        Disposition::CompleteDeferred => {
            if config.defer_before_complete {
                caches.record_received(controller.receive(receiver, count).await?);
                report.deferred = controller.defer_messages(receiver, caches.received()).await?;
                report.record_phase("deferred", caches);
                caches.clear();
            }

            caches.record_peeked(sub_queue, controller.peek(receiver, count).await?);
            report.completed = controller
                .complete_deferred(receiver, caches.peeked_from(sub_queue))
                .await?;
            report.record_phase("completed", caches);
            caches.clear();

            return final_peek(controller, receiver, count, sub_queue, caches, report).await;
        }
    }

    report.record_phase("result", caches);
    Ok(())
}

async fn final_peek(
    controller: &QueueLifecycleController,
    receiver: &dyn MessageReceiver,
    count: u32,
    sub_queue: SubQueue,
    caches: &mut LocalCaches,
    report: &mut ScenarioReport,
) -> Result<(), QueueError> {
    caches.record_peeked(sub_queue, controller.peek(receiver, count).await?);
    report.final_peek = Some(caches.peeked_from(sub_queue).len());
    report.record_phase("final peek", caches);
    caches.clear();
    Ok(())
}

/// Delete every queue the catalogue uses. Returns the queues that were present.
pub async fn delete_all_scenario_queues(
    controller: &QueueLifecycleController,
) -> Result<Vec<QueueName>, QueueError> {
    let mut deleted = Vec::new();

    for name in ScenarioKind::queue_names() {
        let name = QueueName::new(name.to_string())?;
        if controller.delete_queue_if_exists(&name).await? {
            deleted.push(name);
        }
    }

    info!(deleted = deleted.len(), "Scenario queues deleted");
    Ok(deleted)
}

// ============================================================================
// Catalogue
// ============================================================================

/// Preset scenarios, in an order where every prerequisite runs first
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScenarioKind {
    SendReceive,
    SendSchedule,
    DeadLetterPeeked,
    ReceiveDeadLetter,
    AutoExpiryDeadLetter,
    SendDefer,
    DeadLetterDeferred,
    DeferDeadLetter,
    CompleteDeadLetterDeferred,
    AutoExpiryDeadLetterDefer,
    AutoExpiryDeadLetterDeferComplete,
    LargeMessage,
}

impl ScenarioKind {
    pub const ALL: [ScenarioKind; 12] = [
        Self::SendReceive,
        Self::SendSchedule,
        Self::DeadLetterPeeked,
        Self::ReceiveDeadLetter,
        Self::AutoExpiryDeadLetter,
        Self::SendDefer,
        Self::DeadLetterDeferred,
        Self::DeferDeadLetter,
        Self::CompleteDeadLetterDeferred,
        Self::AutoExpiryDeadLetterDefer,
        Self::AutoExpiryDeadLetterDeferComplete,
        Self::LargeMessage,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::SendReceive => "send-receive",
            Self::SendSchedule => "send-schedule",
            Self::DeadLetterPeeked => "dead-letter-peeked",
            Self::ReceiveDeadLetter => "receive-dead-letter",
            Self::AutoExpiryDeadLetter => "auto-expiry-dead-letter",
            Self::SendDefer => "send-defer",
            Self::DeadLetterDeferred => "dead-letter-deferred",
            Self::DeferDeadLetter => "defer-dead-letter",
            Self::CompleteDeadLetterDeferred => "complete-dead-letter-deferred",
            Self::AutoExpiryDeadLetterDefer => "auto-expiry-dead-letter-defer",
            Self::AutoExpiryDeadLetterDeferComplete => "auto-expiry-dead-letter-defer-complete",
            Self::LargeMessage => "large-message",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::SendReceive => "Send messages with TTL, peek and receive them",
            Self::SendSchedule => "Schedule messages one day ahead, then try to receive them",
            Self::DeadLetterPeeked => "Send messages, peek them and dead-letter the peeked ones",
            Self::ReceiveDeadLetter => "Receive from the dead-letter sub-queue",
            Self::AutoExpiryDeadLetter => {
                "Send messages with a short TTL, wait for expiry and inspect the dead-letter sub-queue"
            }
            Self::SendDefer => "Send messages, receive and defer them, then peek the deferred messages",
            Self::DeadLetterDeferred => "Dead-letter the deferred messages of the defer queue",
            Self::DeferDeadLetter => "Receive and defer messages in the dead-letter sub-queue",
            Self::CompleteDeadLetterDeferred => {
                "Complete deferred dead-letter messages by sequence number"
            }
            Self::AutoExpiryDeadLetterDefer => {
                "Let messages expire, then receive and defer them in the dead-letter sub-queue"
            }
            Self::AutoExpiryDeadLetterDeferComplete => {
                "Let messages expire, defer them in the dead-letter sub-queue, then complete them"
            }
            Self::LargeMessage => "Send large messages that need one batch each and receive them",
        }
    }

    pub fn queue_name(&self) -> &'static str {
        match self {
            Self::SendReceive => "q_send_receive",
            Self::SendSchedule => "q_send_schedule",
            Self::DeadLetterPeeked | Self::ReceiveDeadLetter => "q_dead_letter_peeked_msgs",
            Self::AutoExpiryDeadLetter => "q_send_receive_autottlmsg_dead_letter",
            Self::SendDefer
            | Self::DeadLetterDeferred
            | Self::DeferDeadLetter
            | Self::CompleteDeadLetterDeferred => "q_send_defer",
            Self::AutoExpiryDeadLetterDefer => "q_send_autottlmsg_dead_letter_set_defer",
            Self::AutoExpiryDeadLetterDeferComplete => {
                "q_send_autottlmsg_dead_letter_set_defer_complete"
            }
            Self::LargeMessage => "q_large_msg_send_receive",
        }
    }

    /// Distinct queue names used across the catalogue
    pub fn queue_names() -> Vec<&'static str> {
        let mut names: Vec<&'static str> = Self::ALL.iter().map(Self::queue_name).collect();
        names.sort_unstable();
        names.dedup();
        names
    }

    /// Scenarios that must run first to leave the queue in the expected state
    pub fn prerequisites(&self) -> &'static [ScenarioKind] {
        match self {
            Self::ReceiveDeadLetter => &[Self::DeadLetterPeeked],
            Self::DeadLetterDeferred => &[Self::SendDefer],
            Self::DeferDeadLetter => &[Self::SendDefer, Self::DeadLetterDeferred],
            Self::CompleteDeadLetterDeferred => {
                &[Self::SendDefer, Self::DeadLetterDeferred, Self::DeferDeadLetter]
            }
            _ => &[],
        }
    }

    /// Prerequisites followed by this scenario
    pub fn run_plan(&self) -> Vec<ScenarioKind> {
        let mut plan = self.prerequisites().to_vec();
        plan.push(*self);
        plan
    }

    /// Preset configuration for this scenario
    pub fn config(&self, message_count: usize) -> Result<ScenarioConfig, QueueError> {
        let queue_name = QueueName::new(self.queue_name().to_string())?;
        let title = self.description();

        let config = match self {
            Self::SendReceive => ScenarioConfig::new(title, queue_name, Disposition::Receive)
                .with_message_ttl(ONE_DAY)
                .with_peek_first(),
            Self::SendSchedule => ScenarioConfig::new(title, queue_name, Disposition::Receive)
                .with_send_mode(SendMode::Scheduled { delay: ONE_DAY })
                .with_peek_first(),
            Self::DeadLetterPeeked => {
                ScenarioConfig::new(title, queue_name, Disposition::DeadLetterPeeked)
                    .with_message_ttl(ONE_DAY)
                    .with_peek_first()
            }
            Self::ReceiveDeadLetter => ScenarioConfig::new(title, queue_name, Disposition::Receive)
                .continuing()
                .on_dead_letter_sub_queue(),
            Self::AutoExpiryDeadLetter => {
                ScenarioConfig::new(title, queue_name, Disposition::InspectOnly)
                    .with_message_ttl(AUTO_EXPIRY_TTL)
                    .with_expiry_wait()
                    .on_dead_letter_sub_queue()
                    .with_peek_first()
            }
            Self::SendDefer => ScenarioConfig::new(title, queue_name, Disposition::Defer)
                .with_message_ttl(Duration::from_secs(6000)),
            Self::DeadLetterDeferred => {
                ScenarioConfig::new(title, queue_name, Disposition::DeadLetterDeferred)
                    .continuing()
                    .with_peek_first()
            }
            Self::DeferDeadLetter => ScenarioConfig::new(title, queue_name, Disposition::Defer)
                .continuing()
                .on_dead_letter_sub_queue(),
            Self::CompleteDeadLetterDeferred => {
                ScenarioConfig::new(title, queue_name, Disposition::CompleteDeferred)
                    .continuing()
                    .on_dead_letter_sub_queue()
            }
            Self::AutoExpiryDeadLetterDefer => {
                ScenarioConfig::new(title, queue_name, Disposition::Defer)
                    .with_message_ttl(AUTO_EXPIRY_TTL)
                    .with_expiry_wait()
                    .on_dead_letter_sub_queue()
                    .with_peek_first()
            }
            Self::AutoExpiryDeadLetterDeferComplete => {
                ScenarioConfig::new(title, queue_name, Disposition::CompleteDeferred)
                    .with_message_ttl(AUTO_EXPIRY_TTL)
                    .with_expiry_wait()
                    .on_dead_letter_sub_queue()
                    .with_defer_before_complete()
            }
            Self::LargeMessage => {
                return Ok(ScenarioConfig::new(title, queue_name, Disposition::Receive)
                    .with_message_ttl(ONE_DAY)
                    .with_send_mode(SendMode::Large {
                        body_size: LARGE_MESSAGE_BODY_BYTES,
                    })
                    .with_message_count(LARGE_MESSAGE_COUNT))
            }
        };

        Ok(config.with_message_count(message_count))
    }

    /// Message count the scenario always sends, whatever count is requested
    pub fn fixed_message_count(&self) -> Option<usize> {
        match self {
            Self::LargeMessage => Some(LARGE_MESSAGE_COUNT),
            _ => None,
        }
    }
}

impl fmt::Display for ScenarioKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for ScenarioKind {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|kind| kind.name() == s)
            .ok_or_else(|| ValidationError::InvalidFormat {
                field: "scenario".to_string(),
                message: format!("unknown scenario '{}'", s),
            })
    }
}

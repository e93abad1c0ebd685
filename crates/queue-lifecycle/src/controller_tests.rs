//! Tests for the queue lifecycle controller.

use super::*;
use crate::message::MessageId;
use crate::providers::memory::{BrokerMessageState, InMemoryBrokerConfig, InMemoryServiceBus};
use async_trait::async_trait;

fn queue_name(name: &str) -> QueueName {
    QueueName::new(name.to_string()).unwrap()
}

fn fast_settings(attempts: u32) -> LifecycleSettings {
    LifecycleSettings {
        provisioning: RetryPolicy::fixed(attempts, Duration::from_millis(10)),
        readiness: RetryPolicy::fixed(attempts, Duration::from_millis(10)),
    }
}

fn controller_over(bus: &InMemoryServiceBus, settings: LifecycleSettings) -> QueueLifecycleController {
    QueueLifecycleController::new(Arc::new(bus.clone()), Arc::new(bus.clone()), settings)
}

fn sized_messages(count: usize, body_len: usize) -> Vec<OutgoingMessage> {
    (0..count)
        .map(|i| {
            OutgoingMessage::new(Bytes::from(vec![b'x'; body_len]))
                .with_message_id(format!("m{}", i).parse::<MessageId>().unwrap())
        })
        .collect()
}

/// Administration client whose every call fails
struct UnreachableAdmin;

#[async_trait]
impl AdministrationClient for UnreachableAdmin {
    async fn queue_exists(&self, _name: &QueueName) -> Result<bool, QueueError> {
        Err(QueueError::Transient {
            message: "connection refused".to_string(),
        })
    }

    async fn create_queue(&self, config: &QueueConfig) -> Result<Option<QueueConfig>, QueueError> {
        Err(QueueError::EntityExists {
            name: config.name.to_string(),
        })
    }

    async fn delete_queue(&self, name: &QueueName) -> Result<(), QueueError> {
        Err(QueueError::NotFound {
            entity: name.to_string(),
        })
    }

    async fn get_queue(&self, name: &QueueName) -> Result<QueueConfig, QueueError> {
        Err(QueueError::NotFound {
            entity: name.to_string(),
        })
    }
}

// ============================================================================
// Provisioning
// ============================================================================

mod provisioning {
    use super::*;

    #[tokio::test]
    async fn test_ensure_queue_exists_is_idempotent() {
        let bus = InMemoryServiceBus::default();
        let controller = controller_over(&bus, fast_settings(3));
        let config = QueueConfig::new(queue_name("q_idempotent"));

        let first = controller.ensure_queue_exists(&config).await.unwrap();
        let second = controller.ensure_queue_exists(&config).await.unwrap();

        assert_eq!(first, ProvisionOutcome::Created);
        assert_eq!(second, ProvisionOutcome::AlreadyExists);
        assert_eq!(bus.create_queue_calls(&config.name).unwrap(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_create_retried_while_service_returns_no_description() {
        let bus = InMemoryServiceBus::new(InMemoryBrokerConfig {
            unavailable_create_attempts: 2,
            ..Default::default()
        });
        let controller = controller_over(&bus, LifecycleSettings::default());
        let config = QueueConfig::new(queue_name("q_retry_create"));

        let outcome = controller.ensure_queue_exists(&config).await.unwrap();

        assert_eq!(outcome, ProvisionOutcome::Created);
        assert_eq!(bus.create_queue_calls(&config.name).unwrap(), 3);
    }

    #[tokio::test]
    async fn test_create_retry_is_bounded() {
        let bus = InMemoryServiceBus::new(InMemoryBrokerConfig {
            unavailable_create_attempts: 100,
            ..Default::default()
        });
        let controller = controller_over(&bus, fast_settings(3));
        let config = QueueConfig::new(queue_name("q_never_created"));

        let err = controller.ensure_queue_exists(&config).await.unwrap_err();

        assert!(matches!(err, QueueError::Timeout { attempts: 3, .. }));
        assert_eq!(bus.create_queue_calls(&config.name).unwrap(), 3);
    }

    #[tokio::test]
    async fn test_creation_failure_is_swallowed() {
        let bus = InMemoryServiceBus::default();
        let controller =
            QueueLifecycleController::new(Arc::new(UnreachableAdmin), Arc::new(bus), fast_settings(3));
        let config = QueueConfig::new(queue_name("q_unreachable"));

        let outcome = controller.ensure_queue_exists(&config).await.unwrap();

        assert!(matches!(outcome, ProvisionOutcome::CreationFailed { .. }));
        assert!(!outcome.is_available());
    }

    #[tokio::test]
    async fn test_invalid_config_is_rejected_before_any_call() {
        let bus = InMemoryServiceBus::default();
        let controller = controller_over(&bus, fast_settings(3));
        let config = QueueConfig::new(queue_name("q_bad_lock")).with_lock_duration(Duration::from_secs(600));

        let err = controller.ensure_queue_exists(&config).await.unwrap_err();

        assert!(matches!(err, QueueError::ValidationError(_)));
        assert_eq!(bus.create_queue_calls(&config.name).unwrap(), 0);
    }

    #[tokio::test]
    async fn test_delete_queue_if_exists() {
        let bus = InMemoryServiceBus::default();
        let controller = controller_over(&bus, fast_settings(3));
        let config = QueueConfig::new(queue_name("q_delete_me"));

        assert!(!controller.delete_queue_if_exists(&config.name).await.unwrap());

        controller.ensure_queue_exists(&config).await.unwrap();
        assert!(controller.delete_queue_if_exists(&config.name).await.unwrap());
        assert!(!bus.queue_exists(&config.name).await.unwrap());
    }

    #[tokio::test]
    async fn test_wait_until_ready_tolerates_provisioning_delay() {
        let bus = InMemoryServiceBus::new(InMemoryBrokerConfig {
            provisioning_reads: 2,
            ..Default::default()
        });
        let controller = controller_over(&bus, fast_settings(5));
        let config = QueueConfig::new(queue_name("q_slow"));
        controller.ensure_queue_exists(&config).await.unwrap();

        let ready = controller.wait_until_ready(&config.name).await.unwrap();

        assert_eq!(ready, config);
    }

    #[tokio::test]
    async fn test_wait_until_ready_times_out() {
        let bus = InMemoryServiceBus::default();
        let controller = controller_over(&bus, fast_settings(4));

        let err = controller
            .wait_until_ready(&queue_name("q_never_there"))
            .await
            .unwrap_err();

        assert!(matches!(err, QueueError::Timeout { attempts: 4, .. }));
        assert!(err.to_string().contains("q_never_there"));
    }

    #[tokio::test]
    async fn test_clean_up_empties_existing_queue() {
        let bus = InMemoryServiceBus::default();
        let controller = controller_over(&bus, fast_settings(3));
        let config = QueueConfig::new(queue_name("q_clean"));
        controller.clean_up(&config).await.unwrap();
        controller
            .send_messages(&config.name, 5, Duration::from_secs(60))
            .await
            .unwrap();

        let outcome = controller.clean_up(&config).await.unwrap();

        assert_eq!(outcome, ProvisionOutcome::Created);
        assert_eq!(bus.message_count(&config.name, SubQueue::None).unwrap(), 0);
    }
}

// ============================================================================
// Sending
// ============================================================================

mod sending {
    use super::*;

    #[tokio::test]
    async fn test_greedy_batching_preserves_order() {
        // Each message is 100 + 2 + 64 = 166 bytes, so three fit in 500.
        let bus = InMemoryServiceBus::new(InMemoryBrokerConfig {
            max_batch_size_bytes: 500,
            ..Default::default()
        });
        let controller = controller_over(&bus, fast_settings(3));
        let config = QueueConfig::new(queue_name("q_batches"));
        controller.ensure_queue_exists(&config).await.unwrap();

        let summary = controller
            .send_batched(&config.name, sized_messages(10, 100))
            .await
            .unwrap();

        assert_eq!(summary, SendSummary { messages_sent: 10, batches: 4 });

        let batches = bus.sent_batches(&config.name).unwrap();
        let sizes: Vec<usize> = batches.iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![3, 3, 3, 1]);

        let flattened: Vec<String> = batches.into_iter().flatten().map(|id| id.to_string()).collect();
        let expected: Vec<String> = (0..10).map(|i| format!("m{}", i)).collect();
        assert_eq!(flattened, expected);
    }

    #[tokio::test]
    async fn test_first_message_too_large_sends_nothing() {
        let bus = InMemoryServiceBus::new(InMemoryBrokerConfig {
            max_batch_size_bytes: 500,
            ..Default::default()
        });
        let controller = controller_over(&bus, fast_settings(3));
        let config = QueueConfig::new(queue_name("q_too_large"));
        controller.ensure_queue_exists(&config).await.unwrap();

        let err = controller
            .send_batched(&config.name, sized_messages(3, 1000))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            QueueError::PayloadTooLarge {
                message_index: 0,
                max_size: 500,
                ..
            }
        ));
        assert!(bus.sent_batches(&config.name).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_send_messages_applies_ttl_and_body() {
        let bus = InMemoryServiceBus::default();
        let controller = controller_over(&bus, fast_settings(3));
        let config = QueueConfig::new(queue_name("q_send_body"));
        controller.ensure_queue_exists(&config).await.unwrap();

        let summary = controller
            .send_messages(&config.name, 3, Duration::from_secs(30))
            .await
            .unwrap();
        assert_eq!(summary.messages_sent, 3);

        let receiver = controller.open_receiver(&config.name, SubQueue::None).await.unwrap();
        let peeked = controller.peek(receiver.as_ref(), 10).await.unwrap();
        assert!(peeked[2].body_text().contains("Item number: 2"));

        let ttl = peeked[0].expires_at.unwrap().as_datetime() - peeked[0].enqueued_at.as_datetime();
        assert_eq!(ttl, chrono::Duration::seconds(30));
    }

    #[tokio::test]
    async fn test_scheduled_messages_are_not_receivable_yet() {
        let bus = InMemoryServiceBus::default();
        let controller = controller_over(&bus, fast_settings(3));
        let config = QueueConfig::new(queue_name("q_schedule"));
        controller.ensure_queue_exists(&config).await.unwrap();

        controller
            .send_scheduled_messages(&config.name, 4, Duration::from_secs(86_400))
            .await
            .unwrap();

        let receiver = controller.open_receiver(&config.name, SubQueue::None).await.unwrap();
        let peeked = controller.peek(receiver.as_ref(), 10).await.unwrap();
        assert_eq!(peeked.len(), 4);
        assert!(peeked.iter().all(|m| m.state == MessageState::Scheduled));
        assert!(controller.receive(receiver.as_ref(), 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_large_messages_are_split_across_batches() {
        let bus = InMemoryServiceBus::default();
        let controller = controller_over(&bus, fast_settings(3));
        let config = QueueConfig::new(queue_name("q_large"));
        controller.ensure_queue_exists(&config).await.unwrap();

        let summary = controller
            .send_large_messages(&config.name, 2, Duration::from_secs(60), 200 * 1024)
            .await
            .unwrap();

        assert_eq!(summary, SendSummary { messages_sent: 2, batches: 2 });
    }
}

// ============================================================================
// Settlement
// ============================================================================

mod settlement {
    use super::*;

    async fn populated(name: &str, count: usize) -> (InMemoryServiceBus, QueueLifecycleController, QueueName) {
        let bus = InMemoryServiceBus::default();
        let controller = controller_over(&bus, fast_settings(3));
        let config = QueueConfig::new(queue_name(name)).with_default_message_ttl(Duration::from_secs(3600));
        controller.clean_up(&config).await.unwrap();
        controller
            .send_messages(&config.name, count, Duration::from_secs(3600))
            .await
            .unwrap();
        (bus, controller, config.name)
    }

    #[tokio::test]
    async fn test_deferred_messages_complete_only_by_sequence_number() {
        let (bus, controller, name) = populated("q_defer_complete", 3).await;
        let receiver = controller.open_receiver(&name, SubQueue::None).await.unwrap();

        let received = controller.receive(receiver.as_ref(), 3).await.unwrap();
        assert_eq!(controller.defer_messages(receiver.as_ref(), &received).await.unwrap(), 3);
        assert!(controller.receive(receiver.as_ref(), 3).await.unwrap().is_empty());

        let completed = controller
            .complete_deferred(receiver.as_ref(), &received)
            .await
            .unwrap();

        assert_eq!(completed, 3);
        for message in &received {
            assert_eq!(
                bus.message_state(&name, message.sequence_number).unwrap(),
                Some(BrokerMessageState::Completed)
            );
        }
    }

    #[tokio::test]
    async fn test_complete_deferred_fails_for_active_message() {
        let (_bus, controller, name) = populated("q_not_deferred", 1).await;
        let receiver = controller.open_receiver(&name, SubQueue::None).await.unwrap();
        let peeked = controller.peek(receiver.as_ref(), 1).await.unwrap();

        let err = controller
            .complete_deferred(receiver.as_ref(), &peeked)
            .await
            .unwrap_err();

        assert!(matches!(err, QueueError::LockConflict { .. }));
    }

    #[tokio::test]
    async fn test_abandon_received_counts_failures() {
        let (bus, controller, name) = populated("q_abandon", 3).await;
        let receiver = controller.open_receiver(&name, SubQueue::None).await.unwrap();
        let received = controller.receive(receiver.as_ref(), 3).await.unwrap();
        receiver.complete_message(&received[0]).await.unwrap();

        let summary = controller.abandon_received(receiver.as_ref(), &received).await;

        assert_eq!(summary, AbandonSummary { released: 2, failed: 1 });
        assert_eq!(
            bus.message_state(&name, received[1].sequence_number).unwrap(),
            Some(BrokerMessageState::Active)
        );
    }

    #[tokio::test]
    async fn test_dead_letter_peeked_moves_only_peeked_messages() {
        let (bus, controller, name) = populated("q_dl_peeked", 5).await;
        let receiver = controller.open_receiver(&name, SubQueue::None).await.unwrap();
        let peeked = controller.peek(receiver.as_ref(), 2).await.unwrap();

        let dead_lettered = controller
            .dead_letter_peeked(receiver.as_ref(), &peeked)
            .await
            .unwrap();

        assert_eq!(dead_lettered, 2);
        assert_eq!(bus.message_count(&name, SubQueue::DeadLetter).unwrap(), 2);
        assert_eq!(bus.message_count(&name, SubQueue::None).unwrap(), 3);

        let dl_receiver = controller.open_receiver(&name, SubQueue::DeadLetter).await.unwrap();
        let dead = controller.peek(dl_receiver.as_ref(), 10).await.unwrap();
        let reasons: Vec<&str> = dead
            .iter()
            .map(|m| m.dead_letter.as_ref().unwrap().reason.as_str())
            .collect();
        assert_eq!(reasons, vec![EXPLICIT_DEAD_LETTER_REASON; 2]);
    }

    #[tokio::test]
    async fn test_dead_letter_peeked_abandons_messages_it_did_not_peek() {
        let (bus, controller, name) = populated("q_dl_mixed", 3).await;
        let receiver = controller.open_receiver(&name, SubQueue::None).await.unwrap();
        let mut peeked = controller.peek(receiver.as_ref(), 3).await.unwrap();
        peeked.remove(1);

        let dead_lettered = controller
            .dead_letter_peeked(receiver.as_ref(), &peeked)
            .await
            .unwrap();

        // Only two were asked for, so only the first two were locked.
        assert_eq!(dead_lettered, 1);
        assert_eq!(
            bus.message_state(&name, SequenceNumber::new(2)).unwrap(),
            Some(BrokerMessageState::Active)
        );
    }

    #[tokio::test]
    async fn test_dead_letter_deferred_skips_active_messages() {
        let (bus, controller, name) = populated("q_dl_deferred", 4).await;
        let receiver = controller.open_receiver(&name, SubQueue::None).await.unwrap();
        let received = controller.receive(receiver.as_ref(), 2).await.unwrap();
        controller.defer_messages(receiver.as_ref(), &received).await.unwrap();

        let peeked = controller.peek(receiver.as_ref(), 10).await.unwrap();
        let dead_lettered = controller
            .dead_letter_deferred(receiver.as_ref(), &peeked)
            .await
            .unwrap();

        assert_eq!(dead_lettered, 2);
        assert_eq!(bus.message_count(&name, SubQueue::DeadLetter).unwrap(), 2);
        assert_eq!(bus.message_count(&name, SubQueue::None).unwrap(), 2);
    }

    #[tokio::test]
    async fn test_close_prevents_new_receivers() {
        let (_bus, controller, name) = populated("q_close", 1).await;

        controller.close().await.unwrap();

        assert!(controller.open_receiver(&name, SubQueue::None).await.is_err());
    }
}

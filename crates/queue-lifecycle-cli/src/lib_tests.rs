//! Tests for the queue-lifecycle-cli library module.

use super::*;
use std::io::Write as _;

fn output_of(bytes: Vec<u8>) -> String {
    String::from_utf8(bytes).unwrap()
}

#[test]
fn test_cli_parsing() {
    let cli = Cli::try_parse_from([
        "queue-lifecycle",
        "run",
        "send-receive",
        "--message-count",
        "3",
        "--format",
        "json",
    ]);
    assert!(cli.is_ok());

    let cli = cli.unwrap();
    match cli.command {
        Commands::Run {
            scenario,
            message_count,
            format,
            delete_after,
        } => {
            assert_eq!(scenario, "send-receive");
            assert_eq!(message_count, Some(3));
            assert_eq!(format, OutputFormat::Json);
            assert!(!delete_after);
        }
        _ => panic!("Expected Run command"),
    }
}

#[test]
fn test_global_flags_parse() {
    let cli = Cli::try_parse_from(["queue-lifecycle", "--log-level", "debug", "--json-logs", "list"])
        .unwrap();

    assert_eq!(cli.log_level.as_deref(), Some("debug"));
    assert!(cli.json_logs);
    assert!(matches!(cli.command, Commands::List));
}

#[test]
fn test_run_all_delete_after_flag_parses() {
    let cli = Cli::try_parse_from(["queue-lifecycle", "run-all", "--delete-after"]).unwrap();
    assert!(matches!(
        cli.command,
        Commands::RunAll {
            delete_after: true,
            ..
        }
    ));
    assert!(Cli::try_parse_from(["queue-lifecycle", "delete-all"]).is_err());
}

#[test]
fn test_log_level_flag_must_name_a_level() {
    let logging = LoggingConfig::default();
    let cli = Cli::try_parse_from(["queue-lifecycle", "--log-level", "debug", "list"]).unwrap();
    assert_eq!(log_level(&cli, &logging).unwrap(), tracing::Level::DEBUG);

    let cli = Cli::try_parse_from(["queue-lifecycle", "--log-level", "bogus", "list"]).unwrap();
    let err = log_level(&cli, &logging).unwrap_err();
    assert!(matches!(&err, CliError::InvalidArgument { arg, .. } if arg == "log-level"));
    assert_eq!(err.exit_code(), 3);

    let cli = Cli::try_parse_from(["queue-lifecycle", "list"]).unwrap();
    let err = log_level(
        &cli,
        &LoggingConfig {
            level: "loud".to_string(),
            ..Default::default()
        },
    )
    .unwrap_err();
    assert_eq!(err.exit_code(), 1);
}

#[test]
fn test_unknown_subcommand_is_rejected() {
    assert!(Cli::try_parse_from(["queue-lifecycle", "start"]).is_err());
}

#[test]
fn test_config_defaults() {
    let config = CliConfig::default();
    assert_eq!(config.provisioning.max_attempts, 30);
    assert_eq!(config.readiness.delay_seconds, 2);
    assert_eq!(config.scenario.message_count, 10);
    assert_eq!(config.scenario.expiry_wait_factor, 2);
    assert!(config.scenario.simulated_clock);
    assert_eq!(config.logging.level, "info");
    assert!(config.validate().is_ok());
}

#[test]
fn test_config_validation_rejects_bad_values() {
    let mut config = CliConfig::default();
    config.readiness.max_attempts = 0;
    assert!(matches!(
        config.validate(),
        Err(ConfigError::InvalidValue { ref key, .. }) if key == "readiness.max_attempts"
    ));

    let mut config = CliConfig::default();
    config.logging.level = "loud".to_string();
    assert!(config.validate().is_err());
}

#[test]
fn test_settings_feed_the_controller() {
    let mut config = CliConfig::default();
    config.provisioning = RetrySettings {
        max_attempts: 4,
        delay_seconds: 1,
    };

    let settings = config.lifecycle_settings();

    assert_eq!(
        settings.provisioning,
        RetryPolicy::fixed(4, Duration::from_secs(1))
    );
    assert_eq!(settings.readiness, RetryPolicy::default());
}

#[test]
fn test_load_configuration_from_file() {
    let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
    writeln!(
        file,
        "scenario:\n  message_count: 4\nbroker:\n  provisioning_reads: 2\nlogging:\n  level: debug"
    )
    .unwrap();

    let config = load_configuration(Some(file.path())).unwrap();

    assert_eq!(config.scenario.message_count, 4);
    assert_eq!(config.scenario.expiry_wait_factor, 2);
    assert_eq!(config.broker.provisioning_reads, 2);
    assert_eq!(config.logging.level, "debug");
}

#[test]
fn test_load_configuration_missing_file() {
    let result = load_configuration(Some(Path::new("/no/such/queue-lifecycle.yaml")));
    assert!(matches!(result, Err(ConfigError::FileNotFound { .. })));
}

#[test]
fn test_load_configuration_rejects_invalid_values() {
    let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
    write!(file, r#"{{ "scenario": {{ "message_count": 0 }} }}"#).unwrap();

    let result = load_configuration(Some(file.path()));

    assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
}

#[test]
fn test_exit_codes() {
    let invalid = CliError::InvalidArgument {
        arg: "scenario".to_string(),
        message: "unknown".to_string(),
    };
    assert_eq!(invalid.exit_code(), 3);

    let queue = CliError::Queue(QueueError::Fatal {
        message: "closed".to_string(),
    });
    assert_eq!(queue.exit_code(), 2);

    let config = CliError::Configuration(ConfigError::FileNotFound {
        path: PathBuf::from("x"),
    });
    assert_eq!(config.exit_code(), 1);
}

// ============================================================================
// Command execution
// ============================================================================

#[tokio::test]
async fn test_list_shows_every_scenario() {
    let mut out = Vec::new();

    execute(Commands::List, &CliConfig::default(), &mut out)
        .await
        .unwrap();

    let text = output_of(out);
    for kind in ScenarioKind::ALL {
        assert!(text.contains(kind.name()), "missing {}", kind);
    }
    assert!(text.contains("runs after: send-defer"));
}

#[tokio::test(start_paused = true)]
async fn test_run_prints_prerequisites_first() {
    let mut out = Vec::new();
    let command = Commands::Run {
        scenario: "receive-dead-letter".to_string(),
        message_count: Some(3),
        format: OutputFormat::Text,
        delete_after: false,
    };

    execute(command, &CliConfig::default(), &mut out).await.unwrap();

    let text = output_of(out);
    let header = |kind: ScenarioKind| format!("====== Scenario: {} ======", kind.description());
    let prerequisite = text.find(&header(ScenarioKind::DeadLetterPeeked)).unwrap();
    let requested = text.find(&header(ScenarioKind::ReceiveDeadLetter)).unwrap();
    assert!(prerequisite < requested);
    assert_eq!(text.matches("====== Scenario:").count(), 2);
    assert!(text.contains("Received msgs count: 3"));
}

#[tokio::test(start_paused = true)]
async fn test_run_json_output_is_an_array_of_reports() {
    let mut out = Vec::new();
    let command = Commands::Run {
        scenario: "send-receive".to_string(),
        message_count: Some(2),
        format: OutputFormat::Json,
        delete_after: false,
    };

    execute(command, &CliConfig::default(), &mut out).await.unwrap();

    let json: serde_json::Value = serde_json::from_slice(&out).unwrap();
    assert_eq!(json.as_array().unwrap().len(), 1);
    assert_eq!(json[0]["queue_name"], "q_send_receive");
    assert_eq!(json[0]["sent"]["messages_sent"], 2);
}

#[tokio::test]
async fn test_run_unknown_scenario_is_invalid_argument() {
    let mut out = Vec::new();
    let command = Commands::Run {
        scenario: "no-such-scenario".to_string(),
        message_count: None,
        format: OutputFormat::Text,
        delete_after: false,
    };

    let err = execute(command, &CliConfig::default(), &mut out)
        .await
        .unwrap_err();

    assert_eq!(err.exit_code(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_run_fails_when_queue_never_becomes_ready() {
    let mut config = CliConfig::default();
    config.broker.provisioning_reads = 10;
    config.readiness = RetrySettings {
        max_attempts: 3,
        delay_seconds: 1,
    };
    let command = Commands::Run {
        scenario: "send-receive".to_string(),
        message_count: None,
        format: OutputFormat::Text,
        delete_after: false,
    };

    let err = execute(command, &config, &mut Vec::new()).await.unwrap_err();

    assert!(matches!(err, CliError::Queue(QueueError::Timeout { .. })));
    assert_eq!(err.exit_code(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_run_delete_after_removes_queues_from_the_same_broker() {
    let mut out = Vec::new();
    let command = Commands::Run {
        scenario: "send-receive".to_string(),
        message_count: Some(2),
        format: OutputFormat::Text,
        delete_after: true,
    };

    execute(command, &CliConfig::default(), &mut out).await.unwrap();

    let text = output_of(out);
    let scenario = text.find("====== Scenario:").unwrap();
    let deleted = text.find("Deleted queue 'q_send_receive'").unwrap();
    assert!(scenario < deleted);
    assert_eq!(text.matches("Deleted queue").count(), 1);
    assert!(!text.contains("No scenario queues present"));
}

#[tokio::test(start_paused = true)]
async fn test_failed_run_does_not_delete_queues() {
    let mut config = CliConfig::default();
    config.broker.provisioning_reads = 10;
    config.readiness = RetrySettings {
        max_attempts: 3,
        delay_seconds: 1,
    };
    let mut out = Vec::new();
    let command = Commands::Run {
        scenario: "send-receive".to_string(),
        message_count: None,
        format: OutputFormat::Text,
        delete_after: true,
    };

    assert!(execute(command, &config, &mut out).await.is_err());
    assert!(!output_of(out).contains("Deleted queue"));
}

#[tokio::test]
async fn test_config_command_json() {
    let mut out = Vec::new();

    execute(
        Commands::Config {
            format: OutputFormat::Json,
        },
        &CliConfig::default(),
        &mut out,
    )
    .await
    .unwrap();

    let parsed: CliConfig = serde_json::from_slice(&out).unwrap();
    assert_eq!(parsed, CliConfig::default());
}

#[tokio::test]
async fn test_completions_mention_subcommands() {
    let mut out = Vec::new();

    execute(
        Commands::Completions {
            shell: clap_complete::Shell::Bash,
        },
        &CliConfig::default(),
        &mut out,
    )
    .await
    .unwrap();

    let script = output_of(out);
    assert!(script.contains("queue-lifecycle"));
    assert!(script.contains("run-all"));
}

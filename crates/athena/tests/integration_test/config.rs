//! Tests for RunnerConfig / QueryConfig: environment loading, profiles, validation.

use std::env;
use std::sync::Mutex;
use std::time::Duration;

use athena_query::*;

// Env-based tests must run serially to avoid interfering with each other.
static ENV_LOCK: Mutex<()> = Mutex::new(());

fn clear_athena_env() {
    let keys = [
        "ATHENA_PROFILE",
        "ATHENA_REGION",
        "ATHENA_AWS_PROFILE",
        "ATHENA_DATABASE",
        "ATHENA_WORKGROUP",
        "ATHENA_OUTPUT_LOCATION",
        "ATHENA_WAIT_INTERVAL_MS",
        "ATHENA_MAX_ATTEMPTS",
        "ATHENA_BACKOFF_FACTOR",
        "ATHENA_MAX_WAIT_INTERVAL_MS",
        "ATHENA_CANCEL_ON_TIMEOUT",
        "AWS_REGION",
        "PROD_ATHENA_REGION",
        "PROD_ATHENA_OUTPUT_LOCATION",
        "PROD_ATHENA_WAIT_INTERVAL_MS",
    ];
    for k in keys {
        env::remove_var(k);
    }
}

#[test]
fn test_config_from_env() {
    let _lock = ENV_LOCK.lock().unwrap();
    clear_athena_env();

    env::set_var("ATHENA_REGION", "us-west-2");
    env::set_var("ATHENA_AWS_PROFILE", "analytics-ro");
    env::set_var("ATHENA_DATABASE", "analytics");
    env::set_var("ATHENA_WORKGROUP", "custom");
    env::set_var("ATHENA_OUTPUT_LOCATION", "s3://my-bucket/results/");
    env::set_var("ATHENA_WAIT_INTERVAL_MS", "2000");
    env::set_var("ATHENA_MAX_ATTEMPTS", "30");

    let runner = RunnerConfig::from_env();
    assert_eq!(runner.region, "us-west-2");
    assert_eq!(runner.aws_profile.as_deref(), Some("analytics-ro"));
    assert_eq!(runner.database.as_deref(), Some("analytics"));
    assert_eq!(runner.workgroup.as_deref(), Some("custom"));
    assert_eq!(runner.output_location.as_deref(), Some("s3://my-bucket/results/"));

    let query = QueryConfig::from_env();
    assert_eq!(query.region, "us-west-2");
    assert_eq!(query.wait_interval, Duration::from_secs(2));
    assert_eq!(query.max_attempts, 30);
    assert!(query.validate().is_ok());

    clear_athena_env();
}

#[test]
fn test_profile_selected_by_env() {
    let _lock = ENV_LOCK.lock().unwrap();
    clear_athena_env();

    env::set_var("ATHENA_PROFILE", "prod");
    env::set_var("ATHENA_REGION", "us-east-1");
    env::set_var("PROD_ATHENA_REGION", "eu-central-1");
    env::set_var("ATHENA_OUTPUT_LOCATION", "s3://dev/");
    env::set_var("PROD_ATHENA_OUTPUT_LOCATION", "s3://prod/");
    env::set_var("PROD_ATHENA_WAIT_INTERVAL_MS", "50");

    let runner = RunnerConfig::from_env();
    assert_eq!(runner.region, "eu-central-1");
    assert_eq!(runner.output_location.as_deref(), Some("s3://prod/"));
    assert_eq!(QueryConfig::from_env().wait_interval, Duration::from_millis(50));

    clear_athena_env();
}

#[test]
fn test_query_config_json_defaults() {
    let json = r#"{
        "wait_interval": { "secs": 1, "nanos": 0 },
        "max_attempts": 3,
        "region": "us-east-1"
    }"#;

    let cfg: QueryConfig = serde_json::from_str(json).expect("deserialize");

    assert_eq!(cfg.wait_interval, Duration::from_secs(1));
    assert_eq!(cfg.max_attempts, 3);
    assert!((cfg.backoff_factor - 1.0).abs() < f64::EPSILON);
    assert!(!cfg.cancel_on_timeout);
    assert!(cfg.validate().is_ok());
}

#[test]
fn test_runner_config_json_roundtrip() {
    let mut cfg = RunnerConfig::new("ap-southeast-1");
    cfg.database = Some("events".into());

    let json = serde_json::to_string(&cfg).unwrap();
    let back: RunnerConfig = serde_json::from_str(&json).unwrap();
    assert_eq!(back, cfg);
}

#[tokio::test]
async fn test_empty_region_is_connection_error() {
    let err = QueryRunner::new(&RunnerConfig::new("  "))
        .await
        .err()
        .expect("empty region must be rejected");

    assert!(matches!(err, QueryError::Connection(_)));
    assert!(err.to_string().contains("region"));
}

//! Integration tests for logging system

use core_runtime::logging::{init_logging, redact_if_sensitive, LogFormat, LogLevel, LoggingConfig};

#[test]
fn test_logging_initialization_once() {
    let config = LoggingConfig::default()
        .with_format(LogFormat::Compact)
        .with_level(LogLevel::Debug);

    // Only one global subscriber can be installed per process
    assert!(init_logging(config.clone()).is_ok());
    assert!(init_logging(config).is_err());

    tracing::info!(target: "core_sync", records = 3, "logging initialised");
}

#[test]
fn test_invalid_filter_is_rejected() {
    let config = LoggingConfig::default().with_filter("core_sync=verbose");
    assert!(init_logging(config).is_err());
}

#[test]
fn test_secret_redaction() {
    assert_eq!(redact_if_sensitive("OPENAI_API_KEY", "sk-live"), "[REDACTED]");
    assert_eq!(redact_if_sensitive("bearer_token", "abc"), "[REDACTED]");
    assert_eq!(redact_if_sensitive("model", "text-embedding-3-small"), "text-embedding-3-small");
}

#[test]
fn test_level_ordering() {
    assert!(LogLevel::Trace < LogLevel::Debug);
    assert!(LogLevel::Warn < LogLevel::Error);
}

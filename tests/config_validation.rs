//! Integration tests for configuration loading and validation

#![allow(clippy::expect_used, clippy::unwrap_used)]

use netsync::config::{
    AuthConfig, ClientConfig, LoggingConfig, NetworkConfig, ServerConfig, TransportConfig,
    MAX_FRAME_SIZE,
};
use netsync::core::serialization::SerializationFormat;
use netsync::protocol::auth::AuthFailurePolicy;
use netsync::utils::compression::CompressionKind;
use std::time::Duration;
use tracing::Level;

#[test]
fn test_default_config_validates() {
    let config = NetworkConfig::default();
    let errors = config.validate();
    assert!(
        errors.is_empty(),
        "Default config should be valid, but got errors: {errors:?}"
    );
}

#[test]
fn test_defaults() {
    let config = NetworkConfig::default();
    assert_eq!(config.transport.max_frame_size, MAX_FRAME_SIZE);
    assert_eq!(config.transport.serialization, SerializationFormat::Json);
    assert_eq!(config.transport.compression, CompressionKind::None);
    assert!(config.transport.reply_with_errors);
    assert_eq!(config.auth.failure_policy, AuthFailurePolicy::KeepOpen);
}

#[test]
fn test_invalid_bind_address() {
    let mut config = NetworkConfig::default();
    config.server.bind_address = "not-an-ip".to_string();

    let errors = config.validate();
    assert!(errors.iter().any(|e| e.contains("is not an IP address")));
}

#[test]
fn test_empty_bind_address() {
    let mut config = NetworkConfig::default();
    config.server.bind_address = String::new();

    let errors = config.validate();
    assert!(errors.iter().any(|e| e.contains("server.bind_address is empty")));
}

#[test]
fn test_zero_port() {
    let mut config = NetworkConfig::default();
    config.server.port = 0;

    let errors = config.validate();
    assert!(errors
        .iter()
        .any(|e| e.contains("server.port must not be 0")));
}

#[test]
fn test_admission_timeout_bounds() {
    let mut config = NetworkConfig::default();
    config.server.admission_timeout = Duration::from_millis(1);
    assert!(config
        .validate()
        .iter()
        .any(|e| e.contains("server.admission_timeout below")));

    config.server.admission_timeout = Duration::from_secs(301);
    assert!(config
        .validate()
        .iter()
        .any(|e| e.contains("server.admission_timeout above")));
}

#[test]
fn test_connect_timeout_bounds() {
    let mut config = NetworkConfig::default();
    config.client.connect_timeout = Duration::from_millis(50);
    assert!(config
        .validate()
        .iter()
        .any(|e| e.contains("client.connect_timeout below")));

    config.client.connect_timeout = Duration::from_secs(400);
    assert!(config
        .validate()
        .iter()
        .any(|e| e.contains("client.connect_timeout above")));
}

#[test]
fn test_empty_client_address() {
    let mut config = NetworkConfig::default();
    config.client.address = String::new();

    let errors = config.validate();
    assert!(errors
        .iter()
        .any(|e| e.contains("client.address is empty")));
}

#[test]
fn test_zero_max_frame_size() {
    let mut config = NetworkConfig::default();
    config.transport.max_frame_size = 0;

    let errors = config.validate();
    assert!(errors.iter().any(|e| e.contains("transport.max_frame_size must not be 0")));
}

#[test]
fn test_excessive_max_frame_size() {
    let mut config = NetworkConfig::default();
    config.transport.max_frame_size = 512 * 1024 * 1024;

    let errors = config.validate();
    assert!(errors.iter().any(|e| e.contains("exceeds")));
}

#[test]
fn test_app_name_limits() {
    let mut config = NetworkConfig::default();
    config.logging.app_name = String::new();
    assert!(config
        .validate()
        .iter()
        .any(|e| e.contains("logging.app_name is empty")));

    config.logging.app_name = "a".repeat(100);
    assert!(config
        .validate()
        .iter()
        .any(|e| e.contains("at most 64 allowed")));
}

#[test]
fn test_validate_strict() {
    assert!(NetworkConfig::default().validate_strict().is_ok());

    let config = NetworkConfig::default_with_overrides(|c| c.server.port = 0);
    let error = config.validate_strict().unwrap_err();
    assert!(error.to_string().contains("1 configuration problem(s)"));
}

#[test]
fn test_multiple_validation_errors() {
    let config = NetworkConfig::default_with_overrides(|c| {
        c.server.bind_address = String::new();
        c.server.port = 0;
        c.client.address = String::new();
        c.transport.max_frame_size = 0;
        c.logging.app_name = String::new();
    });

    let errors = config.validate();
    assert_eq!(errors.len(), 5, "got: {errors:?}");
}

#[test]
fn test_partial_toml_falls_back_to_defaults() {
    let config = NetworkConfig::from_toml(
        r#"
        [server]
        bind_address = "127.0.0.1"
        port = 9000
        admission_timeout = 2500

        [auth]
        failure_policy = "disconnect"
        "#,
    )
    .unwrap();

    assert_eq!(config.server.port, 9000);
    assert_eq!(config.server.admission_timeout, Duration::from_millis(2500));
    assert_eq!(config.auth.failure_policy, AuthFailurePolicy::Disconnect);
    assert_eq!(config.transport.max_frame_size, MAX_FRAME_SIZE);
    assert_eq!(config.logging.app_name, "netsync");
}

#[test]
fn test_malformed_toml_is_config_error() {
    let result = NetworkConfig::from_toml("[server\nport = ");
    assert!(matches!(
        result,
        Err(netsync::ProtocolError::ConfigError(msg)) if msg.contains("Invalid TOML")
    ));
}

#[test]
fn test_example_config_parses_back() {
    let example = NetworkConfig::example_config();
    let config = NetworkConfig::from_toml(&example).unwrap();
    assert!(config.validate().is_empty());
    assert_eq!(config.server.port, NetworkConfig::default().server.port);
}

#[test]
fn test_save_and_load_file() {
    let path = std::env::temp_dir().join(format!("netsync-config-{}.toml", std::process::id()));
    let config = NetworkConfig {
        server: ServerConfig {
            bind_address: "127.0.0.1".to_string(),
            port: 4000,
            admission_timeout: Duration::from_secs(3),
        },
        client: ClientConfig {
            address: "game.example.com:4000".to_string(),
            connect_timeout: Duration::from_secs(10),
        },
        transport: TransportConfig {
            max_frame_size: 1024 * 1024,
            serialization: SerializationFormat::MessagePack,
            compression: CompressionKind::Zstd,
            reply_with_errors: false,
        },
        auth: AuthConfig {
            failure_policy: AuthFailurePolicy::Disconnect,
        },
        logging: LoggingConfig {
            app_name: "game-server".to_string(),
            log_level: Level::DEBUG,
            json_format: true,
        },
    };

    config.save_to_file(&path).unwrap();
    let loaded = NetworkConfig::from_file(&path).unwrap();
    std::fs::remove_file(&path).ok();

    assert_eq!(loaded.server.port, 4000);
    assert_eq!(loaded.client.address, "game.example.com:4000");
    assert_eq!(loaded.transport.serialization, SerializationFormat::MessagePack);
    assert_eq!(loaded.transport.compression, CompressionKind::Zstd);
    assert!(!loaded.transport.reply_with_errors);
    assert_eq!(loaded.logging.log_level, Level::DEBUG);
    assert!(loaded.validate().is_empty());
}

#[test]
fn test_missing_file_is_config_error() {
    let result = NetworkConfig::from_file("/definitely/not/here/netsync.toml");
    assert!(matches!(result, Err(netsync::ProtocolError::ConfigError(_))));
}

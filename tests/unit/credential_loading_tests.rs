//! Credential loading: keychain lookup with environment-variable fallback.
//!
//! The keychain service `issue-agent-bridge` is absent in test
//! environments, so every lookup falls through to the env vars.
//!
//! NOTE: These tests mutate process-global env vars and must run serially.

use issue_agent_bridge::config::{GlobalConfig, GATEWAY_KEY_ENV, GITHUB_TOKEN_ENV};

#[tokio::test]
#[serial_test::serial]
#[allow(unsafe_code)]
async fn env_vars_populate_credentials() {
    let mut config = GlobalConfig::default();
    unsafe {
        std::env::set_var(GATEWAY_KEY_ENV, "  apk_test_key  ");
        std::env::set_var(GITHUB_TOKEN_ENV, "ghp_test_token");
    }

    config.load_credentials().await.expect("credentials load");

    assert_eq!(config.gateway.api_key.as_deref(), Some("apk_test_key"));
    assert_eq!(config.github.token.as_deref(), Some("ghp_test_token"));

    unsafe {
        std::env::remove_var(GATEWAY_KEY_ENV);
        std::env::remove_var(GITHUB_TOKEN_ENV);
    }
}

/// Absent credentials are not a startup failure.
#[tokio::test]
#[serial_test::serial]
#[allow(unsafe_code)]
async fn missing_credentials_are_tolerated() {
    let mut config = GlobalConfig::default();
    unsafe {
        std::env::remove_var(GATEWAY_KEY_ENV);
        std::env::remove_var(GITHUB_TOKEN_ENV);
    }

    config
        .load_credentials()
        .await
        .expect("missing credentials are not an error");

    assert_eq!(config.gateway.api_key, None);
    assert_eq!(config.github.token, None);
}

#[tokio::test]
#[serial_test::serial]
#[allow(unsafe_code)]
async fn blank_env_var_counts_as_missing() {
    let mut config = GlobalConfig::default();
    unsafe {
        std::env::set_var(GATEWAY_KEY_ENV, "   ");
        std::env::remove_var(GITHUB_TOKEN_ENV);
    }

    config.load_credentials().await.expect("credentials load");
    assert_eq!(config.gateway.api_key, None);

    unsafe {
        std::env::remove_var(GATEWAY_KEY_ENV);
    }
}

use serial_test::serial;
use std::env;
use std::time::Duration;

use tripwise_api::config::{ConfigError, ServiceConfig};

const VARS: [&str; 8] = [
    "LLM_API_KEY",
    "LLM_MODEL",
    "DATA_STORE_URL",
    "DATA_STORE_KEY",
    "DATA_STORE_USER",
    "JWT_SECRET",
    "GENERATION_LOCK_TTL_SECS",
    "PORT",
];

fn clear_env() {
    for name in VARS {
        env::remove_var(name);
    }
}

fn set_required() {
    env::set_var("LLM_API_KEY", "sk-env-test");
    env::set_var("DATA_STORE_URL", "mongodb://localhost:27017");
    env::set_var("DATA_STORE_KEY", "store-secret");
    env::set_var("JWT_SECRET", "jwt-secret");
}

#[test]
#[serial]
fn test_loads_from_environment() {
    clear_env();
    set_required();
    env::set_var("LLM_MODEL", "google/gemini-2.5-pro");
    env::set_var("DATA_STORE_USER", "planner");
    env::set_var("GENERATION_LOCK_TTL_SECS", "90");
    env::set_var("PORT", "9090");

    let config = ServiceConfig::from_env().unwrap();
    assert_eq!(config.llm.api_key, "sk-env-test");
    assert_eq!(config.llm.model, "google/gemini-2.5-pro");
    assert_eq!(config.data_store.user, "planner");
    assert_eq!(config.data_store.key, "store-secret");
    assert_eq!(config.generation_lock_ttl, Duration::from_secs(90));
    assert_eq!(config.port, 9090);

    clear_env();
}

#[test]
#[serial]
fn test_missing_gateway_key_fails_fast() {
    clear_env();
    set_required();
    env::remove_var("LLM_API_KEY");

    let err = ServiceConfig::from_env().unwrap_err();
    assert_eq!(err, ConfigError::Missing("LLM_API_KEY"));
    assert_eq!(err.to_string(), "LLM_API_KEY not configured");

    clear_env();
}

#[test]
#[serial]
fn test_missing_store_credentials_fail_fast() {
    clear_env();
    set_required();
    env::remove_var("DATA_STORE_KEY");

    assert_eq!(
        ServiceConfig::from_env().unwrap_err(),
        ConfigError::Missing("DATA_STORE_KEY")
    );

    clear_env();
}

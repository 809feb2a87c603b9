// Tests for configuration loading

use freelytics_core::config::{AppConfig, ConfigError, DEFAULT_CONFIG_TEMPLATE};
use freelytics_scanner::crawler::DEFAULT_WORKERS;
use freelytics_scanner::ContractType;
use freelytics_scanner::normalize::{normalize_contract, normalize_location};
use std::fs;
use tempfile::TempDir;

const MINIMAL_CONFIG: &str = r#"
[search]
base_url = "https://jobs.example.com/search"
jobs = ["rust"]
"#;

// ============================================================================
// Loading Tests
// ============================================================================

#[test]
fn test_load_minimal_config_uses_defaults() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("freelytics.toml");
    fs::write(&path, MINIMAL_CONFIG).unwrap();

    let config = AppConfig::load(&path).unwrap();

    assert_eq!(config.search.jobs, vec!["rust"]);
    assert_eq!(config.crawl.workers, DEFAULT_WORKERS);
    assert!(config.storage.database.ends_with("freelytics.db"));
}

#[test]
fn test_load_missing_file() {
    let temp_dir = TempDir::new().unwrap();
    let result = AppConfig::load(&temp_dir.path().join("missing.toml"));
    assert!(matches!(result, Err(ConfigError::Read { .. })));
}

#[test]
fn test_parse_error() {
    let result = AppConfig::parse("[search\nbase_url = 1");
    assert!(matches!(result, Err(ConfigError::Parse(_))));
}

#[test]
fn test_write_template_round_trip() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("nested").join("freelytics.toml");

    AppConfig::write_template(&path).unwrap();

    assert_eq!(fs::read_to_string(&path).unwrap(), DEFAULT_CONFIG_TEMPLATE);
    assert!(AppConfig::load(&path).is_ok());
}

// ============================================================================
// Validation Tests
// ============================================================================

#[test]
fn test_missing_base_url_is_invalid() {
    let config = AppConfig::parse("[search]\njobs = [\"rust\"]\n").unwrap();
    assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
}

#[test]
fn test_zero_workers_is_invalid() {
    let content = format!("{}\n[crawl]\nworkers = 0\n", MINIMAL_CONFIG);
    let config = AppConfig::parse(&content).unwrap();
    assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
}

#[test]
fn test_bad_selector_is_invalid() {
    let content = format!("{}\n[selectors]\ncard = \"div[[\"\n", MINIMAL_CONFIG);
    let config = AppConfig::parse(&content).unwrap();

    let err = config.validate().unwrap_err();
    assert!(matches!(err, ConfigError::Invalid(_)));
    assert!(err.to_string().contains("div[["));
}

#[test]
fn test_selector_override_keeps_other_defaults() {
    let content = format!("{}\n[selectors]\ncard = \"li.job\"\n", MINIMAL_CONFIG);
    let config = AppConfig::parse(&content).unwrap();

    assert_eq!(config.selectors.card, "li.job");
    assert_eq!(config.selectors.detail_title, "h1");
    assert!(config.selectors().is_ok());
}

// ============================================================================
// Normalization Override Tests
// ============================================================================

#[test]
fn test_normalize_overrides_replace_tables() {
    let content = format!(
        r#"{}
[[normalize.contracts]]
contract = "internship"
keywords = ["praktikum"]

[[normalize.locations]]
token = "berlin"
aliases = ["brandenburg"]
"#,
        MINIMAL_CONFIG
    );
    let config = AppConfig::parse(&content).unwrap();
    config.validate().unwrap();

    let rules = config.normalize_rules();
    assert_eq!(
        normalize_contract("Praktikum 6 Monate", &rules.contracts),
        ContractType::Internship
    );
    assert_eq!(normalize_contract("CDI", &rules.contracts), ContractType::Unknown);

    let location = normalize_location("Brandenburg", &rules.locations);
    assert_eq!(location.value, "berlin");
    assert!(!location.needs_review);
}

#[test]
fn test_empty_location_token_is_invalid() {
    let content = format!("{}\n[[normalize.locations]]\ntoken = \" \"\n", MINIMAL_CONFIG);
    let config = AppConfig::parse(&content).unwrap();
    assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
}

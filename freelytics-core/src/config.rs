// Configuration file loading and validation

use freelytics_scanner::crawler::{
    DEFAULT_MAX_PAGES, DEFAULT_TIMEOUT_SECS, DEFAULT_USER_AGENT, DEFAULT_WORKERS,
};
use freelytics_scanner::{
    ContractType, ContractVocabulary, LocationTable, NormalizeRules, SearchConfig, SelectorConfig,
    Selectors,
};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

pub const DEFAULT_CONFIG_DIR: &str = "~/.config/freelytics";
pub const CONFIG_FILE_NAME: &str = "freelytics.toml";
pub const DATABASE_FILE_NAME: &str = "freelytics.db";

/// Starting point written by `freelytics init`.
pub const DEFAULT_CONFIG_TEMPLATE: &str = r#"# FreeLytics configuration

[search]
# Listing page the search parameters are appended to
base_url = "https://www.free-work.com/fr/tech-it/jobs"
# Keywords, one search per keyword. Leave empty for no keyword filter.
jobs = ["data engineer", "data scientist", "data analyst"]
# Location filters in the site's own format
locations = ["fr~ile-de-france~~"]
# Contract filters: permanent, contractor, internship, ...
contracts = []

[crawl]
max_pages = 50
workers = 4
timeout_secs = 30

[storage]
database = "~/.config/freelytics/freelytics.db"

# Selector overrides, e.g.
# [selectors]
# card = "div.mb-4.relative"

# Normalization table overrides, e.g.
# [[normalize.contracts]]
# contract = "freelance"
# keywords = ["freelance", "portage salarial"]
#
# [[normalize.locations]]
# token = "paris"
# aliases = ["ile-de-france", "75"]
"#;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write config {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CrawlSettings {
    pub max_pages: usize,
    pub workers: usize,
    pub timeout_secs: u64,
    pub user_agent: String,
}

impl Default for CrawlSettings {
    fn default() -> Self {
        Self {
            max_pages: DEFAULT_MAX_PAGES,
            workers: DEFAULT_WORKERS,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    /// Database file, `~` is expanded
    pub database: String,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            database: format!("{}/{}", DEFAULT_CONFIG_DIR, DATABASE_FILE_NAME),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContractRule {
    pub contract: ContractType,
    pub keywords: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationRule {
    pub token: String,
    #[serde(default)]
    pub aliases: Vec<String>,
}

/// Replacement normalization tables. An empty list keeps the built-in table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizeSettings {
    pub contracts: Vec<ContractRule>,
    pub locations: Vec<LocationRule>,
}

impl NormalizeSettings {
    pub fn rules(&self) -> NormalizeRules {
        let contracts = if self.contracts.is_empty() {
            ContractVocabulary::default()
        } else {
            ContractVocabulary::new(
                self.contracts
                    .iter()
                    .map(|rule| (rule.contract, rule.keywords.clone()))
                    .collect(),
            )
        };

        let locations = if self.locations.is_empty() {
            LocationTable::default()
        } else {
            LocationTable::new(
                self.locations
                    .iter()
                    .map(|rule| (rule.token.clone(), rule.aliases.clone()))
                    .collect(),
            )
        };

        NormalizeRules {
            contracts,
            locations,
        }
    }
}

/// Everything read from `freelytics.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub search: SearchConfig,
    pub crawl: CrawlSettings,
    pub storage: StorageSettings,
    pub selectors: SelectorConfig,
    pub normalize: NormalizeSettings,
}

impl AppConfig {
    pub fn default_path() -> PathBuf {
        expand_path(&format!("{}/{}", DEFAULT_CONFIG_DIR, CONFIG_FILE_NAME))
    }

    /// Read, parse and validate a config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        debug!("Loading config from {}", path.display());
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::parse(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse without validating.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.search
            .base_url()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;

        if self.crawl.workers == 0 {
            return Err(ConfigError::Invalid("crawl.workers must be at least 1".to_string()));
        }
        if self.crawl.max_pages == 0 {
            return Err(ConfigError::Invalid("crawl.max_pages must be at least 1".to_string()));
        }
        if self.crawl.timeout_secs == 0 {
            return Err(ConfigError::Invalid("crawl.timeout_secs must be at least 1".to_string()));
        }
        if self.storage.database.trim().is_empty() {
            return Err(ConfigError::Invalid("storage.database is empty".to_string()));
        }
        if self.normalize.locations.iter().any(|rule| rule.token.trim().is_empty()) {
            return Err(ConfigError::Invalid("normalize.locations has an empty token".to_string()));
        }

        self.selectors()?;
        Ok(())
    }

    pub fn selectors(&self) -> Result<Selectors, ConfigError> {
        Selectors::compile(&self.selectors).map_err(|e| ConfigError::Invalid(e.to_string()))
    }

    pub fn normalize_rules(&self) -> NormalizeRules {
        self.normalize.rules()
    }

    pub fn database_path(&self) -> PathBuf {
        expand_path(&self.storage.database)
    }

    /// Write the default template to `path`, creating parent directories.
    pub fn write_template(path: &Path) -> Result<(), ConfigError> {
        let write_err = |source: std::io::Error| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(write_err)?;
        }
        fs::write(path, DEFAULT_CONFIG_TEMPLATE).map_err(write_err)
    }
}

pub fn expand_path(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).as_ref())
}

//! Run configuration loaded from TOML.
//!
//! A file may name a parent through a top-level `extends = "<path>"`; the
//! parent's values fill in every field the child leaves unset. Secrets can be
//! supplied through `SEDDIT_CLIENT_ID`, `SEDDIT_CLIENT_SECRET` and
//! `SEDDIT_USER_AGENT` instead of the file.

use crate::error::ConfigError;
use crate::feed::MAX_FEED_LIMIT;
use crate::types::Feed;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";
pub const STORE_FILE_NAME: &str = "seddit.db";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub reddit: RedditSettings,
    pub cache: CacheSettings,
    pub files: FileSettings,
    pub filters: FilterSettings,
    pub regex: RegexSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RedditSettings {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub user_agent: String,
}

impl Default for RedditSettings {
    fn default() -> Self {
        Self {
            client_id: None,
            client_secret: None,
            user_agent: format!("seddit/{} (title term counter)", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl RedditSettings {
    /// Client id and secret, or the first one that is missing.
    pub fn credentials(&self) -> Result<(&str, &str), ConfigError> {
        let client_id = non_empty(self.client_id.as_deref()).ok_or(ConfigError::MissingField {
            field: "reddit.client_id".to_string(),
        })?;
        let client_secret =
            non_empty(self.client_secret.as_deref()).ok_or(ConfigError::MissingField {
                field: "reddit.client_secret".to_string(),
            })?;
        Ok((client_id, client_secret))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    pub dir_path: PathBuf,
    pub ttl_hot: u64,
    pub ttl_new: u64,
    pub ttl_top: u64,
    pub ttl_rising: u64,
    pub enabled_feeds: Vec<Feed>,
    /// Posts requested per fetch; zero or negative means the API maximum.
    pub feed_limit: i64,
    pub request_timeout_secs: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            dir_path: PathBuf::from("cache"),
            ttl_hot: 86_400,
            ttl_new: 21_600,
            ttl_top: 2_592_000,
            ttl_rising: 3_600,
            enabled_feeds: vec![Feed::Hot, Feed::New, Feed::Top],
            feed_limit: MAX_FEED_LIMIT as i64,
            request_timeout_secs: 30,
        }
    }
}

impl CacheSettings {
    pub fn ttl_for(&self, feed: Feed) -> Duration {
        let seconds = match feed {
            Feed::Hot => self.ttl_hot,
            Feed::New => self.ttl_new,
            Feed::Top => self.ttl_top,
            Feed::Rising => self.ttl_rising,
        };
        Duration::from_secs(seconds)
    }

    pub fn effective_feed_limit(&self) -> u32 {
        if self.feed_limit <= 0 {
            MAX_FEED_LIMIT
        } else {
            self.feed_limit.min(MAX_FEED_LIMIT as i64) as u32
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    pub fn store_path(&self) -> PathBuf {
        self.dir_path.join(STORE_FILE_NAME)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileSettings {
    pub search_terms: Option<PathBuf>,
    pub term_groups: Option<PathBuf>,
    pub word_filters: Vec<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterSettings {
    pub threshold: u64,
    /// Highest rank reported; negative means unlimited.
    pub rank_cutoff: i64,
    pub case_sensitive: bool,
}

impl Default for FilterSettings {
    fn default() -> Self {
        Self {
            threshold: 0,
            rank_cutoff: -1,
            case_sensitive: false,
        }
    }
}

impl FilterSettings {
    pub fn rank_limit(&self) -> Option<usize> {
        usize::try_from(self.rank_cutoff).ok()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegexSettings {
    pub ignore_title: Option<String>,
    pub require_title: Option<String>,
    pub ignore_word: Option<String>,
    pub require_word: Option<String>,
}

impl AppConfig {
    /// Replace credentials with values found through `lookup`.
    pub fn apply_env_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(client_id) = lookup("SEDDIT_CLIENT_ID") {
            self.reddit.client_id = Some(client_id);
        }
        if let Some(client_secret) = lookup("SEDDIT_CLIENT_SECRET") {
            self.reddit.client_secret = Some(client_secret);
        }
        if let Some(user_agent) = lookup("SEDDIT_USER_AGENT") {
            self.reddit.user_agent = user_agent;
        }
    }

    pub fn apply_env_overrides(&mut self) {
        self.apply_env_overrides_from(|name| std::env::var(name).ok());
    }
}

/// Load configuration from file, following `extends` chains, then apply
/// environment overrides.
pub fn load_config(path: &Path) -> Result<AppConfig, ConfigError> {
    let mut chain = Vec::new();
    let table = load_layered(path, &mut chain)?;
    let mut config: AppConfig = toml::Value::Table(table).try_into()?;
    config.apply_env_overrides();
    debug!("Loaded configuration from {} file(s)", chain.len());
    Ok(config)
}

/// Load configuration from TOML string (useful for testing)
pub fn load_config_from_str(toml_str: &str) -> Result<AppConfig, ConfigError> {
    Ok(toml::from_str(toml_str)?)
}

fn load_layered(path: &Path, chain: &mut Vec<PathBuf>) -> Result<toml::Table, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::FileNotFound {
            path: path.display().to_string(),
        });
    }

    let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::InvalidFormat {
        details: format!("{}: {}", path.display(), e),
    })?;
    let mut table: toml::Table = raw.parse()?;
    chain.push(path.canonicalize().unwrap_or_else(|_| path.to_path_buf()));

    match table.remove("extends") {
        None => Ok(table),
        Some(toml::Value::String(parent)) => {
            let parent_path = match path.parent() {
                Some(dir) if Path::new(&parent).is_relative() => dir.join(&parent),
                _ => PathBuf::from(&parent),
            };
            let resolved = parent_path
                .canonicalize()
                .unwrap_or_else(|_| parent_path.clone());

            if chain.contains(&resolved) {
                warn!(
                    "{} extends {}, which already extends it; ignoring the parent",
                    path.display(),
                    parent_path.display()
                );
                return Ok(table);
            }

            let mut base = load_layered(&parent_path, chain)?;
            merge_tables(&mut base, table);
            Ok(base)
        }
        Some(other) => Err(ConfigError::InvalidValue {
            field: "extends".to_string(),
            value: other.to_string(),
        }),
    }
}

fn merge_tables(base: &mut toml::Table, overlay: toml::Table) {
    for (key, value) in overlay {
        match value {
            toml::Value::Table(incoming) => match base.get_mut(&key) {
                Some(toml::Value::Table(existing)) => merge_tables(existing, incoming),
                _ => {
                    base.insert(key, toml::Value::Table(incoming));
                }
            },
            value => {
                base.insert(key, value);
            }
        }
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

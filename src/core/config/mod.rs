use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::core::filter::{FilterRule, RuleError, RuleSet};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct FeedConfig {
    pub name: String,
    pub urls: Vec<String>,
    #[serde(default)]
    pub exclude: Vec<FilterRule>,
    #[serde(default)]
    pub include: Vec<FilterRule>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct FeedsConfig {
    pub feeds: Vec<FeedConfig>,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config yaml: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("config defines no feeds")]
    NoFeeds,
    #[error("feed #{index} has an empty name")]
    EmptyName { index: usize },
    #[error("feed name {0:?} must not contain '/'")]
    InvalidName(String),
    #[error("feed {0:?} is defined more than once")]
    DuplicateName(String),
    #[error("feed {0:?} has no source urls")]
    NoUrls(String),
    #[error("feed {feed:?}: {source}")]
    Rule {
        feed: String,
        #[source]
        source: RuleError,
    },
}

/// Feed definition with its rules compiled, ready for the pipeline.
#[derive(Debug, Clone)]
pub struct CompiledFeed {
    pub name: String,
    pub urls: Vec<String>,
    pub exclude: RuleSet,
    pub include: RuleSet,
}

impl CompiledFeed {
    pub fn compile(config: &FeedConfig) -> Result<Self, ConfigError> {
        let rule_error = |source| ConfigError::Rule {
            feed: config.name.clone(),
            source,
        };
        Ok(Self {
            name: config.name.clone(),
            urls: config.urls.clone(),
            exclude: RuleSet::compile(&config.exclude).map_err(rule_error)?,
            include: RuleSet::compile(&config.include).map_err(rule_error)?,
        })
    }
}

/// Validated feeds in configuration order.
#[derive(Debug, Clone)]
pub struct FeedRegistry {
    feeds: Vec<CompiledFeed>,
}

impl FeedRegistry {
    pub fn from_config(config: &FeedsConfig) -> Result<Self, ConfigError> {
        if config.feeds.is_empty() {
            return Err(ConfigError::NoFeeds);
        }

        let mut seen_names = HashSet::new();
        let mut feeds = Vec::with_capacity(config.feeds.len());
        for (index, feed) in config.feeds.iter().enumerate() {
            if feed.name.trim().is_empty() {
                return Err(ConfigError::EmptyName { index });
            }
            if feed.name.contains('/') {
                return Err(ConfigError::InvalidName(feed.name.clone()));
            }
            if !seen_names.insert(feed.name.as_str()) {
                return Err(ConfigError::DuplicateName(feed.name.clone()));
            }
            if feed.urls.is_empty() {
                return Err(ConfigError::NoUrls(feed.name.clone()));
            }
            feeds.push(CompiledFeed::compile(feed)?);
        }

        Ok(Self { feeds })
    }

    pub fn get(&self, name: &str) -> Option<&CompiledFeed> {
        self.feeds.iter().find(|feed| feed.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &CompiledFeed> {
        self.feeds.iter()
    }

    pub fn len(&self) -> usize {
        self.feeds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.feeds.is_empty()
    }
}

pub fn parse_config(content: &str) -> Result<FeedRegistry, ConfigError> {
    let config: FeedsConfig = serde_yaml::from_str(content)?;
    FeedRegistry::from_config(&config)
}

pub fn load_config(path: impl AsRef<Path>) -> Result<FeedRegistry, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.display().to_string(),
        source,
    })?;
    let registry = parse_config(&content)?;
    tracing::info!(path = %path.display(), feeds = registry.len(), "loaded feed config");
    Ok(registry)
}

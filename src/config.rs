//! TOML configuration.
//!
//! ```toml
//! [db]
//! path = "./data/csync.sqlite"
//!
//! [catalog]
//! default_brand = "Generic"
//! placeholder_image = "/images/placeholder.png"
//!
//! [history]
//! retain = 5
//! snapshot_before_restore = false
//!
//! [feed.aliases]
//! model_ref = ["article", "code article"]
//!
//! [lease]
//! ttl_secs = 900
//! ```
//!
//! Only `[db]` is required; every other section falls back to defaults.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use catalog_sync_core::history::{HistoryLog, DEFAULT_RETAIN};
use catalog_sync_core::normalize::{AliasTable, Field, RowNormalizer};
use catalog_sync_core::pipeline::CatalogDefaults;
use catalog_sync_core::{Reconciler, RestoreEngine};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub catalog: CatalogConfig,
    #[serde(default)]
    pub history: HistoryConfig,
    #[serde(default)]
    pub feed: FeedConfig,
    #[serde(default)]
    pub lease: LeaseConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CatalogConfig {
    #[serde(default = "default_brand")]
    pub default_brand: String,
    #[serde(default = "default_placeholder_image")]
    pub placeholder_image: String,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            default_brand: default_brand(),
            placeholder_image: default_placeholder_image(),
        }
    }
}

fn default_brand() -> String {
    "Generic".to_string()
}
fn default_placeholder_image() -> String {
    "/images/placeholder.png".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct HistoryConfig {
    #[serde(default = "default_retain")]
    pub retain: usize,
    /// Record the catalog a restore overwrites as its own history entry.
    #[serde(default)]
    pub snapshot_before_restore: bool,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            retain: default_retain(),
            snapshot_before_restore: false,
        }
    }
}

fn default_retain() -> usize {
    DEFAULT_RETAIN
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct FeedConfig {
    /// Extra column names per logical field, tried after the built-in ones.
    #[serde(default)]
    pub aliases: BTreeMap<String, Vec<String>>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LeaseConfig {
    #[serde(default = "default_lease_ttl")]
    pub ttl_secs: u64,
}

impl Default for LeaseConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_lease_ttl(),
        }
    }
}

fn default_lease_ttl() -> u64 {
    900
}

impl Config {
    /// Built-in aliases extended with `[feed.aliases]`.
    pub fn alias_table(&self) -> Result<AliasTable> {
        let mut table = AliasTable::default();
        for (key, names) in &self.feed.aliases {
            let field = Field::from_key(key).with_context(|| {
                format!(
                    "Unknown field in [feed.aliases]: '{}'. Must be one of: {}",
                    key,
                    Field::ALL
                        .iter()
                        .map(|f| f.key())
                        .collect::<Vec<_>>()
                        .join(", ")
                )
            })?;
            table.extend(field, names);
        }
        Ok(table)
    }

    pub fn reconciler(&self) -> Result<Reconciler> {
        Ok(Reconciler::new(
            RowNormalizer::new(self.alias_table()?),
            CatalogDefaults {
                brand: self.catalog.default_brand.clone(),
                placeholder_image: self.catalog.placeholder_image.clone(),
            },
            HistoryLog::new(self.history.retain),
        ))
    }

    pub fn restore_engine(&self) -> RestoreEngine {
        RestoreEngine::new(
            HistoryLog::new(self.history.retain),
            self.history.snapshot_before_restore,
        )
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    if config.history.retain == 0 {
        anyhow::bail!("history.retain must be >= 1");
    }

    if config.lease.ttl_secs == 0 {
        anyhow::bail!("lease.ttl_secs must be > 0");
    }

    if config.catalog.default_brand.trim().is_empty() {
        anyhow::bail!("catalog.default_brand must not be empty");
    }

    // Surface alias typos at load time rather than on the first run.
    config.alias_table()?;

    Ok(config)
}

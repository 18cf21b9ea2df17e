use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use talmud_page_core::ceremony::ClosingCeremony;
use talmud_page_core::{SecondarySource, SourceSettings};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub precomputed: PrecomputedConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub bind: String,
    /// Maximum number of rendered pages kept in memory.
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: u64,
    /// Fetch the neighbouring pages in the background after serving a page.
    #[serde(default = "default_prefetch")]
    pub prefetch: bool,
}

fn default_cache_capacity() -> u64 {
    1000
}
fn default_prefetch() -> bool {
    true
}

#[derive(Debug, Deserialize, Clone)]
pub struct SourceConfig {
    #[serde(default = "default_talmud_base_url")]
    pub talmud_base_url: String,
    #[serde(default = "default_tanakh_base_url")]
    pub tanakh_base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_chapter_timeout_secs")]
    pub chapter_timeout_secs: u64,
    #[serde(default = "default_max_range_pages")]
    pub max_range_pages: usize,
    #[serde(default = "default_secondary")]
    pub secondary: Vec<SecondaryConfig>,
}

fn default_talmud_base_url() -> String {
    "https://www.sefaria.org/api/texts".to_string()
}
fn default_tanakh_base_url() -> String {
    "http://localhost:3000".to_string()
}
fn default_timeout_secs() -> u64 {
    20
}
fn default_chapter_timeout_secs() -> u64 {
    40
}
fn default_max_range_pages() -> usize {
    10
}
fn default_secondary() -> Vec<SecondaryConfig> {
    vec![
        SecondaryConfig {
            ref_prefix: "Rashi_on_".to_string(),
            kind: "Rashi".to_string(),
        },
        SecondaryConfig {
            ref_prefix: "Tosafot_on_".to_string(),
            kind: "Tosafot".to_string(),
        },
    ]
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            talmud_base_url: default_talmud_base_url(),
            tanakh_base_url: default_tanakh_base_url(),
            timeout_secs: default_timeout_secs(),
            chapter_timeout_secs: default_chapter_timeout_secs(),
            max_range_pages: default_max_range_pages(),
            secondary: default_secondary(),
        }
    }
}

impl SourceConfig {
    pub fn settings(&self) -> SourceSettings {
        SourceSettings {
            talmud_base_url: self.talmud_base_url.clone(),
            tanakh_base_url: self.tanakh_base_url.clone(),
            timeout: Duration::from_secs(self.timeout_secs),
            chapter_timeout: Duration::from_secs(self.chapter_timeout_secs),
            secondary: self
                .secondary
                .iter()
                .map(|s| SecondarySource::new(&s.ref_prefix, &s.kind))
                .collect(),
            max_range_pages: self.max_range_pages,
        }
    }
}

/// A commentary fetched next to every Talmud page; its fragments nest under
/// the top-level comments of `kind`.
#[derive(Debug, Deserialize, Clone)]
pub struct SecondaryConfig {
    pub ref_prefix: String,
    pub kind: String,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct PrecomputedConfig {
    /// Replaces the embedded closing-ceremony text.
    #[serde(default)]
    pub closing_ceremony: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_filter")]
    pub filter: String,
}

fn default_filter() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_filter(),
        }
    }
}

impl Config {
    /// Defaults for commands that can run without a config file.
    pub fn minimal() -> Self {
        Self {
            server: ServerConfig {
                bind: "127.0.0.1:5000".to_string(),
                cache_capacity: default_cache_capacity(),
                prefetch: default_prefetch(),
            },
            source: SourceConfig::default(),
            precomputed: PrecomputedConfig::default(),
            logging: LoggingConfig::default(),
        }
    }

    /// The configured closing-ceremony resource, or the embedded one.
    pub fn closing_ceremony(&self) -> Result<ClosingCeremony> {
        match &self.precomputed.closing_ceremony {
            Some(path) => {
                let content = std::fs::read_to_string(path).with_context(|| {
                    format!("Failed to read closing ceremony: {}", path.display())
                })?;
                ClosingCeremony::from_json(&content)
            }
            None => ClosingCeremony::builtin(),
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    if config.server.cache_capacity == 0 {
        anyhow::bail!("server.cache_capacity must be > 0");
    }

    // Validate source
    let source = &config.source;
    if source.timeout_secs == 0 || source.chapter_timeout_secs == 0 {
        anyhow::bail!("source.timeout_secs and source.chapter_timeout_secs must be > 0");
    }
    if source.max_range_pages < 1 {
        anyhow::bail!("source.max_range_pages must be >= 1");
    }
    if source.talmud_base_url.trim().is_empty() || source.tanakh_base_url.trim().is_empty() {
        anyhow::bail!("source base URLs must not be empty");
    }
    for secondary in &source.secondary {
        if secondary.kind.trim().is_empty() {
            anyhow::bail!(
                "source.secondary kind must not be empty (ref_prefix '{}')",
                secondary.ref_prefix
            );
        }
    }

    Ok(())
}

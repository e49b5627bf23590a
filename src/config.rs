/// Configuration module for forumqa.
///
/// Handles loading, validating, and providing default configuration values.
/// Every tunable constant of the pipeline (hash window and modulus,
/// similarity thresholds, alignment rule switches, tokenizer service) lives
/// here and is passed down explicitly.
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::align::karp_rabin::{DEFAULT_MODULUS, DEFAULT_WINDOW};
use crate::tokenizer::DEFAULT_SEPARATOR_TOKEN;

// ── Default value functions ──────────────────────────────────────────

fn default_window() -> usize {
    DEFAULT_WINDOW
}

fn default_modulus() -> u64 {
    DEFAULT_MODULUS
}

fn default_truncate_chars() -> usize {
    100
}

fn default_near_duplicate_distance() -> usize {
    5
}

fn default_informative_prefix_len() -> usize {
    10
}

fn default_true() -> bool {
    true
}

fn default_url() -> String {
    "http://localhost:9000".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_max_retries() -> u32 {
    3
}

fn default_backoff_ms() -> u64 {
    500
}

fn default_workers() -> usize {
    4
}

fn default_separator_token() -> String {
    DEFAULT_SEPARATOR_TOKEN.to_string()
}

// ── Config structs ───────────────────────────────────────────────────

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub matcher: MatcherConfig,

    #[serde(default)]
    pub similarity: SimilarityConfig,

    #[serde(default)]
    pub alignment: AlignmentConfig,

    #[serde(default)]
    pub tokenizer: TokenizerConfig,

    /// Threads processed concurrently.
    #[serde(default = "default_workers")]
    pub workers: usize,

    #[serde(default = "default_separator_token")]
    pub separator_token: String,
}

/// Karp-Rabin window matcher.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct MatcherConfig {
    #[serde(default = "default_window")]
    pub window: usize,

    #[serde(default = "default_modulus")]
    pub modulus: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SimilarityConfig {
    #[serde(default = "default_truncate_chars")]
    pub truncate_chars: usize,

    #[serde(default = "default_near_duplicate_distance")]
    pub near_duplicate_distance: usize,

    #[serde(default = "default_informative_prefix_len")]
    pub informative_prefix_len: usize,
}

/// Which alignment rules run, tried in field order.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct AlignmentConfig {
    #[serde(default = "default_true")]
    pub near_duplicate_rule: bool,

    #[serde(default = "default_true")]
    pub boilerplate_prefix_rule: bool,

    #[serde(default)]
    pub verbatim_window_rule: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum TokenizerBackend {
    #[default]
    Local,
    CoreNlp,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct TokenizerConfig {
    #[serde(default)]
    pub backend: TokenizerBackend,

    #[serde(default = "default_url")]
    pub url: String,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,
}

// ── Default impls ────────────────────────────────────────────────────

impl Default for Config {
    fn default() -> Self {
        Self {
            matcher: MatcherConfig::default(),
            similarity: SimilarityConfig::default(),
            alignment: AlignmentConfig::default(),
            tokenizer: TokenizerConfig::default(),
            workers: default_workers(),
            separator_token: default_separator_token(),
        }
    }
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            window: default_window(),
            modulus: default_modulus(),
        }
    }
}

impl Default for SimilarityConfig {
    fn default() -> Self {
        Self {
            truncate_chars: default_truncate_chars(),
            near_duplicate_distance: default_near_duplicate_distance(),
            informative_prefix_len: default_informative_prefix_len(),
        }
    }
}

impl Default for AlignmentConfig {
    fn default() -> Self {
        Self {
            near_duplicate_rule: default_true(),
            boilerplate_prefix_rule: default_true(),
            verbatim_window_rule: false,
        }
    }
}

impl Default for TokenizerConfig {
    fn default() -> Self {
        Self {
            backend: TokenizerBackend::default(),
            url: default_url(),
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
            backoff_ms: default_backoff_ms(),
        }
    }
}

// ── Config implementation ────────────────────────────────────────────

impl Config {
    /// Load configuration from a JSON file.
    ///
    /// If `config_path` is empty, defaults to `"forumqa.json"`.
    /// If the file does not exist, returns a default config and, for the
    /// default path only, writes a template file.
    pub fn load(config_path: &str) -> Result<Self> {
        let path = if config_path.is_empty() {
            "forumqa.json"
        } else {
            config_path
        };

        if !Path::new(path).exists() {
            info!("{path} not found, using defaults");
            let cfg = Self::default();

            if path == "forumqa.json" {
                match cfg.save(path) {
                    Ok(()) => info!("Generated config template: {path}"),
                    Err(e) => warn!("Failed to generate config template: {e}"),
                }
            }

            return Ok(cfg);
        }

        let data = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config: {path}"))?;

        let cfg: Config = match serde_json::from_str(&data) {
            Ok(c) => c,
            Err(e) => {
                warn!("Invalid JSON in {path}: {e}");
                warn!("Using default configuration");
                return Ok(Self::default());
            }
        };

        info!("Loaded configuration from {path}");
        Ok(cfg)
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &str) -> Result<()> {
        let data = serde_json::to_string_pretty(self).context("failed to marshal config")?;
        std::fs::write(path, data).with_context(|| format!("failed to write config: {path}"))?;
        Ok(())
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(self.matcher.window > 0, "matcher.window must be positive");
        anyhow::ensure!(self.matcher.modulus > 1, "matcher.modulus must exceed 1");
        anyhow::ensure!(
            self.similarity.truncate_chars > 0,
            "similarity.truncate_chars must be positive"
        );
        anyhow::ensure!(
            self.similarity.near_duplicate_distance > 0,
            "similarity.near_duplicate_distance must be positive"
        );
        anyhow::ensure!(self.workers > 0, "workers must be positive");
        anyhow::ensure!(
            !self.separator_token.trim().is_empty(),
            "separator_token must not be blank"
        );
        if self.tokenizer.backend == TokenizerBackend::CoreNlp {
            anyhow::ensure!(
                !self.tokenizer.url.is_empty(),
                "tokenizer.url is required for the corenlp backend"
            );
            anyhow::ensure!(
                self.tokenizer.timeout_secs > 0,
                "tokenizer.timeout_secs must be positive"
            );
        }
        Ok(())
    }
}

// ── Tests ────────────────────────────────────────────────────────────

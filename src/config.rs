//! Run configuration.
//!
//! Config is a small JSON document with a schema version; every field has a
//! default so an absent file and an empty object behave the same.
use crate::backend::RetryPolicy;
use crate::util::has_parent_components;
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Current schema version for `dforge.json`.
pub const CONFIG_SCHEMA_VERSION: u32 = 1;
/// Project-local config file name, looked up at the project root.
pub const PROJECT_CONFIG_FILE: &str = "dforge.json";
/// Environment override for the LM command.
pub const LM_COMMAND_ENV: &str = "DFORGE_LM_COMMAND";
/// Used when neither flag, config, nor environment name a command.
pub const DEFAULT_LM_COMMAND: &str = "claude -p --model haiku";

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    #[serde(default)]
    pub lm: LmConfig,
    #[serde(default)]
    pub resolver: ResolverConfig,
    #[serde(default)]
    pub discovery: DiscoveryConfig,
    #[serde(default)]
    pub context: ContextConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            schema_version: CONFIG_SCHEMA_VERSION,
            lm: LmConfig::default(),
            resolver: ResolverConfig::default(),
            discovery: DiscoveryConfig::default(),
            context: ContextConfig::default(),
            generation: GenerationConfig::default(),
        }
    }
}

fn default_schema_version() -> u32 {
    CONFIG_SCHEMA_VERSION
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LmConfig {
    /// Command line for generation calls (prompt on stdin, text on stdout).
    #[serde(default)]
    pub command: Option<String>,
    /// Command line for relevance scoring; defaults to `command`.
    #[serde(default)]
    pub scoring_command: Option<String>,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

impl Default for LmConfig {
    fn default() -> Self {
        Self {
            command: None,
            scoring_command: None,
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
        }
    }
}

fn default_max_retries() -> u32 {
    2
}
fn default_initial_backoff_ms() -> u64 {
    500
}
fn default_max_backoff_ms() -> u64 {
    8_000
}

impl LmConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            initial_backoff: Duration::from_millis(self.initial_backoff_ms),
            max_backoff: Duration::from_millis(self.max_backoff_ms),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ResolverConfig {
    #[serde(default)]
    pub exclude_globs: Vec<String>,
    #[serde(default = "default_true")]
    pub use_default_excludes: bool,
    #[serde(default)]
    pub follow_symlinks: bool,
    #[serde(default = "default_max_file_bytes")]
    pub max_file_bytes: u64,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            exclude_globs: Vec::new(),
            use_default_excludes: true,
            follow_symlinks: false,
            max_file_bytes: default_max_file_bytes(),
        }
    }
}

fn default_true() -> bool {
    true
}
fn default_max_file_bytes() -> u64 {
    512 * 1024
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DiscoveryConfig {
    /// Discover sources for sections that declare none.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Run stage 3 through the scoring backend.
    #[serde(default = "default_true")]
    pub llm_scoring: bool,
    #[serde(default = "default_stage1_max")]
    pub stage1_max: usize,
    #[serde(default = "default_stage2_top_k")]
    pub stage2_top_k: usize,
    #[serde(default = "default_stage3_max")]
    pub stage3_max: usize,
    /// Candidates must score strictly above this to be kept.
    #[serde(default = "default_score_threshold")]
    pub score_threshold: f32,
    #[serde(default = "default_max_sources")]
    pub max_sources: usize,
    #[serde(default = "default_excerpt_chars")]
    pub excerpt_chars: usize,
    #[serde(default = "default_topic_path_weight")]
    pub topic_path_weight: f64,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            llm_scoring: true,
            stage1_max: default_stage1_max(),
            stage2_top_k: default_stage2_top_k(),
            stage3_max: default_stage3_max(),
            score_threshold: default_score_threshold(),
            max_sources: default_max_sources(),
            excerpt_chars: default_excerpt_chars(),
            topic_path_weight: default_topic_path_weight(),
        }
    }
}

fn default_stage1_max() -> usize {
    400
}
fn default_stage2_top_k() -> usize {
    15
}
fn default_stage3_max() -> usize {
    10
}
fn default_score_threshold() -> f32 {
    5.0
}
fn default_max_sources() -> usize {
    5
}
fn default_excerpt_chars() -> usize {
    2_000
}
fn default_topic_path_weight() -> f64 {
    0.5
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ContextConfig {
    /// Key points kept per generated section.
    #[serde(default = "default_max_points")]
    pub max_points: usize,
    #[serde(default = "default_max_summary_chars")]
    pub max_summary_chars: usize,
    /// Total characters of accumulated context before the oldest entries drop.
    #[serde(default = "default_budget_chars")]
    pub budget_chars: usize,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            max_points: default_max_points(),
            max_summary_chars: default_max_summary_chars(),
            budget_chars: default_budget_chars(),
        }
    }
}

fn default_max_points() -> usize {
    3
}
fn default_max_summary_chars() -> usize {
    400
}
fn default_budget_chars() -> usize {
    4_000
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct GenerationConfig {
    /// Total source text sent with one section.
    #[serde(default = "default_max_source_chars")]
    pub max_source_chars: usize,
    /// Source text taken from any single file.
    #[serde(default = "default_max_file_chars")]
    pub max_file_chars: usize,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            max_source_chars: default_max_source_chars(),
            max_file_chars: default_max_file_chars(),
        }
    }
}

fn default_max_source_chars() -> usize {
    60_000
}
fn default_max_file_chars() -> usize {
    20_000
}

/// Load a config file and validate it.
pub fn load_config(path: &Path) -> Result<Config> {
    let bytes = fs::read(path).with_context(|| format!("read config {}", path.display()))?;
    let config: Config = serde_json::from_slice(&bytes)
        .with_context(|| format!("parse config JSON {}", path.display()))?;
    validate_config(&config).with_context(|| format!("validate config {}", path.display()))?;
    Ok(config)
}

/// Locate the config for a run: explicit path, project file, user file, defaults.
pub fn resolve_config(explicit: Option<&Path>, project_root: &Path) -> Result<(Config, Option<PathBuf>)> {
    if let Some(path) = explicit {
        return Ok((load_config(path)?, Some(path.to_path_buf())));
    }
    let project = project_root.join(PROJECT_CONFIG_FILE);
    if project.is_file() {
        return Ok((load_config(&project)?, Some(project)));
    }
    if let Some(user) = dirs::config_dir().map(|dir| dir.join("dforge").join("config.json")) {
        if user.is_file() {
            return Ok((load_config(&user)?, Some(user)));
        }
    }
    Ok((Config::default(), None))
}

/// Validate schema and the relationships between tunables.
pub fn validate_config(config: &Config) -> Result<()> {
    if config.schema_version != CONFIG_SCHEMA_VERSION {
        return Err(anyhow!(
            "unsupported config schema_version {}",
            config.schema_version
        ));
    }
    let discovery = &config.discovery;
    if discovery.stage1_max == 0 || discovery.stage2_top_k == 0 || discovery.max_sources == 0 {
        return Err(anyhow!(
            "discovery.stage1_max, stage2_top_k and max_sources must be > 0"
        ));
    }
    if discovery.stage2_top_k > discovery.stage1_max {
        return Err(anyhow!(
            "discovery.stage2_top_k ({}) must not exceed stage1_max ({})",
            discovery.stage2_top_k,
            discovery.stage1_max
        ));
    }
    if discovery.stage3_max > discovery.stage2_top_k {
        return Err(anyhow!(
            "discovery.stage3_max ({}) must not exceed stage2_top_k ({})",
            discovery.stage3_max,
            discovery.stage2_top_k
        ));
    }
    if !(0.0..=10.0).contains(&discovery.score_threshold) {
        return Err(anyhow!("discovery.score_threshold must be in [0, 10]"));
    }
    if discovery.excerpt_chars == 0 {
        return Err(anyhow!("discovery.excerpt_chars must be > 0"));
    }
    if discovery.topic_path_weight < 0.0 {
        return Err(anyhow!("discovery.topic_path_weight must be >= 0"));
    }
    let context = &config.context;
    if context.max_points == 0 || context.max_summary_chars == 0 {
        return Err(anyhow!("context.max_points and max_summary_chars must be > 0"));
    }
    if context.budget_chars < context.max_summary_chars {
        return Err(anyhow!(
            "context.budget_chars ({}) must hold at least one summary ({})",
            context.budget_chars,
            context.max_summary_chars
        ));
    }
    let generation = &config.generation;
    if generation.max_file_chars == 0 || generation.max_source_chars < generation.max_file_chars {
        return Err(anyhow!(
            "generation.max_source_chars must be >= max_file_chars > 0"
        ));
    }
    if config.lm.initial_backoff_ms > config.lm.max_backoff_ms {
        return Err(anyhow!("lm.initial_backoff_ms must not exceed lm.max_backoff_ms"));
    }
    for pattern in &config.resolver.exclude_globs {
        if has_parent_components(Path::new(pattern)) {
            return Err(anyhow!(
                "resolver.exclude_globs entries must not contain '..' (got {pattern:?})"
            ));
        }
        globset::Glob::new(pattern)
            .with_context(|| format!("resolver.exclude_globs entry {pattern:?}"))?;
    }
    Ok(())
}

/// Resolve the LM command: explicit flag > config > env var > default.
pub fn resolve_lm_command(explicit: Option<&str>, config: &LmConfig) -> String {
    explicit
        .map(str::to_string)
        .or_else(|| config.command.clone())
        .or_else(|| std::env::var(LM_COMMAND_ENV).ok())
        .filter(|command| !command.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_LM_COMMAND.to_string())
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;

//! Configuration for draftmill.
//!
//! Configuration sources (highest priority first):
//! 1. Environment variables (DRAFTMILL_HOME, DRAFTMILL_GENERATOR_URL,
//!    DRAFTMILL_GENERATOR_KEY, DRAFTMILL_SEARCH_URL)
//! 2. Config file (.draftmill/config.yaml)
//! 3. Defaults (~/.draftmill, public endpoints)
//!
//! Config file discovery:
//! - Searches current directory and parents for .draftmill/config.yaml
//! - Paths in the config file are relative to the config file's directory
//!
//! The generator API key is only ever read from the environment, never
//! from the config file.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::adapters::RetryPolicy;

/// Global cached configuration (stores Result to handle init errors)
static CONFIG: OnceLock<std::result::Result<ResolvedConfig, String>> = OnceLock::new();

/// Raw config file schema (matches the YAML structure)
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigFile {
    pub version: String,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub generator: Option<GeneratorConfig>,
    #[serde(default)]
    pub search: Option<SearchConfig>,
    #[serde(default)]
    pub limits: Option<LimitsConfig>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PathsConfig {
    /// State directory (relative to the config file)
    pub home: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeneratorConfig {
    pub endpoint: Option<String>,
    pub model: Option<String>,
    pub request_timeout_seconds: Option<u64>,
    pub retry: Option<RetryPolicy>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchConfig {
    pub endpoint: Option<String>,
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LimitsConfig {
    pub job_timeout_seconds: Option<u64>,
}

/// Resolved configuration with absolute paths and filled defaults
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// Absolute path to draftmill home (job state, record streams)
    pub home: PathBuf,
    /// Path to the config file (if found)
    pub config_file: Option<PathBuf>,
    pub generator: GeneratorSettings,
    pub search: SearchSettings,
    pub limits: LimitSettings,
}

#[derive(Debug, Clone)]
pub struct GeneratorSettings {
    pub endpoint: String,
    pub model: String,
    /// From DRAFTMILL_GENERATOR_KEY; requests go unauthenticated when unset
    pub api_key: Option<String>,
    pub request_timeout_seconds: u64,
    pub retry: RetryPolicy,
}

impl Default for GeneratorSettings {
    fn default() -> Self {
        Self {
            endpoint: "https://api.openai.com/v1/chat/completions".to_string(),
            model: "gpt-4o-mini".to_string(),
            api_key: None,
            request_timeout_seconds: 120,
            retry: RetryPolicy::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SearchSettings {
    pub endpoint: String,
    pub limit: usize,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:8888".to_string(),
            limit: 5,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LimitSettings {
    pub job_timeout_seconds: u64,
}

impl Default for LimitSettings {
    fn default() -> Self {
        Self {
            job_timeout_seconds: 600,
        }
    }
}

/// Find config file by searching current directory and parents
fn find_config_file() -> Option<PathBuf> {
    let mut current = std::env::current_dir().ok()?;

    loop {
        let config_path = current.join(".draftmill").join("config.yaml");
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            break;
        }
    }

    None
}

/// Load and parse a config file
fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Resolve a path that may be relative to the config file's directory
fn resolve_path(base: &Path, path_str: &str) -> PathBuf {
    let path = PathBuf::from(path_str);
    if path.is_absolute() {
        path
    } else {
        base.join(path)
            .canonicalize()
            .unwrap_or_else(|_| base.join(path_str))
    }
}

/// Load configuration from all sources
fn load_config() -> Result<ResolvedConfig> {
    let default_home = dirs::home_dir()
        .context("Failed to determine home directory")?
        .join(".draftmill");

    let config_file = find_config_file();
    let parsed = match config_file {
        Some(ref path) => Some((load_config_file(path)?, path.clone())),
        None => None,
    };

    // Home: env var beats the config file beats ~/.draftmill
    let home = if let Ok(env_home) = std::env::var("DRAFTMILL_HOME") {
        PathBuf::from(env_home)
    } else if let Some((ref config, ref path)) = parsed {
        let config_dir = path.parent().unwrap_or(Path::new("."));
        config
            .paths
            .home
            .as_ref()
            .map(|h| resolve_path(config_dir, h))
            .unwrap_or(default_home)
    } else {
        default_home
    };

    let file_generator = parsed.as_ref().and_then(|(c, _)| c.generator.clone());
    let file_search = parsed.as_ref().and_then(|(c, _)| c.search.clone());
    let file_limits = parsed.as_ref().and_then(|(c, _)| c.limits.clone());

    let defaults = GeneratorSettings::default();
    let generator = GeneratorSettings {
        endpoint: std::env::var("DRAFTMILL_GENERATOR_URL")
            .ok()
            .or_else(|| file_generator.as_ref().and_then(|g| g.endpoint.clone()))
            .unwrap_or(defaults.endpoint),
        model: file_generator
            .as_ref()
            .and_then(|g| g.model.clone())
            .unwrap_or(defaults.model),
        api_key: std::env::var("DRAFTMILL_GENERATOR_KEY").ok(),
        request_timeout_seconds: file_generator
            .as_ref()
            .and_then(|g| g.request_timeout_seconds)
            .unwrap_or(defaults.request_timeout_seconds),
        retry: file_generator
            .and_then(|g| g.retry)
            .unwrap_or(defaults.retry),
    };

    let search_defaults = SearchSettings::default();
    let search = SearchSettings {
        endpoint: std::env::var("DRAFTMILL_SEARCH_URL")
            .ok()
            .or_else(|| file_search.as_ref().and_then(|s| s.endpoint.clone()))
            .unwrap_or(search_defaults.endpoint),
        limit: file_search
            .and_then(|s| s.limit)
            .unwrap_or(search_defaults.limit),
    };

    let limits = LimitSettings {
        job_timeout_seconds: file_limits
            .and_then(|l| l.job_timeout_seconds)
            .unwrap_or_else(|| LimitSettings::default().job_timeout_seconds),
    };

    Ok(ResolvedConfig {
        home,
        config_file: config_file.clone(),
        generator,
        search,
        limits,
    })
}

/// Get the global configuration (loads once, then cached)
pub fn config() -> Result<&'static ResolvedConfig> {
    let result = CONFIG.get_or_init(|| load_config().map_err(|e| e.to_string()));

    match result {
        Ok(config) => Ok(config),
        Err(e) => anyhow::bail!("{}", e),
    }
}

/// Force reload configuration (useful for testing)
pub fn reload_config() -> Result<ResolvedConfig> {
    load_config()
}

/// Get the draftmill home directory.
pub fn draftmill_home() -> Result<PathBuf> {
    Ok(config()?.home.clone())
}

/// Get the jobs directory ($DRAFTMILL_HOME/jobs); job reports and stage
/// record streams both live here, one subdirectory per job.
pub fn jobs_dir() -> Result<PathBuf> {
    Ok(config()?.home.join("jobs"))
}

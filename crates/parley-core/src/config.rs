// Configuration loading and parsing (parley.toml, credentials.toml).

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("validation error for field `{field}`: {message}")]
    ValidationError { field: String, message: String },

    #[error("failed to initialize config from defaults: {message}")]
    DefaultsCopyError { message: String },
}

// ---------------------------------------------------------------------------
// Top-level assembled Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Config {
    pub engine: EngineSettings,
    pub llm: LlmSettings,
    pub credentials: CredentialsConfig,
    pub db_path: PathBuf,
}

// ---------------------------------------------------------------------------
// parley.toml structs
// ---------------------------------------------------------------------------

/// Raw deserialization target for the entire parley.toml file.
#[derive(Debug, Clone, Deserialize)]
struct ParleyFile {
    #[serde(default)]
    engine: EngineSettings,
    llm: LlmSettings,
    #[serde(default)]
    database: DatabaseSection,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct DatabaseSection {
    path: Option<String>,
}

/// Tunables of the suggestion pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    /// Maximum number of case examples handed to the prompt.
    pub case_limit: usize,
    /// Historical conversations scanned per analysis, not counting the one
    /// being analyzed.
    pub candidate_scan_limit: usize,
    /// A historical provider reply must be longer than this (in characters)
    /// to be preferred as the effective reply.
    pub substantive_reply_chars: usize,
    /// Lowest confidence the presenting surface displays.
    pub display_min_confidence: u8,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            case_limit: 3,
            candidate_scan_limit: 10,
            substantive_reply_chars: 20,
            display_min_confidence: 40,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LlmSettings {
    pub model: String,
    pub max_tokens: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Override for the Messages API endpoint (proxies, tests).
    #[serde(default)]
    pub api_url: Option<String>,
}

fn default_timeout_secs() -> u64 {
    30
}

impl LlmSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

// ---------------------------------------------------------------------------
// credentials.toml structs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize, Default)]
pub struct CredentialsConfig {
    pub anthropic_api_key: Option<String>,
}

// ---------------------------------------------------------------------------
// Loading logic
// ---------------------------------------------------------------------------

/// Load and validate configuration from `config/parley.toml` and
/// (optionally) `config/credentials.toml`, relative to `base_dir`.
///
/// Does not seed defaults; see `seed_engine_config`.
pub fn load_config_from(base_dir: &Path) -> Result<Config, ConfigError> {
    let config_dir = base_dir.join("config");

    // --- parley.toml (required) ---
    let parley_path = config_dir.join("parley.toml");
    let parley_text = read_file(&parley_path)?;
    let parley_file: ParleyFile =
        toml::from_str(&parley_text).map_err(|e| ConfigError::ParseError {
            path: parley_path.clone(),
            source: e,
        })?;

    // --- credentials.toml (optional) ---
    let credentials_path = config_dir.join("credentials.toml");
    let credentials = if credentials_path.exists() {
        let cred_text = read_file(&credentials_path)?;
        toml::from_str(&cred_text).map_err(|e| ConfigError::ParseError {
            path: credentials_path.clone(),
            source: e,
        })?
    } else {
        CredentialsConfig::default()
    };

    let db_path = match parley_file.database.path {
        Some(path) => PathBuf::from(path),
        None => default_db_path()?,
    };

    let config = Config {
        engine: parley_file.engine,
        llm: parley_file.llm,
        credentials,
        db_path,
    };

    validate(&config)?;

    Ok(config)
}

/// SQLite file inside the platform data directory.
pub fn default_db_path() -> Result<PathBuf, ConfigError> {
    directories::ProjectDirs::from("", "", "parley")
        .map(|dirs| dirs.data_dir().join("parley.db"))
        .ok_or_else(|| ConfigError::ValidationError {
            field: "database.path".into(),
            message: "no platform data directory available; set it explicitly".into(),
        })
}

/// Seed `config/parley.toml` from `defaults/parley.toml` when it is absent.
///
/// Returns the path written, or `None` when the engine config already
/// exists. Credentials are never seeded; `defaults/credentials.toml.example`
/// is a template for the operator to copy by hand.
pub fn seed_engine_config(base_dir: &Path) -> Result<Option<PathBuf>, ConfigError> {
    let target = base_dir.join("config").join("parley.toml");
    if target.exists() {
        return Ok(None);
    }

    let source = base_dir.join("defaults").join("parley.toml");
    if !source.is_file() {
        return Err(ConfigError::DefaultsCopyError {
            message: format!(
                "{} is missing and no {} to seed it from",
                target.display(),
                source.display()
            ),
        });
    }

    if let Some(dir) = target.parent() {
        std::fs::create_dir_all(dir).map_err(|e| ConfigError::DefaultsCopyError {
            message: format!("failed to create {}: {e}", dir.display()),
        })?;
    }
    std::fs::copy(&source, &target).map_err(|e| ConfigError::DefaultsCopyError {
        message: format!("failed to copy {} to {}: {e}", source.display(), target.display()),
    })?;

    Ok(Some(target))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn read_file(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
        path: path.to_path_buf(),
    })
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn invalid(field: &str, message: impl Into<String>) -> ConfigError {
    ConfigError::ValidationError {
        field: field.into(),
        message: message.into(),
    }
}

fn validate(config: &Config) -> Result<(), ConfigError> {
    let engine = &config.engine;
    if engine.case_limit == 0 {
        return Err(invalid("engine.case_limit", "must be greater than 0"));
    }
    if engine.candidate_scan_limit < engine.case_limit {
        return Err(invalid(
            "engine.candidate_scan_limit",
            format!(
                "must be at least engine.case_limit ({}), got {}",
                engine.case_limit, engine.candidate_scan_limit
            ),
        ));
    }
    if engine.display_min_confidence > 100 {
        return Err(invalid(
            "engine.display_min_confidence",
            format!("must be between 0 and 100, got {}", engine.display_min_confidence),
        ));
    }

    let llm = &config.llm;
    if llm.model.trim().is_empty() {
        return Err(invalid("llm.model", "must not be empty"));
    }
    if llm.max_tokens == 0 {
        return Err(invalid("llm.max_tokens", "must be greater than 0"));
    }
    if llm.timeout_secs == 0 {
        return Err(invalid("llm.timeout_secs", "must be greater than 0"));
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

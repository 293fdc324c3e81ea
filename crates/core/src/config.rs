use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::metrics::DEFAULT_AT_RISK_TOP_N;
use crate::quality::DEFAULT_MISSING_DATA_THRESHOLD;

pub const ENV_PREFIX: &str = "BOARDSIGHT_";
pub const DEFAULT_API_URL: &str = "https://api.monday.com/v2";

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub source: SourceConfig,
    pub llm: LlmConfig,
    pub analysis: AnalysisConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct SourceConfig {
    pub mode: SourceMode,
    pub api_url: String,
    pub api_token: Option<SecretString>,
    pub deals_board_id: Option<String>,
    pub work_orders_board_id: Option<String>,
    pub page_size: u32,
    pub timeout_secs: u64,
    pub max_retries: u32,
    /// Upper bound on one board fetch, across every page and retry.
    pub fetch_budget_secs: u64,
    pub cache_path: Option<PathBuf>,
}

#[derive(Clone, Debug)]
pub struct LlmConfig {
    pub enabled: bool,
    pub provider: LlmProvider,
    pub api_key: Option<SecretString>,
    pub base_url: Option<String>,
    pub model: String,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct AnalysisConfig {
    pub missing_data_threshold: f64,
    pub at_risk_top_n: usize,
    pub details_limit: usize,
    pub rules_path: Option<PathBuf>,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceMode {
    /// Fetch from the tracker API, falling back to the raw cache.
    Live,
    /// Serve the on-disk raw cache only.
    Cache,
    /// Serve the built-in fixture boards.
    Demo,
}

impl SourceMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Live => "live",
            Self::Cache => "cache",
            Self::Demo => "demo",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LlmProvider {
    #[serde(rename = "openai")]
    OpenAi,
    Anthropic,
    Ollama,
}

impl LlmProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Anthropic => "anthropic",
            Self::Ollama => "ollama",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub source_mode: Option<SourceMode>,
    pub cache_path: Option<PathBuf>,
    pub rules_path: Option<PathBuf>,
    pub llm_enabled: Option<bool>,
    pub log_level: Option<String>,
    pub log_format: Option<LogFormat>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            source: SourceConfig {
                mode: SourceMode::Live,
                api_url: DEFAULT_API_URL.to_string(),
                api_token: None,
                deals_board_id: None,
                work_orders_board_id: None,
                page_size: 100,
                timeout_secs: 30,
                max_retries: 3,
                fetch_budget_secs: 300,
                cache_path: None,
            },
            llm: LlmConfig {
                enabled: false,
                provider: LlmProvider::Ollama,
                api_key: None,
                base_url: Some("http://localhost:11434".to_string()),
                model: "llama3.1".to_string(),
                timeout_secs: 20,
            },
            analysis: AnalysisConfig {
                missing_data_threshold: DEFAULT_MISSING_DATA_THRESHOLD,
                at_risk_top_n: DEFAULT_AT_RISK_TOP_N,
                details_limit: 20,
                rules_path: None,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for SourceMode {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "live" => Ok(Self::Live),
            "cache" => Ok(Self::Cache),
            "demo" => Ok(Self::Demo),
            other => Err(ConfigError::Validation(format!(
                "unsupported source mode `{other}` (expected live|cache|demo)"
            ))),
        }
    }
}

impl std::str::FromStr for LlmProvider {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "openai" | "open_ai" => Ok(Self::OpenAi),
            "anthropic" => Ok(Self::Anthropic),
            "ollama" => Ok(Self::Ollama),
            other => Err(ConfigError::Validation(format!(
                "unsupported llm provider `{other}` (expected openai|anthropic|ollama)"
            ))),
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected =
                options.config_path.unwrap_or_else(|| PathBuf::from("boardsight.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(source) = patch.source {
            if let Some(mode) = source.mode {
                self.source.mode = mode;
            }
            if let Some(api_url) = source.api_url {
                self.source.api_url = api_url;
            }
            if let Some(api_token) = source.api_token {
                self.source.api_token = Some(secret_value(api_token));
            }
            if let Some(board_id) = source.deals_board_id {
                self.source.deals_board_id = Some(board_id);
            }
            if let Some(board_id) = source.work_orders_board_id {
                self.source.work_orders_board_id = Some(board_id);
            }
            if let Some(page_size) = source.page_size {
                self.source.page_size = page_size;
            }
            if let Some(timeout_secs) = source.timeout_secs {
                self.source.timeout_secs = timeout_secs;
            }
            if let Some(max_retries) = source.max_retries {
                self.source.max_retries = max_retries;
            }
            if let Some(fetch_budget_secs) = source.fetch_budget_secs {
                self.source.fetch_budget_secs = fetch_budget_secs;
            }
            if let Some(cache_path) = source.cache_path {
                self.source.cache_path = Some(cache_path);
            }
        }

        if let Some(llm) = patch.llm {
            if let Some(enabled) = llm.enabled {
                self.llm.enabled = enabled;
            }
            if let Some(provider) = llm.provider {
                self.llm.provider = provider;
            }
            if let Some(api_key) = llm.api_key {
                self.llm.api_key = Some(secret_value(api_key));
            }
            if let Some(base_url) = llm.base_url {
                self.llm.base_url = Some(base_url);
            }
            if let Some(model) = llm.model {
                self.llm.model = model;
            }
            if let Some(timeout_secs) = llm.timeout_secs {
                self.llm.timeout_secs = timeout_secs;
            }
        }

        if let Some(analysis) = patch.analysis {
            if let Some(threshold) = analysis.missing_data_threshold {
                self.analysis.missing_data_threshold = threshold;
            }
            if let Some(top_n) = analysis.at_risk_top_n {
                self.analysis.at_risk_top_n = top_n;
            }
            if let Some(details_limit) = analysis.details_limit {
                self.analysis.details_limit = details_limit;
            }
            if let Some(rules_path) = analysis.rules_path {
                self.analysis.rules_path = Some(rules_path);
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("BOARDSIGHT_SOURCE_MODE") {
            self.source.mode = value.parse()?;
        }
        if let Some(value) = read_env("BOARDSIGHT_SOURCE_API_URL") {
            self.source.api_url = value;
        }
        // MONDAY_API_TOKEN is what most monday.com tooling already exports.
        let token = read_env("BOARDSIGHT_SOURCE_API_TOKEN").or_else(|| read_env("MONDAY_API_TOKEN"));
        if let Some(value) = token {
            self.source.api_token = Some(secret_value(value));
        }
        if let Some(value) = read_env("BOARDSIGHT_SOURCE_DEALS_BOARD_ID") {
            self.source.deals_board_id = Some(value);
        }
        if let Some(value) = read_env("BOARDSIGHT_SOURCE_WORK_ORDERS_BOARD_ID") {
            self.source.work_orders_board_id = Some(value);
        }
        if let Some(value) = read_env("BOARDSIGHT_SOURCE_PAGE_SIZE") {
            self.source.page_size = parse_u32("BOARDSIGHT_SOURCE_PAGE_SIZE", &value)?;
        }
        if let Some(value) = read_env("BOARDSIGHT_SOURCE_TIMEOUT_SECS") {
            self.source.timeout_secs = parse_u64("BOARDSIGHT_SOURCE_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("BOARDSIGHT_SOURCE_MAX_RETRIES") {
            self.source.max_retries = parse_u32("BOARDSIGHT_SOURCE_MAX_RETRIES", &value)?;
        }
        if let Some(value) = read_env("BOARDSIGHT_SOURCE_FETCH_BUDGET_SECS") {
            self.source.fetch_budget_secs =
                parse_u64("BOARDSIGHT_SOURCE_FETCH_BUDGET_SECS", &value)?;
        }
        if let Some(value) = read_env("BOARDSIGHT_SOURCE_CACHE_PATH") {
            self.source.cache_path = Some(PathBuf::from(value));
        }

        if let Some(value) = read_env("BOARDSIGHT_LLM_ENABLED") {
            self.llm.enabled = parse_bool("BOARDSIGHT_LLM_ENABLED", &value)?;
        }
        if let Some(value) = read_env("BOARDSIGHT_LLM_PROVIDER") {
            self.llm.provider = value.parse()?;
        }
        if let Some(value) = read_env("BOARDSIGHT_LLM_API_KEY") {
            self.llm.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("BOARDSIGHT_LLM_BASE_URL") {
            self.llm.base_url = Some(value);
        }
        if let Some(value) = read_env("BOARDSIGHT_LLM_MODEL") {
            self.llm.model = value;
        }
        if let Some(value) = read_env("BOARDSIGHT_LLM_TIMEOUT_SECS") {
            self.llm.timeout_secs = parse_u64("BOARDSIGHT_LLM_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("BOARDSIGHT_ANALYSIS_MISSING_DATA_THRESHOLD") {
            self.analysis.missing_data_threshold =
                parse_f64("BOARDSIGHT_ANALYSIS_MISSING_DATA_THRESHOLD", &value)?;
        }
        if let Some(value) = read_env("BOARDSIGHT_ANALYSIS_AT_RISK_TOP_N") {
            self.analysis.at_risk_top_n = parse_usize("BOARDSIGHT_ANALYSIS_AT_RISK_TOP_N", &value)?;
        }
        if let Some(value) = read_env("BOARDSIGHT_ANALYSIS_DETAILS_LIMIT") {
            self.analysis.details_limit =
                parse_usize("BOARDSIGHT_ANALYSIS_DETAILS_LIMIT", &value)?;
        }
        if let Some(value) = read_env("BOARDSIGHT_ANALYSIS_RULES_PATH") {
            self.analysis.rules_path = Some(PathBuf::from(value));
        }

        let log_level =
            read_env("BOARDSIGHT_LOGGING_LEVEL").or_else(|| read_env("BOARDSIGHT_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("BOARDSIGHT_LOGGING_FORMAT").or_else(|| read_env("BOARDSIGHT_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(mode) = overrides.source_mode {
            self.source.mode = mode;
        }
        if let Some(cache_path) = overrides.cache_path {
            self.source.cache_path = Some(cache_path);
        }
        if let Some(rules_path) = overrides.rules_path {
            self.analysis.rules_path = Some(rules_path);
        }
        if let Some(enabled) = overrides.llm_enabled {
            self.llm.enabled = enabled;
        }
        if let Some(level) = overrides.log_level {
            self.logging.level = level;
        }
        if let Some(format) = overrides.log_format {
            self.logging.format = format;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_source(&self.source)?;
        validate_llm(&self.llm)?;
        validate_analysis(&self.analysis)?;
        validate_logging(&self.logging)?;
        Ok(())
    }

    /// Effective configuration as TOML-shaped JSON with secrets redacted.
    pub fn redacted(&self) -> serde_json::Value {
        let redact = |secret: &Option<SecretString>| match secret {
            Some(value) if !value.expose_secret().is_empty() => "<redacted>",
            _ => "<unset>",
        };
        serde_json::json!({
            "source": {
                "mode": self.source.mode.as_str(),
                "api_url": self.source.api_url,
                "api_token": redact(&self.source.api_token),
                "deals_board_id": self.source.deals_board_id,
                "work_orders_board_id": self.source.work_orders_board_id,
                "page_size": self.source.page_size,
                "timeout_secs": self.source.timeout_secs,
                "max_retries": self.source.max_retries,
                "fetch_budget_secs": self.source.fetch_budget_secs,
                "cache_path": self.source.cache_path,
            },
            "llm": {
                "enabled": self.llm.enabled,
                "provider": self.llm.provider,
                "api_key": redact(&self.llm.api_key),
                "base_url": self.llm.base_url,
                "model": self.llm.model,
                "timeout_secs": self.llm.timeout_secs,
            },
            "analysis": {
                "missing_data_threshold": self.analysis.missing_data_threshold,
                "at_risk_top_n": self.analysis.at_risk_top_n,
                "details_limit": self.analysis.details_limit,
                "rules_path": self.analysis.rules_path,
            },
            "logging": {
                "level": self.logging.level,
                "format": self.logging.format,
            },
        })
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("boardsight.toml"), PathBuf::from("config/boardsight.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn is_blank(value: Option<&str>) -> bool {
    value.map(|value| value.trim().is_empty()).unwrap_or(true)
}

fn validate_source(source: &SourceConfig) -> Result<(), ConfigError> {
    if source.page_size == 0 || source.page_size > 500 {
        return Err(ConfigError::Validation(
            "source.page_size must be in range 1..=500".to_string(),
        ));
    }
    if source.timeout_secs == 0 || source.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "source.timeout_secs must be in range 1..=300".to_string(),
        ));
    }
    if source.max_retries > 10 {
        return Err(ConfigError::Validation(
            "source.max_retries must be in range 0..=10".to_string(),
        ));
    }
    if source.fetch_budget_secs == 0 || source.fetch_budget_secs > 3_600 {
        return Err(ConfigError::Validation(
            "source.fetch_budget_secs must be in range 1..=3600".to_string(),
        ));
    }

    match source.mode {
        SourceMode::Live => {
            if !source.api_url.starts_with("http://") && !source.api_url.starts_with("https://") {
                return Err(ConfigError::Validation(
                    "source.api_url must start with http:// or https://".to_string(),
                ));
            }
            if is_blank(source.api_token.as_ref().map(|token| token.expose_secret())) {
                return Err(ConfigError::Validation(
                    "source.api_token is required in live mode. Generate one under monday.com > Avatar > Developers > My Access Tokens".to_string(),
                ));
            }
            if is_blank(source.deals_board_id.as_deref()) {
                return Err(ConfigError::Validation(
                    "source.deals_board_id is required in live mode (the number in the board URL)"
                        .to_string(),
                ));
            }
            if is_blank(source.work_orders_board_id.as_deref()) {
                return Err(ConfigError::Validation(
                    "source.work_orders_board_id is required in live mode (the number in the board URL)"
                        .to_string(),
                ));
            }
        }
        SourceMode::Cache => {
            if source.cache_path.is_none() {
                return Err(ConfigError::Validation(
                    "source.cache_path is required in cache mode".to_string(),
                ));
            }
        }
        SourceMode::Demo => {}
    }

    Ok(())
}

fn validate_llm(llm: &LlmConfig) -> Result<(), ConfigError> {
    if !llm.enabled {
        return Ok(());
    }

    if llm.timeout_secs == 0 || llm.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "llm.timeout_secs must be in range 1..=300".to_string(),
        ));
    }
    if llm.model.trim().is_empty() {
        return Err(ConfigError::Validation("llm.model must not be empty".to_string()));
    }

    match llm.provider {
        LlmProvider::OpenAi | LlmProvider::Anthropic => {
            if is_blank(llm.api_key.as_ref().map(|value| value.expose_secret())) {
                return Err(ConfigError::Validation(
                    "llm.api_key is required for openai/anthropic providers".to_string(),
                ));
            }
        }
        LlmProvider::Ollama => {
            if is_blank(llm.base_url.as_deref()) {
                return Err(ConfigError::Validation(
                    "llm.base_url is required for ollama provider".to_string(),
                ));
            }
        }
    }

    Ok(())
}

fn validate_analysis(analysis: &AnalysisConfig) -> Result<(), ConfigError> {
    if !(0.0..=1.0).contains(&analysis.missing_data_threshold) {
        return Err(ConfigError::Validation(
            "analysis.missing_data_threshold must be in range 0..=1".to_string(),
        ));
    }
    if analysis.at_risk_top_n == 0 {
        return Err(ConfigError::Validation(
            "analysis.at_risk_top_n must be greater than zero".to_string(),
        ));
    }
    if analysis.details_limit == 0 {
        return Err(ConfigError::Validation(
            "analysis.details_limit must be greater than zero".to_string(),
        ));
    }
    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn invalid_override(key: &str, value: &str) -> ConfigError {
    ConfigError::InvalidEnvOverride { key: key.to_string(), value: value.to_string() }
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| invalid_override(key, value))
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| invalid_override(key, value))
}

fn parse_usize(key: &str, value: &str) -> Result<usize, ConfigError> {
    value.parse::<usize>().map_err(|_| invalid_override(key, value))
}

fn parse_f64(key: &str, value: &str) -> Result<f64, ConfigError> {
    value.parse::<f64>().map_err(|_| invalid_override(key, value))
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    value.parse::<bool>().map_err(|_| invalid_override(key, value))
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    source: Option<SourcePatch>,
    llm: Option<LlmPatch>,
    analysis: Option<AnalysisPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct SourcePatch {
    mode: Option<SourceMode>,
    api_url: Option<String>,
    api_token: Option<String>,
    deals_board_id: Option<String>,
    work_orders_board_id: Option<String>,
    page_size: Option<u32>,
    timeout_secs: Option<u64>,
    max_retries: Option<u32>,
    fetch_budget_secs: Option<u64>,
    cache_path: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
struct LlmPatch {
    enabled: Option<bool>,
    provider: Option<LlmProvider>,
    api_key: Option<String>,
    base_url: Option<String>,
    model: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct AnalysisPatch {
    missing_data_threshold: Option<f64>,
    at_risk_top_n: Option<usize>,
    details_limit: Option<usize>,
    rules_path: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

#[cfg(test)]
mod tests {
    use std::env;
    use std::fs;
    use std::io;
    use std::path::PathBuf;
    use std::sync::{Mutex, OnceLock};

    use secrecy::ExposeSecret;
    use tempfile::TempDir;

    use super::{AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat, SourceMode};

    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

    const LIVE_VARS: &[&str] = &[
        "BOARDSIGHT_SOURCE_API_TOKEN",
        "BOARDSIGHT_SOURCE_DEALS_BOARD_ID",
        "BOARDSIGHT_SOURCE_WORK_ORDERS_BOARD_ID",
    ];

    fn env_lock() -> &'static Mutex<()> {
        ENV_LOCK.get_or_init(|| Mutex::new(()))
    }

    fn clear_vars(vars: &[&str]) {
        for var in vars {
            env::remove_var(var);
        }
    }

    fn set_live_vars(token: &str) {
        env::set_var("BOARDSIGHT_SOURCE_API_TOKEN", token);
        env::set_var("BOARDSIGHT_SOURCE_DEALS_BOARD_ID", "1111");
        env::set_var("BOARDSIGHT_SOURCE_WORK_ORDERS_BOARD_ID", "2222");
    }

    fn ensure(condition: bool, message: &'static str) -> Result<(), String> {
        if condition {
            Ok(())
        } else {
            Err(message.to_string())
        }
    }

    fn isolated_options(dir: &TempDir) -> LoadOptions {
        // Point at a path that does not exist so a developer's boardsight.toml is ignored.
        LoadOptions {
            config_path: Some(dir.path().join("absent.toml")),
            ..LoadOptions::default()
        }
    }

    #[test]
    fn file_load_supports_env_interpolation() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("TEST_MONDAY_TOKEN", "token-from-env");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("boardsight.toml");
            fs::write(
                &path,
                r#"
[source]
api_token = "${TEST_MONDAY_TOKEN}"
deals_board_id = "1234"
work_orders_board_id = "5678"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config =
                AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() })
                    .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.source.api_token.as_ref().map(|token| token.expose_secret())
                    == Some("token-from-env"),
                "api token should be loaded from environment",
            )?;
            ensure(
                config.source.deals_board_id.as_deref() == Some("1234"),
                "deals board id should come from the file",
            )?;
            Ok(())
        })();

        clear_vars(&["TEST_MONDAY_TOKEN"]);
        result
    }

    #[test]
    fn live_mode_requires_board_ids() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("BOARDSIGHT_SOURCE_API_TOKEN", "token");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let error = match AppConfig::load(isolated_options(&dir)) {
                Ok(_) => {
                    return Err("expected validation failure but config load succeeded".to_string())
                }
                Err(error) => error,
            };
            let has_message = matches!(
                error,
                ConfigError::Validation(ref message) if message.contains("source.deals_board_id")
            );
            ensure(has_message, "validation failure should mention source.deals_board_id")
        })();

        clear_vars(LIVE_VARS);
        result
    }

    #[test]
    fn demo_mode_needs_no_credentials() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars(LIVE_VARS);

        let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
        let config = AppConfig::load(LoadOptions {
            overrides: ConfigOverrides {
                source_mode: Some(SourceMode::Demo),
                ..ConfigOverrides::default()
            },
            ..isolated_options(&dir)
        })
        .map_err(|err| format!("config load failed: {err}"))?;

        ensure(config.source.mode == SourceMode::Demo, "override should select demo mode")
    }

    #[test]
    fn fetch_budget_comes_from_env_and_is_range_checked() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars(LIVE_VARS);

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let demo = || LoadOptions {
                overrides: ConfigOverrides {
                    source_mode: Some(SourceMode::Demo),
                    ..ConfigOverrides::default()
                },
                ..isolated_options(&dir)
            };

            let defaults = AppConfig::load(demo()).map_err(|err| format!("config load failed: {err}"))?;
            ensure(defaults.source.fetch_budget_secs == 300, "default fetch budget is 300s")?;

            env::set_var("BOARDSIGHT_SOURCE_FETCH_BUDGET_SECS", "45");
            let config = AppConfig::load(demo()).map_err(|err| format!("config load failed: {err}"))?;
            ensure(config.source.fetch_budget_secs == 45, "env should set the fetch budget")?;

            env::set_var("BOARDSIGHT_SOURCE_FETCH_BUDGET_SECS", "0");
            ensure(
                matches!(
                    AppConfig::load(demo()),
                    Err(ConfigError::Validation(ref message)) if message.contains("fetch_budget_secs")
                ),
                "a zero fetch budget should fail validation",
            )
        })();

        clear_vars(&["BOARDSIGHT_SOURCE_FETCH_BUDGET_SECS"]);
        result
    }

    #[test]
    fn cache_mode_requires_cache_path() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("BOARDSIGHT_SOURCE_MODE", "cache");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let missing = AppConfig::load(isolated_options(&dir));
            ensure(
                matches!(missing, Err(ConfigError::Validation(ref message)) if message.contains("cache_path")),
                "cache mode without a path should fail validation",
            )?;

            let config = AppConfig::load(LoadOptions {
                overrides: ConfigOverrides {
                    cache_path: Some(PathBuf::from("boards.json")),
                    ..ConfigOverrides::default()
                },
                ..isolated_options(&dir)
            })
            .map_err(|err| format!("config load failed: {err}"))?;
            ensure(config.source.mode == SourceMode::Cache, "env should select cache mode")
        })();

        clear_vars(&["BOARDSIGHT_SOURCE_MODE"]);
        result
    }

    #[test]
    fn precedence_defaults_file_env_overrides() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        set_live_vars("token-from-env");
        env::set_var("BOARDSIGHT_LOG_FORMAT", "json");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("boardsight.toml");
            fs::write(
                &path,
                r#"
[source]
api_token = "token-from-file"
page_size = 50

[analysis]
missing_data_threshold = 0.2

[logging]
level = "warn"
format = "pretty"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config = AppConfig::load(LoadOptions {
                config_path: Some(path),
                overrides: ConfigOverrides {
                    log_level: Some("debug".to_string()),
                    ..ConfigOverrides::default()
                },
                ..LoadOptions::default()
            })
            .map_err(|err| format!("config load failed: {err}"))?;

            ensure(config.source.page_size == 50, "file page size should replace the default")?;
            ensure(
                config.analysis.missing_data_threshold == 0.2,
                "file threshold should replace the default",
            )?;
            ensure(config.logging.level == "debug", "overridden log level should be debug")?;
            ensure(
                matches!(config.logging.format, LogFormat::Json),
                "env log format should win over the file",
            )?;
            ensure(
                config.source.api_token.as_ref().map(|token| token.expose_secret())
                    == Some("token-from-env"),
                "env api token should win over file and defaults",
            )?;
            Ok(())
        })();

        clear_vars(LIVE_VARS);
        clear_vars(&["BOARDSIGHT_LOG_FORMAT"]);
        result
    }

    #[test]
    fn enabled_llm_requires_credentials() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        set_live_vars("token");
        env::set_var("BOARDSIGHT_LLM_ENABLED", "true");
        env::set_var("BOARDSIGHT_LLM_PROVIDER", "anthropic");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let outcome = AppConfig::load(isolated_options(&dir));
            ensure(
                matches!(outcome, Err(ConfigError::Validation(ref message)) if message.contains("llm.api_key")),
                "enabled anthropic provider without key should fail",
            )
        })();

        clear_vars(LIVE_VARS);
        clear_vars(&["BOARDSIGHT_LLM_ENABLED", "BOARDSIGHT_LLM_PROVIDER"]);
        result
    }

    #[test]
    fn invalid_numeric_env_is_reported() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("BOARDSIGHT_SOURCE_PAGE_SIZE", "lots");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let outcome = AppConfig::load(isolated_options(&dir));
            ensure(
                matches!(outcome, Err(ConfigError::InvalidEnvOverride { ref key, .. }) if key == "BOARDSIGHT_SOURCE_PAGE_SIZE"),
                "bad page size should name the variable",
            )
        })();

        clear_vars(&["BOARDSIGHT_SOURCE_PAGE_SIZE"]);
        result
    }

    #[test]
    fn secret_values_are_not_leaked() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        set_live_vars("monday-secret-value");
        env::set_var("BOARDSIGHT_LLM_API_KEY", "llm-secret-value");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let config = AppConfig::load(isolated_options(&dir))
                .map_err(|err| format!("config load failed: {err}"))?;
            let debug = format!("{config:?}");
            let redacted = config.redacted().to_string();

            ensure(!debug.contains("monday-secret-value"), "debug output should not contain api token")?;
            ensure(!debug.contains("llm-secret-value"), "debug output should not contain llm key")?;
            ensure(!redacted.contains("monday-secret-value"), "redacted view should hide api token")?;
            ensure(redacted.contains("<redacted>"), "redacted view should mark secrets")?;
            ensure(
                matches!(config.logging.format, LogFormat::Compact),
                "default logging format should be compact",
            )?;
            Ok(())
        })();

        clear_vars(LIVE_VARS);
        clear_vars(&["BOARDSIGHT_LLM_API_KEY"]);
        result
    }
}

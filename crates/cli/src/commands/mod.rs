pub mod ask;
pub mod config;
pub mod doctor;
pub mod refresh;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use boardsight_agent::{BoardAgent, CachedSource, HttpLlmClient, LlmNarrator};
use boardsight_core::config::{AppConfig, ConfigOverrides, LoadOptions, SourceMode};
use boardsight_core::errors::ApplicationError;
use boardsight_core::pipeline::AnalysisPipeline;
use boardsight_core::rules::RuleTables;
use boardsight_core::source::{BoardSource, RawRecordCache, StaticSource};
use boardsight_monday::MondaySource;
use serde::Serialize;
use uuid::Uuid;

pub const EXIT_OK: u8 = 0;
pub const EXIT_CONFIG: u8 = 2;
pub const EXIT_SOURCE: u8 = 3;
pub const EXIT_RULES: u8 = 4;

#[derive(Debug, Clone)]
pub struct CommandResult {
    pub exit_code: u8,
    pub output: String,
}

#[derive(Debug, Serialize)]
struct CommandOutcome {
    command: String,
    status: String,
    error_class: Option<String>,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    hint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    correlation_id: Option<String>,
}

impl CommandResult {
    pub fn success(command: &str, message: impl Into<String>) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "ok".to_string(),
            error_class: None,
            message: message.into(),
            hint: None,
            correlation_id: None,
        };
        Self { exit_code: EXIT_OK, output: serialize_payload(payload) }
    }

    pub fn failure(
        command: &str,
        error_class: &str,
        message: impl Into<String>,
        exit_code: u8,
    ) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "error".to_string(),
            error_class: Some(error_class.to_string()),
            message: message.into(),
            hint: None,
            correlation_id: None,
        };
        Self { exit_code, output: serialize_payload(payload) }
    }

    /// Failure for an application error: the detailed message plus the
    /// user-facing hint and a correlation id from its interface mapping.
    pub fn from_error(command: &str, error: impl Into<ApplicationError>) -> Self {
        let error = error.into();
        let (error_class, exit_code) = match &error {
            ApplicationError::Configuration(_) => ("config_validation", EXIT_CONFIG),
            ApplicationError::Rules(_) => ("rules", EXIT_RULES),
            ApplicationError::Source(_) => ("source", EXIT_SOURCE),
            ApplicationError::Cache(_) => ("cache", EXIT_SOURCE),
        };
        let message = error.to_string();
        let interface = error.into_interface(Uuid::new_v4().to_string());

        let payload = CommandOutcome {
            command: command.to_string(),
            status: "error".to_string(),
            error_class: Some(error_class.to_string()),
            message,
            hint: Some(interface.user_message().to_string()),
            correlation_id: Some(interface.correlation_id().to_string()),
        };
        Self { exit_code, output: serialize_payload(payload) }
    }
}

fn serialize_payload(payload: CommandOutcome) -> String {
    serde_json::to_string(&payload).unwrap_or_else(|error| {
        format!(
            "{{\"command\":\"unknown\",\"status\":\"error\",\"error_class\":\"serialization\",\"message\":\"{}\"}}",
            error.to_string().replace('\\', "\\\\").replace('"', "\\\"")
        )
    })
}

/// Flags shared by every subcommand.
#[derive(Debug, Clone, Default)]
pub struct GlobalOptions {
    pub demo: bool,
    pub config_path: Option<PathBuf>,
}

impl GlobalOptions {
    pub fn load_options(&self) -> LoadOptions {
        let overrides = ConfigOverrides {
            source_mode: self.demo.then_some(SourceMode::Demo),
            ..ConfigOverrides::default()
        };
        LoadOptions { config_path: self.config_path.clone(), require_file: false, overrides }
    }

    pub fn load_config(&self, command: &str) -> Result<AppConfig, CommandResult> {
        AppConfig::load(self.load_options()).map_err(|error| CommandResult::from_error(command, error))
    }
}

pub(crate) fn load_rules(command: &str, config: &AppConfig) -> Result<RuleTables, CommandResult> {
    RuleTables::load_or_default(config.analysis.rules_path.as_deref())
        .map_err(|error| CommandResult::from_error(command, error))
}

pub(crate) fn board_source(
    command: &str,
    config: &AppConfig,
) -> Result<Arc<dyn BoardSource>, CommandResult> {
    match config.source.mode {
        SourceMode::Demo => Ok(Arc::new(StaticSource::demo())),
        SourceMode::Cache => {
            let path = config.source.cache_path.as_ref().ok_or_else(|| {
                CommandResult::from_error(
                    command,
                    ApplicationError::Configuration(
                        "source.cache_path is required in cache mode".to_string(),
                    ),
                )
            })?;
            Ok(Arc::new(CachedSource::new(RawRecordCache::new(path))))
        }
        SourceMode::Live => MondaySource::from_config(&config.source)
            .map(|source| Arc::new(source) as Arc<dyn BoardSource>)
            .map_err(|error| {
                CommandResult::failure(command, "source_setup", error.to_string(), EXIT_SOURCE)
            }),
    }
}

pub(crate) fn build_agent(command: &str, config: &AppConfig) -> Result<BoardAgent, CommandResult> {
    let rules = load_rules(command, config)?;
    let pipeline = AnalysisPipeline::new(&rules, &config.analysis);
    let mut agent = BoardAgent::new(board_source(command, config)?, pipeline)
        .with_fetch_timeout(Duration::from_secs(config.source.fetch_budget_secs));

    if let Some(path) = &config.source.cache_path {
        agent = agent.with_cache(RawRecordCache::new(path));
    }
    if config.llm.enabled {
        let client = HttpLlmClient::from_config(&config.llm).map_err(|error| {
            CommandResult::from_error(command, ApplicationError::Configuration(error.to_string()))
        })?;
        agent = agent.with_narrator(
            Arc::new(LlmNarrator::new(client)),
            Duration::from_secs(config.llm.timeout_secs),
        );
    }
    Ok(agent)
}

pub(crate) fn runtime(command: &str) -> Result<tokio::runtime::Runtime, CommandResult> {
    tokio::runtime::Builder::new_current_thread().enable_all().build().map_err(|error| {
        CommandResult::failure(
            command,
            "runtime",
            format!("failed to initialize async runtime: {error}"),
            1,
        )
    })
}

pub(crate) fn to_json<T: Serialize>(command: &str, value: &T) -> CommandResult {
    match serde_json::to_string_pretty(value) {
        Ok(output) => CommandResult { exit_code: EXIT_OK, output },
        Err(error) => CommandResult::failure(command, "serialization", error.to_string(), 1),
    }
}

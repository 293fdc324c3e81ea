use boardsight_agent::HttpLlmClient;
use boardsight_core::config::{AppConfig, SourceMode};
use boardsight_core::domain::BoardCategory;
use boardsight_core::source::RawRecordCache;
use serde::Serialize;

use crate::commands::{
    board_source, load_rules, runtime, CommandResult, GlobalOptions, EXIT_CONFIG, EXIT_OK,
    EXIT_RULES, EXIT_SOURCE,
};

const COMMAND: &str = "doctor";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: CheckStatus,
    details: String,
    #[serde(skip)]
    exit_code: u8,
}

impl DoctorCheck {
    fn pass(name: &'static str, details: impl Into<String>) -> Self {
        Self { name, status: CheckStatus::Pass, details: details.into(), exit_code: EXIT_OK }
    }

    fn fail(name: &'static str, details: impl Into<String>, exit_code: u8) -> Self {
        Self { name, status: CheckStatus::Fail, details: details.into(), exit_code }
    }

    fn skipped(name: &'static str, details: impl Into<String>) -> Self {
        Self { name, status: CheckStatus::Skipped, details: details.into(), exit_code: EXIT_OK }
    }
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

pub fn run(options: &GlobalOptions, json_output: bool) -> CommandResult {
    let report = build_report(options);
    let exit_code = report
        .checks
        .iter()
        .find(|check| check.status == CheckStatus::Fail)
        .map(|check| check.exit_code)
        .unwrap_or(EXIT_OK);

    let output = if json_output {
        serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        })
    } else {
        render_human(&report)
    };
    CommandResult { exit_code, output }
}

fn build_report(options: &GlobalOptions) -> DoctorReport {
    let mut checks = Vec::new();

    match AppConfig::load(options.load_options()) {
        Ok(config) => {
            checks.push(DoctorCheck::pass(
                "config_validation",
                format!("configuration loaded and validated (source mode `{}`)", config.source.mode.as_str()),
            ));
            checks.push(check_rule_tables(&config));
            checks.push(check_source(&config));
            checks.push(check_llm(&config));
        }
        Err(error) => {
            checks.push(DoctorCheck::fail("config_validation", error.to_string(), EXIT_CONFIG));
            for name in ["rule_tables", "source_readiness", "llm_readiness"] {
                checks.push(DoctorCheck::skipped(name, "skipped because configuration did not load"));
            }
        }
    }

    let all_pass = checks.iter().all(|check| check.status != CheckStatus::Fail);
    let overall_status = if all_pass { CheckStatus::Pass } else { CheckStatus::Fail };
    let summary = if all_pass {
        "doctor: all readiness checks passed".to_string()
    } else {
        "doctor: one or more readiness checks failed".to_string()
    };

    DoctorReport { overall_status, summary, checks }
}

fn check_rule_tables(config: &AppConfig) -> DoctorCheck {
    match load_rules(COMMAND, config) {
        Ok(rules) => DoctorCheck::pass(
            "rule_tables",
            match &config.analysis.rules_path {
                Some(path) => format!(
                    "loaded `{}` ({} insight rules, {} recommendation rules)",
                    path.display(),
                    rules.insight_rules.len(),
                    rules.recommendation_rules.len()
                ),
                None => "using built-in rule tables".to_string(),
            },
        ),
        Err(result) => DoctorCheck::fail("rule_tables", result.output, EXIT_RULES),
    }
}

fn check_source(config: &AppConfig) -> DoctorCheck {
    const NAME: &str = "source_readiness";

    match config.source.mode {
        SourceMode::Demo => DoctorCheck::pass(NAME, "serving built-in demo boards"),
        SourceMode::Cache => match &config.source.cache_path {
            Some(path) if RawRecordCache::new(path).exists() => {
                DoctorCheck::pass(NAME, format!("raw cache present at `{}`", path.display()))
            }
            Some(path) => DoctorCheck::fail(
                NAME,
                format!("raw cache `{}` does not exist", path.display()),
                EXIT_SOURCE,
            ),
            None => DoctorCheck::fail(NAME, "source.cache_path is not set", EXIT_CONFIG),
        },
        SourceMode::Live => {
            let source = match board_source(COMMAND, config) {
                Ok(source) => source,
                Err(result) => return DoctorCheck::fail(NAME, result.output, result.exit_code),
            };
            let runtime = match runtime(COMMAND) {
                Ok(runtime) => runtime,
                Err(result) => return DoctorCheck::fail(NAME, result.output, EXIT_SOURCE),
            };
            let mut reached = Vec::new();
            for category in BoardCategory::ALL {
                match runtime.block_on(source.fetch(category)) {
                    Ok(records) => reached.push(format!("{category}: {} items", records.len())),
                    Err(error) => {
                        return DoctorCheck::fail(
                            NAME,
                            format!("{category} board: {error}"),
                            EXIT_SOURCE,
                        )
                    }
                }
            }
            DoctorCheck::pass(NAME, format!("monday reachable ({})", reached.join(", ")))
        }
    }
}

fn check_llm(config: &AppConfig) -> DoctorCheck {
    const NAME: &str = "llm_readiness";

    if !config.llm.enabled {
        return DoctorCheck::skipped(NAME, "narrative disabled; summaries are templated");
    }
    match HttpLlmClient::from_config(&config.llm) {
        Ok(_) => DoctorCheck::pass(
            NAME,
            format!("{} client ready (model `{}`)", config.llm.provider.as_str(), config.llm.model),
        ),
        Err(error) => DoctorCheck::fail(NAME, error.to_string(), EXIT_CONFIG),
    }
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = Vec::new();
    lines.push(report.summary.clone());

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("- [{marker}] {}: {}", check.name, check.details));
    }

    lines.join("\n")
}

fn escape_json(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

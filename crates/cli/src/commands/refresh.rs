use boardsight_agent::RefreshSummary;

use crate::commands::{build_agent, runtime, to_json, CommandResult, GlobalOptions, EXIT_OK, EXIT_SOURCE};

const COMMAND: &str = "refresh";

/// Exit code is `EXIT_SOURCE` when any board had to fall back.
pub fn run(options: &GlobalOptions, json_output: bool) -> CommandResult {
    let config = match options.load_config(COMMAND) {
        Ok(config) => config,
        Err(result) => return result,
    };
    let agent = match build_agent(COMMAND, &config) {
        Ok(agent) => agent,
        Err(result) => return result,
    };
    let runtime = match runtime(COMMAND) {
        Ok(runtime) => runtime,
        Err(result) => return result,
    };

    let summary = runtime.block_on(agent.refresh());
    let exit_code = if summary.is_complete() { EXIT_OK } else { EXIT_SOURCE };

    let mut result = if json_output {
        to_json(COMMAND, &summary)
    } else {
        CommandResult { exit_code: EXIT_OK, output: render_human(&summary) }
    };
    if result.exit_code == EXIT_OK {
        result.exit_code = exit_code;
    }
    result
}

fn render_human(summary: &RefreshSummary) -> String {
    let mut lines = vec![format!(
        "refresh: generation {} (fingerprint {})",
        summary.generation,
        &summary.fingerprint[..summary.fingerprint.len().min(16)]
    )];

    for (category, report) in &summary.quality_reports {
        let fetched = summary.records_fetched.get(category).copied().unwrap_or_default();
        lines.push(format!(
            "- {category}: {fetched} fetched, {} records audited, {} issue(s)",
            report.total_records,
            report.issues.len()
        ));
        for issue in &report.issues {
            lines.push(format!("    [{}] {}: {}", issue.severity.as_str(), issue.kind.as_str(), issue.message));
        }
    }
    for (category, reason) in &summary.stale {
        lines.push(format!("- {category}: stale ({reason})"));
    }
    lines.join("\n")
}

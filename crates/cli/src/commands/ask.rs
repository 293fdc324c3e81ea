use boardsight_core::insight::{Intent, Response};

use crate::commands::{build_agent, runtime, to_json, CommandResult, GlobalOptions, EXIT_OK};

const COMMAND: &str = "ask";

/// Refreshes the boards, then answers `question` from the new snapshot.
pub fn run(options: &GlobalOptions, question: &str, json_output: bool) -> CommandResult {
    if question.trim().is_empty() {
        return CommandResult::failure(COMMAND, "invalid_input", "question must not be empty", 64);
    }

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

    let response = runtime.block_on(async {
        agent.refresh().await;
        agent.ask(question).await
    });

    if json_output {
        return to_json(COMMAND, &response);
    }
    CommandResult { exit_code: EXIT_OK, output: render_human(&response) }
}

fn render_human(response: &Response) -> String {
    let mut lines = vec![response.executive_summary.clone()];
    if response.intent == Intent::Unknown {
        return lines.join("\n");
    }

    for (category, metrics) in &response.metrics {
        lines.push(String::new());
        lines.push(format!("{}:", category.label()));
        for (name, value) in metrics {
            lines.push(format!("  {name}: {}", value.display()));
        }
    }

    push_section(&mut lines, "Insights", &response.insights);
    push_section(&mut lines, "Caveats", &response.caveats);
    push_section(&mut lines, "Recommendations", &response.recommendations);

    if !response.details.is_empty() {
        lines.push(String::new());
        lines.push("Details:".to_string());
        for row in &response.details {
            let extra = row
                .amount
                .clone()
                .or_else(|| row.target_date.map(|date| date.to_string()))
                .unwrap_or_default();
            lines.push(format!(
                "  {} | {} | {} | {} | {}",
                row.id,
                row.name.as_deref().unwrap_or("-"),
                row.status.as_deref().unwrap_or("-"),
                row.owner.as_deref().unwrap_or("-"),
                extra
            ));
        }
    }

    let sources: Vec<String> = response
        .data_used
        .iter()
        .map(|used| format!("{} ({} records, {:?})", used.category, used.records, used.origin))
        .collect();
    if !sources.is_empty() {
        lines.push(String::new());
        lines.push(format!("Data used: {}", sources.join(", ")));
    }
    lines.join("\n")
}

fn push_section(lines: &mut Vec<String>, title: &str, entries: &[String]) {
    if entries.is_empty() {
        return;
    }
    lines.push(String::new());
    lines.push(format!("{title}:"));
    lines.extend(entries.iter().map(|entry| format!("  - {entry}")));
}

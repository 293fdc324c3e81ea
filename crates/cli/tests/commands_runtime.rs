use std::env;
use std::fs;
use std::sync::{Mutex, OnceLock};

use boardsight_cli::commands::{ask, config, doctor, refresh, GlobalOptions};
use serde_json::Value;

#[test]
fn ask_answers_pipeline_question_in_demo_mode() {
    with_env(&[], |options| {
        let result = ask::run(&options, "how is our sales pipeline doing?", true);
        assert_eq!(result.exit_code, 0, "expected demo ask to succeed: {}", result.output);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["intent"], "pipeline");
        assert_eq!(payload["metrics"]["deal"]["win_rate"]["kind"], "ratio");
        assert_eq!(payload["summary_source"], "template");
        assert!(payload["executive_summary"].as_str().is_some_and(|text| text.starts_with("Pipeline:")));
    });
}

#[test]
fn ask_human_output_lists_sections() {
    with_env(&[], |options| {
        let result = ask::run(&options, "give me an overall business overview", false);
        assert_eq!(result.exit_code, 0);
        assert!(result.output.contains("Data used:"), "output: {}", result.output);
        assert!(result.output.contains("Recommendations:"));
    });
}

#[test]
fn ask_rejects_empty_question() {
    with_env(&[], |options| {
        let result = ask::run(&options, "   ", true);
        assert_eq!(result.exit_code, 64);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "ask");
        assert_eq!(payload["error_class"], "invalid_input");
    });
}

#[test]
fn ask_returns_config_failure_without_token_in_live_mode() {
    with_env(&[], |options| {
        let options = GlobalOptions { demo: false, ..options };
        let result = ask::run(&options, "how is the pipeline?", true);
        assert_eq!(result.exit_code, 2, "expected config validation failure code");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "ask");
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["error_class"], "config_validation");
        assert!(payload["message"].as_str().is_some_and(|message| message.starts_with("configuration failure")));
        assert!(payload["correlation_id"].as_str().is_some_and(|id| !id.is_empty()));
    });
}

#[test]
fn refresh_reports_generation_and_counts_in_demo_mode() {
    with_env(&[], |options| {
        let result = refresh::run(&options, true);
        assert_eq!(result.exit_code, 0, "expected demo refresh to succeed: {}", result.output);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["generation"], 1);
        assert_eq!(payload["records_fetched"]["deal"], 6);
        assert_eq!(payload["records_fetched"]["work_order"], 6);
        assert!(payload["fingerprint"].as_str().is_some_and(|hash| !hash.is_empty()));
    });
}

#[test]
fn refresh_exits_with_source_code_when_cache_is_missing() {
    let dir = tempfile::tempdir().expect("tempdir");
    let cache_path = dir.path().join("missing-cache.json");
    let cache_path = cache_path.to_string_lossy().into_owned();

    with_env(
        &[("BOARDSIGHT_SOURCE_MODE", "cache"), ("BOARDSIGHT_SOURCE_CACHE_PATH", cache_path.as_str())],
        |options| {
            let options = GlobalOptions { demo: false, ..options };
            let result = refresh::run(&options, true);
            assert_eq!(result.exit_code, 3, "expected source failure code: {}", result.output);

            let payload = parse_payload(&result.output);
            assert!(payload["stale"]["deal"].is_string());
            assert!(payload["stale"]["work_order"].is_string());
        },
    );
}

#[test]
fn invalid_rules_file_fails_with_rules_code() {
    let dir = tempfile::tempdir().expect("tempdir");
    let rules_path = dir.path().join("rules.toml");
    fs::write(&rules_path, "stage_order = [\"unterminated\"\n").expect("write rules");
    let rules_path = rules_path.to_string_lossy().into_owned();

    with_env(&[("BOARDSIGHT_ANALYSIS_RULES_PATH", rules_path.as_str())], |options| {
        let result = refresh::run(&options, true);
        assert_eq!(result.exit_code, 4);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "refresh");
        assert_eq!(payload["error_class"], "rules");
        assert_eq!(
            payload["hint"],
            "The request could not be processed. Check the configuration and rule tables."
        );
    });
}

#[test]
fn doctor_passes_in_demo_mode() {
    with_env(&[], |options| {
        let result = doctor::run(&options, true);
        assert_eq!(result.exit_code, 0, "doctor output: {}", result.output);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["overall_status"], "pass");
        let checks = payload["checks"].as_array().expect("checks array");
        let llm = checks.iter().find(|check| check["name"] == "llm_readiness").expect("llm check");
        assert_eq!(llm["status"], "skipped");
    });
}

#[test]
fn doctor_reports_config_failure_in_live_mode_without_token() {
    with_env(&[], |options| {
        let options = GlobalOptions { demo: false, ..options };
        let result = doctor::run(&options, true);
        assert_eq!(result.exit_code, 2);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["overall_status"], "fail");
        assert_eq!(payload["checks"][0]["name"], "config_validation");
        assert_eq!(payload["checks"][0]["status"], "fail");
    });
}

#[test]
fn config_redacts_secrets_and_attributes_sources() {
    with_env(&[("MONDAY_API_TOKEN", "super-secret-token")], |options| {
        let result = config::run(&options);
        assert_eq!(result.exit_code, 0);
        assert!(!result.output.contains("super-secret-token"));
        assert!(result
            .output
            .contains("- source.api_token = <redacted> (source: env (MONDAY_API_TOKEN))"));
        assert!(result.output.contains("- source.mode = demo (source: flag (--demo))"));
        assert!(result.output.contains("- llm.api_key = <unset> (source: default)"));
    });
}

fn parse_payload(output: &str) -> Value {
    serde_json::from_str(output).expect("command output should be valid json")
}

/// Runs `test_fn` in demo mode with a clean environment and no config file.
fn with_env(vars: &[(&str, &str)], test_fn: impl FnOnce(GlobalOptions)) {
    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    let _guard =
        ENV_LOCK.get_or_init(|| Mutex::new(())).lock().expect("env mutex should not be poisoned");

    let keys = [
        "BOARDSIGHT_SOURCE_MODE",
        "BOARDSIGHT_SOURCE_API_URL",
        "BOARDSIGHT_SOURCE_API_TOKEN",
        "BOARDSIGHT_SOURCE_DEALS_BOARD_ID",
        "BOARDSIGHT_SOURCE_WORK_ORDERS_BOARD_ID",
        "BOARDSIGHT_SOURCE_PAGE_SIZE",
        "BOARDSIGHT_SOURCE_TIMEOUT_SECS",
        "BOARDSIGHT_SOURCE_MAX_RETRIES",
        "BOARDSIGHT_SOURCE_CACHE_PATH",
        "BOARDSIGHT_LLM_ENABLED",
        "BOARDSIGHT_LLM_PROVIDER",
        "BOARDSIGHT_LLM_API_KEY",
        "BOARDSIGHT_LLM_BASE_URL",
        "BOARDSIGHT_LLM_MODEL",
        "BOARDSIGHT_LLM_TIMEOUT_SECS",
        "BOARDSIGHT_ANALYSIS_MISSING_DATA_THRESHOLD",
        "BOARDSIGHT_ANALYSIS_AT_RISK_TOP_N",
        "BOARDSIGHT_ANALYSIS_DETAILS_LIMIT",
        "BOARDSIGHT_ANALYSIS_RULES_PATH",
        "BOARDSIGHT_LOGGING_LEVEL",
        "BOARDSIGHT_LOGGING_FORMAT",
        "BOARDSIGHT_LOG_LEVEL",
        "BOARDSIGHT_LOG_FORMAT",
        "MONDAY_API_TOKEN",
    ];

    let previous_values: Vec<(&str, Option<String>)> =
        keys.iter().map(|key| (*key, env::var(key).ok())).collect();

    for key in &keys {
        env::remove_var(key);
    }
    for (key, value) in vars {
        env::set_var(key, value);
    }

    let config_dir = tempfile::tempdir().expect("tempdir");
    let options = GlobalOptions {
        demo: true,
        config_path: Some(config_dir.path().join("absent.toml")),
    };
    test_fn(options);

    for (key, value) in previous_values {
        if let Some(value) = value {
            env::set_var(key, value);
        } else {
            env::remove_var(key);
        }
    }
}

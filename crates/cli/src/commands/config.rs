use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use boardsight_core::config::ENV_PREFIX;
use toml::Value;

use crate::commands::{CommandResult, GlobalOptions, EXIT_OK};

const COMMAND: &str = "config";

/// Keys read from more than one environment variable.
const ENV_ALIASES: &[(&str, &str)] = &[
    ("source.api_token", "MONDAY_API_TOKEN"),
    ("logging.level", "BOARDSIGHT_LOG_LEVEL"),
    ("logging.format", "BOARDSIGHT_LOG_FORMAT"),
];

pub fn run(options: &GlobalOptions) -> CommandResult {
    let config = match options.load_config(COMMAND) {
        Ok(config) => config,
        Err(result) => return result,
    };

    let config_file_path = detect_config_path(options.config_path.as_deref());
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let mut lines =
        vec!["effective config (source precedence: flags > env > file > default):".to_string()];

    let redacted = config.redacted();
    let sections = redacted.as_object().into_iter().flat_map(|sections| sections.iter());
    for (section, fields) in sections {
        let Some(fields) = fields.as_object() else { continue };
        for (key, value) in fields {
            let key_path = format!("{section}.{key}");
            let source = if options.demo && key_path == "source.mode" {
                "flag (--demo)".to_string()
            } else {
                field_source(&key_path, config_file_doc.as_ref(), config_file_path.as_deref())
            };
            lines.push(render_line(&key_path, &render_value(value), source));
        }
    }

    CommandResult { exit_code: EXIT_OK, output: lines.join("\n") }
}

fn render_value(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Null => "<unset>".to_string(),
        serde_json::Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

fn detect_config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return path.exists().then(|| path.to_path_buf());
    }

    let root = PathBuf::from("boardsight.toml");
    if root.exists() {
        return Some(root);
    }

    let nested = PathBuf::from("config/boardsight.toml");
    if nested.exists() {
        return Some(nested);
    }

    None
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    toml::from_str::<Value>(&raw).ok()
}

fn env_keys(key_path: &str) -> Vec<String> {
    let mut keys = vec![format!("{ENV_PREFIX}{}", key_path.replace('.', "_").to_ascii_uppercase())];
    keys.extend(
        ENV_ALIASES
            .iter()
            .filter(|(path, _)| *path == key_path)
            .map(|(_, alias)| alias.to_string()),
    );
    keys
}

fn field_source(
    key_path: &str,
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_keys(key_path).into_iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

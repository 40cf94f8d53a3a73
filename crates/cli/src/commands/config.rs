use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use toml::Value;

use crate::commands::{load_config, CommandResult, EXIT_CONFIG, EXIT_RUNTIME};

#[derive(Debug, Serialize)]
struct ConfigEntry {
    key: String,
    value: String,
    source: String,
}

/// Effective configuration with the layer each value came from (env > file > default).
pub fn run() -> CommandResult {
    let config = match load_config("config") {
        Ok(config) => config,
        Err(result) => return result,
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());
    let entry = |key: &str, value: String, env_key: Option<&str>| ConfigEntry {
        key: key.to_string(),
        value,
        source: field_source(key, env_key, config_file_doc.as_ref(), config_file_path.as_deref()),
    };

    let mut entries = vec![
        entry("database.url", config.database.url.clone(), Some("EXPENSA_DATABASE_URL")),
        entry(
            "database.max_connections",
            config.database.max_connections.to_string(),
            Some("EXPENSA_DATABASE_MAX_CONNECTIONS"),
        ),
        entry(
            "database.timeout_secs",
            config.database.timeout_secs.to_string(),
            Some("EXPENSA_DATABASE_TIMEOUT_SECS"),
        ),
        entry(
            "server.bind_address",
            config.server.bind_address.clone(),
            Some("EXPENSA_SERVER_BIND_ADDRESS"),
        ),
        entry("server.port", config.server.port.to_string(), Some("EXPENSA_SERVER_PORT")),
        entry(
            "server.graceful_shutdown_secs",
            config.server.graceful_shutdown_secs.to_string(),
            Some("EXPENSA_SERVER_GRACEFUL_SHUTDOWN_SECS"),
        ),
        entry("logging.level", config.logging.level.clone(), Some("EXPENSA_LOGGING_LEVEL")),
        entry(
            "logging.format",
            format!("{:?}", config.logging.format).to_ascii_lowercase(),
            Some("EXPENSA_LOGGING_FORMAT"),
        ),
    ];

    match config.rate_table() {
        Ok(table) => {
            for code in table.codes() {
                let rate = table.rate(code).map(|rate| rate.to_string()).unwrap_or_default();
                let key = format!("currency.rates.{code}");
                let mut item = entry(&key, rate, None);
                if item.source == "default" && config.currency.rates.contains_key(code) {
                    item.source = "env (EXPENSA_CURRENCY_RATES)".to_string();
                }
                entries.push(item);
            }
        }
        Err(error) => {
            return CommandResult::failure(
                "config",
                "config_validation",
                error.to_string(),
                EXIT_CONFIG,
            );
        }
    }

    let message =
        format!("effective config ({} values, precedence: env > file > default)", entries.len());
    match serde_json::to_value(&entries) {
        Ok(data) => CommandResult::success_with_data("config", message, data),
        Err(error) => {
            CommandResult::failure("config", "serialization", error.to_string(), EXIT_RUNTIME)
        }
    }
}

fn detect_config_path() -> Option<PathBuf> {
    [PathBuf::from("expensa.toml"), PathBuf::from("config/expensa.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<toml::Table>().ok().map(Value::Table)
}

fn field_source(
    key_path: &str,
    env_key: Option<&str>,
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_key {
        if env::var_os(env_key).is_some() {
            return format!("env ({env_key})");
        }
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

#[cfg(test)]
mod tests {
    use toml::Value;

    use super::{contains_path, field_source};

    fn document(raw: &str) -> Value {
        Value::Table(raw.parse::<toml::Table>().expect("toml document"))
    }

    #[test]
    fn nested_keys_are_found_in_config_documents() {
        let doc = document("[currency.rates]\nEUR = \"0.9\"\n");
        assert!(contains_path(&doc, "currency.rates.EUR"));
        assert!(!contains_path(&doc, "currency.rates.GBP"));
    }

    #[test]
    fn file_source_beats_default() {
        let doc = document("[server]\nport = 9000\n");
        let source = field_source("server.port", None, Some(&doc), None);
        assert_eq!(source, "file (config file)");
        assert_eq!(field_source("server.bind_address", None, Some(&doc), None), "default");
    }
}

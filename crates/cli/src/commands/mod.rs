pub mod company;
pub mod config;
pub mod expense;
pub mod migrate;
pub mod rules;
pub mod seed;
pub mod user;

use std::future::Future;

use serde::Serialize;
use serde_json::Value;

use expensa_core::config::{AppConfig, LoadOptions};
use expensa_core::errors::ApplicationError;
use expensa_core::store::ExpenseStore;
use expensa_db::{connect_from_config, migrations, SqlStateStore};

pub const EXIT_CONFIG: u8 = 2;
pub const EXIT_RUNTIME: u8 = 3;
pub const EXIT_DATABASE: u8 = 4;
pub const EXIT_MIGRATION: u8 = 5;
pub const EXIT_DOMAIN: u8 = 6;

pub type CliStore = ExpenseStore<SqlStateStore>;

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
    data: Option<Value>,
}

impl CommandResult {
    pub fn success(command: &str, message: impl Into<String>) -> Self {
        Self::success_with_data(command, message, Value::Null)
    }

    pub fn success_with_data(command: &str, message: impl Into<String>, data: Value) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "ok".to_string(),
            error_class: None,
            message: message.into(),
            data: (!data.is_null()).then_some(data),
        };
        Self { exit_code: 0, output: serialize_payload(payload) }
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
            data: None,
        };
        Self { exit_code, output: serialize_payload(payload) }
    }

    fn from_application_error(command: &str, error: ApplicationError) -> Self {
        let exit_code = match &error {
            ApplicationError::Domain(_) => EXIT_DOMAIN,
            ApplicationError::Persistence(_) => EXIT_DATABASE,
            ApplicationError::Configuration(_) => EXIT_CONFIG,
        };
        Self::failure(command, error.error_class(), error.to_string(), exit_code)
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

pub(crate) fn load_config(command: &str) -> Result<AppConfig, CommandResult> {
    AppConfig::load(LoadOptions::default()).map_err(|error| {
        CommandResult::failure(
            command,
            "config_validation",
            format!("configuration issue: {error}"),
            EXIT_CONFIG,
        )
    })
}

pub(crate) fn runtime(command: &str) -> Result<tokio::runtime::Runtime, CommandResult> {
    tokio::runtime::Builder::new_current_thread().enable_all().build().map_err(|error| {
        CommandResult::failure(
            command,
            "runtime_init",
            format!("failed to initialize async runtime: {error}"),
            EXIT_RUNTIME,
        )
    })
}

/// Opens the configured database, applies pending migrations and hands `operation` a store.
/// The operation returns a human message plus a value rendered as the outcome's `data`.
pub(crate) fn with_store<T, F, Fut>(command: &str, operation: F) -> CommandResult
where
    T: Serialize,
    F: FnOnce(CliStore) -> Fut,
    Fut: Future<Output = Result<(String, T), ApplicationError>>,
{
    let config = match load_config(command) {
        Ok(config) => config,
        Err(result) => return result,
    };
    let rates = match config.rate_table() {
        Ok(rates) => rates,
        Err(error) => {
            return CommandResult::failure(
                command,
                "config_validation",
                format!("configuration issue: {error}"),
                EXIT_CONFIG,
            )
        }
    };
    let runtime = match runtime(command) {
        Ok(runtime) => runtime,
        Err(result) => return result,
    };

    runtime.block_on(async {
        let pool = match connect_from_config(&config.database).await {
            Ok(pool) => pool,
            Err(error) => {
                return CommandResult::failure(
                    command,
                    "db_connectivity",
                    error.to_string(),
                    EXIT_DATABASE,
                )
            }
        };
        if let Err(error) = migrations::run_pending(&pool).await {
            pool.close().await;
            return CommandResult::failure(command, "migration", error.to_string(), EXIT_MIGRATION);
        }

        let store = ExpenseStore::with_rates(SqlStateStore::new(pool.clone()), rates);
        let outcome = operation(store).await;
        pool.close().await;

        match outcome {
            Ok((message, data)) => match serde_json::to_value(data) {
                Ok(data) => CommandResult::success_with_data(command, message, data),
                Err(error) => CommandResult::failure(
                    command,
                    "serialization",
                    error.to_string(),
                    EXIT_RUNTIME,
                ),
            },
            Err(error) => CommandResult::from_application_error(command, error),
        }
    })
}

pub mod client;
pub mod config;
pub mod doctor;
pub mod migrate;
pub mod project;
pub mod quote;
pub mod seed;
pub mod stats;

use std::future::Future;

use devis_core::config::{AppConfig, LoadOptions};
use devis_core::domain::rates::RateTable;
use devis_core::{ApplicationError, DomainError, ExportError, IdGenerator, UuidIdGenerator};
use devis_db::repositories::RepositoryError;
use devis_db::{connect_with_settings, migrations, DbPool};
use serde::Serialize;
use rust_decimal::Decimal;
use serde_json::Value;

pub const EXIT_CONFIG: u8 = 2;
pub const EXIT_RUNTIME: u8 = 3;
pub const EXIT_DB_CONNECTIVITY: u8 = 4;
pub const EXIT_MIGRATION: u8 = 5;
pub const EXIT_PERSISTENCE: u8 = 6;
pub const EXIT_NOT_FOUND: u8 = 7;
pub const EXIT_EXPORT: u8 = 8;
pub const EXIT_INVALID_ARGUMENT: u8 = 9;

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

/// `(error_class, message, exit_code)` carried out of a command's async body.
pub(crate) type Failure = (&'static str, String, u8);

impl CommandResult {
    pub fn success(command: &str, message: impl Into<String>) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "ok".to_string(),
            error_class: None,
            message: message.into(),
            data: None,
        };
        Self { exit_code: 0, output: serialize_payload(payload) }
    }

    pub fn success_with_data(
        command: &str,
        message: impl Into<String>,
        data: &impl Serialize,
    ) -> Self {
        match serde_json::to_value(data) {
            Ok(data) => {
                let payload = CommandOutcome {
                    command: command.to_string(),
                    status: "ok".to_string(),
                    error_class: None,
                    message: message.into(),
                    data: Some(data),
                };
                Self { exit_code: 0, output: serialize_payload(payload) }
            }
            Err(error) => Self::failure(command, "serialization", error.to_string(), 1),
        }
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

    fn from_failure(command: &str, (error_class, message, exit_code): Failure) -> Self {
        Self::failure(command, error_class, message, exit_code)
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

/// Loads config, opens a migrated pool, and runs `body` on a current-thread
/// runtime. Every failure becomes a `CommandResult` for `command`.
pub(crate) fn with_database<F, Fut>(command: &str, options: &LoadOptions, body: F) -> CommandResult
where
    F: FnOnce(AppConfig, DbPool) -> Fut,
    Fut: Future<Output = Result<CommandResult, Failure>>,
{
    let config = match AppConfig::load(options.clone()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                command,
                "config_validation",
                format!("configuration issue: {error}"),
                EXIT_CONFIG,
            );
        }
    };

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult::failure(
                command,
                "runtime_init",
                format!("failed to initialize async runtime: {error}"),
                EXIT_RUNTIME,
            );
        }
    };

    let result = runtime.block_on(async {
        let pool = open_pool(&config).await?;
        let outcome = body(config, pool.clone()).await;
        pool.close().await;
        outcome
    });

    result.unwrap_or_else(|failure| CommandResult::from_failure(command, failure))
}

pub(crate) async fn open_pool(config: &AppConfig) -> Result<DbPool, Failure> {
    let pool = connect_with_settings(
        &config.database.url,
        config.database.max_connections,
        config.database.timeout_secs,
    )
    .await
    .map_err(|error| ("db_connectivity", error.to_string(), EXIT_DB_CONNECTIVITY))?;

    migrations::run_pending(&pool)
        .await
        .map_err(|error| ("migration", error.to_string(), EXIT_MIGRATION))?;

    Ok(pool)
}

/// Reports `error` through its user-safe interface form. The detail is logged
/// under the same correlation id the operator sees.
fn application_failure(error: ApplicationError, exit_code: u8) -> Failure {
    let class = error.class();
    let interface = error.into_interface(UuidIdGenerator.next_id());
    tracing::warn!(
        event_name = "cli.command.failed",
        error_class = class,
        correlation_id = interface.correlation_id(),
        detail = %interface,
        "command failed"
    );

    let message = format!(
        "{} {interface} (correlation id {})",
        interface.user_message(),
        interface.correlation_id()
    );
    (class, message, exit_code)
}

pub(crate) fn persistence(error: RepositoryError) -> Failure {
    application_failure(ApplicationError::from(error), EXIT_PERSISTENCE)
}

pub(crate) fn export_failure(error: ExportError) -> Failure {
    application_failure(ApplicationError::from(error), EXIT_EXPORT)
}

pub(crate) fn domain_failure(error: DomainError) -> Failure {
    application_failure(ApplicationError::from(error), EXIT_INVALID_ARGUMENT)
}

pub(crate) fn invalid_argument(message: impl Into<String>) -> Failure {
    ("invalid_argument", message.into(), EXIT_INVALID_ARGUMENT)
}

pub(crate) fn not_found(kind: &str, id: &str) -> Failure {
    ("not_found", format!("{kind} `{id}` does not exist"), EXIT_NOT_FOUND)
}

/// Applies `ROLE=PRICE` assignments, then removals, to a rate table.
pub(crate) fn edit_rates(
    table: &mut RateTable,
    assignments: &[String],
    removals: &[String],
) -> Result<(), Failure> {
    for assignment in assignments {
        let (role, price) = assignment
            .rsplit_once('=')
            .ok_or_else(|| invalid_argument(format!("rate `{assignment}` is not ROLE=PRICE")))?;
        let price = price
            .trim()
            .parse::<Decimal>()
            .map_err(|error| invalid_argument(format!("rate `{assignment}`: {error}")))?;
        table.set(role, price).map_err(domain_failure)?;
    }
    for role in removals {
        table.remove(role.trim());
    }
    Ok(())
}

use devis_core::config::LoadOptions;

use crate::commands::{with_database, CommandResult, Failure};

/// Pending migrations are applied while opening the pool.
pub fn run(options: &LoadOptions) -> CommandResult {
    with_database("migrate", options, |config, _pool| async move {
        tracing::info!(event_name = "cli.migrate.completed", database_url = %config.database.url);
        Ok::<_, Failure>(CommandResult::success("migrate", "applied pending migrations"))
    })
}

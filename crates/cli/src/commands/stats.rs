use devis_core::config::LoadOptions;
use devis_core::DashboardStats;
use devis_db::{ClientRepository, DbPool, QuoteRepository, SqlClientRepository, SqlQuoteRepository};

use crate::commands::{persistence, with_database, CommandResult, Failure};

pub fn run(options: &LoadOptions) -> CommandResult {
    with_database("stats", options, |_config, pool| compute_stats(pool))
}

async fn compute_stats(pool: DbPool) -> Result<CommandResult, Failure> {
    let quotes = SqlQuoteRepository::new(pool.clone()).list().await.map_err(persistence)?;
    let clients = SqlClientRepository::new(pool).list().await.map_err(persistence)?;

    let stats = DashboardStats::compute(&quotes, clients.len());
    let message = format!(
        "{} quotes, {} accepted revenue, {} in pipeline, {}% accepted",
        stats.quote_count,
        stats.revenue.normalize(),
        stats.pipeline_amount.normalize(),
        stats.acceptance_rate
    );
    Ok(CommandResult::success_with_data("stats", message, &stats))
}

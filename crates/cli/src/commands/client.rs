use devis_core::config::LoadOptions;
use devis_core::domain::client::{Client, ClientId};
use devis_core::domain::rates::RateTable;
use devis_core::{IdGenerator, UuidIdGenerator};
use devis_db::{ClientRepository, DbPool, SqlClientRepository};

use crate::commands::{
    edit_rates, invalid_argument, persistence, with_database, CommandResult, Failure,
};

/// Upsert input. Unset fields keep their stored value on update.
#[derive(Debug, Default, clap::Args)]
pub struct SaveArgs {
    #[arg(long, help = "Client id; a new one is generated when omitted")]
    pub id: Option<String>,
    #[arg(long, help = "Contact name")]
    pub name: Option<String>,
    #[arg(long, help = "Company name")]
    pub company: Option<String>,
    #[arg(long)]
    pub email: Option<String>,
    #[arg(long)]
    pub address: Option<String>,
    #[arg(long = "rate", value_name = "ROLE=PRICE", help = "Set a default daily rate (repeatable)")]
    pub rates: Vec<String>,
    #[arg(long = "drop-rate", value_name = "ROLE", help = "Remove a default daily rate (repeatable)")]
    pub drop_rates: Vec<String>,
}

/// Creates or updates a client. Quotes priced from its rates are re-priced
/// in the same transaction.
pub fn save(options: &LoadOptions, args: SaveArgs) -> CommandResult {
    with_database("client save", options, |_config, pool| save_client(pool, args))
}

async fn save_client(pool: DbPool, args: SaveArgs) -> Result<CommandResult, Failure> {
    let clients = SqlClientRepository::new(pool);

    let stored = match &args.id {
        Some(id) => clients.find_by_id(&ClientId(id.clone())).await.map_err(persistence)?,
        None => None,
    };
    let created = stored.is_none();
    let base = stored.unwrap_or_else(|| Client {
        id: ClientId(args.id.clone().unwrap_or_else(|| UuidIdGenerator.next_id())),
        name: String::new(),
        company_name: String::new(),
        email: String::new(),
        address: String::new(),
        default_rates: RateTable::new(),
    });

    let mut rates = base.default_rates.clone();
    edit_rates(&mut rates, &args.rates, &args.drop_rates)?;

    let client = Client::new(
        base.id.clone(),
        args.name.as_deref().unwrap_or(&base.name),
        args.company.as_deref().unwrap_or(&base.company_name),
        args.email.as_deref().unwrap_or(&base.email),
        args.address.as_deref().unwrap_or(&base.address),
        rates,
    );
    if client.name.is_empty() || client.company_name.is_empty() {
        return Err(invalid_argument("a client needs both a contact name and a company name"));
    }

    clients.save(client.clone()).await.map_err(persistence)?;
    tracing::info!(
        event_name = "cli.client.saved",
        client_id = %client.id,
        created,
        rates = client.default_rates.len(),
        "client saved"
    );

    let verb = if created { "created" } else { "updated" };
    let message = format!("{verb} client {} ({})", client.id, client.company_name);
    Ok(CommandResult::success_with_data("client save", message, &client))
}

/// Cascades to the client's projects and to every quote attached to either.
pub fn delete(options: &LoadOptions, id: &str) -> CommandResult {
    with_database("client delete", options, |_config, pool| delete_client(pool, id))
}

async fn delete_client(pool: DbPool, id: &str) -> Result<CommandResult, Failure> {
    let report = SqlClientRepository::new(pool)
        .delete(&ClientId(id.to_string()))
        .await
        .map_err(persistence)?;

    let message = if report.is_empty() {
        format!("client {id} was already absent")
    } else {
        format!(
            "deleted client {id} with {} project(s) and {} quote(s)",
            report.projects, report.quotes
        )
    };
    Ok(CommandResult::success_with_data("client delete", message, &report))
}

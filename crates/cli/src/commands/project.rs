use devis_core::config::LoadOptions;
use devis_core::domain::client::ClientId;
use devis_core::domain::project::{Project, ProjectId};
use devis_core::domain::rates::RateTable;
use devis_core::{IdGenerator, UuidIdGenerator};
use devis_db::{
    ClientRepository, DbPool, ProjectRepository, SqlClientRepository, SqlProjectRepository,
};

use crate::commands::{
    edit_rates, invalid_argument, not_found, persistence, with_database, CommandResult, Failure,
};

/// Upsert input. Unset fields keep their stored value on update.
#[derive(Debug, Default, clap::Args)]
pub struct SaveArgs {
    #[arg(long, help = "Project id; a new one is generated when omitted")]
    pub id: Option<String>,
    #[arg(long, help = "Owning client id, required for a new project")]
    pub client: Option<String>,
    #[arg(long)]
    pub name: Option<String>,
    #[arg(long, help = "Free-text description; an empty value clears it")]
    pub description: Option<String>,
    #[arg(long = "rate", value_name = "ROLE=PRICE", help = "Set a rate override (repeatable)")]
    pub rates: Vec<String>,
    #[arg(long = "drop-rate", value_name = "ROLE", help = "Remove a rate override (repeatable)")]
    pub drop_rates: Vec<String>,
}

/// Creates or updates a project. A project never changes owner; quotes
/// priced from its overrides are re-priced in the same transaction.
pub fn save(options: &LoadOptions, args: SaveArgs) -> CommandResult {
    with_database("project save", options, |_config, pool| save_project(pool, args))
}

async fn save_project(pool: DbPool, args: SaveArgs) -> Result<CommandResult, Failure> {
    let projects = SqlProjectRepository::new(pool.clone());

    let stored = match &args.id {
        Some(id) => projects.find_by_id(&ProjectId(id.clone())).await.map_err(persistence)?,
        None => None,
    };
    let created = stored.is_none();

    let client_id = match (&stored, &args.client) {
        (Some(project), Some(client)) if project.client_id.0 != *client => {
            return Err(invalid_argument(format!(
                "project {} belongs to client {}; it cannot move to {client}",
                project.id, project.client_id
            )));
        }
        (Some(project), _) => project.client_id.clone(),
        (None, Some(client)) => ClientId(client.clone()),
        (None, None) => return Err(invalid_argument("a new project needs --client")),
    };
    if created {
        SqlClientRepository::new(pool)
            .find_by_id(&client_id)
            .await
            .map_err(persistence)?
            .ok_or_else(|| not_found("client", &client_id.0))?;
    }

    let (id, name, description, mut rates) = match stored {
        Some(project) => (project.id, project.name, project.description, project.specific_rates),
        None => (
            ProjectId(args.id.clone().unwrap_or_else(|| UuidIdGenerator.next_id())),
            String::new(),
            None,
            RateTable::new(),
        ),
    };
    edit_rates(&mut rates, &args.rates, &args.drop_rates)?;

    let project = Project::new(
        id,
        client_id,
        args.name.as_deref().unwrap_or(&name),
        args.description.as_deref().or(description.as_deref()),
        rates,
    );
    if project.name.is_empty() {
        return Err(invalid_argument("a project needs a name"));
    }

    projects.save(project.clone()).await.map_err(persistence)?;
    tracing::info!(
        event_name = "cli.project.saved",
        project_id = %project.id,
        client_id = %project.client_id,
        created,
        overrides = project.specific_rates.len(),
        "project saved"
    );

    let verb = if created { "created" } else { "updated" };
    let message = format!("{verb} project {} ({})", project.id, project.name);
    Ok(CommandResult::success_with_data("project save", message, &project))
}

pub fn delete(options: &LoadOptions, id: &str) -> CommandResult {
    with_database("project delete", options, |_config, pool| delete_project(pool, id))
}

async fn delete_project(pool: DbPool, id: &str) -> Result<CommandResult, Failure> {
    let report = SqlProjectRepository::new(pool)
        .delete(&ProjectId(id.to_string()))
        .await
        .map_err(persistence)?;

    let message = if report.is_empty() {
        format!("project {id} was already absent")
    } else {
        format!("deleted project {id} with {} quote(s)", report.quotes)
    };
    Ok(CommandResult::success_with_data("project delete", message, &report))
}

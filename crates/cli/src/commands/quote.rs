use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use devis_core::config::{AppConfig, LoadOptions};
use devis_core::domain::client::{Client, ClientId};
use devis_core::domain::project::{Project, ProjectId};
use devis_core::domain::quote::{ItemId, Quote, QuoteId, QuoteStatus, SectionId};
use devis_core::export::write_xlsx;
use devis_core::{
    duplicate_quote, resolve_rates, unused_reference, version_family, DomainError,
    DuplicationMode, HtmlRenderer, PrintView, QuoteEditor, QuoteFilter, UuidIdGenerator,
    WorkbookModel,
};
use devis_db::{
    ClientRepository, DbPool, ProjectRepository, QuoteRepository, SqlClientRepository,
    SqlProjectRepository, SqlQuoteRepository,
};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::commands::{
    domain_failure, export_failure, invalid_argument, not_found, persistence, with_database,
    CommandResult, Failure, EXIT_EXPORT,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum ExportFormat {
    Xlsx,
    Html,
}

impl ExportFormat {
    fn extension(self) -> &'static str {
        match self {
            Self::Xlsx => "xlsx",
            Self::Html => "html",
        }
    }
}

#[derive(Debug, Default)]
pub struct ListArgs {
    pub search: Option<String>,
    pub status: Option<String>,
    pub client: Option<String>,
}

#[derive(Debug, Serialize)]
struct QuoteSummary {
    id: String,
    reference: String,
    version: u32,
    status: QuoteStatus,
    client: Option<String>,
    project_id: Option<String>,
    total_amount: Decimal,
    created_at: DateTime<Utc>,
}

impl QuoteSummary {
    fn new(quote: &Quote, clients: &[Client]) -> Self {
        let client = quote
            .client_id
            .as_ref()
            .and_then(|id| clients.iter().find(|client| &client.id == id))
            .map(|client| client.company_name.clone());

        Self {
            id: quote.id.0.clone(),
            reference: quote.reference.clone(),
            version: quote.version,
            status: quote.status,
            client,
            project_id: quote.project_id.as_ref().map(|id| id.0.clone()),
            total_amount: quote.total_amount,
            created_at: quote.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
struct ExportOutput {
    path: PathBuf,
    format: &'static str,
    bytes: usize,
}

#[derive(Debug, Default, clap::Args)]
pub struct NewArgs {
    #[arg(long, help = "Client id")]
    pub client: String,
    #[arg(long, help = "Project id; must belong to the client")]
    pub project: String,
    #[arg(long, help = "Apply 20% VAT")]
    pub vat: bool,
    #[arg(long)]
    pub notes: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum Switch {
    On,
    Off,
}

/// One editing step on a stored quote. Positions are zero-based.
#[derive(Clone, Debug, clap::Subcommand)]
pub enum EditOperation {
    #[command(about = "Append a section holding one empty item")]
    AddSection,
    RenameSection { section: String, title: String },
    DeleteSection { section: String },
    #[command(about = "Copy a section right after itself, with fresh ids")]
    DuplicateSection { section: String },
    MoveSection { from: usize, to: usize },
    AddItem { section: String },
    DescribeItem { section: String, item: String, description: String },
    #[command(about = "Set a role's days on an item; 0 removes the role")]
    SetDays { section: String, item: String, role: String, days: String },
    DuplicateItem { section: String, item: String },
    DeleteItem { section: String, item: String },
    MoveItem { section: String, from: usize, to: usize },
    Vat {
        #[arg(value_enum)]
        state: Switch,
    },
    #[command(about = "Replace the notes; omit the text to clear them")]
    Notes { text: Option<String> },
    #[command(about = "Point the quote at another project of its client")]
    Project { project: String },
}

#[derive(Debug, Serialize)]
struct EditOutput<'a> {
    /// Id of the section or item the operation created, if any.
    created: Option<String>,
    quote: &'a Quote,
}

pub fn list(options: &LoadOptions, args: ListArgs) -> CommandResult {
    with_database("quote list", options, |_config, pool| list_quotes(pool, args))
}

async fn list_quotes(pool: DbPool, args: ListArgs) -> Result<CommandResult, Failure> {
    let status = args
        .status
        .as_deref()
        .map(str::parse::<QuoteStatus>)
        .transpose()
        .map_err(|error| invalid_argument(error.to_string()))?;
    let filter = QuoteFilter { text: args.search, status, client_id: args.client.map(ClientId) };

    let quotes = SqlQuoteRepository::new(pool.clone()).list().await.map_err(persistence)?;
    let clients = SqlClientRepository::new(pool).list().await.map_err(persistence)?;

    let summaries = filter
        .apply(&quotes, &clients)
        .into_iter()
        .map(|quote| QuoteSummary::new(quote, &clients))
        .collect::<Vec<_>>();
    let message = format!("{} of {} quotes match", summaries.len(), quotes.len());
    Ok(CommandResult::success_with_data("quote list", message, &summaries))
}

/// A stored quote with the client and project it points at, when they still exist.
struct QuoteContext {
    quote: Quote,
    client: Option<Client>,
    project: Option<Project>,
}

impl QuoteContext {
    async fn load(pool: &DbPool, id: &str) -> Result<Self, Failure> {
        let quote = SqlQuoteRepository::new(pool.clone())
            .find_by_id(&QuoteId(id.to_string()))
            .await
            .map_err(persistence)?
            .ok_or_else(|| not_found("quote", id))?;

        let client = match &quote.client_id {
            Some(client_id) => SqlClientRepository::new(pool.clone())
                .find_by_id(client_id)
                .await
                .map_err(persistence)?,
            None => None,
        };
        let project = match &quote.project_id {
            Some(project_id) => SqlProjectRepository::new(pool.clone())
                .find_by_id(project_id)
                .await
                .map_err(persistence)?,
            None => None,
        };

        Ok(Self { quote, client, project })
    }

    fn into_editor(self) -> QuoteEditor {
        QuoteEditor::open(self.quote, self.client, self.project, UuidIdGenerator)
    }

    fn print_view(&self) -> PrintView {
        let rates = resolve_rates(self.client.as_ref(), self.project.as_ref());
        PrintView::build(&self.quote, &rates, self.client.as_ref(), self.project.as_ref())
    }
}

pub fn show(options: &LoadOptions, id: &str) -> CommandResult {
    with_database("quote show", options, |_config, pool| show_quote(pool, id))
}

async fn show_quote(pool: DbPool, id: &str) -> Result<CommandResult, Failure> {
    let context = QuoteContext::load(&pool, id).await?;
    let view = context.print_view();

    let message = format!(
        "{} v{}: {} HT, {} payable",
        view.header.reference,
        view.header.version,
        view.total_ht.normalize(),
        view.payable.normalize()
    );
    Ok(CommandResult::success_with_data("quote show", message, &view))
}

pub fn versions(options: &LoadOptions, reference: &str) -> CommandResult {
    with_database("quote versions", options, |_config, pool| list_versions(pool, reference))
}

async fn list_versions(pool: DbPool, reference: &str) -> Result<CommandResult, Failure> {
    let stored = SqlQuoteRepository::new(pool.clone())
        .list_by_reference(reference)
        .await
        .map_err(persistence)?;
    let family = version_family(reference, &stored);
    if family.is_empty() {
        return Err(not_found("reference", reference));
    }

    let clients = SqlClientRepository::new(pool).list().await.map_err(persistence)?;
    let summaries =
        family.into_iter().map(|quote| QuoteSummary::new(quote, &clients)).collect::<Vec<_>>();
    let message = format!("{reference} has {} version(s)", summaries.len());
    Ok(CommandResult::success_with_data("quote versions", message, &summaries))
}

pub fn duplicate(options: &LoadOptions, id: &str, mode: &str) -> CommandResult {
    with_database("quote duplicate", options, |_config, pool| duplicate_stored(pool, id, mode))
}

async fn duplicate_stored(pool: DbPool, id: &str, mode: &str) -> Result<CommandResult, Failure> {
    let mode = mode.parse::<DuplicationMode>().map_err(invalid_argument)?;
    let quotes = SqlQuoteRepository::new(pool);

    let source = quotes
        .find_by_id(&QuoteId(id.to_string()))
        .await
        .map_err(persistence)?
        .ok_or_else(|| not_found("quote", id))?;
    let existing = quotes.list().await.map_err(persistence)?;

    let duplicate = duplicate_quote(&source, &existing, mode, &UuidIdGenerator, Utc::now())
        .map_err(domain_failure)?;
    let summary = QuoteSummary::new(&duplicate, &[]);
    quotes.save(duplicate).await.map_err(persistence)?;

    let message = format!(
        "duplicated {} v{} as {} v{}",
        source.reference, source.version, summary.reference, summary.version
    );
    Ok(CommandResult::success_with_data("quote duplicate", message, &summary))
}

pub fn new(options: &LoadOptions, args: NewArgs) -> CommandResult {
    with_database("quote new", options, |config, pool| create_quote(config, pool, args))
}

async fn create_quote(
    config: AppConfig,
    pool: DbPool,
    args: NewArgs,
) -> Result<CommandResult, Failure> {
    let client = SqlClientRepository::new(pool.clone())
        .find_by_id(&ClientId(args.client.clone()))
        .await
        .map_err(persistence)?
        .ok_or_else(|| not_found("client", &args.client))?;
    let project = SqlProjectRepository::new(pool.clone())
        .find_by_id(&ProjectId(args.project.clone()))
        .await
        .map_err(persistence)?
        .ok_or_else(|| not_found("project", &args.project))?;

    let quotes = SqlQuoteRepository::new(pool);
    let existing = quotes.list().await.map_err(persistence)?;
    let now = Utc::now();
    let reference =
        unused_reference(&config.quote.reference_prefix, now, &existing, &mut rand::thread_rng())
            .map_err(domain_failure)?;
    let draft = Quote::draft(
        &UuidIdGenerator,
        reference,
        i64::from(config.quote.validity_days),
        now,
    );

    let mut editor = QuoteEditor::open(draft, None, None, UuidIdGenerator);
    editor.select_client(Some(client));
    editor.select_project(Some(project)).map_err(domain_failure)?;
    editor.set_vat(args.vat);
    editor.set_notes(args.notes);
    let quote = editor.prepare_save(now).map_err(domain_failure)?;

    quotes.save(quote.clone()).await.map_err(persistence)?;
    tracing::info!(
        event_name = "cli.quote.created",
        quote_id = %quote.id,
        reference = %quote.reference,
        valid_until = %quote.valid_until,
        "draft quote created"
    );

    let message = format!("created draft {} v{}", quote.reference, quote.version);
    Ok(CommandResult::success_with_data("quote new", message, &quote))
}

pub fn status(options: &LoadOptions, id: &str, status: &str) -> CommandResult {
    with_database("quote status", options, |_config, pool| change_status(pool, id, status))
}

async fn change_status(pool: DbPool, id: &str, status: &str) -> Result<CommandResult, Failure> {
    let status =
        status.parse::<QuoteStatus>().map_err(|error| invalid_argument(error.to_string()))?;
    let context = QuoteContext::load(&pool, id).await?;
    let previous = context.quote.status;

    let mut editor = context.into_editor();
    editor.set_status(status);
    let quote = editor.prepare_save(Utc::now()).map_err(domain_failure)?;
    SqlQuoteRepository::new(pool).save(quote.clone()).await.map_err(persistence)?;

    tracing::info!(
        event_name = "cli.quote.status_changed",
        quote_id = %quote.id,
        from = %previous,
        to = %quote.status,
        "quote status changed"
    );
    let message = format!("{} v{}: {previous} -> {}", quote.reference, quote.version, quote.status);
    Ok(CommandResult::success_with_data("quote status", message, &QuoteSummary::new(&quote, &[])))
}

pub fn edit(options: &LoadOptions, id: &str, operation: EditOperation) -> CommandResult {
    with_database("quote edit", options, |_config, pool| edit_stored(pool, id, operation))
}

async fn edit_stored(
    pool: DbPool,
    id: &str,
    operation: EditOperation,
) -> Result<CommandResult, Failure> {
    let context = QuoteContext::load(&pool, id).await?;

    let project = match &operation {
        EditOperation::Project { project } => Some(
            SqlProjectRepository::new(pool.clone())
                .find_by_id(&ProjectId(project.clone()))
                .await
                .map_err(persistence)?
                .ok_or_else(|| not_found("project", project))?,
        ),
        _ => None,
    };

    let mut editor = context.into_editor();
    let created = apply_edit(&mut editor, operation, project).map_err(|error| match error {
        EditError::Domain(error) => domain_failure(error),
        EditError::Argument(message) => invalid_argument(message),
    })?;
    let quote = editor.prepare_save(Utc::now()).map_err(domain_failure)?;
    SqlQuoteRepository::new(pool).save(quote.clone()).await.map_err(persistence)?;

    tracing::info!(
        event_name = "cli.quote.edited",
        quote_id = %quote.id,
        total_amount = %quote.total_amount,
        "quote edited"
    );
    let message = format!(
        "{} v{} saved, {} HT",
        quote.reference,
        quote.version,
        quote.total_amount.normalize()
    );
    let output = EditOutput { created, quote: &quote };
    Ok(CommandResult::success_with_data("quote edit", message, &output))
}

#[derive(Debug)]
enum EditError {
    Domain(DomainError),
    Argument(String),
}

impl From<DomainError> for EditError {
    fn from(value: DomainError) -> Self {
        Self::Domain(value)
    }
}

/// Runs one operation; returns the id of whatever it created.
fn apply_edit(
    editor: &mut QuoteEditor,
    operation: EditOperation,
    project: Option<Project>,
) -> Result<Option<String>, EditError> {
    let created = match operation {
        EditOperation::AddSection => Some(editor.add_section().0),
        EditOperation::RenameSection { section: id, title } => {
            editor.rename_section(&SectionId(id), &title)?;
            None
        }
        EditOperation::DeleteSection { section: id } => {
            editor.delete_section(&SectionId(id))?;
            None
        }
        EditOperation::DuplicateSection { section: id } => {
            Some(editor.duplicate_section(&SectionId(id))?.0)
        }
        EditOperation::MoveSection { from, to } => {
            editor.move_section(from, to)?;
            None
        }
        EditOperation::AddItem { section: id } => Some(editor.add_item(&SectionId(id))?.0),
        EditOperation::DescribeItem { section: section_id, item: item_id, description } => {
            editor.set_item_description(&SectionId(section_id), &ItemId(item_id), &description)?;
            None
        }
        EditOperation::SetDays { section: section_id, item: item_id, role, days } => {
            let days = days
                .trim()
                .parse::<Decimal>()
                .map_err(|error| EditError::Argument(format!("days `{days}`: {error}")))?;
            editor.set_item_days(&SectionId(section_id), &ItemId(item_id), &role, days)?;
            None
        }
        EditOperation::DuplicateItem { section: section_id, item: item_id } => {
            Some(editor.duplicate_item(&SectionId(section_id), &ItemId(item_id))?.0)
        }
        EditOperation::DeleteItem { section: section_id, item: item_id } => {
            editor.delete_item(&SectionId(section_id), &ItemId(item_id))?;
            None
        }
        EditOperation::MoveItem { section: id, from, to } => {
            editor.move_item(&SectionId(id), from, to)?;
            None
        }
        EditOperation::Vat { state } => {
            editor.set_vat(state == Switch::On);
            None
        }
        EditOperation::Notes { text } => {
            editor.set_notes(text);
            None
        }
        EditOperation::Project { .. } => {
            editor.select_project(project)?;
            None
        }
    };
    Ok(created)
}

pub fn export(
    options: &LoadOptions,
    id: &str,
    format: ExportFormat,
    output: Option<PathBuf>,
) -> CommandResult {
    with_database("quote export", options, |config, pool| {
        export_quote(config, pool, id, format, output)
    })
}

async fn export_quote(
    config: AppConfig,
    pool: DbPool,
    id: &str,
    format: ExportFormat,
    output: Option<PathBuf>,
) -> Result<CommandResult, Failure> {
    let context = QuoteContext::load(&pool, id).await?;
    let rates = resolve_rates(context.client.as_ref(), context.project.as_ref());

    let bytes = match format {
        ExportFormat::Xlsx => {
            let model = WorkbookModel::build(
                &context.quote,
                &rates,
                context.client.as_ref(),
                context.project.as_ref(),
                &config.export.sheet_name,
            );
            write_xlsx(&model, &config.export.currency_symbol)
                .map_err(export_failure)?
        }
        ExportFormat::Html => {
            let renderer = HtmlRenderer::new(config.export.currency_symbol.as_str())
                .map_err(export_failure)?;
            renderer
                .render(&context.print_view())
                .map_err(export_failure)?
                .into_bytes()
        }
    };

    let path = output.unwrap_or_else(|| {
        default_export_path(&config.export.output_dir, &context.quote, format)
    });
    tokio::fs::write(&path, &bytes)
        .await
        .map_err(|error| {
            let message = format!("could not write `{}`: {error}", path.display());
            ("export", message, EXIT_EXPORT)
        })?;

    tracing::info!(
        event_name = "cli.quote.exported",
        quote_id = %context.quote.id,
        format = format.extension(),
        path = %path.display(),
        bytes = bytes.len(),
        "quote exported"
    );

    let message = format!("wrote {}", path.display());
    let output = ExportOutput { path, format: format.extension(), bytes: bytes.len() };
    Ok(CommandResult::success_with_data("quote export", message, &output))
}

/// `<output_dir>/<reference>-v<version>.<ext>`, with the reference reduced to
/// filename-safe characters.
fn default_export_path(output_dir: &Path, quote: &Quote, format: ExportFormat) -> PathBuf {
    let stem = quote
        .reference
        .chars()
        .map(|ch| if ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' { ch } else { '_' })
        .collect::<String>();
    output_dir.join(format!("{stem}-v{}.{}", quote.version, format.extension()))
}

pub fn delete(options: &LoadOptions, id: &str) -> CommandResult {
    with_database("quote delete", options, |_config, pool| delete_quote(pool, id))
}

async fn delete_quote(pool: DbPool, id: &str) -> Result<CommandResult, Failure> {
    let removed = SqlQuoteRepository::new(pool)
        .delete(&QuoteId(id.to_string()))
        .await
        .map_err(persistence)?;

    let message = if removed {
        format!("deleted quote {id}")
    } else {
        format!("quote {id} was already absent")
    };
    let data = serde_json::json!({ "removed": removed });
    Ok(CommandResult::success_with_data("quote delete", message, &data))
}

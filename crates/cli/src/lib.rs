pub mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use devis_core::config::{AppConfig, ConfigOverrides, LoadOptions, LogFormat, LoggingConfig};

use crate::commands::{client, config, doctor, migrate, project, quote, seed, stats, CommandResult};

#[derive(Debug, Parser)]
#[command(
    name = "devis",
    about = "Devis quotation builder CLI",
    long_about = "Manage quotes, clients and projects, and export quotes to print HTML or a live-formula xlsx workbook.",
    after_help = "Examples:\n  devis migrate\n  devis seed\n  devis quote new --client c1 --project p1 --vat\n  devis quote export q1 --format xlsx\n  devis stats"
)]
pub struct Cli {
    #[command(flatten)]
    global: GlobalArgs,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Args)]
struct GlobalArgs {
    #[arg(long, global = true, help = "Path to a devis.toml config file")]
    config: Option<PathBuf>,
    #[arg(long, global = true, help = "Override database.url")]
    database_url: Option<String>,
    #[arg(long, global = true, help = "Override logging.level")]
    log_level: Option<String>,
    #[arg(long, global = true, help = "Override logging.format (compact|pretty|json)")]
    log_format: Option<LogFormat>,
    #[arg(long, global = true, help = "Override export.output_dir")]
    output_dir: Option<PathBuf>,
}

impl GlobalArgs {
    fn load_options(&self) -> LoadOptions {
        LoadOptions {
            config_path: self.config.clone(),
            require_file: self.config.is_some(),
            overrides: ConfigOverrides {
                database_url: self.database_url.clone(),
                log_level: self.log_level.clone(),
                log_format: self.log_format,
                output_dir: self.output_dir.clone(),
            },
        }
    }
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations")]
    Migrate,
    #[command(about = "Load and verify the demo clients, projects and quote")]
    Seed,
    #[command(about = "Show effective configuration values with their source")]
    Config,
    #[command(about = "Validate config and database connectivity")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(subcommand, about = "Create, edit, duplicate and export quotes")]
    Quote(QuoteCommand),
    #[command(subcommand, about = "Manage clients")]
    Client(ClientCommand),
    #[command(subcommand, about = "Manage projects")]
    Project(ProjectCommand),
    #[command(about = "Portfolio revenue, pipeline and acceptance figures")]
    Stats,
}

#[derive(Debug, Subcommand)]
enum QuoteCommand {
    #[command(about = "List quotes, newest first")]
    List {
        #[arg(long, help = "Match reference or client company, case-insensitive")]
        search: Option<String>,
        #[arg(long, help = "Only quotes with this status (e.g. DRAFT, SENT)")]
        status: Option<String>,
        #[arg(long, help = "Only quotes for this client id")]
        client: Option<String>,
    },
    #[command(about = "Create a draft quote for a client and project")]
    New(quote::NewArgs),
    #[command(about = "Show a priced quote")]
    Show { id: String },
    #[command(about = "Change a quote's status (e.g. SENT, ACCEPTED)")]
    Status { id: String, status: String },
    #[command(about = "Apply one editing step to a quote and save it")]
    Edit {
        id: String,
        #[command(subcommand)]
        operation: quote::EditOperation,
    },
    #[command(about = "List every version sharing a reference")]
    Versions { reference: String },
    #[command(about = "Duplicate a quote as a new version or an independent copy")]
    Duplicate {
        id: String,
        #[arg(long, default_value = "version", help = "version|copy")]
        mode: String,
    },
    #[command(about = "Export a quote to xlsx (live formulas) or printable HTML")]
    Export {
        id: String,
        #[arg(long, value_enum, default_value = "xlsx")]
        format: quote::ExportFormat,
        #[arg(long, help = "Output file; defaults to <output_dir>/<reference>-v<version>.<ext>")]
        output: Option<PathBuf>,
    },
    #[command(about = "Delete a quote")]
    Delete { id: String },
}

#[derive(Debug, Subcommand)]
enum ClientCommand {
    #[command(about = "Create or update a client and its default daily rates")]
    Save(client::SaveArgs),
    #[command(about = "Delete a client with its projects and quotes")]
    Delete { id: String },
}

#[derive(Debug, Subcommand)]
enum ProjectCommand {
    #[command(about = "Create or update a project and its rate overrides")]
    Save(project::SaveArgs),
    #[command(about = "Delete a project with its quotes")]
    Delete { id: String },
}

pub fn run() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    let options = cli.global.load_options();

    // A broken config is reported by the command itself; logging falls back to defaults.
    let logging = AppConfig::load(options.clone())
        .map(|config| config.logging)
        .unwrap_or_else(|_| AppConfig::default().logging);
    init_logging(&logging)?;

    let result = dispatch(cli.command, &options);
    println!("{}", result.output);
    Ok(ExitCode::from(result.exit_code))
}

fn dispatch(command: Command, options: &LoadOptions) -> CommandResult {
    match command {
        Command::Migrate => migrate::run(options),
        Command::Seed => seed::run(options),
        Command::Config => CommandResult { exit_code: 0, output: config::run(options) },
        Command::Doctor { json } => doctor::run(options, json),
        Command::Quote(QuoteCommand::List { search, status, client }) => {
            quote::list(options, quote::ListArgs { search, status, client })
        }
        Command::Quote(QuoteCommand::New(args)) => quote::new(options, args),
        Command::Quote(QuoteCommand::Show { id }) => quote::show(options, &id),
        Command::Quote(QuoteCommand::Status { id, status }) => quote::status(options, &id, &status),
        Command::Quote(QuoteCommand::Edit { id, operation }) => quote::edit(options, &id, operation),
        Command::Quote(QuoteCommand::Versions { reference }) => quote::versions(options, &reference),
        Command::Quote(QuoteCommand::Duplicate { id, mode }) => quote::duplicate(options, &id, &mode),
        Command::Quote(QuoteCommand::Export { id, format, output }) => {
            quote::export(options, &id, format, output)
        }
        Command::Quote(QuoteCommand::Delete { id }) => quote::delete(options, &id),
        Command::Client(ClientCommand::Save(args)) => client::save(options, args),
        Command::Client(ClientCommand::Delete { id }) => client::delete(options, &id),
        Command::Project(ProjectCommand::Save(args)) => project::save(options, args),
        Command::Project(ProjectCommand::Delete { id }) => project::delete(options, &id),
        Command::Stats => stats::run(options),
    }
}

/// Logs go to stderr so stdout carries only the command's JSON result.
fn init_logging(config: &LoggingConfig) -> anyhow::Result<()> {
    use tracing::Level;

    let log_level = config.level.parse::<Level>().unwrap_or(Level::INFO);
    let builder = tracing_subscriber::fmt()
        .with_target(false)
        .with_max_level(log_level)
        .with_writer(std::io::stderr);

    let installed = match config.format {
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
    installed.map_err(|error| anyhow::anyhow!(error)).context("failed to install log subscriber")
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::{Cli, ClientCommand, Command, QuoteCommand};
    use crate::commands::quote::{EditOperation, ExportFormat, Switch};

    #[test]
    fn parses_export_with_global_overrides() {
        let cli = Cli::try_parse_from([
            "devis",
            "quote",
            "export",
            "q1",
            "--format",
            "html",
            "--database-url",
            "sqlite::memory:",
        ])
        .expect("parse");

        assert_eq!(cli.global.database_url.as_deref(), Some("sqlite::memory:"));
        assert!(matches!(
            cli.command,
            Command::Quote(QuoteCommand::Export { ref id, format: ExportFormat::Html, output: None })
                if id == "q1"
        ));
    }

    #[test]
    fn duplicate_defaults_to_version_mode() {
        let cli = Cli::try_parse_from(["devis", "quote", "duplicate", "q1"]).expect("parse");
        assert!(matches!(
            cli.command,
            Command::Quote(QuoteCommand::Duplicate { ref mode, .. }) if mode == "version"
        ));
    }

    #[test]
    fn explicit_config_file_is_required_to_exist() {
        let cli = Cli::try_parse_from(["devis", "--config", "missing.toml", "stats"]).expect("parse");
        let options = cli.global.load_options();
        assert!(options.require_file);
        assert_eq!(options.config_path.as_deref(), Some(std::path::Path::new("missing.toml")));
    }

    #[test]
    fn parses_edit_operations_as_nested_subcommands() {
        let cli = Cli::try_parse_from([
            "devis", "quote", "edit", "q1", "set-days", "s2", "i3", "Chef de projet", "1.5",
        ])
        .expect("parse");
        assert!(matches!(
            cli.command,
            Command::Quote(QuoteCommand::Edit {
                operation: EditOperation::SetDays { ref role, ref days, .. },
                ..
            }) if role == "Chef de projet" && days == "1.5"
        ));

        let cli = Cli::try_parse_from(["devis", "quote", "edit", "q1", "vat", "off"]).expect("parse");
        assert!(matches!(
            cli.command,
            Command::Quote(QuoteCommand::Edit { operation: EditOperation::Vat { state: Switch::Off }, .. })
        ));
    }

    #[test]
    fn client_save_collects_repeated_rates() {
        let cli = Cli::try_parse_from([
            "devis", "client", "save", "--id", "c9", "--rate", "Dev=500", "--rate", "QA=400",
            "--drop-rate", "SRE",
        ])
        .expect("parse");
        assert!(matches!(
            cli.command,
            Command::Client(ClientCommand::Save(ref args))
                if args.rates == ["Dev=500", "QA=400"] && args.drop_rates == ["SRE"]
        ));
    }

    #[test]
    fn quote_new_requires_client_and_project() {
        assert!(Cli::try_parse_from(["devis", "quote", "new", "--client", "c1"]).is_err());
        let cli = Cli::try_parse_from(["devis", "quote", "new", "--client", "c1", "--project", "p1"])
            .expect("parse");
        assert!(matches!(
            cli.command,
            Command::Quote(QuoteCommand::New(ref args)) if !args.vat && args.notes.is_none()
        ));
    }
}

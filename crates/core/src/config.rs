use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_CONFIG_FILE: &str = "devis.toml";

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
    pub quote: QuoteConfig,
    pub export: ExportConfig,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct QuoteConfig {
    /// First segment of generated references, e.g. `DEV` in `DEV-2026-4821`.
    pub reference_prefix: String,
    pub validity_days: u32,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ExportConfig {
    pub currency_symbol: String,
    pub sheet_name: String,
    pub output_dir: PathBuf,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub log_level: Option<String>,
    pub log_format: Option<LogFormat>,
    pub output_dir: Option<PathBuf>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://devis.db?mode=rwc".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
            quote: QuoteConfig { reference_prefix: "DEV".to_string(), validity_days: 30 },
            export: ExportConfig {
                currency_symbol: "€".to_string(),
                sheet_name: "Chiffrage".to_string(),
                output_dir: PathBuf::from("."),
            },
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected =
                options.config_path.unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(database) = patch.database {
            if let Some(url) = database.url {
                self.database.url = url;
            }
            if let Some(max_connections) = database.max_connections {
                self.database.max_connections = max_connections;
            }
            if let Some(timeout_secs) = database.timeout_secs {
                self.database.timeout_secs = timeout_secs;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }

        if let Some(quote) = patch.quote {
            if let Some(reference_prefix) = quote.reference_prefix {
                self.quote.reference_prefix = reference_prefix;
            }
            if let Some(validity_days) = quote.validity_days {
                self.quote.validity_days = validity_days;
            }
        }

        if let Some(export) = patch.export {
            if let Some(currency_symbol) = export.currency_symbol {
                self.export.currency_symbol = currency_symbol;
            }
            if let Some(sheet_name) = export.sheet_name {
                self.export.sheet_name = sheet_name;
            }
            if let Some(output_dir) = export.output_dir {
                self.export.output_dir = output_dir;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("DEVIS_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("DEVIS_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = parse_u32("DEVIS_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("DEVIS_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_u64("DEVIS_DATABASE_TIMEOUT_SECS", &value)?;
        }

        let log_level = read_env("DEVIS_LOGGING_LEVEL").or_else(|| read_env("DEVIS_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format = read_env("DEVIS_LOGGING_FORMAT").or_else(|| read_env("DEVIS_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        if let Some(value) = read_env("DEVIS_QUOTE_REFERENCE_PREFIX") {
            self.quote.reference_prefix = value;
        }
        if let Some(value) = read_env("DEVIS_QUOTE_VALIDITY_DAYS") {
            self.quote.validity_days = parse_u32("DEVIS_QUOTE_VALIDITY_DAYS", &value)?;
        }

        if let Some(value) = read_env("DEVIS_EXPORT_CURRENCY_SYMBOL") {
            self.export.currency_symbol = value;
        }
        if let Some(value) = read_env("DEVIS_EXPORT_SHEET_NAME") {
            self.export.sheet_name = value;
        }
        if let Some(value) = read_env("DEVIS_EXPORT_OUTPUT_DIR") {
            self.export.output_dir = PathBuf::from(value);
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(database_url) = overrides.database_url {
            self.database.url = database_url;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(log_format) = overrides.log_format {
            self.logging.format = log_format;
        }
        if let Some(output_dir) = overrides.output_dir {
            self.export.output_dir = output_dir;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_database(&self.database)?;
        validate_logging(&self.logging)?;
        validate_quote(&self.quote)?;
        validate_export(&self.export)?;
        Ok(())
    }
}

/// First existing config file: the explicit path, else `devis.toml`, else `config/devis.toml`.
pub fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from(DEFAULT_CONFIG_FILE), Path::new("config").join(DEFAULT_CONFIG_FILE)]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_database(database: &DatabaseConfig) -> Result<(), ConfigError> {
    let url = database.url.trim();
    let sqlite_url =
        url.starts_with("sqlite://") || url.starts_with("sqlite::") || url == ":memory:";
    if !sqlite_url {
        return Err(ConfigError::Validation(
            "database.url must be a sqlite URL (`sqlite://...`, `sqlite::...`, or `:memory:`)"
                .to_string(),
        ));
    }

    if database.max_connections == 0 {
        return Err(ConfigError::Validation(
            "database.max_connections must be greater than zero".to_string(),
        ));
    }

    if database.timeout_secs == 0 || database.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "database.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn validate_quote(quote: &QuoteConfig) -> Result<(), ConfigError> {
    let prefix = quote.reference_prefix.trim();
    if prefix.is_empty() || !prefix.chars().all(|ch| ch.is_ascii_alphanumeric() || ch == '_') {
        return Err(ConfigError::Validation(
            "quote.reference_prefix must be non-empty and use only letters, digits or `_`"
                .to_string(),
        ));
    }

    if quote.validity_days == 0 || quote.validity_days > 365 {
        return Err(ConfigError::Validation(
            "quote.validity_days must be in range 1..=365".to_string(),
        ));
    }

    Ok(())
}

fn validate_export(export: &ExportConfig) -> Result<(), ConfigError> {
    if export.currency_symbol.trim().is_empty() {
        return Err(ConfigError::Validation(
            "export.currency_symbol must not be empty".to_string(),
        ));
    }

    let sheet_name = export.sheet_name.trim();
    let forbidden = ['[', ']', ':', '*', '?', '/', '\\'];
    if sheet_name.is_empty()
        || sheet_name.chars().count() > 31
        || sheet_name.contains(forbidden.as_slice())
    {
        return Err(ConfigError::Validation(
            "export.sheet_name must be 1..=31 characters without []:*?/\\".to_string(),
        ));
    }

    if export.output_dir.as_os_str().is_empty() {
        return Err(ConfigError::Validation("export.output_dir must not be empty".to_string()));
    }

    Ok(())
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    logging: Option<LoggingPatch>,
    quote: Option<QuotePatch>,
    export: Option<ExportPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

#[derive(Debug, Default, Deserialize)]
struct QuotePatch {
    reference_prefix: Option<String>,
    validity_days: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct ExportPatch {
    currency_symbol: Option<String>,
    sheet_name: Option<String>,
    output_dir: Option<PathBuf>,
}

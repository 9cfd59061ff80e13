use std::env;
use std::fs;
use std::path::Path;

use devis_core::config::{resolve_config_path, AppConfig, LoadOptions};
use toml::Value;

struct Field {
    key: &'static str,
    value: String,
    env_keys: &'static [&'static str],
    /// CLI flag that can override this field, and whether it was given.
    flag: Option<(&'static str, bool)>,
}

fn field(key: &'static str, value: impl ToString, env_keys: &'static [&'static str]) -> Field {
    Field { key, value: value.to_string(), env_keys, flag: None }
}

pub fn run(options: &LoadOptions) -> String {
    let config = match AppConfig::load(options.clone()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = resolve_config_path(options.config_path.as_deref());
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());
    let overrides = &options.overrides;

    let fields = [
        Field {
            flag: Some(("--database-url", overrides.database_url.is_some())),
            ..field("database.url", &config.database.url, &["DEVIS_DATABASE_URL"])
        },
        field(
            "database.max_connections",
            config.database.max_connections,
            &["DEVIS_DATABASE_MAX_CONNECTIONS"],
        ),
        field("database.timeout_secs", config.database.timeout_secs, &["DEVIS_DATABASE_TIMEOUT_SECS"]),
        Field {
            flag: Some(("--log-level", overrides.log_level.is_some())),
            ..field("logging.level", &config.logging.level, &["DEVIS_LOGGING_LEVEL", "DEVIS_LOG_LEVEL"])
        },
        Field {
            flag: Some(("--log-format", overrides.log_format.is_some())),
            ..field(
                "logging.format",
                format!("{:?}", config.logging.format).to_lowercase(),
                &["DEVIS_LOGGING_FORMAT", "DEVIS_LOG_FORMAT"],
            )
        },
        field("quote.reference_prefix", &config.quote.reference_prefix, &["DEVIS_QUOTE_REFERENCE_PREFIX"]),
        field("quote.validity_days", config.quote.validity_days, &["DEVIS_QUOTE_VALIDITY_DAYS"]),
        field("export.currency_symbol", &config.export.currency_symbol, &["DEVIS_EXPORT_CURRENCY_SYMBOL"]),
        field("export.sheet_name", &config.export.sheet_name, &["DEVIS_EXPORT_SHEET_NAME"]),
        Field {
            flag: Some(("--output-dir", overrides.output_dir.is_some())),
            ..field(
                "export.output_dir",
                config.export.output_dir.display(),
                &["DEVIS_EXPORT_OUTPUT_DIR"],
            )
        },
    ];

    let mut lines =
        vec!["effective config (source precedence: flag > env > file > default):".to_string()];
    for field in &fields {
        let source = field_source(field, config_file_doc.as_ref(), config_file_path.as_deref());
        lines.push(render_line(field.key, &field.value, source));
    }
    lines.join("\n")
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    field: &Field,
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some((flag, true)) = field.flag {
        return format!("flag ({flag})");
    }

    if let Some(env_key) = field.env_keys.iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, field.key) {
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

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

#[cfg(test)]
mod tests {
    use toml::Value;

    use super::contains_path;

    #[test]
    fn nested_keys_are_found_in_the_file_document() {
        let doc = "[export]\nsheet_name = \"Devis\"\n".parse::<Value>().expect("toml");

        assert!(contains_path(&doc, "export.sheet_name"));
        assert!(!contains_path(&doc, "export.currency_symbol"));
        assert!(!contains_path(&doc, "database.url"));
    }
}

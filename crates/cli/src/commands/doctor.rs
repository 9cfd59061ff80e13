use devis_core::config::{AppConfig, LoadOptions};
use devis_core::HtmlRenderer;
use devis_db::connect_with_settings;
use serde::Serialize;

use crate::commands::CommandResult;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: CheckStatus,
    details: String,
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

pub fn run(options: &LoadOptions, json_output: bool) -> CommandResult {
    let report = build_report(options);
    let exit_code = if report.overall_status == CheckStatus::Pass { 0 } else { 1 };

    let output = if json_output {
        serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        })
    } else {
        render_human(&report)
    };

    CommandResult { exit_code, output }
}

fn build_report(options: &LoadOptions) -> DoctorReport {
    let mut checks = Vec::new();

    match AppConfig::load(options.clone()) {
        Ok(config) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Pass,
                details: "configuration loaded and validated".to_string(),
            });
            checks.push(check_database_connectivity(&config));
            checks.push(check_output_dir(&config));
        }
        Err(error) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Fail,
                details: error.to_string(),
            });
            for name in ["database_connectivity", "output_dir"] {
                checks.push(DoctorCheck {
                    name,
                    status: CheckStatus::Skipped,
                    details: "skipped because configuration did not load".to_string(),
                });
            }
        }
    }

    checks.push(check_print_template());
    checks.push(check_spreadsheet_writer());

    let all_pass = checks.iter().all(|check| check.status != CheckStatus::Fail);
    let overall_status = if all_pass { CheckStatus::Pass } else { CheckStatus::Fail };
    let summary = if all_pass {
        "doctor: all readiness checks passed".to_string()
    } else {
        "doctor: one or more readiness checks failed".to_string()
    };

    DoctorReport { overall_status, summary, checks }
}

fn check_database_connectivity(config: &AppConfig) -> DoctorCheck {
    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return DoctorCheck {
                name: "database_connectivity",
                status: CheckStatus::Fail,
                details: format!("failed to initialize async runtime: {error}"),
            };
        }
    };

    let result = runtime.block_on(async {
        let pool = connect_with_settings(
            &config.database.url,
            config.database.max_connections,
            config.database.timeout_secs,
        )
        .await
        .map_err(|error| format!("failed to connect to database: {error}"))?;

        pool.close().await;
        Ok::<(), String>(())
    });

    match result {
        Ok(()) => DoctorCheck {
            name: "database_connectivity",
            status: CheckStatus::Pass,
            details: format!("connected using `{}`", config.database.url),
        },
        Err(error) => {
            DoctorCheck { name: "database_connectivity", status: CheckStatus::Fail, details: error }
        }
    }
}

fn check_output_dir(config: &AppConfig) -> DoctorCheck {
    let dir = &config.export.output_dir;
    if dir.is_dir() {
        DoctorCheck {
            name: "output_dir",
            status: CheckStatus::Pass,
            details: format!("exports are written to `{}`", dir.display()),
        }
    } else {
        DoctorCheck {
            name: "output_dir",
            status: CheckStatus::Fail,
            details: format!("`{}` is not an existing directory", dir.display()),
        }
    }
}

fn check_print_template() -> DoctorCheck {
    match HtmlRenderer::new("€") {
        Ok(_) => DoctorCheck {
            name: "print_template",
            status: CheckStatus::Pass,
            details: "print template compiled".to_string(),
        },
        Err(error) => {
            DoctorCheck { name: "print_template", status: CheckStatus::Fail, details: error.to_string() }
        }
    }
}

fn check_spreadsheet_writer() -> DoctorCheck {
    if cfg!(feature = "xlsx") {
        DoctorCheck {
            name: "spreadsheet_writer",
            status: CheckStatus::Pass,
            details: "xlsx export is built in".to_string(),
        }
    } else {
        DoctorCheck {
            name: "spreadsheet_writer",
            status: CheckStatus::Skipped,
            details: "built without the `xlsx` feature; only HTML export is available".to_string(),
        }
    }
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = Vec::new();
    lines.push(report.summary.clone());

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("- [{marker}] {}: {}", check.name, check.details));
    }

    lines.join("\n")
}

fn escape_json(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
    use super::{render_human, CheckStatus, DoctorCheck, DoctorReport};

    #[test]
    fn human_report_marks_each_check() {
        let report = DoctorReport {
            overall_status: CheckStatus::Fail,
            summary: "doctor: one or more readiness checks failed".to_string(),
            checks: vec![
                DoctorCheck { name: "config_validation", status: CheckStatus::Pass, details: "ok".into() },
                DoctorCheck { name: "output_dir", status: CheckStatus::Fail, details: "missing".into() },
                DoctorCheck { name: "spreadsheet_writer", status: CheckStatus::Skipped, details: "off".into() },
            ],
        };

        let rendered = render_human(&report);
        assert!(rendered.starts_with("doctor: one or more"));
        assert!(rendered.contains("- [ok] config_validation: ok"));
        assert!(rendered.contains("- [fail] output_dir: missing"));
        assert!(rendered.contains("- [skip] spreadsheet_writer: off"));
    }
}

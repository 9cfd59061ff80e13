use std::process::ExitCode;

fn main() -> anyhow::Result<ExitCode> {
    devis_cli::run()
}

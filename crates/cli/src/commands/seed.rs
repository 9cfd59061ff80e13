use devis_core::config::LoadOptions;
use devis_db::fixtures::VerificationResult;
use devis_db::{DbPool, DemoDataset};
use serde::Serialize;

use crate::commands::{with_database, CommandResult, Failure, EXIT_MIGRATION, EXIT_PERSISTENCE};

#[derive(Debug, Serialize)]
struct SeedOutput {
    clients: usize,
    projects: usize,
    quote_id: &'static str,
    quote_total: String,
}

pub fn run(options: &LoadOptions) -> CommandResult {
    with_database("seed", options, |_config, pool| load_and_verify(pool))
}

async fn load_and_verify(pool: DbPool) -> Result<CommandResult, Failure> {
    let seeded = DemoDataset::load(&pool)
        .await
        .map_err(|error| ("seed_execution", error.to_string(), EXIT_MIGRATION))?;

    let verification = DemoDataset::verify(&pool)
        .await
        .map_err(|error| ("seed_verification", error.to_string(), EXIT_PERSISTENCE))?;
    if !verification.all_present {
        let message = verification_failure_message(&verification);
        return Err(("seed_verification", message, EXIT_PERSISTENCE));
    }

    let output = SeedOutput {
        clients: seeded.clients_seeded,
        projects: seeded.projects_seeded,
        quote_id: seeded.quote_id,
        quote_total: seeded.quote_total.normalize().to_string(),
    };
    let message = format!(
        "demo dataset loaded: {} clients, {} projects, quote {} totalling {} HT",
        output.clients, output.projects, output.quote_id, output.quote_total
    );
    Ok(CommandResult::success_with_data("seed", message, &output))
}

fn verification_failure_message(verification: &VerificationResult) -> String {
    let failed_checks = verification
        .checks
        .iter()
        .filter_map(|(check, passed)| (!passed).then_some(*check))
        .collect::<Vec<_>>();

    if failed_checks.is_empty() {
        "some seed data failed to load".to_string()
    } else {
        format!("seed verification failed for checks: {}", failed_checks.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use devis_db::fixtures::VerificationResult;

    use super::verification_failure_message;

    #[test]
    fn verification_error_message_targets_failed_checks() {
        let verification = VerificationResult {
            all_present: false,
            checks: vec![("c1", true), ("p3", false), ("q1-total", false)],
        };

        assert_eq!(
            verification_failure_message(&verification),
            "seed verification failed for checks: p3, q1-total"
        );
    }

    #[test]
    fn verification_error_message_falls_back_to_generic_when_no_labels() {
        let verification = VerificationResult { all_present: false, checks: Vec::new() };
        assert_eq!(verification_failure_message(&verification), "some seed data failed to load");
    }
}

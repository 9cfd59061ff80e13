use tracing::warn;

use crate::domain::client::Client;
use crate::domain::project::Project;
use crate::domain::rates::RateTable;

/// Effective rate table for a client/project selection: the client's
/// defaults with every project override laid on top. Missing inputs yield an
/// empty or partial table, never an error.
pub fn resolve_rates(client: Option<&Client>, project: Option<&Project>) -> RateTable {
    let mut rates = client.map(|client| client.default_rates.clone()).unwrap_or_default();

    if let Some(project) = project {
        if let Some(client) = client {
            if !project.belongs_to(&client.id) {
                warn!(
                    event_name = "pricing.rates.foreign_project",
                    client_id = %client.id,
                    project_id = %project.id,
                    project_client_id = %project.client_id,
                    "project belongs to another client; overrides ignored"
                );
                return rates;
            }
        }
        rates.overlay(&project.specific_rates);
    }

    rates
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::resolve_rates;
    use crate::domain::client::{Client, ClientId};
    use crate::domain::project::{Project, ProjectId};
    use crate::domain::rates::RateTable;

    fn table(pairs: &[(&str, i64)]) -> RateTable {
        RateTable::try_from_pairs(pairs.iter().map(|(role, rate)| (*role, Decimal::from(*rate))))
            .expect("valid rate table")
    }

    fn client(rates: RateTable) -> Client {
        Client {
            id: ClientId("c1".to_string()),
            name: "Alice Dupont".to_string(),
            company_name: "Toyota Financial Services".to_string(),
            email: "alice@tfs.com".to_string(),
            address: String::new(),
            default_rates: rates,
        }
    }

    fn project(client_id: &str, rates: RateTable) -> Project {
        Project {
            id: ProjectId("p1".to_string()),
            client_id: ClientId(client_id.to_string()),
            name: "Landing".to_string(),
            description: None,
            specific_rates: rates,
        }
    }

    #[test]
    fn project_overrides_replace_and_add_roles() {
        let client = client(table(&[("Dev", 500), ("Design", 600)]));
        let project = project("c1", table(&[("Dev", 550), ("SRE", 920)]));

        let rates = resolve_rates(Some(&client), Some(&project));

        assert_eq!(rates, table(&[("Dev", 550), ("Design", 600), ("SRE", 920)]));
    }

    #[test]
    fn keys_absent_from_override_are_untouched() {
        let defaults = table(&[("Chef de projet", 600), ("UX designer", 720), ("SRE", 920)]);
        let client = client(defaults.clone());
        let project = project("c1", table(&[("SRE", 1000)]));

        let rates = resolve_rates(Some(&client), Some(&project));

        for (role, rate) in defaults.iter().filter(|(role, _)| *role != "SRE") {
            assert_eq!(rates.get(role), Some(rate));
        }
        assert_eq!(rates.get("SRE"), Some(Decimal::from(1000)));
    }

    #[test]
    fn no_selection_yields_empty_table() {
        assert!(resolve_rates(None, None).is_empty());
    }

    #[test]
    fn client_without_project_yields_defaults() {
        let defaults = table(&[("Dev", 500)]);
        let client = client(defaults.clone());
        assert_eq!(resolve_rates(Some(&client), None), defaults);
    }

    #[test]
    fn project_from_another_client_is_ignored() {
        let client = client(table(&[("Dev", 500)]));
        let project = project("c2", table(&[("Dev", 999)]));

        let rates = resolve_rates(Some(&client), Some(&project));

        assert_eq!(rates.get("Dev"), Some(Decimal::from(500)));
    }
}

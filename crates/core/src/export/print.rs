use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::domain::client::Client;
use crate::domain::project::Project;
use crate::domain::quote::{Quote, QuoteStatus};
use crate::domain::rates::RateTable;
use crate::pricing::{item_days, item_total, QuotePricing};

pub const PRINT_TITLE: &str = "CHIFFRAGE";

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PrintRoleLine {
    pub role: String,
    pub days: Decimal,
    /// `None` when the role has no rate in the effective table.
    pub rate: Option<Decimal>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PrintItem {
    pub description: String,
    pub roles: Vec<PrintRoleLine>,
    pub days: Decimal,
    pub total: Decimal,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PrintSection {
    pub title: String,
    pub items: Vec<PrintItem>,
    pub role_days: BTreeMap<String, Decimal>,
    pub days: Decimal,
    pub total: Decimal,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PrintHeader {
    pub title: String,
    pub reference: String,
    pub version: u32,
    pub status: QuoteStatus,
    pub date: DateTime<Utc>,
    pub valid_until: DateTime<Utc>,
    pub client_company: Option<String>,
    pub client_name: Option<String>,
    pub client_address: Option<String>,
    pub project_name: Option<String>,
    pub project_description: Option<String>,
}

/// Flattened, literal-only projection of a quote for printing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PrintView {
    pub header: PrintHeader,
    pub rates: Vec<(String, Decimal)>,
    pub sections: Vec<PrintSection>,
    pub total_days: Decimal,
    pub total_ht: Decimal,
    pub vat: Option<Decimal>,
    pub total_ttc: Option<Decimal>,
    pub payable: Decimal,
    pub unpriced_roles: Vec<String>,
    pub notes: Option<String>,
}

impl PrintView {
    pub fn build(
        quote: &Quote,
        rates: &RateTable,
        client: Option<&Client>,
        project: Option<&Project>,
    ) -> Self {
        let pricing = QuotePricing::compute(quote, rates);

        let sections = quote
            .sections
            .iter()
            .zip(&pricing.sections)
            .map(|(section, summary)| PrintSection {
                title: section.title.clone(),
                items: section
                    .items
                    .iter()
                    .map(|item| PrintItem {
                        description: item.description.clone(),
                        roles: item
                            .details
                            .iter()
                            .map(|(role, days)| PrintRoleLine {
                                role: role.clone(),
                                days: *days,
                                rate: rates.get(role),
                            })
                            .collect(),
                        days: item_days(item),
                        total: item_total(item, rates),
                    })
                    .collect(),
                role_days: summary.role_days.clone(),
                days: summary.days,
                total: summary.total,
            })
            .collect();

        Self {
            header: PrintHeader {
                title: PRINT_TITLE.to_string(),
                reference: quote.reference.clone(),
                version: quote.version,
                status: quote.status,
                date: quote.created_at,
                valid_until: quote.valid_until,
                client_company: client.map(|client| client.company_name.clone()),
                client_name: client.map(|client| client.name.clone()),
                client_address: client
                    .map(|client| client.address.clone())
                    .filter(|address| !address.is_empty()),
                project_name: project.map(|project| project.name.clone()),
                project_description: project.and_then(|project| project.description.clone()),
            },
            rates: rates.iter().map(|(role, rate)| (role.to_string(), rate)).collect(),
            sections,
            total_days: pricing.total_days,
            total_ht: pricing.totals.total_ht,
            vat: pricing.totals.vat,
            total_ttc: pricing.totals.total_ttc,
            payable: pricing.totals.payable(),
            unpriced_roles: pricing.unpriced_roles.into_iter().collect(),
            notes: quote.notes.clone().filter(|notes| !notes.trim().is_empty()),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use rust_decimal::Decimal;

    use super::PrintView;
    use crate::domain::client::{Client, ClientId};
    use crate::domain::project::{Project, ProjectId};
    use crate::domain::quote::Quote;
    use crate::domain::rates::RateTable;
    use crate::ids::SequentialIdGenerator;
    use crate::pricing::{quote_total, resolve_rates};

    fn dec(value: &str) -> Decimal {
        value.parse().expect("decimal literal")
    }

    fn landing_page(has_vat: bool) -> (Quote, Client, Project) {
        let client = Client {
            id: ClientId("c1".to_string()),
            name: "Alice Dupont".to_string(),
            company_name: "Acme".to_string(),
            email: String::new(),
            address: String::new(),
            default_rates: RateTable::try_from_pairs([("Dev", dec("500")), ("Design", dec("600"))])
                .expect("rates"),
        };
        let project = Project {
            id: ProjectId("p1".to_string()),
            client_id: client.id.clone(),
            name: "Site vitrine".to_string(),
            description: Some("Refonte".to_string()),
            specific_rates: RateTable::try_from_pairs([("Dev", dec("550"))]).expect("rates"),
        };
        let ids = SequentialIdGenerator::new("q");
        let mut quote = Quote::draft(&ids, "DEV-2026-0042", 30, Utc::now());
        quote.has_vat = has_vat;
        quote.sections[0].title = "Build".to_string();
        let item = &mut quote.sections[0].items[0];
        item.description = "Landing page".to_string();
        item.set_days("Dev", dec("2")).expect("days");
        item.set_days("Design", dec("0.5")).expect("days");
        (quote, client, project)
    }

    #[test]
    fn print_view_matches_engine_totals() {
        let (quote, client, project) = landing_page(true);
        let rates = resolve_rates(Some(&client), Some(&project));
        let view = PrintView::build(&quote, &rates, Some(&client), Some(&project));

        assert_eq!(view.header.title, "CHIFFRAGE");
        assert_eq!(view.header.client_company.as_deref(), Some("Acme"));
        assert_eq!(view.header.project_description.as_deref(), Some("Refonte"));
        assert_eq!(view.sections[0].items[0].total, dec("1400"));
        assert_eq!(view.sections[0].items[0].days, dec("2.5"));
        assert_eq!(view.sections[0].role_days["Dev"], dec("2"));
        assert_eq!(view.total_ht, quote_total(&quote, &rates));
        assert_eq!(view.vat, Some(dec("280")));
        assert_eq!(view.total_ttc, Some(dec("1680")));
        assert_eq!(view.payable, dec("1680"));
    }

    #[test]
    fn without_vat_the_payable_amount_is_ht() {
        let (quote, client, project) = landing_page(false);
        let rates = resolve_rates(Some(&client), Some(&project));
        let view = PrintView::build(&quote, &rates, Some(&client), Some(&project));

        assert_eq!(view.vat, None);
        assert_eq!(view.total_ttc, None);
        assert_eq!(view.payable, dec("1400"));
    }

    #[test]
    fn unpriced_role_is_listed_and_rate_left_empty() {
        let (mut quote, client, project) = landing_page(false);
        quote.sections[0].items[0].set_days("QA", dec("1")).expect("days");
        let rates = resolve_rates(Some(&client), Some(&project));
        let view = PrintView::build(&quote, &rates, Some(&client), Some(&project));

        assert_eq!(view.unpriced_roles, vec!["QA".to_string()]);
        let qa = view.sections[0].items[0].roles.iter().find(|line| line.role == "QA").expect("qa line");
        assert_eq!(qa.rate, None);
        assert_eq!(view.total_ht, dec("1400"));
    }
}

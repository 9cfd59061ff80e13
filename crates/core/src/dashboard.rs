use std::collections::BTreeMap;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;

use crate::domain::client::{Client, ClientId};
use crate::domain::quote::{Quote, QuoteStatus};

/// Portfolio figures over every stored quote, based on cached HT totals.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DashboardStats {
    /// Sum of ACCEPTED quotes.
    pub revenue: Decimal,
    /// Sum of quotes awaiting a decision (SENT, ESTIMATE, PENDING, LATE).
    pub pipeline_amount: Decimal,
    /// Accepted share of all quotes, as a rounded percentage.
    pub acceptance_rate: u32,
    pub quote_count: usize,
    pub client_count: usize,
    pub status_counts: BTreeMap<QuoteStatus, usize>,
}

impl DashboardStats {
    pub fn compute(quotes: &[Quote], client_count: usize) -> Self {
        let mut status_counts =
            QuoteStatus::ALL.into_iter().map(|status| (status, 0)).collect::<BTreeMap<_, _>>();
        let mut revenue = Decimal::ZERO;
        let mut pipeline_amount = Decimal::ZERO;

        for quote in quotes {
            *status_counts.entry(quote.status).or_insert(0) += 1;
            if quote.status == QuoteStatus::Accepted {
                revenue += quote.total_amount;
            } else if quote.status.is_pipeline() {
                pipeline_amount += quote.total_amount;
            }
        }

        let accepted = status_counts.get(&QuoteStatus::Accepted).copied().unwrap_or(0);
        let acceptance_rate = if quotes.is_empty() {
            0
        } else {
            (Decimal::from(accepted * 100) / Decimal::from(quotes.len()))
                .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
                .try_into()
                .unwrap_or(0)
        };

        Self {
            revenue,
            pipeline_amount,
            acceptance_rate,
            quote_count: quotes.len(),
            client_count,
            status_counts,
        }
    }
}

/// Quote list filter: all present criteria must match.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct QuoteFilter {
    /// Case-insensitive match on the reference or the client company name.
    pub text: Option<String>,
    pub status: Option<QuoteStatus>,
    pub client_id: Option<ClientId>,
}

impl QuoteFilter {
    pub fn matches(&self, quote: &Quote, client: Option<&Client>) -> bool {
        if let Some(status) = self.status {
            if quote.status != status {
                return false;
            }
        }

        if let Some(client_id) = &self.client_id {
            if quote.client_id.as_ref() != Some(client_id) {
                return false;
            }
        }

        match self.text.as_deref().map(str::trim).filter(|text| !text.is_empty()) {
            None => true,
            Some(text) => {
                let needle = text.to_lowercase();
                quote.reference.to_lowercase().contains(&needle)
                    || client.is_some_and(|client| {
                        client.company_name.to_lowercase().contains(&needle)
                    })
            }
        }
    }

    /// Matching quotes, newest first.
    pub fn apply<'a>(&self, quotes: &'a [Quote], clients: &[Client]) -> Vec<&'a Quote> {
        let mut matching = quotes
            .iter()
            .filter(|quote| {
                let client = quote
                    .client_id
                    .as_ref()
                    .and_then(|id| clients.iter().find(|client| &client.id == id));
                self.matches(quote, client)
            })
            .collect::<Vec<_>>();
        matching.sort_by(|left, right| right.created_at.cmp(&left.created_at));
        matching
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};
    use rust_decimal::Decimal;

    use super::{DashboardStats, QuoteFilter};
    use crate::domain::client::{Client, ClientId};
    use crate::domain::quote::{Quote, QuoteStatus};
    use crate::domain::rates::RateTable;
    use crate::ids::SequentialIdGenerator;

    fn quote(reference: &str, client: &str, status: QuoteStatus, total: i64, age_days: i64) -> Quote {
        let ids = SequentialIdGenerator::new(reference);
        let created = Utc.with_ymd_and_hms(2026, 6, 1, 12, 0, 0).unwrap() - Duration::days(age_days);
        let mut quote = Quote::draft(&ids, reference, 30, created);
        quote.client_id = Some(ClientId(client.to_string()));
        quote.status = status;
        quote.total_amount = Decimal::from(total);
        quote
    }

    fn client(id: &str, company: &str) -> Client {
        Client {
            id: ClientId(id.to_string()),
            name: String::new(),
            company_name: company.to_string(),
            email: String::new(),
            address: String::new(),
            default_rates: RateTable::new(),
        }
    }

    #[test]
    fn stats_split_revenue_and_pipeline() {
        let quotes = vec![
            quote("A", "c1", QuoteStatus::Accepted, 1000, 0),
            quote("B", "c1", QuoteStatus::Sent, 200, 0),
            quote("C", "c2", QuoteStatus::Estimate, 300, 0),
            quote("D", "c2", QuoteStatus::Late, 50, 0),
            quote("E", "c2", QuoteStatus::Pending, 25, 0),
            quote("F", "c2", QuoteStatus::Draft, 999, 0),
            quote("G", "c2", QuoteStatus::Rejected, 999, 0),
        ];

        let stats = DashboardStats::compute(&quotes, 2);

        assert_eq!(stats.revenue, Decimal::from(1000));
        assert_eq!(stats.pipeline_amount, Decimal::from(575));
        assert_eq!(stats.acceptance_rate, 14);
        assert_eq!(stats.quote_count, 7);
        assert_eq!(stats.client_count, 2);
        assert_eq!(stats.status_counts[&QuoteStatus::Draft], 1);
        assert_eq!(stats.status_counts.len(), QuoteStatus::ALL.len());
    }

    #[test]
    fn acceptance_rate_rounds_half_up_and_handles_empty() {
        let quotes = vec![
            quote("A", "c1", QuoteStatus::Accepted, 1, 0),
            quote("B", "c1", QuoteStatus::Draft, 1, 0),
            quote("C", "c1", QuoteStatus::Draft, 1, 0),
            quote("D", "c1", QuoteStatus::Accepted, 1, 0),
            quote("E", "c1", QuoteStatus::Accepted, 1, 0),
            quote("F", "c1", QuoteStatus::Draft, 1, 0),
            quote("G", "c1", QuoteStatus::Draft, 1, 0),
            quote("H", "c1", QuoteStatus::Draft, 1, 0),
        ];
        // 3 / 8 = 37.5 %
        assert_eq!(DashboardStats::compute(&quotes, 1).acceptance_rate, 38);
        assert_eq!(DashboardStats::compute(&[], 0).acceptance_rate, 0);
    }

    #[test]
    fn filter_matches_reference_or_company_case_insensitively() {
        let clients = vec![client("c1", "Toyota Financial Services"), client("c2", "GreenEnergy")];
        let quotes = vec![
            quote("DEV-2026-1001", "c1", QuoteStatus::Draft, 0, 3),
            quote("DEV-2026-1002", "c2", QuoteStatus::Sent, 0, 1),
            quote("DEV-2026-2001", "c2", QuoteStatus::Draft, 0, 2),
        ];

        let by_company = QuoteFilter { text: Some("green".to_string()), ..QuoteFilter::default() };
        let references = by_company
            .apply(&quotes, &clients)
            .into_iter()
            .map(|quote| quote.reference.as_str())
            .collect::<Vec<_>>();
        assert_eq!(references, vec!["DEV-2026-1002", "DEV-2026-2001"]);

        let by_reference = QuoteFilter { text: Some("dev-2026-10".to_string()), ..QuoteFilter::default() };
        assert_eq!(by_reference.apply(&quotes, &clients).len(), 2);
    }

    #[test]
    fn filter_combines_status_and_client() {
        let clients = vec![client("c1", "Acme"), client("c2", "Globex")];
        let quotes = vec![
            quote("A", "c1", QuoteStatus::Draft, 0, 0),
            quote("B", "c2", QuoteStatus::Draft, 0, 0),
            quote("C", "c2", QuoteStatus::Sent, 0, 0),
        ];

        let filter = QuoteFilter {
            status: Some(QuoteStatus::Draft),
            client_id: Some(ClientId("c2".to_string())),
            ..QuoteFilter::default()
        };
        let matching = filter.apply(&quotes, &clients);
        assert_eq!(matching.len(), 1);
        assert_eq!(matching[0].reference, "B");

        assert_eq!(QuoteFilter::default().apply(&quotes, &clients).len(), 3);
    }
}

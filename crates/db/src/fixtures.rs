use std::collections::BTreeMap;

use chrono::{DateTime, Duration, TimeZone, Utc};
use rust_decimal::Decimal;

use devis_core::domain::client::{Client, ClientId};
use devis_core::domain::project::{Project, ProjectId};
use devis_core::domain::quote::{ItemId, Quote, QuoteId, QuoteItem, QuoteSection, QuoteStatus, SectionId};
use devis_core::domain::rates::RateTable;
use devis_core::pricing::{quote_total, resolve_rates};

use crate::connection::DbPool;
use crate::repositories::client::upsert_client;
use crate::repositories::project::upsert_project;
use crate::repositories::quote::upsert_quote;
use crate::repositories::RepositoryError;

const AGENCY_RATES: &[(&str, i64)] = &[
    ("Directeur général", 1050),
    ("Directeur projet", 880),
    ("Chef de projet senior", 680),
    ("Chef de projet", 600),
    ("UX designer", 720),
    ("UI designer", 650),
    ("Data Analyst", 720),
    ("Directeur technique", 1050),
    ("SRE", 920),
    ("Full stack developer", 800),
];

pub const SEED_CLIENT_IDS: &[&str] = &["c1", "c2"];
pub const SEED_PROJECT_IDS: &[&str] = &["p1", "p2", "p3"];
pub const SEED_QUOTE_ID: &str = "q1";
pub const SEED_QUOTE_REFERENCE: &str = "DEV-2023-001";

/// Demo agency data: two clients, three projects, and one accepted quote
/// whose cached total is computed from the resolved rates at build time.
pub struct DemoDataset;

impl DemoDataset {
    pub fn created_at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 5, 9, 0, 0).single().unwrap_or_default()
    }

    pub fn clients() -> Result<Vec<Client>, RepositoryError> {
        let agency = rates(AGENCY_RATES.iter().map(|(role, rate)| (*role, Decimal::from(*rate))))?;
        let green = rates([
            ("Chef de projet", Decimal::from(550)),
            ("Full stack developer", Decimal::from(650)),
            ("UX designer", Decimal::from(600)),
        ])?;

        Ok(vec![
            Client {
                id: ClientId("c1".to_string()),
                name: "Alice Dupont".to_string(),
                company_name: "Toyota Financial Services".to_string(),
                email: "alice@tfs.com".to_string(),
                address: "123 Avenue de la Grande Armée, Paris".to_string(),
                default_rates: agency,
            },
            Client {
                id: ClientId("c2".to_string()),
                name: "Bob Martin".to_string(),
                company_name: "GreenEnergy".to_string(),
                email: "bob@green.com".to_string(),
                address: "456 Eco Blvd, Lyon".to_string(),
                default_rates: green,
            },
        ])
    }

    pub fn projects() -> Result<Vec<Project>, RepositoryError> {
        let project = |id: &str, client: &str, name: &str, specific_rates: RateTable| Project {
            id: ProjectId(id.to_string()),
            client_id: ClientId(client.to_string()),
            name: name.to_string(),
            description: None,
            specific_rates,
        };

        Ok(vec![
            project(
                "p1",
                "c1",
                "Évolutions graphiques espace public",
                rates([("Full stack developer", Decimal::from(850))])?,
            ),
            project("p2", "c1", "Maintenance Annuelle", RateTable::new()),
            project("p3", "c2", "Dashboard IoT", RateTable::new()),
        ])
    }

    pub fn quote(clients: &[Client], projects: &[Project]) -> Quote {
        let created_at = Self::created_at();
        let mut quote = Quote {
            id: QuoteId(SEED_QUOTE_ID.to_string()),
            reference: SEED_QUOTE_REFERENCE.to_string(),
            version: 1,
            client_id: Some(ClientId("c1".to_string())),
            project_id: Some(ProjectId("p1".to_string())),
            status: QuoteStatus::Accepted,
            sections: vec![
                section(
                    "s1",
                    "1 - PROJECT MANAGEMENT & CONCEPTION",
                    vec![item(
                        "i1",
                        "Conception, pilotage",
                        &[("Directeur projet", 1, 0), ("Chef de projet", 2, 0)],
                    )],
                ),
                section(
                    "s2",
                    "2 - DEVELOPPEMENT",
                    vec![
                        item(
                            "i2",
                            "Déblocage FAQ + tests responsive",
                            &[
                                ("Directeur projet", 1, 1),
                                ("Chef de projet", 25, 2),
                                ("Full stack developer", 55, 2),
                            ],
                        ),
                        item(
                            "i3",
                            "Blog - simple",
                            &[
                                ("Directeur projet", 1, 1),
                                ("Chef de projet", 1, 0),
                                ("Full stack developer", 44, 1),
                            ],
                        ),
                    ],
                ),
            ],
            has_vat: true,
            total_amount: Decimal::ZERO,
            notes: None,
            valid_until: created_at + Duration::days(30),
            created_at,
            updated_at: created_at,
        };

        let client = clients.iter().find(|client| Some(&client.id) == quote.client_id.as_ref());
        let project = projects.iter().find(|project| Some(&project.id) == quote.project_id.as_ref());
        quote.total_amount = quote_total(&quote, &resolve_rates(client, project));
        quote
    }

    /// Upserts the whole dataset in one transaction. Reloading is a no-op.
    pub async fn load(pool: &DbPool) -> Result<SeedResult, RepositoryError> {
        let clients = Self::clients()?;
        let projects = Self::projects()?;
        let quote = Self::quote(&clients, &projects);

        let mut tx = pool.begin().await?;
        for client in &clients {
            upsert_client(&mut tx, client).await?;
        }
        for project in &projects {
            upsert_project(&mut tx, project).await?;
        }
        upsert_quote(&mut tx, &quote).await?;
        tx.commit().await?;

        tracing::info!(
            event_name = "db.seed.loaded",
            clients = clients.len(),
            projects = projects.len(),
            quote_total = %quote.total_amount,
            "demo dataset loaded"
        );

        Ok(SeedResult {
            clients_seeded: clients.len(),
            projects_seeded: projects.len(),
            quote_id: SEED_QUOTE_ID,
            quote_total: quote.total_amount,
        })
    }

    /// Checks that every seeded row exists and the quote still carries its
    /// recomputed total.
    pub async fn verify(pool: &DbPool) -> Result<VerificationResult, RepositoryError> {
        let mut checks = Vec::new();

        for id in SEED_CLIENT_IDS {
            let exists: i64 = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM client WHERE id = ?1)")
                .bind(id)
                .fetch_one(pool)
                .await?;
            checks.push((*id, exists == 1));
        }

        for id in SEED_PROJECT_IDS {
            let exists: i64 =
                sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM project WHERE id = ?1)")
                    .bind(id)
                    .fetch_one(pool)
                    .await?;
            checks.push((*id, exists == 1));
        }

        let stored: Option<(String, String)> =
            sqlx::query_as("SELECT status, total_amount FROM quote WHERE id = ?1")
                .bind(SEED_QUOTE_ID)
                .fetch_optional(pool)
                .await?;
        checks.push((SEED_QUOTE_ID, stored.is_some()));

        let expected = Self::quote(&Self::clients()?, &Self::projects()?).total_amount;
        let total_matches = stored.as_ref().is_some_and(|(status, total)| {
            status == QuoteStatus::Accepted.as_str()
                && total.parse::<Decimal>().is_ok_and(|total| total == expected)
        });
        checks.push(("q1-total", total_matches));

        let all_present = checks.iter().all(|(_, ok)| *ok);
        Ok(VerificationResult { all_present, checks })
    }
}

fn rates<'a>(
    pairs: impl IntoIterator<Item = (&'a str, Decimal)>,
) -> Result<RateTable, RepositoryError> {
    RateTable::try_from_pairs(pairs).map_err(|e| RepositoryError::Encode(e.to_string()))
}

fn section(id: &str, title: &str, items: Vec<QuoteItem>) -> QuoteSection {
    QuoteSection { id: SectionId(id.to_string()), title: title.to_string(), items }
}

/// Days are given as (mantissa, scale): `(55, 2)` is 0.55.
fn item(id: &str, description: &str, days: &[(&str, i64, u32)]) -> QuoteItem {
    QuoteItem {
        id: ItemId(id.to_string()),
        description: description.to_string(),
        details: days
            .iter()
            .map(|(role, mantissa, scale)| (role.to_string(), Decimal::new(*mantissa, *scale)))
            .collect::<BTreeMap<_, _>>(),
    }
}

#[derive(Debug)]
pub struct SeedResult {
    pub clients_seeded: usize,
    pub projects_seeded: usize,
    pub quote_id: &'static str,
    pub quote_total: Decimal,
}

#[derive(Debug)]
pub struct VerificationResult {
    pub all_present: bool,
    pub checks: Vec<(&'static str, bool)>,
}

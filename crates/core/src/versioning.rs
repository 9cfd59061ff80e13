use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::domain::quote::{Quote, QuoteId, QuoteStatus};
use crate::errors::DomainError;
use crate::ids::IdGenerator;

pub const COPY_SUFFIX: &str = "-COPY";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicationMode {
    /// Next version within the same reference family.
    Version,
    /// Independent quote under `<reference>-COPY`, restarting at version 1.
    Copy,
}

impl std::str::FromStr for DuplicationMode {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "version" => Ok(Self::Version),
            "copy" => Ok(Self::Copy),
            other => Err(format!("unsupported duplication mode `{other}` (expected version|copy)")),
        }
    }
}

/// Highest version among quotes sharing `reference`, never below `floor`.
pub fn latest_version<'a>(
    reference: &str,
    quotes: impl IntoIterator<Item = &'a Quote>,
    floor: u32,
) -> u32 {
    quotes
        .into_iter()
        .filter(|quote| quote.reference == reference)
        .map(|quote| quote.version.max(1))
        .fold(floor, u32::max)
}

/// Quotes of one version family, newest version first.
pub fn version_family<'a>(reference: &str, quotes: &'a [Quote]) -> Vec<&'a Quote> {
    let mut family =
        quotes.iter().filter(|quote| quote.reference == reference).collect::<Vec<_>>();
    family.sort_by(|left, right| right.version.cmp(&left.version));
    family
}

/// Derives a brand-new DRAFT from `source` without touching it.
///
/// `existing` is the full quote list (or at least the source's reference
/// family); it drives the next version number and the id collision check.
pub fn duplicate_quote(
    source: &Quote,
    existing: &[Quote],
    mode: DuplicationMode,
    ids: &dyn IdGenerator,
    now: DateTime<Utc>,
) -> Result<Quote, DomainError> {
    let (reference, version) = match mode {
        DuplicationMode::Version => {
            let latest = latest_version(&source.reference, existing, source.version.max(1));
            let next = latest
                .checked_add(1)
                .ok_or_else(|| DomainError::VersionExhausted(source.reference.clone()))?;
            (source.reference.clone(), next)
        }
        DuplicationMode::Copy => (format!("{}{COPY_SUFFIX}", source.reference), 1),
    };

    let taken = existing
        .iter()
        .map(|quote| quote.id.0.as_str())
        .chain(std::iter::once(source.id.0.as_str()))
        .collect::<HashSet<_>>();
    let id = loop {
        let candidate = ids.next_id();
        if !taken.contains(candidate.as_str()) {
            break QuoteId(candidate);
        }
    };

    let duplicate = Quote {
        id,
        reference,
        version,
        client_id: source.client_id.clone(),
        project_id: source.project_id.clone(),
        status: QuoteStatus::Draft,
        sections: source.sections.iter().map(|section| section.clone_with_new_ids(ids)).collect(),
        has_vat: source.has_vat,
        total_amount: source.total_amount,
        notes: source.notes.clone(),
        valid_until: source.valid_until,
        created_at: now,
        updated_at: now,
    };

    info!(
        event_name = "quote.duplicated",
        source_quote_id = %source.id,
        quote_id = %duplicate.id,
        mode = ?mode,
        reference = %duplicate.reference,
        version = duplicate.version,
        "quote duplicated"
    );

    Ok(duplicate)
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use chrono::{Duration, TimeZone, Utc};
    use rust_decimal::Decimal;

    use super::{duplicate_quote, latest_version, version_family, DuplicationMode};
    use crate::domain::client::ClientId;
    use crate::domain::project::ProjectId;
    use crate::domain::quote::{Quote, QuoteId, QuoteStatus};
    use crate::errors::DomainError;
    use crate::ids::{IdGenerator, SequentialIdGenerator};

    fn sample(id: &str, reference: &str, version: u32) -> Quote {
        let ids = SequentialIdGenerator::new(id);
        let created = Utc.with_ymd_and_hms(2026, 1, 10, 8, 0, 0).unwrap();
        let mut quote = Quote::draft(&ids, reference, 30, created);
        quote.id = QuoteId(id.to_string());
        quote.version = version;
        quote.client_id = Some(ClientId("c1".to_string()));
        quote.project_id = Some(ProjectId("p1".to_string()));
        quote.status = QuoteStatus::Accepted;
        quote.has_vat = true;
        quote.notes = Some("Paiement à 30 jours".to_string());
        quote.sections[0].title = "Build".to_string();
        quote.sections[0].items[0].description = "Landing page".to_string();
        quote.sections[0].items[0].set_days("Dev", Decimal::from(2)).expect("days");
        quote.total_amount = Decimal::from(1100);
        quote
    }

    #[test]
    fn version_mode_takes_max_of_family_plus_one() {
        let source = sample("q1", "DEV-2026-001", 1);
        let existing = vec![
            source.clone(),
            sample("q2", "DEV-2026-001", 3),
            sample("q3", "DEV-2026-001", 2),
            sample("q4", "DEV-2026-999", 9),
        ];
        let now = Utc.with_ymd_and_hms(2026, 10, 16, 9, 30, 0).unwrap();

        let next = duplicate_quote(
            &source,
            &existing,
            DuplicationMode::Version,
            &SequentialIdGenerator::new("n"),
            now,
        )
        .expect("next version");

        assert_eq!(next.reference, "DEV-2026-001");
        assert_eq!(next.version, 4);
        assert_eq!(next.status, QuoteStatus::Draft);
        assert_eq!(next.created_at, now);
        assert_eq!(next.updated_at, now);
        assert_eq!(source.status, QuoteStatus::Accepted);
    }

    #[test]
    fn copy_mode_starts_new_family() {
        let source = sample("q1", "DEV-2026-001", 5);
        let copy = duplicate_quote(
            &source,
            std::slice::from_ref(&source),
            DuplicationMode::Copy,
            &SequentialIdGenerator::new("n"),
            Utc::now(),
        )
        .expect("duplicate");

        assert_eq!(copy.reference, "DEV-2026-001-COPY");
        assert_eq!(copy.version, 1);
        assert_eq!(copy.status, QuoteStatus::Draft);
    }

    #[test]
    fn deep_clone_has_fresh_ids_and_identical_content() {
        let source = sample("q1", "DEV-2026-001", 1);
        let copy = duplicate_quote(
            &source,
            std::slice::from_ref(&source),
            DuplicationMode::Version,
            &SequentialIdGenerator::new("n"),
            Utc::now(),
        )
        .expect("duplicate");

        assert_ne!(copy.id, source.id);
        assert_ne!(copy.sections[0].id, source.sections[0].id);
        assert_ne!(copy.sections[0].items[0].id, source.sections[0].items[0].id);
        assert_eq!(copy.sections[0].title, source.sections[0].title);
        assert_eq!(copy.sections[0].items[0].details, source.sections[0].items[0].details);
        assert_eq!(copy.client_id, source.client_id);
        assert_eq!(copy.project_id, source.project_id);
        assert_eq!(copy.has_vat, source.has_vat);
        assert_eq!(copy.notes, source.notes);
        assert_eq!(copy.total_amount, source.total_amount);
    }

    #[test]
    fn colliding_generated_ids_are_skipped() {
        struct Replaying(SequentialIdGenerator);

        impl IdGenerator for Replaying {
            fn next_id(&self) -> String {
                self.0.next_id()
            }
        }

        let source = sample("q1", "DEV-2026-001", 1);
        let mut taken = sample("dup-1", "OTHER", 1);
        taken.id = QuoteId("dup-1".to_string());
        let existing = vec![source.clone(), taken];

        let copy = duplicate_quote(
            &source,
            &existing,
            DuplicationMode::Copy,
            &Replaying(SequentialIdGenerator::new("dup")),
            Utc::now(),
        )
        .expect("duplicate");

        let existing_ids = existing.iter().map(|quote| quote.id.clone()).collect::<HashSet<_>>();
        assert!(!existing_ids.contains(&copy.id));
        assert_eq!(copy.id, QuoteId("dup-2".to_string()));
    }

    #[test]
    fn version_numbers_do_not_wrap() {
        let source = sample("q1", "DEV-2026-001", u32::MAX);
        let error = duplicate_quote(
            &source,
            std::slice::from_ref(&source),
            DuplicationMode::Version,
            &SequentialIdGenerator::new("n"),
            Utc::now(),
        )
        .expect_err("no version after u32::MAX");
        assert_eq!(error, DomainError::VersionExhausted("DEV-2026-001".to_string()));

        let copy = duplicate_quote(
            &source,
            std::slice::from_ref(&source),
            DuplicationMode::Copy,
            &SequentialIdGenerator::new("n"),
            Utc::now(),
        )
        .expect("a copy restarts at version 1");
        assert_eq!(copy.version, 1);
    }

    #[test]
    fn latest_version_ignores_other_references() {
        let quotes = vec![sample("a", "R1", 2), sample("b", "R2", 7)];
        assert_eq!(latest_version("R1", &quotes, 1), 2);
        assert_eq!(latest_version("R3", &quotes, 1), 1);
    }

    #[test]
    fn family_is_sorted_newest_first() {
        let mut older = sample("a", "R1", 1);
        older.created_at = older.created_at - Duration::days(1);
        let quotes = vec![older, sample("b", "R1", 3), sample("c", "R2", 2), sample("d", "R1", 2)];

        let versions =
            version_family("R1", &quotes).into_iter().map(|quote| quote.version).collect::<Vec<_>>();
        assert_eq!(versions, vec![3, 2, 1]);
    }
}

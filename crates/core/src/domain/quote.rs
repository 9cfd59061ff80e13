use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, Duration, Utc};
use rand::Rng;
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};

use crate::domain::client::ClientId;
use crate::domain::project::ProjectId;
use crate::errors::DomainError;
use crate::ids::IdGenerator;
use crate::sanitize::normalize_role;

pub const NEW_SECTION_TITLE: &str = "Nouvelle Phase";

/// Highest day count one role may carry on one item.
pub const MAX_DAYS: Decimal = Decimal::from_parts(100_000, 0, 0, false, 0);

macro_rules! string_id {
    ($name:ident) => {
        #[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub String);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

string_id!(QuoteId);
string_id!(SectionId);
string_id!(ItemId);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QuoteStatus {
    Draft,
    Estimate,
    Sent,
    Accepted,
    Rejected,
    Pending,
    Late,
}

impl QuoteStatus {
    pub const ALL: [QuoteStatus; 7] = [
        QuoteStatus::Draft,
        QuoteStatus::Estimate,
        QuoteStatus::Sent,
        QuoteStatus::Accepted,
        QuoteStatus::Rejected,
        QuoteStatus::Pending,
        QuoteStatus::Late,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "DRAFT",
            Self::Estimate => "ESTIMATE",
            Self::Sent => "SENT",
            Self::Accepted => "ACCEPTED",
            Self::Rejected => "REJECTED",
            Self::Pending => "PENDING",
            Self::Late => "LATE",
        }
    }

    /// Quotes still awaiting a client decision.
    pub fn is_pipeline(&self) -> bool {
        matches!(self, Self::Sent | Self::Estimate | Self::Pending | Self::Late)
    }

    /// ESTIMATE is assigned by the workflow, never picked in the editor.
    pub fn is_selectable(&self) -> bool {
        !matches!(self, Self::Estimate)
    }
}

impl fmt::Display for QuoteStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QuoteStatus {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_uppercase();
        Self::ALL.into_iter().find(|status| status.as_str() == normalized).ok_or_else(|| {
            DomainError::InvariantViolation(format!("unknown quote status `{value}`"))
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteItem {
    pub id: ItemId,
    pub description: String,
    /// Role -> days. Never holds a zero entry.
    #[serde(deserialize_with = "deserialize_role_days")]
    pub details: BTreeMap<String, Decimal>,
}

fn validate_days(role: &str, days: Decimal) -> Result<(String, Decimal), DomainError> {
    let role = normalize_role(role)?;
    if days < Decimal::ZERO || days > MAX_DAYS {
        return Err(DomainError::InvalidDays { role, days });
    }
    Ok((role, days))
}

/// Stored allocations pass the same checks as [`QuoteItem::set_days`];
/// zero entries are dropped.
fn deserialize_role_days<'de, D>(deserializer: D) -> Result<BTreeMap<String, Decimal>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = BTreeMap::<String, Decimal>::deserialize(deserializer)?;
    let mut details = BTreeMap::new();
    for (role, days) in raw {
        let (role, days) = validate_days(&role, days).map_err(serde::de::Error::custom)?;
        if !days.is_zero() {
            details.insert(role, days);
        }
    }
    Ok(details)
}

impl QuoteItem {
    pub fn empty(id: ItemId) -> Self {
        Self { id, description: String::new(), details: BTreeMap::new() }
    }

    pub fn days_for(&self, role: &str) -> Decimal {
        self.details.get(role).copied().unwrap_or(Decimal::ZERO)
    }

    /// Zero removes the role so the map stays sparse.
    pub fn set_days(&mut self, role: &str, days: Decimal) -> Result<(), DomainError> {
        let (role, days) = validate_days(role, days)?;
        if days.is_zero() {
            self.details.remove(&role);
        } else {
            self.details.insert(role, days);
        }
        Ok(())
    }

    /// Same content, fresh identity.
    pub fn clone_with_new_id(&self, ids: &dyn IdGenerator) -> Self {
        Self {
            id: ItemId(ids.next_id()),
            description: self.description.clone(),
            details: self.details.clone(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteSection {
    pub id: SectionId,
    pub title: String,
    pub items: Vec<QuoteItem>,
}

impl QuoteSection {
    /// A section always starts with one blank item.
    pub fn with_empty_item(title: impl Into<String>, ids: &dyn IdGenerator) -> Self {
        Self {
            id: SectionId(ids.next_id()),
            title: title.into(),
            items: vec![QuoteItem::empty(ItemId(ids.next_id()))],
        }
    }

    pub fn item_position(&self, item_id: &ItemId) -> Option<usize> {
        self.items.iter().position(|item| &item.id == item_id)
    }

    pub fn clone_with_new_ids(&self, ids: &dyn IdGenerator) -> Self {
        Self {
            id: SectionId(ids.next_id()),
            title: self.title.clone(),
            items: self.items.iter().map(|item| item.clone_with_new_id(ids)).collect(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub id: QuoteId,
    pub reference: String,
    pub version: u32,
    pub client_id: Option<ClientId>,
    pub project_id: Option<ProjectId>,
    pub status: QuoteStatus,
    pub sections: Vec<QuoteSection>,
    pub has_vat: bool,
    /// Cached pure function of (sections, effective rates).
    pub total_amount: Decimal,
    pub notes: Option<String>,
    pub valid_until: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Quote {
    /// A fresh DRAFT holding one empty section with one empty item.
    pub fn draft(
        ids: &dyn IdGenerator,
        reference: impl Into<String>,
        validity_days: i64,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: QuoteId(ids.next_id()),
            reference: reference.into(),
            version: 1,
            client_id: None,
            project_id: None,
            status: QuoteStatus::Draft,
            sections: vec![QuoteSection::with_empty_item(NEW_SECTION_TITLE, ids)],
            has_vat: false,
            total_amount: Decimal::ZERO,
            notes: None,
            valid_until: now + Duration::days(validity_days),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn section_position(&self, section_id: &SectionId) -> Option<usize> {
        self.sections.iter().position(|section| &section.id == section_id)
    }

    pub fn section(&self, section_id: &SectionId) -> Option<&QuoteSection> {
        self.sections.iter().find(|section| &section.id == section_id)
    }

    pub fn section_mut(&mut self, section_id: &SectionId) -> Result<&mut QuoteSection, DomainError> {
        self.sections
            .iter_mut()
            .find(|section| &section.id == section_id)
            .ok_or_else(|| DomainError::UnknownSection(section_id.clone()))
    }

    pub fn item_mut(
        &mut self,
        section_id: &SectionId,
        item_id: &ItemId,
    ) -> Result<&mut QuoteItem, DomainError> {
        let section = self.section_mut(section_id)?;
        section.items.iter_mut().find(|item| &item.id == item_id).ok_or_else(|| {
            DomainError::UnknownItem { section: section_id.clone(), item: item_id.clone() }
        })
    }

    /// Every role referenced by at least one item.
    pub fn roles_in_use(&self) -> BTreeSet<&str> {
        self.sections
            .iter()
            .flat_map(|section| section.items.iter())
            .flat_map(|item| item.details.keys().map(String::as_str))
            .collect()
    }

    /// A quote can only be persisted once both a client and a project are chosen.
    pub fn require_selection(&self) -> Result<(&ClientId, &ProjectId), DomainError> {
        let client_id = self.client_id.as_ref().ok_or(DomainError::MissingSelection("client"))?;
        let project_id =
            self.project_id.as_ref().ok_or(DomainError::MissingSelection("project"))?;
        Ok((client_id, project_id))
    }
}

/// `<prefix>-<year>-<4 digits>`, e.g. `DEV-2026-4821`.
pub fn generate_reference<R: Rng + ?Sized>(
    prefix: &str,
    now: DateTime<Utc>,
    rng: &mut R,
) -> String {
    format!("{prefix}-{}-{}", now.year(), rng.gen_range(1000..10000))
}

const REFERENCE_DRAWS: usize = 64;

/// Draws references until one is not carried by any quote in `existing`.
pub fn unused_reference<R: Rng + ?Sized>(
    prefix: &str,
    now: DateTime<Utc>,
    existing: &[Quote],
    rng: &mut R,
) -> Result<String, DomainError> {
    let taken = existing.iter().map(|quote| quote.reference.as_str()).collect::<BTreeSet<_>>();
    (0..REFERENCE_DRAWS)
        .map(|_| generate_reference(prefix, now, rng))
        .find(|reference| !taken.contains(reference.as_str()))
        .ok_or_else(|| {
            DomainError::InvariantViolation(format!(
                "no unused `{prefix}-{}` reference after {REFERENCE_DRAWS} draws",
                now.year()
            ))
        })
}

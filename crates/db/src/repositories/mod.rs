use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use thiserror::Error;

use devis_core::domain::client::{Client, ClientId};
use devis_core::domain::project::{Project, ProjectId};
use devis_core::domain::quote::{Quote, QuoteId};
use devis_core::errors::ApplicationError;

pub mod client;
pub mod memory;
pub mod project;
pub mod quote;

pub use client::SqlClientRepository;
pub use memory::InMemoryStore;
pub use project::SqlProjectRepository;
pub use quote::SqlQuoteRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("encode error: {0}")]
    Encode(String),
}

impl From<RepositoryError> for ApplicationError {
    fn from(value: RepositoryError) -> Self {
        Self::Persistence(value.to_string())
    }
}

/// Rows removed by a delete, cascade included. All zeros when nothing matched.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct DeletionReport {
    pub clients: u64,
    pub projects: u64,
    pub quotes: u64,
}

impl DeletionReport {
    pub fn is_empty(&self) -> bool {
        self.clients == 0 && self.projects == 0 && self.quotes == 0
    }
}

#[async_trait]
pub trait ClientRepository: Send + Sync {
    /// Ordered by company name.
    async fn list(&self) -> Result<Vec<Client>, RepositoryError>;
    async fn find_by_id(&self, id: &ClientId) -> Result<Option<Client>, RepositoryError>;
    async fn save(&self, client: Client) -> Result<(), RepositoryError>;
    /// All-or-nothing upsert of several clients.
    async fn save_all(&self, clients: Vec<Client>) -> Result<(), RepositoryError>;
    /// Removes the client, its projects, and every quote attached to either.
    async fn delete(&self, id: &ClientId) -> Result<DeletionReport, RepositoryError>;
}

#[async_trait]
pub trait ProjectRepository: Send + Sync {
    /// Ordered by name.
    async fn list(&self) -> Result<Vec<Project>, RepositoryError>;
    async fn list_for_client(&self, client_id: &ClientId) -> Result<Vec<Project>, RepositoryError>;
    async fn find_by_id(&self, id: &ProjectId) -> Result<Option<Project>, RepositoryError>;
    async fn save(&self, project: Project) -> Result<(), RepositoryError>;
    async fn save_all(&self, projects: Vec<Project>) -> Result<(), RepositoryError>;
    /// Removes the project and its quotes.
    async fn delete(&self, id: &ProjectId) -> Result<DeletionReport, RepositoryError>;
}

#[async_trait]
pub trait QuoteRepository: Send + Sync {
    /// Newest first.
    async fn list(&self) -> Result<Vec<Quote>, RepositoryError>;
    async fn find_by_id(&self, id: &QuoteId) -> Result<Option<Quote>, RepositoryError>;
    /// Every version sharing `reference`, highest version first.
    async fn list_by_reference(&self, reference: &str) -> Result<Vec<Quote>, RepositoryError>;
    async fn save(&self, quote: Quote) -> Result<(), RepositoryError>;
    /// Returns whether a row was removed.
    async fn delete(&self, id: &QuoteId) -> Result<bool, RepositoryError>;
}

pub(crate) fn column<'r, T>(row: &'r SqliteRow, name: &str) -> Result<T, RepositoryError>
where
    T: sqlx::Decode<'r, sqlx::Sqlite> + sqlx::Type<sqlx::Sqlite>,
{
    row.try_get(name).map_err(|e| RepositoryError::Decode(e.to_string()))
}

/// Fixed-width UTC so lexical order in SQL matches chronological order.
pub(crate) fn format_timestamp(value: &DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn parse_timestamp(column: &str, value: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Decode(format!("{column} `{value}`: {e}")))
}

pub(crate) fn to_json<T: Serialize>(value: &T) -> Result<String, RepositoryError> {
    serde_json::to_string(value).map_err(|e| RepositoryError::Encode(e.to_string()))
}

pub(crate) fn from_json<T: serde::de::DeserializeOwned>(
    column: &str,
    value: &str,
) -> Result<T, RepositoryError> {
    serde_json::from_str(value).map_err(|e| RepositoryError::Decode(format!("{column}: {e}")))
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::{format_timestamp, parse_timestamp, DeletionReport, RepositoryError};

    #[test]
    fn timestamps_are_fixed_width_and_round_trip() {
        let value = Utc.with_ymd_and_hms(2026, 3, 9, 8, 5, 0).unwrap();
        let text = format_timestamp(&value);

        assert_eq!(text, "2026-03-09T08:05:00.000000Z");
        assert_eq!(parse_timestamp("created_at", &text).expect("parse"), value);
    }

    #[test]
    fn unparseable_timestamp_is_a_decode_error() {
        let error = parse_timestamp("created_at", "yesterday").expect_err("must fail");
        assert!(matches!(error, RepositoryError::Decode(message) if message.contains("created_at")));
    }

    #[test]
    fn deletion_report_empty_only_when_nothing_removed() {
        assert!(DeletionReport::default().is_empty());
        assert!(!DeletionReport { quotes: 1, ..DeletionReport::default() }.is_empty());
    }
}

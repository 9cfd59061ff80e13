use sqlx::sqlite::SqliteRow;
use sqlx::{Sqlite, Transaction};

use devis_core::domain::client::ClientId;
use devis_core::domain::project::ProjectId;
use devis_core::domain::quote::{Quote, QuoteId, QuoteSection, QuoteStatus};
use devis_core::pricing::{quote_total, resolve_rates};
use rust_decimal::Decimal;

use super::client::find_client;
use super::project::find_project;
use super::{
    column, format_timestamp, from_json, parse_timestamp, to_json, QuoteRepository,
    RepositoryError,
};
use crate::DbPool;

const SELECT_QUOTE: &str = "SELECT id, reference, version, client_id, project_id, status,
        sections_json, has_vat, total_amount, notes, valid_until, created_at, updated_at
     FROM quote";

pub struct SqlQuoteRepository {
    pool: DbPool,
}

impl SqlQuoteRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_quote(row: &SqliteRow) -> Result<Quote, RepositoryError> {
    let id: String = column(row, "id")?;
    let version: i64 = column(row, "version")?;
    let version = u32::try_from(version)
        .map_err(|_| RepositoryError::Decode(format!("quote `{id}` has version {version}")))?;

    let status: String = column(row, "status")?;
    let status = status
        .parse::<QuoteStatus>()
        .map_err(|e| RepositoryError::Decode(e.to_string()))?;

    let sections_json: String = column(row, "sections_json")?;
    let sections: Vec<QuoteSection> = from_json("sections_json", &sections_json)?;

    let total_amount: String = column(row, "total_amount")?;
    let total_amount = total_amount.parse::<Decimal>().map_err(|e| {
        RepositoryError::Decode(format!("total_amount `{total_amount}`: {e}"))
    })?;

    let valid_until: String = column(row, "valid_until")?;
    let created_at: String = column(row, "created_at")?;
    let updated_at: String = column(row, "updated_at")?;

    Ok(Quote {
        reference: column(row, "reference")?,
        version,
        client_id: column::<Option<String>>(row, "client_id")?.map(ClientId),
        project_id: column::<Option<String>>(row, "project_id")?.map(ProjectId),
        status,
        sections,
        has_vat: column(row, "has_vat")?,
        total_amount,
        notes: column(row, "notes")?,
        valid_until: parse_timestamp("valid_until", &valid_until)?,
        created_at: parse_timestamp("created_at", &created_at)?,
        updated_at: parse_timestamp("updated_at", &updated_at)?,
        id: QuoteId(id),
    })
}

pub(crate) async fn upsert_quote(
    tx: &mut Transaction<'_, Sqlite>,
    quote: &Quote,
) -> Result<(), RepositoryError> {
    let sections_json = to_json(&quote.sections)?;

    sqlx::query(
        "INSERT INTO quote (id, reference, version, client_id, project_id, status,
                            sections_json, has_vat, total_amount, notes, valid_until,
                            created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
         ON CONFLICT(id) DO UPDATE SET
             reference = excluded.reference,
             version = excluded.version,
             client_id = excluded.client_id,
             project_id = excluded.project_id,
             status = excluded.status,
             sections_json = excluded.sections_json,
             has_vat = excluded.has_vat,
             total_amount = excluded.total_amount,
             notes = excluded.notes,
             valid_until = excluded.valid_until,
             updated_at = excluded.updated_at",
    )
    .bind(&quote.id.0)
    .bind(&quote.reference)
    .bind(i64::from(quote.version))
    .bind(quote.client_id.as_ref().map(|id| id.0.as_str()))
    .bind(quote.project_id.as_ref().map(|id| id.0.as_str()))
    .bind(quote.status.as_str())
    .bind(sections_json)
    .bind(quote.has_vat)
    .bind(quote.total_amount.to_string())
    .bind(&quote.notes)
    .bind(format_timestamp(&quote.valid_until))
    .bind(format_timestamp(&quote.created_at))
    .bind(format_timestamp(&quote.updated_at))
    .execute(&mut **tx)
    .await?;

    Ok(())
}

/// Quotes whose cached total depends on a rate table that was just written.
pub(crate) enum RepriceScope<'a> {
    /// Quotes addressed to the client or to any of its projects.
    Client(&'a ClientId),
    Project(&'a ProjectId),
}

/// Recomputes `total_amount` for every quote in `scope` against the rates
/// visible inside `tx`. Returns how many rows changed.
pub(crate) async fn reprice_quotes(
    tx: &mut Transaction<'_, Sqlite>,
    scope: RepriceScope<'_>,
) -> Result<u64, RepositoryError> {
    let (sql, binds) = match scope {
        RepriceScope::Client(id) => (
            format!(
                "{SELECT_QUOTE} WHERE client_id = ?
                    OR project_id IN (SELECT id FROM project WHERE client_id = ?)"
            ),
            vec![id.0.as_str(), id.0.as_str()],
        ),
        RepriceScope::Project(id) => {
            (format!("{SELECT_QUOTE} WHERE project_id = ?"), vec![id.0.as_str()])
        }
    };

    let mut query = sqlx::query(&sql);
    for value in binds {
        query = query.bind(value);
    }
    let rows = query.fetch_all(&mut **tx).await?;

    let mut repriced = 0;
    for row in &rows {
        let quote = row_to_quote(row)?;
        let client = match &quote.client_id {
            Some(id) => find_client(tx, id).await?,
            None => None,
        };
        let project = match &quote.project_id {
            Some(id) => find_project(tx, id).await?,
            None => None,
        };

        let total = quote_total(&quote, &resolve_rates(client.as_ref(), project.as_ref()));
        if total == quote.total_amount {
            continue;
        }

        sqlx::query("UPDATE quote SET total_amount = ? WHERE id = ?")
            .bind(total.to_string())
            .bind(&quote.id.0)
            .execute(&mut **tx)
            .await?;
        repriced += 1;
    }

    Ok(repriced)
}

#[async_trait::async_trait]
impl QuoteRepository for SqlQuoteRepository {
    async fn list(&self) -> Result<Vec<Quote>, RepositoryError> {
        let rows = sqlx::query(&format!("{SELECT_QUOTE} ORDER BY created_at DESC, id"))
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(row_to_quote).collect()
    }

    async fn find_by_id(&self, id: &QuoteId) -> Result<Option<Quote>, RepositoryError> {
        let row = sqlx::query(&format!("{SELECT_QUOTE} WHERE id = ?"))
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_to_quote).transpose()
    }

    async fn list_by_reference(&self, reference: &str) -> Result<Vec<Quote>, RepositoryError> {
        let rows =
            sqlx::query(&format!("{SELECT_QUOTE} WHERE reference = ? ORDER BY version DESC, id"))
                .bind(reference)
                .fetch_all(&self.pool)
                .await?;
        rows.iter().map(row_to_quote).collect()
    }

    async fn save(&self, quote: Quote) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;
        upsert_quote(&mut tx, &quote).await?;
        tx.commit().await?;

        tracing::debug!(
            event_name = "db.quote.saved",
            quote_id = %quote.id,
            reference = %quote.reference,
            version = quote.version,
            "quote upserted"
        );
        Ok(())
    }

    async fn delete(&self, id: &QuoteId) -> Result<bool, RepositoryError> {
        let removed = sqlx::query("DELETE FROM quote WHERE id = ?")
            .bind(&id.0)
            .execute(&self.pool)
            .await?
            .rows_affected()
            > 0;

        tracing::info!(event_name = "db.quote.deleted", quote_id = %id, removed, "quote delete");
        Ok(removed)
    }
}

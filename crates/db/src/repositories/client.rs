use sqlx::sqlite::SqliteRow;
use sqlx::{Sqlite, Transaction};

use devis_core::domain::client::{Client, ClientId};
use devis_core::domain::rates::RateTable;

use super::quote::{reprice_quotes, RepriceScope};
use super::{column, from_json, to_json, ClientRepository, DeletionReport, RepositoryError};
use crate::DbPool;

const SELECT_CLIENT: &str =
    "SELECT id, name, company_name, email, address, default_rates_json FROM client";

pub struct SqlClientRepository {
    pool: DbPool,
}

impl SqlClientRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_client(row: &SqliteRow) -> Result<Client, RepositoryError> {
    let rates_json: String = column(row, "default_rates_json")?;
    let default_rates: RateTable = from_json("default_rates_json", &rates_json)?;

    Ok(Client {
        id: ClientId(column(row, "id")?),
        name: column(row, "name")?,
        company_name: column(row, "company_name")?,
        email: column(row, "email")?,
        address: column(row, "address")?,
        default_rates,
    })
}

pub(crate) async fn upsert_client(
    tx: &mut Transaction<'_, Sqlite>,
    client: &Client,
) -> Result<(), RepositoryError> {
    let rates_json = to_json(&client.default_rates)?;

    sqlx::query(
        "INSERT INTO client (id, name, company_name, email, address, default_rates_json)
         VALUES (?, ?, ?, ?, ?, ?)
         ON CONFLICT(id) DO UPDATE SET
             name = excluded.name,
             company_name = excluded.company_name,
             email = excluded.email,
             address = excluded.address,
             default_rates_json = excluded.default_rates_json",
    )
    .bind(&client.id.0)
    .bind(&client.name)
    .bind(&client.company_name)
    .bind(&client.email)
    .bind(&client.address)
    .bind(rates_json)
    .execute(&mut **tx)
    .await?;

    Ok(())
}

pub(crate) async fn find_client(
    tx: &mut Transaction<'_, Sqlite>,
    id: &ClientId,
) -> Result<Option<Client>, RepositoryError> {
    let row = sqlx::query(&format!("{SELECT_CLIENT} WHERE id = ?"))
        .bind(&id.0)
        .fetch_optional(&mut **tx)
        .await?;

    row.as_ref().map(row_to_client).transpose()
}

#[async_trait::async_trait]
impl ClientRepository for SqlClientRepository {
    async fn list(&self) -> Result<Vec<Client>, RepositoryError> {
        let rows = sqlx::query(&format!("{SELECT_CLIENT} ORDER BY company_name, id"))
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(row_to_client).collect()
    }

    async fn find_by_id(&self, id: &ClientId) -> Result<Option<Client>, RepositoryError> {
        let row = sqlx::query(&format!("{SELECT_CLIENT} WHERE id = ?"))
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_to_client).transpose()
    }

    async fn save(&self, client: Client) -> Result<(), RepositoryError> {
        self.save_all(vec![client]).await
    }

    async fn save_all(&self, clients: Vec<Client>) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let mut repriced = 0;
        for client in &clients {
            upsert_client(&mut tx, client).await?;
            repriced += reprice_quotes(&mut tx, RepriceScope::Client(&client.id)).await?;
        }
        tx.commit().await?;

        tracing::debug!(
            event_name = "db.client.saved",
            count = clients.len(),
            repriced,
            "clients upserted"
        );
        Ok(())
    }

    async fn delete(&self, id: &ClientId) -> Result<DeletionReport, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let quotes = sqlx::query(
            "DELETE FROM quote
             WHERE client_id = ?
                OR project_id IN (SELECT id FROM project WHERE client_id = ?)",
        )
        .bind(&id.0)
        .bind(&id.0)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        let projects = sqlx::query("DELETE FROM project WHERE client_id = ?")
            .bind(&id.0)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        let clients = sqlx::query("DELETE FROM client WHERE id = ?")
            .bind(&id.0)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        tx.commit().await?;

        let report = DeletionReport { clients, projects, quotes };
        tracing::info!(
            event_name = "db.client.deleted",
            client_id = %id,
            projects = report.projects,
            quotes = report.quotes,
            removed = !report.is_empty(),
            "client delete cascaded"
        );
        Ok(report)
    }
}

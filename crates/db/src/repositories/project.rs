use sqlx::sqlite::SqliteRow;
use sqlx::{Sqlite, Transaction};

use devis_core::domain::client::ClientId;
use devis_core::domain::project::{Project, ProjectId};
use devis_core::domain::rates::RateTable;

use super::quote::{reprice_quotes, RepriceScope};
use super::{column, from_json, to_json, DeletionReport, ProjectRepository, RepositoryError};
use crate::DbPool;

const SELECT_PROJECT: &str =
    "SELECT id, client_id, name, description, specific_rates_json FROM project";

pub struct SqlProjectRepository {
    pool: DbPool,
}

impl SqlProjectRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_project(row: &SqliteRow) -> Result<Project, RepositoryError> {
    let rates_json: String = column(row, "specific_rates_json")?;
    let specific_rates: RateTable = from_json("specific_rates_json", &rates_json)?;

    Ok(Project {
        id: ProjectId(column(row, "id")?),
        client_id: ClientId(column(row, "client_id")?),
        name: column(row, "name")?,
        description: column(row, "description")?,
        specific_rates,
    })
}

pub(crate) async fn upsert_project(
    tx: &mut Transaction<'_, Sqlite>,
    project: &Project,
) -> Result<(), RepositoryError> {
    let rates_json = to_json(&project.specific_rates)?;

    sqlx::query(
        "INSERT INTO project (id, client_id, name, description, specific_rates_json)
         VALUES (?, ?, ?, ?, ?)
         ON CONFLICT(id) DO UPDATE SET
             client_id = excluded.client_id,
             name = excluded.name,
             description = excluded.description,
             specific_rates_json = excluded.specific_rates_json",
    )
    .bind(&project.id.0)
    .bind(&project.client_id.0)
    .bind(&project.name)
    .bind(&project.description)
    .bind(rates_json)
    .execute(&mut **tx)
    .await?;

    Ok(())
}

pub(crate) async fn find_project(
    tx: &mut Transaction<'_, Sqlite>,
    id: &ProjectId,
) -> Result<Option<Project>, RepositoryError> {
    let row = sqlx::query(&format!("{SELECT_PROJECT} WHERE id = ?"))
        .bind(&id.0)
        .fetch_optional(&mut **tx)
        .await?;

    row.as_ref().map(row_to_project).transpose()
}

#[async_trait::async_trait]
impl ProjectRepository for SqlProjectRepository {
    async fn list(&self) -> Result<Vec<Project>, RepositoryError> {
        let rows = sqlx::query(&format!("{SELECT_PROJECT} ORDER BY name, id"))
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(row_to_project).collect()
    }

    async fn list_for_client(&self, client_id: &ClientId) -> Result<Vec<Project>, RepositoryError> {
        let rows = sqlx::query(&format!("{SELECT_PROJECT} WHERE client_id = ? ORDER BY name, id"))
            .bind(&client_id.0)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(row_to_project).collect()
    }

    async fn find_by_id(&self, id: &ProjectId) -> Result<Option<Project>, RepositoryError> {
        let row = sqlx::query(&format!("{SELECT_PROJECT} WHERE id = ?"))
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_to_project).transpose()
    }

    async fn save(&self, project: Project) -> Result<(), RepositoryError> {
        self.save_all(vec![project]).await
    }

    async fn save_all(&self, projects: Vec<Project>) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let mut repriced = 0;
        for project in &projects {
            upsert_project(&mut tx, project).await?;
            repriced += reprice_quotes(&mut tx, RepriceScope::Project(&project.id)).await?;
        }
        tx.commit().await?;

        tracing::debug!(
            event_name = "db.project.saved",
            count = projects.len(),
            repriced,
            "projects upserted"
        );
        Ok(())
    }

    async fn delete(&self, id: &ProjectId) -> Result<DeletionReport, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let quotes = sqlx::query("DELETE FROM quote WHERE project_id = ?")
            .bind(&id.0)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        let projects = sqlx::query("DELETE FROM project WHERE id = ?")
            .bind(&id.0)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        tx.commit().await?;

        let report = DeletionReport { clients: 0, projects, quotes };
        tracing::info!(
            event_name = "db.project.deleted",
            project_id = %id,
            quotes = report.quotes,
            removed = !report.is_empty(),
            "project delete cascaded"
        );
        Ok(report)
    }
}

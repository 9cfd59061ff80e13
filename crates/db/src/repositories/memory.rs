use std::collections::HashMap;

use tokio::sync::RwLock;

use devis_core::domain::client::{Client, ClientId};
use devis_core::domain::project::{Project, ProjectId};
use devis_core::domain::quote::{Quote, QuoteId};
use devis_core::pricing::{quote_total, resolve_rates};

use super::{ClientRepository, DeletionReport, ProjectRepository, QuoteRepository, RepositoryError};

#[derive(Default)]
struct StoreState {
    clients: HashMap<String, Client>,
    projects: HashMap<String, Project>,
    quotes: HashMap<String, Quote>,
}

impl StoreState {
    fn remove_quotes_where(&mut self, predicate: impl Fn(&Quote) -> bool) -> u64 {
        let before = self.quotes.len();
        self.quotes.retain(|_, quote| !predicate(quote));
        (before - self.quotes.len()) as u64
    }

    /// Same contract as the SQL `reprice_quotes`: refresh cached totals after a
    /// rate table changed.
    fn reprice_quotes_where(&mut self, predicate: impl Fn(&Quote) -> bool) -> u64 {
        let Self { clients, projects, quotes } = self;
        let mut repriced = 0;
        for quote in quotes.values_mut().filter(|quote| predicate(&**quote)) {
            let client = quote.client_id.as_ref().and_then(|id| clients.get(&id.0));
            let project = quote.project_id.as_ref().and_then(|id| projects.get(&id.0));
            let total = quote_total(quote, &resolve_rates(client, project));
            if total != quote.total_amount {
                quote.total_amount = total;
                repriced += 1;
            }
        }
        repriced
    }

    fn reprice_for_client(&mut self, id: &ClientId) -> u64 {
        let owned_projects = self.owned_projects(id);
        self.reprice_quotes_where(|quote| {
            quote.client_id.as_ref() == Some(id)
                || quote.project_id.as_ref().is_some_and(|project| owned_projects.contains(project))
        })
    }

    fn owned_projects(&self, id: &ClientId) -> Vec<ProjectId> {
        self.projects
            .values()
            .filter(|project| project.belongs_to(id))
            .map(|project| project.id.clone())
            .collect()
    }
}

/// One lock over all three collections, so cascades are atomic like the SQL
/// transactions they mirror.
#[derive(Default)]
pub struct InMemoryStore {
    state: RwLock<StoreState>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl ClientRepository for InMemoryStore {
    async fn list(&self) -> Result<Vec<Client>, RepositoryError> {
        let state = self.state.read().await;
        let mut clients = state.clients.values().cloned().collect::<Vec<_>>();
        clients.sort_by(|a, b| (&a.company_name, &a.id).cmp(&(&b.company_name, &b.id)));
        Ok(clients)
    }

    async fn find_by_id(&self, id: &ClientId) -> Result<Option<Client>, RepositoryError> {
        let state = self.state.read().await;
        Ok(state.clients.get(&id.0).cloned())
    }

    async fn save(&self, client: Client) -> Result<(), RepositoryError> {
        ClientRepository::save_all(self, vec![client]).await
    }

    async fn save_all(&self, clients: Vec<Client>) -> Result<(), RepositoryError> {
        let mut state = self.state.write().await;
        for client in clients {
            let id = client.id.clone();
            state.clients.insert(id.0.clone(), client);
            state.reprice_for_client(&id);
        }
        Ok(())
    }

    async fn delete(&self, id: &ClientId) -> Result<DeletionReport, RepositoryError> {
        let mut state = self.state.write().await;

        let owned_projects = state.owned_projects(id);

        let quotes = state.remove_quotes_where(|quote| {
            quote.client_id.as_ref() == Some(id)
                || quote.project_id.as_ref().is_some_and(|project| owned_projects.contains(project))
        });
        for project in &owned_projects {
            state.projects.remove(&project.0);
        }
        let clients = u64::from(state.clients.remove(&id.0).is_some());

        Ok(DeletionReport { clients, projects: owned_projects.len() as u64, quotes })
    }
}

#[async_trait::async_trait]
impl ProjectRepository for InMemoryStore {
    async fn list(&self) -> Result<Vec<Project>, RepositoryError> {
        let state = self.state.read().await;
        let mut projects = state.projects.values().cloned().collect::<Vec<_>>();
        projects.sort_by(|a, b| (&a.name, &a.id).cmp(&(&b.name, &b.id)));
        Ok(projects)
    }

    async fn list_for_client(&self, client_id: &ClientId) -> Result<Vec<Project>, RepositoryError> {
        let mut projects = ProjectRepository::list(self).await?;
        projects.retain(|project| project.belongs_to(client_id));
        Ok(projects)
    }

    async fn find_by_id(&self, id: &ProjectId) -> Result<Option<Project>, RepositoryError> {
        let state = self.state.read().await;
        Ok(state.projects.get(&id.0).cloned())
    }

    async fn save(&self, project: Project) -> Result<(), RepositoryError> {
        ProjectRepository::save_all(self, vec![project]).await
    }

    async fn save_all(&self, projects: Vec<Project>) -> Result<(), RepositoryError> {
        let mut state = self.state.write().await;
        for project in projects {
            let id = project.id.clone();
            state.projects.insert(id.0.clone(), project);
            state.reprice_quotes_where(|quote| quote.project_id.as_ref() == Some(&id));
        }
        Ok(())
    }

    async fn delete(&self, id: &ProjectId) -> Result<DeletionReport, RepositoryError> {
        let mut state = self.state.write().await;
        let quotes = state.remove_quotes_where(|quote| quote.project_id.as_ref() == Some(id));
        let projects = u64::from(state.projects.remove(&id.0).is_some());
        Ok(DeletionReport { clients: 0, projects, quotes })
    }
}

#[async_trait::async_trait]
impl QuoteRepository for InMemoryStore {
    async fn list(&self) -> Result<Vec<Quote>, RepositoryError> {
        let state = self.state.read().await;
        let mut quotes = state.quotes.values().cloned().collect::<Vec<_>>();
        quotes.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(quotes)
    }

    async fn find_by_id(&self, id: &QuoteId) -> Result<Option<Quote>, RepositoryError> {
        let state = self.state.read().await;
        Ok(state.quotes.get(&id.0).cloned())
    }

    async fn list_by_reference(&self, reference: &str) -> Result<Vec<Quote>, RepositoryError> {
        let state = self.state.read().await;
        let mut quotes = state
            .quotes
            .values()
            .filter(|quote| quote.reference == reference)
            .cloned()
            .collect::<Vec<_>>();
        quotes.sort_by(|a, b| b.version.cmp(&a.version).then_with(|| a.id.cmp(&b.id)));
        Ok(quotes)
    }

    async fn save(&self, quote: Quote) -> Result<(), RepositoryError> {
        let mut state = self.state.write().await;
        state.quotes.insert(quote.id.0.clone(), quote);
        Ok(())
    }

    async fn delete(&self, id: &QuoteId) -> Result<bool, RepositoryError> {
        let mut state = self.state.write().await;
        Ok(state.quotes.remove(&id.0).is_some())
    }
}

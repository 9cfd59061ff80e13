pub mod connection;
pub mod fixtures;
pub mod migrations;
pub mod repositories;

pub use connection::{connect, connect_with_settings, DbPool};
pub use fixtures::{DemoDataset, SeedResult, VerificationResult};
pub use repositories::{
    ClientRepository, DeletionReport, InMemoryStore, ProjectRepository, QuoteRepository,
    RepositoryError, SqlClientRepository, SqlProjectRepository, SqlQuoteRepository,
};

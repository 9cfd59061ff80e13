pub mod config;
pub mod dashboard;
pub mod domain;
pub mod editor;
pub mod errors;
pub mod export;
pub mod ids;
pub mod pricing;
pub mod sanitize;
pub mod versioning;

pub use dashboard::{DashboardStats, QuoteFilter};
pub use domain::client::{Client, ClientId};
pub use domain::project::{Project, ProjectId};
pub use domain::quote::{
    generate_reference, unused_reference, ItemId, Quote, QuoteId, QuoteItem, QuoteSection,
    QuoteStatus, SectionId,
};
pub use domain::rates::RateTable;
pub use editor::QuoteEditor;
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use export::{ExportError, HtmlRenderer, PrintView, WorkbookModel};
pub use ids::{IdGenerator, SequentialIdGenerator, UuidIdGenerator};
pub use pricing::{resolve_rates, QuotePricing, VatBreakdown};
pub use versioning::{duplicate_quote, version_family, DuplicationMode};

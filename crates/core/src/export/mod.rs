//! Projections of a priced quote: a literal print view (rendered to HTML)
//! and a spreadsheet model whose formulas recompute the same totals.

pub mod formula;
pub mod html;
pub mod print;
pub mod workbook;
pub mod xlsx;

use thiserror::Error;

pub use formula::{CellRange, CellRef, Formula};
pub use html::HtmlRenderer;
pub use print::PrintView;
pub use workbook::{WorkbookModel, DEFAULT_SHEET_NAME};
pub use xlsx::write_xlsx;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ExportError {
    #[error("template error: {0}")]
    Template(String),
    #[error("workbook error: {0}")]
    Workbook(String),
    #[error("spreadsheet export is not available in this build")]
    SpreadsheetUnavailable,
}

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;

use crate::domain::client::Client;
use crate::domain::project::Project;
use crate::domain::quote::{ItemId, Quote, SectionId};
use crate::domain::rates::RateTable;
use crate::export::formula::{CellRange, CellRef, Formula};
use crate::pricing::{unpriced_roles, TTC_FACTOR, VAT_RATE};

pub const DEFAULT_SHEET_NAME: &str = "Chiffrage";
pub const SHEET_TITLE: &str = "CHIFFRAGE";

const DESCRIPTION_WIDTH: u16 = 60;
const ROLE_WIDTH: u16 = 12;
const DAYS_WIDTH: u16 = 15;
const PRICE_WIDTH: u16 = 20;
const MAX_EVALUATION_DEPTH: usize = 32;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum CellStyle {
    Title,
    Label,
    Value,
    GridTitle,
    Header,
    SectionTitle,
    Text,
    Days,
    Currency,
    TotalLabel,
    TotalValue,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub enum CellValue {
    Text(String),
    Number(Decimal),
    Formula(Formula),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Cell {
    pub value: CellValue,
    pub style: CellStyle,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RoleColumn {
    pub role: String,
    pub col: u16,
    /// Literal coefficient baked into the row price formulas.
    pub rate: Decimal,
    pub priced: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ItemRow {
    pub section_id: SectionId,
    pub item_id: ItemId,
    pub row: u32,
}

/// Where the interesting cells ended up.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct WorkbookLayout {
    pub role_columns: Vec<RoleColumn>,
    pub item_rows: Vec<ItemRow>,
    pub days_col: u16,
    pub price_col: u16,
    pub total_ht: CellRef,
    pub vat: Option<CellRef>,
    pub total_ttc: Option<CellRef>,
}

impl WorkbookLayout {
    pub fn item_row(&self, item_id: &ItemId) -> Option<u32> {
        self.item_rows.iter().find(|row| &row.item_id == item_id).map(|row| row.row)
    }

    pub fn role_col(&self, role: &str) -> Option<u16> {
        self.role_columns.iter().find(|column| column.role == role).map(|column| column.col)
    }

    pub fn day_cell(&self, item_id: &ItemId, role: &str) -> Option<CellRef> {
        Some(CellRef::new(self.item_row(item_id)?, self.role_col(role)?))
    }

    pub fn item_days_cell(&self, item_id: &ItemId) -> Option<CellRef> {
        self.item_row(item_id).map(|row| CellRef::new(row, self.days_col))
    }

    pub fn item_price_cell(&self, item_id: &ItemId) -> Option<CellRef> {
        self.item_row(item_id).map(|row| CellRef::new(row, self.price_col))
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EvaluationError {
    #[error("cell {0} holds text where a number is required")]
    NotNumeric(CellRef),
    #[error("formula chain too deep at {0}")]
    TooDeep(CellRef),
}

/// One-sheet spreadsheet document, independent of any xlsx library.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WorkbookModel {
    pub sheet_name: String,
    cells: BTreeMap<CellRef, Cell>,
    /// Column index -> width in characters.
    pub column_widths: Vec<(u16, u16)>,
    pub layout: WorkbookLayout,
}

struct SheetWriter {
    cells: BTreeMap<CellRef, Cell>,
    row: u32,
}

impl SheetWriter {
    fn put(&mut self, col: u16, value: CellValue, style: CellStyle) -> CellRef {
        let cell = CellRef::new(self.row, col);
        self.cells.insert(cell, Cell { value, style });
        cell
    }

    fn text(&mut self, col: u16, text: impl Into<String>, style: CellStyle) -> CellRef {
        self.put(col, CellValue::Text(text.into()), style)
    }

    fn skip(&mut self, rows: u32) {
        self.row += rows;
    }
}

impl WorkbookModel {
    pub fn build(
        quote: &Quote,
        rates: &RateTable,
        client: Option<&Client>,
        project: Option<&Project>,
        sheet_name: &str,
    ) -> Self {
        let role_columns = role_columns(quote, rates);
        let role_count = u16::try_from(role_columns.len()).unwrap_or(u16::MAX - 2);
        let days_col = role_count + 1;
        let price_col = role_count + 2;
        let mut sheet = SheetWriter { cells: BTreeMap::new(), row: 0 };

        sheet.text(0, SHEET_TITLE, CellStyle::Title);
        sheet.skip(2);
        sheet.text(0, "CLIENT:", CellStyle::Label);
        sheet.text(1, client.map(|client| client.company_name.as_str()).unwrap_or(""), CellStyle::Value);
        sheet.skip(1);
        sheet.text(0, "PROJET:", CellStyle::Label);
        sheet.text(1, project.map(|project| project.name.as_str()).unwrap_or(""), CellStyle::Value);
        sheet.skip(3);

        sheet.text(0, "GRILLE TARIFAIRE (TJM)", CellStyle::GridTitle);
        sheet.skip(1);
        sheet.text(0, "RÔLE", CellStyle::Header);
        sheet.text(1, "PRIX / JOUR", CellStyle::Header);
        sheet.skip(1);
        for column in &role_columns {
            sheet.text(0, column.role.clone(), CellStyle::Text);
            sheet.put(1, CellValue::Number(column.rate), CellStyle::Currency);
            sheet.skip(1);
        }
        sheet.skip(2);

        let mut item_rows = Vec::new();
        for section in &quote.sections {
            sheet.text(0, format!(" {}", section.title.to_uppercase()), CellStyle::SectionTitle);
            sheet.skip(1);

            sheet.text(0, "DESCRIPTION", CellStyle::Header);
            for column in &role_columns {
                sheet.text(column.col, column.role.clone(), CellStyle::Header);
            }
            sheet.text(days_col, "TOTAL JOURS", CellStyle::Header);
            sheet.text(price_col, "TOTAL PRIX", CellStyle::Header);
            sheet.skip(1);

            for item in &section.items {
                let row = sheet.row;
                sheet.text(0, format!("    {}", item.description), CellStyle::Text);
                for column in &role_columns {
                    sheet.put(column.col, CellValue::Number(item.days_for(&column.role)), CellStyle::Days);
                }
                sheet.put(days_col, CellValue::Formula(row_days_formula(row, role_count)), CellStyle::Days);
                let price = Formula::WeightedSum(
                    role_columns
                        .iter()
                        .map(|column| (CellRef::new(row, column.col), column.rate))
                        .collect(),
                );
                sheet.put(price_col, CellValue::Formula(price), CellStyle::Currency);
                item_rows.push(ItemRow {
                    section_id: section.id.clone(),
                    item_id: item.id.clone(),
                    row,
                });
                sheet.skip(1);
            }
            sheet.skip(1);
        }
        sheet.skip(1);

        let total_ht_formula = match (item_rows.first(), item_rows.last()) {
            (Some(first), Some(last)) => Formula::Sum(CellRange::new(
                CellRef::new(first.row, price_col),
                CellRef::new(last.row, price_col),
            )),
            _ => Formula::Constant(Decimal::ZERO),
        };
        let label_col = price_col - 1;
        sheet.text(label_col, "TOTAL HT", CellStyle::TotalLabel);
        let total_ht = sheet.put(price_col, CellValue::Formula(total_ht_formula), CellStyle::TotalValue);
        sheet.skip(1);

        let (vat, total_ttc) = if quote.has_vat {
            sheet.text(label_col, "TVA (20%)", CellStyle::TotalLabel);
            let vat = sheet.put(
                price_col,
                CellValue::Formula(Formula::Scale(total_ht, VAT_RATE)),
                CellStyle::TotalValue,
            );
            sheet.skip(1);
            sheet.text(label_col, "TOTAL TTC", CellStyle::TotalLabel);
            let ttc = sheet.put(
                price_col,
                CellValue::Formula(Formula::Scale(total_ht, TTC_FACTOR)),
                CellStyle::TotalValue,
            );
            (Some(vat), Some(ttc))
        } else {
            (None, None)
        };

        let mut column_widths = vec![(0, DESCRIPTION_WIDTH)];
        column_widths.extend(role_columns.iter().map(|column| (column.col, ROLE_WIDTH)));
        column_widths.push((days_col, DAYS_WIDTH));
        column_widths.push((price_col, PRICE_WIDTH));

        Self {
            sheet_name: sheet_name.to_string(),
            cells: sheet.cells,
            column_widths,
            layout: WorkbookLayout { role_columns, item_rows, days_col, price_col, total_ht, vat, total_ttc },
        }
    }

    pub fn cell(&self, cell: &CellRef) -> Option<&Cell> {
        self.cells.get(cell)
    }

    /// Non-empty cells in row-major order.
    pub fn cells(&self) -> impl Iterator<Item = (&CellRef, &Cell)> {
        self.cells.iter()
    }

    pub fn row_count(&self) -> u32 {
        self.cells.keys().map(|cell| cell.row + 1).max().unwrap_or(0)
    }

    /// Overwrites a cell with a literal number, like typing into it.
    pub fn set_number(&mut self, cell: CellRef, value: Decimal) {
        let style = self.cells.get(&cell).map(|existing| existing.style).unwrap_or(CellStyle::Days);
        self.cells.insert(cell, Cell { value: CellValue::Number(value), style });
    }

    /// Numeric value of a cell as a spreadsheet application would compute it.
    /// Empty cells are 0; text is skipped inside `SUM` and rejected elsewhere.
    pub fn evaluate(&self, cell: &CellRef) -> Result<Decimal, EvaluationError> {
        self.evaluate_at(cell, 0)
    }

    fn evaluate_at(&self, cell: &CellRef, depth: usize) -> Result<Decimal, EvaluationError> {
        if depth > MAX_EVALUATION_DEPTH {
            return Err(EvaluationError::TooDeep(*cell));
        }

        match self.cells.get(cell).map(|cell| &cell.value) {
            None => Ok(Decimal::ZERO),
            Some(CellValue::Number(value)) => Ok(*value),
            Some(CellValue::Text(_)) => Err(EvaluationError::NotNumeric(*cell)),
            Some(CellValue::Formula(formula)) => self.evaluate_formula(formula, depth + 1),
        }
    }

    fn evaluate_formula(&self, formula: &Formula, depth: usize) -> Result<Decimal, EvaluationError> {
        match formula {
            Formula::Sum(range) => {
                let mut total = Decimal::ZERO;
                for cell in range.cells() {
                    if matches!(self.cells.get(&cell).map(|cell| &cell.value), Some(CellValue::Text(_)))
                    {
                        continue;
                    }
                    total += self.evaluate_at(&cell, depth)?;
                }
                Ok(total)
            }
            Formula::WeightedSum(terms) => {
                let mut total = Decimal::ZERO;
                for (cell, coefficient) in terms {
                    total += self.evaluate_at(cell, depth)? * *coefficient;
                }
                Ok(total)
            }
            Formula::Scale(cell, factor) => Ok(self.evaluate_at(cell, depth)? * *factor),
            Formula::Constant(value) => Ok(*value),
        }
    }
}

/// Effective-rate roles in table order, then roles the quote uses without a
/// rate (coefficient 0) so every allocated day has a column.
fn role_columns(quote: &Quote, rates: &RateTable) -> Vec<RoleColumn> {
    let priced = rates.iter().map(|(role, rate)| (role.to_string(), rate, true));
    let unpriced = unpriced_roles(quote, rates).into_iter().map(|role| (role, Decimal::ZERO, false));

    priced
        .chain(unpriced)
        .enumerate()
        .map(|(index, (role, rate, priced))| RoleColumn {
            role,
            col: u16::try_from(index + 1).unwrap_or(u16::MAX),
            rate,
            priced,
        })
        .collect()
}

fn row_days_formula(row: u32, role_count: u16) -> Formula {
    if role_count == 0 {
        return Formula::Constant(Decimal::ZERO);
    }
    Formula::Sum(CellRange::new(CellRef::new(row, 1), CellRef::new(row, role_count)))
}

use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Zero-based cell coordinate. Ordered row-major.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CellRef {
    pub row: u32,
    pub col: u16,
}

impl CellRef {
    pub const fn new(row: u32, col: u16) -> Self {
        Self { row, col }
    }

    /// A1 notation, e.g. `(6, 1)` -> `B7`.
    pub fn a1(&self) -> String {
        format!("{}{}", column_letters(self.col), self.row + 1)
    }
}

impl fmt::Display for CellRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.a1())
    }
}

/// `0 -> A`, `25 -> Z`, `26 -> AA`.
pub fn column_letters(col: u16) -> String {
    let mut index = u32::from(col) + 1;
    let mut letters = Vec::new();
    while index > 0 {
        let remainder = (index - 1) % 26;
        letters.push(char::from(b'A' + remainder as u8));
        index = (index - 1) / 26;
    }
    letters.iter().rev().collect()
}

/// Inclusive rectangle of cells.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellRange {
    pub start: CellRef,
    pub end: CellRef,
}

impl CellRange {
    pub fn new(start: CellRef, end: CellRef) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, cell: &CellRef) -> bool {
        (self.start.row..=self.end.row).contains(&cell.row)
            && (self.start.col..=self.end.col).contains(&cell.col)
    }

    pub fn cells(&self) -> impl Iterator<Item = CellRef> + '_ {
        (self.start.row..=self.end.row)
            .flat_map(move |row| (self.start.col..=self.end.col).map(move |col| CellRef::new(row, col)))
    }
}

impl fmt::Display for CellRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.start, self.end)
    }
}

/// The handful of formula shapes a quote workbook needs. Rates are baked in
/// as literal coefficients, so no formula references another sheet region
/// except through these shapes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Formula {
    /// `SUM(B7:D7)`; text cells in the range are ignored.
    Sum(CellRange),
    /// `(B7*550)+(C7*600)`; an empty term list renders as `0`.
    WeightedSum(Vec<(CellRef, Decimal)>),
    /// `E20*0.2`
    Scale(CellRef, Decimal),
    Constant(Decimal),
}

impl Formula {
    /// Spreadsheet syntax without the leading `=`.
    pub fn to_excel(&self) -> String {
        match self {
            Self::Sum(range) => format!("SUM({range})"),
            Self::WeightedSum(terms) if terms.is_empty() => "0".to_string(),
            Self::WeightedSum(terms) => terms
                .iter()
                .map(|(cell, coefficient)| format!("({cell}*{})", literal(*coefficient)))
                .collect::<Vec<_>>()
                .join("+"),
            Self::Scale(cell, factor) => format!("{cell}*{}", literal(*factor)),
            Self::Constant(value) => literal(*value),
        }
    }

    /// Cells this formula reads.
    pub fn references(&self) -> Vec<CellRef> {
        match self {
            Self::Sum(range) => range.cells().collect(),
            Self::WeightedSum(terms) => terms.iter().map(|(cell, _)| *cell).collect(),
            Self::Scale(cell, _) => vec![*cell],
            Self::Constant(_) => Vec::new(),
        }
    }
}

impl fmt::Display for Formula {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "={}", self.to_excel())
    }
}

fn literal(value: Decimal) -> String {
    value.normalize().to_string()
}

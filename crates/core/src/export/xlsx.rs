//! xlsx serialization of a [`WorkbookModel`] with live formulas.

use crate::export::workbook::WorkbookModel;
use crate::export::ExportError;

/// `#,##0.00 "€"` for the default currency symbol.
pub fn currency_format(symbol: &str) -> String {
    format!("#,##0.00 \"{symbol}\"")
}

#[cfg(feature = "xlsx")]
pub fn write_xlsx(model: &WorkbookModel, currency_symbol: &str) -> Result<Vec<u8>, ExportError> {
    use rust_decimal::prelude::ToPrimitive;
    use rust_xlsxwriter::{Format, FormatAlign, Workbook};

    use crate::export::workbook::{CellStyle, CellValue};

    let workbook_error = |error: rust_xlsxwriter::XlsxError| ExportError::Workbook(error.to_string());
    let currency = currency_format(currency_symbol);

    let style_format = |style: CellStyle| -> Format {
        match style {
            CellStyle::Title => Format::new().set_bold().set_font_size(20).set_font_color(0x0F172A),
            CellStyle::Label => Format::new().set_bold().set_font_size(10).set_font_color(0x64748B),
            CellStyle::Value => Format::new().set_bold().set_font_size(11).set_font_color(0x0F172A),
            CellStyle::GridTitle => Format::new().set_bold().set_font_color(0x94A3B8),
            CellStyle::Header => Format::new()
                .set_bold()
                .set_font_color(0xFFFFFF)
                .set_background_color(0x1E293B)
                .set_align(FormatAlign::Center)
                .set_align(FormatAlign::VerticalCenter),
            CellStyle::SectionTitle => Format::new()
                .set_bold()
                .set_font_size(12)
                .set_font_color(0x312E81)
                .set_background_color(0xEEF2FF),
            CellStyle::Text => Format::new().set_font_size(10),
            CellStyle::Days => Format::new().set_font_size(10).set_align(FormatAlign::Center),
            CellStyle::Currency => Format::new()
                .set_font_size(10)
                .set_align(FormatAlign::Right)
                .set_num_format(currency.as_str()),
            CellStyle::TotalLabel => Format::new().set_bold().set_align(FormatAlign::Right),
            CellStyle::TotalValue => Format::new()
                .set_bold()
                .set_align(FormatAlign::Right)
                .set_background_color(0xF8FAFC)
                .set_num_format(currency.as_str()),
        }
    };

    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.set_name(model.sheet_name.as_str()).map_err(workbook_error)?;

    for (col, width) in &model.column_widths {
        sheet.set_column_width(*col, *width).map_err(workbook_error)?;
    }

    for (cell, content) in model.cells() {
        let format = style_format(content.style);
        match &content.value {
            CellValue::Text(text) => {
                sheet.write_with_format(cell.row, cell.col, text.as_str(), &format)
            }
            CellValue::Number(value) => {
                let value = value.to_f64().ok_or_else(|| {
                    ExportError::Workbook(format!("{value} at {cell} does not fit a spreadsheet number"))
                })?;
                sheet.write_with_format(cell.row, cell.col, value, &format)
            }
            CellValue::Formula(formula) => {
                sheet.write_formula_with_format(cell.row, cell.col, formula.to_string().as_str(), &format)
            }
        }
        .map_err(workbook_error)?;
    }

    let bytes = workbook.save_to_buffer().map_err(workbook_error)?;
    tracing::debug!(
        event_name = "export.xlsx.written",
        sheet = %model.sheet_name,
        bytes = bytes.len(),
        "workbook serialized"
    );
    Ok(bytes)
}

/// Built without a spreadsheet library: refuse rather than emit literals.
#[cfg(not(feature = "xlsx"))]
pub fn write_xlsx(model: &WorkbookModel, _currency_symbol: &str) -> Result<Vec<u8>, ExportError> {
    tracing::warn!(
        event_name = "export.xlsx.unavailable",
        sheet = %model.sheet_name,
        "xlsx feature disabled"
    );
    Err(ExportError::SpreadsheetUnavailable)
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::{currency_format, write_xlsx};
    use crate::domain::rates::RateTable;
    use crate::export::workbook::WorkbookModel;
    use crate::ids::SequentialIdGenerator;
    use crate::Quote;

    #[test]
    fn currency_format_embeds_symbol() {
        assert_eq!(currency_format("€"), "#,##0.00 \"€\"");
    }

    #[cfg(feature = "xlsx")]
    #[test]
    fn writes_a_zip_container() {
        let ids = SequentialIdGenerator::new("q");
        let quote = Quote::draft(&ids, "DEV-2026-0001", 30, Utc::now());
        let model = WorkbookModel::build(&quote, &RateTable::new(), None, None, "Chiffrage");

        let bytes = write_xlsx(&model, "€").expect("xlsx bytes");
        assert!(bytes.starts_with(b"PK"));
    }

    #[cfg(not(feature = "xlsx"))]
    #[test]
    fn reports_missing_spreadsheet_support() {
        let ids = SequentialIdGenerator::new("q");
        let quote = Quote::draft(&ids, "DEV-2026-0001", 30, Utc::now());
        let model = WorkbookModel::build(&quote, &RateTable::new(), None, None, "Chiffrage");

        assert!(matches!(
            write_xlsx(&model, "€"),
            Err(crate::export::ExportError::SpreadsheetUnavailable)
        ));
    }
}

//! Printable HTML rendering of a [`PrintView`].

use std::collections::HashMap;

use rust_decimal::{Decimal, RoundingStrategy};
use tera::{Context, Tera, Value};
use tracing::debug;

use crate::export::print::PrintView;
use crate::export::ExportError;

/// Registered under an `.html` name so tera auto-escapes every value.
pub const PRINT_TEMPLATE: &str = "print/quote.html";

const DATE_FORMAT: &str = "%d/%m/%Y";

/// Register the filters used by the print template.
///
/// - `money`: `amount | money(symbol="€")` -> `1 400,00 €`
/// - `days`:  `2.50 | days` -> `2,5`
pub fn register_template_filters(tera: &mut Tera) {
    tera.register_filter("money", tera_money_filter);
    tera.register_filter("days", tera_days_filter);
}

/// Two decimals, half away from zero, space-grouped thousands, decimal comma.
pub fn format_money(value: Decimal, symbol: &str) -> String {
    let rounded = value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    let text = format!("{:.2}", rounded.abs());
    let (units, cents) = text.split_once('.').unwrap_or((text.as_str(), "00"));

    let mut grouped = String::with_capacity(units.len() + units.len() / 3);
    for (index, digit) in units.chars().enumerate() {
        if index > 0 && (units.len() - index) % 3 == 0 {
            grouped.push(' ');
        }
        grouped.push(digit);
    }

    let sign = if rounded.is_sign_negative() && !rounded.is_zero() { "-" } else { "" };
    format!("{sign}{grouped},{cents} {symbol}")
}

pub fn format_days(value: Decimal) -> String {
    value.normalize().to_string().replace('.', ",")
}

fn decimal_from_value(value: &Value) -> tera::Result<Decimal> {
    match value {
        Value::Null => Ok(Decimal::ZERO),
        Value::String(text) => text
            .parse()
            .map_err(|_| tera::Error::msg(format!("`{text}` is not a decimal amount"))),
        Value::Number(number) => number
            .to_string()
            .parse()
            .map_err(|_| tera::Error::msg(format!("`{number}` is not a decimal amount"))),
        other => Err(tera::Error::msg(format!("cannot format {other} as an amount"))),
    }
}

fn tera_money_filter(value: &Value, args: &HashMap<String, Value>) -> tera::Result<Value> {
    let symbol = args.get("symbol").and_then(Value::as_str).unwrap_or("€");
    Ok(Value::String(format_money(decimal_from_value(value)?, symbol)))
}

fn tera_days_filter(value: &Value, _args: &HashMap<String, Value>) -> tera::Result<Value> {
    Ok(Value::String(format_days(decimal_from_value(value)?)))
}

#[derive(Clone, Debug)]
pub struct HtmlRenderer {
    tera: Tera,
    currency_symbol: String,
}

impl HtmlRenderer {
    pub fn new(currency_symbol: impl Into<String>) -> Result<Self, ExportError> {
        let mut tera = Tera::default();
        register_template_filters(&mut tera);
        tera.add_raw_template(
            PRINT_TEMPLATE,
            include_str!("../../../../templates/print/quote.html.tera"),
        )
        .map_err(|error| ExportError::Template(error.to_string()))?;

        Ok(Self { tera, currency_symbol: currency_symbol.into() })
    }

    pub fn render(&self, view: &PrintView) -> Result<String, ExportError> {
        let mut context = Context::new();
        context.insert("view", view);
        context.insert("currency", &self.currency_symbol);
        context.insert("issued_on", &view.header.date.format(DATE_FORMAT).to_string());
        context.insert("valid_until", &view.header.valid_until.format(DATE_FORMAT).to_string());

        let html = self
            .tera
            .render(PRINT_TEMPLATE, &context)
            .map_err(|error| ExportError::Template(error.to_string()))?;

        debug!(
            event_name = "export.html.rendered",
            reference = %view.header.reference,
            bytes = html.len(),
            "print view rendered"
        );
        Ok(html)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use rust_decimal::Decimal;

    use super::{format_days, format_money, HtmlRenderer};
    use crate::domain::quote::Quote;
    use crate::domain::rates::RateTable;
    use crate::export::print::PrintView;
    use crate::ids::SequentialIdGenerator;

    fn dec(value: &str) -> Decimal {
        value.parse().expect("decimal literal")
    }

    #[test]
    fn money_is_grouped_and_rounded_for_display_only() {
        assert_eq!(format_money(dec("1400"), "€"), "1 400,00 €");
        assert_eq!(format_money(dec("7213.5"), "€"), "7 213,50 €");
        assert_eq!(format_money(dec("0.005"), "€"), "0,01 €");
        assert_eq!(format_money(dec("1234567.891"), "$"), "1 234 567,89 $");
        assert_eq!(format_money(dec("-12"), "€"), "-12,00 €");
        assert_eq!(format_money(Decimal::ZERO, "€"), "0,00 €");
    }

    #[test]
    fn days_drop_trailing_zeros() {
        assert_eq!(format_days(dec("2.50")), "2,5");
        assert_eq!(format_days(dec("3")), "3");
    }

    fn landing_page(has_vat: bool) -> (Quote, RateTable) {
        let ids = SequentialIdGenerator::new("q");
        let created = Utc.with_ymd_and_hms(2026, 10, 1, 9, 0, 0).unwrap();
        let mut quote = Quote::draft(&ids, "DEV-2026-0042", 30, created);
        quote.has_vat = has_vat;
        quote.sections[0].title = "Build".to_string();
        let item = &mut quote.sections[0].items[0];
        item.description = "Landing page <b>v2</b>".to_string();
        item.set_days("Dev", dec("2")).expect("days");
        item.set_days("Design", dec("0.5")).expect("days");
        let rates =
            RateTable::try_from_pairs([("Dev", dec("550")), ("Design", dec("600"))]).expect("rates");
        (quote, rates)
    }

    #[test]
    fn renders_totals_and_vat_block() {
        let (quote, rates) = landing_page(true);
        let view = PrintView::build(&quote, &rates, None, None);
        let html = HtmlRenderer::new("€").expect("renderer").render(&view).expect("html");

        assert!(html.contains("CHIFFRAGE"));
        assert!(html.contains("DEV-2026-0042"));
        assert!(html.contains("01/10/2026"));
        assert!(html.contains("31/10/2026"));
        assert!(html.contains("BUILD"));
        assert!(html.contains("1 400,00 €"));
        assert!(html.contains("TVA (20%)"));
        assert!(html.contains("280,00 €"));
        assert!(html.contains("1 680,00 €"));
    }

    #[test]
    fn omits_vat_lines_without_vat() {
        let (quote, rates) = landing_page(false);
        let view = PrintView::build(&quote, &rates, None, None);
        let html = HtmlRenderer::new("€").expect("renderer").render(&view).expect("html");

        assert!(!html.contains("TVA (20%)"));
        assert!(!html.contains("TOTAL TTC"));
    }

    #[test]
    fn escapes_user_text() {
        let (quote, rates) = landing_page(false);
        let view = PrintView::build(&quote, &rates, None, None);
        let html = HtmlRenderer::new("€").expect("renderer").render(&view).expect("html");

        assert!(html.contains("&lt;b&gt;v2&lt;&#x2F;b&gt;"));
        assert!(!html.contains("<b>v2</b>"));
    }
}

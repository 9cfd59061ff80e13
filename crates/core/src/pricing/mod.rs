pub mod aggregation;
pub mod rates;

pub use aggregation::{
    item_days, item_total, quote_days, quote_role_days, quote_total, section_days,
    section_role_days, section_total, unpriced_roles, QuotePricing, SectionPricing, VatBreakdown,
    TTC_FACTOR, VAT_RATE,
};
pub use rates::resolve_rates;

use std::collections::{BTreeMap, BTreeSet};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::quote::{Quote, QuoteItem, QuoteSection, SectionId};
use crate::domain::rates::RateTable;

/// Fixed French VAT rate (20 %).
pub const VAT_RATE: Decimal = Decimal::from_parts(20, 0, 0, false, 2);
/// `1 + VAT_RATE`.
pub const TTC_FACTOR: Decimal = Decimal::from_parts(120, 0, 0, false, 2);

pub fn item_days(item: &QuoteItem) -> Decimal {
    item.details.values().copied().sum()
}

pub fn item_total(item: &QuoteItem, rates: &RateTable) -> Decimal {
    item.details.iter().map(|(role, days)| *days * rates.rate_or_zero(role)).sum()
}

pub fn section_days(section: &QuoteSection) -> Decimal {
    section.items.iter().map(item_days).sum()
}

pub fn section_total(section: &QuoteSection, rates: &RateTable) -> Decimal {
    section.items.iter().map(|item| item_total(item, rates)).sum()
}

pub fn section_role_days(section: &QuoteSection, role: &str) -> Decimal {
    section.items.iter().map(|item| item.days_for(role)).sum()
}

pub fn quote_days(quote: &Quote) -> Decimal {
    quote.sections.iter().map(section_days).sum()
}

/// Canonical `total_amount` (HT).
pub fn quote_total(quote: &Quote, rates: &RateTable) -> Decimal {
    quote.sections.iter().map(|section| section_total(section, rates)).sum()
}

/// Days per role across every section of the quote.
pub fn quote_role_days(quote: &Quote) -> BTreeMap<String, Decimal> {
    let mut totals = BTreeMap::new();
    for item in quote.sections.iter().flat_map(|section| section.items.iter()) {
        for (role, days) in &item.details {
            *totals.entry(role.clone()).or_insert(Decimal::ZERO) += *days;
        }
    }
    totals
}

/// Roles used by the quote that have no entry in the effective rate table.
pub fn unpriced_roles(quote: &Quote, rates: &RateTable) -> BTreeSet<String> {
    quote.roles_in_use().into_iter().filter(|role| !rates.contains(role)).map(str::to_owned).collect()
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VatBreakdown {
    pub total_ht: Decimal,
    pub vat: Option<Decimal>,
    pub total_ttc: Option<Decimal>,
}

impl VatBreakdown {
    pub fn new(total_ht: Decimal, has_vat: bool) -> Self {
        if has_vat {
            Self {
                total_ht,
                vat: Some(total_ht * VAT_RATE),
                total_ttc: Some(total_ht * TTC_FACTOR),
            }
        } else {
            Self { total_ht, vat: None, total_ttc: None }
        }
    }

    /// Amount the client pays: TTC with VAT, HT otherwise.
    pub fn payable(&self) -> Decimal {
        self.total_ttc.unwrap_or(self.total_ht)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionPricing {
    pub section_id: SectionId,
    pub title: String,
    pub days: Decimal,
    pub total: Decimal,
    pub role_days: BTreeMap<String, Decimal>,
}

/// Every figure the editor and the exports display for one quote.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotePricing {
    pub sections: Vec<SectionPricing>,
    pub total_days: Decimal,
    pub role_days: BTreeMap<String, Decimal>,
    pub totals: VatBreakdown,
    pub unpriced_roles: BTreeSet<String>,
}

impl QuotePricing {
    pub fn compute(quote: &Quote, rates: &RateTable) -> Self {
        let sections = quote
            .sections
            .iter()
            .map(|section| {
                let mut role_days = BTreeMap::new();
                for item in &section.items {
                    for (role, days) in &item.details {
                        *role_days.entry(role.clone()).or_insert(Decimal::ZERO) += *days;
                    }
                }
                SectionPricing {
                    section_id: section.id.clone(),
                    title: section.title.clone(),
                    days: section_days(section),
                    total: section_total(section, rates),
                    role_days,
                }
            })
            .collect::<Vec<_>>();

        let total_ht = sections.iter().map(|section| section.total).sum();

        Self {
            total_days: sections.iter().map(|section| section.days).sum(),
            sections,
            role_days: quote_role_days(quote),
            totals: VatBreakdown::new(total_ht, quote.has_vat),
            unpriced_roles: unpriced_roles(quote, rates),
        }
    }
}

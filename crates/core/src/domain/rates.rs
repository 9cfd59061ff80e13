use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::errors::DomainError;
use crate::sanitize::normalize_role;

/// Highest accepted daily price. Keeps every `days * rate` product and its
/// sums far inside `Decimal` range.
pub const MAX_DAILY_RATE: Decimal = Decimal::from_parts(10_000_000, 0, 0, false, 0);

/// Role name -> daily price (TJM). Iterates in role-name order.
///
/// Deserialization goes through [`RateTable::set`], so stored tables obey the
/// same rules as edited ones.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "BTreeMap<String, Decimal>", into = "BTreeMap<String, Decimal>")]
pub struct RateTable(BTreeMap<String, Decimal>);

impl RateTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a table from raw pairs, validating every role and price.
    pub fn try_from_pairs<I, S>(pairs: I) -> Result<Self, DomainError>
    where
        I: IntoIterator<Item = (S, Decimal)>,
        S: AsRef<str>,
    {
        let mut table = Self::new();
        for (role, rate) in pairs {
            table.set(role.as_ref(), rate)?;
        }
        Ok(table)
    }

    pub fn set(&mut self, role: &str, rate: Decimal) -> Result<(), DomainError> {
        let role = normalize_role(role)?;
        if (rate.is_sign_negative() && !rate.is_zero()) || rate > MAX_DAILY_RATE {
            return Err(DomainError::InvalidRate { role, rate });
        }
        self.0.insert(role, rate);
        Ok(())
    }

    pub fn remove(&mut self, role: &str) -> Option<Decimal> {
        self.0.remove(role)
    }

    pub fn get(&self, role: &str) -> Option<Decimal> {
        self.0.get(role).copied()
    }

    /// Unpriced roles resolve to zero.
    pub fn rate_or_zero(&self, role: &str) -> Decimal {
        self.get(role).unwrap_or(Decimal::ZERO)
    }

    pub fn contains(&self, role: &str) -> bool {
        self.0.contains_key(role)
    }

    pub fn roles(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Decimal)> {
        self.0.iter().map(|(role, rate)| (role.as_str(), *rate))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Key-by-key overlay: every role of `overrides` replaces or adds.
    pub fn overlay(&mut self, overrides: &RateTable) {
        for (role, rate) in &overrides.0 {
            self.0.insert(role.clone(), *rate);
        }
    }
}

impl TryFrom<BTreeMap<String, Decimal>> for RateTable {
    type Error = DomainError;

    fn try_from(raw: BTreeMap<String, Decimal>) -> Result<Self, Self::Error> {
        Self::try_from_pairs(raw)
    }
}

impl From<RateTable> for BTreeMap<String, Decimal> {
    fn from(table: RateTable) -> Self {
        table.0
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::{RateTable, MAX_DAILY_RATE};
    use crate::errors::DomainError;

    #[test]
    fn rejects_negative_rates() {
        let error = RateTable::try_from_pairs([("Dev", Decimal::from(-1))])
            .expect_err("negative rate should fail");
        assert!(matches!(error, DomainError::InvalidRate { .. }));
    }

    #[test]
    fn trims_role_keys() {
        let table = RateTable::try_from_pairs([(" Dev ", Decimal::from(500))]).expect("table");
        assert_eq!(table.get("Dev"), Some(Decimal::from(500)));
    }

    #[test]
    fn unpriced_role_is_zero() {
        let table = RateTable::new();
        assert_eq!(table.rate_or_zero("Design"), Decimal::ZERO);
        assert!(!table.contains("Design"));
    }

    #[test]
    fn serializes_as_plain_map() {
        let table = RateTable::try_from_pairs([("Dev", Decimal::from(500))]).expect("table");
        let json = serde_json::to_string(&table).expect("json");
        assert_eq!(json, r#"{"Dev":"500"}"#);
    }

    #[test]
    fn rejects_rates_above_the_ceiling() {
        let mut table = RateTable::new();
        table.set("Dev", MAX_DAILY_RATE).expect("ceiling itself is accepted");

        let error = table.set("Dev", Decimal::from(10_000_000_000_i64)).expect_err("too large");
        assert!(matches!(error, DomainError::InvalidRate { .. }));
        assert_eq!(table.get("Dev"), Some(MAX_DAILY_RATE));
    }

    #[test]
    fn deserialization_applies_rate_rules() {
        let table: RateTable =
            serde_json::from_str(r#"{" Dev ":"500","Design":"600"}"#).expect("valid table");
        assert_eq!(table.get("Dev"), Some(Decimal::from(500)));

        assert!(serde_json::from_str::<RateTable>(r#"{"Dev":"-1"}"#).is_err());
        assert!(serde_json::from_str::<RateTable>(r#"{"  ":"500"}"#).is_err());
        assert!(serde_json::from_str::<RateTable>(r#"{"Dev":"20000000"}"#).is_err());
    }
}

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::rates::RateTable;
use crate::sanitize::{sanitize_text, TITLE_MAX_CHARS};

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ClientId(pub String);

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Client {
    pub id: ClientId,
    pub name: String,
    pub company_name: String,
    pub email: String,
    pub address: String,
    pub default_rates: RateTable,
}

impl Client {
    /// Builds a client from form input, sanitizing every identity field.
    pub fn new(
        id: ClientId,
        name: &str,
        company_name: &str,
        email: &str,
        address: &str,
        default_rates: RateTable,
    ) -> Self {
        Self {
            id,
            name: sanitize_text(name, TITLE_MAX_CHARS),
            company_name: sanitize_text(company_name, TITLE_MAX_CHARS),
            email: sanitize_text(email, TITLE_MAX_CHARS),
            address: sanitize_text(address, TITLE_MAX_CHARS),
            default_rates,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Client, ClientId};
    use crate::domain::rates::RateTable;

    #[test]
    fn identity_fields_are_sanitized() {
        let client = Client::new(
            ClientId("c1".to_string()),
            " Alice   Dupont ",
            "<Toyota> Financial",
            "alice@tfs.com",
            "",
            RateTable::new(),
        );

        assert_eq!(client.name, "Alice Dupont");
        assert_eq!(client.company_name, "Toyota Financial");
        assert!(client.address.is_empty());
    }
}

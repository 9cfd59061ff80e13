use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::client::ClientId;
use crate::domain::rates::RateTable;
use crate::sanitize::{sanitize_text, DESCRIPTION_MAX_CHARS, TITLE_MAX_CHARS};

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProjectId(pub String);

impl fmt::Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: ProjectId,
    pub client_id: ClientId,
    pub name: String,
    pub description: Option<String>,
    /// Role-specific overrides on top of the client's default rates.
    #[serde(default)]
    pub specific_rates: RateTable,
}

impl Project {
    pub fn new(
        id: ProjectId,
        client_id: ClientId,
        name: &str,
        description: Option<&str>,
        specific_rates: RateTable,
    ) -> Self {
        let description = description
            .map(|value| sanitize_text(value, DESCRIPTION_MAX_CHARS))
            .filter(|value| !value.is_empty());

        Self {
            id,
            client_id,
            name: sanitize_text(name, TITLE_MAX_CHARS),
            description,
            specific_rates,
        }
    }

    pub fn belongs_to(&self, client_id: &ClientId) -> bool {
        &self.client_id == client_id
    }
}

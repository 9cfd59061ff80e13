use rust_decimal::Decimal;
use thiserror::Error;

use crate::domain::quote::{ItemId, SectionId};
use crate::export::ExportError;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("a {0} must be selected before the quote can be saved")]
    MissingSelection(&'static str),
    #[error("unknown section `{0}`")]
    UnknownSection(SectionId),
    #[error("unknown item `{item}` in section `{section}`")]
    UnknownItem { section: SectionId, item: ItemId },
    #[error("invalid role name `{0}`: role names must not be blank")]
    InvalidRole(String),
    #[error(
        "invalid day count {days} for role `{role}`: days must be between 0 and {max}",
        max = crate::domain::quote::MAX_DAYS
    )]
    InvalidDays { role: String, days: Decimal },
    #[error(
        "invalid daily rate {rate} for role `{role}`: rates must be between 0 and {max}",
        max = crate::domain::rates::MAX_DAILY_RATE
    )]
    InvalidRate { role: String, rate: Decimal },
    #[error("cannot move position {from} to {to} in a list of {len}")]
    InvalidMove { from: usize, to: usize, len: usize },
    #[error("reference `{0}` has no version number left")]
    VersionExhausted(String),
    #[error("domain invariant violation: {0}")]
    InvariantViolation(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("persistence failure: {0}")]
    Persistence(String),
    #[error("export failure: {0}")]
    Export(String),
    #[error("configuration failure: {0}")]
    Configuration(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("bad request: {message}")]
    BadRequest { message: String, correlation_id: String },
    #[error("service unavailable: {message}")]
    ServiceUnavailable { message: String, correlation_id: String },
    #[error("internal error: {message}")]
    Internal { message: String, correlation_id: String },
}

impl InterfaceError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::BadRequest { .. } => {
                "The request could not be processed. Check inputs and try again."
            }
            Self::ServiceUnavailable { .. } => {
                "The service is temporarily unavailable. Please retry shortly."
            }
            Self::Internal { .. } => "An unexpected internal error occurred.",
        }
    }

    pub fn correlation_id(&self) -> &str {
        match self {
            Self::BadRequest { correlation_id, .. }
            | Self::ServiceUnavailable { correlation_id, .. }
            | Self::Internal { correlation_id, .. } => correlation_id,
        }
    }
}

impl ApplicationError {
    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let correlation_id = correlation_id.into();
        let mut mapped = InterfaceError::from(self);
        match &mut mapped {
            InterfaceError::BadRequest { correlation_id: id, .. }
            | InterfaceError::ServiceUnavailable { correlation_id: id, .. }
            | InterfaceError::Internal { correlation_id: id, .. } => *id = correlation_id,
        }
        mapped
    }

    /// Stable snake_case label used by the CLI's `error_class` field.
    pub fn class(&self) -> &'static str {
        match self {
            Self::Domain(DomainError::MissingSelection(_)) => "missing_selection",
            Self::Domain(_) => "domain_validation",
            Self::Persistence(_) => "persistence",
            Self::Export(_) => "export",
            Self::Configuration(_) => "config_validation",
        }
    }
}

impl From<ExportError> for ApplicationError {
    fn from(value: ExportError) -> Self {
        Self::Export(value.to_string())
    }
}

impl From<ApplicationError> for InterfaceError {
    fn from(value: ApplicationError) -> Self {
        match value {
            ApplicationError::Domain(error) => Self::BadRequest {
                message: error.to_string(),
                correlation_id: "unassigned".to_owned(),
            },
            ApplicationError::Persistence(message) | ApplicationError::Export(message) => {
                Self::ServiceUnavailable { message, correlation_id: "unassigned".to_owned() }
            }
            ApplicationError::Configuration(message) => {
                Self::Internal { message, correlation_id: "unassigned".to_owned() }
            }
        }
    }
}

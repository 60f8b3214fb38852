use thiserror::Error;

/// Failure taxonomy shared by every pipeline stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A required credential or URL is absent. Fatal for the whole run.
    ConfigurationMissing,
    /// Malformed request body or schema violation on input.
    InputInvalid,
    /// Provider or AI capability unreachable or erroring.
    UpstreamUnavailable,
    /// The AI capability answered, but without usable structured output.
    ExtractionIncomplete,
    /// A required submission field is missing or malformed.
    ValidationFailure,
    /// Registry response undecodable or carrying a structured error.
    ProtocolFailure,
    /// Registry unreachable at the network level.
    TransportFailure,
    /// The caller aborted an in-flight registry call.
    Cancelled,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ConfigurationMissing => "configuration_missing",
            Self::InputInvalid => "input_invalid",
            Self::UpstreamUnavailable => "upstream_unavailable",
            Self::ExtractionIncomplete => "extraction_incomplete",
            Self::ValidationFailure => "validation_failure",
            Self::ProtocolFailure => "protocol_failure",
            Self::TransportFailure => "transport_failure",
            Self::Cancelled => "cancelled",
        }
    }
}

/// First unmet required-field invariant found while building a payload.
///
/// `field` is the form-level field name; `reason` is a user-displayable
/// sentence telling the user what to fix next.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{reason}")]
pub struct ValidationFailure {
    pub field: &'static str,
    pub reason: String,
}

impl ValidationFailure {
    pub fn new(field: &'static str, reason: impl Into<String>) -> Self {
        Self {
            field,
            reason: reason.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        ErrorKind::ValidationFailure
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("Missing required environment variables: {}", .0.join(", "))]
    Missing(Vec<&'static str>),

    #[error("{integration} integration is not configured. Set {}.", .vars.join(" and "))]
    NotConfigured {
        integration: &'static str,
        vars: Vec<&'static str>,
    },
}

impl ConfigError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::ConfigurationMissing
    }
}

use thiserror::Error;

/// Caller-supplied data that cannot be planned for. The only error that
/// leaves the route orchestrator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid {field}: {message}")]
pub struct InvalidInputError {
    pub field: &'static str,
    pub message: String,
}

impl InvalidInputError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }

    pub fn missing(field: &'static str) -> Self {
        Self::new(field, "value is required")
    }
}

/// Reasons a model answer could not be turned into structured data.
#[derive(Debug, Error)]
pub enum MalformedResponse {
    #[error("response is {len} bytes, above the {max} byte limit")]
    TooLarge { len: usize, max: usize },
    #[error("response contains no JSON object")]
    NoJsonObject,
    #[error("response JSON does not match the expected shape: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("field `{0}` is missing or empty")]
    MissingField(&'static str),
    #[error("field `{field}` is not numeric: {value}")]
    NotNumeric { field: &'static str, value: String },
    #[error("field `{field}` must be a finite non-negative number, got {value}")]
    OutOfRange { field: &'static str, value: f64 },
    #[error("coordinate ({latitude}, {longitude}) is outside the service area")]
    OutsideServiceArea { latitude: f64, longitude: f64 },
}

use thiserror::Error;

pub type Result<T> = std::result::Result<T, RecordsError>;

#[derive(Error, Debug)]
pub enum RecordsError {
    #[error("Malformed document: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Missing field: {0}")]
    MissingField(String),

    #[error("Invalid metric {field}: {value}")]
    InvalidMetric { field: String, value: f64 },

    #[error("Unknown IP type: {0}")]
    UnknownIpType(String),

    #[error("Incomplete treatment pair for {scope}/{ip_type}: missing {side}")]
    IncompletePair {
        scope: String,
        ip_type: String,
        side: &'static str,
    },
}

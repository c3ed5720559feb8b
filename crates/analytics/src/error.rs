use thiserror::Error;

pub type Result<T> = std::result::Result<T, AnalyticsError>;

#[derive(Error, Debug)]
pub enum AnalyticsError {
    #[error("Unknown metric: {0}")]
    UnknownMetric(String),

    #[error("Unknown sort direction: {0} (expected asc|desc)")]
    UnknownDirection(String),
}

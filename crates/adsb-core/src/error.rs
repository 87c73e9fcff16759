use thiserror::Error;

pub type Result<T> = std::result::Result<T, CoreError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoreError {
    #[error("invalid tracking rules: {0}")]
    InvalidRules(String),

    #[error("invalid zone: {0}")]
    InvalidZone(String),

    #[error("zone not found: {0}")]
    ZoneNotFound(String),

    #[error("report dropped: {0}")]
    InvalidReport(String),
}

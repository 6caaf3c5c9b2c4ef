use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid start date: {0}")]
    InvalidStartDate(String),
}

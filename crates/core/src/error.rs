use thiserror::Error;

#[derive(Debug, Error)]
pub enum SteplineError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("fetch error: {0}")]
    Fetch(String),
}

pub type Result<T> = std::result::Result<T, SteplineError>;

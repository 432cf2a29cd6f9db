use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("decode error: {0}")]
    Decode(String),

    #[error("persistence error: {0}")]
    Persistence(#[from] mongodb::error::Error),

    #[error("invalid time range: {0}")]
    InvalidRange(String),

    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("not authorized")]
    NotAuthorized,

    #[error("config validation error: {0}")]
    ConfigValidation(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

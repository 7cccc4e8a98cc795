mod app_error;
mod claim_error;

pub use app_error::AppError;
pub use claim_error::ClaimError;

use thiserror::Error;

pub type Result<T, E = ApplicationError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum ApplicationError {
    #[error(transparent)]
    Claim(#[from] ClaimError),

    #[error(transparent)]
    App(#[from] AppError),

    #[error("JSON error")]
    Json(#[from] serde_json::Error),

    #[error("An unknown error occurred: {0}")]
    Unknown(String),
}

impl From<anyhow::Error> for ApplicationError {
    fn from(err: anyhow::Error) -> Self {
        ApplicationError::Unknown(err.to_string())
    }
}

use thiserror::Error;

use crate::map::WorldId;

/// Errors for app logic.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("World {0} is not loaded")]
    WorldNotLoaded(WorldId),

    #[error("No command handler for {0}")]
    NoCommandHandler(String),

    #[error("Claim store rejected the write: {0}")]
    StoreRejected(String),
}

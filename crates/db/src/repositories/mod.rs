use thiserror::Error;

use expensa_core::errors::ApplicationError;

pub mod memory;
pub mod state;

pub use memory::InMemoryStateStore;
pub use state::{SqlStateStore, STATE_KEY};

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("encode error: {0}")]
    Encode(String),
}

impl From<RepositoryError> for ApplicationError {
    fn from(error: RepositoryError) -> Self {
        ApplicationError::Persistence(error.to_string())
    }
}

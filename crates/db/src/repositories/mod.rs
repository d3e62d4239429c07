use thiserror::Error;

use leadline_core::session::SessionStoreError;

pub mod memory;
pub mod session;

pub use memory::InMemorySessionStore;
pub use session::SqlSessionStore;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

impl From<RepositoryError> for SessionStoreError {
    fn from(error: RepositoryError) -> Self {
        match error {
            RepositoryError::Database(sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed) => {
                Self::Unavailable(error.to_string())
            }
            RepositoryError::Database(_) | RepositoryError::Decode(_) => {
                Self::Write(error.to_string())
            }
        }
    }
}

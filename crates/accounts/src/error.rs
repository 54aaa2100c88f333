//! Account-related errors

use thiserror::Error;

/// Account-related errors
#[derive(Error, Debug)]
pub enum AccountError {
    #[error("Account not found: {0}")]
    NotFound(String),

    #[error("Account already exists: {0}")]
    AlreadyExists(String),

    #[error("Invalid account data: {0}")]
    InvalidData(String),

    #[error("No player ids left")]
    IdsExhausted,
}

impl AccountError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, AccountError::NotFound(_))
    }
}

impl From<AccountError> for lobby_core::ServerError {
    fn from(err: AccountError) -> Self {
        lobby_core::ServerError::Storage(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AccountError>;

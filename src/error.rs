use thiserror::Error;
use warp::http::StatusCode;

use crate::store::StoreError;

pub type Result<T> = std::result::Result<T, ChatError>;

#[derive(Error, Debug)]
pub enum ChatError {
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    InvalidInput(String),
    #[error("{0}")]
    Conflict(String),
    #[error("Invalid credentials")]
    Unauthorized,
    #[error("storage failure: {0}")]
    Storage(#[from] StoreError),
    #[error("internal failure: {0}")]
    Internal(String),
}

impl ChatError {
    pub fn status(&self) -> StatusCode {
        match self {
            ChatError::NotFound(_) => StatusCode::NOT_FOUND,
            ChatError::Forbidden(_) => StatusCode::FORBIDDEN,
            ChatError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            ChatError::Conflict(_) => StatusCode::CONFLICT,
            ChatError::Unauthorized => StatusCode::UNAUTHORIZED,
            ChatError::Storage(_) | ChatError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to hand to a client. Server-side failures collapse to a
    /// generic string; the detail only goes to the log.
    pub fn public_message(&self) -> String {
        match self {
            ChatError::Storage(_) | ChatError::Internal(_) => "Server error".to_string(),
            other => other.to_string(),
        }
    }

    pub fn is_server_side(&self) -> bool {
        self.status().is_server_error()
    }
}

impl warp::reject::Reject for ChatError {}

impl From<bcrypt::BcryptError> for ChatError {
    fn from(err: bcrypt::BcryptError) -> Self {
        ChatError::Internal(err.to_string())
    }
}

impl From<jsonwebtoken::errors::Error> for ChatError {
    fn from(_: jsonwebtoken::errors::Error) -> Self {
        ChatError::Unauthorized
    }
}

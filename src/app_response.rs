use std::fmt::{Display, Formatter};
use std::io::Error as IoError;

use serde::{Deserialize, Serialize};
use serde_json::Error as SerdeError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AppResponse {
    ValidationError(String),
    NotFound(String),
    StorageError(String),
    SerializationError(String),
    BadRequest(String),
    Ok(String),
}

impl Display for AppResponse {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            AppResponse::ValidationError(msg) => write!(f, "Validation error: {}", msg),
            AppResponse::NotFound(msg) => write!(f, "Not found: {}", msg),
            AppResponse::StorageError(msg) => write!(f, "Storage error: {}", msg),
            AppResponse::SerializationError(msg) => write!(f, "Serialization error: {}", msg),
            AppResponse::BadRequest(msg) => write!(f, "Bad Request: {}", msg),
            AppResponse::Ok(msg) => write!(f, "Ok: {}", msg),
        }
    }
}

impl std::error::Error for AppResponse {}

impl From<SerdeError> for AppResponse {
    fn from(err: SerdeError) -> Self {
        AppResponse::SerializationError(format!("JSON serialization error: {}", err))
    }
}

impl From<IoError> for AppResponse {
    fn from(err: IoError) -> Self {
        AppResponse::StorageError(format!("IO error: {}", err))
    }
}

impl AppResponse {
    pub fn success(msg: impl Into<String>) -> Self {
        AppResponse::Ok(msg.into())
    }

    /// Bad input the caller can correct and retry, as opposed to an
    /// infrastructure fault.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            AppResponse::ValidationError(_) | AppResponse::NotFound(_) | AppResponse::BadRequest(_)
        )
    }
}

use memberd_core::ServiceError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SQLError {
    #[error("query error: {0}")]
    Query(String),

    #[error("execution error: {0}")]
    Execution(String),

    #[error("connection error: {0}")]
    Connection(String),
}

impl From<SQLError> for ServiceError {
    fn from(e: SQLError) -> Self {
        ServiceError::Storage(e.to_string())
    }
}

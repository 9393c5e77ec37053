use thiserror::Error;

use fql_codec::CodecError;

use crate::response::QueryFailure;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum QueryError {
    /// The body could not be decoded into the requested type.
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// The service answered with an error envelope.
    #[error("query failed with {}: {}", .0.code, .0.message)]
    Failure(QueryFailure),
}

impl QueryError {
    /// Service error code, when the service reported one.
    pub fn code(&self) -> Option<&str> {
        match self {
            QueryError::Failure(failure) => Some(&failure.code),
            QueryError::Codec(_) => None,
        }
    }
}

//! Error types for the CouchDB preference store.

use std::fmt;

use reqwest::StatusCode;
use thiserror::Error;

/// Convenient result alias returning [`CouchDaoError`] failures.
pub type CouchResult<T> = Result<T, CouchDaoError>;

/// Request the store was making when CouchDB failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CouchOperation {
    /// Checking that the preference database exists.
    InspectDatabase,
    /// Creating the preference database.
    CreateDatabase,
    /// Reading one preference document.
    ReadPreference,
    /// Writing one preference document.
    WritePreference,
    /// Periodic health check.
    HealthCheck,
}

impl fmt::Display for CouchOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CouchOperation::InspectDatabase => "inspect database",
            CouchOperation::CreateDatabase => "create database",
            CouchOperation::ReadPreference => "read preference",
            CouchOperation::WritePreference => "write preference",
            CouchOperation::HealthCheck => "health check",
        })
    }
}

/// Failures that can occur while interacting with CouchDB.
#[derive(Debug, Error)]
pub enum CouchDaoError {
    /// Required environment variable is missing.
    #[error("missing CouchDB environment variable `{var}`")]
    MissingEnvVar {
        /// Name of the variable.
        var: &'static str,
    },
    /// The HTTP client could not be built.
    #[error("failed to build CouchDB client")]
    ClientBuilder(#[source] reqwest::Error),
    /// The request never got a response.
    #[error("CouchDB {operation} on `{target}` failed")]
    Transport {
        /// What the store was doing.
        operation: CouchOperation,
        /// Database or document addressed.
        target: String,
        /// Client failure.
        #[source]
        source: reqwest::Error,
    },
    /// CouchDB answered with a status the operation does not accept.
    #[error("CouchDB {operation} on `{target}` answered {status}")]
    Status {
        /// What the store was doing.
        operation: CouchOperation,
        /// Database or document addressed.
        target: String,
        /// Status returned by the server.
        status: StatusCode,
    },
    /// A preference document body is not valid JSON for its shape.
    #[error("failed to decode preference document `{doc_id}`")]
    Decode {
        /// Document that was read.
        doc_id: String,
        /// Decoding failure.
        #[source]
        source: reqwest::Error,
    },
    /// A preference document does not carry a usable player id.
    #[error("invalid preference document `{doc_id}`: {message}")]
    InvalidDocument {
        /// Document that was read.
        doc_id: String,
        /// Why the id was rejected.
        message: String,
    },
}

impl CouchDaoError {
    /// True when the server rejected a write because the revision moved on.
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            CouchDaoError::Status {
                operation: CouchOperation::WritePreference,
                status: StatusCode::CONFLICT,
                ..
            }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_errors_name_the_operation() {
        let err = CouchDaoError::Status {
            operation: CouchOperation::WritePreference,
            target: "preference:1".into(),
            status: StatusCode::CONFLICT,
        };
        assert!(err.is_conflict());
        assert_eq!(
            err.to_string(),
            "CouchDB write preference on `preference:1` answered 409 Conflict"
        );

        let read = CouchDaoError::Status {
            operation: CouchOperation::ReadPreference,
            target: "preference:1".into(),
            status: StatusCode::CONFLICT,
        };
        assert!(!read.is_conflict());
    }
}

mod config;
mod error;
mod models;
mod store;

pub use config::CouchConfig;
pub use error::{CouchDaoError, CouchOperation};
pub use store::CouchPreferenceStore;

use crate::dao::storage::StorageError;

impl From<CouchDaoError> for StorageError {
    fn from(err: CouchDaoError) -> Self {
        match err {
            CouchDaoError::InvalidDocument { doc_id, message } => StorageError::Corrupt {
                key: doc_id,
                message,
            },
            other => StorageError::unavailable(other.to_string(), other),
        }
    }
}

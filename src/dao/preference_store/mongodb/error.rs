//! Error types for the MongoDB preference store.

use mongodb::error::Error as MongoError;
use thiserror::Error;

/// Result alias returning [`MongoDaoError`] failures.
pub type MongoResult<T> = std::result::Result<T, MongoDaoError>;

/// Failures while connecting to MongoDB or moving preferences in and out of it.
#[derive(Debug, Error)]
pub enum MongoDaoError {
    /// Required environment variable is missing.
    #[error("missing MongoDB environment variable `{var}`")]
    MissingEnvVar {
        /// Name of the variable.
        var: &'static str,
    },
    /// The connection string could not be parsed.
    #[error("failed to parse MongoDB connection URI `{uri}`")]
    InvalidUri {
        /// URI as configured.
        uri: String,
        /// Driver failure.
        #[source]
        source: MongoError,
    },
    /// The driver refused the parsed options.
    #[error("failed to build MongoDB client from options")]
    ClientConstruction {
        /// Driver failure.
        #[source]
        source: MongoError,
    },
    /// The server never answered a ping while connecting.
    #[error("MongoDB did not answer {attempts} ping(s) while connecting")]
    InitialPing {
        /// Pings sent before giving up.
        attempts: u32,
        /// Last driver failure.
        #[source]
        source: MongoError,
    },
    /// A ping on an established connection failed.
    #[error("MongoDB ping health check failed")]
    HealthPing {
        /// Driver failure.
        #[source]
        source: MongoError,
    },
    /// Upserting a preference failed.
    #[error("failed to save preference of player `{player_id}`")]
    SavePreference {
        /// Player whose preference was written.
        player_id: u64,
        /// Driver failure.
        #[source]
        source: MongoError,
    },
    /// Reading a preference failed, including documents that do not decode.
    #[error("failed to load preference of player `{player_id}`")]
    LoadPreference {
        /// Player whose preference was read.
        player_id: u64,
        /// Driver failure.
        #[source]
        source: MongoError,
    },
}

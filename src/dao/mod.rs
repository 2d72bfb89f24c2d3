/// Local catalog file persistence.
pub mod catalog_file;
/// Remote catalog source.
pub mod catalog_remote;
/// Database model definitions.
pub mod models;
/// Preference persistence backends.
pub mod preference_store;
/// Storage abstraction layer for database operations.
pub mod storage;

//! Locally persisted copy of the reward catalog.

use std::{
    io::{self, ErrorKind},
    path::{Path, PathBuf},
};

use thiserror::Error;
use tokio::fs;

use crate::{
    dto::catalog::{CatalogParseError, parse_catalog, render_catalog},
    state::catalog::RewardCatalog,
};

/// Failures while reading or writing the local catalog file.
#[derive(Debug, Error)]
pub enum CatalogFileError {
    /// The file exists but could not be read.
    #[error("failed to read catalog file `{path}`")]
    Read {
        /// File that was read.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: io::Error,
    },
    /// The file content is not a catalog.
    #[error("catalog file `{path}` is corrupt")]
    Parse {
        /// File that was parsed.
        path: PathBuf,
        /// Parser failure.
        #[source]
        source: CatalogParseError,
    },
    /// The catalog could not be turned into JSON.
    #[error("failed to serialize catalog")]
    Serialize(#[source] serde_json::Error),
    /// The file or its parent directories could not be written.
    #[error("failed to write catalog file `{path}`")]
    Write {
        /// File that was written.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: io::Error,
    },
}

/// JSON file holding the last catalog this server resolved.
#[derive(Debug, Clone)]
pub struct CatalogFile {
    path: PathBuf,
}

impl CatalogFile {
    /// Point at `path`; nothing is touched until the first load or save.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location of the file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read and parse the file; `Ok(None)` when it does not exist.
    pub async fn load(&self) -> Result<Option<RewardCatalog>, CatalogFileError> {
        let text = match fs::read_to_string(&self.path).await {
            Ok(text) => text,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(CatalogFileError::Read {
                    path: self.path.clone(),
                    source,
                });
            }
        };

        parse_catalog(&text)
            .map(Some)
            .map_err(|source| CatalogFileError::Parse {
                path: self.path.clone(),
                source,
            })
    }

    /// Overwrite the file with `catalog`, creating parent directories as needed.
    pub async fn save(&self, catalog: &RewardCatalog) -> Result<(), CatalogFileError> {
        let text = render_catalog(catalog).map_err(CatalogFileError::Serialize)?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .await
                .map_err(|source| CatalogFileError::Write {
                    path: self.path.clone(),
                    source,
                })?;
        }
        fs::write(&self.path, text)
            .await
            .map_err(|source| CatalogFileError::Write {
                path: self.path.clone(),
                source,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_file_is_absent_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let file = CatalogFile::new(dir.path().join("none.json"));
        assert!(file.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn save_creates_directories_and_load_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        let file = CatalogFile::new(dir.path().join("nested/dir/mvp-settings.json"));
        let catalog = RewardCatalog::builtin_default();
        file.save(&catalog).await.unwrap();
        assert_eq!(file.load().await.unwrap(), Some(catalog));
    }

    #[tokio::test]
    async fn corrupt_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mvp-settings.json");
        std::fs::write(&path, "{{{{").unwrap();
        assert!(matches!(
            CatalogFile::new(path).load().await,
            Err(CatalogFileError::Parse { .. })
        ));
    }
}

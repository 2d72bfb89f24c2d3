//! Resolution of the reward catalog from the local file, the remote source and the built-in
//! default.

use std::sync::Arc;

use tracing::{info, warn};

use crate::{
    config::AppConfig,
    dao::{
        catalog_file::CatalogFile,
        catalog_remote::{CatalogFetchError, HttpCatalogSource, RemoteCatalog},
    },
    error::CatalogError,
    state::{catalog::RewardCatalog, version::is_newer},
};

/// Where a resolved catalog came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogOrigin {
    /// Downloaded, then written to the local file.
    Remote,
    /// Read from the local file.
    Local,
    /// Compiled-in default, written to the local file.
    Builtin,
}

/// Result of a full synchronization.
#[derive(Debug)]
pub struct SyncOutcome {
    /// Catalog to install.
    pub catalog: RewardCatalog,
    /// Where it came from.
    pub origin: CatalogOrigin,
    /// Set when a remote source is configured and could not be used.
    pub remote_error: Option<CatalogFetchError>,
}

/// Picks the freshest available catalog and keeps the local file in step with it.
#[derive(Clone)]
pub struct CatalogSynchronizer {
    file: CatalogFile,
    remote: Option<Arc<dyn RemoteCatalog>>,
}

impl CatalogSynchronizer {
    /// Synchronizer over `file`, with an optional remote source.
    pub fn new(file: CatalogFile, remote: Option<Arc<dyn RemoteCatalog>>) -> Self {
        Self { file, remote }
    }

    /// Build from configuration. An empty catalog URL disables the remote source.
    pub fn from_config(config: &AppConfig) -> Self {
        let file = CatalogFile::new(config.settings.catalog_path.clone());
        let url = config.settings.catalog_url.trim();
        if url.is_empty() {
            return Self::new(file, None);
        }

        match HttpCatalogSource::new(url, config.fetch_timeout()) {
            Ok(source) => Self::new(file, Some(Arc::new(source))),
            Err(err) => {
                warn!(error = %err, "remote catalog source disabled");
                Self::new(file, None)
            }
        }
    }

    /// Resolve the catalog, never failing.
    pub async fn load_or_fetch(&self) -> RewardCatalog {
        self.synchronize().await.catalog
    }

    /// Resolve the catalog and report which source won.
    ///
    /// A remote copy replaces the local one when there is no usable local copy or when its version
    /// is strictly newer. Without either, the built-in default is written and used.
    pub async fn synchronize(&self) -> SyncOutcome {
        let local = match self.file.load().await {
            Ok(local) => local,
            Err(err) => {
                warn!(error = %err, "ignoring unusable local catalog");
                None
            }
        };

        let (remote, remote_error) = match &self.remote {
            Some(source) => match source.fetch().await {
                Ok(catalog) => (Some(catalog), None),
                Err(err) => {
                    warn!(error = %err, "failed to fetch remote catalog");
                    (None, Some(err))
                }
            },
            None => (None, None),
        };

        match (remote, local) {
            (Some(remote), local)
                if local
                    .as_ref()
                    .is_none_or(|local| is_newer(&remote.version, &local.version)) =>
            {
                info!(
                    version = %remote.version,
                    previous = local.as_ref().map(|l| l.version.as_str()).unwrap_or("none"),
                    "adopting remote catalog"
                );
                self.persist(&remote).await;
                SyncOutcome {
                    catalog: remote,
                    origin: CatalogOrigin::Remote,
                    remote_error,
                }
            }
            (_, Some(local)) => {
                info!(version = %local.version, "using local catalog");
                SyncOutcome {
                    catalog: local,
                    origin: CatalogOrigin::Local,
                    remote_error,
                }
            }
            (_, None) => {
                let catalog = RewardCatalog::builtin_default();
                info!(version = %catalog.version, "writing built-in default catalog");
                self.persist(&catalog).await;
                SyncOutcome {
                    catalog,
                    origin: CatalogOrigin::Builtin,
                    remote_error,
                }
            }
        }
    }

    /// Re-read only the local file, reporting failures instead of falling back.
    pub async fn reload_local(&self) -> Result<RewardCatalog, CatalogError> {
        self.file
            .load()
            .await?
            .ok_or_else(|| CatalogError::Missing(self.file.path().to_path_buf()))
    }

    async fn persist(&self, catalog: &RewardCatalog) {
        if let Err(err) = self.file.save(catalog).await {
            warn!(error = %err, "failed to persist catalog");
        }
    }
}

//! Remote catalog source fetched over HTTP.

use std::time::Duration;

use futures::future::BoxFuture;
use reqwest::{Client, StatusCode};
use thiserror::Error;

use crate::{
    dto::catalog::{CatalogParseError, parse_catalog},
    state::catalog::RewardCatalog,
};

/// Failures while fetching the remote catalog. None of them are fatal to the caller.
#[derive(Debug, Error)]
pub enum CatalogFetchError {
    /// The HTTP client could not be built.
    #[error("failed to build HTTP client")]
    ClientBuilder(#[source] reqwest::Error),
    /// No complete answer within the configured timeout.
    #[error("request to `{url}` timed out")]
    Timeout {
        /// Catalog URL.
        url: String,
    },
    /// The request could not be sent.
    #[error("failed to send request to `{url}`")]
    Send {
        /// Catalog URL.
        url: String,
        /// Client failure.
        #[source]
        source: reqwest::Error,
    },
    /// The server answered with a non-success status.
    #[error("unexpected response status {status} from `{url}`")]
    Status {
        /// Catalog URL.
        url: String,
        /// Status returned.
        status: StatusCode,
    },
    /// The body could not be read.
    #[error("failed to read response body from `{url}`")]
    Body {
        /// Catalog URL.
        url: String,
        /// Client failure.
        #[source]
        source: reqwest::Error,
    },
    /// The body is not a catalog.
    #[error("malformed catalog served by `{url}`")]
    Malformed {
        /// Catalog URL.
        url: String,
        /// Parser failure.
        #[source]
        source: CatalogParseError,
    },
}

/// Somewhere a fresher catalog may be obtained from.
pub trait RemoteCatalog: Send + Sync {
    /// Download and parse the catalog.
    fn fetch(&self) -> BoxFuture<'static, Result<RewardCatalog, CatalogFetchError>>;
}

/// Unauthenticated HTTP GET of a catalog document.
#[derive(Clone)]
pub struct HttpCatalogSource {
    client: Client,
    url: String,
}

impl HttpCatalogSource {
    /// Build a source whose requests give up after `timeout`.
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, CatalogFetchError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(CatalogFetchError::ClientBuilder)?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }

    async fn fetch_catalog(&self) -> Result<RewardCatalog, CatalogFetchError> {
        let url = self.url.clone();
        let response = self.client.get(&url).send().await.map_err(|source| {
            if source.is_timeout() {
                CatalogFetchError::Timeout { url: url.clone() }
            } else {
                CatalogFetchError::Send {
                    url: url.clone(),
                    source,
                }
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(CatalogFetchError::Status { url, status });
        }

        let body = response
            .text()
            .await
            .map_err(|source| CatalogFetchError::Body {
                url: url.clone(),
                source,
            })?;

        parse_catalog(&body).map_err(|source| CatalogFetchError::Malformed { url, source })
    }
}

impl RemoteCatalog for HttpCatalogSource {
    fn fetch(&self) -> BoxFuture<'static, Result<RewardCatalog, CatalogFetchError>> {
        let source = self.clone();
        Box::pin(async move { source.fetch_catalog().await })
    }
}

use std::sync::Arc;

use futures::future::BoxFuture;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use tracing::debug;

use crate::dao::{
    models::PreferenceEntity, preference_store::PreferenceStore, storage::StorageResult,
};

use super::{
    config::CouchConfig,
    error::{CouchDaoError, CouchOperation, CouchResult},
    models::{CouchPreferenceDocument, preference_doc_id},
};

/// CouchDB-backed [`PreferenceStore`], one document per player.
#[derive(Clone)]
pub struct CouchPreferenceStore {
    client: Client,
    database_url: Arc<str>,
    auth: Option<Arc<(String, String)>>,
}

impl CouchPreferenceStore {
    /// Establish a connection to CouchDB and ensure the database exists.
    pub async fn connect(config: CouchConfig) -> CouchResult<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(CouchDaoError::ClientBuilder)?;

        let database_url = format!(
            "{}/{}",
            config.base_url.trim_end_matches('/'),
            config.database
        );
        let store = Self {
            client,
            database_url: Arc::from(database_url),
            auth: config.credentials.map(Arc::new),
        };

        store.ensure_database().await?;
        Ok(store)
    }

    fn builder(&self, method: Method, doc_id: Option<&str>) -> RequestBuilder {
        let url = match doc_id {
            Some(doc_id) => format!("{}/{doc_id}", self.database_url),
            None => self.database_url.to_string(),
        };
        let builder = self.client.request(method, url);
        match self.auth.as_deref() {
            Some((user, pass)) => builder.basic_auth(user, Some(pass)),
            None => builder,
        }
    }

    async fn send(
        &self,
        operation: CouchOperation,
        target: &str,
        builder: RequestBuilder,
    ) -> CouchResult<Response> {
        builder
            .send()
            .await
            .map_err(|source| CouchDaoError::Transport {
                operation,
                target: target.to_owned(),
                source,
            })
    }

    fn unexpected(operation: CouchOperation, target: &str, status: StatusCode) -> CouchDaoError {
        CouchDaoError::Status {
            operation,
            target: target.to_owned(),
            status,
        }
    }

    async fn ensure_database(&self) -> CouchResult<()> {
        let target = self.database_url.as_ref();
        let response = self
            .send(
                CouchOperation::InspectDatabase,
                target,
                self.builder(Method::GET, None),
            )
            .await?;

        match response.status() {
            StatusCode::OK => Ok(()),
            StatusCode::NOT_FOUND => {
                let created = self
                    .send(
                        CouchOperation::CreateDatabase,
                        target,
                        self.builder(Method::PUT, None),
                    )
                    .await?;
                // 412 means another server created it first.
                match created.status() {
                    status if status.is_success() => Ok(()),
                    StatusCode::PRECONDITION_FAILED => Ok(()),
                    status => Err(Self::unexpected(CouchOperation::CreateDatabase, target, status)),
                }
            }
            status => Err(Self::unexpected(CouchOperation::InspectDatabase, target, status)),
        }
    }

    async fn read(&self, doc_id: &str) -> CouchResult<Option<CouchPreferenceDocument>> {
        let response = self
            .send(
                CouchOperation::ReadPreference,
                doc_id,
                self.builder(Method::GET, Some(doc_id)),
            )
            .await?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => response
                .json::<CouchPreferenceDocument>()
                .await
                .map(Some)
                .map_err(|source| CouchDaoError::Decode {
                    doc_id: doc_id.to_owned(),
                    source,
                }),
            status => Err(Self::unexpected(CouchOperation::ReadPreference, doc_id, status)),
        }
    }

    async fn write(&self, doc: &CouchPreferenceDocument) -> CouchResult<()> {
        let response = self
            .send(
                CouchOperation::WritePreference,
                &doc.id,
                self.builder(Method::PUT, Some(&doc.id)).json(doc),
            )
            .await?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(Self::unexpected(
                CouchOperation::WritePreference,
                &doc.id,
                response.status(),
            ))
        }
    }

    /// Overwrite the player's document, picking up the current revision first.
    ///
    /// A write racing another server gets one retry with the fresh revision.
    async fn upsert(&self, preference: PreferenceEntity) -> CouchResult<()> {
        let mut doc = CouchPreferenceDocument::from_entity(preference);
        doc.rev = self.read(&doc.id).await?.and_then(|existing| existing.rev);

        match self.write(&doc).await {
            Err(err) if err.is_conflict() => {
                debug!(doc_id = %doc.id, "preference revision moved; retrying write");
                doc.rev = self.read(&doc.id).await?.and_then(|existing| existing.rev);
                self.write(&doc).await
            }
            other => other,
        }
    }
}

impl PreferenceStore for CouchPreferenceStore {
    fn find_preference(
        &self,
        player_id: u64,
    ) -> BoxFuture<'static, StorageResult<Option<PreferenceEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let doc_id = preference_doc_id(player_id);
            match store.read(&doc_id).await? {
                Some(doc) => Ok(Some(doc.try_into_entity()?)),
                None => Ok(None),
            }
        })
    }

    fn save_preference(
        &self,
        preference: PreferenceEntity,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.upsert(preference).await.map_err(Into::into) })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let target = store.database_url.as_ref();
            let response = store
                .send(
                    CouchOperation::HealthCheck,
                    target,
                    store.builder(Method::HEAD, None),
                )
                .await?;
            if response.status().is_success() {
                Ok(())
            } else {
                Err(Self::unexpected(CouchOperation::HealthCheck, target, response.status()).into())
            }
        })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.ensure_database().await.map_err(Into::into) })
    }
}

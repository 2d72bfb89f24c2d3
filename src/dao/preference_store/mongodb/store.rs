use std::sync::Arc;

use futures::future::BoxFuture;
use mongodb::{Client, Collection, bson::doc};
use tokio::sync::RwLock;

use super::{
    config::MongoConfig,
    connection::establish_connection,
    error::{MongoDaoError, MongoResult},
    models::{MongoPreferenceDocument, doc_id},
};
use crate::dao::{
    models::PreferenceEntity, preference_store::PreferenceStore, storage::StorageResult,
};

const PREFERENCE_COLLECTION_NAME: &str = "mvp_player_preferences";

/// MongoDB-backed [`PreferenceStore`].
#[derive(Clone)]
pub struct MongoPreferenceStore {
    inner: Arc<MongoInner>,
}

struct MongoInner {
    state: RwLock<MongoState>,
    config: MongoConfig,
}

struct MongoState {
    #[allow(dead_code)]
    client: Client,
    database: mongodb::Database,
}

impl MongoInner {
    async fn ping(&self) -> MongoResult<()> {
        let database = {
            let guard = self.state.read().await;
            guard.database.clone()
        };

        database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|source| MongoDaoError::HealthPing { source })?;
        Ok(())
    }

    async fn reconnect(&self) -> MongoResult<()> {
        let (client, database) =
            establish_connection(&self.config.options, &self.config.database_name).await?;
        let mut guard = self.state.write().await;
        guard.client = client;
        guard.database = database;
        Ok(())
    }
}

impl MongoPreferenceStore {
    /// Establish a connection to MongoDB.
    pub async fn connect(config: MongoConfig) -> MongoResult<Self> {
        let (client, database) =
            establish_connection(&config.options, &config.database_name).await?;

        let inner = Arc::new(MongoInner {
            state: RwLock::new(MongoState { client, database }),
            config,
        });

        Ok(Self { inner })
    }

    async fn collection(&self) -> Collection<MongoPreferenceDocument> {
        let guard = self.inner.state.read().await;
        guard
            .database
            .collection::<MongoPreferenceDocument>(PREFERENCE_COLLECTION_NAME)
    }

    async fn find_preference(&self, player_id: u64) -> MongoResult<Option<PreferenceEntity>> {
        let collection = self.collection().await;

        let document = collection
            .find_one(doc_id(player_id))
            .await
            .map_err(|source| MongoDaoError::LoadPreference { player_id, source })?;

        Ok(document.map(Into::into))
    }

    async fn save_preference(&self, preference: PreferenceEntity) -> MongoResult<()> {
        let player_id = preference.player_id;
        let document: MongoPreferenceDocument = preference.into();
        let collection = self.collection().await;

        collection
            .replace_one(doc_id(player_id), &document)
            .upsert(true)
            .await
            .map_err(|source| MongoDaoError::SavePreference { player_id, source })?;

        Ok(())
    }
}

impl PreferenceStore for MongoPreferenceStore {
    fn find_preference(
        &self,
        player_id: u64,
    ) -> BoxFuture<'static, StorageResult<Option<PreferenceEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.find_preference(player_id).await.map_err(Into::into) })
    }

    fn save_preference(
        &self,
        preference: PreferenceEntity,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.save_preference(preference).await.map_err(Into::into) })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.ping().await.map_err(Into::into) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.reconnect().await.map_err(Into::into) })
    }
}

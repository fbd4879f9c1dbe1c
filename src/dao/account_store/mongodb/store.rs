use std::sync::Arc;

use futures::future::BoxFuture;
use mongodb::{Client, Collection, Database, bson::doc, options::IndexOptions};
use tokio::sync::RwLock;

use super::{
    connection::{MongoConfig, establish_connection},
    error::{MongoDaoError, MongoResult},
    models::MongoAccountDocument,
};
use crate::dao::{account_store::AccountStore, models::AccountEntity, storage::StorageResult};

const ACCOUNT_COLLECTION_NAME: &str = "accounts";

/// MongoDB-backed implementation of the [`AccountStore`] trait.
#[derive(Clone)]
pub struct MongoAccountStore {
    inner: Arc<MongoInner>,
}

struct MongoInner {
    state: RwLock<MongoState>,
    config: MongoConfig,
}

struct MongoState {
    client: Client,
    database: Database,
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

impl MongoAccountStore {
    /// Establish a connection to MongoDB and ensure indexes are present.
    pub async fn connect(config: MongoConfig) -> MongoResult<Self> {
        let (client, database) =
            establish_connection(&config.options, &config.database_name).await?;

        let inner = Arc::new(MongoInner {
            state: RwLock::new(MongoState { client, database }),
            config,
        });

        let store = Self { inner };
        store.ensure_indexes().await?;
        Ok(store)
    }

    async fn ensure_indexes(&self) -> MongoResult<()> {
        // `_id` is the handle, so lookups are covered; the secondary index
        // keeps leaderboard-style scans by tag count cheap.
        let collection = self.collection().await;
        let index = mongodb::IndexModel::builder()
            .keys(doc! {"stats.tags_inflicted": -1})
            .options(
                IndexOptions::builder()
                    .name(Some("account_tags_idx".to_owned()))
                    .build(),
            )
            .build();

        collection
            .create_index(index)
            .await
            .map_err(|source| MongoDaoError::EnsureIndex {
                collection: ACCOUNT_COLLECTION_NAME,
                index: "stats.tags_inflicted",
                source,
            })?;

        Ok(())
    }

    async fn collection(&self) -> Collection<MongoAccountDocument> {
        let guard = self.inner.state.read().await;
        guard
            .database
            .collection::<MongoAccountDocument>(ACCOUNT_COLLECTION_NAME)
    }

    async fn find_account(&self, handle: &str) -> MongoResult<Option<AccountEntity>> {
        let collection = self.collection().await;

        let document = collection
            .find_one(doc! { "_id": handle })
            .await
            .map_err(|source| MongoDaoError::LoadAccount {
                handle: handle.to_owned(),
                source,
            })?;

        Ok(document.map(Into::into))
    }

    async fn upsert_account(&self, account: AccountEntity) -> MongoResult<()> {
        let handle = account.handle.clone();
        let document: MongoAccountDocument = account.into();
        let collection = self.collection().await;

        collection
            .replace_one(doc! { "_id": &handle }, &document)
            .upsert(true)
            .await
            .map_err(|source| MongoDaoError::SaveAccount { handle, source })?;

        Ok(())
    }
}

impl AccountStore for MongoAccountStore {
    fn find(&self, handle: &str) -> BoxFuture<'static, StorageResult<Option<AccountEntity>>> {
        let store = self.clone();
        let handle = handle.to_owned();
        Box::pin(async move { store.find_account(&handle).await.map_err(Into::into) })
    }

    fn upsert(&self, account: AccountEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.upsert_account(account).await.map_err(Into::into) })
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

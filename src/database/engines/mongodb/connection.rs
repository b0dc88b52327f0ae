//! MongoDB Connection Implementation
//!
//! Implements [`DocumentStore`] over the official `mongodb` driver. Documents
//! cross the boundary as extended JSON: filters and updates are parsed into
//! BSON (so `{"$oid": ..}` and `{"$date": ..}` become typed values) and
//! results are rendered back to JSON before decoding into the caller's type.

use super::config::MongoConfig;
use crate::database::engine::{required, DocumentStore, OperationTimeout};
use crate::database::object_id::ObjectId;
use crate::database::types::{
    CountOpt, Document, FindAndUpdateOpt, FindOneOpt, FindOpt, InsertedId, UpdateOpt,
    UpdateResult,
};
use crate::error::{Error, Result};
use ::mongodb::{
    bson::{doc, Bson, Document as BsonDocument},
    options::{
        ClientOptions, CountOptions, FindOneAndDeleteOptions, FindOneAndReplaceOptions,
        FindOneAndUpdateOptions, FindOneOptions, FindOptions, ReplaceOptions, ReturnDocument,
        UpdateOptions,
    },
    Client, Collection,
};
use async_trait::async_trait;
use futures::stream::TryStreamExt;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use std::future::IntoFuture;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Live driver handles, present between `connect` and `close`
struct Connected {
    client: Client,
    collection: Collection<BsonDocument>,
}

/// Native MongoDB driver backend
pub struct MongoClient {
    config: Arc<MongoConfig>,
    state: RwLock<Option<Connected>>,
    timeout: OperationTimeout,
}

impl MongoClient {
    /// Create an unconnected client; call [`DocumentStore::connect`] before use
    pub fn new(config: MongoConfig) -> Self {
        Self {
            config: Arc::new(config),
            state: RwLock::new(None),
            timeout: OperationTimeout::default(),
        }
    }

    pub fn config(&self) -> &MongoConfig {
        &self.config
    }

    /// Connection string built from the configuration
    pub fn uri(&self) -> String {
        self.config.uri()
    }

    pub async fn is_connected(&self) -> bool {
        self.state.read().await.is_some()
    }

    /// Underlying driver client, for operations outside [`DocumentStore`]
    pub async fn driver(&self) -> Result<Client> {
        let state = self.state.read().await;
        state
            .as_ref()
            .map(|c| c.client.clone())
            .ok_or(Error::NotConnected)
    }

    async fn collection(&self) -> Result<Collection<BsonDocument>> {
        let state = self.state.read().await;
        state
            .as_ref()
            .map(|c| c.collection.clone())
            .ok_or(Error::NotConnected)
    }

    /// Run one driver call under the current deadline
    async fn with_deadline<F, T>(&self, operation: &'static str, call: F) -> Result<T>
    where
        F: IntoFuture<Output = ::mongodb::error::Result<T>>,
    {
        let deadline = self.timeout();
        debug!(
            operation,
            collection = %self.config.collection,
            ?deadline,
            "Running MongoDB operation"
        );

        match tokio::time::timeout(deadline, call).await {
            Ok(result) => result.map_err(convert_mongodb_error),
            Err(_) => {
                warn!(operation, ?deadline, "MongoDB operation deadline exceeded");
                Err(Error::DeadlineExceeded(deadline))
            }
        }
    }

    async fn open(&self) -> Result<Connected> {
        let mut options = ClientOptions::parse(self.config.uri())
            .await
            .map_err(convert_mongodb_error)?;

        let pool = &self.config.pool_options;
        options.max_pool_size = pool.max_pool_size;
        options.min_pool_size = pool.min_pool_size;
        options.connect_timeout = pool.connect_timeout_secs.map(Duration::from_secs);
        options.server_selection_timeout =
            pool.server_selection_timeout_secs.map(Duration::from_secs);
        options.app_name = pool.app_name.clone();

        let client = Client::with_options(options).map_err(convert_mongodb_error)?;

        // Ping to verify connection
        self.with_deadline(
            "ping",
            client.database("admin").run_command(doc! { "ping": 1 }),
        )
        .await?;

        let collection = client
            .database(&self.config.database)
            .collection::<BsonDocument>(&self.config.collection);

        Ok(Connected { client, collection })
    }
}

#[async_trait]
impl DocumentStore for MongoClient {
    async fn connect(&self) -> Result<()> {
        self.config.validate()?;

        let mut state = self.state.write().await;
        if state.is_some() {
            return Ok(());
        }

        *state = Some(self.open().await?);
        info!(
            server = %self.config.server,
            database = %self.config.database,
            collection = %self.config.collection,
            "MongoDB connection established"
        );
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        let connected = self.state.write().await.take();
        if let Some(Connected { client, .. }) = connected {
            let deadline = self.timeout();
            if tokio::time::timeout(deadline, client.shutdown()).await.is_err() {
                warn!(?deadline, "MongoDB shutdown did not finish before the deadline");
                return Err(Error::DeadlineExceeded(deadline));
            }
            info!(database = %self.config.database, "MongoDB connection closed");
        }
        Ok(())
    }

    fn set_timeout(&self, timeout: Duration) {
        self.timeout.set(timeout);
    }

    fn timeout(&self) -> Duration {
        self.timeout.get()
    }

    async fn find_one<T>(&self, filter: Option<Document>, opt: Option<FindOneOpt>) -> Result<T>
    where
        T: DeserializeOwned + Send,
    {
        let filter = bson_from_json(filter.unwrap_or_default())?;
        let mut options = FindOneOptions::default();
        options.projection = opt.and_then(|o| o.projection).map(bson_from_json).transpose()?;

        let coll = self.collection().await?;
        let found = self
            .with_deadline("findOne", coll.find_one(filter).with_options(options))
            .await?;

        found.map_or(Err(Error::NoDocuments), decode)
    }

    async fn find<T>(&self, filter: Option<Document>, opt: Option<FindOpt>) -> Result<Vec<T>>
    where
        T: DeserializeOwned + Send,
    {
        let filter = bson_from_json(filter.unwrap_or_default())?;
        let opt = opt.unwrap_or_default();
        let mut options = FindOptions::default();
        options.projection = opt.projection.map(bson_from_json).transpose()?;
        options.sort = opt.sort.map(bson_from_json).transpose()?;
        options.limit = opt.limit;
        options.skip = opt.skip.and_then(non_negative);

        let coll = self.collection().await?;
        let documents = self
            .with_deadline("find", async {
                let cursor = coll.find(filter).with_options(options).await?;
                cursor.try_collect::<Vec<_>>().await
            })
            .await?;

        decode_all(documents)
    }

    async fn insert_one(&self, document: Option<Document>) -> Result<InsertedId> {
        let document = bson_from_json(required(document)?)?;

        let coll = self.collection().await?;
        let res = self
            .with_deadline("insertOne", coll.insert_one(document))
            .await?;

        inserted_id(res.inserted_id)
    }

    async fn insert_many(&self, documents: Option<Vec<Document>>) -> Result<Vec<InsertedId>> {
        let documents = required(documents)?;
        if documents.is_empty() {
            return Err(Error::NilDocument);
        }
        let documents = documents
            .into_iter()
            .map(bson_from_json)
            .collect::<Result<Vec<_>>>()?;

        let coll = self.collection().await?;
        let res = self
            .with_deadline("insertMany", coll.insert_many(documents))
            .await?;

        let mut ids: Vec<(usize, Bson)> = res.inserted_ids.into_iter().collect();
        ids.sort_by_key(|(index, _)| *index);
        ids.into_iter().map(|(_, id)| inserted_id(id)).collect()
    }

    async fn update_one(
        &self,
        filter: Option<Document>,
        update: Option<Document>,
        opt: Option<UpdateOpt>,
    ) -> Result<UpdateResult> {
        let filter = bson_from_json(required(filter)?)?;
        let update = bson_from_json(required(update)?)?;
        let mut options = UpdateOptions::default();
        options.upsert = opt.and_then(|o| o.upsert);

        let coll = self.collection().await?;
        let res = self
            .with_deadline("updateOne", coll.update_one(filter, update).with_options(options))
            .await?;

        update_result(res)
    }

    async fn update_many(
        &self,
        filter: Option<Document>,
        update: Option<Document>,
        opt: Option<UpdateOpt>,
    ) -> Result<UpdateResult> {
        let filter = bson_from_json(required(filter)?)?;
        let update = bson_from_json(required(update)?)?;
        let mut options = UpdateOptions::default();
        options.upsert = opt.and_then(|o| o.upsert);

        let coll = self.collection().await?;
        let res = self
            .with_deadline(
                "updateMany",
                coll.update_many(filter, update).with_options(options),
            )
            .await?;

        update_result(res)
    }

    async fn replace_one(
        &self,
        filter: Option<Document>,
        replacement: Option<Document>,
        opt: Option<UpdateOpt>,
    ) -> Result<UpdateResult> {
        let filter = bson_from_json(required(filter)?)?;
        let replacement = bson_from_json(required(replacement)?)?;
        let mut options = ReplaceOptions::default();
        options.upsert = opt.and_then(|o| o.upsert);

        let coll = self.collection().await?;
        let res = self
            .with_deadline(
                "replaceOne",
                coll.replace_one(filter, replacement).with_options(options),
            )
            .await?;

        update_result(res)
    }

    async fn delete_one(&self, filter: Option<Document>) -> Result<i64> {
        let filter = bson_from_json(required(filter)?)?;

        let coll = self.collection().await?;
        let res = self
            .with_deadline("deleteOne", coll.delete_one(filter))
            .await?;

        Ok(count(res.deleted_count))
    }

    async fn delete_many(&self, filter: Option<Document>) -> Result<i64> {
        let filter = bson_from_json(required(filter)?)?;

        let coll = self.collection().await?;
        let res = self
            .with_deadline("deleteMany", coll.delete_many(filter))
            .await?;

        Ok(count(res.deleted_count))
    }

    async fn aggregate<T>(&self, pipeline: Option<Vec<Document>>) -> Result<Vec<T>>
    where
        T: DeserializeOwned + Send,
    {
        let pipeline = required(pipeline)?
            .into_iter()
            .map(bson_from_json)
            .collect::<Result<Vec<_>>>()?;

        let coll = self.collection().await?;
        let documents = self
            .with_deadline("aggregate", async {
                let cursor = coll.aggregate(pipeline).await?;
                cursor.try_collect::<Vec<_>>().await
            })
            .await?;

        decode_all(documents)
    }

    async fn count_documents(&self, filter: Option<Document>, opt: Option<CountOpt>) -> Result<i64> {
        let filter = bson_from_json(filter.unwrap_or_default())?;
        let opt = opt.unwrap_or_default();
        let mut options = CountOptions::default();
        options.limit = opt.limit.and_then(non_negative);
        options.skip = opt.skip.and_then(non_negative);

        let coll = self.collection().await?;
        let n = self
            .with_deadline(
                "countDocuments",
                coll.count_documents(filter).with_options(options),
            )
            .await?;

        Ok(count(n))
    }

    async fn find_one_and_delete<T>(
        &self,
        filter: Option<Document>,
        opt: Option<FindOneOpt>,
    ) -> Result<T>
    where
        T: DeserializeOwned + Send,
    {
        let filter = bson_from_json(required(filter)?)?;
        let mut options = FindOneAndDeleteOptions::default();
        options.projection = opt.and_then(|o| o.projection).map(bson_from_json).transpose()?;

        let coll = self.collection().await?;
        let previous = self
            .with_deadline(
                "findOneAndDelete",
                coll.find_one_and_delete(filter).with_options(options),
            )
            .await?;

        previous.map_or(Err(Error::NoDocuments), decode)
    }

    async fn find_one_and_replace<T>(
        &self,
        filter: Option<Document>,
        replacement: Option<Document>,
        opt: Option<FindAndUpdateOpt>,
    ) -> Result<T>
    where
        T: DeserializeOwned + Send,
    {
        let filter = bson_from_json(required(filter)?)?;
        let replacement = bson_from_json(required(replacement)?)?;
        let opt = opt.unwrap_or_default();
        let mut options = FindOneAndReplaceOptions::default();
        options.projection = opt.projection.map(bson_from_json).transpose()?;
        options.upsert = opt.upsert;
        options.return_document = Some(ReturnDocument::Before);

        let coll = self.collection().await?;
        let previous = self
            .with_deadline(
                "findOneAndReplace",
                coll.find_one_and_replace(filter, replacement)
                    .with_options(options),
            )
            .await?;

        previous.map_or(Err(Error::NoDocuments), decode)
    }

    async fn find_one_and_update<T>(
        &self,
        filter: Option<Document>,
        update: Option<Document>,
        opt: Option<FindAndUpdateOpt>,
    ) -> Result<T>
    where
        T: DeserializeOwned + Send,
    {
        let filter = bson_from_json(required(filter)?)?;
        let update = bson_from_json(required(update)?)?;
        let opt = opt.unwrap_or_default();
        let mut options = FindOneAndUpdateOptions::default();
        options.projection = opt.projection.map(bson_from_json).transpose()?;
        options.upsert = opt.upsert;
        options.return_document = Some(ReturnDocument::Before);

        let coll = self.collection().await?;
        let previous = self
            .with_deadline(
                "findOneAndUpdate",
                coll.find_one_and_update(filter, update).with_options(options),
            )
            .await?;

        previous.map_or(Err(Error::NoDocuments), decode)
    }

    fn object_id(&self, hex: &str) -> Result<ObjectId> {
        let native = ObjectId::parse_str(hex)?.to_native()?;
        Ok(ObjectId::from_native(native))
    }
}

/// MongoDB specific error conversion
pub(crate) fn convert_mongodb_error(err: ::mongodb::error::Error) -> Error {
    if let ::mongodb::error::ErrorKind::Authentication { .. } = err.kind.as_ref() {
        warn!("MongoDB authentication failed: {}", err);
    }
    Error::Backend(err)
}

/// Convert JSON to a BSON document, parsing extended JSON values
fn bson_from_json(json: Document) -> Result<BsonDocument> {
    let bson = Bson::try_from(JsonValue::Object(json))
        .map_err(|e| Error::Bson(format!("JSON to BSON error: {}", e)))?;

    if let Bson::Document(doc) = bson {
        Ok(doc)
    } else {
        Err(Error::Bson("Expected BSON document".to_string()))
    }
}

/// Convert BSON to JSON
fn json_from_bson(bson: Bson) -> Result<JsonValue> {
    serde_json::to_value(&bson).map_err(|e| Error::Bson(format!("BSON to JSON error: {}", e)))
}

fn decode<T: DeserializeOwned>(document: BsonDocument) -> Result<T> {
    let json = json_from_bson(Bson::Document(document))?;
    serde_json::from_value(json).map_err(Error::decode_target::<T>)
}

fn decode_all<T: DeserializeOwned>(documents: Vec<BsonDocument>) -> Result<Vec<T>> {
    let json = json_from_bson(Bson::Array(
        documents.into_iter().map(Bson::Document).collect(),
    ))?;
    serde_json::from_value(json).map_err(Error::decode_target::<Vec<T>>)
}

/// Typed object ids become [`InsertedId::ObjectId`]; other ids pass through as JSON
fn inserted_id(id: Bson) -> Result<InsertedId> {
    match id {
        Bson::ObjectId(oid) => Ok(InsertedId::ObjectId(ObjectId::from_native(oid))),
        other => Ok(InsertedId::Raw(json_from_bson(other)?)),
    }
}

fn update_result(res: ::mongodb::results::UpdateResult) -> Result<UpdateResult> {
    let upserted_id = res.upserted_id.map(inserted_id).transpose()?;

    Ok(UpdateResult {
        matched_count: count(res.matched_count),
        modified_count: count(res.modified_count),
        upserted_count: i64::from(upserted_id.is_some()),
        upserted_id,
        acknowledged: true,
    })
}

fn count(n: u64) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

/// Negative skip/limit values are treated as unset
fn non_negative(n: i64) -> Option<u64> {
    u64::try_from(n).ok()
}

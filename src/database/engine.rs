//! Document Store Abstraction Layer
//!
//! One CRUD/aggregation contract implemented by the Data API backend and the
//! native driver backend. Callers program against [`DocumentStore`] and pick
//! a concrete backend through configuration with [`Backend::from_config`].

use super::engines::{data_api, mongodb};
use super::object_id::{ObjectId, Timestamp};
use super::types::{
    CountOpt, Document, FindAndUpdateOpt, FindOneOpt, FindOpt, InsertedId, UpdateOpt,
    UpdateResult,
};
use crate::config::{BackendKind, BridgeConfig};
use crate::error::{Error, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Deadline applied to every operation until changed with `set_timeout`
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Backend-neutral document store contract
///
/// Arguments typed `Option<Document>` are mandatory: `None` is rejected with
/// [`Error::NilDocument`] before any network or database call. Filters of
/// `find_one`, `find` and `count_documents` default to `{}` when absent.
///
/// Results are decoded into the caller's type `T`; a `T` that cannot hold the
/// returned document(s) fails with [`Error::InvalidDecodeTarget`].
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Validate configuration and establish the backend. Calling it again on a
    /// connected store is a no-op.
    async fn connect(&self) -> Result<()>;

    /// Release backend resources. Safe to call repeatedly or before `connect`.
    async fn close(&self) -> Result<()>;

    /// Set the deadline applied to every call issued after this one
    fn set_timeout(&self, timeout: Duration);

    /// Current per-operation deadline
    fn timeout(&self) -> Duration;

    /// Fetch the first matching document, or [`Error::NoDocuments`]
    async fn find_one<T>(&self, filter: Option<Document>, opt: Option<FindOneOpt>) -> Result<T>
    where
        T: DeserializeOwned + Send;

    /// Fetch all matching documents in server order (or `sort` order)
    async fn find<T>(&self, filter: Option<Document>, opt: Option<FindOpt>) -> Result<Vec<T>>
    where
        T: DeserializeOwned + Send;

    async fn insert_one(&self, document: Option<Document>) -> Result<InsertedId>;

    /// Insert a batch; identifiers come back in input order
    async fn insert_many(&self, documents: Option<Vec<Document>>) -> Result<Vec<InsertedId>>;

    async fn update_one(
        &self,
        filter: Option<Document>,
        update: Option<Document>,
        opt: Option<UpdateOpt>,
    ) -> Result<UpdateResult>;

    async fn update_many(
        &self,
        filter: Option<Document>,
        update: Option<Document>,
        opt: Option<UpdateOpt>,
    ) -> Result<UpdateResult>;

    async fn replace_one(
        &self,
        filter: Option<Document>,
        replacement: Option<Document>,
        opt: Option<UpdateOpt>,
    ) -> Result<UpdateResult>;

    /// Returns the number of deleted documents
    async fn delete_one(&self, filter: Option<Document>) -> Result<i64>;

    /// Returns the number of deleted documents
    async fn delete_many(&self, filter: Option<Document>) -> Result<i64>;

    async fn aggregate<T>(&self, pipeline: Option<Vec<Document>>) -> Result<Vec<T>>
    where
        T: DeserializeOwned + Send;

    async fn count_documents(&self, filter: Option<Document>, opt: Option<CountOpt>) -> Result<i64>;

    async fn find_one_and_delete<T>(
        &self,
        filter: Option<Document>,
        opt: Option<FindOneOpt>,
    ) -> Result<T>
    where
        T: DeserializeOwned + Send;

    /// Returns the document as it was before replacement
    async fn find_one_and_replace<T>(
        &self,
        filter: Option<Document>,
        replacement: Option<Document>,
        opt: Option<FindAndUpdateOpt>,
    ) -> Result<T>
    where
        T: DeserializeOwned + Send;

    /// Returns the document as it was before the update
    async fn find_one_and_update<T>(
        &self,
        filter: Option<Document>,
        update: Option<Document>,
        opt: Option<FindAndUpdateOpt>,
    ) -> Result<T>
    where
        T: DeserializeOwned + Send;

    /// Parse a 24-character hex object id
    fn object_id(&self, hex: &str) -> Result<ObjectId>;

    /// Wrap a point in time for embedding in documents
    fn timestamp(&self, time: DateTime<Utc>) -> Timestamp {
        Timestamp::new(time)
    }
}

/// The two interchangeable backends
pub enum Backend {
    DataApi(data_api::DataApiClient),
    Driver(mongodb::MongoClient),
}

impl Backend {
    /// Build the backend selected by `config.backend`. Does not connect.
    pub fn from_config(config: &BridgeConfig) -> Result<Self> {
        config.validate()?;

        let timeout = config.timeout();
        let backend = match config.backend {
            BackendKind::DataApi => {
                let api = config.data_api.clone().ok_or_else(|| {
                    Error::Config("data_api section is required".to_string())
                })?;
                Backend::DataApi(data_api::DataApiClient::new(api)?)
            }
            BackendKind::Driver => {
                let mongo = config.mongodb.clone().ok_or_else(|| {
                    Error::Config("mongodb section is required".to_string())
                })?;
                Backend::Driver(mongodb::MongoClient::new(mongo))
            }
        };
        backend.set_timeout(timeout);

        Ok(backend)
    }

    pub fn kind(&self) -> BackendKind {
        match self {
            Backend::DataApi(_) => BackendKind::DataApi,
            Backend::Driver(_) => BackendKind::Driver,
        }
    }

    /// The native backend, for driver-only features such as backup/restore
    pub fn as_driver(&self) -> Option<&mongodb::MongoClient> {
        match self {
            Backend::Driver(client) => Some(client),
            Backend::DataApi(_) => None,
        }
    }
}

macro_rules! dispatch {
    ($self:ident, $client:ident => $call:expr) => {
        match $self {
            Backend::DataApi($client) => $call,
            Backend::Driver($client) => $call,
        }
    };
}

#[async_trait]
impl DocumentStore for Backend {
    async fn connect(&self) -> Result<()> {
        dispatch!(self, c => c.connect().await)
    }

    async fn close(&self) -> Result<()> {
        dispatch!(self, c => c.close().await)
    }

    fn set_timeout(&self, timeout: Duration) {
        dispatch!(self, c => c.set_timeout(timeout))
    }

    fn timeout(&self) -> Duration {
        dispatch!(self, c => c.timeout())
    }

    async fn find_one<T>(&self, filter: Option<Document>, opt: Option<FindOneOpt>) -> Result<T>
    where
        T: DeserializeOwned + Send,
    {
        dispatch!(self, c => c.find_one(filter, opt).await)
    }

    async fn find<T>(&self, filter: Option<Document>, opt: Option<FindOpt>) -> Result<Vec<T>>
    where
        T: DeserializeOwned + Send,
    {
        dispatch!(self, c => c.find(filter, opt).await)
    }

    async fn insert_one(&self, document: Option<Document>) -> Result<InsertedId> {
        dispatch!(self, c => c.insert_one(document).await)
    }

    async fn insert_many(&self, documents: Option<Vec<Document>>) -> Result<Vec<InsertedId>> {
        dispatch!(self, c => c.insert_many(documents).await)
    }

    async fn update_one(
        &self,
        filter: Option<Document>,
        update: Option<Document>,
        opt: Option<UpdateOpt>,
    ) -> Result<UpdateResult> {
        dispatch!(self, c => c.update_one(filter, update, opt).await)
    }

    async fn update_many(
        &self,
        filter: Option<Document>,
        update: Option<Document>,
        opt: Option<UpdateOpt>,
    ) -> Result<UpdateResult> {
        dispatch!(self, c => c.update_many(filter, update, opt).await)
    }

    async fn replace_one(
        &self,
        filter: Option<Document>,
        replacement: Option<Document>,
        opt: Option<UpdateOpt>,
    ) -> Result<UpdateResult> {
        dispatch!(self, c => c.replace_one(filter, replacement, opt).await)
    }

    async fn delete_one(&self, filter: Option<Document>) -> Result<i64> {
        dispatch!(self, c => c.delete_one(filter).await)
    }

    async fn delete_many(&self, filter: Option<Document>) -> Result<i64> {
        dispatch!(self, c => c.delete_many(filter).await)
    }

    async fn aggregate<T>(&self, pipeline: Option<Vec<Document>>) -> Result<Vec<T>>
    where
        T: DeserializeOwned + Send,
    {
        dispatch!(self, c => c.aggregate(pipeline).await)
    }

    async fn count_documents(&self, filter: Option<Document>, opt: Option<CountOpt>) -> Result<i64> {
        dispatch!(self, c => c.count_documents(filter, opt).await)
    }

    async fn find_one_and_delete<T>(
        &self,
        filter: Option<Document>,
        opt: Option<FindOneOpt>,
    ) -> Result<T>
    where
        T: DeserializeOwned + Send,
    {
        dispatch!(self, c => c.find_one_and_delete(filter, opt).await)
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
        dispatch!(self, c => c.find_one_and_replace(filter, replacement, opt).await)
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
        dispatch!(self, c => c.find_one_and_update(filter, update, opt).await)
    }

    fn object_id(&self, hex: &str) -> Result<ObjectId> {
        dispatch!(self, c => c.object_id(hex))
    }
}

/// Per-instance operation deadline. Updates are visible to calls issued
/// afterwards; calls already in flight keep the deadline they started with.
#[derive(Debug)]
pub(crate) struct OperationTimeout(AtomicU64);

impl OperationTimeout {
    pub(crate) fn get(&self) -> Duration {
        Duration::from_nanos(self.0.load(Ordering::Relaxed))
    }

    /// Durations beyond `u64::MAX` nanoseconds saturate
    pub(crate) fn set(&self, timeout: Duration) {
        let nanos = u64::try_from(timeout.as_nanos()).unwrap_or(u64::MAX);
        self.0.store(nanos, Ordering::Relaxed);
    }
}

impl Default for OperationTimeout {
    fn default() -> Self {
        let timeout = OperationTimeout(AtomicU64::new(0));
        timeout.set(DEFAULT_TIMEOUT);
        timeout
    }
}

/// Reject an absent mandatory argument
pub(crate) fn required<T>(value: Option<T>) -> Result<T> {
    value.ok_or(Error::NilDocument)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_timeout() {
        let timeout = OperationTimeout::default();
        assert_eq!(timeout.get(), DEFAULT_TIMEOUT);

        timeout.set(Duration::from_millis(10));
        assert_eq!(timeout.get(), Duration::from_millis(10));

        timeout.set(Duration::MAX);
        assert_eq!(timeout.get(), Duration::from_nanos(u64::MAX));
    }

    #[test]
    fn test_required() {
        assert!(matches!(required::<Document>(None), Err(Error::NilDocument)));
        assert_eq!(required(Some(Document::new())).unwrap(), Document::new());
    }
}

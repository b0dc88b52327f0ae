//! Data API Client Implementation
//!
//! Implements [`DocumentStore`] with one HTTP POST per operation. Each call
//! runs the same pipeline: check preconditions, build the merged request
//! body, send it under the current deadline, classify the status code and
//! decode the response envelope.
//!
//! The `find_one_and_*` operations are a find followed by a separate
//! delete/replace/update with the same filter. They are not atomic: a
//! concurrent writer can change or remove the document between the two
//! requests.

use super::config::DataApiConfig;
use super::request::{
    request_body, Action, DeleteResponse, DocumentResponse, DocumentsResponse, InsertManyResponse,
    InsertOneResponse, Payload, UpdateResponse,
};
use super::transport::{HttpRequest, ReqwestTransport, Transport};
use crate::database::engine::{required, DocumentStore, OperationTimeout};
use crate::database::object_id::ObjectId;
use crate::database::types::{
    CountOpt, Document, FindAndUpdateOpt, FindOneOpt, FindOpt, InsertedId, UpdateOpt,
    UpdateResult,
};
use crate::document;
use crate::error::{Error, Result, StatusError};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value as JsonValue;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// HTTP Data API backend
///
/// Holds configuration and a shared transport only; no per-call state, so one
/// instance can serve concurrent callers.
pub struct DataApiClient {
    config: Arc<DataApiConfig>,
    transport: Arc<dyn Transport>,
    timeout: OperationTimeout,
}

impl DataApiClient {
    /// Create a client over a fresh `reqwest` transport
    pub fn new(config: DataApiConfig) -> Result<Self> {
        let transport = ReqwestTransport::new()?;
        Ok(Self::with_transport(config, Arc::new(transport)))
    }

    /// Create a client over an existing transport
    pub fn with_transport(config: DataApiConfig, transport: Arc<dyn Transport>) -> Self {
        Self {
            config: Arc::new(config),
            transport,
            timeout: OperationTimeout::default(),
        }
    }

    pub fn config(&self) -> &DataApiConfig {
        &self.config
    }

    /// Send one action and decode its response envelope
    async fn request<R>(&self, action: Action, payload: Payload) -> Result<R>
    where
        R: DeserializeOwned + Send,
    {
        self.config.validate()?;
        let api_key = self
            .config
            .api_key
            .clone()
            .ok_or_else(|| Error::Config("API key is required".to_string()))?;

        let body = request_body(self.config.identity(), &payload)?;
        let request = HttpRequest {
            url: self.config.endpoint(action),
            api_key,
            body: serde_json::to_vec(&body)?,
        };

        let deadline = self.timeout();
        debug!(
            action = %action,
            collection = %self.config.collection,
            ?deadline,
            "Sending Data API request"
        );

        // The call runs as its own task so an expired deadline returns
        // immediately while the stalled request finishes in the background.
        let transport = Arc::clone(&self.transport);
        let call = tokio::spawn(async move { transport.post(request).await });
        let response = match tokio::time::timeout(deadline, call).await {
            Ok(Ok(result)) => result?,
            Ok(Err(join_error)) => {
                return Err(Error::Transport(format!("request task failed: {}", join_error)))
            }
            Err(_) => {
                warn!(action = %action, ?deadline, "Data API request deadline exceeded");
                return Err(Error::DeadlineExceeded(deadline));
            }
        };

        if let Some(status_error) = StatusError::from_status(response.status) {
            warn!(
                action = %action,
                status = response.status,
                "Data API request failed: {}",
                status_error
            );
            return Err(status_error.into());
        }

        Ok(serde_json::from_slice(&response.body)?)
    }

    async fn update(
        &self,
        action: Action,
        filter: Option<Document>,
        update: Option<Document>,
        opt: Option<UpdateOpt>,
    ) -> Result<UpdateResult> {
        let filter = required(filter)?;
        let update = required(update)?;

        let mut payload = Payload {
            filter: Some(filter),
            upsert: opt.and_then(|o| o.upsert),
            ..Default::default()
        };
        if action == Action::ReplaceOne {
            payload.replacement = Some(update);
        } else {
            payload.update = Some(update);
        }

        let res: UpdateResponse = self.request(action, payload).await?;
        let upserted_id = res.upserted_id.map(InsertedId::from_wire);

        Ok(UpdateResult {
            matched_count: res.matched_count,
            modified_count: res.modified_count,
            upserted_count: i64::from(upserted_id.is_some()),
            upserted_id,
            acknowledged: true,
        })
    }

    async fn delete(&self, action: Action, filter: Option<Document>) -> Result<i64> {
        let payload = Payload {
            filter: Some(required(filter)?),
            ..Default::default()
        };
        let res: DeleteResponse = self.request(action, payload).await?;
        Ok(res.deleted_count)
    }

    /// Find the current document, then apply `modify` with the same filter.
    /// With upsert set and nothing found, `modify` still runs and the call
    /// reports [`Error::NoDocuments`] since there is no prior document.
    async fn find_then_modify<T>(
        &self,
        action: Action,
        filter: Document,
        modification: Document,
        opt: FindAndUpdateOpt,
    ) -> Result<T>
    where
        T: DeserializeOwned + Send,
    {
        let upsert = opt.upsert();
        let find_opt = FindOneOpt {
            projection: opt.projection,
        };
        let update_opt = Some(UpdateOpt {
            upsert: opt.upsert,
        });

        match self.find_one::<T>(Some(filter.clone()), Some(find_opt)).await {
            Ok(previous) => {
                self.update(action, Some(filter), Some(modification), update_opt)
                    .await?;
                Ok(previous)
            }
            Err(Error::NoDocuments) if upsert => {
                self.update(action, Some(filter), Some(modification), update_opt)
                    .await?;
                Err(Error::NoDocuments)
            }
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl DocumentStore for DataApiClient {
    async fn connect(&self) -> Result<()> {
        self.config.validate()?;
        info!(
            data_source = %self.config.data_source,
            database = %self.config.database,
            collection = %self.config.collection,
            "Data API client ready"
        );
        Ok(())
    }

    async fn close(&self) -> Result<()> {
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
        let payload = Payload {
            filter: Some(filter.unwrap_or_default()),
            projection: opt.and_then(|o| o.projection),
            ..Default::default()
        };

        let res: DocumentResponse = self.request(Action::FindOne, payload).await?;
        match res.document {
            Some(JsonValue::Null) | None => Err(Error::NoDocuments),
            Some(document) => decode::<T>(document),
        }
    }

    async fn find<T>(&self, filter: Option<Document>, opt: Option<FindOpt>) -> Result<Vec<T>>
    where
        T: DeserializeOwned + Send,
    {
        let opt = opt.unwrap_or_default();
        let payload = Payload {
            filter: Some(filter.unwrap_or_default()),
            projection: opt.projection,
            sort: opt.sort,
            limit: opt.limit,
            skip: opt.skip,
            ..Default::default()
        };

        let res: DocumentsResponse = self.request(Action::Find, payload).await?;
        decode_all(res.documents)
    }

    async fn insert_one(&self, document: Option<Document>) -> Result<InsertedId> {
        let payload = Payload {
            document: Some(required(document)?),
            ..Default::default()
        };

        let res: InsertOneResponse = self.request(Action::InsertOne, payload).await?;
        let id = res.inserted_id.ok_or_else(|| {
            Error::decode_target::<InsertedId>("response carries no insertedId")
        })?;
        Ok(InsertedId::from_wire(id))
    }

    async fn insert_many(&self, documents: Option<Vec<Document>>) -> Result<Vec<InsertedId>> {
        let documents = required(documents)?;
        if documents.is_empty() {
            return Err(Error::NilDocument);
        }
        let payload = Payload {
            documents: Some(documents),
            ..Default::default()
        };

        let res: InsertManyResponse = self.request(Action::InsertMany, payload).await?;
        Ok(res
            .inserted_ids
            .into_iter()
            .map(InsertedId::from_wire)
            .collect())
    }

    async fn update_one(
        &self,
        filter: Option<Document>,
        update: Option<Document>,
        opt: Option<UpdateOpt>,
    ) -> Result<UpdateResult> {
        self.update(Action::UpdateOne, filter, update, opt).await
    }

    async fn update_many(
        &self,
        filter: Option<Document>,
        update: Option<Document>,
        opt: Option<UpdateOpt>,
    ) -> Result<UpdateResult> {
        self.update(Action::UpdateMany, filter, update, opt).await
    }

    async fn replace_one(
        &self,
        filter: Option<Document>,
        replacement: Option<Document>,
        opt: Option<UpdateOpt>,
    ) -> Result<UpdateResult> {
        self.update(Action::ReplaceOne, filter, replacement, opt)
            .await
    }

    async fn delete_one(&self, filter: Option<Document>) -> Result<i64> {
        self.delete(Action::DeleteOne, filter).await
    }

    async fn delete_many(&self, filter: Option<Document>) -> Result<i64> {
        self.delete(Action::DeleteMany, filter).await
    }

    async fn aggregate<T>(&self, pipeline: Option<Vec<Document>>) -> Result<Vec<T>>
    where
        T: DeserializeOwned + Send,
    {
        let payload = Payload {
            pipeline: Some(required(pipeline)?),
            ..Default::default()
        };

        let res: DocumentsResponse = self.request(Action::Aggregate, payload).await?;
        decode_all(res.documents)
    }

    async fn count_documents(&self, filter: Option<Document>, opt: Option<CountOpt>) -> Result<i64> {
        #[derive(Deserialize)]
        struct CountRow {
            n: i64,
        }

        let pipeline = count_pipeline(filter.unwrap_or_default(), opt.unwrap_or_default());
        let rows: Vec<CountRow> = self.aggregate(Some(pipeline)).await?;
        Ok(rows.first().map_or(0, |row| row.n))
    }

    async fn find_one_and_delete<T>(
        &self,
        filter: Option<Document>,
        opt: Option<FindOneOpt>,
    ) -> Result<T>
    where
        T: DeserializeOwned + Send,
    {
        let filter = required(filter)?;

        let previous = self.find_one::<T>(Some(filter.clone()), opt).await?;
        self.delete_one(Some(filter)).await?;
        Ok(previous)
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
        let filter = required(filter)?;
        let replacement = required(replacement)?;

        self.find_then_modify(
            Action::ReplaceOne,
            filter,
            replacement,
            opt.unwrap_or_default(),
        )
        .await
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
        let filter = required(filter)?;
        let update = required(update)?;

        self.find_then_modify(Action::UpdateOne, filter, update, opt.unwrap_or_default())
            .await
    }

    fn object_id(&self, hex: &str) -> Result<ObjectId> {
        ObjectId::parse_str(hex)
    }
}

/// `[{$match}, {$skip}?, {$limit}?, {$group: {_id: null, n: {$sum: 1}}}]`
fn count_pipeline(filter: Document, opt: CountOpt) -> Vec<Document> {
    let mut pipeline = vec![document! { "$match": filter }];
    if let Some(skip) = opt.skip.filter(|n| *n != 0) {
        pipeline.push(document! { "$skip": skip });
    }
    if let Some(limit) = opt.limit.filter(|n| *n != 0) {
        pipeline.push(document! { "$limit": limit });
    }
    pipeline.push(document! { "$group": { "_id": null, "n": { "$sum": 1 } } });
    pipeline
}

fn decode<T: DeserializeOwned>(value: JsonValue) -> Result<T> {
    serde_json::from_value(value).map_err(Error::decode_target::<T>)
}

fn decode_all<T: DeserializeOwned>(documents: Option<Vec<JsonValue>>) -> Result<Vec<T>> {
    let documents = JsonValue::Array(documents.unwrap_or_default());
    serde_json::from_value(documents).map_err(Error::decode_target::<Vec<T>>)
}

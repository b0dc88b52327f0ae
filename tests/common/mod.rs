//! Shared test doubles for the Data API backend
#![allow(dead_code)]

use async_trait::async_trait;
use mongo_bridge::database::engines::data_api::{
    DataApiClient, DataApiConfig, HttpRequest, HttpResponse, Transport,
};
use mongo_bridge::database::Document;
use mongo_bridge::Result;
use secrecy::ExposeSecret;
use serde_json::{json, Map, Value as JsonValue};
use std::cmp::Ordering as CmpOrdering;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub const API_KEY: &str = "test-key";
pub const BASE_URL: &str = "http://data-api.test/app/test-app/endpoint/data/v1";

pub fn test_config() -> DataApiConfig {
    DataApiConfig::new("Cluster0", "shop", "orders", "test-app", API_KEY).with_base_url(BASE_URL)
}

pub fn client_with(transport: Arc<dyn Transport>) -> DataApiClient {
    DataApiClient::with_transport(test_config(), transport)
}

/// A request as the transport saw it
#[derive(Debug, Clone)]
pub struct Recorded {
    pub action: String,
    pub body: JsonValue,
}

fn action_of(url: &str) -> String {
    url.rsplit('/').next().unwrap_or_default().to_string()
}

/// In-memory Data API: one collection, equality filters, `$set`/`$inc`
/// updates, single-key sorts and the aggregation stages used for counting.
#[derive(Default)]
pub struct FakeDataApi {
    documents: Mutex<Vec<Document>>,
    requests: Mutex<Vec<Recorded>>,
    next_id: AtomicUsize,
}

impl FakeDataApi {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.requests.lock().unwrap().clone()
    }

    pub fn len(&self) -> usize {
        self.documents.lock().unwrap().len()
    }

    fn generate_id(&self) -> String {
        let n = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        format!("65a1b2c3d4e5f6{:010x}", n)
    }

    fn handle(&self, action: &str, body: &Map<String, JsonValue>) -> (u16, JsonValue) {
        let filter = object(body.get("filter"));
        let mut docs = self.documents.lock().unwrap();

        match action {
            "findOne" => {
                let found = docs.iter().find(|d| matches(d, &filter)).cloned();
                (200, json!({ "document": found }))
            }
            "find" => {
                let mut found: Vec<Document> =
                    docs.iter().filter(|d| matches(d, &filter)).cloned().collect();
                if let Some(sort) = body.get("sort").and_then(JsonValue::as_object) {
                    sort_documents(&mut found, sort);
                }
                let found = skip_limit(found, body.get("skip"), body.get("limit"));
                (200, json!({ "documents": found }))
            }
            "insertOne" => {
                let mut doc = object(body.get("document"));
                let id = self.assign_id(&mut doc);
                docs.push(doc);
                (201, json!({ "insertedId": id }))
            }
            "insertMany" => {
                let mut ids = Vec::new();
                for value in body
                    .get("documents")
                    .and_then(JsonValue::as_array)
                    .cloned()
                    .unwrap_or_default()
                {
                    let mut doc = object(Some(&value));
                    ids.push(self.assign_id(&mut doc));
                    docs.push(doc);
                }
                (201, json!({ "insertedIds": ids }))
            }
            "updateOne" | "updateMany" | "replaceOne" => {
                let many = action == "updateMany";
                let upsert = body.get("upsert").and_then(JsonValue::as_bool) == Some(true);
                let mut matched = 0;
                for doc in docs.iter_mut().filter(|d| matches(d, &filter)) {
                    matched += 1;
                    if action == "replaceOne" {
                        let id = doc.get("_id").cloned();
                        *doc = object(body.get("replacement"));
                        if let Some(id) = id {
                            doc.insert("_id".to_string(), id);
                        }
                    } else {
                        apply_update(doc, &object(body.get("update")));
                    }
                    if !many {
                        break;
                    }
                }

                if matched == 0 && upsert {
                    let mut doc = equality_fields(&filter);
                    if action == "replaceOne" {
                        doc.extend(object(body.get("replacement")));
                    } else {
                        apply_update(&mut doc, &object(body.get("update")));
                    }
                    let id = self.assign_id(&mut doc);
                    docs.push(doc);
                    return (
                        200,
                        json!({ "matchedCount": 0, "modifiedCount": 0, "upsertedId": id }),
                    );
                }
                (
                    200,
                    json!({ "matchedCount": matched, "modifiedCount": matched }),
                )
            }
            "deleteOne" | "deleteMany" => {
                let before = docs.len();
                if action == "deleteOne" {
                    if let Some(pos) = docs.iter().position(|d| matches(d, &filter)) {
                        docs.remove(pos);
                    }
                } else {
                    docs.retain(|d| !matches(d, &filter));
                }
                (200, json!({ "deletedCount": before - docs.len() }))
            }
            "aggregate" => {
                let pipeline = body
                    .get("pipeline")
                    .and_then(JsonValue::as_array)
                    .cloned()
                    .unwrap_or_default();
                (200, json!({ "documents": run_pipeline(docs.clone(), &pipeline) }))
            }
            _ => (404, JsonValue::Null),
        }
    }

    /// Keeps a caller-supplied `_id`; otherwise generates an object id.
    /// Returns the identifier as the Data API reports it.
    fn assign_id(&self, doc: &mut Document) -> JsonValue {
        match doc.get("_id") {
            Some(JsonValue::Object(oid)) if oid.contains_key("$oid") => oid["$oid"].clone(),
            Some(id) => id.clone(),
            None => {
                let hex = self.generate_id();
                doc.insert("_id".to_string(), json!({ "$oid": hex }));
                JsonValue::String(hex)
            }
        }
    }
}

#[async_trait]
impl Transport for FakeDataApi {
    async fn post(&self, request: HttpRequest) -> Result<HttpResponse> {
        let action = action_of(&request.url);
        let body: JsonValue = serde_json::from_slice(&request.body)?;
        self.requests.lock().unwrap().push(Recorded {
            action: action.clone(),
            body: body.clone(),
        });

        if request.api_key.expose_secret() != API_KEY {
            return Ok(HttpResponse::new(401, Vec::new()));
        }
        if !request.url.starts_with(BASE_URL) {
            return Ok(HttpResponse::new(404, Vec::new()));
        }

        let (status, response) = self.handle(&action, &object(Some(&body)));
        Ok(HttpResponse::new(status, serde_json::to_vec(&response)?))
    }
}

/// Returns a fixed response and counts calls
pub struct StaticTransport {
    status: u16,
    body: Vec<u8>,
    calls: AtomicUsize,
}

impl StaticTransport {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Arc<Self> {
        Arc::new(Self {
            status,
            body: body.into(),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for StaticTransport {
    async fn post(&self, _request: HttpRequest) -> Result<HttpResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(HttpResponse::new(self.status, self.body.clone()))
    }
}

/// Never completes
#[derive(Default)]
pub struct StallingTransport {
    calls: AtomicUsize,
}

impl StallingTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for StallingTransport {
    async fn post(&self, _request: HttpRequest) -> Result<HttpResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        futures::future::pending::<()>().await;
        Ok(HttpResponse::new(200, Vec::new()))
    }
}

fn object(value: Option<&JsonValue>) -> Document {
    value
        .and_then(JsonValue::as_object)
        .cloned()
        .unwrap_or_default()
}

fn matches(doc: &Document, filter: &Document) -> bool {
    filter.iter().all(|(key, expected)| doc.get(key) == Some(expected))
}

fn equality_fields(filter: &Document) -> Document {
    filter
        .iter()
        .filter(|(key, _)| !key.starts_with('$'))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

fn apply_update(doc: &mut Document, update: &Document) {
    if let Some(set) = update.get("$set").and_then(JsonValue::as_object) {
        for (key, value) in set {
            doc.insert(key.clone(), value.clone());
        }
    }
    if let Some(inc) = update.get("$inc").and_then(JsonValue::as_object) {
        for (key, by) in inc {
            let current = doc.get(key).and_then(JsonValue::as_i64).unwrap_or(0);
            doc.insert(key.clone(), json!(current + by.as_i64().unwrap_or(0)));
        }
    }
}

fn compare(a: Option<&JsonValue>, b: Option<&JsonValue>) -> CmpOrdering {
    match (a, b) {
        (Some(JsonValue::Number(x)), Some(JsonValue::Number(y))) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(CmpOrdering::Equal),
        (Some(JsonValue::String(x)), Some(JsonValue::String(y))) => x.cmp(y),
        _ => CmpOrdering::Equal,
    }
}

fn sort_documents(docs: &mut [Document], sort: &Map<String, JsonValue>) {
    docs.sort_by(|a, b| {
        for (key, direction) in sort {
            let ord = compare(a.get(key), b.get(key));
            let ord = if direction.as_i64() == Some(-1) {
                ord.reverse()
            } else {
                ord
            };
            if ord != CmpOrdering::Equal {
                return ord;
            }
        }
        CmpOrdering::Equal
    });
}

fn skip_limit(docs: Vec<Document>, skip: Option<&JsonValue>, limit: Option<&JsonValue>) -> Vec<Document> {
    let skip = skip.and_then(JsonValue::as_u64).unwrap_or(0) as usize;
    let limit = limit
        .and_then(JsonValue::as_u64)
        .filter(|n| *n > 0)
        .map_or(usize::MAX, |n| n as usize);
    docs.into_iter().skip(skip).take(limit).collect()
}

fn run_pipeline(mut docs: Vec<Document>, pipeline: &[JsonValue]) -> Vec<Document> {
    for stage in pipeline {
        let stage = object(Some(stage));
        if let Some(filter) = stage.get("$match") {
            let filter = object(Some(filter));
            docs.retain(|d| matches(d, &filter));
        } else if let Some(skip) = stage.get("$skip") {
            docs = skip_limit(docs, Some(skip), None);
        } else if let Some(limit) = stage.get("$limit") {
            docs = skip_limit(docs, None, Some(limit));
        } else if stage.contains_key("$group") {
            // only the `{_id: null, n: {$sum: 1}}` counting group is supported
            docs = if docs.is_empty() {
                Vec::new()
            } else {
                vec![object(Some(&json!({ "_id": null, "n": docs.len() })))]
            };
        }
    }
    docs
}

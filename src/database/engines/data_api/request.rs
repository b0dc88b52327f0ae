//! Data API request bodies and response envelopes
//!
//! Every action is one flat JSON object: the connection identity
//! (`dataSource`, `database`, `collection`) with the action's own fields
//! overlaid on top.

use crate::database::types::Document;
use crate::error::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Data API actions, one endpoint each
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    FindOne,
    Find,
    InsertOne,
    InsertMany,
    UpdateOne,
    UpdateMany,
    ReplaceOne,
    DeleteOne,
    DeleteMany,
    Aggregate,
}

impl Action {
    pub fn name(&self) -> &'static str {
        match self {
            Action::FindOne => "findOne",
            Action::Find => "find",
            Action::InsertOne => "insertOne",
            Action::InsertMany => "insertMany",
            Action::UpdateOne => "updateOne",
            Action::UpdateMany => "updateMany",
            Action::ReplaceOne => "replaceOne",
            Action::DeleteOne => "deleteOne",
            Action::DeleteMany => "deleteMany",
            Action::Aggregate => "aggregate",
        }
    }

    /// Path appended to the versioned base URL
    pub fn path(&self) -> String {
        format!("/action/{}", self.name())
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Action-specific request fields. Unset fields are left out of the body.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Payload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<Document>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub projection: Option<Document>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort: Option<Document>,
    #[serde(skip_serializing_if = "is_unset")]
    pub limit: Option<i64>,
    #[serde(skip_serializing_if = "is_unset")]
    pub skip: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document: Option<Document>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub documents: Option<Vec<Document>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub update: Option<Document>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replacement: Option<Document>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upsert: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pipeline: Option<Vec<Document>>,
}

/// Zero `limit`/`skip` means "no limit"/"no skip" and is left off the wire
pub(crate) fn is_unset(value: &Option<i64>) -> bool {
    value.map_or(true, |n| n == 0)
}

/// Overlay `overlay` onto `base` key by key. Overlay keys win; base keys the
/// overlay does not mention are kept in their original position.
pub(crate) fn merge(mut base: Document, overlay: Document) -> Document {
    for (key, value) in overlay {
        base.insert(key, value);
    }
    base
}

/// Literal request body for `payload` sent under `identity`
pub(crate) fn request_body(identity: Document, payload: &Payload) -> Result<Document> {
    let overlay = match serde_json::to_value(payload)? {
        JsonValue::Object(map) => map,
        _ => Document::new(),
    };
    Ok(merge(identity, overlay))
}

/// `findOne` response
#[derive(Debug, Deserialize)]
pub(crate) struct DocumentResponse {
    #[serde(default)]
    pub document: Option<JsonValue>,
}

/// `find` and `aggregate` response
#[derive(Debug, Deserialize)]
pub(crate) struct DocumentsResponse {
    #[serde(default)]
    pub documents: Option<Vec<JsonValue>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct InsertOneResponse {
    #[serde(default)]
    pub inserted_id: Option<JsonValue>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct InsertManyResponse {
    #[serde(default)]
    pub inserted_ids: Vec<JsonValue>,
}

/// `updateOne`, `updateMany` and `replaceOne` response
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct UpdateResponse {
    #[serde(default)]
    pub matched_count: i64,
    #[serde(default)]
    pub modified_count: i64,
    #[serde(default)]
    pub upserted_id: Option<JsonValue>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct DeleteResponse {
    #[serde(default)]
    pub deleted_count: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document;
    use serde_json::json;

    fn identity() -> Document {
        document! { "dataSource": "Cluster0", "database": "shop", "collection": "orders" }
    }

    #[test]
    fn test_overlay_extends_identity() {
        let payload = Payload {
            filter: Some(document! { "status": "open" }),
            limit: Some(5),
            ..Default::default()
        };

        let body = request_body(identity(), &payload).unwrap();
        assert_eq!(
            JsonValue::Object(body.clone()),
            json!({
                "dataSource": "Cluster0",
                "database": "shop",
                "collection": "orders",
                "filter": { "status": "open" },
                "limit": 5
            })
        );
        let keys: Vec<&str> = body.keys().map(String::as_str).collect();
        assert_eq!(keys, ["dataSource", "database", "collection", "filter", "limit"]);
    }

    #[test]
    fn test_overlay_wins_on_conflict() {
        let base = identity();
        let overlay = document! { "collection": "archive", "upsert": true };

        let merged = merge(base, overlay);
        assert_eq!(merged["collection"], json!("archive"));
        assert_eq!(merged["dataSource"], json!("Cluster0"));
        assert_eq!(merged["upsert"], json!(true));
        assert_eq!(merged.len(), 4);
    }

    #[test]
    fn test_unset_fields_are_omitted() {
        let body = request_body(identity(), &Payload::default()).unwrap();
        assert_eq!(body, identity());

        let payload = Payload {
            filter: Some(Document::new()),
            upsert: Some(false),
            skip: Some(0),
            limit: Some(0),
            ..Default::default()
        };
        let body = request_body(identity(), &payload).unwrap();
        assert_eq!(body["filter"], json!({}));
        assert_eq!(body["upsert"], json!(false));
        assert!(!body.contains_key("skip"));
        assert!(!body.contains_key("limit"));
    }

    #[test]
    fn test_response_envelopes() {
        let missing: DocumentResponse = serde_json::from_str("{}").unwrap();
        assert!(missing.document.is_none());
        let null: DocumentResponse = serde_json::from_str(r#"{"document":null}"#).unwrap();
        assert!(null.document.is_none());

        let update: UpdateResponse =
            serde_json::from_str(r#"{"matchedCount":1,"modifiedCount":1}"#).unwrap();
        assert_eq!((update.matched_count, update.modified_count), (1, 1));
        assert!(update.upserted_id.is_none());

        let no_id: InsertOneResponse = serde_json::from_str("{}").unwrap();
        assert!(no_id.inserted_id.is_none());

        assert_eq!(Action::ReplaceOne.path(), "/action/replaceOne");
    }
}

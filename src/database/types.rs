//! Document, option and result types shared by both backends

use super::object_id::ObjectId;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

/// Generic string-keyed document. Used for filters, documents, updates,
/// projections, sort specs and pipeline stages alike.
pub type Document = Map<String, JsonValue>;

/// Build a [`Document`] from JSON object syntax.
///
/// ```
/// use mongo_bridge::document;
///
/// let filter = document! { "name": "alice", "age": { "$gt": 20 } };
/// assert_eq!(filter.len(), 2);
/// ```
#[macro_export]
macro_rules! document {
    () => {
        $crate::database::Document::new()
    };
    ($($body:tt)+) => {
        match $crate::__private::serde_json::json!({ $($body)+ }) {
            $crate::__private::serde_json::Value::Object(map) => map,
            _ => unreachable!("object literal"),
        }
    };
}

/// Options for `find_one` and `find_one_and_delete`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FindOneOpt {
    pub projection: Option<Document>,
}

/// Options for `find`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FindOpt {
    pub projection: Option<Document>,
    pub sort: Option<Document>,
    pub limit: Option<i64>,
    pub skip: Option<i64>,
}

/// Options for `update_one`, `update_many` and `replace_one`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateOpt {
    pub upsert: Option<bool>,
}

/// Options for `count_documents`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountOpt {
    pub limit: Option<i64>,
    pub skip: Option<i64>,
}

/// Options for `find_one_and_replace` and `find_one_and_update`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FindAndUpdateOpt {
    pub projection: Option<Document>,
    pub upsert: Option<bool>,
}

impl FindAndUpdateOpt {
    pub(crate) fn upsert(&self) -> bool {
        self.upsert.unwrap_or(false)
    }
}

/// Identifier returned by an insert or an upsert
#[derive(Debug, Clone, PartialEq)]
pub enum InsertedId {
    /// A database object id
    ObjectId(ObjectId),
    /// Any other `_id` value, passed through untouched
    Raw(JsonValue),
}

impl InsertedId {
    /// Classify a Data API identifier string: 24 hex characters become an
    /// [`ObjectId`], anything else stays a raw string.
    ///
    /// The Data API does not tag identifier types, so a caller-chosen
    /// `_id` string that happens to be 24 hex characters is reported as an
    /// object id here.
    pub fn from_wire(value: JsonValue) -> Self {
        match value {
            JsonValue::String(s) => match ObjectId::parse_str(&s) {
                Ok(oid) => InsertedId::ObjectId(oid),
                Err(_) => InsertedId::Raw(JsonValue::String(s)),
            },
            other => InsertedId::Raw(other),
        }
    }

    pub fn as_object_id(&self) -> Option<&ObjectId> {
        match self {
            InsertedId::ObjectId(oid) => Some(oid),
            InsertedId::Raw(_) => None,
        }
    }

    /// Value to embed in a later filter or document (e.g. `{"_id": id.wire_value()}`)
    pub fn wire_value(&self) -> JsonValue {
        match self {
            InsertedId::ObjectId(oid) => oid.wire_value(),
            InsertedId::Raw(value) => value.clone(),
        }
    }
}

impl From<ObjectId> for InsertedId {
    fn from(oid: ObjectId) -> Self {
        InsertedId::ObjectId(oid)
    }
}

/// Outcome of an update or replace
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateResult {
    pub matched_count: i64,
    pub modified_count: i64,
    pub upserted_count: i64,
    pub upserted_id: Option<InsertedId>,
    pub acknowledged: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_document_macro() {
        let empty = document! {};
        assert!(empty.is_empty());

        let doc = document! { "b": 1, "a": { "$oid": "5f1d7f3f9b1e8a3a4c2d1e0f" } };
        let keys: Vec<&String> = doc.keys().collect();
        assert_eq!(keys, vec!["b", "a"]);
    }

    #[test]
    fn test_inserted_id_heuristic() {
        let id = InsertedId::from_wire(json!("5f1d7f3f9b1e8a3a4c2d1e0f"));
        assert_eq!(
            id.as_object_id().map(|oid| oid.hex()),
            Some("5f1d7f3f9b1e8a3a4c2d1e0f".to_string())
        );
        assert_eq!(id.wire_value(), json!({ "$oid": "5f1d7f3f9b1e8a3a4c2d1e0f" }));

        let raw = InsertedId::from_wire(json!("user-42"));
        assert_eq!(raw, InsertedId::Raw(json!("user-42")));
        assert_eq!(raw.wire_value(), json!("user-42"));

        let numeric = InsertedId::from_wire(json!(7));
        assert_eq!(numeric, InsertedId::Raw(json!(7)));
    }

    #[test]
    fn test_option_defaults_are_unset() {
        let opt = FindOpt::default();
        assert!(opt.projection.is_none() && opt.sort.is_none());
        assert!(opt.limit.is_none() && opt.skip.is_none());
        assert!(!FindAndUpdateOpt::default().upsert());
    }
}

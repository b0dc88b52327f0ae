//! Identifier and timestamp handles
//!
//! Both backends hand out the same [`ObjectId`] and [`Timestamp`] types. An
//! object id keeps whatever representation its backend produced (the Data
//! API's hex text, or the driver's typed BSON id) and renders both to the
//! same hex string and the same extended-JSON wire value.

use crate::error::{Error, Result};
use chrono::{DateTime, TimeZone, Utc};
use mongodb::bson::oid::ObjectId as BsonObjectId;
use serde_json::{json, Value as JsonValue};
use std::fmt;
use std::hash::{Hash, Hasher};

const OBJECT_ID_HEX_LEN: usize = 24;

/// Database object identifier
#[derive(Clone)]
pub struct ObjectId(Repr);

#[derive(Clone)]
enum Repr {
    /// Hex text as returned by the Data API, kept verbatim
    Hex(String),
    /// Typed id from the native driver
    Native(BsonObjectId),
}

impl ObjectId {
    /// Parse a 24-character hex string, keeping the text as given
    pub fn parse_str(s: &str) -> Result<Self> {
        if !is_valid_object_id(s) {
            return Err(Error::InvalidObjectId(s.to_string()));
        }
        Ok(ObjectId(Repr::Hex(s.to_string())))
    }

    pub fn from_native(oid: BsonObjectId) -> Self {
        ObjectId(Repr::Native(oid))
    }

    /// Hex form of the id
    pub fn hex(&self) -> String {
        match &self.0 {
            Repr::Hex(s) => s.clone(),
            Repr::Native(oid) => oid.to_hex(),
        }
    }

    /// Extended-JSON form, `{"$oid": "<hex>"}`, for embedding in filters and documents
    pub fn wire_value(&self) -> JsonValue {
        json!({ "$oid": self.hex() })
    }

    /// The driver's typed id, when this handle came from the native backend
    pub fn as_native(&self) -> Option<&BsonObjectId> {
        match &self.0 {
            Repr::Native(oid) => Some(oid),
            Repr::Hex(_) => None,
        }
    }

    /// Convert to the driver's typed id regardless of origin
    pub fn to_native(&self) -> Result<BsonObjectId> {
        match &self.0 {
            Repr::Native(oid) => Ok(*oid),
            Repr::Hex(s) => {
                BsonObjectId::parse_str(s).map_err(|_| Error::InvalidObjectId(s.clone()))
            }
        }
    }
}

impl PartialEq for ObjectId {
    fn eq(&self, other: &Self) -> bool {
        self.hex().eq_ignore_ascii_case(&other.hex())
    }
}

impl Eq for ObjectId {}

impl Hash for ObjectId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.hex().to_ascii_lowercase().hash(state);
    }
}

impl fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectId(\"{}\")", self.hex())
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.hex())
    }
}

impl From<BsonObjectId> for ObjectId {
    fn from(oid: BsonObjectId) -> Self {
        ObjectId::from_native(oid)
    }
}

pub(crate) fn is_valid_object_id(s: &str) -> bool {
    s.len() == OBJECT_ID_HEX_LEN && s.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Point in time with millisecond resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Truncates `time` to whole milliseconds
    pub fn new<Tz: TimeZone>(time: DateTime<Tz>) -> Self {
        Self::from_millis(time.with_timezone(&Utc).timestamp_millis())
    }

    pub fn from_millis(millis: i64) -> Self {
        // Out-of-range millis saturate to the epoch rather than failing
        let time = Utc
            .timestamp_millis_opt(millis)
            .single()
            .unwrap_or(DateTime::UNIX_EPOCH);
        Timestamp(time)
    }

    pub fn now() -> Self {
        Self::new(Utc::now())
    }

    pub fn time(&self) -> DateTime<Utc> {
        self.0
    }

    pub fn timestamp_millis(&self) -> i64 {
        self.0.timestamp_millis()
    }

    /// Extended-JSON form, `{"$date": {"$numberLong": "<epoch millis>"}}`
    pub fn wire_value(&self) -> JsonValue {
        json!({ "$date": { "$numberLong": self.timestamp_millis().to_string() } })
    }
}

impl<Tz: TimeZone> From<DateTime<Tz>> for Timestamp {
    fn from(time: DateTime<Tz>) -> Self {
        Timestamp::new(time)
    }
}

impl From<mongodb::bson::DateTime> for Timestamp {
    fn from(time: mongodb::bson::DateTime) -> Self {
        Timestamp::from_millis(time.timestamp_millis())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_hex() {
        let oid = ObjectId::parse_str("5F1D7F3F9B1E8A3A4C2D1E0F").unwrap();
        assert_eq!(oid.hex(), "5F1D7F3F9B1E8A3A4C2D1E0F");
        assert!(oid.as_native().is_none());
        assert_eq!(
            oid.to_native().unwrap().to_hex(),
            "5f1d7f3f9b1e8a3a4c2d1e0f"
        );
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        for bad in ["", "abc", "5f1d7f3f9b1e8a3a4c2d1e0", "5f1d7f3f9b1e8a3a4c2d1e0fa", "zz1d7f3f9b1e8a3a4c2d1e0f"] {
            assert!(
                matches!(ObjectId::parse_str(bad), Err(Error::InvalidObjectId(_))),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_representations_agree() {
        let native = BsonObjectId::new();
        let from_driver = ObjectId::from_native(native);
        let from_api = ObjectId::parse_str(&native.to_hex()).unwrap();

        assert_eq!(from_driver.hex(), from_api.hex());
        assert_eq!(from_driver, from_api);
        assert_eq!(from_driver.wire_value(), from_api.wire_value());
        assert_eq!(from_driver.wire_value(), json!({ "$oid": native.to_hex() }));
    }

    #[test]
    fn test_timestamp_wire_value() {
        let time = Utc.timestamp_millis_opt(1_700_000_000_123).unwrap()
            + chrono::Duration::microseconds(456);
        let ts = Timestamp::new(time);

        assert_eq!(ts.timestamp_millis(), 1_700_000_000_123);
        assert_eq!(
            ts.wire_value(),
            json!({ "$date": { "$numberLong": "1700000000123" } })
        );
        assert_eq!(ts, Timestamp::from(mongodb::bson::DateTime::from_millis(1_700_000_000_123)));
    }
}

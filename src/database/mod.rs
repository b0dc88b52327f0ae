//! Document store access layer
//!
//! [`DocumentStore`] is the backend-neutral contract; [`Backend`] selects
//! between the HTTP Data API and the native driver at runtime.

pub mod engine;
pub mod engines;
pub mod object_id;
pub mod types;

pub use engine::{Backend, DocumentStore, DEFAULT_TIMEOUT};
pub use engines::data_api::{DataApiClient, DataApiConfig};
pub use engines::mongodb::{MongoClient, MongoConfig};
pub use object_id::{ObjectId, Timestamp};
pub use types::{
    CountOpt, Document, FindAndUpdateOpt, FindOneOpt, FindOpt, InsertedId, UpdateOpt,
    UpdateResult,
};

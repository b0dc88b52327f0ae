//! MongoDB Database Engine
//!
//! Native driver backend: a [`MongoClient`] connects with the official
//! `mongodb` driver and implements the shared document store contract, plus
//! backup/restore through the MongoDB database tools.

pub mod config;
pub mod connection;
pub mod dump;

pub use config::{MongoConfig, MongoConnectionOptions};
pub use connection::MongoClient;

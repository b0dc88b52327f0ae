//! # mongo-bridge
//!
//! One document-store contract over two interchangeable MongoDB backends:
//! the HTTP Atlas Data API and the native `mongodb` driver.
//!
//! ```no_run
//! use mongo_bridge::config::ConfigLoader;
//! use mongo_bridge::database::{Backend, DocumentStore, Document};
//! use mongo_bridge::document;
//!
//! # async fn run() -> anyhow::Result<()> {
//! let config = ConfigLoader::new().load_from_env().build()?;
//! let store = Backend::from_config(&config)?;
//! store.connect().await?;
//!
//! let user: Document = store
//!     .find_one(Some(document! { "name": "alice" }), None)
//!     .await?;
//! println!("{user:?}");
//!
//! store.close().await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod database;
pub mod error;
pub mod logging;

pub use database::{Backend, Document, DocumentStore};
pub use error::{Error, Result, StatusError};

#[doc(hidden)]
pub mod __private {
    pub use serde_json;
}

//! MongoDB Atlas Data API backend
//!
//! Every operation is a single HTTPS POST to
//! `https://data.mongodb-api.com/app/<app_id>/endpoint/data/<version>/action/<name>`
//! authenticated with an `api-key` header.

pub mod client;
pub mod config;
pub mod request;
pub mod transport;

pub use client::DataApiClient;
pub use config::DataApiConfig;
pub use request::Action;
pub use transport::{HttpRequest, HttpResponse, ReqwestTransport, Transport, API_KEY_HEADER};

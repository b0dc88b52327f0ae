//! Data API Configuration
//!
//! Connection identity and endpoint settings for the HTTP Data API backend

use super::request::Action;
use crate::database::types::Document;
use crate::error::Error;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

const DEFAULT_VERSION: &str = "v1";
const DEFAULT_BASE_URL: &str = "https://data.mongodb-api.com/app/{app_id}/endpoint/data/{version}";

/// Data API Connection Configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DataApiConfig {
    /// Linked data source (cluster) name
    #[serde(default)]
    pub data_source: String,
    /// Database name
    #[serde(default)]
    pub database: String,
    /// Collection name
    #[serde(default)]
    pub collection: String,
    /// Data API application id
    #[serde(default)]
    pub app_id: String,
    /// Data API key
    #[serde(default, skip_serializing)]
    pub api_key: Option<SecretString>,
    /// API version path segment
    #[serde(default = "default_version")]
    pub version: String,
    /// Overrides the whole base URL, e.g. for regional deployments
    #[serde(default)]
    pub base_url: Option<String>,
}

fn default_version() -> String {
    DEFAULT_VERSION.to_string()
}

impl DataApiConfig {
    /// Create new Data API configuration
    pub fn new(
        data_source: impl Into<String>,
        database: impl Into<String>,
        collection: impl Into<String>,
        app_id: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            data_source: data_source.into(),
            database: database.into(),
            collection: collection.into(),
            app_id: app_id.into(),
            api_key: Some(SecretString::new(api_key.into().into_boxed_str())),
            version: default_version(),
            base_url: None,
        }
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Validate Data API configuration
    pub fn validate(&self) -> Result<(), Error> {
        if self.data_source.is_empty() {
            return Err(Error::Config("DataSource is required".to_string()));
        }
        if self.database.is_empty() {
            return Err(Error::Config("database is required".to_string()));
        }
        if self.collection.is_empty() {
            return Err(Error::Config("collection is required".to_string()));
        }
        if self.app_id.is_empty() {
            return Err(Error::Config("AppID is required".to_string()));
        }
        if self
            .api_key
            .as_ref()
            .map_or(true, |key| key.expose_secret().is_empty())
        {
            return Err(Error::Config("API key is required".to_string()));
        }
        Ok(())
    }

    /// Version segment, falling back to the default when left empty
    pub fn version(&self) -> &str {
        if self.version.is_empty() {
            DEFAULT_VERSION
        } else {
            &self.version
        }
    }

    /// Versioned base URL for this application
    pub fn base_url(&self) -> String {
        match &self.base_url {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => DEFAULT_BASE_URL
                .replace("{app_id}", &self.app_id)
                .replace("{version}", self.version()),
        }
    }

    /// Full URL of one action endpoint
    pub fn endpoint(&self, action: Action) -> String {
        format!("{}{}", self.base_url(), action.path())
    }

    /// Identity fields every request body starts from
    pub(crate) fn identity(&self) -> Document {
        let mut identity = Document::new();
        identity.insert(
            "dataSource".to_string(),
            JsonValue::String(self.data_source.clone()),
        );
        identity.insert(
            "database".to_string(),
            JsonValue::String(self.database.clone()),
        );
        identity.insert(
            "collection".to_string(),
            JsonValue::String(self.collection.clone()),
        );
        identity
    }
}

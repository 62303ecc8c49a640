//! Remote app metadata.
//!
//! The remote source answers `GET {base_url}{item}` with JSON shaped like
//!
//! ```json
//! { "status": "success",
//!   "data": { "100": { "depots": { "200": {...}, "201": {...}, "branches": {...} } } } }
//! ```
//!
//! Children of `depots` whose names are 32-bit unsigned integers are the
//! item's dependents.

use crate::error::{MetadataError, MetadataResult};
use async_trait::async_trait;
use depotkeep_core::ItemId;
use depotkeep_core::config::RemoteConfig;
use reqwest::Url;
use serde_json::Value;
use std::time::Duration;

/// Source of dependent ids for an item.
#[async_trait]
pub trait RemoteMetadata: Send + Sync + 'static {
    /// Dependent ids of `item`, without the item itself.
    async fn dependents(&self, item: &ItemId) -> MetadataResult<Vec<ItemId>>;
}

/// HTTP metadata source.
#[derive(Clone, Debug)]
pub struct HttpMetadataSource {
    base_url: Url,
    timeout: Duration,
}

impl HttpMetadataSource {
    pub fn new(base_url: &str, timeout: Duration) -> MetadataResult<Self> {
        let mut base = base_url.trim().to_string();
        if !base.ends_with('/') {
            base.push('/');
        }
        let base_url = Url::parse(&base)
            .map_err(|e| MetadataError::Config(format!("invalid base URL {base_url:?}: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(MetadataError::Config(format!(
                "base URL cannot hold a path: {base_url}"
            )));
        }
        Ok(Self { base_url, timeout })
    }

    pub fn from_config(config: &RemoteConfig) -> MetadataResult<Self> {
        Self::new(&config.base_url, config.timeout())
    }

    /// Open a session for a single query.
    pub fn connect(&self) -> MetadataResult<MetadataSession> {
        let http = reqwest::Client::builder()
            .timeout(self.timeout)
            .connect_timeout(self.timeout)
            .build()?;
        Ok(MetadataSession {
            http,
            base_url: self.base_url.clone(),
        })
    }
}

#[async_trait]
impl RemoteMetadata for HttpMetadataSource {
    async fn dependents(&self, item: &ItemId) -> MetadataResult<Vec<ItemId>> {
        self.connect()?.fetch_dependents(item).await
    }
}

/// A connection to the remote source, consumed by its query.
pub struct MetadataSession {
    http: reqwest::Client,
    base_url: Url,
}

impl MetadataSession {
    fn url(&self, item: &ItemId) -> MetadataResult<Url> {
        self.base_url
            .join(item.as_str())
            .map_err(|e| MetadataError::Config(format!("failed to build URL: {e}")))
    }

    /// Fetch the dependents of `item`.
    #[tracing::instrument(skip(self), fields(remote = %self.base_url))]
    pub async fn fetch_dependents(self, item: &ItemId) -> MetadataResult<Vec<ItemId>> {
        let url = self.url(item)?;
        let response = self.http.get(url).send().await?;
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(MetadataError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let dependents = parse_dependents(&body, item)?;
        tracing::debug!(count = dependents.len(), "remote dependents fetched");
        Ok(dependents)
    }
}

/// Extract dependent ids from a metadata reply.
pub fn parse_dependents(body: &str, item: &ItemId) -> MetadataResult<Vec<ItemId>> {
    let json: Value =
        serde_json::from_str(body).map_err(|e| MetadataError::Malformed(e.to_string()))?;

    if let Some(status) = json.get("status").and_then(Value::as_str)
        && status != "success"
    {
        return Err(MetadataError::Malformed(format!("status {status:?}")));
    }

    let app = json
        .get("data")
        .and_then(|data| data.get(item.as_str()))
        .ok_or_else(|| MetadataError::Malformed(format!("no data for {item}")))?;

    let Some(depots) = app.get("depots").and_then(Value::as_object) else {
        return Ok(Vec::new());
    };

    let mut ids = Vec::new();
    for name in depots.keys() {
        if name.parse::<u32>().is_err() {
            continue;
        }
        let id = ItemId::new(name.as_str()).map_err(|e| MetadataError::Malformed(e.to_string()))?;
        if id != *item && !ids.contains(&id) {
            ids.push(id);
        }
    }
    Ok(ids)
}

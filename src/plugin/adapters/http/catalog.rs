//! Catalog client speaking the remote catalog's JSON API over HTTPS.

use crate::config::CatalogConfig;
use crate::plugin::{
    domain::{
        CatalogCategory, CatalogEntry, CatalogProfile, LicenceRecord, PluginArchive, PluginId,
    },
    ports::{CatalogClient, CatalogError, CatalogResult},
};
use async_trait::async_trait;
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use thiserror::Error;

/// Response header carrying the archive's hex SHA-256 digest.
pub const ARCHIVE_DIGEST_HEADER: &str = "X-Archive-Sha256";

#[derive(Debug, Error)]
#[error("catalog responded with HTTP {0}")]
struct UnexpectedStatus(StatusCode);

/// `reqwest`-backed [`CatalogClient`].
#[derive(Debug, Clone)]
pub struct HttpCatalogClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    key_header: String,
}

impl HttpCatalogClient {
    /// Builds a client from catalog settings.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Protocol`] when the HTTP client cannot be
    /// constructed.
    pub fn new(config: &CatalogConfig) -> CatalogResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(CatalogError::protocol)?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_owned(),
            api_key: config.api_key.clone(),
            key_header: config.key_header.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn get(&self, path: &str) -> RequestBuilder {
        let mut request = self.http.get(self.url(path));
        if let Some(key) = &self.api_key {
            request = request.header(self.key_header.as_str(), key.as_str());
        }
        request
    }

    async fn send(&self, path: &str, plugin: Option<&PluginId>) -> CatalogResult<Response> {
        let response = self.get(path).send().await.map_err(transport_error)?;
        check_status(response.status(), plugin)?;
        Ok(response)
    }

    async fn fetch_json<T: DeserializeOwned>(&self, path: &str) -> CatalogResult<T> {
        self.send(path, None)
            .await?
            .json::<T>()
            .await
            .map_err(CatalogError::protocol)
    }
}

fn transport_error(err: reqwest::Error) -> CatalogError {
    if err.is_connect() || err.is_timeout() || err.is_request() {
        CatalogError::Unreachable(err.to_string())
    } else {
        CatalogError::protocol(err)
    }
}

fn check_status(status: StatusCode, plugin: Option<&PluginId>) -> CatalogResult<()> {
    if status.is_success() {
        return Ok(());
    }
    match (status, plugin) {
        (StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN, _) => Err(CatalogError::Unauthorized),
        (StatusCode::PAYMENT_REQUIRED, Some(plugin_id)) => {
            Err(CatalogError::LicenceRequired(plugin_id.clone()))
        }
        (StatusCode::NOT_FOUND, Some(plugin_id)) => Err(CatalogError::NotFound(plugin_id.clone())),
        (StatusCode::BAD_GATEWAY | StatusCode::SERVICE_UNAVAILABLE | StatusCode::GATEWAY_TIMEOUT, _) => {
            Err(CatalogError::Unreachable(format!("catalog responded with HTTP {status}")))
        }
        _ => Err(CatalogError::protocol(UnexpectedStatus(status))),
    }
}

#[async_trait]
impl CatalogClient for HttpCatalogClient {
    async fn list_plugins(&self) -> CatalogResult<Vec<CatalogEntry>> {
        self.fetch_json("plugins").await
    }

    async fn get_plugin(&self, plugin_id: &PluginId) -> CatalogResult<Option<CatalogEntry>> {
        match self.send(&format!("plugins/{plugin_id}"), Some(plugin_id)).await {
            Ok(response) => response
                .json::<CatalogEntry>()
                .await
                .map(Some)
                .map_err(CatalogError::protocol),
            Err(CatalogError::NotFound(_)) => Ok(None),
            Err(err) => Err(err),
        }
    }

    async fn download_archive(&self, plugin_id: &PluginId) -> CatalogResult<PluginArchive> {
        let response = self
            .send(&format!("plugins/{plugin_id}/download"), Some(plugin_id))
            .await?;
        let digest = response
            .headers()
            .get(ARCHIVE_DIGEST_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::to_owned);
        let bytes = response.bytes().await.map_err(transport_error)?;
        let mut archive = PluginArchive::new(bytes.to_vec());
        if let Some(sha256) = digest {
            archive = archive.with_sha256(sha256);
        }
        Ok(archive)
    }

    async fn list_categories(&self) -> CatalogResult<Vec<CatalogCategory>> {
        self.fetch_json("categories").await
    }

    async fn own_licences(&self) -> CatalogResult<Vec<LicenceRecord>> {
        self.fetch_json("account/licences").await
    }

    async fn own_profile(&self) -> CatalogResult<CatalogProfile> {
        self.fetch_json("account/profile").await
    }
}

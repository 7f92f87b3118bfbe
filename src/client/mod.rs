use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::model::Asset;

pub const DEFAULT_API_URL: &str = "http://localhost:8000";
const TOKEN_PATH: &str = "/token";
const ASSETS_PATH: &str = "/api/v1/idle";

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("not logged in, run `idle-assets login` first")]
    AuthRequired,

    #[error("invalid username or password")]
    LoginFailed { status: Option<u16> },

    #[error("failed to fetch idle assets: {message}")]
    FetchFailed { message: String },

    #[error("failed to save asset {id}: {message}")]
    UpdateFailed { id: String, message: String },

    #[error("invalid API URL: {url}")]
    InvalidUrl { url: String },

    #[error("failed to build HTTP client: {source}")]
    HttpClientBuild {
        #[source]
        source: reqwest::Error,
    },

    #[error("failed to setup proxy: {proxy}: {source}")]
    ProxySetup {
        proxy: String,
        #[source]
        source: reqwest::Error,
    },
}

#[derive(Clone, Debug)]
pub struct ClientOptions {
    pub api_url: String,
    pub timeout_seconds: u64,
    pub proxy: Option<String>,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            timeout_seconds: 10,
            proxy: None,
        }
    }
}

/// Body of a successful `POST /token`.
#[derive(Clone, Debug, Deserialize)]
pub struct LoginResponse {
    pub access_token: String,
    #[serde(default)]
    pub user: serde_json::Value,
}

/// Remote operations the view coordinator depends on.
#[async_trait]
pub trait AssetApi: Send + Sync {
    async fn login(&self, username: &str, password: &str) -> Result<LoginResponse, ClientError>;

    async fn fetch_assets(&self, token: &str) -> Result<Vec<Asset>, ClientError>;

    async fn update_asset(&self, token: &str, asset: &Asset) -> Result<(), ClientError>;

    async fn create_asset(&self, token: &str, asset: &Asset) -> Result<(), ClientError>;
}

#[derive(Clone, Debug)]
pub struct AssetClient {
    http: reqwest::Client,
    base: reqwest::Url,
}

impl AssetClient {
    pub fn new(options: &ClientOptions) -> Result<Self, ClientError> {
        let trimmed = options.api_url.trim().trim_end_matches('/');
        let base = reqwest::Url::parse(trimmed).map_err(|_| ClientError::InvalidUrl {
            url: options.api_url.clone(),
        })?;
        if base.cannot_be_a_base() {
            return Err(ClientError::InvalidUrl {
                url: options.api_url.clone(),
            });
        }

        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::USER_AGENT,
            reqwest::header::HeaderValue::from_static(concat!(
                "idle-assets/",
                env!("CARGO_PKG_VERSION")
            )),
        );
        let mut builder = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(options.timeout_seconds.max(1)));

        if let Some(proxy) = options.proxy.as_deref().filter(|p| !p.trim().is_empty()) {
            let proxy_cfg = reqwest::Proxy::all(proxy).map_err(|e| ClientError::ProxySetup {
                proxy: proxy.to_string(),
                source: e,
            })?;
            builder = builder.proxy(proxy_cfg);
        }

        let http = builder
            .build()
            .map_err(|e| ClientError::HttpClientBuild { source: e })?;
        Ok(Self { http, base })
    }

    pub fn base_url(&self) -> &str {
        self.base.as_str()
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base.as_str().trim_end_matches('/'), path)
    }

    fn asset_endpoint(&self, id: &str) -> Result<reqwest::Url, ClientError> {
        let mut url = reqwest::Url::parse(&self.endpoint(ASSETS_PATH)).map_err(|_| {
            ClientError::InvalidUrl {
                url: self.base.to_string(),
            }
        })?;
        url.path_segments_mut()
            .map_err(|_| ClientError::InvalidUrl {
                url: self.base.to_string(),
            })?
            .push(id);
        Ok(url)
    }
}

fn status_message(status: reqwest::StatusCode, body: &str) -> String {
    let body = body.trim();
    if body.is_empty() {
        format!("HTTP {status}")
    } else {
        let snippet: String = body.chars().take(200).collect();
        format!("HTTP {status}: {snippet}")
    }
}

#[async_trait]
impl AssetApi for AssetClient {
    async fn login(&self, username: &str, password: &str) -> Result<LoginResponse, ClientError> {
        let url = self.endpoint(TOKEN_PATH);
        debug!(%url, username, "requesting access token");
        let response = self
            .http
            .post(&url)
            .form(&[("username", username), ("password", password)])
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, "login request failed");
                ClientError::LoginFailed { status: None }
            })?;

        let status = response.status();
        if !status.is_success() {
            warn!(status = status.as_u16(), "login rejected");
            return Err(ClientError::LoginFailed {
                status: Some(status.as_u16()),
            });
        }

        let body: LoginResponse = response.json().await.map_err(|e| {
            warn!(error = %e, "malformed token response");
            ClientError::LoginFailed {
                status: Some(status.as_u16()),
            }
        })?;
        info!(username, "logged in");
        Ok(body)
    }

    async fn fetch_assets(&self, token: &str) -> Result<Vec<Asset>, ClientError> {
        let url = self.endpoint(ASSETS_PATH);
        debug!(%url, "fetching idle assets");
        let response = self
            .http
            .get(&url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| ClientError::FetchFailed {
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::FetchFailed {
                message: status_message(status, &body),
            });
        }

        let assets: Vec<Asset> = response
            .json()
            .await
            .map_err(|e| ClientError::FetchFailed {
                message: format!("invalid response body: {e}"),
            })?;
        debug!(count = assets.len(), "fetched idle assets");
        Ok(assets)
    }

    async fn update_asset(&self, token: &str, asset: &Asset) -> Result<(), ClientError> {
        let url = self.asset_endpoint(&asset.id)?;
        debug!(%url, "updating asset");
        let response = self
            .http
            .put(url)
            .bearer_auth(token)
            .json(asset)
            .send()
            .await
            .map_err(|e| ClientError::UpdateFailed {
                id: asset.id.clone(),
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::UpdateFailed {
                id: asset.id.clone(),
                message: status_message(status, &body),
            });
        }
        info!(id = %asset.id, "asset updated");
        Ok(())
    }

    async fn create_asset(&self, token: &str, asset: &Asset) -> Result<(), ClientError> {
        let url = self.endpoint(ASSETS_PATH);
        debug!(%url, "creating asset");
        let response = self
            .http
            .post(&url)
            .bearer_auth(token)
            .json(asset)
            .send()
            .await
            .map_err(|e| ClientError::UpdateFailed {
                id: "(new)".to_string(),
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::UpdateFailed {
                id: "(new)".to_string(),
                message: status_message(status, &body),
            });
        }
        info!("asset created");
        Ok(())
    }
}

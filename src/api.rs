pub mod request;
pub mod response;

use crate::{
    config::{START_PATH, STOP_PATH, WITHDRAW_PATH},
    error::ApiError,
};
use request::WithdrawRequest;
use reqwest::{
    blocking::{Client, Response},
    header::CONTENT_TYPE,
    Url,
};
use response::{Asset, CommandReply, WithdrawReply};
use serde::de::DeserializeOwned;
use std::time::Duration;

/// Commands the dashboard can issue against the mining backend.
pub trait Backend: Send + Sync {
    fn start(&self) -> Result<CommandReply, ApiError>;
    fn stop(&self) -> Result<CommandReply, ApiError>;
    fn withdraw(&self, request: &WithdrawRequest) -> Result<WithdrawReply, ApiError>;
}

/// Plain GET access used by the offline cache.
pub trait AssetFetcher: Send + Sync {
    fn fetch_asset(&self, path: &str) -> Result<Asset, ApiError>;
}

#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: Client,
    base_url: String,
}

impl HttpBackend {
    /// Build a backend client with no request timeout.
    pub fn new(base_url: &str) -> Result<Self, ApiError> {
        let client = Client::builder().timeout(None::<Duration>).build()?;
        Self::with_client(base_url, client)
    }

    pub fn with_client(base_url: &str, client: Client) -> Result<Self, ApiError> {
        Url::parse(base_url).map_err(|e| ApiError::Url {
            url: base_url.into(),
            reason: e.to_string(),
        })?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').into(),
        })
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    #[tracing::instrument(skip(self))]
    fn post_empty<R: DeserializeOwned>(&self, path: &str) -> Result<R, ApiError> {
        let response = self.client.post(self.url(path)).send()?;
        decode(path, response)
    }
}

impl Backend for HttpBackend {
    fn start(&self) -> Result<CommandReply, ApiError> {
        self.post_empty(START_PATH)
    }

    fn stop(&self) -> Result<CommandReply, ApiError> {
        self.post_empty(STOP_PATH)
    }

    #[tracing::instrument(skip(self))]
    fn withdraw(&self, request: &WithdrawRequest) -> Result<WithdrawReply, ApiError> {
        let response = self.client.post(self.url(WITHDRAW_PATH)).json(request).send()?;
        decode(WITHDRAW_PATH, response)
    }
}

impl AssetFetcher for HttpBackend {
    fn fetch_asset(&self, path: &str) -> Result<Asset, ApiError> {
        let response = self.client.get(self.url(path)).send()?;
        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.bytes()?.to_vec();
        tracing::debug!(path, status, bytes = body.len(), "fetched asset from network");
        Ok(Asset { status, content_type, body })
    }
}

/// Decode a JSON reply whatever the HTTP status.
///
/// The backend reports rejections as `{ok: false, error}` with a 4xx status,
/// so the body wins. A status is only reported when the body is unusable.
fn decode<R: DeserializeOwned>(path: &str, response: Response) -> Result<R, ApiError> {
    let status = response.status();
    let body = response.text()?;
    tracing::debug!(path, status = status.as_u16(), "raw reply: {}", body.trim());
    match serde_json::from_str(&body) {
        Ok(reply) => Ok(reply),
        Err(_) if !status.is_success() => Err(ApiError::Status {
            status: status.as_u16(),
            path: path.into(),
        }),
        Err(e) => Err(e.into()),
    }
}

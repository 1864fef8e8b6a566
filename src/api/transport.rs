//! Wire access to the FinQuiz REST API.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use finquiz_api_types::Payload;
use reqwest::header::HeaderMap;
use reqwest::{Client, Method};
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

use crate::session::SessionProvider;

use super::error::ApiError;

pub const ACCESS_TOKEN_HEADER: &str = "access-token";
pub const CLIENT_HEADER: &str = "client";
pub const UID_HEADER: &str = "uid";
pub const EXPIRY_HEADER: &str = "expiry";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
}

impl HttpMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<HttpMethod> for Method {
    fn from(method: HttpMethod) -> Self {
        match method {
            HttpMethod::Get => Method::GET,
            HttpMethod::Post => Method::POST,
            HttpMethod::Put => Method::PUT,
            HttpMethod::Delete => Method::DELETE,
        }
    }
}

/// A single request, with `path` relative to the API base URL.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: HttpMethod,
    pub path: String,
    pub body: Option<Value>,
}

impl ApiRequest {
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: HttpMethod::Get,
            path: path.into(),
            body: None,
        }
    }

    pub fn with_body(method: HttpMethod, path: impl Into<String>, body: Value) -> Self {
        Self {
            method,
            path: path.into(),
            body: Some(body),
        }
    }

    pub fn without_body(method: HttpMethod, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            body: None,
        }
    }
}

/// Credential headers echoed back by the server.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResponseMeta {
    pub access_token: Option<String>,
    pub client: Option<String>,
    pub uid: Option<String>,
    pub expiry: Option<String>,
}

impl ResponseMeta {
    fn from_headers(headers: &HeaderMap) -> Self {
        let read = |name: &str| {
            headers
                .get(name)
                .and_then(|value| value.to_str().ok())
                .map(str::to_string)
                .filter(|value| !value.is_empty())
        };
        Self {
            access_token: read(ACCESS_TOKEN_HEADER),
            client: read(CLIENT_HEADER),
            uid: read(UID_HEADER),
            expiry: read(EXPIRY_HEADER),
        }
    }
}

/// Raw response; any status is a valid response at this layer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Vec<u8>,
    pub meta: ResponseMeta,
}

impl ApiResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Turn a non-2xx response into a normalized [`ApiError`].
    pub fn error_for_status(self, fallback: &str) -> Result<Self, ApiError> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(ApiError::from_body(self.status, &self.body, fallback))
        }
    }

    /// Decode the resource body, enveloped or bare.
    pub fn json<T: DeserializeOwned>(&self, fallback: &str) -> Result<T, ApiError> {
        serde_json::from_slice::<Payload<T>>(&self.body)
            .map(Payload::into_inner)
            .map_err(|err| {
                warn!(status = self.status, error = %err, "Response body did not match expected shape");
                ApiError::new(self.status, vec![fallback.to_string()])
            })
    }
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("invalid request url `{path}`: {source}")]
    Url {
        path: String,
        #[source]
        source: url::ParseError,
    },
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("transport unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, TransportError>;
}

/// reqwest-backed transport that authenticates with the current session.
pub struct HttpTransport {
    client: Client,
    base: Url,
    session: Arc<SessionProvider>,
}

impl HttpTransport {
    pub fn new(
        base: Url,
        timeout: Duration,
        session: Arc<SessionProvider>,
    ) -> Result<Self, TransportError> {
        let client = Client::builder()
            .user_agent(Self::user_agent())
            .timeout(timeout)
            .build()?;
        Ok(Self {
            client,
            base,
            session,
        })
    }

    pub fn user_agent() -> &'static str {
        concat!("finquiz/", env!("CARGO_PKG_VERSION"))
    }

    pub fn url(&self, path: &str) -> Result<Url, TransportError> {
        self.base
            .join(path.trim_start_matches('/'))
            .map_err(|source| TransportError::Url {
                path: path.to_string(),
                source,
            })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, TransportError> {
        let url = self.url(&request.path)?;
        let mut builder = self.client.request(request.method.into(), url);

        let session = self.session.get();
        if let Some((token, client, uid)) = session.credentials() {
            builder = builder
                .header(ACCESS_TOKEN_HEADER, token)
                .header(CLIENT_HEADER, client)
                .header(UID_HEADER, uid);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let meta = ResponseMeta::from_headers(response.headers());
        let body = response.bytes().await?.to_vec();

        debug!(
            method = %request.method,
            path = %request.path,
            status,
            bytes = body.len(),
            "API request completed"
        );

        Ok(ApiResponse { status, body, meta })
    }
}

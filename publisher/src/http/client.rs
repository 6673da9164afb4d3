//! HTTP client for the publishing server

use std::time::Duration;

use http::header::{self, HeaderValue};
use http::{Method, StatusCode};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, error};
use url::Url;

use connect_models::ErrorBody;

use crate::errors::PublishError;

/// Client timeouts
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Time allowed to establish a connection
    pub connect_timeout: Duration,

    /// Time allowed for a whole request/response round trip
    pub request_timeout: Duration,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(300),
        }
    }
}

/// Request body variants
pub enum RequestBody {
    Empty,
    Json(Vec<u8>),
    Raw(Vec<u8>),
}

/// Session with one publishing server
///
/// Owns a dedicated connection pool and the session cookie. The pool is
/// closed when the client is dropped, on every exit path.
pub struct ConnectClient {
    client: Client,
    base_url: Url,
    api_key: SecretString,
    cookie: Option<HeaderValue>,
}

impl ConnectClient {
    /// Open a session against `server` authenticated by `api_key`
    pub fn open(server: &Url, api_key: SecretString) -> Result<Self, PublishError> {
        Self::open_with(server, api_key, &ClientOptions::default())
    }

    pub fn open_with(
        server: &Url,
        api_key: SecretString,
        options: &ClientOptions,
    ) -> Result<Self, PublishError> {
        let client = Client::builder()
            .connect_timeout(options.connect_timeout)
            .timeout(options.request_timeout)
            .pool_max_idle_per_host(1)
            .build()?;

        debug!("Opening session with {}", server);
        Ok(Self {
            client,
            base_url: normalize_base(server),
            api_key,
            cookie: None,
        })
    }

    /// Get the base URL
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Session cookie currently held, if any
    pub fn cookie(&self) -> Option<&HeaderValue> {
        self.cookie.as_ref()
    }

    /// Resolve an API path (without leading slash) against the server URL
    pub fn url(&self, path: &str) -> Result<Url, PublishError> {
        Ok(self.base_url.join(path.trim_start_matches('/'))?)
    }

    /// Make a GET request
    pub async fn get<T: DeserializeOwned>(&mut self, path: &str) -> Result<T, PublishError> {
        self.request(Method::GET, path, RequestBody::Empty).await
    }

    /// Make a POST request with a JSON body
    pub async fn post<T: DeserializeOwned, B: Serialize>(
        &mut self,
        path: &str,
        body: &B,
    ) -> Result<T, PublishError> {
        let body = serde_json::to_vec(body)?;
        self.request(Method::POST, path, RequestBody::Json(body)).await
    }

    /// Make a POST request with a raw byte body
    pub async fn post_bytes<T: DeserializeOwned>(
        &mut self,
        path: &str,
        body: Vec<u8>,
    ) -> Result<T, PublishError> {
        self.request(Method::POST, path, RequestBody::Raw(body)).await
    }

    /// Perform one request/response round trip
    pub async fn request<T: DeserializeOwned>(
        &mut self,
        method: Method,
        path: &str,
        body: RequestBody,
    ) -> Result<T, PublishError> {
        let url = self.url(path)?;
        debug!("Performing: {} {}", method, url);

        let mut request = self
            .client
            .request(method.clone(), url.clone())
            .header(
                header::AUTHORIZATION,
                format!("Key {}", self.api_key.expose_secret()),
            );

        if let Some(cookie) = &self.cookie {
            request = request.header(header::COOKIE, cookie.clone());
        }

        request = match body {
            RequestBody::Empty => request,
            RequestBody::Json(bytes) => request
                .header(header::CONTENT_TYPE, "application/json")
                .body(bytes),
            RequestBody::Raw(bytes) => request
                .header(header::CONTENT_TYPE, "application/octet-stream")
                .body(bytes),
        };

        let response = request.send().await.map_err(|e| {
            error!("Request {} {} failed: {}", method, url, e);
            PublishError::from(e)
        })?;

        self.update_cookie(response.headers().get(header::SET_COOKIE));

        let status = response.status();
        let raw = response.bytes().await?;
        decode_response(status, &raw)
    }

    /// Replace the session cookie with the one just issued, or drop it
    fn update_cookie(&mut self, set_cookie: Option<&HeaderValue>) {
        self.cookie = set_cookie.and_then(cookie_pair);
    }
}

impl Drop for ConnectClient {
    fn drop(&mut self) {
        debug!("Closing session with {}", self.base_url);
    }
}

/// Map a response status and body onto a payload or an error kind
pub fn decode_response<T: DeserializeOwned>(status: StatusCode, raw: &[u8]) -> Result<T, PublishError> {
    if status.is_server_error() {
        error!(
            "Received HTTP {}: {}",
            status.as_u16(),
            String::from_utf8_lossy(raw)
        );
        let message = serde_json::from_slice::<ErrorBody>(raw)
            .map(|body| body.error)
            .unwrap_or_else(|_| format!("Unexpected response code: {}", status.as_u16()));
        return Err(PublishError::Transport(message));
    }

    if status.is_client_error() {
        return match serde_json::from_slice::<ErrorBody>(raw) {
            Ok(body) => Err(PublishError::Application(body.error)),
            Err(_) => Err(PublishError::Transport(format!(
                "Unexpected response code: {}",
                status.as_u16()
            ))),
        };
    }

    serde_json::from_slice(raw).map_err(|e| {
        PublishError::Transport(format!("Unparseable response ({}): {}", status.as_u16(), e))
    })
}

/// `name=value` part of a `Set-Cookie` header
fn cookie_pair(set_cookie: &HeaderValue) -> Option<HeaderValue> {
    let text = set_cookie.to_str().ok()?;
    let pair = text.split(';').next()?.trim();
    if pair.is_empty() {
        return None;
    }
    HeaderValue::from_str(pair).ok()
}

/// Make sure relative API paths resolve below the server's path prefix
fn normalize_base(server: &Url) -> Url {
    let mut base = server.clone();
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    base.set_query(None);
    base.set_fragment(None);
    base
}

use base64::{engine::general_purpose::STANDARD, Engine as _};
use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::{Error, ErrorContext, Result};

/// Body text of the synthesized offline response.
pub const OFFLINE_BODY: &str = "Offline - Please check your internet connection";

/// Whether a response carries real network data or is an opaque network error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseKind {
    #[default]
    Basic,
    Error,
}

/// An immutable response snapshot whose body may be consumed once.
#[derive(Debug)]
pub struct Response {
    status: u16,
    status_text: String,
    headers: HeaderMap,
    body: Bytes,
    kind: ResponseKind,
    url: Option<Url>,
}

impl Response {
    /// Build a basic response; the status text defaults to the canonical reason phrase.
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        let status_text = StatusCode::from_u16(status)
            .ok()
            .and_then(|s| s.canonical_reason())
            .unwrap_or_default()
            .to_string();
        Self {
            status,
            status_text,
            headers: HeaderMap::new(),
            body: body.into(),
            kind: ResponseKind::Basic,
            url: None,
        }
    }

    /// The opaque error-flagged response: status 0, no headers, empty body.
    pub fn network_error() -> Self {
        Self {
            status: 0,
            status_text: String::new(),
            headers: HeaderMap::new(),
            body: Bytes::new(),
            kind: ResponseKind::Error,
            url: None,
        }
    }

    /// The response served when neither the network nor the cache can answer.
    pub fn offline() -> Self {
        Self::new(503, OFFLINE_BODY)
            .with_status_text("Service Unavailable")
            .with_header(CONTENT_TYPE, HeaderValue::from_static("text/plain"))
    }

    pub fn with_status_text(mut self, text: impl Into<String>) -> Self {
        self.status_text = text.into();
        self
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    pub fn with_url(mut self, url: Url) -> Self {
        self.url = Some(url);
        self
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn status_text(&self) -> &str {
        &self.status_text
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn kind(&self) -> ResponseKind {
        self.kind
    }

    pub fn url(&self) -> Option<&Url> {
        self.url.as_ref()
    }

    pub fn content_type(&self) -> Option<&str> {
        self.headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok())
    }

    /// 2xx status, the success check used for manifest population.
    pub fn is_ok(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Only an exact 200 from a non-error response is persisted.
    pub fn is_cacheable(&self) -> bool {
        self.status == 200 && self.kind != ResponseKind::Error
    }

    /// Produce an independent copy whose body can be consumed separately.
    pub fn duplicate(&self) -> Self {
        Self {
            status: self.status,
            status_text: self.status_text.clone(),
            headers: self.headers.clone(),
            body: self.body.clone(),
            kind: self.kind,
            url: self.url.clone(),
        }
    }

    /// Consume the response and return its body.
    pub fn into_body(self) -> Bytes {
        self.body
    }

    /// Consume the response and return its body as (lossy) UTF-8 text.
    pub fn text(self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Serializable snapshot of a [`Response`] as written by persistent storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredResponse {
    pub status: u16,
    pub status_text: String,
    /// Header names with base64-encoded raw values, so non-ASCII bytes survive.
    pub headers: Vec<(String, String)>,
    /// Base64-encoded body.
    pub body: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl StoredResponse {
    /// Snapshot a response. The response itself is consumed.
    pub fn capture(response: Response) -> Self {
        let headers = response
            .headers
            .iter()
            .map(|(k, v)| (k.to_string(), STANDARD.encode(v.as_bytes())))
            .collect();
        Self {
            status: response.status,
            status_text: response.status_text,
            headers,
            body: STANDARD.encode(&response.body),
            url: response.url.map(String::from),
        }
    }

    pub fn into_response(self) -> Result<Response> {
        let ctx = || ErrorContext::new().with_source("stored_response");
        let body = STANDARD
            .decode(self.body.as_bytes())
            .map_err(|e| Error::storage_with_context(format!("corrupt body: {}", e), ctx()))?;

        let mut headers = HeaderMap::new();
        for (k, v) in &self.headers {
            let name = HeaderName::from_bytes(k.as_bytes()).map_err(|e| {
                Error::storage_with_context(format!("bad header name: {}", e), ctx())
            })?;
            let raw = STANDARD.decode(v.as_bytes()).map_err(|e| {
                Error::storage_with_context(format!("corrupt header {}: {}", k, e), ctx())
            })?;
            let value = HeaderValue::from_bytes(&raw).map_err(|e| {
                Error::storage_with_context(format!("bad header value: {}", e), ctx())
            })?;
            headers.append(name, value);
        }

        let mut response = Response::new(self.status, body)
            .with_status_text(self.status_text)
            .with_headers(headers);
        if let Some(url) = self.url {
            response = response.with_url(Url::parse(&url)?);
        }
        Ok(response)
    }
}

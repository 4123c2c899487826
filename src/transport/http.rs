use async_trait::async_trait;
use reqwest::Proxy;
use std::env;
use std::time::Duration;

use super::{Fetcher, TransportError};
use crate::http::{Request, Response};

pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new() -> Result<Self, TransportError> {
        let mut builder = reqwest::Client::builder()
            .pool_max_idle_per_host(
                env::var("NETFIRST_HTTP_POOL_MAX_IDLE_PER_HOST")
                    .ok()
                    .and_then(|s| s.parse::<usize>().ok())
                    .unwrap_or(32),
            )
            .pool_idle_timeout(Some(Duration::from_secs(90)));

        // The agent imposes no timeout of its own; this only mirrors an
        // environment-level limit when the operator asks for one.
        if let Some(secs) = env::var("NETFIRST_HTTP_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
        {
            builder = builder.timeout(Duration::from_secs(secs));
        }

        if let Ok(proxy_url) = env::var("NETFIRST_PROXY_URL") {
            if let Ok(proxy) = Proxy::all(&proxy_url) {
                builder = builder.proxy(proxy);
            }
        }

        let client = builder
            .build()
            .map_err(|e| TransportError::Other(e.to_string()))?;

        Ok(Self { client })
    }
}

#[async_trait]
impl Fetcher for HttpTransport {
    async fn fetch(&self, request: &Request) -> Result<Response, TransportError> {
        let resp = self
            .client
            .request(request.method().clone(), request.url().clone())
            .headers(request.headers().clone())
            .send()
            .await?;

        let status = resp.status();
        let headers = resp.headers().clone();
        let url = resp.url().clone();
        // A body that cannot be read counts as a failed attempt.
        let body = resp.bytes().await?;

        Ok(Response::new(status.as_u16(), body)
            .with_status_text(status.canonical_reason().unwrap_or_default())
            .with_headers(headers)
            .with_url(url))
    }
}

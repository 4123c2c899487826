//! The network side of the interceptor.
//!
//! [`Fetcher`] is the seam the agent talks through; [`HttpTransport`] is the
//! reqwest-backed implementation used outside of tests.

mod http;

pub use http::HttpTransport;

use async_trait::async_trait;

use crate::http::{Request, Response};

/// A single network attempt.
///
/// `Err` means the attempt was rejected (DNS failure, refused connection,
/// offline, environment timeout). Any HTTP status, including 4xx and 5xx, is a
/// successful fetch.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, request: &Request) -> Result<Response, TransportError>;
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Network unreachable: {0}")]
    Unreachable(String),

    #[error("Transport error: {0}")]
    Other(String),
}

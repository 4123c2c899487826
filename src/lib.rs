//! # netfirst-cache
//!
//! A network-first offline caching agent for a single-page web application.
//!
//! ## Overview
//!
//! The agent owns one version-tagged cache bucket. At install it writes a fixed
//! manifest of essential resources into that bucket; at activation it deletes
//! every bucket left behind by other versions; and for each intercepted request
//! it tries the network once, keeps a copy of successful GET responses, and
//! falls back to the bucket and then to a synthesized `503 Service Unavailable`
//! when the network is unreachable.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use netfirst_cache::{AgentConfig, CacheInterceptor, ServiceWorker};
//! use netfirst_cache::cache::DiskStorage;
//! use netfirst_cache::host::ClientRegistry;
//! use netfirst_cache::http::Request;
//! use netfirst_cache::transport::HttpTransport;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> netfirst_cache::Result<()> {
//!     let agent = CacheInterceptor::new(
//!         AgentConfig::default(),
//!         Arc::new(HttpTransport::new()?),
//!         Arc::new(DiskStorage::new(".netfirst").await?),
//!         Arc::new(ClientRegistry::new()),
//!     )?;
//!
//!     agent.on_install().await?;
//!     agent.on_activate().await?;
//!
//!     let outcome = agent.on_fetch(Request::get("http://localhost/index.html")?).await;
//!     if let Some(resp) = outcome.into_response() {
//!         println!("{} {}", resp.status(), resp.status_text());
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`agent`] | The interceptor, its lifecycle and counters |
//! | [`cache`] | Bucket storage (memory and disk) |
//! | [`config`] | Bucket name, manifest and origin |
//! | [`host`] | Hosting-environment primitives (skip waiting, client claiming) |
//! | [`http`] | Request/response model |
//! | [`transport`] | Network fetcher backed by reqwest |

pub mod agent;
pub mod cache;
pub mod config;
pub mod host;
pub mod http;
pub mod transport;

pub use agent::{AgentStats, CacheInterceptor, FetchOutcome, Lifecycle, ServiceWorker, SweepReport};
pub use config::AgentConfig;

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for the library
pub mod error;
pub use error::{Error, ErrorContext};

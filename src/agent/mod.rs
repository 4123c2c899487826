//! The cache interceptor and its lifecycle.
//!
//! The host drives an agent through three hooks, awaiting each one before it
//! considers the phase settled:
//!
//! - [`ServiceWorker::on_install`] writes the manifest into the current bucket.
//! - [`ServiceWorker::on_activate`] deletes buckets from other versions and
//!   claims open clients.
//! - [`ServiceWorker::on_fetch`] answers one intercepted request, network first.

mod interceptor;
mod lifecycle;
mod stats;

pub use interceptor::CacheInterceptor;
pub use lifecycle::Lifecycle;
pub use stats::AgentStats;

use async_trait::async_trait;

use crate::http::{Request, Response};
use crate::Result;

/// What the agent decided to do with an intercepted request.
#[derive(Debug)]
pub enum FetchOutcome {
    /// Not intercepted; the host applies its default handling.
    PassThrough,
    /// The agent answers with this response.
    Respond(Response),
}

impl FetchOutcome {
    pub fn is_pass_through(&self) -> bool {
        matches!(self, FetchOutcome::PassThrough)
    }

    pub fn into_response(self) -> Option<Response> {
        match self {
            FetchOutcome::PassThrough => None,
            FetchOutcome::Respond(resp) => Some(resp),
        }
    }
}

/// Result of the stale-bucket sweep run during activation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub deleted: Vec<String>,
    /// Buckets whose deletion failed; the sweep carried on past them.
    pub failed: Vec<String>,
}

/// Lifecycle hooks invoked by the hosting environment.
#[async_trait]
pub trait ServiceWorker: Send + Sync {
    async fn on_install(&self) -> Result<()>;

    async fn on_activate(&self) -> Result<SweepReport>;

    /// Never fails: every error path ends in a cached or synthesized response.
    async fn on_fetch(&self, request: Request) -> FetchOutcome;
}

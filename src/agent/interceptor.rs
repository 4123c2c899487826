use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::future::{join_all, try_join_all};
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

use super::lifecycle::Lifecycle;
use super::stats::{AgentStats, AtomicStats};
use super::{FetchOutcome, ServiceWorker, SweepReport};
use crate::cache::CacheStorage;
use crate::config::AgentConfig;
use crate::host::Host;
use crate::http::{Request, Response};
use crate::transport::Fetcher;
use crate::{Error, Result};

/// Network-first interceptor bound to one version-tagged bucket.
pub struct CacheInterceptor {
    config: Arc<AgentConfig>,
    fetcher: Arc<dyn Fetcher>,
    storage: Arc<dyn CacheStorage>,
    host: Arc<dyn Host>,
    state: Mutex<Lifecycle>,
    writes: TaskTracker,
    // One settle at a time: close/wait/reopen of the tracker must not interleave.
    settling: tokio::sync::Mutex<()>,
    stats: Arc<AtomicStats>,
}

impl CacheInterceptor {
    pub fn new(
        config: AgentConfig,
        fetcher: Arc<dyn Fetcher>,
        storage: Arc<dyn CacheStorage>,
        host: Arc<dyn Host>,
    ) -> Result<Self> {
        config.validate()?;
        info!(
            cache = %config.cache_name,
            backend = storage.name(),
            "[Service Worker] Loaded and ready!"
        );
        Ok(Self {
            config: Arc::new(config),
            fetcher,
            storage,
            host,
            state: Mutex::new(Lifecycle::Parsed),
            writes: TaskTracker::new(),
            settling: tokio::sync::Mutex::new(()),
            stats: Arc::new(AtomicStats::default()),
        })
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn state(&self) -> Lifecycle {
        match self.state.lock() {
            Ok(state) => *state,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    pub fn stats(&self) -> AgentStats {
        self.stats.to_stats()
    }

    /// Look up a manifest locator (or absolute URL) in the current bucket.
    pub async fn cached(&self, locator: &str) -> Result<Option<Response>> {
        let request = Request::get(self.config.resolve(locator)?.as_str())?;
        self.storage
            .match_request(&self.config.cache_name, &request)
            .await
    }

    /// Resume a version that was activated by an earlier process.
    ///
    /// Only a bucket carrying the activation marker written by
    /// [`ServiceWorker::on_activate`] counts; an installed but never activated
    /// bucket does not. Returns whether the agent is now active.
    pub async fn resume(&self) -> Result<bool> {
        if self.state() == Lifecycle::Active {
            return Ok(true);
        }
        if self.state() != Lifecycle::Parsed
            || !self.storage.is_activated(&self.config.cache_name).await?
        {
            return Ok(false);
        }
        self.transition("resume", &[Lifecycle::Parsed], Lifecycle::Active)?;
        info!("[Service Worker] Resumed {}", self.config.cache_name);
        Ok(true)
    }

    /// Wait until every background cache write spawned so far has finished.
    ///
    /// Concurrent callers are queued; each returns once the writes pending at
    /// its turn are done.
    pub async fn settle(&self) {
        let _turn = self.settling.lock().await;
        self.writes.close();
        self.writes.wait().await;
        self.writes.reopen();
    }

    fn set_state(&self, next: Lifecycle) {
        match self.state.lock() {
            Ok(mut state) => *state = next,
            Err(poisoned) => *poisoned.into_inner() = next,
        }
    }

    fn transition(
        &self,
        operation: &'static str,
        allowed: &[Lifecycle],
        next: Lifecycle,
    ) -> Result<()> {
        let mut state = match self.state.lock() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        };
        if !allowed.contains(&*state) {
            return Err(Error::InvalidState {
                operation,
                state: *state,
            });
        }
        *state = next;
        Ok(())
    }

    async fn fetch_manifest_entry(&self, locator: &str) -> Result<(Request, Response)> {
        let request = Request::get(self.config.resolve(locator)?.as_str())?;
        let response = self
            .fetcher
            .fetch(&request)
            .await
            .map_err(|e| Error::Manifest {
                locator: locator.to_string(),
                reason: e.to_string(),
            })?;
        if !response.is_ok() {
            return Err(Error::Manifest {
                locator: locator.to_string(),
                reason: format!("HTTP {}", response.status()),
            });
        }
        Ok((request, response))
    }

    async fn populate_manifest(&self) -> Result<()> {
        info!("[Cache] Caching essential files");
        let entries = try_join_all(
            self.config
                .manifest
                .iter()
                .map(|locator| self.fetch_manifest_entry(locator)),
        )
        .await?;
        self.storage
            .put_all(&self.config.cache_name, entries)
            .await
    }

    async fn sweep_stale_buckets(&self) -> Result<SweepReport> {
        let current = self.config.cache_name.as_str();
        let stale: Vec<String> = self
            .storage
            .keys()
            .await?
            .into_iter()
            .filter(|name| name != current)
            .collect();

        let results = join_all(stale.iter().map(|name| async move {
            info!("[Cache] Deleting old cache: {}", name);
            (name, self.storage.delete(name).await)
        }))
        .await;

        let mut report = SweepReport::default();
        for (name, result) in results {
            match result {
                Ok(_) => {
                    AtomicStats::bump(&self.stats.buckets_deleted);
                    report.deleted.push(name.clone());
                }
                Err(e) => {
                    warn!("[Cache] Failed to delete old cache {}: {}", name, e);
                    AtomicStats::bump(&self.stats.delete_failures);
                    report.failed.push(name.clone());
                }
            }
        }
        Ok(report)
    }

    /// Persist a duplicate of a network response without holding up the caller.
    fn store_in_background(&self, request: Request, response: Response) {
        let storage = Arc::clone(&self.storage);
        let stats = Arc::clone(&self.stats);
        let cache_name = self.config.cache_name.clone();
        self.writes.spawn(async move {
            info!("[Cache] Storing: {}", request.url());
            match storage.put(&cache_name, &request, response).await {
                Ok(()) => AtomicStats::bump(&stats.stored),
                Err(e) => {
                    warn!("[Cache] Failed to cache: {} {}", request.url(), e);
                    AtomicStats::bump(&stats.store_failures);
                }
            }
        });
    }

    async fn fallback(&self, request: &Request) -> Response {
        match self
            .storage
            .match_request(&self.config.cache_name, request)
            .await
        {
            Ok(Some(hit)) => {
                info!("[Cache] HIT: {}", request.url());
                AtomicStats::bump(&self.stats.cache_hits);
                return hit;
            }
            Ok(None) => debug!("[Cache] MISS: {}", request.url()),
            Err(e) => warn!("[Cache] Lookup failed for {}: {}", request.url(), e),
        }
        AtomicStats::bump(&self.stats.offline);
        Response::offline()
    }
}

#[async_trait]
impl ServiceWorker for CacheInterceptor {
    async fn on_install(&self) -> Result<()> {
        self.transition(
            "install",
            &[Lifecycle::Parsed, Lifecycle::Installed],
            Lifecycle::Installing,
        )?;
        info!("[Service Worker] Installing...");

        if let Err(e) = self.populate_manifest().await {
            error!("[Service Worker] Install failed: {}", e);
            self.set_state(Lifecycle::Parsed);
            return Err(e);
        }
        self.set_state(Lifecycle::Installed);

        if let Err(e) = self.host.skip_waiting().await {
            warn!("[Service Worker] skip_waiting failed: {}", e);
        }
        Ok(())
    }

    async fn on_activate(&self) -> Result<SweepReport> {
        self.transition("activate", &[Lifecycle::Installed], Lifecycle::Activating)?;
        info!("[Service Worker] Activating...");

        let report = match self.sweep_stale_buckets().await {
            Ok(report) => report,
            Err(e) => {
                error!("[Service Worker] Could not enumerate caches: {}", e);
                self.set_state(Lifecycle::Installed);
                return Err(e);
            }
        };
        if let Err(e) = self.storage.mark_activated(&self.config.cache_name).await {
            warn!("[Service Worker] Could not record activation: {}", e);
        }
        self.set_state(Lifecycle::Active);

        if let Err(e) = self.host.claim_clients(&self.config.cache_name).await {
            warn!("[Service Worker] Failed to claim clients: {}", e);
        }
        Ok(report)
    }

    async fn on_fetch(&self, request: Request) -> FetchOutcome {
        if self.state() != Lifecycle::Active {
            debug!(state = %self.state(), "[Service Worker] Not active, ignoring {}", request.url());
            return FetchOutcome::PassThrough;
        }
        if !request.is_http_family() {
            info!("[Network] Skipping non-HTTP request: {}:", request.scheme());
            AtomicStats::bump(&self.stats.pass_through);
            return FetchOutcome::PassThrough;
        }
        if request.url().as_str().contains("chrome-extension://") {
            info!("[Network] Skipping chrome-extension URL");
            AtomicStats::bump(&self.stats.pass_through);
            return FetchOutcome::PassThrough;
        }

        match self.fetcher.fetch(&request).await {
            Ok(response) => {
                AtomicStats::bump(&self.stats.network);
                if response.is_cacheable() && request.is_get() && request.is_http_family() {
                    let copy = response.duplicate();
                    self.store_in_background(request, copy);
                }
                FetchOutcome::Respond(response)
            }
            Err(e) => {
                debug!("[Network] Fetch failed for {}: {}", request.url(), e);
                FetchOutcome::Respond(self.fallback(&request).await)
            }
        }
    }
}

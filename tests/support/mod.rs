//! Shared fixtures: a scripted network and a storage wrapper that can be told to fail.
#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use netfirst_cache::cache::{CacheStorage, MemoryStorage};
use netfirst_cache::host::ClientRegistry;
use netfirst_cache::http::{Request, Response};
use netfirst_cache::transport::{Fetcher, TransportError};
use netfirst_cache::{AgentConfig, CacheInterceptor, Error, ErrorContext, Result};

pub const ORIGIN: &str = "http://localhost";

pub fn url(path: &str) -> String {
    format!("{}{}", ORIGIN, path)
}

/// Network stand-in: fixed routes, switchable connectivity, call counting.
#[derive(Default)]
pub struct ScriptedNetwork {
    routes: Mutex<HashMap<String, (u16, String)>>,
    error_flagged: Mutex<HashSet<String>>,
    offline: AtomicBool,
    calls: AtomicUsize,
}

impl ScriptedNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// A network that serves the default manifest.
    pub fn with_manifest() -> Self {
        let net = Self::new();
        net.route("/", 200, "<html>root</html>");
        net.route("/index.html", 200, "<html>index</html>");
        net.route("/manifest.json", 200, r#"{"name":"Gym Tracker"}"#);
        net
    }

    pub fn route(&self, path: &str, status: u16, body: &str) {
        self.routes
            .lock()
            .unwrap()
            .insert(url(path), (status, body.to_string()));
    }

    pub fn route_error_flagged(&self, path: &str) {
        self.error_flagged.lock().unwrap().insert(url(path));
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Fetcher for ScriptedNetwork {
    async fn fetch(&self, request: &Request) -> std::result::Result<Response, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.offline.load(Ordering::SeqCst) {
            return Err(TransportError::Unreachable("offline".into()));
        }
        let key = request.url().as_str().to_string();
        if self.error_flagged.lock().unwrap().contains(&key) {
            return Ok(Response::network_error());
        }
        match self.routes.lock().unwrap().get(&key) {
            Some((status, body)) => Ok(Response::new(*status, body.clone())),
            None => Err(TransportError::Unreachable(format!("no route to {}", key))),
        }
    }
}

/// Memory storage whose writes and deletions can be made to fail.
#[derive(Default)]
pub struct FlakyStorage {
    inner: MemoryStorage,
    fail_puts: AtomicBool,
    hang_puts: AtomicBool,
    fail_deletes: Mutex<HashSet<String>>,
}

impl FlakyStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_puts(&self, fail: bool) {
        self.fail_puts.store(fail, Ordering::SeqCst);
    }

    /// Make every `put` wait forever.
    pub fn hang_puts(&self, hang: bool) {
        self.hang_puts.store(hang, Ordering::SeqCst);
    }

    pub fn fail_delete_of(&self, name: &str) {
        self.fail_deletes.lock().unwrap().insert(name.to_string());
    }
}

fn injected(what: &str) -> Error {
    Error::storage_with_context(
        format!("injected {} failure", what),
        ErrorContext::new().with_source("flaky_storage"),
    )
}

#[async_trait]
impl CacheStorage for FlakyStorage {
    async fn open(&self, cache_name: &str) -> Result<()> {
        self.inner.open(cache_name).await
    }

    async fn keys(&self) -> Result<Vec<String>> {
        self.inner.keys().await
    }

    async fn has(&self, cache_name: &str) -> Result<bool> {
        self.inner.has(cache_name).await
    }

    async fn delete(&self, cache_name: &str) -> Result<bool> {
        if self.fail_deletes.lock().unwrap().contains(cache_name) {
            return Err(injected("delete"));
        }
        self.inner.delete(cache_name).await
    }

    async fn put(&self, cache_name: &str, request: &Request, response: Response) -> Result<()> {
        if self.hang_puts.load(Ordering::SeqCst) {
            futures::future::pending::<()>().await;
        }
        if self.fail_puts.load(Ordering::SeqCst) {
            return Err(injected("put"));
        }
        self.inner.put(cache_name, request, response).await
    }

    async fn put_all(&self, cache_name: &str, entries: Vec<(Request, Response)>) -> Result<()> {
        self.inner.put_all(cache_name, entries).await
    }

    async fn match_request(
        &self,
        cache_name: &str,
        request: &Request,
    ) -> Result<Option<Response>> {
        self.inner.match_request(cache_name, request).await
    }

    async fn entries(&self, cache_name: &str) -> Result<Vec<String>> {
        self.inner.entries(cache_name).await
    }

    async fn mark_activated(&self, cache_name: &str) -> Result<()> {
        self.inner.mark_activated(cache_name).await
    }

    async fn is_activated(&self, cache_name: &str) -> Result<bool> {
        self.inner.is_activated(cache_name).await
    }

    fn name(&self) -> &'static str {
        "flaky"
    }
}

pub struct Fixture {
    pub agent: CacheInterceptor,
    pub network: Arc<ScriptedNetwork>,
    pub storage: Arc<FlakyStorage>,
    pub host: Arc<ClientRegistry>,
}

impl Fixture {
    pub fn new(config: AgentConfig) -> Self {
        Self::with_parts(
            config,
            Arc::new(ScriptedNetwork::with_manifest()),
            Arc::new(FlakyStorage::new()),
        )
    }

    pub fn with_parts(
        config: AgentConfig,
        network: Arc<ScriptedNetwork>,
        storage: Arc<FlakyStorage>,
    ) -> Self {
        let host = Arc::new(ClientRegistry::new());
        let agent = CacheInterceptor::new(config, network.clone(), storage.clone(), host.clone())
            .expect("valid config");
        Self {
            agent,
            network,
            storage,
            host,
        }
    }
}

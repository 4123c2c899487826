//! Cache storage trait and the in-memory implementation.

use super::key::RequestKey;
use crate::http::{Request, Response};
use crate::{Error, ErrorContext, Result};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// A set of named buckets, each mapping requests to response snapshots.
///
/// Buckets are created lazily on first `open` or write and live until
/// `delete`; there is no per-entry eviction. Only GET requests can be stored
/// or matched.
#[async_trait]
pub trait CacheStorage: Send + Sync {
    /// Open the bucket, creating it when absent.
    async fn open(&self, cache_name: &str) -> Result<()>;
    /// Bucket names in creation order.
    async fn keys(&self) -> Result<Vec<String>>;
    async fn has(&self, cache_name: &str) -> Result<bool>;
    /// Delete a bucket and everything in it. Returns whether it existed.
    async fn delete(&self, cache_name: &str) -> Result<bool>;
    /// Store (or overwrite) one entry.
    async fn put(&self, cache_name: &str, request: &Request, response: Response) -> Result<()>;
    /// Store a batch; either every entry lands or none does.
    async fn put_all(&self, cache_name: &str, entries: Vec<(Request, Response)>) -> Result<()>;
    async fn match_request(&self, cache_name: &str, request: &Request)
        -> Result<Option<Response>>;
    /// Request keys stored in a bucket; empty when the bucket does not exist.
    async fn entries(&self, cache_name: &str) -> Result<Vec<String>>;
    /// Record that the bucket's version completed activation. The marker lives
    /// and dies with the bucket.
    async fn mark_activated(&self, cache_name: &str) -> Result<()>;
    /// Whether the bucket exists and carries the activation marker.
    async fn is_activated(&self, cache_name: &str) -> Result<bool>;
    fn name(&self) -> &'static str;
}

pub(crate) fn ensure_storable(request: &Request) -> Result<()> {
    if !request.is_get() {
        return Err(Error::storage_with_context(
            format!("refusing to store {} request", request.method()),
            ErrorContext::new().with_details(request.url().as_str()),
        ));
    }
    Ok(())
}

#[derive(Default)]
struct Bucket {
    entries: BTreeMap<RequestKey, Response>,
    activated: bool,
}

pub struct MemoryStorage {
    // Vec keeps buckets in creation order.
    buckets: RwLock<Vec<(String, Bucket)>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self {
            buckets: RwLock::new(Vec::new()),
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Vec<(String, Bucket)>>> {
        self.buckets.read().map_err(|_| poisoned())
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Vec<(String, Bucket)>>> {
        self.buckets.write().map_err(|_| poisoned())
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

fn poisoned() -> Error {
    Error::storage_with_context(
        "MemoryStorage poisoned",
        ErrorContext::new().with_source("memory_storage"),
    )
}

fn bucket_mut<'a>(buckets: &'a mut Vec<(String, Bucket)>, cache_name: &str) -> &'a mut Bucket {
    let idx = match buckets.iter().position(|(n, _)| n == cache_name) {
        Some(idx) => idx,
        None => {
            buckets.push((cache_name.to_string(), Bucket::default()));
            buckets.len() - 1
        }
    };
    &mut buckets[idx].1
}

#[async_trait]
impl CacheStorage for MemoryStorage {
    async fn open(&self, cache_name: &str) -> Result<()> {
        let mut buckets = self.write()?;
        bucket_mut(&mut buckets, cache_name);
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<String>> {
        Ok(self.read()?.iter().map(|(n, _)| n.clone()).collect())
    }

    async fn has(&self, cache_name: &str) -> Result<bool> {
        Ok(self.read()?.iter().any(|(n, _)| n == cache_name))
    }

    async fn delete(&self, cache_name: &str) -> Result<bool> {
        let mut buckets = self.write()?;
        let before = buckets.len();
        buckets.retain(|(n, _)| n != cache_name);
        Ok(buckets.len() != before)
    }

    async fn put(&self, cache_name: &str, request: &Request, response: Response) -> Result<()> {
        ensure_storable(request)?;
        let mut buckets = self.write()?;
        bucket_mut(&mut buckets, cache_name)
            .entries
            .insert(RequestKey::from_request(request), response);
        Ok(())
    }

    async fn put_all(&self, cache_name: &str, entries: Vec<(Request, Response)>) -> Result<()> {
        for (request, _) in &entries {
            ensure_storable(request)?;
        }
        let mut buckets = self.write()?;
        let bucket = bucket_mut(&mut buckets, cache_name);
        for (request, response) in entries {
            bucket.entries.insert(RequestKey::from_request(&request), response);
        }
        Ok(())
    }

    async fn match_request(
        &self,
        cache_name: &str,
        request: &Request,
    ) -> Result<Option<Response>> {
        if !request.is_get() {
            return Ok(None);
        }
        let key = RequestKey::from_request(request);
        Ok(self
            .read()?
            .iter()
            .find(|(n, _)| n == cache_name)
            .and_then(|(_, bucket)| bucket.entries.get(&key))
            .map(Response::duplicate))
    }

    async fn entries(&self, cache_name: &str) -> Result<Vec<String>> {
        Ok(self
            .read()?
            .iter()
            .find(|(n, _)| n == cache_name)
            .map(|(_, bucket)| {
                bucket
                    .entries
                    .keys()
                    .map(|k| k.as_str().to_string())
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn mark_activated(&self, cache_name: &str) -> Result<()> {
        let mut buckets = self.write()?;
        bucket_mut(&mut buckets, cache_name).activated = true;
        Ok(())
    }

    async fn is_activated(&self, cache_name: &str) -> Result<bool> {
        Ok(self
            .read()?
            .iter()
            .any(|(n, bucket)| n == cache_name && bucket.activated))
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

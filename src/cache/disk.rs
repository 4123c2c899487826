//! Persistent bucket storage on the local filesystem.
//!
//! Layout under the root directory:
//!
//! ```text
//! buckets.json              bucket names in creation order
//! <sha256(name)>/
//!     bucket.json           { "name": ..., "activated": bool }
//!     <sha256(key)>.json    { "key": ..., "response": StoredResponse }
//! ```
//!
//! Entry files are written to a temporary name and renamed into place, so a
//! reader never observes a half-written entry. Batches are staged in a scratch
//! directory first and only moved into the bucket once every entry is on disk;
//! if a move fails, the entries already moved are put back the way they were.
//! Deleting a bucket renames its directory out of the way before the index
//! forgets the name, and a directory found under an unlisted name is cleared
//! before the name is registered again.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::sync::Mutex;
use tracing::warn;

use super::backend::{ensure_storable, CacheStorage};
use super::key::{hex_digest, RequestKey};
use crate::http::{Request, Response, StoredResponse};
use crate::{Error, ErrorContext, Result};

const INDEX_FILE: &str = "buckets.json";
const BUCKET_META: &str = "bucket.json";

#[derive(Debug, Serialize, Deserialize)]
struct BucketMeta {
    name: String,
    #[serde(default)]
    activated: bool,
}

#[derive(Debug, Serialize, Deserialize)]
struct DiskEntry {
    key: String,
    response: StoredResponse,
}

pub struct DiskStorage {
    root: PathBuf,
    // Serializes bucket index updates within this process.
    index_lock: Mutex<()>,
}

impl DiskStorage {
    /// Use `root` as the storage directory, creating it if needed.
    pub async fn new(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root).await?;
        Ok(Self {
            root,
            index_lock: Mutex::new(()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn bucket_dir(&self, cache_name: &str) -> PathBuf {
        self.root.join(hex_digest(cache_name))
    }

    async fn read_index(&self) -> Result<Vec<String>> {
        match fs::read(self.root.join(INDEX_FILE)).await {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn write_index(&self, names: &[String]) -> Result<()> {
        write_atomic(&self.root.join(INDEX_FILE), &serde_json::to_vec_pretty(names)?).await
    }

    async fn ensure_bucket(&self, cache_name: &str) -> Result<PathBuf> {
        let dir = self.bucket_dir(cache_name);
        let _guard = self.index_lock.lock().await;
        let mut names = self.read_index().await?;
        if !names.iter().any(|n| n == cache_name) {
            // Leftover from an interrupted delete; its entries must not come back.
            match fs::remove_dir_all(&dir).await {
                Ok(()) => warn!("[Cache] Cleared leftover directory for {}", cache_name),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
            fs::create_dir_all(&dir).await?;
            let meta = BucketMeta {
                name: cache_name.to_string(),
                activated: false,
            };
            write_atomic(&dir.join(BUCKET_META), &serde_json::to_vec(&meta)?).await?;
            names.push(cache_name.to_string());
            self.write_index(&names).await?;
        }
        Ok(dir)
    }

    async fn bucket_exists(&self, cache_name: &str) -> Result<bool> {
        Ok(self.read_index().await?.iter().any(|n| n == cache_name))
    }

    async fn read_meta(&self, cache_name: &str) -> Result<BucketMeta> {
        let bytes = fs::read(self.bucket_dir(cache_name).join(BUCKET_META)).await?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let tmp = path.with_extension(format!("tmp-{}", uuid::Uuid::new_v4()));
    fs::write(&tmp, bytes).await?;
    if let Err(e) = fs::rename(&tmp, path).await {
        let _ = fs::remove_file(&tmp).await;
        return Err(e.into());
    }
    Ok(())
}

fn entry_file(key: &RequestKey) -> String {
    format!("{}.json", key.digest())
}

fn encode_entry(request: &Request, response: Response) -> Result<(String, Vec<u8>)> {
    let key = RequestKey::from_request(request);
    let entry = DiskEntry {
        key: key.as_str().to_string(),
        response: StoredResponse::capture(response),
    };
    Ok((entry_file(&key), serde_json::to_vec(&entry)?))
}

#[async_trait]
impl CacheStorage for DiskStorage {
    async fn open(&self, cache_name: &str) -> Result<()> {
        self.ensure_bucket(cache_name).await.map(|_| ())
    }

    async fn keys(&self) -> Result<Vec<String>> {
        self.read_index().await
    }

    async fn has(&self, cache_name: &str) -> Result<bool> {
        self.bucket_exists(cache_name).await
    }

    async fn delete(&self, cache_name: &str) -> Result<bool> {
        let _guard = self.index_lock.lock().await;
        let mut names = self.read_index().await?;
        let before = names.len();
        names.retain(|n| n != cache_name);
        if names.len() == before {
            return Ok(false);
        }

        let dir = self.bucket_dir(cache_name);
        let trash = self.root.join(format!(".trash-{}", uuid::Uuid::new_v4()));
        match fs::rename(&dir, &trash).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(Error::storage_with_context(
                    format!("failed to remove bucket directory: {}", e),
                    ErrorContext::new()
                        .with_details(cache_name)
                        .with_source("disk_storage"),
                ))
            }
        }
        if let Err(e) = self.write_index(&names).await {
            // Still listed, so the entries go back where they were.
            let _ = fs::rename(&trash, &dir).await;
            return Err(e);
        }
        match fs::remove_dir_all(&trash).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(
                "[Cache] Deleted {} but left {} behind: {}",
                cache_name,
                trash.display(),
                e
            ),
        }
        Ok(true)
    }

    async fn put(&self, cache_name: &str, request: &Request, response: Response) -> Result<()> {
        ensure_storable(request)?;
        let dir = self.ensure_bucket(cache_name).await?;
        let (file, bytes) = encode_entry(request, response)?;
        write_atomic(&dir.join(file), &bytes).await
    }

    async fn put_all(&self, cache_name: &str, entries: Vec<(Request, Response)>) -> Result<()> {
        for (request, _) in &entries {
            ensure_storable(request)?;
        }
        let mut encoded = Vec::with_capacity(entries.len());
        for (request, response) in entries {
            encoded.push(encode_entry(&request, response)?);
        }

        let staging = self
            .root
            .join(format!(".staging-{}", uuid::Uuid::new_v4()));
        fs::create_dir_all(&staging).await?;
        for (file, bytes) in &encoded {
            if let Err(e) = fs::write(staging.join(file), bytes).await {
                let _ = fs::remove_dir_all(&staging).await;
                return Err(e.into());
            }
        }

        let dir = match self.ensure_bucket(cache_name).await {
            Ok(dir) => dir,
            Err(e) => {
                let _ = fs::remove_dir_all(&staging).await;
                return Err(e);
            }
        };

        // Each moved entry remembers what it replaced so a failure can undo it.
        let mut placed: Vec<(&str, Option<Vec<u8>>)> = Vec::with_capacity(encoded.len());
        let mut outcome: Result<()> = Ok(());
        for (file, _) in &encoded {
            let target = dir.join(file);
            let previous = match fs::read(&target).await {
                Ok(bytes) => Some(bytes),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
                Err(e) => {
                    outcome = Err(e.into());
                    break;
                }
            };
            if let Err(e) = fs::rename(staging.join(file), &target).await {
                outcome = Err(e.into());
                break;
            }
            placed.push((file.as_str(), previous));
        }

        if outcome.is_err() {
            for (file, previous) in placed.into_iter().rev() {
                let target = dir.join(file);
                let restored = match previous {
                    Some(bytes) => write_atomic(&target, &bytes).await,
                    None => fs::remove_file(&target).await.map_err(Error::from),
                };
                if let Err(e) = restored {
                    warn!("[Cache] Could not roll back {}: {}", target.display(), e);
                }
            }
        }
        let _ = fs::remove_dir_all(&staging).await;
        outcome
    }

    async fn match_request(
        &self,
        cache_name: &str,
        request: &Request,
    ) -> Result<Option<Response>> {
        if !request.is_get() || !self.bucket_exists(cache_name).await? {
            return Ok(None);
        }
        let key = RequestKey::from_request(request);
        let path = self.bucket_dir(cache_name).join(entry_file(&key));
        let bytes = match fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let entry: DiskEntry = serde_json::from_slice(&bytes)?;
        entry.response.into_response().map(Some)
    }

    async fn entries(&self, cache_name: &str) -> Result<Vec<String>> {
        if !self.bucket_exists(cache_name).await? {
            return Ok(Vec::new());
        }
        let mut keys = Vec::new();
        let mut dir = fs::read_dir(self.bucket_dir(cache_name)).await?;
        while let Some(item) = dir.next_entry().await? {
            let name = item.file_name();
            let name = name.to_string_lossy();
            if name == BUCKET_META || !name.ends_with(".json") {
                continue;
            }
            let entry: DiskEntry = serde_json::from_slice(&fs::read(item.path()).await?)?;
            keys.push(entry.key);
        }
        keys.sort();
        Ok(keys)
    }

    async fn mark_activated(&self, cache_name: &str) -> Result<()> {
        let dir = self.ensure_bucket(cache_name).await?;
        let meta = BucketMeta {
            name: cache_name.to_string(),
            activated: true,
        };
        write_atomic(&dir.join(BUCKET_META), &serde_json::to_vec(&meta)?).await
    }

    async fn is_activated(&self, cache_name: &str) -> Result<bool> {
        if !self.bucket_exists(cache_name).await? {
            return Ok(false);
        }
        Ok(self.read_meta(cache_name).await?.activated)
    }

    fn name(&self) -> &'static str {
        "disk"
    }
}

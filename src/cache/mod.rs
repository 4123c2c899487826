//! Versioned cache buckets.
//!
//! # Cache Storage Module
//!
//! A [`CacheStorage`] holds any number of named buckets. Each bucket maps GET
//! requests (keyed by URL, see [`RequestKey`]) to response snapshots. Buckets
//! of different names coexist until one is explicitly deleted; the agent relies
//! on that to rotate versions by name.
//!
//! ## Key Components
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`CacheStorage`] | Trait for bucket storage backends |
//! | [`MemoryStorage`] | In-process buckets, used by tests and embedded hosts |
//! | [`DiskStorage`] | Persistent buckets under a directory |
//! | [`RequestKey`] | Entry identity derived from the request URL |
//!
//! ## Example
//!
//! ```rust
//! use netfirst_cache::cache::{CacheStorage, MemoryStorage};
//! use netfirst_cache::http::{Request, Response};
//!
//! # tokio_test::block_on(async {
//! let storage = MemoryStorage::new();
//! let req = Request::get("https://app.test/index.html").unwrap();
//! storage.put("gym-tracker-v1", &req, Response::new(200, "<html>")).await.unwrap();
//! assert!(storage.match_request("gym-tracker-v1", &req).await.unwrap().is_some());
//! # });
//! ```

mod backend;
mod disk;
mod key;

pub use backend::{CacheStorage, MemoryStorage};
pub use disk::DiskStorage;
pub use key::RequestKey;

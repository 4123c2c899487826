//! Cache key derivation.

use sha2::{Digest, Sha256};

use crate::http::Request;

/// Identity of a stored entry: the request URL with any fragment removed.
///
/// Two requests that differ only by fragment map to the same entry, and a
/// second write for the same key overwrites the first.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RequestKey(String);

impl RequestKey {
    pub fn from_request(request: &Request) -> Self {
        let mut url = request.url().clone();
        url.set_fragment(None);
        Self(url.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Hex sha256 of the key, usable as a file name.
    pub fn digest(&self) -> String {
        hex_digest(&self.0)
    }
}

impl std::fmt::Display for RequestKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

pub(crate) fn hex_digest(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    hasher
        .finalize()
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}

//! Agent configuration: the bucket name and the install-time manifest.
//!
//! The configuration is an explicit value handed to the interceptor at
//! construction, so independent agents (and tests) can run side by side with
//! different versions.

use serde::{Deserialize, Serialize};
use std::path::Path;
use url::Url;

use crate::{Error, ErrorContext, Result};

pub const DEFAULT_CACHE_NAME: &str = "gym-tracker-v1";
pub const DEFAULT_MANIFEST: [&str; 3] = ["/", "/index.html", "/manifest.json"];
pub const DEFAULT_ORIGIN: &str = "http://localhost/";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Version-tagged bucket name. Changing it invalidates every older bucket
    /// on the next activation.
    pub cache_name: String,
    /// Ordered locators written into the bucket at install time.
    pub manifest: Vec<String>,
    /// Origin that relative manifest locators resolve against.
    pub origin: Url,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            cache_name: DEFAULT_CACHE_NAME.to_string(),
            manifest: DEFAULT_MANIFEST.iter().map(|s| s.to_string()).collect(),
            origin: default_origin(),
        }
    }
}

fn default_origin() -> Url {
    Url::parse(DEFAULT_ORIGIN).expect("DEFAULT_ORIGIN must parse (this should never happen)")
}

impl AgentConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cache_name(mut self, name: impl Into<String>) -> Self {
        self.cache_name = name.into();
        self
    }

    pub fn with_manifest<I, S>(mut self, locators: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.manifest = locators.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_origin(mut self, origin: Url) -> Self {
        self.origin = origin;
        self
    }

    /// Load from a YAML (`.yaml`/`.yml`) or JSON file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let is_yaml = path
            .extension()
            .map(|ext| ext == "yaml" || ext == "yml")
            .unwrap_or(false);
        let config: Self = if is_yaml {
            serde_yaml::from_str(&content)?
        } else {
            serde_json::from_str(&content)?
        };
        config.validate()?;
        Ok(config)
    }

    /// Apply `NETFIRST_CACHE_NAME` and `NETFIRST_ORIGIN` when set.
    pub fn with_env_overrides(mut self) -> Result<Self> {
        if let Ok(name) = std::env::var("NETFIRST_CACHE_NAME") {
            self.cache_name = name;
        }
        if let Ok(origin) = std::env::var("NETFIRST_ORIGIN") {
            self.origin = Url::parse(&origin)?;
        }
        self.validate()?;
        Ok(self)
    }

    /// Resolve a manifest locator against the origin.
    pub fn resolve(&self, locator: &str) -> Result<Url> {
        Ok(self.origin.join(locator)?)
    }

    pub fn validate(&self) -> Result<()> {
        if self.cache_name.trim().is_empty() {
            return Err(Error::configuration_with_context(
                "cache name must not be empty",
                ErrorContext::new().with_field_path("cache_name"),
            ));
        }
        if !matches!(self.origin.scheme(), "http" | "https") {
            return Err(Error::configuration_with_context(
                "origin must be an http or https URL",
                ErrorContext::new()
                    .with_field_path("origin")
                    .with_details(self.origin.as_str()),
            ));
        }
        for (i, locator) in self.manifest.iter().enumerate() {
            self.resolve(locator).map_err(|_| {
                Error::configuration_with_context(
                    "manifest locator does not resolve",
                    ErrorContext::new()
                        .with_field_path(format!("manifest[{}]", i))
                        .with_details(locator.as_str()),
                )
            })?;
        }
        Ok(())
    }
}

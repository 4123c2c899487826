//! The hosting environment the agent runs inside.
//!
//! A browser supplies these primitives natively; [`ClientRegistry`] is the
//! in-process stand-in used by the CLI and by tests.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

use crate::{Error, ErrorContext, Result};

/// Primitives the host exposes to the agent.
#[async_trait]
pub trait Host: Send + Sync {
    /// Signal that the freshly installed version may take over without
    /// waiting for existing clients to close.
    async fn skip_waiting(&self) -> Result<()>;

    /// Put every already-open client session under the control of `version`.
    async fn claim_clients(&self, version: &str) -> Result<()>;
}

#[derive(Debug, Default)]
struct RegistryState {
    clients: BTreeMap<Uuid, Option<String>>,
    skip_waiting: bool,
}

/// Tracks client sessions and which cache version controls each one.
#[derive(Debug, Default)]
pub struct ClientRegistry {
    state: Mutex<RegistryState>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, RegistryState>> {
        self.state.lock().map_err(|_| {
            Error::configuration_with_context(
                "ClientRegistry poisoned",
                ErrorContext::new().with_source("client_registry"),
            )
        })
    }

    /// Register a new, uncontrolled client session.
    pub fn open_client(&self) -> Result<Uuid> {
        let id = Uuid::new_v4();
        self.lock()?.clients.insert(id, None);
        Ok(id)
    }

    pub fn close_client(&self, id: Uuid) -> Result<bool> {
        Ok(self.lock()?.clients.remove(&id).is_some())
    }

    /// The version controlling a client, if any.
    pub fn controller(&self, id: Uuid) -> Result<Option<String>> {
        Ok(self.lock()?.clients.get(&id).cloned().flatten())
    }

    pub fn client_count(&self) -> Result<usize> {
        Ok(self.lock()?.clients.len())
    }

    pub fn skipped_waiting(&self) -> Result<bool> {
        Ok(self.lock()?.skip_waiting)
    }
}

#[async_trait]
impl Host for ClientRegistry {
    async fn skip_waiting(&self) -> Result<()> {
        self.lock()?.skip_waiting = true;
        Ok(())
    }

    async fn claim_clients(&self, version: &str) -> Result<()> {
        let mut state = self.lock()?;
        for controller in state.clients.values_mut() {
            *controller = Some(version.to_string());
        }
        Ok(())
    }
}

//! Provider registry
//!
//! Holds the providers configured at startup, addressable by identifier.
//! One registry is shared read-only across every session's agent.

use std::sync::Arc;

use providers::{ModelProvider, ProviderKind};
use serde::Serialize;
use tracing::debug;

/// Registered providers, addressable by identifier
#[derive(Default, Clone)]
pub struct ProviderRegistry {
    providers: Vec<Arc<dyn ModelProvider>>,
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("ids", &self.ids())
            .finish()
    }
}

impl ProviderRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a provider. A provider already registered under the same
    /// identifier is replaced.
    pub fn register(&mut self, provider: Arc<dyn ModelProvider>) {
        debug!(id = %provider.id(), kind = %provider.kind(), "Registering provider");
        self.providers.retain(|p| p.id() != provider.id());
        self.providers.push(provider);
    }

    /// Register a provider, builder style
    #[must_use]
    pub fn with(mut self, provider: Arc<dyn ModelProvider>) -> Self {
        self.register(provider);
        self
    }

    /// Look up a provider by identifier
    pub fn get(&self, id: &str) -> Option<Arc<dyn ModelProvider>> {
        self.providers.iter().find(|p| p.id() == id).cloned()
    }

    /// Whether an identifier is registered
    pub fn contains(&self, id: &str) -> bool {
        self.providers.iter().any(|p| p.id() == id)
    }

    /// Registered identifiers, in registration order
    pub fn ids(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.id()).collect()
    }

    /// Number of registered providers
    pub fn len(&self) -> usize {
        self.providers.len()
    }

    /// Whether the registry is empty
    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// Probe every provider and report its availability
    pub async fn availability(&self) -> Vec<ProviderStatus> {
        let mut statuses = Vec::with_capacity(self.providers.len());
        for provider in &self.providers {
            statuses.push(ProviderStatus {
                id: provider.id().to_string(),
                kind: provider.kind(),
                available: provider.is_available().await,
            });
        }
        statuses
    }
}

/// Availability report for one registered provider
#[derive(Debug, Clone, Serialize)]
pub struct ProviderStatus {
    /// Registered identifier
    pub id: String,
    /// Backend kind
    pub kind: ProviderKind,
    /// Result of the availability pre-check
    pub available: bool,
}

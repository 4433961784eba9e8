//! Client registry: lookup of registered OAuth 2.0 clients.

use std::collections::HashMap;

use crate::types::Client;

/// Lookup of registered clients by id.
///
/// Pure lookup with no I/O after bootstrap; implementations must be safe to
/// query from many concurrent requests.
pub trait ClientRegistry: Send + Sync {
    /// Returns the client registered under `id`, if any.
    fn get(&self, id: &str) -> Option<Client>;
}

/// A fixed registry built at bootstrap, typically from configuration.
#[derive(Debug, Default)]
pub struct StaticClientRegistry {
    clients: HashMap<String, Client>,
}

impl StaticClientRegistry {
    /// Builds a registry from the given clients, keyed by their id.
    #[must_use]
    pub fn new(clients: impl IntoIterator<Item = Client>) -> Self {
        Self {
            clients: clients.into_iter().map(|c| (c.id.clone(), c)).collect(),
        }
    }
}

impl ClientRegistry for StaticClientRegistry {
    fn get(&self, id: &str) -> Option<Client> {
        self.clients.get(id).cloned()
    }
}

/// The default registry: knows no clients.
#[derive(Debug, Default)]
pub struct EmptyClientRegistry;

impl ClientRegistry for EmptyClientRegistry {
    fn get(&self, _id: &str) -> Option<Client> {
        None
    }
}

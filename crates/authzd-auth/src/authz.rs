//! Scope validation and per-user authorization.

use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use async_trait::async_trait;

use crate::error::AuthError;
use crate::types::User;

/// A set of scopes.
pub trait ScopeSet: Send + Sync {
    /// Returns `true` iff every given scope is a member of this set.
    fn valid_scope(&self, scopes: &[&str]) -> bool;
}

/// An authorization provider: the provider-wide valid scope set plus the
/// mapping from a user to the scopes that user is granted.
///
/// Providers may refresh their tables asynchronously; reads concurrent with
/// a refresh must observe a consistent snapshot.
#[async_trait]
pub trait Authz: ScopeSet {
    /// Returns the set of scopes the given user is authorized for.
    ///
    /// # Errors
    ///
    /// Returns an error when the lookup fails; the engine reports this as an
    /// internal failure, never as a reduced grant.
    async fn scope_set_for(&self, user: &User) -> Result<Box<dyn ScopeSet>, AuthError>;
}

/// The default provider: no valid scopes, no grants.
#[derive(Debug, Default)]
pub struct EmptyScopeSet;

impl ScopeSet for EmptyScopeSet {
    fn valid_scope(&self, _scopes: &[&str]) -> bool {
        false
    }
}

#[async_trait]
impl Authz for EmptyScopeSet {
    async fn scope_set_for(&self, _user: &User) -> Result<Box<dyn ScopeSet>, AuthError> {
        Ok(Box::new(EmptyScopeSet))
    }
}

struct AuthzTables {
    scopes: HashSet<String>,
    grants: HashMap<String, HashSet<String>>,
}

/// A table-driven provider with a provider-wide scope set and per-user
/// grants, typically loaded from configuration.
///
/// Tables sit behind a read/write lock: `replace` swaps in a full snapshot
/// while concurrent request handlers keep reading a consistent one.
pub struct StaticAuthz {
    tables: RwLock<AuthzTables>,
}

impl StaticAuthz {
    /// Builds a provider from the valid scope set and the per-user grant
    /// table.
    #[must_use]
    pub fn new(
        scopes: impl IntoIterator<Item = String>,
        grants: impl IntoIterator<Item = (String, Vec<String>)>,
    ) -> Self {
        Self {
            tables: RwLock::new(Self::tables(scopes, grants)),
        }
    }

    /// Replaces both tables in one step.
    pub fn replace(
        &self,
        scopes: impl IntoIterator<Item = String>,
        grants: impl IntoIterator<Item = (String, Vec<String>)>,
    ) {
        if let Ok(mut tables) = self.tables.write() {
            *tables = Self::tables(scopes, grants);
        }
    }

    fn tables(
        scopes: impl IntoIterator<Item = String>,
        grants: impl IntoIterator<Item = (String, Vec<String>)>,
    ) -> AuthzTables {
        AuthzTables {
            scopes: scopes.into_iter().collect(),
            grants: grants
                .into_iter()
                .map(|(uid, scopes)| (uid, scopes.into_iter().collect()))
                .collect(),
        }
    }
}

impl ScopeSet for StaticAuthz {
    fn valid_scope(&self, scopes: &[&str]) -> bool {
        match self.tables.read() {
            Ok(tables) => scopes.iter().all(|s| tables.scopes.contains(*s)),
            Err(_) => false,
        }
    }
}

#[async_trait]
impl Authz for StaticAuthz {
    async fn scope_set_for(&self, user: &User) -> Result<Box<dyn ScopeSet>, AuthError> {
        let tables = self
            .tables
            .read()
            .map_err(|_| AuthError::authorization("authorization tables poisoned"))?;
        let granted = tables.grants.get(&user.uid).cloned().unwrap_or_default();
        Ok(Box::new(GrantedScopes(granted)))
    }
}

/// The snapshot of one user's granted scopes.
struct GrantedScopes(HashSet<String>);

impl ScopeSet for GrantedScopes {
    fn valid_scope(&self, scopes: &[&str]) -> bool {
        scopes.iter().all(|s| self.0.contains(*s))
    }
}

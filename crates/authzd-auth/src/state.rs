//! Transient state storage for the IDP round-trip.
//!
//! An authorization request is persisted under its reference token while the
//! user agent visits the identity provider, and consumed exactly once when
//! the callback arrives. The backend contract is [`StateKeeper`]; the
//! in-process [`MemoryStateKeeper`] is the default, and external key/value
//! services plug in through the same trait. A backend must remove an entry
//! in the same atomic step that reads it, so a replayed callback can never
//! restore the same state twice; the Redis equivalent is a `MULTI`/`EXEC`
//! of `GET` and `DEL`.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use time::OffsetDateTime;

use crate::error::AuthError;

/// A storage engine for transient state data.
///
/// Keys are caller-provided and assumed fresh (they carry 128 bits of
/// entropy). Values are opaque encoded bytes.
#[async_trait]
pub trait StateKeeper: Send + Sync {
    /// Stores `value` under `key` for at most `lifetime`.
    async fn persist(&self, key: &str, value: Vec<u8>, lifetime: Duration) -> Result<(), AuthError>;

    /// Looks up and simultaneously removes the entry under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::NotFound`] if the key is absent, expired, or was
    /// already restored once.
    async fn restore(&self, key: &str) -> Result<Vec<u8>, AuthError>;
}

struct StoredEntry {
    value: Vec<u8>,
    deadline: OffsetDateTime,
}

/// The default in-process [`StateKeeper`].
///
/// A single mutex covers the whole read-then-delete composite, which makes
/// the single-consumption guarantee hold across concurrent callbacks.
#[derive(Default)]
pub struct MemoryStateKeeper {
    entries: Mutex<HashMap<String, StoredEntry>>,
}

impl MemoryStateKeeper {
    /// Creates an empty in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StateKeeper for MemoryStateKeeper {
    async fn persist(&self, key: &str, value: Vec<u8>, lifetime: Duration) -> Result<(), AuthError> {
        let deadline = OffsetDateTime::now_utc() + lifetime;
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| AuthError::storage("state map poisoned"))?;
        entries.insert(key.to_string(), StoredEntry { value, deadline });
        Ok(())
    }

    async fn restore(&self, key: &str) -> Result<Vec<u8>, AuthError> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| AuthError::storage("state map poisoned"))?;
        let entry = entries.remove(key).ok_or(AuthError::NotFound)?;
        // The deadline itself already counts as expired.
        if OffsetDateTime::now_utc() >= entry.deadline {
            return Err(AuthError::NotFound);
        }
        Ok(entry.value)
    }
}

/// Typed layer over a [`StateKeeper`]: applies the binary codec and the
/// configured maximum lifetime.
pub struct StateStore {
    engine: Box<dyn StateKeeper>,
    max_lifetime: Duration,
}

impl StateStore {
    /// Creates a store over the given backend and lifetime.
    #[must_use]
    pub fn new(engine: Box<dyn StateKeeper>, max_lifetime: Duration) -> Self {
        Self { engine, max_lifetime }
    }

    /// The lifetime applied to every persisted entry.
    #[must_use]
    pub fn max_lifetime(&self) -> Duration {
        self.max_lifetime
    }

    /// Serializes `value` and stores it under `key`.
    ///
    /// The encoding is MessagePack with field names, so the consumer can
    /// reconstruct the concrete type without out-of-band schema knowledge.
    pub async fn persist<T: Serialize>(&self, key: &str, value: &T) -> Result<(), AuthError> {
        let encoded = rmp_serde::to_vec_named(value).map_err(|e| AuthError::codec(e.to_string()))?;
        self.engine.persist(key, encoded, self.max_lifetime).await
    }

    /// Restores and decodes the entry under `key`, consuming it.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::NotFound`] for absent, expired, or already
    /// consumed entries, and [`AuthError::Codec`] if the stored bytes do not
    /// decode into `T`.
    pub async fn restore<T: DeserializeOwned>(&self, key: &str) -> Result<T, AuthError> {
        let encoded = self.engine.restore(key).await?;
        rmp_serde::from_slice(&encoded).map_err(|e| AuthError::codec(e.to_string()))
    }

    /// Verifies that the backend honors the single-consumption contract:
    /// a persisted probe must restore exactly once.
    pub async fn self_check(&self) -> Result<(), AuthError> {
        let probe = "authzd-state-probe";
        self.persist(probe, &String::from("probe")).await?;
        let _: String = self.restore(probe).await?;
        match self.restore::<String>(probe).await {
            Err(AuthError::NotFound) => Ok(()),
            Ok(_) => Err(AuthError::storage(
                "state backend does not remove entries on restore",
            )),
            Err(other) => Err(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AuthorizationState;

    fn store(lifetime: Duration) -> StateStore {
        StateStore::new(Box::new(MemoryStateKeeper::new()), lifetime)
    }

    fn sample_state() -> AuthorizationState {
        AuthorizationState {
            client_id: "testclient1".to_string(),
            redirect_uri: "http://testclient/".to_string(),
            response_type: "token".to_string(),
            scope: vec!["scope:1".to_string(), "scope:2".to_string()],
            state: Some("csrf-token".to_string()),
            idp_id: "testidp".to_string(),
        }
    }

    #[tokio::test]
    async fn roundtrip_preserves_state() {
        let store = store(Duration::from_secs(60));
        let state = sample_state();
        store.persist("key", &state).await.unwrap();
        let restored: AuthorizationState = store.restore("key").await.unwrap();
        assert_eq!(restored, state);
    }

    #[tokio::test]
    async fn codec_roundtrip_without_optional_state() {
        let store = store(Duration::from_secs(60));
        let state = AuthorizationState {
            state: None,
            scope: vec![],
            ..sample_state()
        };
        store.persist("key", &state).await.unwrap();
        let restored: AuthorizationState = store.restore("key").await.unwrap();
        assert_eq!(restored, state);
    }

    #[tokio::test]
    async fn restore_consumes_the_entry() {
        let store = store(Duration::from_secs(60));
        store.persist("key", &sample_state()).await.unwrap();
        let _: AuthorizationState = store.restore("key").await.unwrap();
        assert!(matches!(
            store.restore::<AuthorizationState>("key").await,
            Err(AuthError::NotFound)
        ));
    }

    #[tokio::test]
    async fn restore_of_unknown_key_fails() {
        let store = store(Duration::from_secs(60));
        assert!(matches!(
            store.restore::<AuthorizationState>("never-persisted").await,
            Err(AuthError::NotFound)
        ));
    }

    #[tokio::test]
    async fn restore_after_lifetime_fails() {
        let store = store(Duration::from_millis(20));
        store.persist("key", &sample_state()).await.unwrap();
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(matches!(
            store.restore::<AuthorizationState>("key").await,
            Err(AuthError::NotFound)
        ));
    }

    #[tokio::test]
    async fn expired_entry_is_gone_even_within_a_fresh_write() {
        let store = store(Duration::from_millis(20));
        store.persist("key", &sample_state()).await.unwrap();
        tokio::time::sleep(Duration::from_millis(40)).await;
        // Expired, so the first restore fails and must also have consumed
        // nothing that a later persist would collide with.
        assert!(store.restore::<AuthorizationState>("key").await.is_err());
        store.persist("key", &sample_state()).await.unwrap();
        assert!(store.restore::<AuthorizationState>("key").await.is_ok());
    }

    #[tokio::test]
    async fn self_check_passes_on_memory_backend() {
        let store = store(Duration::from_secs(60));
        store.self_check().await.unwrap();
    }

    #[tokio::test]
    async fn self_check_rejects_non_consuming_backend() {
        /// A broken backend that leaves entries in place on restore.
        struct Sticky(Mutex<HashMap<String, Vec<u8>>>);

        #[async_trait]
        impl StateKeeper for Sticky {
            async fn persist(
                &self,
                key: &str,
                value: Vec<u8>,
                _lifetime: Duration,
            ) -> Result<(), AuthError> {
                self.0.lock().unwrap().insert(key.to_string(), value);
                Ok(())
            }

            async fn restore(&self, key: &str) -> Result<Vec<u8>, AuthError> {
                self.0
                    .lock()
                    .unwrap()
                    .get(key)
                    .cloned()
                    .ok_or(AuthError::NotFound)
            }
        }

        let store = StateStore::new(
            Box::new(Sticky(Mutex::new(HashMap::new()))),
            Duration::from_secs(60),
        );
        assert!(matches!(
            store.self_check().await,
            Err(AuthError::Storage { .. })
        ));
    }
}

//! Token snapshot storage
//!
//! The store is the single owner of the mutable token state. Callers only
//! ever see whole snapshots: `read` clones the current `TokenSet` under a
//! shared lock and `write` replaces it under the exclusive lock. No lock
//! guard escapes the store, so none can be held across an `.await`.

use parking_lot::RwLock;

use super::types::TokenSet;

/// Snapshot-in, snapshot-out access to the current tokens
pub trait TokenStoreTrait: Send + Sync {
    /// Clone of the current snapshot
    fn read(&self) -> TokenSet;

    /// Replace the current snapshot wholesale
    fn write(&self, tokens: TokenSet);
}

/// In-memory store guarded by a readers-writer lock
///
/// Tokens live for the lifetime of the process; persistence across
/// restarts is left to whoever exports them via `read`.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    tokens: RwLock<TokenSet>,
}

impl MemoryTokenStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-populated with `tokens`
    #[must_use]
    pub fn with_tokens(tokens: TokenSet) -> Self {
        Self { tokens: RwLock::new(tokens) }
    }
}

impl TokenStoreTrait for MemoryTokenStore {
    fn read(&self) -> TokenSet {
        self.tokens.read().clone()
    }

    fn write(&self, tokens: TokenSet) {
        *self.tokens.write() = tokens;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[test]
    fn starts_empty() {
        let store = MemoryTokenStore::new();
        assert!(store.read().is_empty());
    }

    #[test]
    fn write_replaces_snapshot() {
        let store = MemoryTokenStore::with_tokens(TokenSet::new("first".into(), None, 60));
        store.write(
            TokenSet::new("second".into(), Some("refresh".into()), 60)
                .with_tenant(Some("t-1".into()), None),
        );

        let snapshot = store.read();
        assert_eq!(snapshot.access_token, "second");
        assert_eq!(snapshot.refresh_token.as_deref(), Some("refresh"));
        assert_eq!(snapshot.tenant_id.as_deref(), Some("t-1"));
    }

    #[test]
    fn snapshots_are_detached_from_store() {
        let store = MemoryTokenStore::with_tokens(TokenSet::new("first".into(), None, 60));
        let mut snapshot = store.read();
        snapshot.access_token = "mutated".into();
        assert_eq!(store.read().access_token, "first");
    }

    #[test]
    fn concurrent_readers_and_writer() {
        let store = Arc::new(MemoryTokenStore::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    if i % 2 == 0 {
                        store.write(TokenSet::new(format!("token-{i}"), None, 60));
                    }
                    store.read()
                })
            })
            .collect();

        for handle in handles {
            let snapshot = handle.join().unwrap();
            assert!(snapshot.is_empty() || snapshot.access_token.starts_with("token-"));
        }
        assert!(store.read().access_token.starts_with("token-"));
    }
}

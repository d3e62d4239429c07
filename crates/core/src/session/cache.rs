use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, warn};

use crate::session::state::DialogState;

#[derive(Debug, Error)]
pub enum SessionStoreError {
    #[error("session store unavailable: {0}")]
    Unavailable(String),
    #[error("session store write failed: {0}")]
    Write(String),
}

/// Key/value storage for serialized dialog snapshots.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn load(&self, key: &str) -> Result<Option<String>, SessionStoreError>;
    async fn save(&self, key: &str, payload: &str) -> Result<(), SessionStoreError>;
    async fn clear(&self, key: &str) -> Result<(), SessionStoreError>;
}

/// A persisted conversation the visitor may pick back up.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecoveryOffer {
    pub state: DialogState,
}

impl RecoveryOffer {
    pub fn message_count(&self) -> usize {
        self.state.messages().len()
    }
}

/// Snapshot persistence for one session key. Storage failures are logged and
/// swallowed; a broken cache never blocks the conversation.
#[derive(Clone)]
pub struct SessionCache {
    store: Arc<dyn SessionStore>,
    key: String,
}

impl SessionCache {
    pub fn new(store: Arc<dyn SessionStore>, key: impl Into<String>) -> Self {
        Self { store, key: key.into() }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Writes the snapshot, or clears it once the conversation is complete.
    pub async fn persist(&self, state: &DialogState) {
        if state.path().is_terminal() {
            self.discard().await;
            return;
        }
        self.save(state).await;
    }

    /// Writes the snapshot whatever its path, so a completed conversation can
    /// still be restarted or switched to another language.
    pub async fn save(&self, state: &DialogState) {
        let payload = match serde_json::to_string(state) {
            Ok(payload) => payload,
            Err(error) => {
                warn!(
                    event_name = "session.cache.serialize_failed",
                    key = %self.key,
                    error = %error,
                    "could not serialize dialog snapshot"
                );
                return;
            }
        };

        if let Err(error) = self.store.save(&self.key, &payload).await {
            warn!(
                event_name = "session.cache.write_failed",
                key = %self.key,
                error = %error,
                "could not persist dialog snapshot"
            );
        }
    }

    /// An unfinished saved conversation the visitor may pick back up.
    pub async fn offer(&self) -> Option<RecoveryOffer> {
        self.load()
            .await
            .filter(|state| !state.messages().is_empty() && !state.path().is_terminal())
            .map(|state| RecoveryOffer { state })
    }

    /// The saved snapshot, if one exists and parses. Malformed payloads are
    /// cleared and treated as absent.
    pub async fn load(&self) -> Option<DialogState> {
        let payload = match self.store.load(&self.key).await {
            Ok(Some(payload)) => payload,
            Ok(None) => return None,
            Err(error) => {
                warn!(
                    event_name = "session.cache.read_failed",
                    key = %self.key,
                    error = %error,
                    "could not read dialog snapshot"
                );
                return None;
            }
        };

        match serde_json::from_str::<DialogState>(&payload) {
            Ok(state) => Some(state),
            Err(error) => {
                warn!(
                    event_name = "session.cache.malformed",
                    key = %self.key,
                    error = %error,
                    "discarding malformed dialog snapshot"
                );
                self.discard().await;
                None
            }
        }
    }

    /// Accepting restores the snapshot exactly as saved.
    pub fn accept(&self, offer: RecoveryOffer) -> DialogState {
        debug!(event_name = "session.cache.resumed", key = %self.key, "resuming saved dialog");
        offer.state.resumed()
    }

    /// Declining removes the snapshot for good.
    pub async fn decline(&self) {
        debug!(event_name = "session.cache.declined", key = %self.key, "discarding saved dialog");
        self.discard().await;
    }

    async fn discard(&self) {
        if let Err(error) = self.store.clear(&self.key).await {
            warn!(
                event_name = "session.cache.clear_failed",
                key = %self.key,
                error = %error,
                "could not clear dialog snapshot"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use chrono::Utc;

    use super::{SessionCache, SessionStore, SessionStoreError};
    use crate::flows::engine::greeting;
    use crate::flows::states::{ChatPath, TransitionOutcome};
    use crate::i18n::Language;
    use crate::session::state::DialogState;
    use crate::session::test_support::MapStore;

    struct BrokenStore;

    #[async_trait]
    impl SessionStore for BrokenStore {
        async fn load(&self, _key: &str) -> Result<Option<String>, SessionStoreError> {
            Err(SessionStoreError::Unavailable("disk full".into()))
        }

        async fn save(&self, _key: &str, _payload: &str) -> Result<(), SessionStoreError> {
            Err(SessionStoreError::Write("quota exceeded".into()))
        }

        async fn clear(&self, _key: &str) -> Result<(), SessionStoreError> {
            Err(SessionStoreError::Write("quota exceeded".into()))
        }
    }

    fn greeted() -> DialogState {
        let mut state = DialogState::new(Language::En);
        let outcome = TransitionOutcome {
            replies: vec![greeting(Language::En)],
            ..TransitionOutcome::unchanged(ChatPath::Initial)
        };
        state.apply_and_deliver(&outcome, Utc::now());
        state
    }

    #[tokio::test]
    async fn accept_restores_the_persisted_snapshot() {
        let store = Arc::new(MapStore::default());
        let cache = SessionCache::new(store.clone(), "chat");
        let state = greeted();
        cache.persist(&state).await;

        let offer = cache.offer().await.expect("offer");
        assert_eq!(offer.message_count(), 1);
        let restored = cache.accept(offer);
        assert_eq!(restored, state);
        assert_eq!(
            serde_json::to_string(&restored).expect("serialize"),
            store.load("chat").await.expect("load").expect("payload")
        );
    }

    #[tokio::test]
    async fn decline_leaves_no_trace() {
        let store = Arc::new(MapStore::default());
        let cache = SessionCache::new(store.clone(), "chat");
        cache.persist(&greeted()).await;

        cache.decline().await;
        assert!(store.load("chat").await.expect("load").is_none());
        assert!(cache.offer().await.is_none());
    }

    #[tokio::test]
    async fn malformed_payload_is_cleared_and_ignored() {
        let store = Arc::new(MapStore::default());
        store.save("chat", "{not json").await.expect("save");
        let cache = SessionCache::new(store.clone(), "chat");

        assert!(cache.offer().await.is_none());
        assert!(store.load("chat").await.expect("load").is_none());
    }

    #[tokio::test]
    async fn saved_complete_snapshot_loads_but_is_not_offered() {
        let store = Arc::new(MapStore::default());
        let cache = SessionCache::new(store.clone(), "chat");
        let mut state = greeted();
        let done =
            TransitionOutcome { to: ChatPath::Complete, ..TransitionOutcome::unchanged(ChatPath::Initial) };
        state.apply(&done, Utc::now());
        assert_eq!(state.path(), ChatPath::Complete);

        cache.save(&state).await;
        assert!(cache.offer().await.is_none());
        assert_eq!(cache.load().await.expect("retained").path(), ChatPath::Complete);

        cache.persist(&state).await;
        assert!(store.load("chat").await.expect("load").is_none());
    }

    #[tokio::test]
    async fn storage_failures_are_swallowed() {
        let cache = SessionCache::new(Arc::new(BrokenStore), "chat");
        cache.persist(&greeted()).await;
        assert!(cache.offer().await.is_none());
        cache.decline().await;
    }
}

use std::collections::HashMap;

use tokio::sync::RwLock;

use leadline_core::session::{SessionStore, SessionStoreError};

/// Process-local snapshot storage for tests and single-run CLI sessions.
#[derive(Default)]
pub struct InMemorySessionStore {
    snapshots: RwLock<HashMap<String, String>>,
}

impl InMemorySessionStore {
    pub async fn len(&self) -> usize {
        self.snapshots.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.snapshots.read().await.is_empty()
    }
}

#[async_trait::async_trait]
impl SessionStore for InMemorySessionStore {
    async fn load(&self, key: &str) -> Result<Option<String>, SessionStoreError> {
        let snapshots = self.snapshots.read().await;
        Ok(snapshots.get(key).cloned())
    }

    async fn save(&self, key: &str, payload: &str) -> Result<(), SessionStoreError> {
        let mut snapshots = self.snapshots.write().await;
        snapshots.insert(key.to_string(), payload.to_string());
        Ok(())
    }

    async fn clear(&self, key: &str) -> Result<(), SessionStoreError> {
        let mut snapshots = self.snapshots.write().await;
        snapshots.remove(key);
        Ok(())
    }
}

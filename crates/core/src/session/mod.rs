pub mod cache;
pub mod runtime;
pub mod state;

pub use cache::{RecoveryOffer, SessionCache, SessionStore, SessionStoreError};
pub use runtime::{
    DialogRuntime, FixedTypingDelay, RandomTypingDelay, RuntimeEvent, RuntimeOptions, TypingDelay,
};
pub use state::{DialogState, EstimateData};

#[cfg(test)]
pub(crate) mod test_support {
    use std::collections::HashMap;

    use async_trait::async_trait;
    use tokio::sync::RwLock;

    use super::{SessionStore, SessionStoreError};

    #[derive(Default)]
    pub(crate) struct MapStore {
        entries: RwLock<HashMap<String, String>>,
    }

    #[async_trait]
    impl SessionStore for MapStore {
        async fn load(&self, key: &str) -> Result<Option<String>, SessionStoreError> {
            Ok(self.entries.read().await.get(key).cloned())
        }

        async fn save(&self, key: &str, payload: &str) -> Result<(), SessionStoreError> {
            self.entries.write().await.insert(key.to_string(), payload.to_string());
            Ok(())
        }

        async fn clear(&self, key: &str) -> Result<(), SessionStoreError> {
            self.entries.write().await.remove(key);
            Ok(())
        }
    }
}

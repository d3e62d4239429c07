use std::sync::Arc;

use chrono::Utc;
use tempfile::TempDir;

use leadline_core::flows::{greeting, ChatPath, TransitionOutcome};
use leadline_core::session::{DialogState, SessionCache, SessionStore};
use leadline_core::Language;
use leadline_db::{connect_with_settings, migrations, SqlSessionStore};

async fn file_store(dir: &TempDir) -> SqlSessionStore {
    let url = format!("sqlite://{}", dir.path().join("leadline.db").display());
    let pool = connect_with_settings(&url, 2, 5).await.expect("connect");
    migrations::run_pending(&pool).await.expect("migrate");
    SqlSessionStore::new(pool)
}

fn greeted(language: Language) -> DialogState {
    let mut state = DialogState::new(language);
    let outcome = TransitionOutcome {
        replies: vec![greeting(language)],
        ..TransitionOutcome::unchanged(ChatPath::Initial)
    };
    state.apply_and_deliver(&outcome, Utc::now());
    state
}

#[tokio::test]
async fn snapshot_survives_a_new_connection() {
    let dir = TempDir::new().expect("temp dir");
    let state = greeted(Language::Es);

    {
        let cache = SessionCache::new(Arc::new(file_store(&dir).await), "leadline-chat-session");
        cache.persist(&state).await;
    }

    let cache = SessionCache::new(Arc::new(file_store(&dir).await), "leadline-chat-session");
    let offer = cache.offer().await.expect("offer after reconnect");
    assert_eq!(cache.accept(offer), state);
}

#[tokio::test]
async fn persisted_payload_uses_cache_field_names() {
    let dir = TempDir::new().expect("temp dir");
    let store = Arc::new(file_store(&dir).await);
    let cache = SessionCache::new(store.clone(), "leadline-chat-session");
    cache.persist(&greeted(Language::En)).await;

    let payload = store.load("leadline-chat-session").await.expect("load").expect("payload");
    let json: serde_json::Value = serde_json::from_str(&payload).expect("json");
    for key in ["messages", "formData", "currentPath", "estimateData", "progress", "hasInteracted"] {
        assert!(json.get(key).is_some(), "missing {key}");
    }
}

#[tokio::test]
async fn malformed_row_is_discarded() {
    let dir = TempDir::new().expect("temp dir");
    let store = Arc::new(file_store(&dir).await);
    store.save("leadline-chat-session", "[1, 2").await.expect("save");

    let cache = SessionCache::new(store.clone(), "leadline-chat-session");
    assert!(cache.offer().await.is_none());
    assert_eq!(store.count().await.expect("count"), 0);
}

//! Session memory persisted across reloads.
//!
//! The session id, prompt history and fallback history are stored as JSON
//! strings in a [`KeyValueStore`]; histories are keyed by session id. Store
//! failures never interrupt the feed: reads fall back to empty state and
//! writes are logged and dropped.

use std::collections::VecDeque;
use std::sync::Arc;

use chrono::Utc;
use serde::de::DeserializeOwned;
use uuid::Uuid;

use crate::models::*;
use crate::ports::KeyValueStore;
use crate::selection::FallbackChoice;

pub const SESSION_ID_KEY: &str = "driftpad_session_id";

pub fn prompt_history_key(session_id: &str) -> String {
    format!("driftpad_prompt_history_{}", session_id)
}

pub fn fallback_history_key(session_id: &str) -> String {
    format!("driftpad_fallback_history_{}", session_id)
}

/// `session_{unix millis}_{9 random base-36-ish chars}`.
fn new_session_id() -> String {
    let suffix: String = Uuid::new_v4().simple().to_string().chars().take(9).collect();
    format!("session_{}_{}", Utc::now().timestamp_millis(), suffix)
}

pub struct SessionStore {
    store: Arc<dyn KeyValueStore>,
    state: SessionState,
}

impl SessionStore {
    /// Reuse the stored session id (or mint one) and load its histories.
    pub fn load(store: Arc<dyn KeyValueStore>) -> Self {
        let session_id = match store.get(SESSION_ID_KEY) {
            Ok(Some(id)) if !id.is_empty() => id,
            Ok(_) => {
                let id = new_session_id();
                if let Err(e) = store.set(SESSION_ID_KEY, &id) {
                    tracing::warn!(error = %e, "failed to persist session id");
                }
                tracing::info!(session_id = %id, "started new session");
                id
            }
            Err(e) => {
                tracing::warn!(error = %e, "session store unavailable, using ephemeral session");
                new_session_id()
            }
        };

        let mut state = SessionState::new(session_id.clone());
        let prompts: VecDeque<Uuid> =
            read_json(store.as_ref(), &prompt_history_key(&session_id)).unwrap_or_default();
        for id in prompts {
            state.remember_prompt(id);
        }
        let fallbacks: VecDeque<String> =
            read_json(store.as_ref(), &fallback_history_key(&session_id)).unwrap_or_default();
        for content in fallbacks {
            state.remember_fallback(content);
        }

        tracing::debug!(
            session_id = %state.session_id,
            prompt_history = state.prompt_history.len(),
            fallback_history = state.fallback_history.len(),
            "session loaded"
        );

        Self { store, state }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn session_id(&self) -> &str {
        &self.state.session_id
    }

    /// Record a repository prompt that was just displayed.
    pub fn record_prompt(&mut self, prompt: &PromptRecord) {
        self.state.last_prompt_id = Some(prompt.id);
        self.state.remember_category(prompt.category);
        if self.state.remember_prompt(prompt.id) {
            self.persist_prompt_history();
        }
    }

    /// Forget every served prompt id so the pool can be reused.
    pub fn clear_prompt_history(&mut self) {
        self.state.prompt_history.clear();
        let key = prompt_history_key(&self.state.session_id);
        if let Err(e) = self.store.remove(&key) {
            tracing::warn!(error = %e, "failed to clear prompt history");
        }
        tracing::info!("prompt history cleared");
    }

    /// Record a canned fallback prompt, starting a new cycle if needed.
    pub fn record_fallback(&mut self, choice: FallbackChoice) {
        if choice.resets_history {
            tracing::debug!("every fallback prompt used, starting a new cycle");
            self.state.fallback_history.clear();
        }
        self.state.remember_fallback(choice.content);

        let key = fallback_history_key(&self.state.session_id);
        write_json(self.store.as_ref(), &key, &self.state.fallback_history);
    }

    fn persist_prompt_history(&self) {
        let key = prompt_history_key(&self.state.session_id);
        write_json(self.store.as_ref(), &key, &self.state.prompt_history);
    }
}

fn read_json<T: DeserializeOwned>(store: &dyn KeyValueStore, key: &str) -> Option<T> {
    let raw = match store.get(key) {
        Ok(raw) => raw?,
        Err(e) => {
            tracing::warn!(key, error = %e, "failed to read session data");
            return None;
        }
    };

    match serde_json::from_str(&raw) {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!(key, error = %e, "discarding unreadable session data");
            None
        }
    }
}

fn write_json<T: serde::Serialize>(store: &dyn KeyValueStore, key: &str, value: &T) {
    let result = serde_json::to_string(value)
        .map_err(anyhow::Error::from)
        .and_then(|raw| store.set(key, &raw));
    if let Err(e) = result {
        tracing::warn!(key, error = %e, "failed to persist session data");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    struct MemoryStore(Mutex<HashMap<String, String>>);

    impl KeyValueStore for MemoryStore {
        fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
            Ok(self.0.lock().unwrap().get(key).cloned())
        }

        fn set(&self, key: &str, value: &str) -> anyhow::Result<()> {
            self.0
                .lock()
                .unwrap()
                .insert(key.to_string(), value.to_string());
            Ok(())
        }

        fn remove(&self, key: &str) -> anyhow::Result<()> {
            self.0.lock().unwrap().remove(key);
            Ok(())
        }
    }

    struct BrokenStore;

    impl KeyValueStore for BrokenStore {
        fn get(&self, _key: &str) -> anyhow::Result<Option<String>> {
            anyhow::bail!("storage disabled")
        }

        fn set(&self, _key: &str, _value: &str) -> anyhow::Result<()> {
            anyhow::bail!("storage disabled")
        }

        fn remove(&self, _key: &str) -> anyhow::Result<()> {
            anyhow::bail!("storage disabled")
        }
    }

    fn prompt(category: PromptCategory) -> PromptRecord {
        PromptRecord {
            id: Uuid::new_v4(),
            content: "draw the wind".to_string(),
            category,
            requires_shape: false,
            requires_gallery_image: false,
            location_id: None,
            weight: 1,
            active: true,
        }
    }

    #[test]
    fn session_id_has_expected_shape() {
        let id = new_session_id();
        let parts: Vec<&str> = id.split('_').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "session");
        assert!(parts[1].parse::<i64>().is_ok());
        assert_eq!(parts[2].len(), 9);
    }

    #[test]
    fn session_id_survives_reload() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::default());
        let first = SessionStore::load(store.clone());
        let second = SessionStore::load(store);
        assert_eq!(first.session_id(), second.session_id());
    }

    #[test]
    fn prompt_history_persists_but_categories_do_not() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::default());
        let mut session = SessionStore::load(store.clone());
        let served = prompt(PromptCategory::Subject);
        session.record_prompt(&served);

        assert_eq!(session.state().last_prompt_id, Some(served.id));
        assert_eq!(
            session.state().category_history,
            VecDeque::from([PromptCategory::Subject])
        );

        let reloaded = SessionStore::load(store);
        assert_eq!(reloaded.state().prompt_history, VecDeque::from([served.id]));
        assert!(reloaded.state().category_history.is_empty());
        assert_eq!(reloaded.state().last_prompt_id, None);
    }

    #[test]
    fn clearing_history_removes_stored_key() {
        let store = Arc::new(MemoryStore::default());
        let mut session = SessionStore::load(store.clone());
        session.record_prompt(&prompt(PromptCategory::Erase));
        session.clear_prompt_history();

        let key = prompt_history_key(session.session_id());
        assert!(store.get(&key).unwrap().is_none());
        assert!(session.state().prompt_history.is_empty());
    }

    #[test]
    fn fallback_reset_starts_new_cycle() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::default());
        let mut session = SessionStore::load(store.clone());
        session.record_fallback(FallbackChoice {
            content: "draw a cat",
            resets_history: false,
        });
        session.record_fallback(FallbackChoice {
            content: "draw a tree",
            resets_history: true,
        });

        let reloaded = SessionStore::load(store);
        assert_eq!(
            reloaded.state().fallback_history,
            VecDeque::from(["draw a tree".to_string()])
        );
    }

    #[test]
    fn corrupt_history_is_ignored() {
        let store = Arc::new(MemoryStore::default());
        store.set(SESSION_ID_KEY, "session_1_abcdefghi").unwrap();
        store
            .set(&prompt_history_key("session_1_abcdefghi"), "not json")
            .unwrap();

        let session = SessionStore::load(store);
        assert_eq!(session.session_id(), "session_1_abcdefghi");
        assert!(session.state().prompt_history.is_empty());
    }

    #[test]
    fn broken_store_yields_ephemeral_session() {
        let mut session = SessionStore::load(Arc::new(BrokenStore));
        assert!(session.session_id().starts_with("session_"));
        session.record_prompt(&prompt(PromptCategory::Generative));
        assert_eq!(session.state().prompt_history.len(), 1);
    }
}

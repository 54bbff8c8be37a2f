use std::fmt;
use std::sync::Arc;

use headcheck_core::model::SessionState;
use tracing::{debug, warn};

use crate::record::SessionRecord;
use crate::repository::{KeyValueBackend, StorageError};

const PROBE_KEY: &str = "headcheck::probe";

/// Result of a save request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    Stored,
    /// The backend failed its availability probe; nothing was written.
    Skipped,
}

/// Whole-session persistence under a single fixed key.
///
/// The backend is probed once with a write/remove round trip. If the probe
/// fails the store degrades for its whole lifetime: loads find nothing and
/// saves are skipped.
#[derive(Clone)]
pub struct ProgressStore {
    backend: Option<Arc<dyn KeyValueBackend>>,
    key: String,
}

impl ProgressStore {
    /// Probe `backend` and build a store writing under `key`.
    pub async fn open(backend: Arc<dyn KeyValueBackend>, key: impl Into<String>) -> Self {
        let key = key.into();
        match probe(backend.as_ref()).await {
            Ok(()) => Self {
                backend: Some(backend),
                key,
            },
            Err(err) => {
                warn!(error = %err, "progress storage unavailable");
                Self { backend: None, key }
            }
        }
    }

    /// A store that never persists anything.
    #[must_use]
    pub fn disabled(key: impl Into<String>) -> Self {
        Self {
            backend: None,
            key: key.into(),
        }
    }

    #[must_use]
    pub fn is_available(&self) -> bool {
        self.backend.is_some()
    }

    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Load the saved session, if any.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Serialization` if the saved blob cannot be decoded or
    /// no longer describes a valid session, and other errors if the backend fails.
    pub async fn load(&self) -> Result<Option<SessionState>, StorageError> {
        let Some(backend) = &self.backend else {
            return Ok(None);
        };
        let Some(raw) = backend.get_item(&self.key).await? else {
            return Ok(None);
        };
        let state = SessionRecord::from_json(&raw)?
            .into_state()
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        debug!(session_id = %state.session_id(), page = state.page(), "progress restored");
        Ok(Some(state))
    }

    /// Replace the saved session with `state`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if encoding or the backend write fails.
    pub async fn save(&self, state: &SessionState) -> Result<SaveOutcome, StorageError> {
        let Some(backend) = &self.backend else {
            return Ok(SaveOutcome::Skipped);
        };
        let raw = SessionRecord::from_state(state).to_json()?;
        backend.set_item(&self.key, &raw).await?;
        debug!(session_id = %state.session_id(), page = state.page(), "progress saved");
        Ok(SaveOutcome::Stored)
    }

    /// Forget the saved session.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend write fails.
    pub async fn clear(&self) -> Result<(), StorageError> {
        match &self.backend {
            Some(backend) => backend.remove_item(&self.key).await,
            None => Ok(()),
        }
    }
}

impl fmt::Debug for ProgressStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProgressStore")
            .field("key", &self.key)
            .field("available", &self.is_available())
            .finish()
    }
}

async fn probe(backend: &dyn KeyValueBackend) -> Result<(), StorageError> {
    backend.set_item(PROBE_KEY, PROBE_KEY).await?;
    backend.remove_item(PROBE_KEY).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::InMemoryBackend;
    use async_trait::async_trait;
    use headcheck_core::model::{Answer, Manifest};
    use headcheck_core::time::fixed_now;

    const RAW: &str = r#"{"stimuli": [
        {"id": "a", "src": "a.wav", "correct": 1},
        {"id": "b", "src": "b.wav", "correct": 2},
        {"id": "c", "src": "c.wav", "correct": 3}
    ], "calibration": {"src": "noise.wav"}}"#;

    fn build_state() -> SessionState {
        let manifest = Manifest::parse(RAW).unwrap();
        let selected = manifest.stimuli().to_vec();
        SessionState::new(RAW.to_string(), manifest, &selected, 2, true, fixed_now()).unwrap()
    }

    struct ReadOnlyBackend;

    #[async_trait]
    impl KeyValueBackend for ReadOnlyBackend {
        async fn get_item(&self, _key: &str) -> Result<Option<String>, StorageError> {
            Ok(Some("{}".into()))
        }

        async fn set_item(&self, _key: &str, _value: &str) -> Result<(), StorageError> {
            Err(StorageError::Unavailable)
        }

        async fn remove_item(&self, _key: &str) -> Result<(), StorageError> {
            Err(StorageError::Unavailable)
        }
    }

    #[tokio::test]
    async fn save_then_load_returns_same_state() {
        let backend = InMemoryBackend::new();
        let store = ProgressStore::open(Arc::new(backend.clone()), "hc").await;
        assert!(store.is_available());
        // probe key is cleaned up
        assert!(backend.is_empty());

        let mut state = build_state();
        state.acknowledge_calibration();
        state.select(1, Answer::new("2")).unwrap();

        assert_eq!(store.save(&state).await.unwrap(), SaveOutcome::Stored);
        let loaded = store.load().await.unwrap().unwrap();
        assert_eq!(loaded, state);
        assert!(loaded.calibration_acknowledged());
    }

    #[tokio::test]
    async fn save_overwrites_previous_blob() {
        let backend = InMemoryBackend::new();
        let store = ProgressStore::open(Arc::new(backend.clone()), "hc").await;

        let mut state = build_state();
        store.save(&state).await.unwrap();
        state.select(0, Answer::new("1")).unwrap();
        state.select(1, Answer::new("1")).unwrap();
        state.advance_page().unwrap();
        store.save(&state).await.unwrap();

        assert_eq!(backend.len(), 1);
        assert_eq!(store.load().await.unwrap().unwrap().page(), 1);
    }

    #[tokio::test]
    async fn missing_key_loads_nothing() {
        let store = ProgressStore::open(Arc::new(InMemoryBackend::new()), "hc").await;
        assert!(store.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn failed_probe_degrades_to_no_persistence() {
        let store = ProgressStore::open(Arc::new(ReadOnlyBackend), "hc").await;
        assert!(!store.is_available());
        assert!(store.load().await.unwrap().is_none());
        assert_eq!(store.save(&build_state()).await.unwrap(), SaveOutcome::Skipped);
        assert!(store.clear().await.is_ok());
    }

    #[tokio::test]
    async fn corrupt_blob_is_a_serialization_error() {
        let backend = InMemoryBackend::new();
        backend.set_item("hc", "{not json").await.unwrap();
        let store = ProgressStore::open(Arc::new(backend), "hc").await;
        assert!(matches!(
            store.load().await,
            Err(StorageError::Serialization(_))
        ));
    }

    #[tokio::test]
    async fn clear_forgets_saved_session() {
        let store = ProgressStore::open(Arc::new(InMemoryBackend::new()), "hc").await;
        store.save(&build_state()).await.unwrap();
        store.clear().await.unwrap();
        assert!(store.load().await.unwrap().is_none());
    }
}

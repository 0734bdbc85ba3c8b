// src/engine/snapshot.rs

use std::sync::Arc;

use crate::{
    config::SNAPSHOT_NAMESPACE,
    error::AppError,
    models::snapshot::SessionSnapshot,
    store::SnapshotStore,
};

pub fn snapshot_key(user_id: &str) -> String {
    format!("{}:{}", SNAPSHOT_NAMESPACE, user_id)
}

/// A user's single resume slot in the snapshot store.
#[derive(Clone)]
pub struct ResumeSlot {
    store: Arc<dyn SnapshotStore>,
    key: String,
}

impl ResumeSlot {
    pub fn for_user(store: Arc<dyn SnapshotStore>, user_id: &str) -> Self {
        Self {
            store,
            key: snapshot_key(user_id),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Reads the slot. Unreadable or corrupt data counts as no snapshot.
    pub fn load(&self) -> Option<SessionSnapshot> {
        let raw = match self.store.get(&self.key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!("Failed to read snapshot {}: {}", self.key, e);
                return None;
            }
        };

        serde_json::from_str(&raw)
            .map_err(|e| tracing::warn!("Discarding corrupt snapshot {}: {}", self.key, e))
            .ok()
    }

    pub fn save(&self, snapshot: &SessionSnapshot) -> Result<(), AppError> {
        let raw = serde_json::to_string(snapshot)
            .map_err(|e| AppError::InternalServerError(e.to_string()))?;
        self.store.set(&self.key, &raw)
    }

    pub fn discard(&self) -> Result<(), AppError> {
        self.store.remove(&self.key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{answer::AnswerRecord, question::Language};
    use crate::store::memory::MemorySnapshotStore;

    fn snapshot() -> SessionSnapshot {
        SessionSnapshot {
            test_id: "t1".into(),
            current_question_index: 2,
            answers: vec![AnswerRecord::unattempted(); 3],
            seconds_remaining: 42,
            language: Language::Hindi,
            saved_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn one_slot_per_user() {
        let store: Arc<dyn SnapshotStore> = Arc::new(MemorySnapshotStore::new());
        let slot = ResumeSlot::for_user(store.clone(), "u1");
        assert_eq!(slot.key(), "test-progress:u1");

        slot.save(&snapshot()).unwrap();
        let mut second = snapshot();
        second.test_id = "t2".into();
        slot.save(&second).unwrap();

        assert_eq!(slot.load().unwrap().test_id, "t2");
        assert!(ResumeSlot::for_user(store, "u2").load().is_none());
    }

    #[test]
    fn corrupt_snapshot_reads_as_absent() {
        let store = Arc::new(MemorySnapshotStore::new());
        store.set(&snapshot_key("u1"), "{not json").unwrap();
        assert!(ResumeSlot::for_user(store, "u1").load().is_none());
    }
}

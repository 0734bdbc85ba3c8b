// src/runtime/registry.rs

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use uuid::Uuid;

use crate::{
    engine::session::{SessionOptions, SessionView, TestSession},
    error::AppError,
    models::test::Test,
    runtime::driver::{DriverSettings, SessionHandle, spawn_session},
    store::{ResultStore, SnapshotStore},
};

#[derive(Default)]
struct Sessions {
    by_id: HashMap<Uuid, SessionHandle>,
    /// Owner at open time. An anonymous session that adopts an owner on
    /// submit is not added here: it has already left taking-test, so there
    /// is nothing for a later open to suspend.
    by_user: HashMap<String, Uuid>,
}

impl Sessions {
    /// Drops handles whose driver has shut itself down.
    fn prune(&mut self) {
        let ended: Vec<Uuid> = self
            .by_id
            .iter()
            .filter(|(_, handle)| handle.is_closed())
            .map(|(id, _)| *id)
            .collect();
        for id in ended {
            self.remove(id);
        }
    }


    fn remove(&mut self, id: Uuid) -> Option<SessionHandle> {
        let handle = self.by_id.remove(&id)?;
        if let Some(owner) = handle.owner_id() {
            if self.by_user.get(owner) == Some(&id) {
                self.by_user.remove(owner);
            }
        }
        Some(handle)
    }
}

/// Live sessions by id. A signed-in user has at most one.
#[derive(Clone)]
pub struct SessionRegistry {
    sessions: Arc<Mutex<Sessions>>,
    results: Arc<dyn ResultStore>,
    snapshots: Arc<dyn SnapshotStore>,
    settings: DriverSettings,
}

impl SessionRegistry {
    pub fn new(
        results: Arc<dyn ResultStore>,
        snapshots: Arc<dyn SnapshotStore>,
        settings: DriverSettings,
    ) -> Self {
        Self {
            sessions: Arc::new(Mutex::new(Sessions::default())),
            results,
            snapshots,
            settings,
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Sessions>, AppError> {
        self.sessions
            .lock()
            .map_err(|_| AppError::InternalServerError("session registry poisoned".to_string()))
    }

    /// Opens a session and starts its driver.
    ///
    /// The owner's previous session is suspended first, so its final snapshot
    /// lands before the new session reads or writes the slot.
    pub async fn open(
        &self,
        test: Arc<Test>,
        options: SessionOptions,
    ) -> Result<(Uuid, SessionView), AppError> {
        if let Some(owner) = &options.owner {
            let previous = {
                let mut sessions = self.lock()?;
                match sessions.by_user.get(&owner.user_id).copied() {
                    Some(id) => sessions.remove(id),
                    None => None,
                }
            };
            if let Some(previous) = previous {
                tracing::debug!("Closing session {} for user {}", previous.id(), owner.user_id);
                close_quietly(&previous, false).await;
            }
        }

        let session = TestSession::open(test, options, self.snapshots.clone())?;
        let id = Uuid::new_v4();
        let handle = spawn_session(id, session, self.results.clone(), self.settings);
        let view = handle.view().await?;

        let displaced = {
            let mut sessions = self.lock()?;
            sessions.prune();
            let previous_id = handle
                .owner_id()
                .and_then(|owner| sessions.by_user.insert(owner.to_string(), id));
            let displaced = previous_id.and_then(|old| sessions.by_id.remove(&old));
            sessions.by_id.insert(id, handle);
            displaced
        };
        // a concurrent open for the same user got in first
        if let Some(displaced) = displaced {
            close_quietly(&displaced, false).await;
        }

        tracing::info!("Session {} opened for test {}", id, view.test_id);
        Ok((id, view))
    }

    pub fn get(&self, id: Uuid) -> Result<SessionHandle, AppError> {
        let mut sessions = self.lock()?;
        let ended = match sessions.by_id.get(&id) {
            Some(handle) if !handle.is_closed() => return Ok(handle.clone()),
            Some(_) => true,
            None => false,
        };

        if ended {
            // the driver shut itself down after going idle
            sessions.remove(id);
            return Err(AppError::NotFound(format!("Session {} has ended", id)));
        }
        Err(AppError::NotFound(format!("Session {} not found", id)))
    }

    /// Ends a session. `discard` clears its resume snapshot.
    pub async fn close(&self, id: Uuid, discard: bool) -> Result<(), AppError> {
        let handle = self
            .lock()?
            .remove(id)
            .ok_or_else(|| AppError::NotFound(format!("Session {} not found", id)))?;
        handle.close(discard).await
    }

    pub fn live_count(&self) -> usize {
        self.lock()
            .map(|sessions| sessions.by_id.values().filter(|h| !h.is_closed()).count())
            .unwrap_or(0)
    }
}

async fn close_quietly(handle: &SessionHandle, discard: bool) {
    if let Err(e) = handle.close(discard).await {
        tracing::debug!("Session {} already stopped: {}", handle.id(), e);
    }
}

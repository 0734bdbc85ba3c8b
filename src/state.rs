// src/state.rs

use std::sync::Arc;
use std::time::Duration;

use axum::extract::FromRef;

use crate::{
    config::Config,
    runtime::{DriverSettings, SessionRegistry},
    store::{ResultStore, SnapshotStore, TestCatalog},
};

#[derive(Clone)]
pub struct AppState {
    pub results: Arc<dyn ResultStore>,
    pub catalog: Arc<dyn TestCatalog>,
    pub sessions: SessionRegistry,
    pub config: Config,
}

impl AppState {
    pub fn new(
        config: Config,
        results: Arc<dyn ResultStore>,
        catalog: Arc<dyn TestCatalog>,
        snapshots: Arc<dyn SnapshotStore>,
    ) -> Self {
        let settings = DriverSettings {
            snapshot_interval: Duration::from_secs(config.snapshot_interval_secs.max(1)),
            idle_timeout: Duration::from_secs(config.session_idle_secs),
        };

        Self {
            sessions: SessionRegistry::new(results.clone(), snapshots, settings),
            results,
            catalog,
            config,
        }
    }
}

impl FromRef<AppState> for Config {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}

impl FromRef<AppState> for SessionRegistry {
    fn from_ref(state: &AppState) -> Self {
        state.sessions.clone()
    }
}

impl FromRef<AppState> for Arc<dyn TestCatalog> {
    fn from_ref(state: &AppState) -> Self {
        state.catalog.clone()
    }
}

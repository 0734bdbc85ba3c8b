// src/store/memory.rs
//
// In-process adapters. Used when no DATABASE_URL is configured and by tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, RwLock};

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use crate::{
    error::AppError,
    models::{
        result::{NewTestResult, TestResult},
        test::{PublishStatus, RawTest, Test},
    },
    store::{ResultStore, SnapshotStore, TestCatalog},
};

fn poisoned<T>(_: T) -> AppError {
    AppError::InternalServerError("store lock poisoned".to_string())
}

#[derive(Default)]
pub struct MemoryResultStore {
    results: RwLock<Vec<TestResult>>,
    unavailable: AtomicBool,
}

impl MemoryResultStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulates a backend outage: every call fails until switched back.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Inserts an already-formed result, e.g. an imported legacy record.
    pub fn insert(&self, result: TestResult) -> Result<(), AppError> {
        self.results.write().map_err(poisoned)?.push(result);
        Ok(())
    }

    fn check_available(&self) -> Result<(), AppError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(AppError::InternalServerError(
                "result store unavailable".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl ResultStore for MemoryResultStore {
    async fn create_result(&self, result: NewTestResult) -> Result<TestResult, AppError> {
        self.check_available()?;
        let stored = result.into_result(Uuid::new_v4(), Utc::now());
        self.results.write().map_err(poisoned)?.push(stored.clone());
        Ok(stored)
    }

    async fn get_result(&self, id: Uuid) -> Result<Option<TestResult>, AppError> {
        self.check_available()?;
        let results = self.results.read().map_err(poisoned)?;
        Ok(results.iter().find(|r| r.id == id).cloned())
    }

    async fn results_for_test(&self, test_id: &str) -> Result<Vec<TestResult>, AppError> {
        self.check_available()?;
        let results = self.results.read().map_err(poisoned)?;
        Ok(results
            .iter()
            .filter(|r| r.test_id == test_id)
            .cloned()
            .collect())
    }

    async fn results_for_user(
        &self,
        user_id: &str,
        test_id: &str,
    ) -> Result<Vec<TestResult>, AppError> {
        self.check_available()?;
        let results = self.results.read().map_err(poisoned)?;
        Ok(results
            .iter()
            .filter(|r| r.user_id == user_id && r.test_id == test_id)
            .cloned()
            .collect())
    }
}

#[derive(Default)]
pub struct MemoryTestCatalog {
    tests: RwLock<HashMap<String, Test>>,
}

impl MemoryTestCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a catalog from stored documents, normalizing each one.
    pub fn from_raw(raw: Vec<RawTest>) -> Result<Self, AppError> {
        let catalog = Self::new();
        for doc in raw {
            catalog.insert(doc.normalize()?)?;
        }
        Ok(catalog)
    }

    pub fn insert(&self, test: Test) -> Result<(), AppError> {
        self.tests
            .write()
            .map_err(poisoned)?
            .insert(test.id.clone(), test);
        Ok(())
    }
}

#[async_trait]
impl TestCatalog for MemoryTestCatalog {
    async fn get_test(&self, id: &str) -> Result<Option<Test>, AppError> {
        Ok(self.tests.read().map_err(poisoned)?.get(id).cloned())
    }

    async fn list_published(&self, category_id: Option<&str>) -> Result<Vec<Test>, AppError> {
        let tests = self.tests.read().map_err(poisoned)?;
        let mut list: Vec<Test> = tests
            .values()
            .filter(|t| t.status == PublishStatus::Published)
            .filter(|t| category_id.is_none() || t.category_id.as_deref() == category_id)
            .cloned()
            .collect();
        list.sort_by(|a, b| a.title.cmp(&b.title));
        Ok(list)
    }
}

#[derive(Default)]
pub struct MemorySnapshotStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SnapshotStore for MemorySnapshotStore {
    fn get(&self, key: &str) -> Result<Option<String>, AppError> {
        Ok(self.entries.lock().map_err(poisoned)?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), AppError> {
        self.entries
            .lock()
            .map_err(poisoned)?
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), AppError> {
        self.entries.lock().map_err(poisoned)?.remove(key);
        Ok(())
    }
}

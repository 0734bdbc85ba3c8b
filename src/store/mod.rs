// src/store/mod.rs
//
// Storage ports. The session core and the results code only see these
// traits; adapters are chosen once at startup.

pub mod file_kv;
pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use uuid::Uuid;

use crate::{
    error::AppError,
    models::{
        result::{NewTestResult, TestResult},
        test::Test,
    },
};

/// Append-only store of submitted results.
#[async_trait]
pub trait ResultStore: Send + Sync {
    /// Persists a new result. The store assigns the id and the timestamp.
    async fn create_result(&self, result: NewTestResult) -> Result<TestResult, AppError>;

    async fn get_result(&self, id: Uuid) -> Result<Option<TestResult>, AppError>;

    /// Every result for a test, in insertion order.
    async fn results_for_test(&self, test_id: &str) -> Result<Vec<TestResult>, AppError>;

    /// One user's results for a test, in insertion order.
    async fn results_for_user(
        &self,
        user_id: &str,
        test_id: &str,
    ) -> Result<Vec<TestResult>, AppError>;
}

/// Read side of the test catalog.
#[async_trait]
pub trait TestCatalog: Send + Sync {
    async fn get_test(&self, id: &str) -> Result<Option<Test>, AppError>;

    async fn list_published(&self, category_id: Option<&str>) -> Result<Vec<Test>, AppError>;
}

/// Small durable key/value store for resume snapshots.
/// Synchronous: a save must never suspend the session.
pub trait SnapshotStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, AppError>;

    fn set(&self, key: &str, value: &str) -> Result<(), AppError>;

    fn remove(&self, key: &str) -> Result<(), AppError>;
}

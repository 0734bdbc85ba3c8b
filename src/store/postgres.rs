// src/store/postgres.rs

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool, types::Json};
use uuid::Uuid;

use crate::{
    error::AppError,
    models::{
        answer::AnswerRecord,
        question::RawQuestion,
        result::{NewTestResult, TestResult},
        test::{PublishStatus, RawTest, Test},
    },
    store::{ResultStore, TestCatalog},
};

const RESULT_COLUMNS: &str = r#"
    id, user_id, user_name, test_id, test_title, category_id, category_name,
    score, total, correct_count, incorrect_count, unattempted_count, percentage,
    answers, time_taken_seconds, submitted_at
"#;

/// Row of the `results` table.
#[derive(Debug, FromRow)]
struct ResultRow {
    id: Uuid,
    user_id: String,
    user_name: String,
    test_id: String,
    test_title: String,
    category_id: Option<String>,
    category_name: Option<String>,
    score: f64,
    total: f64,
    correct_count: i32,
    incorrect_count: i32,
    unattempted_count: i32,
    percentage: f64,
    answers: Json<Vec<AnswerRecord>>,
    time_taken_seconds: Option<i32>,
    submitted_at: DateTime<Utc>,
}

fn non_negative(value: i32) -> u32 {
    u32::try_from(value).unwrap_or(0)
}

impl From<ResultRow> for TestResult {
    fn from(row: ResultRow) -> Self {
        TestResult {
            id: row.id,
            user_id: row.user_id,
            user_name: row.user_name,
            test_id: row.test_id,
            test_title: row.test_title,
            category_id: row.category_id,
            category_name: row.category_name,
            score: row.score,
            total: row.total,
            correct_count: non_negative(row.correct_count),
            incorrect_count: non_negative(row.incorrect_count),
            unattempted_count: non_negative(row.unattempted_count),
            percentage: row.percentage,
            submitted_at: row.submitted_at,
            answers: row.answers.0,
            time_taken_seconds: row.time_taken_seconds.map(non_negative),
        }
    }
}

#[derive(Clone)]
pub struct PgResultStore {
    pool: PgPool,
}

impl PgResultStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ResultStore for PgResultStore {
    async fn create_result(&self, result: NewTestResult) -> Result<TestResult, AppError> {
        let sql = format!(
            r#"
            INSERT INTO results (
                id, user_id, user_name, test_id, test_title, category_id, category_name,
                score, total, correct_count, incorrect_count, unattempted_count, percentage,
                answers, time_taken_seconds
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            RETURNING {}
            "#,
            RESULT_COLUMNS
        );

        let row = sqlx::query_as::<_, ResultRow>(&sql)
            .bind(Uuid::new_v4())
            .bind(&result.user_id)
            .bind(&result.user_name)
            .bind(&result.test_id)
            .bind(&result.test_title)
            .bind(&result.category_id)
            .bind(&result.category_name)
            .bind(result.score)
            .bind(result.total)
            .bind(result.correct_count as i32)
            .bind(result.incorrect_count as i32)
            .bind(result.unattempted_count as i32)
            .bind(result.percentage)
            .bind(Json(&result.answers))
            .bind(result.time_taken_seconds.map(|s| s as i32))
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to insert result: {:?}", e);
                AppError::from(e)
            })?;

        Ok(row.into())
    }

    async fn get_result(&self, id: Uuid) -> Result<Option<TestResult>, AppError> {
        let sql = format!("SELECT {} FROM results WHERE id = $1", RESULT_COLUMNS);
        let row = sqlx::query_as::<_, ResultRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(Into::into))
    }

    async fn results_for_test(&self, test_id: &str) -> Result<Vec<TestResult>, AppError> {
        let sql = format!(
            "SELECT {} FROM results WHERE test_id = $1 ORDER BY seq",
            RESULT_COLUMNS
        );
        let rows = sqlx::query_as::<_, ResultRow>(&sql)
            .bind(test_id)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to fetch results for test {}: {:?}", test_id, e);
                AppError::from(e)
            })?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn results_for_user(
        &self,
        user_id: &str,
        test_id: &str,
    ) -> Result<Vec<TestResult>, AppError> {
        let sql = format!(
            "SELECT {} FROM results WHERE user_id = $1 AND test_id = $2 ORDER BY seq",
            RESULT_COLUMNS
        );
        let rows = sqlx::query_as::<_, ResultRow>(&sql)
            .bind(user_id)
            .bind(test_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }
}

/// Row of the `tests` table. Questions stay in their stored shape until normalized.
#[derive(Debug, FromRow)]
struct TestRow {
    id: String,
    title: String,
    category_id: Option<String>,
    category_name: Option<String>,
    questions: Json<Vec<RawQuestion>>,
    duration_minutes: i32,
    marks_per_question: f64,
    negative_marking: f64,
    status: String,
}

impl TestRow {
    fn normalize(self) -> Result<Test, AppError> {
        let status = if self.status == PublishStatus::Published.as_str() {
            PublishStatus::Published
        } else {
            PublishStatus::Draft
        };

        RawTest {
            id: self.id,
            title: self.title,
            category_id: self.category_id,
            category_name: self.category_name,
            questions: self.questions.0,
            duration_minutes: non_negative(self.duration_minutes),
            marks_per_question: self.marks_per_question,
            negative_marking: self.negative_marking,
            status,
        }
        .normalize()
    }
}

const TEST_COLUMNS: &str = r#"
    id, title, category_id, category_name, questions,
    duration_minutes, marks_per_question, negative_marking, status
"#;

#[derive(Clone)]
pub struct PgTestCatalog {
    pool: PgPool,
}

impl PgTestCatalog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TestCatalog for PgTestCatalog {
    async fn get_test(&self, id: &str) -> Result<Option<Test>, AppError> {
        let sql = format!("SELECT {} FROM tests WHERE id = $1", TEST_COLUMNS);
        let row = sqlx::query_as::<_, TestRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(TestRow::normalize).transpose()
    }

    async fn list_published(&self, category_id: Option<&str>) -> Result<Vec<Test>, AppError> {
        let sql = format!(
            r#"
            SELECT {} FROM tests
            WHERE status = 'published' AND ($1::TEXT IS NULL OR category_id = $1)
            ORDER BY title
            "#,
            TEST_COLUMNS
        );
        let rows = sqlx::query_as::<_, TestRow>(&sql)
            .bind(category_id)
            .fetch_all(&self.pool)
            .await?;

        // One malformed document must not hide the rest of the catalog.
        Ok(rows
            .into_iter()
            .filter_map(|row| {
                let id = row.id.clone();
                row.normalize()
                    .map_err(|e| tracing::warn!("Skipping malformed test {}: {}", id, e))
                    .ok()
            })
            .collect())
    }
}

//! PostgreSQL adapter for the approval storage traits.
//!
//! Aggregates are stored as JSONB documents alongside the columns the
//! platform filters on (status, version, template binding). The
//! submission compare-and-swap is a single guarded `UPDATE` on the
//! version column.

use crate::traits::{QueryWindow, SubmissionStore, TemplateStore, WorkflowStore};
use crate::{StorageError, StorageResult};
use approval_types::{
    FormSubmission, FormTemplate, SubmissionId, TemplateId, Workflow, WorkflowId,
};
use async_trait::async_trait;
use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Serialize;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::Row;

/// PostgreSQL-backed approval storage adapter.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Connect to PostgreSQL and initialize the required schema.
    pub async fn connect(database_url: &str) -> StorageResult<Self> {
        Self::connect_with_options(database_url, 10, 5).await
    }

    /// Connect with explicit pool parameters.
    pub async fn connect_with_options(
        database_url: &str,
        max_connections: u32,
        connect_timeout_secs: u64,
    ) -> StorageResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(std::time::Duration::from_secs(connect_timeout_secs))
            .connect(database_url)
            .await
            .map_err(|e| StorageError::Backend(format!("failed to connect postgres: {e}")))?;
        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    /// Create an adapter from an existing pool.
    pub async fn from_pool(pool: PgPool) -> StorageResult<Self> {
        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn init_schema(&self) -> StorageResult<()> {
        let ddl = [
            r#"
            CREATE TABLE IF NOT EXISTS approval_workflows (
                id TEXT PRIMARY KEY,
                doc JSONB NOT NULL,
                updated_at TIMESTAMPTZ NOT NULL
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS approval_templates (
                id TEXT PRIMARY KEY,
                workflow_id TEXT NOT NULL,
                usage_count BIGINT NOT NULL,
                doc JSONB NOT NULL,
                created_at TIMESTAMPTZ NOT NULL
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS approval_submissions (
                id TEXT PRIMARY KEY,
                template_id TEXT NOT NULL,
                submitter_id TEXT NOT NULL,
                status TEXT NOT NULL,
                version BIGINT NOT NULL,
                doc JSONB NOT NULL,
                created_at TIMESTAMPTZ NOT NULL,
                updated_at TIMESTAMPTZ NOT NULL
            )
            "#,
            r#"
            CREATE INDEX IF NOT EXISTS approval_submissions_template_status
            ON approval_submissions (template_id, status)
            "#,
        ];
        for statement in ddl {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(backend)?;
        }
        Ok(())
    }
}

#[async_trait]
impl WorkflowStore for PostgresStore {
    async fn create_workflow(&self, workflow: Workflow) -> StorageResult<()> {
        let result = sqlx::query(
            "INSERT INTO approval_workflows (id, doc, updated_at) VALUES ($1, $2, $3)
             ON CONFLICT (id) DO NOTHING",
        )
        .bind(workflow.id.0.clone())
        .bind(encode(&workflow)?)
        .bind(workflow.updated_at)
        .execute(&self.pool)
        .await
        .map_err(backend)?;

        if result.rows_affected() == 0 {
            return Err(StorageError::Conflict(format!(
                "workflow {} already exists",
                workflow.id
            )));
        }
        Ok(())
    }

    async fn get_workflow(&self, id: &WorkflowId) -> StorageResult<Option<Workflow>> {
        let row = sqlx::query("SELECT doc FROM approval_workflows WHERE id = $1")
            .bind(id.0.clone())
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?;
        row.map(|r| decode(r.try_get("doc").map_err(backend)?))
            .transpose()
    }

    async fn update_workflow(&self, workflow: Workflow) -> StorageResult<()> {
        let result =
            sqlx::query("UPDATE approval_workflows SET doc = $2, updated_at = $3 WHERE id = $1")
                .bind(workflow.id.0.clone())
                .bind(encode(&workflow)?)
                .bind(Utc::now())
                .execute(&self.pool)
                .await
                .map_err(backend)?;

        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound(format!(
                "workflow {} not found",
                workflow.id
            )));
        }
        Ok(())
    }

    async fn delete_workflow(&self, id: &WorkflowId) -> StorageResult<()> {
        let result = sqlx::query("DELETE FROM approval_workflows WHERE id = $1")
            .bind(id.0.clone())
            .execute(&self.pool)
            .await
            .map_err(backend)?;
        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound(format!("workflow {} not found", id)));
        }
        Ok(())
    }

    async fn list_workflows(&self, window: QueryWindow) -> StorageResult<Vec<Workflow>> {
        let rows = sqlx::query(
            "SELECT doc FROM approval_workflows ORDER BY updated_at DESC LIMIT $1 OFFSET $2",
        )
        .bind(effective_limit(window))
        .bind(window.offset as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;
        rows.into_iter()
            .map(|r| decode(r.try_get("doc").map_err(backend)?))
            .collect()
    }
}

#[async_trait]
impl TemplateStore for PostgresStore {
    async fn create_template(&self, template: FormTemplate) -> StorageResult<()> {
        let result = sqlx::query(
            "INSERT INTO approval_templates (id, workflow_id, usage_count, doc, created_at)
             VALUES ($1, $2, $3, $4, $5) ON CONFLICT (id) DO NOTHING",
        )
        .bind(template.id.0.clone())
        .bind(template.workflow_id.0.clone())
        .bind(template.usage_count as i64)
        .bind(encode(&template)?)
        .bind(template.created_at)
        .execute(&self.pool)
        .await
        .map_err(backend)?;

        if result.rows_affected() == 0 {
            return Err(StorageError::Conflict(format!(
                "template {} already exists",
                template.id
            )));
        }
        Ok(())
    }

    async fn get_template(&self, id: &TemplateId) -> StorageResult<Option<FormTemplate>> {
        let row = sqlx::query("SELECT doc FROM approval_templates WHERE id = $1")
            .bind(id.0.clone())
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?;
        row.map(|r| decode(r.try_get("doc").map_err(backend)?))
            .transpose()
    }

    async fn list_templates_by_workflow(
        &self,
        workflow_id: &WorkflowId,
    ) -> StorageResult<Vec<FormTemplate>> {
        let rows = sqlx::query("SELECT doc FROM approval_templates WHERE workflow_id = $1")
            .bind(workflow_id.0.clone())
            .fetch_all(&self.pool)
            .await
            .map_err(backend)?;
        rows.into_iter()
            .map(|r| decode(r.try_get("doc").map_err(backend)?))
            .collect()
    }

    async fn adjust_usage(&self, id: &TemplateId, delta: i64) -> StorageResult<()> {
        let mut tx = self.pool.begin().await.map_err(backend)?;

        let row = sqlx::query("SELECT doc FROM approval_templates WHERE id = $1 FOR UPDATE")
            .bind(id.0.clone())
            .fetch_optional(&mut *tx)
            .await
            .map_err(backend)?
            .ok_or_else(|| StorageError::NotFound(format!("template {} not found", id)))?;

        let mut template: FormTemplate = decode(row.try_get("doc").map_err(backend)?)?;
        template.usage_count = if delta.is_negative() {
            template.usage_count.saturating_sub(delta.unsigned_abs())
        } else {
            template.usage_count.saturating_add(delta as u64)
        };

        sqlx::query("UPDATE approval_templates SET usage_count = $2, doc = $3 WHERE id = $1")
            .bind(id.0.clone())
            .bind(template.usage_count as i64)
            .bind(encode(&template)?)
            .execute(&mut *tx)
            .await
            .map_err(backend)?;

        tx.commit().await.map_err(backend)
    }
}

#[async_trait]
impl SubmissionStore for PostgresStore {
    async fn create_submission(&self, submission: FormSubmission) -> StorageResult<()> {
        let result = sqlx::query(
            "INSERT INTO approval_submissions
                 (id, template_id, submitter_id, status, version, doc, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) ON CONFLICT (id) DO NOTHING",
        )
        .bind(submission.id.0.clone())
        .bind(submission.form_template_id.0.clone())
        .bind(submission.submitter_id.0.clone())
        .bind(submission.status.to_string())
        .bind(submission.version as i64)
        .bind(encode(&submission)?)
        .bind(submission.created_at)
        .bind(submission.updated_at)
        .execute(&self.pool)
        .await
        .map_err(backend)?;

        if result.rows_affected() == 0 {
            return Err(StorageError::Conflict(format!(
                "submission {} already exists",
                submission.id
            )));
        }
        Ok(())
    }

    async fn get_submission(&self, id: &SubmissionId) -> StorageResult<Option<FormSubmission>> {
        let row = sqlx::query("SELECT doc FROM approval_submissions WHERE id = $1")
            .bind(id.0.clone())
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?;
        row.map(|r| decode(r.try_get("doc").map_err(backend)?))
            .transpose()
    }

    async fn update_atomic(
        &self,
        expected_version: u64,
        mut submission: FormSubmission,
    ) -> StorageResult<FormSubmission> {
        submission.version = expected_version + 1;

        let result = sqlx::query(
            "UPDATE approval_submissions
             SET doc = $2, status = $3, version = $4, updated_at = $5
             WHERE id = $1 AND version = $6",
        )
        .bind(submission.id.0.clone())
        .bind(encode(&submission)?)
        .bind(submission.status.to_string())
        .bind(submission.version as i64)
        .bind(submission.updated_at)
        .bind(expected_version as i64)
        .execute(&self.pool)
        .await
        .map_err(backend)?;

        if result.rows_affected() == 0 {
            let exists = self.get_submission(&submission.id).await?.is_some();
            if exists {
                return Err(StorageError::Conflict(format!(
                    "submission {} was modified concurrently (expected version {})",
                    submission.id, expected_version
                )));
            }
            return Err(StorageError::NotFound(format!(
                "submission {} not found",
                submission.id
            )));
        }
        Ok(submission)
    }

    async fn delete_submission(&self, id: &SubmissionId) -> StorageResult<()> {
        let result = sqlx::query("DELETE FROM approval_submissions WHERE id = $1")
            .bind(id.0.clone())
            .execute(&self.pool)
            .await
            .map_err(backend)?;
        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound(format!(
                "submission {} not found",
                id
            )));
        }
        Ok(())
    }

    async fn list_submissions(&self, window: QueryWindow) -> StorageResult<Vec<FormSubmission>> {
        let rows = sqlx::query(
            "SELECT doc FROM approval_submissions ORDER BY updated_at DESC LIMIT $1 OFFSET $2",
        )
        .bind(effective_limit(window))
        .bind(window.offset as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;
        rows.into_iter()
            .map(|r| decode(r.try_get("doc").map_err(backend)?))
            .collect()
    }

    async fn has_open_for_templates(&self, template_ids: &[TemplateId]) -> StorageResult<bool> {
        if template_ids.is_empty() {
            return Ok(false);
        }
        let ids: Vec<String> = template_ids.iter().map(|t| t.0.clone()).collect();
        let row = sqlx::query(
            "SELECT EXISTS(
                 SELECT 1 FROM approval_submissions
                 WHERE template_id = ANY($1)
                   AND status IN ('pending', 'feedback_requested')
             ) AS open",
        )
        .bind(ids)
        .fetch_one(&self.pool)
        .await
        .map_err(backend)?;
        row.try_get("open").map_err(backend)
    }
}

fn effective_limit(window: QueryWindow) -> i64 {
    if window.limit == 0 {
        i64::MAX
    } else {
        window.limit as i64
    }
}

fn encode<T: Serialize>(value: &T) -> StorageResult<serde_json::Value> {
    serde_json::to_value(value).map_err(|e| StorageError::Serialization(e.to_string()))
}

fn decode<T: DeserializeOwned>(value: serde_json::Value) -> StorageResult<T> {
    serde_json::from_value(value).map_err(|e| StorageError::Serialization(e.to_string()))
}

fn backend(err: sqlx::Error) -> StorageError {
    StorageError::Backend(err.to_string())
}

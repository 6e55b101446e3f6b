//! In-memory reference implementation of the approval storage traits.
//!
//! Deterministic and test-friendly. Production deployments should use a
//! transactional backend (the `postgres` feature) for source-of-truth
//! data.

use crate::traits::{QueryWindow, SubmissionStore, TemplateStore, WorkflowStore};
use crate::{StorageError, StorageResult};
use approval_types::{
    FormSubmission, FormTemplate, SubmissionId, TemplateId, Workflow, WorkflowId,
};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;

/// In-memory approval storage adapter.
#[derive(Default)]
pub struct InMemoryStore {
    workflows: RwLock<HashMap<WorkflowId, Workflow>>,
    templates: RwLock<HashMap<TemplateId, FormTemplate>>,
    submissions: RwLock<HashMap<SubmissionId, FormSubmission>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl WorkflowStore for InMemoryStore {
    async fn create_workflow(&self, workflow: Workflow) -> StorageResult<()> {
        let mut guard = self
            .workflows
            .write()
            .map_err(|_| StorageError::Backend("workflows lock poisoned".to_string()))?;
        if guard.contains_key(&workflow.id) {
            return Err(StorageError::Conflict(format!(
                "workflow {} already exists",
                workflow.id
            )));
        }
        guard.insert(workflow.id.clone(), workflow);
        Ok(())
    }

    async fn get_workflow(&self, id: &WorkflowId) -> StorageResult<Option<Workflow>> {
        let guard = self
            .workflows
            .read()
            .map_err(|_| StorageError::Backend("workflows lock poisoned".to_string()))?;
        Ok(guard.get(id).cloned())
    }

    async fn update_workflow(&self, workflow: Workflow) -> StorageResult<()> {
        let mut guard = self
            .workflows
            .write()
            .map_err(|_| StorageError::Backend("workflows lock poisoned".to_string()))?;
        if !guard.contains_key(&workflow.id) {
            return Err(StorageError::NotFound(format!(
                "workflow {} not found",
                workflow.id
            )));
        }
        guard.insert(workflow.id.clone(), workflow);
        Ok(())
    }

    async fn delete_workflow(&self, id: &WorkflowId) -> StorageResult<()> {
        let mut guard = self
            .workflows
            .write()
            .map_err(|_| StorageError::Backend("workflows lock poisoned".to_string()))?;
        guard
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| StorageError::NotFound(format!("workflow {} not found", id)))
    }

    async fn list_workflows(&self, window: QueryWindow) -> StorageResult<Vec<Workflow>> {
        let guard = self
            .workflows
            .read()
            .map_err(|_| StorageError::Backend("workflows lock poisoned".to_string()))?;
        let mut values = guard.values().cloned().collect::<Vec<_>>();
        values.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(apply_window(values, window))
    }
}

#[async_trait]
impl TemplateStore for InMemoryStore {
    async fn create_template(&self, template: FormTemplate) -> StorageResult<()> {
        let mut guard = self
            .templates
            .write()
            .map_err(|_| StorageError::Backend("templates lock poisoned".to_string()))?;
        if guard.contains_key(&template.id) {
            return Err(StorageError::Conflict(format!(
                "template {} already exists",
                template.id
            )));
        }
        guard.insert(template.id.clone(), template);
        Ok(())
    }

    async fn get_template(&self, id: &TemplateId) -> StorageResult<Option<FormTemplate>> {
        let guard = self
            .templates
            .read()
            .map_err(|_| StorageError::Backend("templates lock poisoned".to_string()))?;
        Ok(guard.get(id).cloned())
    }

    async fn list_templates_by_workflow(
        &self,
        workflow_id: &WorkflowId,
    ) -> StorageResult<Vec<FormTemplate>> {
        let guard = self
            .templates
            .read()
            .map_err(|_| StorageError::Backend("templates lock poisoned".to_string()))?;
        Ok(guard
            .values()
            .filter(|t| &t.workflow_id == workflow_id)
            .cloned()
            .collect())
    }

    async fn adjust_usage(&self, id: &TemplateId, delta: i64) -> StorageResult<()> {
        let mut guard = self
            .templates
            .write()
            .map_err(|_| StorageError::Backend("templates lock poisoned".to_string()))?;
        let template = guard
            .get_mut(id)
            .ok_or_else(|| StorageError::NotFound(format!("template {} not found", id)))?;
        template.usage_count = if delta.is_negative() {
            template.usage_count.saturating_sub(delta.unsigned_abs())
        } else {
            template.usage_count.saturating_add(delta as u64)
        };
        Ok(())
    }
}

#[async_trait]
impl SubmissionStore for InMemoryStore {
    async fn create_submission(&self, submission: FormSubmission) -> StorageResult<()> {
        let mut guard = self
            .submissions
            .write()
            .map_err(|_| StorageError::Backend("submissions lock poisoned".to_string()))?;
        if guard.contains_key(&submission.id) {
            return Err(StorageError::Conflict(format!(
                "submission {} already exists",
                submission.id
            )));
        }
        guard.insert(submission.id.clone(), submission);
        Ok(())
    }

    async fn get_submission(&self, id: &SubmissionId) -> StorageResult<Option<FormSubmission>> {
        let guard = self
            .submissions
            .read()
            .map_err(|_| StorageError::Backend("submissions lock poisoned".to_string()))?;
        Ok(guard.get(id).cloned())
    }

    async fn update_atomic(
        &self,
        expected_version: u64,
        mut submission: FormSubmission,
    ) -> StorageResult<FormSubmission> {
        let mut guard = self
            .submissions
            .write()
            .map_err(|_| StorageError::Backend("submissions lock poisoned".to_string()))?;
        let stored = guard.get_mut(&submission.id).ok_or_else(|| {
            StorageError::NotFound(format!("submission {} not found", submission.id))
        })?;

        if stored.version != expected_version {
            return Err(StorageError::Conflict(format!(
                "submission {} was modified concurrently (expected version {}, found {})",
                submission.id, expected_version, stored.version
            )));
        }

        submission.version = expected_version + 1;
        *stored = submission.clone();
        Ok(submission)
    }

    async fn delete_submission(&self, id: &SubmissionId) -> StorageResult<()> {
        let mut guard = self
            .submissions
            .write()
            .map_err(|_| StorageError::Backend("submissions lock poisoned".to_string()))?;
        guard
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| StorageError::NotFound(format!("submission {} not found", id)))
    }

    async fn list_submissions(&self, window: QueryWindow) -> StorageResult<Vec<FormSubmission>> {
        let guard = self
            .submissions
            .read()
            .map_err(|_| StorageError::Backend("submissions lock poisoned".to_string()))?;
        let mut values = guard.values().cloned().collect::<Vec<_>>();
        values.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(apply_window(values, window))
    }

    async fn has_open_for_templates(&self, template_ids: &[TemplateId]) -> StorageResult<bool> {
        let guard = self
            .submissions
            .read()
            .map_err(|_| StorageError::Backend("submissions lock poisoned".to_string()))?;
        Ok(guard.values().any(|s| {
            s.status.is_open() && template_ids.iter().any(|t| t == &s.form_template_id)
        }))
    }
}

fn apply_window<T>(items: Vec<T>, window: QueryWindow) -> Vec<T> {
    let iter = items.into_iter().skip(window.offset);
    if window.limit == 0 {
        iter.collect()
    } else {
        iter.take(window.limit).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approval_types::{Priority, RoleId, UserId, WorkflowStep};
    use std::collections::HashMap as Map;

    fn sample_workflow() -> Workflow {
        let mut wf = Workflow::new("Review").activated();
        wf.add_step(WorkflowStep::new(1, RoleId::new("manager"))).unwrap();
        wf
    }

    fn sample_submission(template: &TemplateId) -> FormSubmission {
        FormSubmission::new(
            template.clone(),
            UserId::new("alice"),
            Map::new(),
            Priority::Low,
        )
    }

    #[tokio::test]
    async fn test_workflow_roundtrip() {
        let store = InMemoryStore::new();
        let wf = sample_workflow();
        let id = wf.id.clone();
        store.create_workflow(wf).await.unwrap();

        let fetched = store.get_workflow(&id).await.unwrap().unwrap();
        assert_eq!(fetched.name, "Review");

        store.delete_workflow(&id).await.unwrap();
        assert!(store.get_workflow(&id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_workflow_conflicts() {
        let store = InMemoryStore::new();
        let wf = sample_workflow();
        store.create_workflow(wf.clone()).await.unwrap();
        assert!(matches!(
            store.create_workflow(wf).await,
            Err(StorageError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn test_update_atomic_bumps_version() {
        let store = InMemoryStore::new();
        let submission = sample_submission(&TemplateId::new("tpl"));
        store.create_submission(submission.clone()).await.unwrap();

        let updated = store.update_atomic(0, submission.clone()).await.unwrap();
        assert_eq!(updated.version, 1);

        let stored = store
            .get_submission(&submission.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.version, 1);
    }

    #[tokio::test]
    async fn test_update_atomic_rejects_stale_writer() {
        let store = InMemoryStore::new();
        let submission = sample_submission(&TemplateId::new("tpl"));
        store.create_submission(submission.clone()).await.unwrap();

        // First writer succeeds, second writer raced on the same version.
        store.update_atomic(0, submission.clone()).await.unwrap();
        let result = store.update_atomic(0, submission).await;
        assert!(matches!(result, Err(StorageError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_adjust_usage_clamps_at_zero() {
        let store = InMemoryStore::new();
        let template = FormTemplate::new("Expense", WorkflowId::new("wf"));
        let id = template.id.clone();
        store.create_template(template).await.unwrap();

        store.adjust_usage(&id, 2).await.unwrap();
        store.adjust_usage(&id, -5).await.unwrap();
        let stored = store.get_template(&id).await.unwrap().unwrap();
        assert_eq!(stored.usage_count, 0);
    }

    #[tokio::test]
    async fn test_has_open_for_templates() {
        let store = InMemoryStore::new();
        let template_id = TemplateId::new("tpl");
        let mut submission = sample_submission(&template_id);
        submission.seed_instance(vec![approval_types::WorkflowInstanceStep::pending(
            approval_types::StepId::new("s1"),
            1,
            None,
        )]);
        submission.mark_submitted().unwrap();
        store.create_submission(submission).await.unwrap();

        assert!(store
            .has_open_for_templates(&[template_id.clone()])
            .await
            .unwrap());
        assert!(!store
            .has_open_for_templates(&[TemplateId::new("other")])
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_list_window() {
        let store = InMemoryStore::new();
        for _ in 0..5 {
            store
                .create_submission(sample_submission(&TemplateId::new("tpl")))
                .await
                .unwrap();
        }
        let page = store
            .list_submissions(QueryWindow { limit: 2, offset: 1 })
            .await
            .unwrap();
        assert_eq!(page.len(), 2);

        let all = store.list_submissions(QueryWindow::default()).await.unwrap();
        assert_eq!(all.len(), 5);
    }
}

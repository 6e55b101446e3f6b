use crate::StorageResult;
use approval_types::{FormSubmission, FormTemplate, SubmissionId, TemplateId, Workflow, WorkflowId};
use async_trait::async_trait;

/// Generic query window for paged reads. A zero limit means unbounded.
#[derive(Debug, Clone, Copy, Default)]
pub struct QueryWindow {
    pub limit: usize,
    pub offset: usize,
}

/// Storage interface for workflow definitions.
#[async_trait]
pub trait WorkflowStore: Send + Sync {
    /// Insert a new workflow definition.
    async fn create_workflow(&self, workflow: Workflow) -> StorageResult<()>;

    /// Get one workflow by id.
    async fn get_workflow(&self, id: &WorkflowId) -> StorageResult<Option<Workflow>>;

    /// Replace an existing workflow definition.
    async fn update_workflow(&self, workflow: Workflow) -> StorageResult<()>;

    /// Remove a workflow definition.
    async fn delete_workflow(&self, id: &WorkflowId) -> StorageResult<()>;

    /// List workflows newest-first.
    async fn list_workflows(&self, window: QueryWindow) -> StorageResult<Vec<Workflow>>;
}

/// Storage interface for form templates.
#[async_trait]
pub trait TemplateStore: Send + Sync {
    /// Insert a new template.
    async fn create_template(&self, template: FormTemplate) -> StorageResult<()>;

    /// Get one template by id.
    async fn get_template(&self, id: &TemplateId) -> StorageResult<Option<FormTemplate>>;

    /// All templates bound to a workflow.
    async fn list_templates_by_workflow(
        &self,
        workflow_id: &WorkflowId,
    ) -> StorageResult<Vec<FormTemplate>>;

    /// Adjust a template's live-submission counter. Clamped at zero.
    async fn adjust_usage(&self, id: &TemplateId, delta: i64) -> StorageResult<()>;
}

/// Storage interface for submissions.
#[async_trait]
pub trait SubmissionStore: Send + Sync {
    /// Insert a newly routed submission.
    async fn create_submission(&self, submission: FormSubmission) -> StorageResult<()>;

    /// Get one submission by id.
    async fn get_submission(&self, id: &SubmissionId) -> StorageResult<Option<FormSubmission>>;

    /// Compare-and-swap write: succeeds only if the stored version still
    /// equals `expected_version`, and bumps the version by one. The
    /// second of two racing writers gets a conflict.
    async fn update_atomic(
        &self,
        expected_version: u64,
        submission: FormSubmission,
    ) -> StorageResult<FormSubmission>;

    /// Hard-delete a submission. No tombstone is kept.
    async fn delete_submission(&self, id: &SubmissionId) -> StorageResult<()>;

    /// List submissions newest-first.
    async fn list_submissions(&self, window: QueryWindow) -> StorageResult<Vec<FormSubmission>>;

    /// Whether any submission of the given templates is still open
    /// (pending or feedback-requested). Guards workflow edits.
    async fn has_open_for_templates(&self, template_ids: &[TemplateId]) -> StorageResult<bool>;
}

/// Unified storage bundle the engine is wired against.
pub trait ApprovalStorage: WorkflowStore + TemplateStore + SubmissionStore + Send + Sync {}

impl<T> ApprovalStorage for T where T: WorkflowStore + TemplateStore + SubmissionStore + Send + Sync {}

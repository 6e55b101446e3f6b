//! Workflow definition write path.
//!
//! Validation happens before anything is stored: every step must bind an
//! existing role, explicit departments must exist, and a department-head
//! role requires a department with an assigned manager - whose id is
//! denormalized onto the step at save time, not re-resolved later.
//! A workflow with open submissions refuses edits and deletion.

use crate::ApprovalEngine;
use approval_effects::{AuditEvent, Effect};
use approval_storage::{QueryWindow, SubmissionStore, TemplateStore, WorkflowStore};
use approval_types::{
    ApprovalError, ApprovalResult, FormTemplate, UserId, Workflow, WorkflowId,
};

impl ApprovalEngine {
    /// Validate and store a new workflow definition.
    pub async fn create_workflow(
        &self,
        actor: &UserId,
        mut workflow: Workflow,
    ) -> ApprovalResult<Workflow> {
        workflow.validate()?;
        self.validate_step_bindings(&mut workflow).await?;
        self.storage().create_workflow(workflow.clone()).await?;

        self.effects().publish(Effect::Audit(
            AuditEvent::new(actor.clone(), "workflow.create", "workflow", workflow.id.0.clone())
                .with_description(format!("workflow '{}' created", workflow.name)),
        ));
        tracing::info!(workflow_id = %workflow.id, "workflow created");
        Ok(workflow)
    }

    /// Replace an existing workflow definition.
    ///
    /// Rejected while any submission bound to it is still open.
    pub async fn update_workflow(
        &self,
        actor: &UserId,
        mut workflow: Workflow,
    ) -> ApprovalResult<Workflow> {
        let existing = self
            .storage()
            .get_workflow(&workflow.id)
            .await?
            .ok_or_else(|| ApprovalError::WorkflowNotFound(workflow.id.clone()))?;
        self.ensure_no_open_submissions(&workflow.id).await?;

        workflow.validate()?;
        self.validate_step_bindings(&mut workflow).await?;
        self.storage().update_workflow(workflow.clone()).await?;

        self.effects().publish(Effect::Audit(
            AuditEvent::new(actor.clone(), "workflow.update", "workflow", workflow.id.0.clone())
                .with_description(format!("workflow '{}' updated", workflow.name))
                .with_old_data(serde_json::json!({ "name": existing.name }))
                .with_new_data(serde_json::json!({ "name": workflow.name })),
        ));
        tracing::info!(workflow_id = %workflow.id, "workflow updated");
        Ok(workflow)
    }

    /// Delete a workflow definition.
    ///
    /// Rejected while any submission bound to it is still open.
    pub async fn delete_workflow(&self, actor: &UserId, id: &WorkflowId) -> ApprovalResult<()> {
        let existing = self
            .storage()
            .get_workflow(id)
            .await?
            .ok_or_else(|| ApprovalError::WorkflowNotFound(id.clone()))?;
        self.ensure_no_open_submissions(id).await?;
        self.storage().delete_workflow(id).await?;

        self.effects().publish(Effect::Audit(
            AuditEvent::new(actor.clone(), "workflow.delete", "workflow", id.0.clone())
                .with_description(format!("workflow '{}' deleted", existing.name)),
        ));
        tracing::info!(workflow_id = %id, "workflow deleted");
        Ok(())
    }

    /// Register a form template against an existing workflow.
    pub async fn create_template(
        &self,
        actor: &UserId,
        template: FormTemplate,
    ) -> ApprovalResult<FormTemplate> {
        if template.name.trim().is_empty() {
            return Err(ApprovalError::Validation(
                "template name must not be empty".into(),
            ));
        }
        self.storage()
            .get_workflow(&template.workflow_id)
            .await?
            .ok_or_else(|| ApprovalError::WorkflowNotFound(template.workflow_id.clone()))?;
        self.storage().create_template(template.clone()).await?;

        self.effects().publish(Effect::Audit(
            AuditEvent::new(actor.clone(), "template.create", "template", template.id.0.clone())
                .with_description(format!("template '{}' registered", template.name)),
        ));
        tracing::info!(template_id = %template.id, "template registered");
        Ok(template)
    }

    /// Fetch one workflow definition.
    pub async fn get_workflow(&self, id: &WorkflowId) -> ApprovalResult<Workflow> {
        self.storage()
            .get_workflow(id)
            .await?
            .ok_or_else(|| ApprovalError::WorkflowNotFound(id.clone()))
    }

    /// List workflow definitions newest-first.
    pub async fn list_workflows(&self, window: QueryWindow) -> ApprovalResult<Vec<Workflow>> {
        Ok(self.storage().list_workflows(window).await?)
    }

    // ── Internal ─────────────────────────────────────────────────────

    async fn validate_step_bindings(&self, workflow: &mut Workflow) -> ApprovalResult<()> {
        for step in workflow.steps.iter_mut() {
            let role = self
                .directory()
                .find_role(&step.role_id)
                .await?
                .ok_or_else(|| ApprovalError::RoleNotFound(step.role_id.clone()))?;

            if let Some(dept_id) = &step.department_id {
                self.directory()
                    .find_department(dept_id)
                    .await?
                    .ok_or_else(|| ApprovalError::DepartmentNotFound(dept_id.clone()))?;
            }

            if role.department_head {
                let dept_id = step.department_id.clone().ok_or_else(|| {
                    ApprovalError::Validation(format!(
                        "step {} binds department-head role '{}' but names no department",
                        step.order, role.name
                    ))
                })?;
                let manager = self
                    .directory()
                    .find_department_manager(&dept_id)
                    .await?
                    .ok_or_else(|| {
                        ApprovalError::Validation(format!(
                            "department '{}' has no manager assigned",
                            dept_id
                        ))
                    })?;
                step.approver_id = Some(manager.id);
            }
        }
        Ok(())
    }

    async fn ensure_no_open_submissions(&self, workflow_id: &WorkflowId) -> ApprovalResult<()> {
        let templates = self
            .storage()
            .list_templates_by_workflow(workflow_id)
            .await?;
        let ids: Vec<_> = templates.into_iter().map(|t| t.id).collect();
        if !ids.is_empty() && self.storage().has_open_for_templates(&ids).await? {
            return Err(ApprovalError::Conflict(format!(
                "workflow {} has open submissions and cannot be modified",
                workflow_id
            )));
        }
        Ok(())
    }
}

//! The approval state machine.
//!
//! Submissions move `draft -> pending <-> feedback_requested` with
//! `pending -> approved` and `pending -> rejected` terminal. The engine
//! is purely reactive: each `submit`/`act`/`delete` call is one unit of
//! work against shared storage, guarded by the submission's version so
//! two approvers racing on the same step cannot both win - the second
//! writer fails with a conflict and must refetch.
//!
//! Side effects (notifications, email, audit) are published as intents
//! AFTER the durable write. Their delivery is best-effort and never
//! rolls a transition back.

use approval_directory::{ApproverResolver, DirectoryLookup, SelectionPolicy};
use approval_effects::{
    AuditEvent, Effect, EffectsQueue, EmailMessage, Notification, NotificationKind,
};
use approval_storage::{
    ApprovalStorage, QueryWindow, SubmissionStore, TemplateStore, WorkflowStore,
};
use approval_types::{
    ApprovalError, ApprovalResult, FormSubmission, Priority, ReviewAction, SubmissionId,
    SubmissionStatus, TemplateId, UserId, Workflow, WorkflowInstanceStep, WorkflowStep,
};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// The approval engine - the only writer of submission state
pub struct ApprovalEngine {
    directory: Arc<dyn DirectoryLookup>,
    storage: Arc<dyn ApprovalStorage>,
    resolver: ApproverResolver,
    effects: EffectsQueue,
}

impl ApprovalEngine {
    /// Engine with the reference (uniform random) approver selection
    pub fn new(
        directory: Arc<dyn DirectoryLookup>,
        storage: Arc<dyn ApprovalStorage>,
        effects: EffectsQueue,
    ) -> Self {
        let resolver = ApproverResolver::new(directory.clone());
        Self {
            directory,
            storage,
            resolver,
            effects,
        }
    }

    /// Engine with an explicit selection policy
    pub fn with_selection_policy(
        directory: Arc<dyn DirectoryLookup>,
        storage: Arc<dyn ApprovalStorage>,
        effects: EffectsQueue,
        policy: Arc<dyn SelectionPolicy>,
    ) -> Self {
        let resolver = ApproverResolver::with_policy(directory.clone(), policy);
        Self {
            directory,
            storage,
            resolver,
            effects,
        }
    }

    pub(crate) fn storage(&self) -> &Arc<dyn ApprovalStorage> {
        &self.storage
    }

    pub(crate) fn directory(&self) -> &Arc<dyn DirectoryLookup> {
        &self.directory
    }

    pub(crate) fn effects(&self) -> &EffectsQueue {
        &self.effects
    }

    // ── Submit ───────────────────────────────────────────────────────

    /// Create and route a new submission.
    ///
    /// Approvers for EVERY step are resolved eagerly here, scoped by the
    /// submitter's department, and frozen into the instance snapshot.
    /// An unresolvable step is not an error - it proceeds with an empty
    /// approver slot and is flagged for manual assignment.
    pub async fn submit(
        &self,
        form_template_id: &TemplateId,
        submitter_id: &UserId,
        data: HashMap<String, Value>,
        priority: Priority,
    ) -> ApprovalResult<FormSubmission> {
        let template = self
            .storage
            .get_template(form_template_id)
            .await?
            .ok_or_else(|| ApprovalError::TemplateNotFound(form_template_id.clone()))?;
        let workflow = self
            .storage
            .get_workflow(&template.workflow_id)
            .await?
            .ok_or_else(|| ApprovalError::WorkflowNotFound(template.workflow_id.clone()))?;

        if !workflow.is_active() {
            return Err(ApprovalError::Validation(format!(
                "workflow '{}' is not accepting submissions",
                workflow.name
            )));
        }
        workflow.validate()?;
        template
            .validate_data(&data)
            .map_err(ApprovalError::FieldValidation)?;

        let submitter = self
            .directory
            .find_user(submitter_id)
            .await?
            .ok_or_else(|| ApprovalError::UserNotFound(submitter_id.clone()))?;

        let mut instance = Vec::with_capacity(workflow.step_count());
        for step in &workflow.steps {
            let approver = self
                .resolver
                .resolve_step(step, submitter.department_id.as_ref())
                .await?;
            instance.push(WorkflowInstanceStep::pending(
                step.id.clone(),
                step.order,
                approver,
            ));
        }

        let mut submission = FormSubmission::new(
            form_template_id.clone(),
            submitter_id.clone(),
            data,
            priority,
        );
        submission.seed_instance(instance);
        submission.mark_submitted()?;

        self.storage.create_submission(submission.clone()).await?;
        self.storage.adjust_usage(form_template_id, 1).await?;

        self.push_approval_request(&submission, 0).await;
        self.effects.publish(Effect::Audit(
            AuditEvent::new(
                submitter_id.clone(),
                "submission.create",
                "submission",
                submission.id.0.clone(),
            )
            .with_description(format!(
                "submission {} routed through workflow '{}'",
                submission.id.short(),
                workflow.name
            ))
            .with_new_data(serde_json::json!({ "status": submission.status.to_string() })),
        ));

        tracing::info!(
            submission_id = %submission.id,
            template_id = %template.id,
            workflow_id = %workflow.id,
            "submission routed"
        );
        Ok(submission)
    }

    // ── Act ──────────────────────────────────────────────────────────

    /// Apply an approver action to the current step.
    ///
    /// The write is a compare-and-swap on the version read here; a
    /// concurrent writer surfaces as a conflict and the caller retries
    /// the whole call after refetching.
    pub async fn act(
        &self,
        submission_id: &SubmissionId,
        acting_user_id: &UserId,
        action: ReviewAction,
        comment: Option<String>,
    ) -> ApprovalResult<FormSubmission> {
        let comment = comment.filter(|c| !c.trim().is_empty());
        if action.requires_comment() && comment.is_none() {
            return Err(ApprovalError::Validation(
                "a comment is required when requesting feedback".into(),
            ));
        }

        let submission = self
            .storage
            .get_submission(submission_id)
            .await?
            .ok_or_else(|| ApprovalError::SubmissionNotFound(submission_id.clone()))?;
        let expected_version = submission.version;

        if submission.status != SubmissionStatus::Pending {
            return Err(ApprovalError::Conflict(format!(
                "submission {} is not pending ({})",
                submission.id, submission.status
            )));
        }

        let template = self
            .storage
            .get_template(&submission.form_template_id)
            .await?
            .ok_or_else(|| ApprovalError::TemplateNotFound(submission.form_template_id.clone()))?;
        let workflow = self
            .storage
            .get_workflow(&template.workflow_id)
            .await?
            .ok_or_else(|| ApprovalError::WorkflowNotFound(template.workflow_id.clone()))?;

        // The definition may have been edited since the submission was
        // created; re-validate the index and cross-check the snapshot.
        let index = submission.current_step;
        let step = workflow
            .step_at(index)
            .ok_or(ApprovalError::StepOutOfBounds {
                index,
                len: workflow.step_count(),
            })?;
        let instance_step = submission.instance_step(index)?;
        if instance_step.step_id != step.id {
            return Err(ApprovalError::Conflict(format!(
                "workflow '{}' changed since submission {} was created",
                workflow.name, submission.id
            )));
        }

        self.authorize_actor(acting_user_id, step, instance_step)
            .await?;

        let mut updated = submission;
        let mut newly_pending = None;
        match action {
            ReviewAction::Approve => {
                updated.record_step_approval(acting_user_id.clone(), comment.clone())?;
                if workflow.is_last_step(index) {
                    updated.finalize_approved()?;
                } else {
                    let next = updated.advance()?;
                    self.refresh_step_approver(&mut updated, &workflow, next)
                        .await?;
                    newly_pending = Some(next);
                }
            }
            ReviewAction::Reject => {
                updated.record_step_rejection(acting_user_id.clone(), comment.clone())?;
            }
            ReviewAction::Feedback => {
                let text = comment.clone().ok_or_else(|| {
                    ApprovalError::Validation(
                        "a comment is required when requesting feedback".into(),
                    )
                })?;
                updated.record_feedback_request(acting_user_id.clone(), text)?;
            }
        }

        let stored = self.storage.update_atomic(expected_version, updated).await?;

        if let Some(next) = newly_pending {
            self.push_approval_request(&stored, next).await;
        }
        self.push_status_change(&stored, acting_user_id).await;
        self.effects.publish(Effect::Audit(
            AuditEvent::new(
                acting_user_id.clone(),
                format!("submission.{}", action.as_str()),
                "submission",
                stored.id.0.clone(),
            )
            .with_description(format!(
                "step {} of submission {}: {}",
                index + 1,
                stored.id.short(),
                action.as_str()
            ))
            .with_new_data(serde_json::json!({ "status": stored.status.to_string() })),
        ));

        tracing::info!(
            submission_id = %stored.id,
            actor = %acting_user_id,
            action = action.as_str(),
            status = %stored.status,
            current_step = stored.current_step,
            "submission transition applied"
        );
        Ok(stored)
    }

    // ── Delete ───────────────────────────────────────────────────────

    /// Hard-delete a draft or rejected submission.
    ///
    /// Allowed for the submitter, or for a user who qualifies as an
    /// approver somewhere in the submission's workflow. The owning
    /// template's usage counter is decremented.
    pub async fn delete(
        &self,
        submission_id: &SubmissionId,
        acting_user_id: &UserId,
    ) -> ApprovalResult<()> {
        let submission = self
            .storage
            .get_submission(submission_id)
            .await?
            .ok_or_else(|| ApprovalError::SubmissionNotFound(submission_id.clone()))?;

        if !submission.status.is_deletable() {
            return Err(ApprovalError::Conflict(format!(
                "submission {} cannot be deleted while {}",
                submission.id, submission.status
            )));
        }

        if &submission.submitter_id != acting_user_id {
            self.authorize_workflow_approver(&submission, acting_user_id)
                .await?;
        }

        self.storage.delete_submission(submission_id).await?;
        self.storage
            .adjust_usage(&submission.form_template_id, -1)
            .await?;

        self.effects.publish(Effect::Audit(
            AuditEvent::new(
                acting_user_id.clone(),
                "submission.delete",
                "submission",
                submission.id.0.clone(),
            )
            .with_description(format!(
                "submission {} deleted while {}",
                submission.id.short(),
                submission.status
            ))
            .with_old_data(serde_json::json!({ "status": submission.status.to_string() })),
        ));

        tracing::info!(
            submission_id = %submission.id,
            actor = %acting_user_id,
            "submission deleted"
        );
        Ok(())
    }

    // ── Queries ──────────────────────────────────────────────────────

    /// Fetch one submission.
    pub async fn get(&self, submission_id: &SubmissionId) -> ApprovalResult<FormSubmission> {
        self.storage
            .get_submission(submission_id)
            .await?
            .ok_or_else(|| ApprovalError::SubmissionNotFound(submission_id.clone()))
    }

    /// List submissions newest-first.
    pub async fn list(&self, window: QueryWindow) -> ApprovalResult<Vec<FormSubmission>> {
        Ok(self.storage.list_submissions(window).await?)
    }

    // ── Internal ─────────────────────────────────────────────────────

    /// A user may act on the current step iff they are its resolved
    /// approver, or - when the step binds no explicit approver - they
    /// actively hold the step's role.
    async fn authorize_actor(
        &self,
        acting_user_id: &UserId,
        step: &WorkflowStep,
        instance_step: &WorkflowInstanceStep,
    ) -> ApprovalResult<()> {
        if instance_step.approver_id.as_ref() == Some(acting_user_id) {
            return Ok(());
        }
        if step.approver_id.is_none() {
            if let Some(user) = self.directory.find_user(acting_user_id).await? {
                if user.active && user.role_id == step.role_id {
                    return Ok(());
                }
            }
        }
        Err(ApprovalError::Forbidden(format!(
            "user {} is not authorized to act on step {}",
            acting_user_id, step.order
        )))
    }

    /// Delete-path check: the actor must qualify as an approver for the
    /// submission's workflow (resolved on some step, explicitly bound,
    /// or actively holding some step's role).
    async fn authorize_workflow_approver(
        &self,
        submission: &FormSubmission,
        acting_user_id: &UserId,
    ) -> ApprovalResult<()> {
        if submission
            .workflow_instance
            .iter()
            .any(|s| s.approver_id.as_ref() == Some(acting_user_id))
        {
            return Ok(());
        }

        let workflow = match self.storage.get_template(&submission.form_template_id).await? {
            Some(template) => self.storage.get_workflow(&template.workflow_id).await?,
            None => None,
        };
        if let Some(workflow) = workflow {
            if workflow
                .steps
                .iter()
                .any(|s| s.approver_id.as_ref() == Some(acting_user_id))
            {
                return Ok(());
            }
            if let Some(user) = self.directory.find_user(acting_user_id).await? {
                if user.active && workflow.steps.iter().any(|s| s.role_id == user.role_id) {
                    return Ok(());
                }
            }
        }

        Err(ApprovalError::Forbidden(format!(
            "user {} may not delete submission {}",
            acting_user_id, submission.id
        )))
    }

    /// Re-resolve the approver for a step the submission just arrived
    /// at. The eager snapshot from submit time is kept when resolution
    /// now comes up empty.
    async fn refresh_step_approver(
        &self,
        submission: &mut FormSubmission,
        workflow: &Workflow,
        index: usize,
    ) -> ApprovalResult<()> {
        let Some(step) = workflow.step_at(index) else {
            return Ok(());
        };
        let submitter_department = match self.directory.find_user(&submission.submitter_id).await? {
            Some(user) => user.department_id,
            None => None,
        };
        if let Some(approver) = self
            .resolver
            .resolve_step(step, submitter_department.as_ref())
            .await?
        {
            submission.set_step_approver(index, Some(approver))?;
        }
        Ok(())
    }

    /// Notify (and email) the approver a step is now waiting on.
    async fn push_approval_request(&self, submission: &FormSubmission, index: usize) {
        let Ok(step) = submission.instance_step(index) else {
            return;
        };
        let Some(approver_id) = step.approver_id.clone() else {
            tracing::warn!(
                submission_id = %submission.id,
                step = index,
                "step has no resolved approver; skipping approval request"
            );
            return;
        };

        self.effects.publish(Effect::Notify {
            user_id: approver_id.clone(),
            notification: Notification {
                kind: NotificationKind::ApprovalRequest,
                title: "Approval requested".into(),
                message: format!(
                    "Submission {} is waiting for your approval",
                    submission.id.short()
                ),
                submission_id: submission.id.clone(),
            },
        });

        if let Ok(Some(user)) = self.directory.find_user(&approver_id).await {
            self.effects.publish(Effect::Email(EmailMessage {
                recipients: vec![user.email],
                subject: format!("Approval requested: submission {}", submission.id.short()),
                body: format!(
                    "Submission {} requires your approval at step {}.",
                    submission.id.short(),
                    index + 1
                ),
                submission_id: submission.id.clone(),
            }));
        }
    }

    /// Status-change fan-out to the submitter and the acting approver.
    async fn push_status_change(&self, submission: &FormSubmission, acting_user_id: &UserId) {
        let notification = Notification {
            kind: NotificationKind::StatusChange,
            title: format!("Submission {}", submission.status),
            message: format!(
                "Submission {} is now {}",
                submission.id.short(),
                submission.status
            ),
            submission_id: submission.id.clone(),
        };

        let mut recipients = vec![submission.submitter_id.clone()];
        if acting_user_id != &submission.submitter_id {
            recipients.push(acting_user_id.clone());
        }

        let mut addresses = Vec::new();
        for user_id in &recipients {
            self.effects.publish(Effect::Notify {
                user_id: user_id.clone(),
                notification: notification.clone(),
            });
            if let Ok(Some(user)) = self.directory.find_user(user_id).await {
                addresses.push(user.email);
            }
        }
        if !addresses.is_empty() {
            self.effects.publish(Effect::Email(EmailMessage {
                recipients: addresses,
                subject: format!(
                    "Submission {} is now {}",
                    submission.id.short(),
                    submission.status
                ),
                body: notification.message.clone(),
                submission_id: submission.id.clone(),
            }));
        }
    }
}

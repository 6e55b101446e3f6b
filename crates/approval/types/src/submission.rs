//! Form submissions: one instance of a filled form progressing through
//! its template's bound workflow.
//!
//! The submission aggregate exclusively owns its execution record
//! (`workflow_instance`) and its audit trail (`approval_history`). All
//! mutation goes through the semantic methods here; every per-step
//! access is bounds-checked, and history is append-only.

use crate::{
    ApprovalError, ApprovalResult, StepId, SubmissionId, TemplateId, UserId,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

// ── Status enums ─────────────────────────────────────────────────────

/// Lifecycle status of a submission
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionStatus {
    /// Created but not yet routed
    #[default]
    Draft,
    /// Waiting on the current step's approver
    Pending,
    /// Every step approved (terminal)
    Approved,
    /// Rejected at some step (terminal)
    Rejected,
    /// An approver asked the submitter for changes; control returns to
    /// the submitter out-of-band
    FeedbackRequested,
}

impl SubmissionStatus {
    /// Terminal states admit no further actions
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Approved | Self::Rejected)
    }

    /// Only drafts and rejected submissions may be deleted
    pub fn is_deletable(&self) -> bool {
        matches!(self, Self::Draft | Self::Rejected)
    }

    /// Open submissions block edits to their workflow definition
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Pending | Self::FeedbackRequested)
    }
}

impl std::fmt::Display for SubmissionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Draft => "draft",
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::FeedbackRequested => "feedback_requested",
        };
        write!(f, "{}", s)
    }
}

/// Informational priority, does not affect routing
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

/// Outcome of one instance step
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum InstanceStepStatus {
    /// Not yet reached, or currently waiting
    #[default]
    Pending,
    /// Approved and the submission ended here (final step)
    Approved,
    /// Rejected, terminating the submission
    Rejected,
    /// Feedback was requested at this step
    Feedback,
    /// Approved and the submission has moved past this step
    Completed,
}

// ── Actions ──────────────────────────────────────────────────────────

/// An action an approver can take on the current step
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewAction {
    Approve,
    Reject,
    Feedback,
}

impl ReviewAction {
    /// Feedback must always carry an explanation for the submitter
    pub fn requires_comment(&self) -> bool {
        matches!(self, Self::Feedback)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Approve => "approve",
            Self::Reject => "reject",
            Self::Feedback => "feedback",
        }
    }
}

impl std::str::FromStr for ReviewAction {
    type Err = ApprovalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "approve" => Ok(Self::Approve),
            "reject" => Ok(Self::Reject),
            "feedback" => Ok(Self::Feedback),
            other => Err(ApprovalError::Validation(format!(
                "unknown action '{}', expected approve, reject, or feedback",
                other
            ))),
        }
    }
}

/// An action recorded in the approval history
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalAction {
    Submitted,
    Approve,
    Reject,
    Feedback,
}

impl From<ReviewAction> for ApprovalAction {
    fn from(action: ReviewAction) -> Self {
        match action {
            ReviewAction::Approve => Self::Approve,
            ReviewAction::Reject => Self::Reject,
            ReviewAction::Feedback => Self::Feedback,
        }
    }
}

// ── Instance and history records ─────────────────────────────────────

/// Per-submission execution record mirroring one workflow step.
///
/// This is a snapshot taken at submission-creation time: two submissions
/// of the same workflow progress independently, and the record preserves
/// who actually acted even if the definition later changes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WorkflowInstanceStep {
    /// The definition step this record mirrors
    pub step_id: StepId,
    /// 1-based order copied from the definition at snapshot time
    pub order: u32,
    /// Outcome so far
    pub status: InstanceStepStatus,
    /// The approver resolved for (or who acted on) this step
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approver_id: Option<UserId>,
    /// When the step was approved
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approved_at: Option<DateTime<Utc>>,
    /// Comment left by the actor
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comments: Option<String>,
}

impl WorkflowInstanceStep {
    /// Seed a pending record for one definition step
    pub fn pending(step_id: StepId, order: u32, approver_id: Option<UserId>) -> Self {
        Self {
            step_id,
            order,
            status: InstanceStepStatus::Pending,
            approver_id,
            approved_at: None,
            comments: None,
        }
    }
}

/// One immutable line of the submission's audit trail
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ApprovalHistoryEntry {
    /// The step acted on; absent for the initial submission entry
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step_id: Option<StepId>,
    /// Who acted
    pub approver_id: UserId,
    /// What they did
    pub action: ApprovalAction,
    /// Optional comment
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    /// When
    pub timestamp: DateTime<Utc>,
}

// ── Form Submission ──────────────────────────────────────────────────

/// The aggregate root the approval engine operates on
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FormSubmission {
    /// Unique identifier
    pub id: SubmissionId,
    /// The template this submission was created from
    pub form_template_id: TemplateId,
    /// Who submitted the form
    pub submitter_id: UserId,
    /// Submitted field values (validated by the template, opaque here)
    pub data: HashMap<String, Value>,
    /// Lifecycle status
    pub status: SubmissionStatus,
    /// Zero-based index into the workflow's steps; meaningful only
    /// while pending or feedback-requested
    pub current_step: usize,
    /// Informational priority
    pub priority: Priority,
    /// Per-step execution records, one per workflow step
    pub workflow_instance: Vec<WorkflowInstanceStep>,
    /// Append-only audit trail
    pub approval_history: Vec<ApprovalHistoryEntry>,
    /// Optimistic concurrency guard, bumped by the store on every write
    pub version: u64,
    /// When the submission was created
    pub created_at: DateTime<Utc>,
    /// When the submission was last updated
    pub updated_at: DateTime<Utc>,
}

impl FormSubmission {
    /// Create a draft submission; the engine seeds and routes it
    pub fn new(
        form_template_id: TemplateId,
        submitter_id: UserId,
        data: HashMap<String, Value>,
        priority: Priority,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: SubmissionId::generate(),
            form_template_id,
            submitter_id,
            data,
            status: SubmissionStatus::Draft,
            current_step: 0,
            priority,
            workflow_instance: Vec::new(),
            approval_history: Vec::new(),
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Replace the execution record with the freshly-seeded snapshot
    pub fn seed_instance(&mut self, steps: Vec<WorkflowInstanceStep>) {
        self.workflow_instance = steps;
        self.touch();
    }

    /// Route the draft: status becomes pending at step 0 and the
    /// submission event is recorded.
    pub fn mark_submitted(&mut self) -> ApprovalResult<()> {
        if self.status != SubmissionStatus::Draft {
            return Err(ApprovalError::Conflict(format!(
                "submission {} is already routed ({})",
                self.id, self.status
            )));
        }
        if self.workflow_instance.is_empty() {
            return Err(ApprovalError::Validation(
                "submission has no workflow instance to route through".into(),
            ));
        }
        self.status = SubmissionStatus::Pending;
        self.current_step = 0;
        self.record_history(None, self.submitter_id.clone(), ApprovalAction::Submitted, None);
        Ok(())
    }

    // ── Step access ──────────────────────────────────────────────────

    /// The execution record for the current step, bounds-checked
    pub fn current_instance_step(&self) -> ApprovalResult<&WorkflowInstanceStep> {
        self.instance_step(self.current_step)
    }

    /// The execution record at a zero-based index, bounds-checked
    pub fn instance_step(&self, index: usize) -> ApprovalResult<&WorkflowInstanceStep> {
        self.workflow_instance
            .get(index)
            .ok_or(ApprovalError::StepOutOfBounds {
                index,
                len: self.workflow_instance.len(),
            })
    }

    fn instance_step_mut(&mut self, index: usize) -> ApprovalResult<&mut WorkflowInstanceStep> {
        let len = self.workflow_instance.len();
        self.workflow_instance
            .get_mut(index)
            .ok_or(ApprovalError::StepOutOfBounds { index, len })
    }

    /// Update the resolved approver on a step record (used when a step
    /// is re-resolved as the submission arrives at it)
    pub fn set_step_approver(
        &mut self,
        index: usize,
        approver_id: Option<UserId>,
    ) -> ApprovalResult<()> {
        let step = self.instance_step_mut(index)?;
        step.approver_id = approver_id;
        self.touch();
        Ok(())
    }

    // ── Transitions ──────────────────────────────────────────────────

    /// Record an approval of the current step.
    ///
    /// The submission stays pending; [`advance`](Self::advance) or
    /// [`finalize_approved`](Self::finalize_approved) must follow.
    pub fn record_step_approval(
        &mut self,
        approver_id: UserId,
        comment: Option<String>,
    ) -> ApprovalResult<()> {
        self.ensure_pending()?;
        let index = self.current_step;
        let step = self.instance_step_mut(index)?;
        step.status = InstanceStepStatus::Approved;
        step.approver_id = Some(approver_id.clone());
        step.approved_at = Some(Utc::now());
        step.comments = comment.clone();
        let step_id = step.step_id.clone();
        self.record_history(Some(step_id), approver_id, ApprovalAction::Approve, comment);
        Ok(())
    }

    /// Record a rejection of the current step; the submission terminates.
    pub fn record_step_rejection(
        &mut self,
        approver_id: UserId,
        comment: Option<String>,
    ) -> ApprovalResult<()> {
        self.ensure_pending()?;
        let index = self.current_step;
        let step = self.instance_step_mut(index)?;
        step.status = InstanceStepStatus::Rejected;
        step.approver_id = Some(approver_id.clone());
        step.comments = comment.clone();
        let step_id = step.step_id.clone();
        self.status = SubmissionStatus::Rejected;
        self.record_history(Some(step_id), approver_id, ApprovalAction::Reject, comment);
        Ok(())
    }

    /// Record a feedback request; control returns to the submitter
    /// out-of-band and the step does not advance.
    pub fn record_feedback_request(
        &mut self,
        approver_id: UserId,
        comment: String,
    ) -> ApprovalResult<()> {
        self.ensure_pending()?;
        let index = self.current_step;
        let step = self.instance_step_mut(index)?;
        step.status = InstanceStepStatus::Feedback;
        step.approver_id = Some(approver_id.clone());
        step.comments = Some(comment.clone());
        let step_id = step.step_id.clone();
        self.status = SubmissionStatus::FeedbackRequested;
        self.record_history(
            Some(step_id),
            approver_id,
            ApprovalAction::Feedback,
            Some(comment),
        );
        Ok(())
    }

    /// Move past an approved, non-final step. The departed step is
    /// marked completed; returns the new current index.
    pub fn advance(&mut self) -> ApprovalResult<usize> {
        let index = self.current_step;
        if index + 1 >= self.workflow_instance.len() {
            return Err(ApprovalError::Conflict(format!(
                "submission {} has no step after {}",
                self.id, index
            )));
        }
        {
            let step = self.instance_step_mut(index)?;
            if step.status != InstanceStepStatus::Approved {
                return Err(ApprovalError::Conflict(format!(
                    "cannot advance past step {} before it is approved",
                    index
                )));
            }
            step.status = InstanceStepStatus::Completed;
        }
        self.current_step = index + 1;
        self.touch();
        Ok(self.current_step)
    }

    /// Terminate as approved after the final step's approval.
    pub fn finalize_approved(&mut self) -> ApprovalResult<()> {
        let index = self.current_step;
        if index + 1 != self.workflow_instance.len() {
            return Err(ApprovalError::Conflict(format!(
                "submission {} is not at its final step",
                self.id
            )));
        }
        if self.instance_step(index)?.status != InstanceStepStatus::Approved {
            return Err(ApprovalError::Conflict(format!(
                "final step of submission {} is not approved",
                self.id
            )));
        }
        self.status = SubmissionStatus::Approved;
        self.touch();
        Ok(())
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn history_len(&self) -> usize {
        self.approval_history.len()
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn ensure_pending(&self) -> ApprovalResult<()> {
        if self.status != SubmissionStatus::Pending {
            return Err(ApprovalError::Conflict(format!(
                "submission {} is not pending ({})",
                self.id, self.status
            )));
        }
        Ok(())
    }

    fn record_history(
        &mut self,
        step_id: Option<StepId>,
        approver_id: UserId,
        action: ApprovalAction,
        comment: Option<String>,
    ) {
        self.approval_history.push(ApprovalHistoryEntry {
            step_id,
            approver_id,
            action,
            comment,
            timestamp: Utc::now(),
        });
        self.touch();
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded_submission(steps: usize) -> FormSubmission {
        let mut submission = FormSubmission::new(
            TemplateId::new("tpl-1"),
            UserId::new("alice"),
            HashMap::new(),
            Priority::Medium,
        );
        let instance = (0..steps)
            .map(|i| {
                WorkflowInstanceStep::pending(
                    StepId::new(format!("step-{}", i)),
                    (i as u32) + 1,
                    Some(UserId::new(format!("approver-{}", i))),
                )
            })
            .collect();
        submission.seed_instance(instance);
        submission.mark_submitted().unwrap();
        submission
    }

    #[test]
    fn test_submit_records_history() {
        let submission = seeded_submission(2);
        assert_eq!(submission.status, SubmissionStatus::Pending);
        assert_eq!(submission.current_step, 0);
        assert_eq!(submission.history_len(), 1);
        assert_eq!(
            submission.approval_history[0].action,
            ApprovalAction::Submitted
        );
        assert_eq!(submission.approval_history[0].approver_id, UserId::new("alice"));
    }

    #[test]
    fn test_double_submit_rejected() {
        let mut submission = seeded_submission(1);
        assert!(matches!(
            submission.mark_submitted(),
            Err(ApprovalError::Conflict(_))
        ));
    }

    #[test]
    fn test_approve_then_advance() {
        let mut submission = seeded_submission(2);
        submission
            .record_step_approval(UserId::new("approver-0"), None)
            .unwrap();
        let next = submission.advance().unwrap();
        assert_eq!(next, 1);
        assert_eq!(
            submission.workflow_instance[0].status,
            InstanceStepStatus::Completed
        );
        assert_eq!(submission.status, SubmissionStatus::Pending);
        assert_eq!(submission.history_len(), 2);
    }

    #[test]
    fn test_advance_requires_approval() {
        let mut submission = seeded_submission(2);
        assert!(matches!(
            submission.advance(),
            Err(ApprovalError::Conflict(_))
        ));
    }

    #[test]
    fn test_finalize_on_last_step() {
        let mut submission = seeded_submission(1);
        submission
            .record_step_approval(UserId::new("approver-0"), Some("lgtm".into()))
            .unwrap();
        submission.finalize_approved().unwrap();
        assert_eq!(submission.status, SubmissionStatus::Approved);
        assert!(submission.is_terminal());
        assert_eq!(
            submission.workflow_instance[0].status,
            InstanceStepStatus::Approved
        );
    }

    #[test]
    fn test_finalize_rejected_when_not_last() {
        let mut submission = seeded_submission(2);
        submission
            .record_step_approval(UserId::new("approver-0"), None)
            .unwrap();
        assert!(submission.finalize_approved().is_err());
    }

    #[test]
    fn test_reject_terminates() {
        let mut submission = seeded_submission(2);
        submission
            .record_step_rejection(UserId::new("approver-0"), Some("no budget".into()))
            .unwrap();
        assert_eq!(submission.status, SubmissionStatus::Rejected);
        assert_eq!(submission.current_step, 0);
        assert_eq!(
            submission.workflow_instance[0].status,
            InstanceStepStatus::Rejected
        );
    }

    #[test]
    fn test_feedback_keeps_step() {
        let mut submission = seeded_submission(2);
        submission
            .record_feedback_request(UserId::new("approver-0"), "please clarify".into())
            .unwrap();
        assert_eq!(submission.status, SubmissionStatus::FeedbackRequested);
        assert_eq!(submission.current_step, 0);
        assert!(!submission.is_terminal());
    }

    #[test]
    fn test_terminal_blocks_further_mutation() {
        let mut submission = seeded_submission(1);
        submission
            .record_step_approval(UserId::new("approver-0"), None)
            .unwrap();
        submission.finalize_approved().unwrap();

        let before = submission.history_len();
        assert!(submission
            .record_step_approval(UserId::new("approver-0"), None)
            .is_err());
        assert!(submission
            .record_step_rejection(UserId::new("approver-0"), None)
            .is_err());
        assert_eq!(submission.history_len(), before);
    }

    #[test]
    fn test_instance_step_bounds_checked() {
        let submission = seeded_submission(1);
        assert!(matches!(
            submission.instance_step(5),
            Err(ApprovalError::StepOutOfBounds { index: 5, len: 1 })
        ));
    }

    #[test]
    fn test_history_is_append_only_through_actions() {
        let mut submission = seeded_submission(3);
        let mut expected = 1;
        for i in 0..2 {
            submission
                .record_step_approval(UserId::new(format!("approver-{}", i)), None)
                .unwrap();
            expected += 1;
            assert_eq!(submission.history_len(), expected);
            submission.advance().unwrap();
        }
        submission
            .record_feedback_request(UserId::new("approver-2"), "more detail".into())
            .unwrap();
        expected += 1;
        assert_eq!(submission.history_len(), expected);
    }

    #[test]
    fn test_review_action_parsing() {
        use std::str::FromStr;
        assert_eq!(ReviewAction::from_str("approve").unwrap(), ReviewAction::Approve);
        assert_eq!(ReviewAction::from_str("REJECT").unwrap(), ReviewAction::Reject);
        assert!(ReviewAction::from_str("escalate").is_err());
        assert!(ReviewAction::Feedback.requires_comment());
        assert!(!ReviewAction::Approve.requires_comment());
    }

    #[test]
    fn test_status_predicates() {
        assert!(SubmissionStatus::Approved.is_terminal());
        assert!(SubmissionStatus::Rejected.is_terminal());
        assert!(!SubmissionStatus::Pending.is_terminal());
        assert!(SubmissionStatus::Draft.is_deletable());
        assert!(SubmissionStatus::Rejected.is_deletable());
        assert!(!SubmissionStatus::Pending.is_deletable());
        assert!(SubmissionStatus::FeedbackRequested.is_open());
    }
}

//! Error taxonomy for the approval platform.
//!
//! Every error maps to a stable, machine-checkable code via
//! [`ApprovalError::code`]; the HTTP layer derives status codes from the
//! same mapping. Unresolvable approvers are deliberately NOT an error:
//! a submission proceeds with an empty approver slot and is flagged for
//! manual resolution.

use crate::{
    DepartmentId, FieldError, RoleId, SubmissionId, TemplateId, UserId, WorkflowId,
};

/// Errors surfaced by the approval engine and its collaborators
#[derive(Debug, thiserror::Error)]
pub enum ApprovalError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("submitted data failed template validation ({} field error(s))", .0.len())]
    FieldValidation(Vec<FieldError>),

    #[error("workflow not found: {0}")]
    WorkflowNotFound(WorkflowId),

    #[error("form template not found: {0}")]
    TemplateNotFound(TemplateId),

    #[error("submission not found: {0}")]
    SubmissionNotFound(SubmissionId),

    #[error("user not found: {0}")]
    UserNotFound(UserId),

    #[error("role not found: {0}")]
    RoleNotFound(RoleId),

    #[error("department not found: {0}")]
    DepartmentNotFound(DepartmentId),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("step {index} is out of bounds for a workflow with {len} step(s)")]
    StepOutOfBounds { index: usize, len: usize },

    #[error("storage error: {0}")]
    Storage(String),
}

impl ApprovalError {
    /// Stable machine-checkable error code
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) | Self::FieldValidation(_) => "VALIDATION_ERROR",
            Self::WorkflowNotFound(_)
            | Self::TemplateNotFound(_)
            | Self::SubmissionNotFound(_)
            | Self::UserNotFound(_)
            | Self::RoleNotFound(_)
            | Self::DepartmentNotFound(_) => "NOT_FOUND",
            Self::Forbidden(_) => "FORBIDDEN",
            // A step index drifting out of bounds means the definition
            // changed under the submission; callers treat it like any
            // other lost race.
            Self::Conflict(_) | Self::StepOutOfBounds { .. } => "CONFLICT",
            Self::Storage(_) => "INTERNAL_ERROR",
        }
    }

    /// Field-level detail for validation failures, if any
    pub fn field_errors(&self) -> Option<&[FieldError]> {
        match self {
            Self::FieldValidation(errors) => Some(errors),
            _ => None,
        }
    }
}

/// Result type alias for approval operations
pub type ApprovalResult<T> = Result<T, ApprovalError>;

//! Workflow definitions: ordered approval step sequences.
//!
//! A workflow is a strictly linear list of steps. Step order is 1-based,
//! contiguous, and unique within a workflow; step *i* must fully resolve
//! before step *i+1* begins. Definitions are treated as immutable while
//! any bound submission is still open.

use crate::{ApprovalError, ApprovalResult, DepartmentId, RoleId, StepId, UserId, WorkflowId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

// ── Workflow Status ──────────────────────────────────────────────────

/// Lifecycle status of a workflow definition
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    /// Being authored, not yet routable
    #[default]
    Draft,
    /// Accepting new submissions
    Active,
    /// Retired, existing submissions may still drain
    Inactive,
}

// ── Workflow Step ────────────────────────────────────────────────────

/// One stage in a workflow definition.
///
/// The step names the role empowered to act, optionally scoped to a
/// department, and optionally bound to a single explicit approver that
/// overrides role/department resolution entirely.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WorkflowStep {
    /// Unique identifier, referenced by instance records
    pub id: StepId,
    /// 1-based position in the workflow
    pub order: u32,
    /// The role empowered to act at this step
    pub role_id: RoleId,
    /// Optional department scope for role resolution
    #[serde(skip_serializing_if = "Option::is_none")]
    pub department_id: Option<DepartmentId>,
    /// Explicit approver overriding role/department resolution
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approver_id: Option<UserId>,
    /// Informational flag, does not affect routing
    pub required: bool,
}

impl WorkflowStep {
    /// Create a step at the given 1-based position
    pub fn new(order: u32, role_id: RoleId) -> Self {
        Self {
            id: StepId::generate(),
            order,
            role_id,
            department_id: None,
            approver_id: None,
            required: true,
        }
    }

    pub fn with_department(mut self, department_id: DepartmentId) -> Self {
        self.department_id = Some(department_id);
        self
    }

    pub fn with_approver(mut self, approver_id: UserId) -> Self {
        self.approver_id = Some(approver_id);
        self
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }
}

// ── Workflow ─────────────────────────────────────────────────────────

/// A reusable, named definition of an ordered approval step sequence
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Workflow {
    /// Unique identifier
    pub id: WorkflowId,
    /// Human-readable name
    pub name: String,
    /// Description of what this workflow approves
    pub description: String,
    /// Lifecycle status
    pub status: WorkflowStatus,
    /// Ordered approval steps (1-based, contiguous, unique)
    pub steps: Vec<WorkflowStep>,
    /// When this definition was created
    pub created_at: DateTime<Utc>,
    /// When this definition was last updated
    pub updated_at: DateTime<Utc>,
}

impl Workflow {
    /// Create a new, empty draft workflow
    pub fn new(name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: WorkflowId::generate(),
            name: name.into(),
            description: String::new(),
            status: WorkflowStatus::Draft,
            steps: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn activated(mut self) -> Self {
        self.status = WorkflowStatus::Active;
        self
    }

    /// Add a step, keeping the list sorted by order.
    ///
    /// Rejects a step whose order collides with an existing one.
    pub fn add_step(&mut self, step: WorkflowStep) -> ApprovalResult<()> {
        if self.steps.iter().any(|s| s.order == step.order) {
            return Err(ApprovalError::Validation(format!(
                "duplicate step order {} in workflow '{}'",
                step.order, self.name
            )));
        }
        self.steps.push(step);
        self.steps.sort_by_key(|s| s.order);
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Validate the structural invariants of the step list.
    ///
    /// Orders must be 1-based, contiguous, and unique, and the workflow
    /// must carry at least one step.
    pub fn validate(&self) -> ApprovalResult<()> {
        if self.name.trim().is_empty() {
            return Err(ApprovalError::Validation(
                "workflow name must not be empty".into(),
            ));
        }
        if self.steps.is_empty() {
            return Err(ApprovalError::Validation(format!(
                "workflow '{}' must have at least one step",
                self.name
            )));
        }

        let mut seen = HashSet::new();
        for step in &self.steps {
            if !seen.insert(step.order) {
                return Err(ApprovalError::Validation(format!(
                    "duplicate step order {} in workflow '{}'",
                    step.order, self.name
                )));
            }
        }
        let mut orders: Vec<u32> = self.steps.iter().map(|s| s.order).collect();
        orders.sort_unstable();
        for (i, order) in orders.iter().enumerate() {
            if *order != (i as u32) + 1 {
                return Err(ApprovalError::Validation(format!(
                    "step orders in workflow '{}' must be contiguous starting at 1, found {}",
                    self.name, order
                )));
            }
        }

        // Duplicate step ids would corrupt instance records
        let ids: HashSet<&StepId> = self.steps.iter().map(|s| &s.id).collect();
        if ids.len() != self.steps.len() {
            return Err(ApprovalError::Validation(format!(
                "duplicate step id in workflow '{}'",
                self.name
            )));
        }

        Ok(())
    }

    /// Get a step by zero-based index (steps are kept sorted by order)
    pub fn step_at(&self, index: usize) -> Option<&WorkflowStep> {
        self.steps.get(index)
    }

    /// Number of steps
    pub fn step_count(&self) -> usize {
        self.steps.len()
    }

    /// Whether the zero-based index names the final step
    pub fn is_last_step(&self, index: usize) -> bool {
        !self.steps.is_empty() && index == self.steps.len() - 1
    }

    pub fn is_active(&self) -> bool {
        self.status == WorkflowStatus::Active
    }
}

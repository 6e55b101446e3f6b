//! Approver resolution: mapping a workflow step to concrete user(s).
//!
//! Resolution order:
//! 1. An explicit approver bound to the step wins outright.
//! 2. Otherwise, candidates are the active users holding the step's
//!    role, scoped to the step's department if it names one, else to the
//!    submitter's department (the default policy), else unscoped.
//! 3. Among multiple candidates the selection policy picks one. The
//!    policy is a pure function of the (normalized, id-sorted) candidate
//!    set so tests can assert membership even when the pick randomizes.
//!
//! Zero candidates is NOT an error: the step proceeds with no approver
//! and is flagged for manual resolution.

use crate::DirectoryLookup;
use approval_types::{ApprovalResult, DepartmentId, User, UserId, WorkflowStep};
use rand::Rng;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

// ── Selection policies ───────────────────────────────────────────────

/// Picks one approver out of a normalized candidate set
pub trait SelectionPolicy: Send + Sync {
    fn select(&self, candidates: &[User]) -> Option<UserId>;
}

/// Uniform random pick among candidates (reference behavior)
pub struct UniformRandom;

impl SelectionPolicy for UniformRandom {
    fn select(&self, candidates: &[User]) -> Option<UserId> {
        if candidates.is_empty() {
            return None;
        }
        let index = rand::thread_rng().gen_range(0..candidates.len());
        Some(candidates[index].id.clone())
    }
}

/// Deterministic pick: lowest user id wins. Used by tests.
pub struct FirstById;

impl SelectionPolicy for FirstById {
    fn select(&self, candidates: &[User]) -> Option<UserId> {
        candidates.first().map(|u| u.id.clone())
    }
}

/// Rotates through candidates across successive selections
pub struct RoundRobin {
    cursor: AtomicUsize,
}

impl RoundRobin {
    pub fn new() -> Self {
        Self {
            cursor: AtomicUsize::new(0),
        }
    }
}

impl Default for RoundRobin {
    fn default() -> Self {
        Self::new()
    }
}

impl SelectionPolicy for RoundRobin {
    fn select(&self, candidates: &[User]) -> Option<UserId> {
        if candidates.is_empty() {
            return None;
        }
        let n = self.cursor.fetch_add(1, Ordering::Relaxed);
        Some(candidates[n % candidates.len()].id.clone())
    }
}

// ── Resolver ─────────────────────────────────────────────────────────

/// Resolves the approver for a workflow step against the directory
pub struct ApproverResolver {
    directory: Arc<dyn DirectoryLookup>,
    policy: Arc<dyn SelectionPolicy>,
}

impl ApproverResolver {
    /// Resolver with the reference (uniform random) selection policy
    pub fn new(directory: Arc<dyn DirectoryLookup>) -> Self {
        Self {
            directory,
            policy: Arc::new(UniformRandom),
        }
    }

    pub fn with_policy(directory: Arc<dyn DirectoryLookup>, policy: Arc<dyn SelectionPolicy>) -> Self {
        Self { directory, policy }
    }

    /// The normalized candidate set for a step: active role holders in
    /// scope, sorted by user id.
    pub async fn candidates(
        &self,
        step: &WorkflowStep,
        submitter_department: Option<&DepartmentId>,
    ) -> ApprovalResult<Vec<User>> {
        let scope = step.department_id.as_ref().or(submitter_department);
        let mut users = self
            .directory
            .find_users_by_role_and_department(&step.role_id, scope)
            .await?;
        users.retain(|u| u.active);
        users.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(users)
    }

    /// Resolve the approver for one step.
    ///
    /// Returns `Ok(None)` when nobody qualifies; the caller proceeds
    /// with an unresolved slot rather than failing the submission.
    pub async fn resolve_step(
        &self,
        step: &WorkflowStep,
        submitter_department: Option<&DepartmentId>,
    ) -> ApprovalResult<Option<UserId>> {
        if let Some(approver) = &step.approver_id {
            return Ok(Some(approver.clone()));
        }

        let candidates = self.candidates(step, submitter_department).await?;
        if candidates.is_empty() {
            tracing::warn!(
                step_id = %step.id,
                role_id = %step.role_id,
                "no approver could be resolved; step requires manual assignment"
            );
            return Ok(None);
        }
        Ok(self.policy.select(&candidates))
    }
}

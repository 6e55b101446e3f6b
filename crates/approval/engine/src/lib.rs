//! The Approval Engine
//!
//! The state machine at the core of the platform. Given a workflow
//! definition and a form submission, it resolves who the current
//! approver is, checks that an acting user is authorized for the current
//! step, applies an action (approve / reject / request-feedback),
//! advances or terminates the submission, and publishes the side effects
//! that follow a transition.
//!
//! # Key Guarantees
//!
//! 1. **Linear progression**: N approvals drive a submission from
//!    pending at step 0 to approved at step N-1, one step per approval.
//! 2. **Terminal immutability**: approved and rejected submissions admit
//!    no further actions.
//! 3. **Single-writer discipline**: every mutation is a compare-and-swap
//!    on the submission's version; the second of two racing approvers
//!    fails with a conflict instead of silently overwriting.
//! 4. **Decoupled effects**: notifications, email, and audit entries are
//!    published after the durable write and never roll it back.

#![deny(unsafe_code)]

mod admin;
mod engine;

pub use engine::ApprovalEngine;

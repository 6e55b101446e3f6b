//! Approval Domain Types
//!
//! The shared data model for the forms-based approval platform:
//!
//! - **Workflow**: a reusable, named definition of an ordered approval
//!   step sequence. Strictly linear; step *i* resolves before *i+1*.
//! - **FormTemplate**: a reusable form definition bound to exactly one
//!   workflow, owning the field rules submitted data is checked against.
//! - **FormSubmission**: one instance of a filled form progressing
//!   through its template's workflow. The aggregate exclusively owns its
//!   per-step execution records and its append-only approval history.
//! - **Directory DTOs**: the narrow read-side view of users, roles, and
//!   departments managed by the external directory collaborator.
//!
//! # Design Principles
//!
//! 1. Submissions snapshot their workflow at creation time. Definition
//!    edits never rewrite in-flight execution records.
//! 2. Per-step state is addressed through bounds-checked accessors,
//!    never raw indexing.
//! 3. History is append-only and written only by the aggregate itself.

#![deny(unsafe_code)]

mod directory;
mod errors;
mod ids;
mod submission;
mod template;
mod workflow;

pub use directory::*;
pub use errors::*;
pub use ids::*;
pub use submission::*;
pub use template::*;
pub use workflow::*;

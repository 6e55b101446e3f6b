//! Directory Resolution for the Approval Platform
//!
//! Maps a workflow step's `(role, department?, approver?)` binding to
//! concrete user(s) via the external directory, behind a narrow
//! [`DirectoryLookup`] contract. Multi-candidate selection is pluggable
//! through [`SelectionPolicy`]; the reference policy picks uniformly at
//! random among active candidates.

#![deny(unsafe_code)]

mod lookup;
mod memory;
mod resolver;

pub use lookup::DirectoryLookup;
pub use memory::InMemoryDirectory;
pub use resolver::{ApproverResolver, FirstById, RoundRobin, SelectionPolicy, UniformRandom};

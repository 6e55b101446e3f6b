//! Shared application state.

use approval_engine::ApprovalEngine;
use std::sync::Arc;

/// State handed to every request handler
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<ApprovalEngine>,
}

impl AppState {
    pub fn new(engine: Arc<ApprovalEngine>) -> Self {
        Self { engine }
    }
}

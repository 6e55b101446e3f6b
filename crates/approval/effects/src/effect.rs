//! Effect intents emitted by the approval engine.
//!
//! An intent describes a side effect without performing it. The engine
//! writes intents after a durable state transition; delivery happens
//! elsewhere and is allowed to fail without touching the transition.

use approval_types::{SubmissionId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// What a notification is about
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    /// A step is waiting on the recipient
    ApprovalRequest,
    /// A submission the recipient cares about changed state
    StatusChange,
}

/// An in-app notification intent
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub submission_id: SubmissionId,
}

/// An email intent
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EmailMessage {
    /// Recipient addresses
    pub recipients: Vec<String>,
    pub subject: String,
    pub body: String,
    pub submission_id: SubmissionId,
}

/// A system audit-log intent (persistence is an external collaborator)
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
    /// Who caused the event
    pub actor: UserId,
    /// Machine-readable action name, e.g. `submission.approve`
    pub action: String,
    pub resource_type: String,
    pub resource_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub old_data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_data: Option<Value>,
    pub description: String,
    pub timestamp: DateTime<Utc>,
}

impl AuditEvent {
    pub fn new(
        actor: UserId,
        action: impl Into<String>,
        resource_type: impl Into<String>,
        resource_id: impl Into<String>,
    ) -> Self {
        Self {
            actor,
            action: action.into(),
            resource_type: resource_type.into(),
            resource_id: resource_id.into(),
            old_data: None,
            new_data: None,
            description: String::new(),
            timestamp: Utc::now(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_old_data(mut self, data: Value) -> Self {
        self.old_data = Some(data);
        self
    }

    pub fn with_new_data(mut self, data: Value) -> Self {
        self.new_data = Some(data);
        self
    }
}

/// One queued side effect
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Effect {
    Notify {
        user_id: UserId,
        notification: Notification,
    },
    Email(EmailMessage),
    Audit(AuditEvent),
}

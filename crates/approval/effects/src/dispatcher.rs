//! The delivery boundary: notification storage, email gateway, and the
//! system audit log are all external collaborators behind this trait.

use crate::{AuditEvent, Effect, EmailMessage, Notification};
use approval_types::UserId;
use async_trait::async_trait;
use thiserror::Error;

/// Delivery failure at the dispatch boundary. Always caught and logged,
/// never propagated into the transition that produced the effect.
#[derive(Debug, Error)]
pub enum EffectsError {
    #[error("delivery failed: {0}")]
    Delivery(String),
}

/// Fan-out target for effect intents. Each call is independent and
/// best-effort.
#[async_trait]
pub trait EffectsDispatcher: Send + Sync {
    /// Store an in-app notification for a user.
    async fn notify(&self, user_id: &UserId, notification: &Notification)
        -> Result<(), EffectsError>;

    /// Send an email.
    async fn send_email(&self, email: &EmailMessage) -> Result<(), EffectsError>;

    /// Record a system audit event.
    async fn audit(&self, event: &AuditEvent) -> Result<(), EffectsError>;
}

/// Dispatcher that only logs; the default when no collaborator is wired.
pub struct LoggingDispatcher;

#[async_trait]
impl EffectsDispatcher for LoggingDispatcher {
    async fn notify(
        &self,
        user_id: &UserId,
        notification: &Notification,
    ) -> Result<(), EffectsError> {
        tracing::info!(
            user_id = %user_id,
            submission_id = %notification.submission_id,
            kind = ?notification.kind,
            "notification: {}",
            notification.title
        );
        Ok(())
    }

    async fn send_email(&self, email: &EmailMessage) -> Result<(), EffectsError> {
        tracing::info!(
            recipients = email.recipients.len(),
            submission_id = %email.submission_id,
            "email: {}",
            email.subject
        );
        Ok(())
    }

    async fn audit(&self, event: &AuditEvent) -> Result<(), EffectsError> {
        tracing::info!(
            actor = %event.actor,
            action = %event.action,
            resource = %event.resource_id,
            "audit: {}",
            event.description
        );
        Ok(())
    }
}

/// Test dispatcher that records every delivered effect in order.
#[derive(Default)]
pub struct RecordingDispatcher {
    recorded: std::sync::Mutex<Vec<Effect>>,
}

impl RecordingDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything delivered so far, in delivery order.
    pub fn recorded(&self) -> Vec<Effect> {
        self.recorded.lock().map(|g| g.clone()).unwrap_or_default()
    }

    fn record(&self, effect: Effect) {
        if let Ok(mut guard) = self.recorded.lock() {
            guard.push(effect);
        }
    }
}

#[async_trait]
impl EffectsDispatcher for RecordingDispatcher {
    async fn notify(
        &self,
        user_id: &UserId,
        notification: &Notification,
    ) -> Result<(), EffectsError> {
        self.record(Effect::Notify {
            user_id: user_id.clone(),
            notification: notification.clone(),
        });
        Ok(())
    }

    async fn send_email(&self, email: &EmailMessage) -> Result<(), EffectsError> {
        self.record(Effect::Email(email.clone()));
        Ok(())
    }

    async fn audit(&self, event: &AuditEvent) -> Result<(), EffectsError> {
        self.record(Effect::Audit(event.clone()));
        Ok(())
    }
}

//! Outbox-style effects queue.
//!
//! The engine never talks to the dispatcher directly: it publishes
//! intents into the queue after a durable state transition, and the
//! executor drains them. A failed delivery is logged and dropped; the
//! transition that produced it is already committed and stays committed.

use crate::{Effect, EffectsDispatcher};
use approval_types::UserId;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Producer half held by the engine.
#[derive(Clone)]
pub struct EffectsQueue {
    tx: mpsc::UnboundedSender<Effect>,
}

impl EffectsQueue {
    /// Enqueue one effect. Fire-and-forget: a closed queue is logged,
    /// never surfaced to the caller.
    pub fn publish(&self, effect: Effect) {
        if self.tx.send(effect).is_err() {
            tracing::warn!("effects queue closed; dropping effect");
        }
    }
}

/// Consumer half that drains intents into a dispatcher.
pub struct EffectsExecutor {
    rx: mpsc::UnboundedReceiver<Effect>,
    dispatcher: Arc<dyn EffectsDispatcher>,
}

impl EffectsExecutor {
    /// Build a connected queue/executor pair.
    pub fn channel(dispatcher: Arc<dyn EffectsDispatcher>) -> (EffectsQueue, EffectsExecutor) {
        let (tx, rx) = mpsc::unbounded_channel();
        (EffectsQueue { tx }, EffectsExecutor { rx, dispatcher })
    }

    /// Drain until every producer has dropped its queue handle.
    pub async fn run(mut self) {
        while let Some(effect) = self.rx.recv().await {
            self.dispatch_one(effect).await;
        }
    }

    /// Run on a background task.
    pub fn spawn(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Synchronously drain whatever is queued right now. Used by tests
    /// and by callers that prefer in-line delivery.
    pub async fn drain_now(&mut self) {
        while let Ok(effect) = self.rx.try_recv() {
            self.dispatch_one(effect).await;
        }
    }

    async fn dispatch_one(&self, effect: Effect) {
        let outcome = match &effect {
            Effect::Notify {
                user_id,
                notification,
            } => self.dispatcher.notify(user_id, notification).await,
            Effect::Email(email) => self.dispatcher.send_email(email).await,
            Effect::Audit(event) => self.dispatcher.audit(event).await,
        };
        if let Err(err) = outcome {
            tracing::warn!(error = %err, "effect delivery failed; dropping");
        }
    }
}

/// Shorthand for the notify intent the engine emits most often.
pub fn notify_effect(user_id: UserId, notification: crate::Notification) -> Effect {
    Effect::Notify {
        user_id,
        notification,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        AuditEvent, EffectsError, EmailMessage, Notification, NotificationKind,
        RecordingDispatcher,
    };
    use approval_types::SubmissionId;
    use async_trait::async_trait;

    fn sample_notification() -> Notification {
        Notification {
            kind: NotificationKind::ApprovalRequest,
            title: "Approval needed".into(),
            message: "waiting on you".into(),
            submission_id: SubmissionId::new("s-1"),
        }
    }

    #[tokio::test]
    async fn test_executor_delivers_in_order() {
        let recorder = Arc::new(RecordingDispatcher::new());
        let (queue, mut executor) = EffectsExecutor::channel(recorder.clone());

        queue.publish(notify_effect(UserId::new("bob"), sample_notification()));
        queue.publish(Effect::Audit(AuditEvent::new(
            UserId::new("bob"),
            "submission.approve",
            "submission",
            "s-1",
        )));
        executor.drain_now().await;

        let recorded = recorder.recorded();
        assert_eq!(recorded.len(), 2);
        assert!(matches!(recorded[0], Effect::Notify { .. }));
        assert!(matches!(recorded[1], Effect::Audit(_)));
    }

    #[tokio::test]
    async fn test_run_until_queue_closed() {
        let recorder = Arc::new(RecordingDispatcher::new());
        let (queue, executor) = EffectsExecutor::channel(recorder.clone());
        let handle = executor.spawn();

        queue.publish(Effect::Email(EmailMessage {
            recipients: vec!["bob@example.com".into()],
            subject: "Approval needed".into(),
            body: "A submission is waiting".into(),
            submission_id: SubmissionId::new("s-1"),
        }));
        drop(queue);
        handle.await.unwrap();

        assert_eq!(recorder.recorded().len(), 1);
    }

    struct FailingDispatcher;

    #[async_trait]
    impl EffectsDispatcher for FailingDispatcher {
        async fn notify(
            &self,
            _user_id: &UserId,
            _notification: &Notification,
        ) -> Result<(), EffectsError> {
            Err(EffectsError::Delivery("smtp down".into()))
        }

        async fn send_email(&self, _email: &EmailMessage) -> Result<(), EffectsError> {
            Err(EffectsError::Delivery("smtp down".into()))
        }

        async fn audit(&self, _event: &AuditEvent) -> Result<(), EffectsError> {
            Err(EffectsError::Delivery("audit sink down".into()))
        }
    }

    #[tokio::test]
    async fn test_delivery_failure_is_swallowed() {
        let (queue, mut executor) = EffectsExecutor::channel(Arc::new(FailingDispatcher));
        queue.publish(notify_effect(UserId::new("bob"), sample_notification()));
        // Must not panic or error; the failure is logged and dropped.
        executor.drain_now().await;
    }

    #[tokio::test]
    async fn test_publish_after_executor_dropped() {
        let (queue, executor) = EffectsExecutor::channel(Arc::new(RecordingDispatcher::new()));
        drop(executor);
        // Fire-and-forget even when nobody is listening.
        queue.publish(notify_effect(UserId::new("bob"), sample_notification()));
    }
}

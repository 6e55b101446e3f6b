//! Effects Fan-out for the Approval Platform
//!
//! Every approval transition emits side effects: in-app notifications,
//! email alerts, and system audit entries. Delivery is best-effort and
//! deliberately decoupled from the transition's durability - the engine
//! publishes [`Effect`] intents into an [`EffectsQueue`], and an
//! [`EffectsExecutor`] drains them into an [`EffectsDispatcher`]. A
//! delivery failure is logged and dropped; it never rolls back state.

#![deny(unsafe_code)]

mod dispatcher;
mod effect;
mod queue;

pub use dispatcher::{EffectsDispatcher, EffectsError, LoggingDispatcher, RecordingDispatcher};
pub use effect::{AuditEvent, Effect, EmailMessage, Notification, NotificationKind};
pub use queue::{notify_effect, EffectsExecutor, EffectsQueue};

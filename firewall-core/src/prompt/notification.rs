//! A single outstanding prompt notification.

use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::broadcast;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Action {
    pub id: String,
    pub text: String,
}

impl Action {
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self { id: id.into(), text: text.into() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationType {
    Prompt,
}

/// A notification installed in the registry. Multiple deciders coalesced on
/// the same decision key each hold a clone of the same `Arc<Notification>`
/// and subscribe independently to its response broadcast — exactly one
/// decider installs the notification, the rest observe its outcome.
pub struct Notification {
    pub id: String,
    pub message: String,
    pub notif_type: NotificationType,
    pub available_actions: Vec<Action>,
    pub expires_unix: i64,
    responses: broadcast::Sender<String>,
    cancelled: AtomicBool,
}

impl Notification {
    pub fn new(
        id: impl Into<String>,
        message: impl Into<String>,
        available_actions: Vec<Action>,
        expires_unix: i64,
    ) -> Self {
        let (responses, _) = broadcast::channel(8);
        Self {
            id: id.into(),
            message: message.into(),
            notif_type: NotificationType::Prompt,
            available_actions,
            expires_unix,
            responses,
            cancelled: AtomicBool::new(false),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<String> {
        self.responses.subscribe()
    }

    /// Delivers the user's chosen action id to every waiting decider. A real
    /// notification delivery UI is the caller; this crate never originates
    /// a response itself.
    pub fn respond(&self, action_id: impl Into<String>) {
        let _ = self.responses.send(action_id.into());
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

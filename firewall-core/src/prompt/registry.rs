//! The notification registry: install-or-join coalescing for concurrent
//! deciders racing on the same decision key.

use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use super::notification::Notification;

/// Contract a notification store must satisfy.
/// `install_or_join` is the compare-and-install primitive needed for
/// directly: exactly one caller gets `true` (installed), every other
/// concurrent caller for the same `id` gets `false` (joined) and the
/// winner's handle.
pub trait NotificationAdapter: Send + Sync {
    fn get(&self, id: &str) -> Option<Arc<Notification>>;
    fn install_or_join(&self, id: &str, notification: Notification) -> (Arc<Notification>, bool);
    fn remove(&self, id: &str);
}

#[derive(Default)]
pub struct DashMapRegistry {
    notifications: DashMap<String, Arc<Notification>>,
}

impl DashMapRegistry {
    pub fn new() -> Self {
        Self::default()
    }
}

impl NotificationAdapter for DashMapRegistry {
    fn get(&self, id: &str) -> Option<Arc<Notification>> {
        self.notifications.get(id).map(|entry| entry.value().clone())
    }

    fn install_or_join(&self, id: &str, notification: Notification) -> (Arc<Notification>, bool) {
        match self.notifications.entry(id.to_string()) {
            Entry::Occupied(occupied) => (occupied.get().clone(), false),
            Entry::Vacant(vacant) => {
                let handle = Arc::new(notification);
                vacant.insert(handle.clone());
                (handle, true)
            }
        }
    }

    fn remove(&self, id: &str) {
        self.notifications.remove(id);
    }
}

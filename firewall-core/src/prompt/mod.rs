//! The interactive prompt subsystem: notifications, the coalescing
//! registry, and the coordinator that ties them to verdicts and rules.

mod coordinator;
mod notification;
mod registry;

pub use coordinator::{communication_key, link_key, PromptCoordinator};
pub use notification::{Action, Notification, NotificationType};
pub use registry::{DashMapRegistry, NotificationAdapter};

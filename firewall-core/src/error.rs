//! Internal error type for the decision core.
//!
//! Per the core's design, a failed *decision* is never an `Err` — it is a
//! [`crate::Verdict`] with a reason. `FirewallError` exists only for the
//! adapter boundary: things like a broken notification-registry invariant
//! or a persistence call that failed. The engine catches these at the call
//! site and folds them into the most restrictive verdict (`Deny`), per the
//! "unrecoverable internal errors" rule.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FirewallError {
    #[error("notification registry invariant violated for key {0}")]
    RegistryInvariant(String),

    #[error("adapter call failed: {0}")]
    Adapter(#[from] anyhow::Error),

    #[error("prompt timed out waiting for user response")]
    PromptTimeout,
}

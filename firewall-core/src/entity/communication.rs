//! The Communication entity and its verdict state machine.

use std::sync::{Arc, RwLock, Weak};

use super::domain::Domain;
use super::process::Process;
use crate::verdict::Verdict;

struct MutableState {
    verdict: Verdict,
    reason: String,
    needs_reevaluation: bool,
}

struct CommunicationInner {
    process: Process,
    domain: Domain,
    /// true = incoming.
    direction: bool,
    state: RwLock<MutableState>,
}

/// A flow aggregate keyed by `(process id, domain-or-pseudo-domain)`.
/// Cheap to clone: it's a reference-counted handle over shared, lock-guarded
/// mutable state.
#[derive(Clone)]
pub struct Communication(Arc<CommunicationInner>);

impl Communication {
    pub fn new(process: Process, domain: Domain, direction: bool) -> Self {
        Self(Arc::new(CommunicationInner {
            process,
            domain,
            direction,
            state: RwLock::new(MutableState {
                verdict: Verdict::Undecided,
                reason: String::new(),
                needs_reevaluation: false,
            }),
        }))
    }

    pub fn process(&self) -> &Process {
        &self.0.process
    }

    pub fn domain(&self) -> &Domain {
        &self.0.domain
    }

    pub fn direction(&self) -> bool {
        self.0.direction
    }

    pub fn verdict(&self) -> Verdict {
        self.0.state.read().expect("communication state poisoned").verdict
    }

    pub fn reason(&self) -> String {
        self.0.state.read().expect("communication state poisoned").reason.clone()
    }

    pub fn needs_reevaluation(&self) -> bool {
        self.0
            .state
            .read()
            .expect("communication state poisoned")
            .needs_reevaluation
    }

    pub fn request_reevaluation(&self) {
        self.0
            .state
            .write()
            .expect("communication state poisoned")
            .needs_reevaluation = true;
    }

    /// Any terminal verdict may be transitioned back to `Undecided` only by
    /// this explicit reset, invoked when `needs_reevaluation` is observed
    /// true.
    pub fn reset_verdict(&self) {
        let mut state = self.0.state.write().expect("communication state poisoned");
        state.verdict = Verdict::Undecided;
        state.reason.clear();
        state.needs_reevaluation = false;
    }

    /// Sets the verdict and reason atomically, but only if the entity is
    /// still undecided (or, for refinement, `Undeterminable`) — a stale
    /// decider observing a terminal verdict must abort without mutating
    /// state.
    fn set_verdict(&self, verdict: Verdict, reason: impl Into<String>) -> bool {
        let mut state = self.0.state.write().expect("communication state poisoned");
        if state.verdict.is_terminal() {
            return false;
        }
        state.verdict = verdict;
        state.reason = reason.into();
        true
    }

    pub fn accept(&self, reason: impl Into<String>) -> bool {
        self.set_verdict(Verdict::Accept, reason)
    }

    pub fn deny(&self, reason: impl Into<String>) -> bool {
        self.set_verdict(Verdict::Deny, reason)
    }

    pub fn block(&self, reason: impl Into<String>) -> bool {
        self.set_verdict(Verdict::Block, reason)
    }

    pub fn drop(&self, reason: impl Into<String>) -> bool {
        self.set_verdict(Verdict::Drop, reason)
    }

    pub fn mark_undeterminable(&self) -> bool {
        self.set_verdict(Verdict::Undeterminable, String::new())
    }

    /// Sets only the reason, leaving the verdict untouched — used by the
    /// prompt timeout path at Communication tier, which leaves the verdict
    /// Undecided for a later retry.
    pub fn set_reason(&self, reason: impl Into<String>) {
        self.0.state.write().expect("communication state poisoned").reason = reason.into();
    }

    /// A weak handle for the state-exposure registry, which holds weak
    /// references so it never keeps an evicted entity alive.
    pub fn downgrade(&self) -> CommunicationWeak {
        CommunicationWeak(Arc::downgrade(&self.0))
    }
}

#[derive(Clone)]
pub struct CommunicationWeak(Weak<CommunicationInner>);

impl CommunicationWeak {
    pub fn upgrade(&self) -> Option<Communication> {
        self.0.upgrade().map(Communication)
    }
}

impl std::fmt::Display for Communication {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} -> {}", self.0.process, self.0.domain)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn comm() -> Communication {
        Communication::new(Process::new(1, "/bin/app", "app", "app"), Domain::Fqdn("example.com.".into()), false)
    }

    #[test]
    fn terminal_verdict_is_stable_until_reset() {
        let c = comm();
        assert!(c.deny("no profile"));
        assert!(!c.accept("later override attempt"));
        assert_eq!(c.verdict(), Verdict::Deny);
        c.reset_verdict();
        assert_eq!(c.verdict(), Verdict::Undecided);
        assert!(c.accept("now fine"));
    }

    #[test]
    fn undeterminable_can_still_be_refined() {
        let c = comm();
        assert!(c.mark_undeterminable());
        assert!(c.accept("refined"));
        assert_eq!(c.verdict(), Verdict::Accept);
    }

    #[test]
    fn set_reason_does_not_change_verdict() {
        let c = comm();
        c.set_reason("user did not respond to prompt");
        assert_eq!(c.verdict(), Verdict::Undecided);
        assert_eq!(c.reason(), "user did not respond to prompt");
    }
}

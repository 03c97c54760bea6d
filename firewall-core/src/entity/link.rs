//! The Link entity: a single transport connection, child of a Communication.

use std::net::IpAddr;
use std::sync::{Arc, RwLock, Weak};

use super::communication::Communication;
use crate::verdict::Verdict;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Protocol {
    Tcp,
    Udp,
}

impl std::fmt::Display for Protocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Protocol::Tcp => f.write_str("tcp"),
            Protocol::Udp => f.write_str("udp"),
        }
    }
}

/// The 5-tuple key identifying a single transport connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FiveTuple {
    pub protocol: Protocol,
    pub local_ip: IpAddr,
    pub local_port: u16,
    pub remote_ip: IpAddr,
    pub remote_port: u16,
}

impl FiveTuple {
    /// The 4-tuple seen from the other side of the same connection, used
    /// for self-connection detection.
    pub fn reversed(&self) -> (IpAddr, u16, IpAddr, u16, Protocol) {
        (self.remote_ip, self.remote_port, self.local_ip, self.local_port, self.protocol)
    }
}

struct MutableState {
    verdict: Verdict,
    reason: String,
    save_when_finished: bool,
}

struct LinkInner {
    parent: Communication,
    tuple: FiveTuple,
    state: RwLock<MutableState>,
}

#[derive(Clone)]
pub struct Link(Arc<LinkInner>);

impl Link {
    pub fn new(parent: Communication, tuple: FiveTuple) -> Self {
        Self(Arc::new(LinkInner {
            parent,
            tuple,
            state: RwLock::new(MutableState {
                verdict: Verdict::Undecided,
                reason: String::new(),
                save_when_finished: false,
            }),
        }))
    }

    pub fn parent(&self) -> &Communication {
        &self.0.parent
    }

    pub fn tuple(&self) -> FiveTuple {
        self.0.tuple
    }

    pub fn verdict(&self) -> Verdict {
        self.0.state.read().expect("link state poisoned").verdict
    }

    pub fn reason(&self) -> String {
        self.0.state.read().expect("link state poisoned").reason.clone()
    }

    pub fn save_when_finished(&self) -> bool {
        self.0.state.read().expect("link state poisoned").save_when_finished
    }

    fn set_verdict(&self, verdict: Verdict, reason: impl Into<String>) -> bool {
        let mut state = self.0.state.write().expect("link state poisoned");
        if state.verdict.is_terminal() {
            return false;
        }
        state.verdict = verdict;
        state.reason = reason.into();
        state.save_when_finished = true;
        true
    }

    /// A Link inherits its parent Communication's terminal verdict rather
    /// than transitioning through the usual `set_verdict` guard, since the
    /// parent's decision is authoritative.
    pub fn inherit_parent(&self) -> bool {
        let parent_verdict = self.0.parent.verdict();
        let reason = self.0.parent.reason();
        self.set_verdict(parent_verdict, reason)
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

    pub fn downgrade(&self) -> LinkWeak {
        LinkWeak(Arc::downgrade(&self.0))
    }
}

#[derive(Clone)]
pub struct LinkWeak(Weak<LinkInner>);

impl LinkWeak {
    pub fn upgrade(&self) -> Option<Link> {
        self.0.upgrade().map(Link)
    }
}

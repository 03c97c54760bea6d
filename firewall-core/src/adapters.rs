//! Thin contracts for everything the decision core treats as an external
//! collaborator: process discovery, DNS resolution, the active
//! security level, and profile persistence. None of these are owned by
//! this crate; it only documents and consumes them.
//!
//! These are injected adapter handles — never static global state.

use std::net::IpAddr;

use crate::dns::RRCache;
use crate::entity::{Process, Protocol};

/// Process discovery and self-connection resolution.
pub trait ProcessAdapter: Send + Sync {
    fn get_process_from_pid(&self, pid: i32) -> Option<Process>;

    /// Resolves the process on the other end of a connection from the
    /// reverse 4-tuple — used by H5's self-connection detection.
    fn get_pid_by_endpoints(
        &self,
        remote_ip: IpAddr,
        remote_port: u16,
        local_ip: IpAddr,
        local_port: u16,
        protocol: Protocol,
    ) -> Option<i32>;

    fn get_or_find_primary_process(&self, pid: i32) -> Option<Process>;
}

/// DNS resolution. The decision core never calls
/// this itself — H2/H3 are handed an already-resolved [`RRCache`] — but the
/// contract is documented here so a driver (the CLI, or an integration test)
/// has a testable shape to implement against.
pub trait ResolverAdapter: Send + Sync {
    /// Resolve `fqdn`. Expected behavior (documented, not enforced by this
    /// trait): consult a persistent cache keyed by `(fqdn, qtype)` and
    /// return immediately if fresh; on a stale TTL, return the stale value
    /// and trigger a background refresh; de-duplicate concurrent identical
    /// queries via a keyed mutex; randomize answer order before returning;
    /// route by domain scope to local/mDNS/special/global resolvers per RFC
    /// 6761/6762/7686; mark failing resolvers with a cooldown
    /// (`nameserver_retry_rate`) and try the next; skip resolver transports
    /// disallowed at the current security level.
    fn resolve(&self, fqdn: &str, qtype: &str, security_level: u8) -> Option<RRCache>;
}

/// The active security level and its monotone filtering predicates.
/// Higher levels enable strictly more restriction.
pub trait StatusAdapter: Send + Sync {
    fn active_security_level(&self) -> u8;

    fn filter_dns_by_scope(&self, level: u8) -> bool;
    fn filter_dns_by_profile(&self, level: u8) -> bool;

    /// Resolver-tier predicates, documented for completeness; not
    /// consulted by the decision core itself since resolver transport
    /// selection is out of scope for this crate.
    fn do_not_use_multicast_dns(&self, level: u8) -> bool;
    fn do_not_resolve_special_domains(&self, level: u8) -> bool;
    fn do_not_use_insecure_protocols(&self, level: u8) -> bool;
    fn do_not_use_assigned_nameservers(&self, level: u8) -> bool;
}

/// A simple table-driven [`StatusAdapter`] with level thresholds chosen to
/// be monotone non-decreasing, as the contract requires.
pub struct DefaultStatusAdapter {
    pub current_level: u8,
}

impl DefaultStatusAdapter {
    pub fn new(current_level: u8) -> Self {
        Self { current_level }
    }
}

impl StatusAdapter for DefaultStatusAdapter {
    fn active_security_level(&self) -> u8 {
        self.current_level
    }

    fn filter_dns_by_scope(&self, level: u8) -> bool {
        level >= 1
    }

    fn filter_dns_by_profile(&self, level: u8) -> bool {
        level >= 2
    }

    fn do_not_use_multicast_dns(&self, level: u8) -> bool {
        level >= 2
    }

    fn do_not_resolve_special_domains(&self, level: u8) -> bool {
        level >= 3
    }

    fn do_not_use_insecure_protocols(&self, level: u8) -> bool {
        level >= 1
    }

    fn do_not_use_assigned_nameservers(&self, level: u8) -> bool {
        level >= 3
    }
}

/// Fire-and-forget persistence of a mutated user profile. The decider
/// never awaits this; a real adapter spawns the write and returns
/// immediately.
pub trait ProfilePersistence: Send + Sync {
    fn save(&self, profile_name: &str, reason: &str);
}

/// A persistence adapter that does nothing, for tests and for drivers that
/// don't yet own storage.
pub struct NoopPersistence;

impl ProfilePersistence for NoopPersistence {
    fn save(&self, _profile_name: &str, _reason: &str) {}
}

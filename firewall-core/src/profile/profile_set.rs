//! `ProfileSet` — the assembled policy for one process, and the structural
//! enforcement of the `ProfileSet -> UserProfile` lock order.

use std::net::IpAddr;
use std::sync::{Mutex, MutexGuard, RwLock, RwLockWriteGuard};

use super::capability::Capability;
use super::mode::ProfileMode;
use super::permission::{match_domain, match_endpoint, EndpointPermission, Match, RuleKind};
use super::user_profile::UserProfile;

#[derive(Debug, Clone)]
struct ProfileState {
    capabilities: Vec<Capability>,
    mode: ProfileMode,
    security_level: u8,
}

/// The union of rules governing one process.
///
/// `user_profile`'s mutex is private: the only way to obtain a
/// [`MutexGuard<UserProfile>`] from outside this module is through
/// [`ProfileSet::lock`], which first takes `state`'s write lock. This makes
/// the reverse lock order (`UserProfile` before `ProfileSet`) impossible to
/// express rather than merely disciplined.
pub struct ProfileSet {
    state: RwLock<ProfileState>,
    user_profile: Mutex<UserProfile>,
}

/// Held while the caller performs a read-then-mutate sequence against both
/// the profile state and the user profile (e.g. the prompt coordinator
/// appending a new [`EndpointPermission`]).
pub struct ProfileSetGuard<'a> {
    profile_set: &'a ProfileSet,
    _state: RwLockWriteGuard<'a, ProfileState>,
}

impl<'a> ProfileSetGuard<'a> {
    pub fn user_profile(&self) -> MutexGuard<'_, UserProfile> {
        self.profile_set
            .user_profile
            .lock()
            .expect("user profile mutex poisoned")
    }
}

impl ProfileSet {
    pub fn new(mode: ProfileMode, capabilities: Vec<Capability>, name: impl Into<String>) -> Self {
        Self {
            state: RwLock::new(ProfileState {
                capabilities,
                mode,
                security_level: 0,
            }),
            user_profile: Mutex::new(UserProfile::new(name)),
        }
    }

    pub fn check_flag(&self, capability: Capability) -> bool {
        self.state
            .read()
            .expect("profile state poisoned")
            .capabilities
            .contains(&capability)
    }

    pub fn profile_mode(&self) -> ProfileMode {
        self.state.read().expect("profile state poisoned").mode
    }

    pub fn security_level(&self) -> u8 {
        self.state
            .read()
            .expect("profile state poisoned")
            .security_level
    }

    /// Must be called before every consult so the active security level is
    /// current when rules are checked.
    pub fn update(&self, security_level: u8) {
        self.state.write().expect("profile state poisoned").security_level = security_level;
    }

    pub fn check_endpoint_domain(&self, fqdn: &str) -> (Match, String) {
        let _state = self.state.read().expect("profile state poisoned");
        let profile = self.user_profile.lock().expect("user profile poisoned");
        match_domain(&profile.endpoints, fqdn)
    }

    pub fn check_endpoint_ip(
        &self,
        fqdn: &str,
        ip: IpAddr,
        _protocol: u8,
        _port: u16,
        incoming: bool,
    ) -> (Match, String) {
        let _state = self.state.read().expect("profile state poisoned");
        let profile = self.user_profile.lock().expect("user profile poisoned");
        let rules = if incoming {
            &profile.service_endpoints
        } else {
            &profile.endpoints
        };
        match_endpoint(rules, fqdn, ip)
    }

    /// Acquire the `ProfileSet -> UserProfile` lock pair for a mutation
    /// sequence (see [`ProfileSetGuard`]).
    pub fn lock(&self) -> ProfileSetGuard<'_> {
        ProfileSetGuard {
            _state: self.state.write().expect("profile state poisoned"),
            profile_set: self,
        }
    }

    pub fn display_name(&self) -> String {
        self.user_profile
            .lock()
            .expect("user profile poisoned")
            .name
            .clone()
    }

    pub fn endpoint_count(&self, incoming: bool) -> usize {
        let profile = self.user_profile.lock().expect("user profile poisoned");
        if incoming {
            profile.service_endpoints.len()
        } else {
            profile.endpoints.len()
        }
    }
}

/// Translate a rule kind from an IP's address family (used by the prompt
/// coordinator when it turns a resolved answer into a persisted rule).
pub fn rule_kind_for_ip(ip: IpAddr) -> RuleKind {
    match ip {
        IpAddr::V4(_) => RuleKind::IPv4,
        IpAddr::V6(_) => RuleKind::IPv6,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[test]
    fn append_via_guard_is_visible_to_later_checks() {
        let ps = ProfileSet::new(ProfileMode::Prompt, vec![Capability::Internet], "app");
        {
            let guard = ps.lock();
            guard
                .user_profile()
                .append(false, EndpointPermission::new(RuleKind::Domain, "example.com.", true, 0));
        }
        assert_eq!(
            ps.check_endpoint_domain("example.com.").0,
            Match::Permitted
        );
    }

    #[test]
    fn security_level_update_is_visible_to_consults() {
        let ps = ProfileSet::new(ProfileMode::Whitelist, vec![], "app");
        assert_eq!(ps.security_level(), 0);
        ps.update(3);
        assert_eq!(ps.security_level(), 3);
    }

    /// `lock()` is the only way to reach a `UserProfile`, so many threads
    /// racing to append through it can never deadlock or interleave a torn
    /// write — each `ProfileSetGuard` holds the single mutex for its whole
    /// scope and the inner append is ordinary `Vec::push`.
    #[test]
    fn concurrent_appends_through_lock_never_deadlock_or_drop_rules() {
        let ps = Arc::new(ProfileSet::new(ProfileMode::Prompt, vec![Capability::Internet], "app"));
        let threads: Vec<_> = (0..16)
            .map(|i| {
                let ps = ps.clone();
                std::thread::spawn(move || {
                    let guard = ps.lock();
                    guard.user_profile().append(
                        false,
                        EndpointPermission::new(RuleKind::Domain, &format!("host{i}.example."), true, 0),
                    );
                })
            })
            .collect();
        for t in threads {
            t.join().unwrap();
        }
        let guard = ps.lock();
        assert_eq!(guard.user_profile().endpoints.len(), 16);
    }
}

//! The decision engine: the H1/H2/H4/H5 hooks over Communication/Link, and
//! the H3 DNS response filter orchestration.

use std::sync::Arc;

use tracing::{debug, instrument};

use crate::adapters::{ProcessAdapter, ProfilePersistence, StatusAdapter};
use crate::config::FirewallConfig;
use crate::dns::{self, FilterOutcome, RRCache};
use crate::entity::{Communication, Domain, Link};
use crate::prompt::{NotificationAdapter, PromptCoordinator};
use crate::profile::{Capability, Match, ProfileMode, ProfileSet};
use crate::relation;

/// The assembled decision core: configuration plus the external
/// collaborators, wired once and reused across every hook invocation.
pub struct FirewallEngine {
    config: FirewallConfig,
    process_adapter: Arc<dyn ProcessAdapter>,
    status_adapter: Arc<dyn StatusAdapter>,
    prompts: PromptCoordinator,
}

impl FirewallEngine {
    pub fn new(
        config: FirewallConfig,
        process_adapter: Arc<dyn ProcessAdapter>,
        status_adapter: Arc<dyn StatusAdapter>,
        notifications: Arc<dyn NotificationAdapter>,
        persistence: Arc<dyn ProfilePersistence>,
    ) -> Self {
        let prompts = PromptCoordinator::new(notifications, persistence, config.prompt_ttl);
        Self { config, process_adapter, status_adapter, prompts }
    }

    /// Steps 1-5 of the generic prelude: own-traffic short-circuit, Profile
    /// Set presence, and the security-level update. Shared by every hook.
    fn generic_prelude_no_capability_gate(&self, communication: &Communication) -> Prelude {
        if communication.process().pid == self.config.self_pid {
            communication.accept("");
            return Prelude::Decided;
        }
        let profile_set = match &communication.process().profile_set {
            Some(profile_set) => profile_set.clone(),
            None => {
                communication.deny("no Profile Set");
                return Prelude::Decided;
            }
        };
        profile_set.update(self.status_adapter.active_security_level());
        Prelude::Continue(profile_set)
    }

    /// The full generic prelude: steps 1-5 plus the step-6 Internet-or-LAN
    /// capability gate. H4 does not run step 6 — it uses
    /// `generic_prelude_no_capability_gate` instead and relies on the
    /// sentinel dispatch for its own capability checks.
    fn generic_prelude(&self, communication: &Communication) -> Prelude {
        let profile_set = match self.generic_prelude_no_capability_gate(communication) {
            Prelude::Decided => return Prelude::Decided,
            Prelude::Continue(profile_set) => profile_set,
        };
        if !profile_set.check_flag(Capability::Internet) && !profile_set.check_flag(Capability::LAN) {
            communication.deny("accessing Internet or LAN not permitted");
            return Prelude::Decided;
        }
        Prelude::Continue(profile_set)
    }

    /// H1 `pre-intel`.
    #[instrument(skip(self, communication), fields(pid = communication.process().pid))]
    pub fn pre_intel(&self, communication: &Communication) {
        if communication.needs_reevaluation() {
            communication.reset_verdict();
        }
        if communication.verdict().is_decided() {
            return;
        }
        let profile_set = match self.generic_prelude(communication) {
            Prelude::Decided => return,
            Prelude::Continue(profile_set) => profile_set,
        };

        let fqdn = match communication.domain().as_fqdn() {
            Some(fqdn) => fqdn,
            None => {
                communication.mark_undeterminable();
                return;
            }
        };

        let (outcome, reason) = profile_set.check_endpoint_domain(fqdn);
        match outcome {
            Match::Permitted => {
                communication.accept(format!("endpoint is whitelisted: {reason}"));
            }
            Match::Denied => {
                communication.deny(format!("endpoint is blacklisted: {reason}"));
            }
            Match::Undeterminable => {
                communication.mark_undeterminable();
            }
            Match::NoMatch => {
                if profile_set.profile_mode() == ProfileMode::Whitelist {
                    communication.deny("domain is not whitelisted");
                }
                debug!("domain has no endpoint rule, deferring to H2");
            }
        }
    }

    /// H2 `post-intel`. `rr_cache` mirrors the trigger's optional resolved
    /// answer, but the algorithm has no step that consults its contents —
    /// kept for signature parity with the trigger description.
    #[instrument(skip(self, communication, _rr_cache), fields(pid = communication.process().pid))]
    pub async fn post_intel(&self, communication: &Communication, _rr_cache: Option<&RRCache>) {
        if communication.needs_reevaluation() {
            communication.reset_verdict();
        }
        if communication.verdict().is_decided() {
            return;
        }
        let profile_set = match self.generic_prelude(communication) {
            Prelude::Decided => return,
            Prelude::Continue(profile_set) => profile_set,
        };

        let fqdn = communication.domain().as_fqdn().unwrap_or("");
        match profile_set.profile_mode() {
            ProfileMode::Whitelist => {
                communication.deny("domain is not whitelisted");
            }
            ProfileMode::Blacklist => {
                communication.accept("not blacklisted");
            }
            ProfileMode::Prompt => {
                if profile_set.check_flag(Capability::Related) {
                    if let Some(found) = relation::matches(communication, &profile_set, fqdn, self.config.relation_match_threshold) {
                        communication.accept(format!(
                            "domain is related to process: {} is related to {}",
                            found.domain_element, found.process_element
                        ));
                        return;
                    }
                }
                self.prompts.resolve_communication(communication, &profile_set, fqdn).await;
            }
        }
    }

    /// H3 `dns-filter`. Returns `None` when the response must be
    /// suppressed — the caller denies and drops it.
    #[instrument(skip(self, communication, rr_cache), fields(pid = communication.process().pid))]
    pub fn dns_filter(&self, communication: &Communication, fqdn: &str, rr_cache: &RRCache) -> Option<RRCache> {
        if communication.process().pid == self.config.self_pid {
            return Some(rr_cache.clone());
        }
        let profile_set = match &communication.process().profile_set {
            Some(profile_set) => profile_set.clone(),
            None => {
                communication.deny("blocking DNS, no Profile Set");
                return None;
            }
        };
        let level = self.status_adapter.active_security_level();
        profile_set.update(level);
        let filter_by_scope = self.status_adapter.filter_dns_by_scope(level);
        let filter_by_profile = self.status_adapter.filter_dns_by_profile(level);

        match dns::filter(rr_cache, fqdn, &profile_set, filter_by_scope, filter_by_profile) {
            FilterOutcome::Unchanged(cache) => Some(cache),
            FilterOutcome::Filtered(cache) => Some(cache),
            FilterOutcome::Suppressed => {
                communication.deny("no addresses returned for this domain are permitted");
                None
            }
        }
    }

    /// H4 `comm-first-packet`.
    #[instrument(skip(self, communication), fields(pid = communication.process().pid))]
    pub async fn first_packet(&self, communication: &Communication) {
        if communication.needs_reevaluation() && communication.domain().as_fqdn().is_some() {
            self.pre_intel(communication);
            self.post_intel(communication, None).await;
            return;
        }
        if communication.verdict().is_decided() {
            return;
        }
        let profile_set = match self.generic_prelude_no_capability_gate(communication) {
            Prelude::Decided => return,
            Prelude::Continue(profile_set) => profile_set,
        };

        match communication.domain() {
            Domain::IncomingHost => {
                if !(profile_set.check_flag(Capability::Service) && profile_set.check_flag(Capability::Localhost)) {
                    communication.block("serving localhost not allowed");
                }
            }
            Domain::IncomingLAN => {
                if !(profile_set.check_flag(Capability::Service) && profile_set.check_flag(Capability::LAN)) {
                    communication.deny("incoming LAN not permitted");
                }
            }
            Domain::IncomingInternet => {
                if !(profile_set.check_flag(Capability::Service) && profile_set.check_flag(Capability::Internet)) {
                    communication.deny("incoming Internet not permitted");
                }
            }
            Domain::IncomingInvalid => {
                communication.drop("invalid IP address");
            }
            // PeerHost is exempt from the PeerToPeer check: loopback to self
            // is not peer-to-peer.
            Domain::PeerHost => {
                if !profile_set.check_flag(Capability::Localhost) {
                    communication.block("serving localhost not allowed");
                }
            }
            Domain::PeerLAN => {
                if !(profile_set.check_flag(Capability::PeerToPeer) && profile_set.check_flag(Capability::LAN)) {
                    communication.deny("peer LAN not permitted");
                }
            }
            Domain::PeerInternet => {
                if !(profile_set.check_flag(Capability::PeerToPeer) && profile_set.check_flag(Capability::Internet)) {
                    communication.deny("peer Internet not permitted");
                }
            }
            Domain::PeerInvalid => {
                communication.deny("invalid IP address");
            }
            Domain::Fqdn(_) => {}
        }

        if !communication.verdict().is_decided() {
            communication.mark_undeterminable();
        }
    }

    /// H5 `link-first-packet`.
    #[instrument(skip(self, link), fields(pid = link.parent().process().pid))]
    pub async fn link_eval(&self, link: &Link) {
        let parent = link.parent();
        if parent.process().pid == self.config.self_pid {
            link.accept("");
            return;
        }

        let tuple = link.tuple();
        if tuple.local_ip == tuple.remote_ip {
            let (remote_ip, remote_port, local_ip, local_port, protocol) = tuple.reversed();
            if let Some(other_pid) = self
                .process_adapter
                .get_pid_by_endpoints(remote_ip, remote_port, local_ip, local_port, protocol)
            {
                if other_pid == parent.process().pid {
                    link.accept("connection to self");
                    return;
                }
            }
        }

        if parent.verdict().is_terminal() {
            link.inherit_parent();
            return;
        }

        let profile_set = match &parent.process().profile_set {
            Some(profile_set) => profile_set.clone(),
            None => {
                link.deny("no Profile Set");
                return;
            }
        };
        profile_set.update(self.status_adapter.active_security_level());
        if !profile_set.check_flag(Capability::Internet) && !profile_set.check_flag(Capability::LAN) {
            link.deny("accessing Internet or LAN not permitted");
            return;
        }

        let fqdn = parent.domain().as_fqdn().unwrap_or("");
        let remote_ip = if parent.direction() { tuple.local_ip } else { tuple.remote_ip };
        let (outcome, reason) = profile_set.check_endpoint_ip(fqdn, remote_ip, 0, tuple.remote_port, parent.direction());
        match outcome {
            Match::Permitted => {
                link.accept(reason);
                return;
            }
            Match::Denied => {
                link.deny(format!("endpoint is blacklisted: {reason}"));
                return;
            }
            Match::Undeterminable | Match::NoMatch => {}
        }

        match profile_set.profile_mode() {
            ProfileMode::Whitelist => {
                link.deny("endpoint is not whitelisted");
            }
            ProfileMode::Blacklist => {
                link.accept("not blacklisted");
            }
            ProfileMode::Prompt => {
                if profile_set.check_flag(Capability::Related) {
                    if let Some(found) = relation::matches(parent, &profile_set, fqdn, self.config.relation_match_threshold) {
                        link.accept(format!(
                            "domain is related to process: {} is related to {}",
                            found.domain_element, found.process_element
                        ));
                        return;
                    }
                }
                if parent.direction() {
                    self.prompts.resolve_link_incoming(link, &profile_set, remote_ip).await;
                } else if !fqdn.is_empty() {
                    self.prompts.resolve_link_outbound_domain(link, &profile_set, fqdn).await;
                } else {
                    self.prompts.resolve_link_outbound_by_ip(link, &profile_set, remote_ip).await;
                }
            }
        }
    }
}

enum Prelude {
    Decided,
    Continue(Arc<ProfileSet>),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::testing::FakeProcessDirectory;
    use crate::adapters::{DefaultStatusAdapter, NoopPersistence};
    use crate::entity::{Domain, Process};
    use crate::profile::ProfileMode;
    use crate::prompt::DashMapRegistry;

    fn engine(self_pid: i32) -> FirewallEngine {
        FirewallEngine::new(
            FirewallConfig::new(self_pid),
            Arc::new(FakeProcessDirectory::new()),
            Arc::new(DefaultStatusAdapter::new(0)),
            Arc::new(DashMapRegistry::new()),
            Arc::new(NoopPersistence),
        )
    }

    #[test]
    fn own_pid_traffic_is_accepted_at_pre_intel() {
        let engine = engine(1);
        let process = Process::new(1, "/bin/self", "self", "self");
        let communication = Communication::new(process, Domain::Fqdn("example.com.".into()), false);
        engine.pre_intel(&communication);
        assert_eq!(communication.verdict(), crate::verdict::Verdict::Accept);
        assert_eq!(communication.reason(), "");
    }

    #[test]
    fn whitelist_mode_denies_unmatched_domain_at_pre_intel() {
        let engine = engine(999);
        let profile_set = Arc::new(ProfileSet::new(ProfileMode::Whitelist, vec![Capability::Internet], "app"));
        let process = Process::new(42, "/bin/app", "app", "app").with_profile_set(profile_set);
        let communication = Communication::new(process, Domain::Fqdn("example.com.".into()), false);
        engine.pre_intel(&communication);
        assert_eq!(communication.verdict(), crate::verdict::Verdict::Deny);
        assert_eq!(communication.reason(), "domain is not whitelisted");
    }

    #[tokio::test]
    async fn self_connection_link_is_accepted() {
        let processes = FakeProcessDirectory::new();
        let remote: std::net::IpAddr = "127.0.0.1".parse().unwrap();
        processes.register_reverse(remote, 443, remote, 1234, 42);
        let engine = FirewallEngine::new(
            FirewallConfig::new(999),
            Arc::new(processes),
            Arc::new(DefaultStatusAdapter::new(0)),
            Arc::new(DashMapRegistry::new()),
            Arc::new(NoopPersistence),
        );

        let process = Process::new(42, "/bin/app", "app", "app");
        let communication = Communication::new(process, Domain::PeerInternet, false);
        let link = Link::new(
            communication,
            crate::entity::FiveTuple {
                protocol: crate::entity::Protocol::Tcp,
                local_ip: remote,
                local_port: 1234,
                remote_ip: remote,
                remote_port: 443,
            },
        );
        engine.link_eval(&link).await;
        assert_eq!(link.verdict(), crate::verdict::Verdict::Accept);
        assert_eq!(link.reason(), "connection to self");
    }

    #[tokio::test]
    async fn blacklist_mode_accepts_unmatched_domain_at_h2() {
        let engine = engine(999);
        let profile_set = Arc::new(ProfileSet::new(ProfileMode::Blacklist, vec![Capability::Internet], "app"));
        let process = Process::new(42, "/bin/app", "app", "app").with_profile_set(profile_set);
        let communication = Communication::new(process, Domain::Fqdn("example.com.".into()), false);
        engine.pre_intel(&communication);
        assert_eq!(communication.verdict(), crate::verdict::Verdict::Undecided);
        engine.post_intel(&communication, None).await;
        assert_eq!(communication.verdict(), crate::verdict::Verdict::Accept);
        assert_eq!(communication.reason(), "not blacklisted");
    }

    #[tokio::test]
    async fn h4_incoming_host_without_capabilities_blocks() {
        let engine = engine(999);
        let profile_set = Arc::new(ProfileSet::new(ProfileMode::Blacklist, vec![Capability::LAN], "app"));
        let process = Process::new(42, "/bin/app", "app", "app").with_profile_set(profile_set);
        let communication = Communication::new(process, Domain::IncomingHost, true);
        engine.first_packet(&communication).await;
        assert_eq!(communication.verdict(), crate::verdict::Verdict::Block);
    }

    #[tokio::test]
    async fn h4_incoming_host_with_capabilities_falls_through_undeterminable() {
        let engine = engine(999);
        let profile_set = Arc::new(ProfileSet::new(
            ProfileMode::Blacklist,
            vec![Capability::Service, Capability::Localhost],
            "app",
        ));
        let process = Process::new(42, "/bin/app", "app", "app").with_profile_set(profile_set);
        let communication = Communication::new(process, Domain::IncomingHost, true);
        engine.first_packet(&communication).await;
        assert_eq!(communication.verdict(), crate::verdict::Verdict::Undeterminable);
    }

    #[tokio::test]
    async fn h4_hit_leaves_link_to_its_own_prompt_check() {
        let engine = engine(999);
        let profile_set = Arc::new(ProfileSet::new(
            ProfileMode::Whitelist,
            vec![Capability::Service, Capability::Localhost],
            "app",
        ));
        let process = Process::new(42, "/bin/app", "app", "app").with_profile_set(profile_set);
        let communication = Communication::new(process, Domain::IncomingHost, true);
        engine.first_packet(&communication).await;
        assert_eq!(communication.verdict(), crate::verdict::Verdict::Undeterminable);

        let link = Link::new(
            communication,
            crate::entity::FiveTuple {
                protocol: crate::entity::Protocol::Tcp,
                local_ip: "10.0.0.2".parse().unwrap(),
                local_port: 443,
                remote_ip: "10.0.0.9".parse().unwrap(),
                remote_port: 51234,
            },
        );
        engine.link_eval(&link).await;
        assert_eq!(link.verdict(), crate::verdict::Verdict::Deny);
        assert_eq!(link.reason(), "endpoint is not whitelisted");
    }

    #[tokio::test]
    async fn h4_localhost_service_without_internet_or_lan_is_not_denied_by_prelude() {
        let engine = engine(999);
        let profile_set = Arc::new(ProfileSet::new(
            ProfileMode::Blacklist,
            vec![Capability::Service, Capability::Localhost],
            "app",
        ));
        let process = Process::new(42, "/bin/app", "app", "app").with_profile_set(profile_set);
        let communication = Communication::new(process, Domain::IncomingHost, true);
        engine.first_packet(&communication).await;
        assert_ne!(communication.reason(), "accessing Internet or LAN not permitted");
        assert_eq!(communication.verdict(), crate::verdict::Verdict::Undeterminable);
    }
}

use std::sync::Arc;

use firewall_core::adapters::{DefaultStatusAdapter, NoopPersistence, ProcessAdapter};
use firewall_core::config::FirewallConfig;
use firewall_core::entity::{Communication, Domain, Process, Protocol};
use firewall_core::profile::{Capability, ProfileMode, ProfileSet};
use firewall_core::prompt::DashMapRegistry;
use firewall_core::verdict::Verdict;
use firewall_core::FirewallEngine;

struct NoProcesses;

impl ProcessAdapter for NoProcesses {
    fn get_process_from_pid(&self, _pid: i32) -> Option<Process> {
        None
    }
    fn get_pid_by_endpoints(
        &self,
        _remote_ip: std::net::IpAddr,
        _remote_port: u16,
        _local_ip: std::net::IpAddr,
        _local_port: u16,
        _protocol: Protocol,
    ) -> Option<i32> {
        None
    }
    fn get_or_find_primary_process(&self, _pid: i32) -> Option<Process> {
        None
    }
}

/// Whitelist mode with no matching endpoint rule denies outright at H1,
/// without ever reaching the prompt coordinator.
#[test]
fn whitelist_mode_denies_a_domain_with_no_matching_rule() {
    let engine = FirewallEngine::new(
        FirewallConfig::new(-1),
        Arc::new(NoProcesses),
        Arc::new(DefaultStatusAdapter::new(0)),
        Arc::new(DashMapRegistry::new()),
        Arc::new(NoopPersistence),
    );

    let profile_set = Arc::new(ProfileSet::new(ProfileMode::Whitelist, vec![Capability::Internet], "app"));
    let process = Process::new(42, "/usr/bin/app", "app", "app").with_profile_set(profile_set);
    let communication = Communication::new(process, Domain::Fqdn("example.com.".into()), false);

    engine.pre_intel(&communication);

    assert_eq!(communication.verdict(), Verdict::Deny);
    assert_eq!(communication.reason(), "domain is not whitelisted");
}

use std::net::IpAddr;
use std::sync::{Arc, Mutex};

use firewall_core::adapters::{DefaultStatusAdapter, NoopPersistence, ProcessAdapter};
use firewall_core::config::FirewallConfig;
use firewall_core::entity::{Communication, Domain, FiveTuple, Link, Process, Protocol};
use firewall_core::prompt::DashMapRegistry;
use firewall_core::verdict::Verdict;
use firewall_core::FirewallEngine;

/// Resolves exactly one registered reverse four-tuple to a pid, for the
/// self-connection detection step.
#[derive(Default)]
struct ReverseLookupOnly {
    reverse: Mutex<Option<(IpAddr, u16, IpAddr, u16, i32)>>,
}

impl ReverseLookupOnly {
    fn register(&self, remote_ip: IpAddr, remote_port: u16, local_ip: IpAddr, local_port: u16, pid: i32) {
        *self.reverse.lock().unwrap() = Some((remote_ip, remote_port, local_ip, local_port, pid));
    }
}

impl ProcessAdapter for ReverseLookupOnly {
    fn get_process_from_pid(&self, _pid: i32) -> Option<Process> {
        None
    }

    fn get_pid_by_endpoints(
        &self,
        remote_ip: IpAddr,
        remote_port: u16,
        local_ip: IpAddr,
        local_port: u16,
        _protocol: Protocol,
    ) -> Option<i32> {
        let entry = self.reverse.lock().unwrap();
        match &*entry {
            Some((r_ip, r_port, l_ip, l_port, pid))
                if *r_ip == remote_ip && *r_port == remote_port && *l_ip == local_ip && *l_port == local_port =>
            {
                Some(*pid)
            }
            _ => None,
        }
    }

    fn get_or_find_primary_process(&self, _pid: i32) -> Option<Process> {
        None
    }
}

/// A link whose local and remote address are both loopback, where the
/// reverse-tuple lookup resolves to the same pid as the parent
/// Communication, is accepted as a connection to self — regardless of
/// profile, since this process has none.
#[tokio::test]
async fn loopback_link_resolving_to_the_same_pid_is_a_self_connection() {
    let processes = Arc::new(ReverseLookupOnly::default());
    let loopback: IpAddr = "127.0.0.1".parse().unwrap();
    processes.register(loopback, 443, loopback, 51234, 42);

    let engine = FirewallEngine::new(
        FirewallConfig::new(-1),
        processes,
        Arc::new(DefaultStatusAdapter::new(0)),
        Arc::new(DashMapRegistry::new()),
        Arc::new(NoopPersistence),
    );

    let process = Process::new(42, "/usr/bin/app", "app", "app");
    let communication = Communication::new(process, Domain::PeerInternet, false);
    let link = Link::new(
        communication,
        FiveTuple {
            protocol: Protocol::Tcp,
            local_ip: loopback,
            local_port: 51234,
            remote_ip: loopback,
            remote_port: 443,
        },
    );

    engine.link_eval(&link).await;

    assert_eq!(link.verdict(), Verdict::Accept);
    assert_eq!(link.reason(), "connection to self");
}

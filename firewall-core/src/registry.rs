//! Exposed state: a hierarchical read interface over live
//! Process/Communication/Link state keyed `tree/{pid}`, `tree/{pid}/{domain}`,
//! `tree/{pid}/{domain}/{linkID}`, held by weak reference so the registry
//! never keeps an evicted entity alive.

use std::sync::{Arc, Weak};

use dashmap::DashMap;

use crate::entity::{Communication, CommunicationWeak, Link, LinkWeak, Process};

#[derive(Default)]
pub struct StateRegistry {
    processes: DashMap<i32, Weak<Process>>,
    communications: DashMap<(i32, String), CommunicationWeak>,
    links: DashMap<(i32, String, String), LinkWeak>,
}

impl StateRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_process(&self, process: &Arc<Process>) {
        self.processes.insert(process.pid, Arc::downgrade(process));
    }

    pub fn register_communication(&self, communication: &Communication) {
        let key = (communication.process().pid, communication.domain().to_string());
        self.communications.insert(key, communication.downgrade());
    }

    pub fn register_link(&self, link_id: impl Into<String>, link: &Link) {
        let key = (
            link.parent().process().pid,
            link.parent().domain().to_string(),
            link_id.into(),
        );
        self.links.insert(key, link.downgrade());
    }

    pub fn process(&self, pid: i32) -> Option<Arc<Process>> {
        self.processes.get(&pid).and_then(|weak| weak.upgrade())
    }

    pub fn communication(&self, pid: i32, domain: &str) -> Option<Communication> {
        self.communications
            .get(&(pid, domain.to_string()))
            .and_then(|weak| weak.upgrade())
    }

    pub fn link(&self, pid: i32, domain: &str, link_id: &str) -> Option<Link> {
        self.links
            .get(&(pid, domain.to_string(), link_id.to_string()))
            .and_then(|weak| weak.upgrade())
    }

    /// Prefix-scan over `tree/{pid}`.
    pub fn communications_for_pid(&self, pid: i32) -> Vec<Communication> {
        self.communications
            .iter()
            .filter(|entry| entry.key().0 == pid)
            .filter_map(|entry| entry.value().upgrade())
            .collect()
    }

    /// Prefix-scan over `tree/{pid}/{domain}`.
    pub fn links_for_communication(&self, pid: i32, domain: &str) -> Vec<Link> {
        self.links
            .iter()
            .filter(|entry| entry.key().0 == pid && entry.key().1 == domain)
            .filter_map(|entry| entry.value().upgrade())
            .collect()
    }

    /// Drops entries whose weak reference no longer upgrades, keeping the
    /// registry from growing unboundedly across process/link churn.
    pub fn sweep(&self) {
        self.processes.retain(|_, weak| weak.upgrade().is_some());
        self.communications.retain(|_, weak| weak.upgrade().is_some());
        self.links.retain(|_, weak| weak.upgrade().is_some());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{Domain, FiveTuple, Protocol};

    #[test]
    fn registered_communication_is_reachable_by_key() {
        let registry = StateRegistry::new();
        let process = Process::new(1, "/bin/app", "app", "app");
        let communication = Communication::new(process, Domain::Fqdn("example.com.".into()), false);
        registry.register_communication(&communication);
        assert!(registry.communication(1, "example.com.").is_some());
        assert_eq!(registry.communications_for_pid(1).len(), 1);
    }

    #[test]
    fn dropped_communication_is_swept_away() {
        let registry = StateRegistry::new();
        let process = Process::new(1, "/bin/app", "app", "app");
        {
            let communication = Communication::new(process, Domain::Fqdn("example.com.".into()), false);
            registry.register_communication(&communication);
        }
        assert!(registry.communication(1, "example.com.").is_none());
        registry.sweep();
        assert!(registry.communications_for_pid(1).is_empty());
    }

    #[test]
    fn link_is_scoped_to_its_parent_domain() {
        let registry = StateRegistry::new();
        let process = Process::new(9, "/bin/app", "app", "app");
        let communication = Communication::new(process, Domain::PeerInternet, false);
        let link = Link::new(
            communication,
            FiveTuple {
                protocol: Protocol::Tcp,
                local_ip: "10.0.0.1".parse().unwrap(),
                local_port: 1111,
                remote_ip: "93.184.216.34".parse().unwrap(),
                remote_port: 443,
            },
        );
        registry.register_link("link-1", &link);
        let found = registry.link(9, "<peer:internet>", "link-1");
        assert!(found.is_some());
        assert_eq!(registry.links_for_communication(9, "<peer:internet>").len(), 1);
    }
}

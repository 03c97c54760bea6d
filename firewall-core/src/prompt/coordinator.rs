//! The Prompt Coordinator: one notification per decision key,
//! coalesced waiting, rule translation, and the locked append-then-persist
//! sequence.

use std::net::IpAddr;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tokio::sync::broadcast::error::RecvError;
use tokio::time::timeout;

use crate::adapters::ProfilePersistence;
use crate::entity::{Communication, Link, Protocol};
use crate::profile::{rule_kind_for_ip, EndpointPermission, ProfileSet, RuleKind};

use super::notification::{Action, Notification};
use super::registry::NotificationAdapter;

fn now_unix() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}

pub fn communication_key(pid: i32, domain: &str) -> String {
    format!("firewall-prompt-{pid}-{domain}")
}

/// All three Link-tier call sites build this key with the same formula,
/// regardless of direction or whether the flow carries an FQDN.
pub fn link_key(pid: i32, domain: &str, remote_ip: IpAddr, proto: Protocol, port: u16) -> String {
    format!("firewall-prompt-{pid}-{domain}-{remote_ip}-{proto}-{port}")
}

/// Which action set and rule-translation table applies. Carries exactly the
/// fields needed to stage a rule on `deny` or on
/// an unrecognized action id ("whatever value was pre-staged").
enum PromptKind<'a> {
    CommunicationDomain { domain: &'a str },
    LinkIncoming { ip: IpAddr },
    LinkOutboundByIp { ip: IpAddr },
    LinkOutboundWithFqdn { domain: &'a str },
}

impl<'a> PromptKind<'a> {
    fn actions(&self) -> Vec<Action> {
        match self {
            PromptKind::CommunicationDomain { .. } => vec![
                Action::new("permit-all", "Permit all of this domain"),
                Action::new("permit-distinct", "Permit this domain"),
                Action::new("deny", "Deny"),
            ],
            PromptKind::LinkIncoming { .. } => vec![
                Action::new("permit-ip-incoming", "Permit this address"),
                Action::new("deny", "Deny"),
            ],
            PromptKind::LinkOutboundByIp { .. } => vec![
                Action::new("permit-ip", "Permit this address"),
                Action::new("deny", "Deny"),
            ],
            PromptKind::LinkOutboundWithFqdn { .. } => vec![
                Action::new("permit-domain-all", "Permit all of this domain"),
                Action::new("permit-domain-distinct", "Permit this domain"),
                Action::new("deny", "Deny"),
            ],
        }
    }

    /// `true` when the winning rule belongs in `service_endpoints` rather
    /// than `endpoints`.
    fn incoming(&self) -> bool {
        matches!(self, PromptKind::LinkIncoming { .. })
    }

    fn translate(&self, action_id: &str) -> EndpointPermission {
        let now = now_unix();
        match (self, action_id) {
            (PromptKind::CommunicationDomain { domain }, "permit-all")
            | (PromptKind::LinkOutboundWithFqdn { domain }, "permit-domain-all") => {
                EndpointPermission::new(RuleKind::Domain, format!(".{domain}"), true, now)
            }
            (PromptKind::CommunicationDomain { domain }, "permit-distinct")
            | (PromptKind::LinkOutboundWithFqdn { domain }, "permit-domain-distinct") => {
                EndpointPermission::new(RuleKind::Domain, domain.to_string(), true, now)
            }
            (PromptKind::LinkIncoming { ip }, "permit-ip-incoming")
            | (PromptKind::LinkOutboundByIp { ip }, "permit-ip") => {
                EndpointPermission::new(rule_kind_for_ip(*ip), ip.to_string(), true, now)
            }
            // `deny` or anything unrecognized: still recorded, with
            // whatever value this context would have staged.
            (PromptKind::CommunicationDomain { domain }, _)
            | (PromptKind::LinkOutboundWithFqdn { domain }, _) => {
                EndpointPermission::new(RuleKind::Domain, domain.to_string(), false, now)
            }
            (PromptKind::LinkIncoming { ip }, _) | (PromptKind::LinkOutboundByIp { ip }, _) => {
                EndpointPermission::new(rule_kind_for_ip(*ip), ip.to_string(), false, now)
            }
        }
    }
}

enum Outcome {
    Action(String),
    Timeout,
}

pub struct PromptCoordinator {
    registry: Arc<dyn NotificationAdapter>,
    persistence: Arc<dyn ProfilePersistence>,
    ttl: Duration,
}

impl PromptCoordinator {
    pub fn new(
        registry: Arc<dyn NotificationAdapter>,
        persistence: Arc<dyn ProfilePersistence>,
        ttl: Duration,
    ) -> Self {
        Self { registry, persistence, ttl }
    }

    async fn install_or_join_and_wait(&self, key: &str, kind: &PromptKind<'_>) -> (Outcome, bool) {
        let notification = Notification::new(key, "firewall prompt", kind.actions(), now_unix() + self.ttl.as_secs() as i64);
        let (handle, installed) = self.registry.install_or_join(key, notification);
        let mut rx = handle.subscribe();
        let outcome = match timeout(self.ttl, rx.recv()).await {
            Ok(Ok(action_id)) => Outcome::Action(action_id),
            Ok(Err(RecvError::Closed)) | Ok(Err(RecvError::Lagged(_))) | Err(_) => Outcome::Timeout,
        };
        if installed {
            handle.cancel();
            self.registry.remove(key);
        }
        (outcome, installed)
    }

    fn apply_and_persist(&self, profile_set: &ProfileSet, incoming: bool, permission: EndpointPermission, reason: &str) {
        {
            let guard = profile_set.lock();
            guard.user_profile().append(incoming, permission);
        }
        self.persistence.save(&profile_set.display_name(), reason);
    }

    /// H2's prompt engagement.
    pub async fn resolve_communication(&self, communication: &Communication, profile_set: &ProfileSet, fqdn: &str) {
        let pid = communication.process().pid;
        let key = communication_key(pid, fqdn);
        let kind = PromptKind::CommunicationDomain { domain: fqdn };

        let (outcome, installed) = self.install_or_join_and_wait(&key, &kind).await;
        match outcome {
            Outcome::Action(action_id) => {
                let accepted = action_id == "permit-all" || action_id == "permit-distinct";
                if accepted {
                    communication.accept(format!("user permitted: {action_id}"));
                } else {
                    communication.deny("user denied");
                }
                if installed {
                    let permission = kind.translate(&action_id);
                    self.apply_and_persist(profile_set, false, permission, "prompt response");
                }
            }
            Outcome::Timeout => {
                // Communication-tier timeout leaves the verdict Undecided; a
                // later H4 retry may resolve it.
                communication.set_reason("user did not respond to prompt");
            }
        }
    }

    /// H5's prompt engagement for an incoming Link.
    pub async fn resolve_link_incoming(&self, link: &Link, profile_set: &ProfileSet, remote_ip: IpAddr) {
        self.resolve_link(link, profile_set, PromptKind::LinkIncoming { ip: remote_ip }).await
    }

    /// H5's prompt engagement for an outbound Link with no resolved FQDN.
    pub async fn resolve_link_outbound_by_ip(&self, link: &Link, profile_set: &ProfileSet, remote_ip: IpAddr) {
        self.resolve_link(link, profile_set, PromptKind::LinkOutboundByIp { ip: remote_ip }).await
    }

    /// H5's prompt engagement for an outbound Link whose Communication has a
    /// resolved FQDN.
    pub async fn resolve_link_outbound_domain(&self, link: &Link, profile_set: &ProfileSet, fqdn: &str) {
        self.resolve_link(link, profile_set, PromptKind::LinkOutboundWithFqdn { domain: fqdn }).await
    }

    async fn resolve_link(&self, link: &Link, profile_set: &ProfileSet, kind: PromptKind<'_>) {
        let tuple = link.tuple();
        let pid = link.parent().process().pid;
        let fqdn = link.parent().domain().as_fqdn().unwrap_or("");
        let remote_ip = if link.parent().direction() { tuple.local_ip } else { tuple.remote_ip };
        let key = link_key(pid, fqdn, remote_ip, tuple.protocol, tuple.remote_port);

        let (outcome, installed) = self.install_or_join_and_wait(&key, &kind).await;
        match outcome {
            Outcome::Action(action_id) => {
                let accepted = matches!(
                    action_id.as_str(),
                    "permit-ip-incoming" | "permit-ip" | "permit-domain-all" | "permit-domain-distinct"
                );
                if accepted {
                    link.accept(format!("user permitted: {action_id}"));
                } else {
                    link.deny("user denied");
                }
                if installed {
                    let permission = kind.translate(&action_id);
                    self.apply_and_persist(profile_set, kind.incoming(), permission, "prompt response");
                }
            }
            Outcome::Timeout => {
                // Link-tier timeout always resolves to Deny.
                link.deny("user did not respond to prompt");
            }
        }
    }
}

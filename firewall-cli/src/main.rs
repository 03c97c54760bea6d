//! firewall-ctl - interactive driver and smoke-test harness for the firewall
//! decision core. It wires concrete (mostly minimal) adapters around
//! [`firewall_core::FirewallEngine`] and runs a single hook invocation
//! end-to-end, printing the resulting verdict and reason.

use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use firewall_core::adapters::{DefaultStatusAdapter, NoopPersistence, ProcessAdapter};
use firewall_core::config::FirewallConfig;
use firewall_core::entity::{Communication, Domain, FiveTuple, Link, Process, Protocol};
use firewall_core::profile::{Capability, ProfileMode, ProfileSet};
use firewall_core::prompt::{communication_key, link_key, DashMapRegistry};
use firewall_core::FirewallEngine;

mod rr_cache_args;

use rr_cache_args::parse_answers;

#[derive(Parser, Debug)]
#[clap(name = "firewall-ctl", about = "Drive the firewall decision core from the command line", version)]
struct Cli {
    #[clap(subcommand)]
    command: Command,

    /// Log level for tracing output.
    #[clap(long, global = true, default_value = "warn")]
    log_level: LogLevel,
}

#[derive(Debug, Clone, ValueEnum)]
enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn directive(&self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run H1 then (if still undecided) H2 for a single outbound domain flow.
    DecideDomain {
        #[clap(long)]
        pid: i32,
        #[clap(long, default_value_t = -1)]
        self_pid: i32,
        #[clap(long)]
        fqdn: String,
        #[clap(long, value_enum)]
        mode: CliProfileMode,
        /// Comma-separated capability flags, e.g. "internet,lan,related".
        #[clap(long, default_value = "")]
        caps: String,
    },
    /// Run H5 for a single link.
    DecideLink {
        #[clap(long)]
        pid: i32,
        #[clap(long, default_value_t = -1)]
        self_pid: i32,
        #[clap(long, value_enum)]
        mode: CliProfileMode,
        #[clap(long, default_value = "")]
        caps: String,
        #[clap(long)]
        fqdn: Option<String>,
        #[clap(long, value_enum, default_value = "tcp")]
        proto: CliProtocol,
        #[clap(long)]
        local_ip: IpAddr,
        #[clap(long)]
        local_port: u16,
        #[clap(long)]
        remote_ip: IpAddr,
        #[clap(long)]
        remote_port: u16,
        #[clap(long)]
        incoming: bool,
    },
    /// Run H3 against a hand-built resolver response.
    FilterDns {
        #[clap(long)]
        fqdn: String,
        #[clap(long, default_value = "")]
        caps: String,
        /// Comma-separated IPv4/IPv6 addresses that make up the `answer` set.
        #[clap(long)]
        answers: String,
        #[clap(long, value_enum)]
        server_scope: CliScope,
        #[clap(long, default_value_t = 0)]
        security_level: u8,
    },
}

#[derive(Debug, Clone, ValueEnum)]
enum CliProfileMode {
    Whitelist,
    Blacklist,
    Prompt,
}

impl From<CliProfileMode> for ProfileMode {
    fn from(mode: CliProfileMode) -> Self {
        match mode {
            CliProfileMode::Whitelist => ProfileMode::Whitelist,
            CliProfileMode::Blacklist => ProfileMode::Blacklist,
            CliProfileMode::Prompt => ProfileMode::Prompt,
        }
    }
}

#[derive(Debug, Clone, ValueEnum)]
enum CliProtocol {
    Tcp,
    Udp,
}

impl From<CliProtocol> for Protocol {
    fn from(proto: CliProtocol) -> Self {
        match proto {
            CliProtocol::Tcp => Protocol::Tcp,
            CliProtocol::Udp => Protocol::Udp,
        }
    }
}

#[derive(Debug, Clone, ValueEnum)]
enum CliScope {
    HostLocal,
    LinkLocal,
    SiteLocal,
    Global,
}

impl From<CliScope> for firewall_core::dns::IPScope {
    fn from(scope: CliScope) -> Self {
        match scope {
            CliScope::HostLocal => firewall_core::dns::IPScope::HostLocal,
            CliScope::LinkLocal => firewall_core::dns::IPScope::LinkLocal,
            CliScope::SiteLocal => firewall_core::dns::IPScope::SiteLocal,
            CliScope::Global => firewall_core::dns::IPScope::Global,
        }
    }
}

fn parse_caps(raw: &str) -> Vec<Capability> {
    raw.split(',')
        .filter_map(|token| {
            let token = token.trim();
            match token.to_ascii_lowercase().as_str() {
                "internet" => Some(Capability::Internet),
                "lan" => Some(Capability::LAN),
                "localhost" => Some(Capability::Localhost),
                "peertopeer" | "peer-to-peer" | "p2p" => Some(Capability::PeerToPeer),
                "service" => Some(Capability::Service),
                "related" => Some(Capability::Related),
                "" => None,
                other => {
                    tracing::warn!(capability = other, "ignoring unrecognized capability flag");
                    None
                }
            }
        })
        .collect()
}

/// A minimal process directory for the CLI harness: the command line is the
/// only source of process facts, so there is nothing to look up. A daemon
/// driver would back this with the OS process/socket tables instead.
struct StaticProcessDirectory;

impl ProcessAdapter for StaticProcessDirectory {
    fn get_process_from_pid(&self, _pid: i32) -> Option<Process> {
        None
    }

    fn get_pid_by_endpoints(
        &self,
        _remote_ip: IpAddr,
        _remote_port: u16,
        _local_ip: IpAddr,
        _local_port: u16,
        _protocol: Protocol,
    ) -> Option<i32> {
        None
    }

    fn get_or_find_primary_process(&self, _pid: i32) -> Option<Process> {
        None
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(cli.log_level.directive()).context("invalid log level")?)
        .init();

    match cli.command {
        Command::DecideDomain { pid, self_pid, fqdn, mode, caps } => {
            decide_domain(pid, self_pid, fqdn, mode.into(), parse_caps(&caps)).await
        }
        Command::DecideLink {
            pid,
            self_pid,
            mode,
            caps,
            fqdn,
            proto,
            local_ip,
            local_port,
            remote_ip,
            remote_port,
            incoming,
        } => {
            decide_link(
                pid,
                self_pid,
                mode.into(),
                parse_caps(&caps),
                fqdn,
                proto.into(),
                local_ip,
                local_port,
                remote_ip,
                remote_port,
                incoming,
            )
            .await
        }
        Command::FilterDns { fqdn, caps, answers, server_scope, security_level } => {
            filter_dns(fqdn, parse_caps(&caps), parse_answers(&answers)?, server_scope.into(), security_level)
        }
    }
}

fn build_engine(self_pid: i32, registry: Arc<DashMapRegistry>) -> FirewallEngine {
    FirewallEngine::new(
        FirewallConfig::new(self_pid),
        Arc::new(StaticProcessDirectory),
        Arc::new(DefaultStatusAdapter::new(0)),
        registry,
        Arc::new(NoopPersistence),
    )
}

/// Waits for a notification to appear under `key` and resolves it from a
/// line of stdin, standing in for a real notification delivery UI.
async fn respond_from_stdin(registry: Arc<DashMapRegistry>, key: String) {
    use firewall_core::prompt::NotificationAdapter;

    for _ in 0..750 {
        if let Some(notification) = registry.get(&key) {
            println!("{}", notification.message);
            for action in &notification.available_actions {
                println!("  [{}] {}", action.id, action.text);
            }
            let mut line = String::new();
            if std::io::stdin().read_line(&mut line).is_ok() {
                notification.respond(line.trim());
            }
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

async fn decide_domain(pid: i32, self_pid: i32, fqdn: String, mode: ProfileMode, caps: Vec<Capability>) -> Result<()> {
    let registry = Arc::new(DashMapRegistry::new());
    let engine = build_engine(self_pid, registry.clone());

    let profile_set = Arc::new(ProfileSet::new(mode, caps, format!("pid {pid}")));
    let process = Process::new(pid, "", "", "").with_profile_set(profile_set);
    let communication = Communication::new(process, Domain::Fqdn(fqdn.clone()), false);

    engine.pre_intel(&communication);
    if !communication.verdict().is_decided() {
        let prompt_task = matches!(mode, ProfileMode::Prompt)
            .then(|| tokio::spawn(respond_from_stdin(registry, communication_key(pid, &fqdn))));
        engine.post_intel(&communication, None).await;
        if let Some(task) = prompt_task {
            let _ = task.await;
        }
    }

    println!("verdict: {}", communication.verdict());
    println!("reason: {}", communication.reason());
    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn decide_link(
    pid: i32,
    self_pid: i32,
    mode: ProfileMode,
    caps: Vec<Capability>,
    fqdn: Option<String>,
    proto: Protocol,
    local_ip: IpAddr,
    local_port: u16,
    remote_ip: IpAddr,
    remote_port: u16,
    incoming: bool,
) -> Result<()> {
    let registry = Arc::new(DashMapRegistry::new());
    let engine = build_engine(self_pid, registry.clone());

    let profile_set = Arc::new(ProfileSet::new(mode, caps, format!("pid {pid}")));
    let process = Process::new(pid, "", "", "").with_profile_set(profile_set);
    let domain = match &fqdn {
        Some(fqdn) => Domain::Fqdn(fqdn.clone()),
        None => Domain::PeerInternet,
    };
    let communication = Communication::new(process, domain, incoming);
    let tuple = FiveTuple { protocol: proto, local_ip, local_port, remote_ip, remote_port };
    let link = Link::new(communication, tuple);

    let prompt_task = matches!(mode, ProfileMode::Prompt).then(|| {
        let key = link_key(pid, fqdn.as_deref().unwrap_or(""), if incoming { local_ip } else { remote_ip }, proto, remote_port);
        tokio::spawn(respond_from_stdin(registry, key))
    });
    engine.link_eval(&link).await;
    if let Some(task) = prompt_task {
        let _ = task.await;
    }

    println!("verdict: {}", link.verdict());
    println!("reason: {}", link.reason());
    Ok(())
}

fn filter_dns(
    fqdn: String,
    caps: Vec<Capability>,
    answers: Vec<IpAddr>,
    server_scope: firewall_core::dns::IPScope,
    security_level: u8,
) -> Result<()> {
    let engine = FirewallEngine::new(
        FirewallConfig::new(-1),
        Arc::new(StaticProcessDirectory),
        Arc::new(DefaultStatusAdapter::new(security_level)),
        Arc::new(DashMapRegistry::new()),
        Arc::new(NoopPersistence),
    );

    let profile_set = ProfileSet::new(ProfileMode::Blacklist, caps, "pid 0");
    let process = Process::new(0, "", "", "").with_profile_set(Arc::new(profile_set));
    let communication = Communication::new(process, Domain::Fqdn(fqdn.clone()), false);

    let records = answers
        .into_iter()
        .map(|ip| match ip {
            IpAddr::V4(v4) => firewall_core::dns::RR::A(v4),
            IpAddr::V6(v6) => firewall_core::dns::RR::AAAA(v6),
        })
        .collect();
    let cache = firewall_core::dns::RRCache::new(records, server_scope, 0);

    match engine.dns_filter(&communication, &fqdn, &cache) {
        Some(filtered) => {
            println!("survivors:");
            for record in &filtered.answer {
                println!("  {}", record.render());
            }
            if filtered.filtered {
                println!("stripped:");
                for entry in &filtered.filtered_entries {
                    println!("  {entry}");
                }
            }
        }
        None => {
            println!("suppressed: {}", communication.reason());
        }
    }
    Ok(())
}

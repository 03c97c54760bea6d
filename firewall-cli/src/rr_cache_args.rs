use std::net::IpAddr;

use anyhow::{Context, Result};

/// Parses a comma-separated list of IPv4/IPv6 literals into the `answer` set
/// for the `filter-dns` harness command.
pub fn parse_answers(raw: &str) -> Result<Vec<IpAddr>> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<IpAddr>().with_context(|| format!("invalid IP address: {s}")))
        .collect()
}

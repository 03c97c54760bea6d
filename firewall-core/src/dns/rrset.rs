//! Resolver output (`RRCache`) and the core A/AAAA scrubbing logic used by
//! H3. This module implements the record-scrubbing core of the DNS response filter;
//! the surrounding own-traffic / no-profile / security-level gating (steps
//! 1-4) lives in [`crate::engine`], since those steps need the engine's
//! view of "self" and the status adapter.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use crate::dns::scope::{classify, IPScope};
use crate::profile::{Match, ProfileSet};

/// One resolver answer record. Non-address records pass through the filter
/// untouched; only `A`/`AAAA` carry an IP subject to scope/profile rules.
#[derive(Debug, Clone, PartialEq)]
pub enum RR {
    A(Ipv4Addr),
    AAAA(Ipv6Addr),
    Other { record_type: String, rendered: String },
}

impl RR {
    fn ip(&self) -> Option<IpAddr> {
        match self {
            RR::A(v4) => Some(IpAddr::V4(*v4)),
            RR::AAAA(v6) => Some(IpAddr::V6(*v6)),
            RR::Other { .. } => None,
        }
    }

    /// A rendering suitable for `filtered_entries`.
    pub fn render(&self) -> String {
        match self {
            RR::A(v4) => format!("A {v4}"),
            RR::AAAA(v6) => format!("AAAA {v6}"),
            RR::Other { record_type, rendered } => format!("{record_type} {rendered}"),
        }
    }
}

/// One resolver response. Cloning is always a full value clone of the
/// record vectors; filtering never mutates the original the caller holds.
#[derive(Debug, Clone)]
pub struct RRCache {
    pub answer: Vec<RR>,
    pub extra: Vec<RR>,
    pub ns: Vec<RR>,
    pub server_scope: IPScope,
    pub ttl_unix: i64,
    pub filtered: bool,
    pub filtered_entries: Vec<String>,
}

impl RRCache {
    pub fn new(answer: Vec<RR>, server_scope: IPScope, ttl_unix: i64) -> Self {
        Self {
            answer,
            extra: Vec::new(),
            ns: Vec::new(),
            server_scope,
            ttl_unix,
            filtered: false,
            filtered_entries: Vec::new(),
        }
    }
}

/// Outcome of applying the scope/profile filter to an `RRCache`.
pub enum FilterOutcome {
    /// Neither filter was enabled; the cache is returned unchanged.
    Unchanged(RRCache),
    /// At least one record was stripped but some A/AAAA survived.
    Filtered(RRCache),
    /// Every A/AAAA record was stripped; the response must be suppressed
    /// and the Communication denied.
    Suppressed,
}

/// Core of H3's record scrub. `fqdn` is used for the endpoint-IP consult;
/// pass an empty string if unknown (the profile-set's own matcher treats an
/// empty fqdn as "no domain rule can apply").
pub fn filter(
    rr_cache: &RRCache,
    fqdn: &str,
    profile_set: &ProfileSet,
    filter_by_scope: bool,
    filter_by_profile: bool,
) -> FilterOutcome {
    if !filter_by_scope && !filter_by_profile {
        return FilterOutcome::Unchanged(rr_cache.clone());
    }

    let mut cache = rr_cache.clone();
    cache.filtered_entries = Vec::new();

    let mut removed = 0usize;
    let mut kept_addresses = 0usize;

    let mut filter_entries = |entries: Vec<RR>| -> Vec<RR> {
        let mut good = Vec::with_capacity(entries.len());
        for rr in entries {
            let ip = match rr.ip() {
                Some(ip) => ip,
                None => {
                    good.push(rr);
                    continue;
                }
            };
            let scope = classify(ip);

            if filter_by_scope {
                let scope_strip = match scope {
                    IPScope::HostLocal => true,
                    IPScope::SiteLocal | IPScope::LinkLocal => cache.server_scope == IPScope::Global,
                    IPScope::Global => false,
                };
                if scope_strip {
                    removed += 1;
                    cache.filtered_entries.push(rr.render());
                    continue;
                }
            }

            if filter_by_profile {
                use crate::profile::Capability;
                let profile_strip = match scope {
                    IPScope::Global => !profile_set.check_flag(Capability::Internet),
                    IPScope::SiteLocal | IPScope::LinkLocal => !profile_set.check_flag(Capability::LAN),
                    IPScope::HostLocal => !profile_set.check_flag(Capability::Localhost),
                };
                if profile_strip {
                    removed += 1;
                    cache.filtered_entries.push(rr.render());
                    continue;
                }

                let (endpoint_match, _) = profile_set.check_endpoint_ip(fqdn, ip, 0, 0, false);
                if endpoint_match == Match::Denied {
                    removed += 1;
                    cache.filtered_entries.push(rr.render());
                    continue;
                }
            }

            kept_addresses += 1;
            good.push(rr);
        }
        good
    };

    cache.answer = filter_entries(std::mem::take(&mut cache.answer));
    cache.extra = filter_entries(std::mem::take(&mut cache.extra));

    if removed == 0 {
        return FilterOutcome::Unchanged(cache);
    }

    cache.filtered = true;
    if kept_addresses == 0 {
        return FilterOutcome::Suppressed;
    }
    FilterOutcome::Filtered(cache)
}

//! A single user-appended endpoint rule, and the list-matching logic the
//! `ProfileSet` consults at H1/H2/H5.

use std::net::IpAddr;

/// The kind of value an [`EndpointPermission`] matches against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RuleKind {
    Domain,
    IPv4,
    IPv6,
}

/// One rule in a profile's ordered endpoint list. Appended, never reordered.
///
/// Domain rules whose `value` starts with `.` are subtree wildcards: a rule
/// with `value = ".example.com."` matches `"foo.example.com."` but not
/// `"example.com."` itself — the apex domain needs its own rule if it
/// should also be covered.
#[derive(Debug, Clone, PartialEq)]
pub struct EndpointPermission {
    pub kind: RuleKind,
    pub value: String,
    pub permit: bool,
    pub created_unix: i64,
}

impl EndpointPermission {
    pub fn new(kind: RuleKind, value: impl Into<String>, permit: bool, created_unix: i64) -> Self {
        Self {
            kind,
            value: value.into(),
            permit,
            created_unix,
        }
    }

    fn matches_domain(&self, fqdn: &str) -> bool {
        if self.kind != RuleKind::Domain {
            return false;
        }
        if let Some(suffix) = self.value.strip_prefix('.') {
            fqdn.len() > suffix.len() + 1 && fqdn.ends_with(&self.value)
        } else {
            self.value == fqdn
        }
    }

    fn matches_ip(&self, ip: IpAddr) -> bool {
        match self.kind {
            RuleKind::IPv4 | RuleKind::IPv6 => self
                .value
                .parse::<IpAddr>()
                .map(|rule_ip| rule_ip == ip)
                .unwrap_or(false),
            RuleKind::Domain => false,
        }
    }
}

/// The outcome of consulting an endpoint rule list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Match {
    NoMatch,
    Permitted,
    Denied,
    Undeterminable,
}

/// First-match-wins scan of an ordered rule list against an FQDN.
///
/// Rule order is preserved as appended, never reordered; the first rule in
/// list order that matches decides the outcome — the same precedence a user
/// would expect from an append-only audit log of "most recently confirmed
/// behavior wins first-seen."
pub fn match_domain(rules: &[EndpointPermission], fqdn: &str) -> (Match, String) {
    if fqdn.is_empty() {
        return (Match::Undeterminable, String::new());
    }
    for rule in rules {
        if rule.matches_domain(fqdn) {
            let verb = if rule.permit { "whitelisted" } else { "blacklisted" };
            let reason = format!("{} matches rule for {}", verb, rule.value);
            let outcome = if rule.permit { Match::Permitted } else { Match::Denied };
            return (outcome, reason);
        }
    }
    (Match::NoMatch, String::new())
}

/// First-match-wins scan of an ordered rule list against an IP address.
pub fn match_ip(rules: &[EndpointPermission], ip: IpAddr) -> (Match, String) {
    for rule in rules {
        if rule.matches_ip(ip) {
            let verb = if rule.permit { "whitelisted" } else { "blacklisted" };
            let reason = format!("{} matches rule for {}", verb, rule.value);
            let outcome = if rule.permit { Match::Permitted } else { Match::Denied };
            return (outcome, reason);
        }
    }
    (Match::NoMatch, String::new())
}

/// Mixed-kind scan used by `check_endpoint_ip` — a single endpoint list
/// may hold both `Domain` and `IPv4`/`IPv6` rules. A domain-kind rule
/// matches if `fqdn` is non-empty and matches its value; an IP-kind rule
/// matches against `ip`. First match in list order wins.
pub fn match_endpoint(rules: &[EndpointPermission], fqdn: &str, ip: IpAddr) -> (Match, String) {
    for rule in rules {
        let hit = match rule.kind {
            RuleKind::Domain => !fqdn.is_empty() && rule.matches_domain(fqdn),
            RuleKind::IPv4 | RuleKind::IPv6 => rule.matches_ip(ip),
        };
        if hit {
            let verb = if rule.permit { "whitelisted" } else { "blacklisted" };
            let reason = format!("{} matches rule for {}", verb, rule.value);
            let outcome = if rule.permit { Match::Permitted } else { Match::Denied };
            return (outcome, reason);
        }
    }
    (Match::NoMatch, String::new())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn perm(kind: RuleKind, value: &str, permit: bool) -> EndpointPermission {
        EndpointPermission::new(kind, value, permit, 0)
    }

    #[test]
    fn exact_domain_match() {
        let rules = vec![perm(RuleKind::Domain, "example.com.", true)];
        assert_eq!(match_domain(&rules, "example.com.").0, Match::Permitted);
        assert_eq!(match_domain(&rules, "foo.example.com.").0, Match::NoMatch);
    }

    #[test]
    fn wildcard_subtree_match_excludes_apex() {
        let rules = vec![perm(RuleKind::Domain, ".example.com.", true)];
        assert_eq!(match_domain(&rules, "foo.example.com.").0, Match::Permitted);
        assert_eq!(match_domain(&rules, "example.com.").0, Match::NoMatch);
    }

    #[test]
    fn first_match_wins() {
        let rules = vec![
            perm(RuleKind::Domain, "example.com.", true),
            perm(RuleKind::Domain, "example.com.", false),
        ];
        assert_eq!(match_domain(&rules, "example.com.").0, Match::Permitted);
    }

    #[test]
    fn ip_match_ignores_kind_tag_mismatch_but_requires_value_equality() {
        let rules = vec![perm(RuleKind::IPv4, "127.0.0.1", false)];
        let ip: IpAddr = "127.0.0.1".parse().unwrap();
        assert_eq!(match_ip(&rules, ip).0, Match::Denied);
        let other: IpAddr = "127.0.0.2".parse().unwrap();
        assert_eq!(match_ip(&rules, other).0, Match::NoMatch);
    }

    #[test]
    fn empty_fqdn_is_undeterminable() {
        assert_eq!(match_domain(&[], "").0, Match::Undeterminable);
    }

    #[test]
    fn match_endpoint_scans_mixed_kinds_in_order() {
        let rules = vec![
            perm(RuleKind::IPv4, "8.8.8.8", false),
            perm(RuleKind::Domain, ".example.com.", true),
        ];
        let ip: IpAddr = "8.8.8.8".parse().unwrap();
        assert_eq!(match_endpoint(&rules, "foo.example.com.", ip).0, Match::Denied);
        let other: IpAddr = "1.1.1.1".parse().unwrap();
        assert_eq!(
            match_endpoint(&rules, "foo.example.com.", other).0,
            Match::Permitted
        );
    }
}

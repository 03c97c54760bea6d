//! The `Domain` half of a Communication's key: either a resolved FQDN or
//! one of the sentinel pseudo-domains used for IP-only flows.

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Domain {
    /// An FQDN ending in `.`.
    Fqdn(String),
    IncomingHost,
    IncomingLAN,
    IncomingInternet,
    IncomingInvalid,
    PeerHost,
    PeerLAN,
    PeerInternet,
    PeerInvalid,
}

impl Domain {
    /// Returns the FQDN if this is a resolved domain — the "ends in '.'"
    /// test used by H4/H5 to decide whether a comm is a domain flow or an
    /// IP-only flow.
    pub fn as_fqdn(&self) -> Option<&str> {
        match self {
            Domain::Fqdn(s) if s.ends_with('.') => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn is_incoming_sentinel(&self) -> bool {
        matches!(
            self,
            Domain::IncomingHost | Domain::IncomingLAN | Domain::IncomingInternet | Domain::IncomingInvalid
        )
    }

    pub fn is_peer_sentinel(&self) -> bool {
        matches!(
            self,
            Domain::PeerHost | Domain::PeerLAN | Domain::PeerInternet | Domain::PeerInvalid
        )
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Domain::Fqdn(s) => f.write_str(s),
            Domain::IncomingHost => f.write_str("<incoming:host>"),
            Domain::IncomingLAN => f.write_str("<incoming:lan>"),
            Domain::IncomingInternet => f.write_str("<incoming:internet>"),
            Domain::IncomingInvalid => f.write_str("<incoming:invalid>"),
            Domain::PeerHost => f.write_str("<peer:host>"),
            Domain::PeerLAN => f.write_str("<peer:lan>"),
            Domain::PeerInternet => f.write_str("<peer:internet>"),
            Domain::PeerInvalid => f.write_str("<peer:invalid>"),
        }
    }
}

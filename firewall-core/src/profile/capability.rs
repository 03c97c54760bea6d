/// Coarse permission flags a profile grants to its process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    /// Allowed to reach the public internet.
    Internet,
    /// Allowed to reach site-local / link-local addresses.
    LAN,
    /// Allowed to reach or serve loopback addresses.
    Localhost,
    /// Allowed to initiate or accept direct peer-to-peer IP connections
    /// (no domain involved).
    PeerToPeer,
    /// Allowed to accept inbound connections (run as a service).
    Service,
    /// Enables the relation heuristic as a prompt short-circuit.
    Related,
}

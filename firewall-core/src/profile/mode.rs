/// How a profile resolves endpoints that neither the blacklist nor the
/// whitelist matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProfileMode {
    /// Default-deny: anything not explicitly permitted is denied.
    Whitelist,
    /// Default-allow: anything not explicitly denied is accepted.
    Blacklist,
    /// Ask the user.
    Prompt,
}

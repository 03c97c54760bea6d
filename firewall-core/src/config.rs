//! Engine configuration. No on-disk format is owned by this crate; this
//! struct is the in-process shape a driver fills in and hands to the engine.

#[derive(Debug, Clone)]
pub struct FirewallConfig {
    /// The pid this process itself runs as, used to grant "own traffic"
    /// exemptions in the H1/H2/H4/H5 hooks.
    pub self_pid: i32,

    /// Prompt response deadline before a link/communication prompt times out.
    pub prompt_ttl: std::time::Duration,

    /// Levenshtein-ratio threshold for the relation heuristic; a label/path
    /// similarity strictly above this value counts as a match.
    pub relation_match_threshold: f64,
}

impl FirewallConfig {
    pub fn new(self_pid: i32) -> Self {
        Self {
            self_pid,
            prompt_ttl: std::time::Duration::from_secs(15),
            relation_match_threshold: 0.5,
        }
    }
}

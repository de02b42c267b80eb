use serde::{Deserialize, Serialize};

/// Engine limits and switches.
///
/// Loaded once per process and passed explicitly through every entry
/// point; the engine keeps no global state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Hard cap on the number of problems fetched for one view.
    #[serde(default = "default_search_limit")]
    pub search_limit: usize,
    /// Cap on the per-group, per-severity sample lists. Counters are never
    /// capped, only the stored samples.
    #[serde(default = "default_sample_cap")]
    pub sample_cap: usize,
    /// Maximum tags shown per problem before the overflow indicator.
    #[serde(default = "default_max_tags_displayed")]
    pub max_tags_displayed: usize,
    /// When false, acknowledgement filtering is disabled and unack counters
    /// mirror the totals.
    #[serde(default = "default_ack_enabled")]
    pub ack_enabled: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            search_limit: default_search_limit(),
            sample_cap: default_sample_cap(),
            max_tags_displayed: default_max_tags_displayed(),
            ack_enabled: default_ack_enabled(),
        }
    }
}

fn default_search_limit() -> usize {
    1000
}

fn default_sample_cap() -> usize {
    30
}

fn default_max_tags_displayed() -> usize {
    3
}

fn default_ack_enabled() -> bool {
    true
}

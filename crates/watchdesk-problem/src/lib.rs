//! Problem aggregation and acknowledgement engine.
//!
//! One invocation computes one dashboard's data: the raw filter is
//! resolved to concrete predicates, matching problems are fetched bounded
//! by the display cap, fanned out to their host groups with per-severity
//! counters and capped sample lists, and the visible union is enriched
//! with ordered tags, action summaries and display status.
//!
//! The engine is request-scoped and synchronous: it only reads, keeps no
//! state between calls, and takes its configuration as an explicit
//! [`config::EngineConfig`] value. Empty matches at any stage produce
//! empty aggregates, not errors; only storage failures propagate.

pub mod aggregate;
pub mod config;
pub mod enrich;
pub mod fetch;
pub mod filter;
pub mod status;

#[cfg(test)]
mod tests;

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashSet;

use aggregate::GroupStats;
use config::EngineConfig;
use enrich::EnrichedProblem;
use filter::ProblemFilter;
use watchdesk_storage::error::Result;
use watchdesk_storage::{Directory, ProblemStore};

/// Everything one dashboard render needs.
#[derive(Debug, Clone, Serialize)]
pub struct Dashboard {
    /// Per-group, per-severity matrix, groups ordered by name.
    pub groups: Vec<GroupStats>,
    /// Enriched union of the sampled problems, fetch order.
    pub problems: Vec<EnrichedProblem>,
    /// True when more problems matched than the display cap allowed.
    pub truncated: bool,
}

/// Runs the full pipeline: resolve → fetch → aggregate → enrich.
pub fn build_dashboard(
    store: &dyn ProblemStore,
    directory: &dyn Directory,
    config: &EngineConfig,
    filter: &ProblemFilter,
    now: DateTime<Utc>,
) -> Result<Dashboard> {
    let resolved = filter::resolve(directory, config, filter)?;
    let fetched = fetch::fetch_problems(store, &resolved, config.search_limit)?;
    let aggregate =
        aggregate::aggregate(directory, config, &fetched.problems, resolved.group_ids.as_deref())?;

    let visible: HashSet<&str> = aggregate.visible.iter().map(String::as_str).collect();
    let visible_problems: Vec<_> = fetched
        .problems
        .into_iter()
        .filter(|p| visible.contains(p.id.as_str()))
        .collect();
    let problems = enrich::enrich(directory, config, filter, visible_problems, now)?;

    tracing::info!(
        groups = aggregate.groups.len(),
        problems = problems.len(),
        truncated = fetched.truncated,
        "dashboard built"
    );

    Ok(Dashboard {
        groups: aggregate.groups,
        problems,
        truncated: fetched.truncated,
    })
}

/// Flat problem list: resolve → fetch → enrich, no group fan-out.
/// Returns the enriched problems plus the truncation indicator.
pub fn list_problems(
    store: &dyn ProblemStore,
    directory: &dyn Directory,
    config: &EngineConfig,
    filter: &ProblemFilter,
    now: DateTime<Utc>,
) -> Result<(Vec<EnrichedProblem>, bool)> {
    let resolved = filter::resolve(directory, config, filter)?;
    let fetched = fetch::fetch_problems(store, &resolved, config.search_limit)?;
    let problems = enrich::enrich(directory, config, filter, fetched.problems, now)?;
    Ok((problems, fetched.truncated))
}

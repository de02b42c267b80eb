use crate::config::EngineConfig;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use watchdesk_common::types::{ProblemTag, Severity};
use watchdesk_storage::error::Result;
use watchdesk_storage::{Directory, ProblemQuery};

/// Acknowledgement display mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AckFilter {
    /// Show everything.
    #[default]
    All,
    /// Show only unacknowledged problems.
    Unacknowledged,
    /// Show everything but keep separate unacknowledged counters.
    WithUnacknowledged,
}

/// Raw, user-supplied dashboard filter. Every field is optional; `None`
/// means "no restriction".
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProblemFilter {
    pub group_ids: Option<Vec<String>>,
    pub exclude_group_ids: Option<Vec<String>>,
    pub host_ids: Option<Vec<String>>,
    /// Free-text substring match on the problem name. When present it is
    /// resolved to concrete trigger ids and supersedes group/host filters.
    pub name: Option<String>,
    pub severities: Option<Vec<Severity>>,
    /// Include hosts that are in maintenance.
    pub show_maintenance: bool,
    pub ack: AckFilter,
    /// Tag filter; also promotes matching tags to the front of the
    /// displayed tag list.
    pub tags: Vec<ProblemTag>,
    /// Tag keys promoted after filter matches, in list order.
    pub priority_tags: Vec<String>,
}

/// Normalized predicate set produced by [`resolve`].
#[derive(Debug, Clone, Default)]
pub struct ResolvedFilter {
    pub trigger_ids: Option<Vec<String>>,
    pub host_ids: Option<Vec<String>>,
    pub severities: Vec<Severity>,
    /// True when the UNACK mode is active and must be pushed into the
    /// store query.
    pub unacknowledged_only: bool,
    /// Group ids to aggregate over; `None` means all groups.
    pub group_ids: Option<Vec<String>>,
}

impl ResolvedFilter {
    /// A predicate that resolved to an empty concrete set matches nothing;
    /// callers short-circuit to an empty result instead of querying.
    pub fn matches_nothing(&self) -> bool {
        matches!(&self.trigger_ids, Some(ids) if ids.is_empty())
            || matches!(&self.host_ids, Some(ids) if ids.is_empty())
    }

    pub fn to_query(&self, limit: Option<usize>) -> ProblemQuery {
        ProblemQuery {
            trigger_ids: self.trigger_ids.clone(),
            host_ids: self.host_ids.clone(),
            severities: self.severities.clone(),
            unacknowledged_only: self.unacknowledged_only,
            name_contains: None,
            limit,
        }
    }
}

/// Turns a raw filter into concrete predicate sets.
///
/// Resolution rules:
/// - the severity set defaults to the full range when unset;
/// - a problem-name text filter resolves to trigger ids and clears the
///   group/host predicates;
/// - `exclude_group_ids` without an explicit host filter subtracts the
///   excluded groups' hosts from the allowed groups' hosts;
/// - hosts in maintenance are dropped unless `show_maintenance` is set;
/// - empty resolved sets are not errors, they mean "no problems".
pub fn resolve(
    directory: &dyn Directory,
    config: &EngineConfig,
    filter: &ProblemFilter,
) -> Result<ResolvedFilter> {
    let severities = match &filter.severities {
        Some(list) if !list.is_empty() => list.clone(),
        _ => Severity::ALL.to_vec(),
    };

    let unacknowledged_only = config.ack_enabled && filter.ack == AckFilter::Unacknowledged;

    // Text filter wins over everything else: resolve it to triggers and
    // drop the group/host predicates.
    if let Some(name) = filter.name.as_deref().filter(|n| !n.trim().is_empty()) {
        let triggers = directory.find_triggers_by_problem_name(name.trim())?;
        let trigger_ids: Vec<String> = triggers.into_iter().map(|t| t.id).collect();
        tracing::debug!(count = trigger_ids.len(), "resolved name filter to triggers");
        return Ok(ResolvedFilter {
            trigger_ids: Some(trigger_ids),
            host_ids: None,
            severities,
            unacknowledged_only,
            group_ids: filter.group_ids.clone(),
        });
    }

    let mut host_ids: Option<Vec<String>> = None;

    if let Some(explicit) = &filter.host_ids {
        let hosts = directory.get_hosts(explicit)?;
        host_ids = Some(
            hosts
                .into_iter()
                .filter(|h| filter.show_maintenance || !h.in_maintenance)
                .map(|h| h.id)
                .collect(),
        );
    } else if filter.group_ids.is_some() || filter.exclude_group_ids.is_some() {
        let allowed = match &filter.group_ids {
            Some(ids) => ids.clone(),
            None => directory
                .list_groups(None)?
                .into_iter()
                .map(|g| g.id)
                .collect(),
        };
        let excluded: HashSet<String> = match &filter.exclude_group_ids {
            Some(ids) if !ids.is_empty() => directory
                .hosts_in_groups(ids)?
                .into_iter()
                .map(|h| h.id)
                .collect(),
            _ => HashSet::new(),
        };
        let hosts = directory.hosts_in_groups(&allowed)?;
        host_ids = Some(
            hosts
                .into_iter()
                .filter(|h| !excluded.contains(&h.id))
                .filter(|h| filter.show_maintenance || !h.in_maintenance)
                .map(|h| h.id)
                .collect(),
        );
    }

    Ok(ResolvedFilter {
        trigger_ids: None,
        host_ids,
        severities,
        unacknowledged_only,
        group_ids: filter.group_ids.clone(),
    })
}

use crate::config::EngineConfig;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap, HashSet};
use watchdesk_common::types::{HostGroup, Problem, Severity};
use watchdesk_storage::error::Result;
use watchdesk_storage::Directory;

/// Per-severity counters and capped sample lists for one host group.
///
/// `count`/`count_unack` are exact; `problems`/`problems_unack` hold at
/// most the configured sample cap. The asymmetry is intentional: counters
/// drive the numbers shown in the matrix, samples only feed hint popups.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SeverityBucket {
    pub count: u64,
    pub count_unack: u64,
    /// Sampled problem ids, fetch order (most recent first).
    pub problems: Vec<String>,
    pub problems_unack: Vec<String>,
}

/// Aggregated problem statistics for one host group.
#[derive(Debug, Clone, Serialize)]
pub struct GroupStats {
    pub group: HostGroup,
    /// Indexed by `Severity::level()`.
    pub by_severity: Vec<SeverityBucket>,
}

impl GroupStats {
    fn new(group: HostGroup) -> Self {
        Self {
            group,
            by_severity: vec![SeverityBucket::default(); Severity::ALL.len()],
        }
    }

    pub fn bucket(&self, severity: Severity) -> &SeverityBucket {
        &self.by_severity[severity.level() as usize]
    }

    /// Total problems across all severities.
    pub fn total(&self) -> u64 {
        self.by_severity.iter().map(|b| b.count).sum()
    }
}

/// Output of the aggregation stage.
#[derive(Debug, Clone, Serialize)]
pub struct Aggregate {
    /// Groups ordered by name. Groups without problems keep zeroed buckets.
    pub groups: Vec<GroupStats>,
    /// Union of sampled problem ids across all groups, in fetch order.
    /// The enrichment stage runs over this set exactly once per problem,
    /// no matter how many groups reference it.
    pub visible: Vec<String>,
}

/// Groups fetched problems by host group and severity.
///
/// The implicit trigger → hosts → groups fan-out is resolved into an
/// explicit `(problem, group)` relation before counting, so each pair
/// increments its bucket exactly once even when several of the trigger's
/// hosts belong to the same group. A problem still contributes to every
/// distinct group it maps to.
pub fn aggregate(
    directory: &dyn Directory,
    config: &EngineConfig,
    problems: &[Problem],
    group_ids: Option<&[String]>,
) -> Result<Aggregate> {
    let groups = directory.list_groups(group_ids)?;
    let mut stats: Vec<GroupStats> = groups.into_iter().map(GroupStats::new).collect();
    let index_of: HashMap<String, usize> = stats
        .iter()
        .enumerate()
        .map(|(i, s)| (s.group.id.clone(), i))
        .collect();

    // Resolve trigger/host membership once for the whole batch.
    let trigger_ids: Vec<String> = {
        let mut seen = HashSet::new();
        problems
            .iter()
            .filter(|p| seen.insert(p.trigger_id.clone()))
            .map(|p| p.trigger_id.clone())
            .collect()
    };
    let triggers = directory.get_triggers(&trigger_ids)?;
    let trigger_hosts: HashMap<&str, &[String]> = triggers
        .iter()
        .map(|t| (t.id.as_str(), t.host_ids.as_slice()))
        .collect();

    let host_ids: Vec<String> = {
        let mut seen = HashSet::new();
        triggers
            .iter()
            .flat_map(|t| t.host_ids.iter())
            .filter(|h| seen.insert((*h).clone()))
            .cloned()
            .collect()
    };
    let hosts = directory.get_hosts(&host_ids)?;
    let host_groups: HashMap<&str, &[String]> = hosts
        .iter()
        .map(|h| (h.id.as_str(), h.group_ids.as_slice()))
        .collect();

    let mut visible: Vec<String> = Vec::new();
    let mut visible_set: HashSet<String> = HashSet::new();

    for problem in problems {
        // With acknowledgement disabled every problem counts as unhandled.
        let unacknowledged = !config.ack_enabled || !problem.acknowledged;
        // Explicit (problem, group) relation: dedupe across the trigger's
        // hosts so multi-host triggers count once per group.
        let problem_groups: BTreeSet<&str> = trigger_hosts
            .get(problem.trigger_id.as_str())
            .into_iter()
            .flat_map(|hosts| hosts.iter())
            .filter_map(|host_id| host_groups.get(host_id.as_str()))
            .flat_map(|groups| groups.iter())
            .map(String::as_str)
            .collect();

        for group_id in problem_groups {
            let Some(&idx) = index_of.get(group_id) else {
                continue;
            };
            let bucket =
                &mut stats[idx].by_severity[problem.severity.level() as usize];

            bucket.count += 1;
            if unacknowledged {
                bucket.count_unack += 1;
            }

            // Counters above are unconditional; samples stop at the cap.
            let mut sampled = false;
            if bucket.problems.len() < config.sample_cap {
                bucket.problems.push(problem.id.clone());
                sampled = true;
            }
            if unacknowledged && bucket.problems_unack.len() < config.sample_cap {
                bucket.problems_unack.push(problem.id.clone());
                sampled = true;
            }
            if sampled && visible_set.insert(problem.id.clone()) {
                visible.push(problem.id.clone());
            }
        }
    }

    tracing::debug!(
        groups = stats.len(),
        problems = problems.len(),
        visible = visible.len(),
        "aggregated problems by group"
    );

    Ok(Aggregate {
        groups: stats,
        visible,
    })
}

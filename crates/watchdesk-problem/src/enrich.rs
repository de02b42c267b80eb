use crate::config::EngineConfig;
use crate::filter::ProblemFilter;
use crate::status;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use watchdesk_common::types::{DisplayStatus, Problem, ProblemTag, UpdateFlags};
use watchdesk_storage::error::Result;
use watchdesk_storage::Directory;

/// Placeholder actor name used when the acknowledging user cannot be
/// looked up. Missing users degrade the display, never the request.
pub const INACCESSIBLE_USER: &str = "Inaccessible user";

/// Tag list prepared for display: ordered, capped, with an overflow marker.
#[derive(Debug, Clone, Serialize)]
pub struct TagView {
    pub tags: Vec<ProblemTag>,
    /// True when more tags exist than `tags` shows.
    pub overflow: bool,
}

/// Summary of the acknowledgement/update history of one problem.
#[derive(Debug, Clone, Serialize)]
pub struct ActionSummary {
    /// Name of the most recent update's actor.
    pub last_actor: String,
    /// When the most recent update happened.
    pub last_clock: DateTime<Utc>,
    /// Union of all action flags across the history.
    pub flags: UpdateFlags,
    /// True when an unresolved problem has a pending close request.
    pub in_closing: bool,
}

/// A problem decorated with everything a dashboard row needs.
#[derive(Debug, Clone, Serialize)]
pub struct EnrichedProblem {
    pub problem: Problem,
    pub status: DisplayStatus,
    /// Clock to display: recovery clock once resolved, `now` while
    /// closing, start clock otherwise.
    pub effective_clock: DateTime<Utc>,
    pub tags: TagView,
    /// `None` when the problem has no update history.
    pub actions: Option<ActionSummary>,
}

fn tag_matches_filter(tag: &ProblemTag, filter_tags: &[ProblemTag]) -> bool {
    filter_tags
        .iter()
        .any(|f| f.tag == tag.tag && (f.value.is_empty() || f.value == tag.value))
}

/// Orders tags for display: filter-matching tags first, then tags whose
/// key appears in the priority list (in list order), then the remainder in
/// their original order. The sort is stable, so re-ordering an already
/// ordered list with the same inputs is a no-op.
pub fn order_tags(
    tags: &[ProblemTag],
    filter_tags: &[ProblemTag],
    priority_tags: &[String],
) -> Vec<ProblemTag> {
    let mut ordered: Vec<ProblemTag> = tags.to_vec();
    ordered.sort_by_key(|tag| {
        let filter_rank = usize::from(!tag_matches_filter(tag, filter_tags));
        let priority_rank = priority_tags
            .iter()
            .position(|key| key == &tag.tag)
            .unwrap_or(usize::MAX);
        (filter_rank, priority_rank)
    });
    ordered
}

fn tag_view(problem: &Problem, filter: &ProblemFilter, config: &EngineConfig) -> TagView {
    let mut ordered = order_tags(&problem.tags, &filter.tags, &filter.priority_tags);
    let overflow = ordered.len() > config.max_tags_displayed;
    ordered.truncate(config.max_tags_displayed);
    TagView {
        tags: ordered,
        overflow,
    }
}

/// Attaches tag views and action summaries to the given problems.
///
/// Callers pass the union of visible problems across all groups, so each
/// problem is enriched exactly once regardless of how many groups
/// reference it. User lookups are cached per call; a failed lookup renders
/// the placeholder actor instead of erroring.
pub fn enrich(
    directory: &dyn Directory,
    config: &EngineConfig,
    filter: &ProblemFilter,
    problems: Vec<Problem>,
    now: DateTime<Utc>,
) -> Result<Vec<EnrichedProblem>> {
    let mut actor_cache: HashMap<String, String> = HashMap::new();
    let mut enriched = Vec::with_capacity(problems.len());

    for problem in problems {
        let display_status = status::classify(&problem);
        let effective_clock = status::effective_clock(&problem, now);
        let tags = tag_view(&problem, filter, config);

        let actions = problem.updates.last().map(|last| {
            let actor = actor_cache
                .entry(last.user_id.clone())
                .or_insert_with(|| match directory.get_user(&last.user_id) {
                    Ok(Some(user)) => user.name,
                    Ok(None) => INACCESSIBLE_USER.to_string(),
                    Err(e) => {
                        tracing::warn!(error = %e, user_id = %last.user_id, "user lookup failed");
                        INACCESSIBLE_USER.to_string()
                    }
                })
                .clone();
            let flags = problem
                .updates
                .iter()
                .fold(UpdateFlags::NONE, |acc, u| acc | u.flags);
            ActionSummary {
                last_actor: actor,
                last_clock: last.clock,
                flags,
                in_closing: display_status == DisplayStatus::Closing,
            }
        });

        enriched.push(EnrichedProblem {
            status: display_status,
            effective_clock,
            tags,
            actions,
            problem,
        });
    }

    Ok(enriched)
}

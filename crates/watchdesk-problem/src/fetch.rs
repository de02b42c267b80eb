use crate::filter::ResolvedFilter;
use watchdesk_common::types::Problem;
use watchdesk_storage::error::Result;
use watchdesk_storage::ProblemStore;

/// Fetched problems, most recent first, plus whether more exist than shown.
#[derive(Debug, Clone)]
pub struct FetchResult {
    pub problems: Vec<Problem>,
    pub truncated: bool,
}

impl FetchResult {
    pub fn empty() -> Self {
        Self {
            problems: Vec::new(),
            truncated: false,
        }
    }
}

/// Queries problems matching the resolved predicates, bounded by `limit`.
///
/// One extra row is requested to detect truncation without a second count
/// query. Predicates that resolved to empty sets short-circuit without
/// touching the store.
pub fn fetch_problems(
    store: &dyn ProblemStore,
    resolved: &ResolvedFilter,
    limit: usize,
) -> Result<FetchResult> {
    if resolved.matches_nothing() {
        tracing::debug!("filter resolved to an empty set, skipping query");
        return Ok(FetchResult::empty());
    }

    let mut problems = store.query_problems(&resolved.to_query(Some(limit + 1)))?;
    let truncated = problems.len() > limit;
    problems.truncate(limit);
    tracing::debug!(count = problems.len(), truncated, "fetched problems");
    Ok(FetchResult { problems, truncated })
}

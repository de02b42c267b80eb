//! Read-mostly storage layer for problems and the monitored inventory.
//!
//! The default implementation ([`sqlite::SqliteStore`]) keeps problems,
//! hosts, host groups, triggers and users in a single SQLite database with
//! WAL mode for concurrent reads. The aggregation engine only consumes the
//! [`ProblemStore`] and [`Directory`] traits, so tests can substitute an
//! in-memory database.

pub mod error;
pub mod sqlite;


use error::Result;
use watchdesk_common::types::{Host, HostGroup, Problem, Severity, Trigger, User};

/// Normalized predicates for a problem query, produced by the filter
/// resolver.
///
/// # Examples
///
/// ```
/// use watchdesk_storage::ProblemQuery;
/// use watchdesk_common::types::Severity;
///
/// let query = ProblemQuery {
///     severities: vec![Severity::High, Severity::Disaster],
///     unacknowledged_only: true,
///     limit: Some(100),
///     ..Default::default()
/// };
/// assert!(query.trigger_ids.is_none());
/// ```
#[derive(Debug, Clone, Default)]
pub struct ProblemQuery {
    /// Restrict to problems produced by these triggers. `None` means no
    /// trigger predicate; an empty `Vec` matches nothing.
    pub trigger_ids: Option<Vec<String>>,
    /// Restrict to problems whose trigger references one of these hosts.
    /// Same `None` / empty-`Vec` semantics as `trigger_ids`.
    pub host_ids: Option<Vec<String>>,
    /// Severities to include. Empty means all severities.
    pub severities: Vec<Severity>,
    /// When set, exclude acknowledged problems at the query level so the
    /// returned rows and any counts derived from them agree exactly.
    pub unacknowledged_only: bool,
    /// Case-insensitive substring match on the problem name.
    pub name_contains: Option<String>,
    /// Maximum rows returned, most recent first.
    pub limit: Option<usize>,
}

/// Store of current and recently resolved problems.
///
/// Implementations must be safe to share across threads (`Send + Sync`)
/// because one store instance serves all concurrent dashboard requests.
pub trait ProblemStore: Send + Sync {
    /// Queries problems matching the predicates, most recent first by
    /// unique id, with tags and update history attached.
    fn query_problems(&self, query: &ProblemQuery) -> Result<Vec<Problem>>;

    /// Exact count of matching problems, ignoring `limit`.
    fn count_problems(&self, query: &ProblemQuery) -> Result<u64>;
}

/// Host/host-group/trigger/user directory used for filter resolution,
/// group fan-out and actor display.
pub trait Directory: Send + Sync {
    /// Lists host groups, optionally restricted to the given ids, ordered
    /// by name.
    fn list_groups(&self, ids: Option<&[String]>) -> Result<Vec<HostGroup>>;

    /// All hosts belonging to any of the given groups.
    fn hosts_in_groups(&self, group_ids: &[String]) -> Result<Vec<Host>>;

    /// Hosts by id. Missing ids are skipped, not errors.
    fn get_hosts(&self, ids: &[String]) -> Result<Vec<Host>>;

    /// Triggers by id, with host references attached. Missing ids are
    /// skipped.
    fn get_triggers(&self, ids: &[String]) -> Result<Vec<Trigger>>;

    /// Resolves a free-text problem-name filter to the concrete set of
    /// enabled triggers that have produced a matching problem.
    fn find_triggers_by_problem_name(&self, name: &str) -> Result<Vec<Trigger>>;

    /// Looks up a user for actor display. `Ok(None)` for inaccessible
    /// users; callers render a placeholder instead of failing.
    fn get_user(&self, id: &str) -> Result<Option<User>>;
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Problem severity level, ordered from lowest to highest.
///
/// # Examples
///
/// ```
/// use watchdesk_common::types::Severity;
///
/// let sev: Severity = "high".parse().unwrap();
/// assert_eq!(sev, Severity::High);
/// assert_eq!(sev.to_string(), "high");
/// assert!(Severity::Disaster > Severity::Warning);
/// assert_eq!(Severity::from_level(3), Some(Severity::Average));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    NotClassified,
    Information,
    Warning,
    Average,
    High,
    Disaster,
}

impl Severity {
    /// All severities in ascending order. Used as the default severity
    /// filter and to index per-severity buckets.
    pub const ALL: [Severity; 6] = [
        Severity::NotClassified,
        Severity::Information,
        Severity::Warning,
        Severity::Average,
        Severity::High,
        Severity::Disaster,
    ];

    /// Ordinal level, 0 (not classified) through 5 (disaster).
    pub fn level(self) -> u8 {
        self as u8
    }

    pub fn from_level(level: u8) -> Option<Severity> {
        Severity::ALL.get(level as usize).copied()
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::NotClassified => write!(f, "not_classified"),
            Severity::Information => write!(f, "information"),
            Severity::Warning => write!(f, "warning"),
            Severity::Average => write!(f, "average"),
            Severity::High => write!(f, "high"),
            Severity::Disaster => write!(f, "disaster"),
        }
    }
}

impl std::str::FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "not_classified" => Ok(Severity::NotClassified),
            "information" => Ok(Severity::Information),
            "warning" => Ok(Severity::Warning),
            "average" => Ok(Severity::Average),
            "high" => Ok(Severity::High),
            "disaster" => Ok(Severity::Disaster),
            _ => Err(format!("unknown severity: {s}")),
        }
    }
}

/// Set of action flags carried by a problem update.
///
/// 一条更新记录可以同时携带多个动作（例如同时确认并留言），因此用
/// 位集合而不是单个枚举值建模。
///
/// # Examples
///
/// ```
/// use watchdesk_common::types::UpdateFlags;
///
/// let flags = UpdateFlags::ACKNOWLEDGE | UpdateFlags::MESSAGE;
/// assert!(flags.contains(UpdateFlags::ACKNOWLEDGE));
/// assert!(!flags.contains(UpdateFlags::CLOSE));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UpdateFlags(pub u32);

impl UpdateFlags {
    pub const NONE: UpdateFlags = UpdateFlags(0);
    /// Request to close the problem.
    pub const CLOSE: UpdateFlags = UpdateFlags(1);
    /// Acknowledge the problem.
    pub const ACKNOWLEDGE: UpdateFlags = UpdateFlags(1 << 1);
    /// A free-form message was attached.
    pub const MESSAGE: UpdateFlags = UpdateFlags(1 << 2);
    /// The severity was changed.
    pub const SEVERITY_CHANGE: UpdateFlags = UpdateFlags(1 << 3);
    /// Revoke a previous acknowledgement.
    pub const UNACKNOWLEDGE: UpdateFlags = UpdateFlags(1 << 4);

    pub fn contains(self, other: UpdateFlags) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn bits(self) -> u32 {
        self.0
    }
}

impl std::ops::BitOr for UpdateFlags {
    type Output = UpdateFlags;

    fn bitor(self, rhs: UpdateFlags) -> UpdateFlags {
        UpdateFlags(self.0 | rhs.0)
    }
}

impl std::ops::BitOrAssign for UpdateFlags {
    fn bitor_assign(&mut self, rhs: UpdateFlags) {
        self.0 |= rhs.0;
    }
}

/// A free-form key/value label attached to a problem. Order matters for
/// display, so tags are kept in a `Vec`, never a map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProblemTag {
    pub tag: String,
    /// May be empty; a bare tag is legal.
    pub value: String,
}

impl ProblemTag {
    pub fn new(tag: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            value: value.into(),
        }
    }
}

/// Format a tag list into a human-readable string.
///
/// # Examples
///
/// ```
/// use watchdesk_common::types::{format_tags, ProblemTag};
///
/// let tags = vec![
///     ProblemTag::new("service", "mysql"),
///     ProblemTag::new("env", ""),
/// ];
/// assert_eq!(format_tags(&tags), "service: mysql, env");
/// ```
pub fn format_tags(tags: &[ProblemTag]) -> String {
    let pairs: Vec<String> = tags
        .iter()
        .map(|t| {
            if t.value.is_empty() {
                t.tag.clone()
            } else {
                format!("{}: {}", t.tag, t.value)
            }
        })
        .collect();
    pairs.join(", ")
}

/// An acknowledgement/update action recorded against a problem.
/// Append-only: never mutated after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProblemUpdate {
    pub id: String,
    pub problem_id: String,
    /// The acting user. The user record may no longer be accessible when
    /// the update is displayed; consumers degrade to a placeholder.
    pub user_id: String,
    pub message: Option<String>,
    pub flags: UpdateFlags,
    pub clock: DateTime<Utc>,
}

/// Link to the recovery event that closed a problem. Presence of this link
/// is what makes a problem resolved; `clock` is the resolution timestamp.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recovery {
    pub event_id: String,
    pub clock: DateTime<Utc>,
}

/// An open (or recently resolved) event instance produced by a trigger.
///
/// This layer only reads problems; they are created by the external
/// trigger evaluator, updated by acknowledgement actions and closed by
/// recovery events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Problem {
    /// Snowflake ID, time-ordered.
    pub id: String,
    pub trigger_id: String,
    pub name: String,
    pub severity: Severity,
    /// When the problem started.
    pub clock: DateTime<Utc>,
    /// Set once the problem is closed by a recovery event. Terminal.
    pub recovery: Option<Recovery>,
    pub acknowledged: bool,
    /// Order-preserving tag list.
    pub tags: Vec<ProblemTag>,
    /// Update history, oldest first.
    pub updates: Vec<ProblemUpdate>,
}

impl Problem {
    /// Numeric form of the snowflake ID, for "most recent first" ordering.
    /// Falls back to 0 for malformed ids rather than failing display.
    pub fn id_num(&self) -> i64 {
        self.id.parse().unwrap_or(0)
    }
}

/// Effective display status of a problem. See the status classifier in
/// `watchdesk-problem` for the transition rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisplayStatus {
    Problem,
    Closing,
    Resolved,
}

impl std::fmt::Display for DisplayStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DisplayStatus::Problem => write!(f, "problem"),
            DisplayStatus::Closing => write!(f, "closing"),
            DisplayStatus::Resolved => write!(f, "resolved"),
        }
    }
}

/// A monitored host.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Host {
    pub id: String,
    pub name: String,
    /// Host-group memberships. A host may belong to several groups, which
    /// is why a problem can fan out to multiple group buckets.
    pub group_ids: Vec<String>,
    pub in_maintenance: bool,
}

/// A named collection of hosts used for filtering and aggregation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostGroup {
    pub id: String,
    pub name: String,
}

/// The rule that produced a problem.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trigger {
    pub id: String,
    pub severity: Severity,
    /// Hosts this trigger's expression references.
    pub host_ids: Vec<String>,
    /// Disabled triggers are skipped by the filter resolver.
    pub enabled: bool,
}

/// A user account, looked up only to render acknowledgement actors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub name: String,
}

use chrono::{DateTime, Utc};
use watchdesk_common::types::{DisplayStatus, Problem, UpdateFlags};

/// Classifies a problem's effective display status.
///
/// A pure function of the recovery link and the update history:
/// - a recovery event makes the problem RESOLVED, terminally — later
///   acknowledgements never change it back;
/// - an unresolved problem with a close-action update is CLOSING (the
///   close was requested but the server has not produced the recovery
///   event yet);
/// - otherwise PROBLEM.
pub fn classify(problem: &Problem) -> DisplayStatus {
    if problem.recovery.is_some() {
        return DisplayStatus::Resolved;
    }
    if problem
        .updates
        .iter()
        .any(|u| u.flags.contains(UpdateFlags::CLOSE))
    {
        return DisplayStatus::Closing;
    }
    DisplayStatus::Problem
}

/// The timestamp a view should display for the problem's current state:
/// the recovery clock once resolved, the current time while closing
/// (the close is in progress right now), and the start clock otherwise.
pub fn effective_clock(problem: &Problem, now: DateTime<Utc>) -> DateTime<Utc> {
    match classify(problem) {
        DisplayStatus::Resolved => problem
            .recovery
            .as_ref()
            .map(|r| r.clock)
            .unwrap_or(problem.clock),
        DisplayStatus::Closing => now,
        DisplayStatus::Problem => problem.clock,
    }
}

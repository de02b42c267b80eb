use crate::config::EngineConfig;
use crate::enrich::{enrich, order_tags, INACCESSIBLE_USER};
use crate::filter::{resolve, AckFilter, ProblemFilter};
use crate::status::{classify, effective_clock};
use crate::{build_dashboard, list_problems};
use chrono::{Duration, Utc};
use watchdesk_common::types::{
    DisplayStatus, Host, HostGroup, Problem, ProblemTag, ProblemUpdate, Recovery, Severity,
    Trigger, UpdateFlags, User,
};
use watchdesk_storage::sqlite::SqliteStore;

fn store() -> SqliteStore {
    watchdesk_common::id::init(1, 1);
    SqliteStore::in_memory().unwrap()
}

fn group(store: &SqliteStore, id: &str, name: &str) {
    store
        .insert_group(&HostGroup {
            id: id.into(),
            name: name.into(),
        })
        .unwrap();
}

fn host(store: &SqliteStore, id: &str, groups: &[&str]) {
    store
        .insert_host(&Host {
            id: id.into(),
            name: id.into(),
            group_ids: groups.iter().map(|g| g.to_string()).collect(),
            in_maintenance: false,
        })
        .unwrap();
}

fn trigger(store: &SqliteStore, id: &str, severity: Severity, hosts: &[&str]) {
    store
        .insert_trigger(&Trigger {
            id: id.into(),
            severity,
            host_ids: hosts.iter().map(|h| h.to_string()).collect(),
            enabled: true,
        })
        .unwrap();
}

fn problem(trigger: &str, name: &str, severity: Severity) -> Problem {
    Problem {
        id: watchdesk_common::id::next_id(),
        trigger_id: trigger.into(),
        name: name.into(),
        severity,
        clock: Utc::now() - Duration::minutes(5),
        recovery: None,
        acknowledged: false,
        tags: Vec::new(),
        updates: Vec::new(),
    }
}

fn update(problem_id: &str, user: &str, flags: UpdateFlags) -> ProblemUpdate {
    ProblemUpdate {
        id: watchdesk_common::id::next_id(),
        problem_id: problem_id.into(),
        user_id: user.into(),
        message: None,
        flags,
        clock: Utc::now(),
    }
}

// ---- Status classifier ----

#[test]
fn classifier_truth_table() {
    let mut p = problem("t1", "p", Severity::High);
    assert_eq!(classify(&p), DisplayStatus::Problem);

    p.updates.push(update(&p.id, "u1", UpdateFlags::CLOSE));
    assert_eq!(classify(&p), DisplayStatus::Closing);

    p.recovery = Some(Recovery {
        event_id: "r1".into(),
        clock: Utc::now(),
    });
    assert_eq!(classify(&p), DisplayStatus::Resolved);
}

#[test]
fn resolved_is_terminal() {
    let mut p = problem("t1", "p", Severity::High);
    p.recovery = Some(Recovery {
        event_id: "r1".into(),
        clock: Utc::now(),
    });
    // Acknowledgements (even close requests) after resolution change nothing
    p.updates
        .push(update(&p.id, "u1", UpdateFlags::ACKNOWLEDGE | UpdateFlags::CLOSE));
    assert_eq!(classify(&p), DisplayStatus::Resolved);
}

#[test]
fn closing_uses_current_time_as_effective_clock() {
    let mut p = problem("t1", "p", Severity::High);
    p.updates.push(update(&p.id, "u1", UpdateFlags::CLOSE));
    let now = Utc::now();
    assert_eq!(classify(&p), DisplayStatus::Closing);
    assert_eq!(effective_clock(&p, now), now);
    assert_ne!(effective_clock(&p, now), p.clock);
}

#[test]
fn resolved_uses_recovery_clock() {
    let mut p = problem("t1", "p", Severity::High);
    let r_clock = Utc::now() - Duration::minutes(1);
    p.recovery = Some(Recovery {
        event_id: "r1".into(),
        clock: r_clock,
    });
    assert_eq!(effective_clock(&p, Utc::now()), r_clock);
}

// ---- Tag ordering ----

#[test]
fn tag_ordering_filter_first_then_priority_then_natural() {
    let tags = vec![
        ProblemTag::new("env", "prod"),
        ProblemTag::new("team", "db"),
        ProblemTag::new("service", "mysql"),
        ProblemTag::new("rack", "r12"),
    ];
    let filter_tags = vec![ProblemTag::new("service", "")];
    let priority = vec!["team".to_string(), "env".to_string()];

    let ordered = order_tags(&tags, &filter_tags, &priority);
    let keys: Vec<&str> = ordered.iter().map(|t| t.tag.as_str()).collect();
    // filter match first, then priority order, then natural order
    assert_eq!(keys, vec!["service", "team", "env", "rack"]);
}

#[test]
fn tag_ordering_is_idempotent() {
    let tags = vec![
        ProblemTag::new("env", "prod"),
        ProblemTag::new("team", "db"),
        ProblemTag::new("service", "mysql"),
        ProblemTag::new("rack", "r12"),
        ProblemTag::new("env", "staging"),
    ];
    let filter_tags = vec![ProblemTag::new("env", "prod")];
    let priority = vec!["service".to_string()];

    let once = order_tags(&tags, &filter_tags, &priority);
    let twice = order_tags(&once, &filter_tags, &priority);
    assert_eq!(once, twice);
}

#[test]
fn tag_filter_value_must_match_when_present() {
    let tags = vec![
        ProblemTag::new("env", "staging"),
        ProblemTag::new("env", "prod"),
    ];
    let filter_tags = vec![ProblemTag::new("env", "prod")];

    let ordered = order_tags(&tags, &filter_tags, &[]);
    assert_eq!(ordered[0].value, "prod");
    assert_eq!(ordered[1].value, "staging");
}

// ---- Filter resolver ----

#[test]
fn severity_defaults_to_full_range() {
    let s = store();
    let resolved = resolve(&s, &EngineConfig::default(), &ProblemFilter::default()).unwrap();
    assert_eq!(resolved.severities, Severity::ALL.to_vec());
    assert!(!resolved.matches_nothing());
}

#[test]
fn exclude_groups_subtracts_hosts() {
    let s = store();
    group(&s, "g5", "Group five");
    group(&s, "g6", "Group six");
    host(&s, "h-five", &["g5"]);
    host(&s, "h-six-a", &["g6"]);
    host(&s, "h-six-b", &["g6"]);

    let filter = ProblemFilter {
        group_ids: Some(vec!["g5".into(), "g6".into()]),
        exclude_group_ids: Some(vec!["g5".into()]),
        ..Default::default()
    };
    let resolved = resolve(&s, &EngineConfig::default(), &filter).unwrap();
    let mut hosts = resolved.host_ids.unwrap();
    hosts.sort();
    assert_eq!(hosts, vec!["h-six-a".to_string(), "h-six-b".to_string()]);
}

#[test]
fn explicit_host_filter_ignores_group_exclusion() {
    let s = store();
    group(&s, "g5", "Group five");
    host(&s, "h-five", &["g5"]);

    let filter = ProblemFilter {
        exclude_group_ids: Some(vec!["g5".into()]),
        host_ids: Some(vec!["h-five".into()]),
        ..Default::default()
    };
    let resolved = resolve(&s, &EngineConfig::default(), &filter).unwrap();
    assert_eq!(resolved.host_ids, Some(vec!["h-five".to_string()]));
}

#[test]
fn name_filter_resolves_to_triggers_and_supersedes_hosts() {
    let s = store();
    group(&s, "g1", "Group");
    host(&s, "h1", &["g1"]);
    trigger(&s, "t-mysql", Severity::High, &["h1"]);
    s.insert_problem(&problem("t-mysql", "MySQL is down", Severity::High))
        .unwrap();

    let filter = ProblemFilter {
        group_ids: Some(vec!["g1".into()]),
        host_ids: Some(vec!["h1".into()]),
        name: Some("mysql".into()),
        ..Default::default()
    };
    let resolved = resolve(&s, &EngineConfig::default(), &filter).unwrap();
    assert_eq!(resolved.trigger_ids, Some(vec!["t-mysql".to_string()]));
    assert!(resolved.host_ids.is_none());
}

#[test]
fn name_filter_omits_disabled_triggers() {
    let s = store();
    group(&s, "g1", "Group");
    host(&s, "h1", &["g1"]);
    trigger(&s, "t-live", Severity::High, &["h1"]);
    s.insert_trigger(&Trigger {
        id: "t-dead".into(),
        severity: Severity::High,
        host_ids: vec!["h1".into()],
        enabled: false,
    })
    .unwrap();
    s.insert_problem(&problem("t-live", "MySQL is down", Severity::High))
        .unwrap();
    s.insert_problem(&problem("t-dead", "MySQL is down again", Severity::High))
        .unwrap();

    let filter = ProblemFilter {
        name: Some("mysql".into()),
        ..Default::default()
    };
    let resolved = resolve(&s, &EngineConfig::default(), &filter).unwrap();
    assert_eq!(resolved.trigger_ids, Some(vec!["t-live".to_string()]));

    let (problems, _) =
        list_problems(&s, &s, &EngineConfig::default(), &filter, Utc::now()).unwrap();
    assert_eq!(problems.len(), 1);
    assert_eq!(problems[0].problem.trigger_id, "t-live");
}

#[test]
fn unmatched_name_filter_short_circuits() {
    let s = store();
    let filter = ProblemFilter {
        name: Some("no such problem".into()),
        ..Default::default()
    };
    let resolved = resolve(&s, &EngineConfig::default(), &filter).unwrap();
    assert!(resolved.matches_nothing());

    // Short-circuit means empty aggregates, not an error
    let dashboard =
        build_dashboard(&s, &s, &EngineConfig::default(), &filter, Utc::now()).unwrap();
    assert!(dashboard.problems.is_empty());
    assert!(!dashboard.truncated);
}

#[test]
fn maintenance_hosts_dropped_unless_requested() {
    let s = store();
    group(&s, "g1", "Group");
    host(&s, "h-ok", &["g1"]);
    s.insert_host(&Host {
        id: "h-maint".into(),
        name: "h-maint".into(),
        group_ids: vec!["g1".into()],
        in_maintenance: true,
    })
    .unwrap();

    let mut filter = ProblemFilter {
        group_ids: Some(vec!["g1".into()]),
        ..Default::default()
    };
    let resolved = resolve(&s, &EngineConfig::default(), &filter).unwrap();
    assert_eq!(resolved.host_ids, Some(vec!["h-ok".to_string()]));

    filter.show_maintenance = true;
    let resolved = resolve(&s, &EngineConfig::default(), &filter).unwrap();
    assert_eq!(resolved.host_ids.map(|h| h.len()), Some(2));
}

#[test]
fn ack_filter_respects_ack_enabled() {
    let s = store();
    let filter = ProblemFilter {
        ack: AckFilter::Unacknowledged,
        ..Default::default()
    };

    let resolved = resolve(&s, &EngineConfig::default(), &filter).unwrap();
    assert!(resolved.unacknowledged_only);

    let config = EngineConfig {
        ack_enabled: false,
        ..Default::default()
    };
    let resolved = resolve(&s, &config, &filter).unwrap();
    assert!(!resolved.unacknowledged_only);
}

// ---- Aggregator ----

#[test]
fn count_exact_sample_capped() {
    // Group A with 3 unacknowledged high problems and cap=2:
    // count=3, count_unack=3, problems_unack length=2.
    let s = store();
    group(&s, "ga", "Group A");
    host(&s, "h1", &["ga"]);
    trigger(&s, "t1", Severity::High, &["h1"]);
    for i in 0..3 {
        s.insert_problem(&problem("t1", &format!("p{i}"), Severity::High))
            .unwrap();
    }

    let config = EngineConfig {
        sample_cap: 2,
        ..Default::default()
    };
    let dashboard =
        build_dashboard(&s, &s, &config, &ProblemFilter::default(), Utc::now()).unwrap();

    assert_eq!(dashboard.groups.len(), 1);
    let bucket = dashboard.groups[0].bucket(Severity::High);
    assert_eq!(bucket.count, 3);
    assert_eq!(bucket.count_unack, 3);
    assert_eq!(bucket.problems.len(), 2);
    assert_eq!(bucket.problems_unack.len(), 2);
    // Sample never exceeds count
    assert!(bucket.problems.len() as u64 <= bucket.count);
    // Only sampled problems get enriched
    assert_eq!(dashboard.problems.len(), 2);
}

#[test]
fn one_increment_per_problem_group_pair() {
    // A trigger with two hosts in the same group must count once in that
    // group; a host in two groups fans the problem out to both.
    let s = store();
    group(&s, "ga", "Group A");
    group(&s, "gb", "Group B");
    host(&s, "h1", &["ga"]);
    host(&s, "h2", &["ga", "gb"]);
    trigger(&s, "t1", Severity::Average, &["h1", "h2"]);
    s.insert_problem(&problem("t1", "p0", Severity::Average))
        .unwrap();

    let dashboard = build_dashboard(
        &s,
        &s,
        &EngineConfig::default(),
        &ProblemFilter::default(),
        Utc::now(),
    )
    .unwrap();

    let ga = dashboard
        .groups
        .iter()
        .find(|g| g.group.id == "ga")
        .unwrap();
    let gb = dashboard
        .groups
        .iter()
        .find(|g| g.group.id == "gb")
        .unwrap();
    assert_eq!(ga.bucket(Severity::Average).count, 1);
    assert_eq!(gb.bucket(Severity::Average).count, 1);
    // The problem is visible in two groups but enriched once
    assert_eq!(dashboard.problems.len(), 1);
}

#[test]
fn acknowledged_problems_counted_in_total_only() {
    let s = store();
    group(&s, "ga", "Group A");
    host(&s, "h1", &["ga"]);
    trigger(&s, "t1", Severity::Disaster, &["h1"]);

    let mut acked = problem("t1", "acked", Severity::Disaster);
    acked.acknowledged = true;
    s.insert_problem(&acked).unwrap();
    s.insert_problem(&problem("t1", "open", Severity::Disaster))
        .unwrap();

    let dashboard = build_dashboard(
        &s,
        &s,
        &EngineConfig::default(),
        &ProblemFilter::default(),
        Utc::now(),
    )
    .unwrap();
    let bucket = dashboard.groups[0].bucket(Severity::Disaster);
    assert_eq!(bucket.count, 2);
    assert_eq!(bucket.count_unack, 1);
    assert_eq!(bucket.problems_unack.len(), 1);
}

#[test]
fn groups_without_problems_keep_zeroed_buckets() {
    let s = store();
    group(&s, "ga", "Group A");
    group(&s, "gb", "Group B");
    host(&s, "h1", &["ga"]);
    trigger(&s, "t1", Severity::Warning, &["h1"]);
    s.insert_problem(&problem("t1", "p0", Severity::Warning))
        .unwrap();

    let dashboard = build_dashboard(
        &s,
        &s,
        &EngineConfig::default(),
        &ProblemFilter::default(),
        Utc::now(),
    )
    .unwrap();
    assert_eq!(dashboard.groups.len(), 2);
    let gb = dashboard
        .groups
        .iter()
        .find(|g| g.group.id == "gb")
        .unwrap();
    assert_eq!(gb.total(), 0);
}

// ---- Enricher ----

#[test]
fn enrich_renders_actor_and_flag_union() {
    let s = store();
    s.insert_user(&User {
        id: "u-alice".into(),
        name: "Alice".into(),
    })
    .unwrap();

    let mut p = problem("t1", "p", Severity::High);
    p.updates
        .push(update(&p.id, "u-alice", UpdateFlags::ACKNOWLEDGE));
    p.updates
        .push(update(&p.id, "u-alice", UpdateFlags::MESSAGE));

    let enriched = enrich(
        &s,
        &EngineConfig::default(),
        &ProblemFilter::default(),
        vec![p],
        Utc::now(),
    )
    .unwrap();

    let actions = enriched[0].actions.as_ref().unwrap();
    assert_eq!(actions.last_actor, "Alice");
    assert!(actions.flags.contains(UpdateFlags::ACKNOWLEDGE));
    assert!(actions.flags.contains(UpdateFlags::MESSAGE));
    assert!(!actions.in_closing);
}

#[test]
fn enrich_degrades_missing_user_to_placeholder() {
    let s = store();
    let mut p = problem("t1", "p", Severity::High);
    p.updates.push(update(&p.id, "u-ghost", UpdateFlags::CLOSE));

    let enriched = enrich(
        &s,
        &EngineConfig::default(),
        &ProblemFilter::default(),
        vec![p],
        Utc::now(),
    )
    .unwrap();

    let actions = enriched[0].actions.as_ref().unwrap();
    assert_eq!(actions.last_actor, INACCESSIBLE_USER);
    assert!(actions.in_closing);
    assert_eq!(enriched[0].status, DisplayStatus::Closing);
}

#[test]
fn enrich_caps_tags_with_overflow_marker() {
    let s = store();
    let mut p = problem("t1", "p", Severity::High);
    p.tags = vec![
        ProblemTag::new("a", "1"),
        ProblemTag::new("b", "2"),
        ProblemTag::new("c", "3"),
        ProblemTag::new("d", "4"),
    ];

    let config = EngineConfig {
        max_tags_displayed: 3,
        ..Default::default()
    };
    let enriched = enrich(
        &s,
        &config,
        &ProblemFilter::default(),
        vec![p],
        Utc::now(),
    )
    .unwrap();

    assert_eq!(enriched[0].tags.tags.len(), 3);
    assert!(enriched[0].tags.overflow);
}

// ---- End to end ----

#[test]
fn unack_mode_filters_at_query_level() {
    let s = store();
    group(&s, "ga", "Group A");
    host(&s, "h1", &["ga"]);
    trigger(&s, "t1", Severity::High, &["h1"]);

    let mut acked = problem("t1", "acked", Severity::High);
    acked.acknowledged = true;
    s.insert_problem(&acked).unwrap();
    s.insert_problem(&problem("t1", "open", Severity::High))
        .unwrap();

    let filter = ProblemFilter {
        ack: AckFilter::Unacknowledged,
        ..Default::default()
    };
    let (problems, truncated) = list_problems(
        &s,
        &s,
        &EngineConfig::default(),
        &filter,
        Utc::now(),
    )
    .unwrap();
    assert!(!truncated);
    assert_eq!(problems.len(), 1);
    assert_eq!(problems[0].problem.name, "open");
}

#[test]
fn truncation_indicator_set_when_cap_exceeded() {
    let s = store();
    group(&s, "ga", "Group A");
    host(&s, "h1", &["ga"]);
    trigger(&s, "t1", Severity::Information, &["h1"]);
    for i in 0..5 {
        s.insert_problem(&problem("t1", &format!("p{i}"), Severity::Information))
            .unwrap();
    }

    let config = EngineConfig {
        search_limit: 3,
        ..Default::default()
    };
    let (problems, truncated) =
        list_problems(&s, &s, &config, &ProblemFilter::default(), Utc::now()).unwrap();
    assert!(truncated);
    assert_eq!(problems.len(), 3);
    // Most recent first
    assert_eq!(problems[0].problem.name, "p4");
}

use anyhow::Result;
use chrono::{Duration, Utc};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use tokio::signal;
use tracing_subscriber::EnvFilter;
use watchdesk_common::types::{Host, HostGroup, Problem, ProblemTag, Severity, Trigger, User};
use watchdesk_server::app;
use watchdesk_server::config::{self, SeedFile};
use watchdesk_server::state::AppState;
use watchdesk_storage::sqlite::SqliteStore;

#[allow(clippy::print_stderr)]
fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  watchdesk-server [config.toml]                    Start the server");
    eprintln!("  watchdesk-server seed <config.toml> <seed.json>   Load inventory and problems from a seed file");
}

#[tokio::main]
async fn main() -> Result<()> {
    watchdesk_common::id::init(1, 1);

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("watchdesk=info".parse()?))
        .init();

    let args: Vec<String> = std::env::args().collect();

    match args.get(1).map(|s| s.as_str()) {
        Some("seed") => {
            let config_path = args.get(2).ok_or_else(|| {
                print_usage();
                anyhow::anyhow!("seed requires <config.toml> and <seed.json> arguments")
            })?;
            let seed_path = args.get(3).ok_or_else(|| {
                print_usage();
                anyhow::anyhow!("seed requires <seed.json> argument")
            })?;
            run_seed(config_path, seed_path)
        }
        Some("--help" | "-h") => {
            print_usage();
            Ok(())
        }
        _ => {
            let config_path = args
                .get(1)
                .map(|s| s.as_str())
                .unwrap_or("config/server.toml");
            run_server(config_path).await
        }
    }
}

/// Load host groups, hosts, triggers, users and problems from a JSON seed
/// file. Intended for demo installs and local development.
fn run_seed(config_path: &str, seed_path: &str) -> Result<()> {
    let config = config::ServerConfig::load(config_path)?;
    let store = SqliteStore::new(Path::new(&config.db_path))?;

    let seed_content = std::fs::read_to_string(seed_path)
        .map_err(|e| anyhow::anyhow!("Failed to read seed file '{}': {}", seed_path, e))?;
    let seed: SeedFile = serde_json::from_str(&seed_content)
        .map_err(|e| anyhow::anyhow!("Failed to parse seed file '{}': {}", seed_path, e))?;

    for g in &seed.groups {
        store.insert_group(&HostGroup {
            id: g.id.clone(),
            name: g.name.clone(),
        })?;
    }
    for h in &seed.hosts {
        store.insert_host(&Host {
            id: h.id.clone(),
            name: h.name.clone(),
            group_ids: h.group_ids.clone(),
            in_maintenance: h.in_maintenance,
        })?;
    }
    for t in &seed.triggers {
        store.insert_trigger(&Trigger {
            id: t.id.clone(),
            severity: parse_seed_severity(&t.severity)?,
            host_ids: t.host_ids.clone(),
            enabled: t.enabled,
        })?;
    }
    for u in &seed.users {
        store.insert_user(&User {
            id: u.id.clone(),
            name: u.name.clone(),
        })?;
    }

    let mut problems_created = 0u32;
    for p in &seed.problems {
        let problem = Problem {
            id: watchdesk_common::id::next_id().to_string(),
            trigger_id: p.trigger_id.clone(),
            name: p.name.clone(),
            severity: parse_seed_severity(&p.severity)?,
            clock: Utc::now() - Duration::seconds(p.age_secs),
            recovery: None,
            acknowledged: p.acknowledged,
            tags: p
                .tags
                .iter()
                .map(|t| ProblemTag::new(t.tag.clone(), t.value.clone()))
                .collect(),
            updates: Vec::new(),
        };
        match store.insert_problem(&problem) {
            Ok(()) => problems_created += 1,
            Err(e) => tracing::error!(name = %p.name, error = %e, "Failed to create problem"),
        }
    }

    tracing::info!(
        groups = seed.groups.len(),
        hosts = seed.hosts.len(),
        triggers = seed.triggers.len(),
        users = seed.users.len(),
        problems_created,
        "seed completed"
    );
    Ok(())
}

fn parse_seed_severity(s: &str) -> Result<Severity> {
    s.parse::<Severity>()
        .map_err(|e| anyhow::anyhow!("Invalid severity '{}': {}", s, e))
}

async fn run_server(config_path: &str) -> Result<()> {
    let config = config::ServerConfig::load(config_path)?;

    tracing::info!(
        http_port = config.http_port,
        db = %config.db_path,
        "watchdesk-server starting"
    );

    let store = Arc::new(SqliteStore::new(Path::new(&config.db_path))?);
    let state = AppState::new(store, config.clone());

    let http_addr: SocketAddr = format!("0.0.0.0:{}", config.http_port).parse()?;
    let app = app::build_http_app(state);
    let http_listener = tokio::net::TcpListener::bind(http_addr).await?;
    let http_server = axum::serve(
        http_listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    );

    tracing::info!(http = %http_addr, "Server started");

    tokio::select! {
        result = http_server.with_graceful_shutdown(async { signal::ctrl_c().await.ok(); }) => {
            if let Err(e) = result {
                tracing::error!(error = %e, "HTTP server error");
            }
        }
        _ = signal::ctrl_c() => {
            tracing::info!("Shutting down gracefully");
        }
    }

    Ok(())
}

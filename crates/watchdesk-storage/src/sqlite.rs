use crate::error::{Result, StorageError};
use crate::{Directory, ProblemQuery, ProblemStore};
use chrono::DateTime;
use rusqlite::Connection;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use watchdesk_common::types::{
    Host, HostGroup, Problem, ProblemTag, ProblemUpdate, Recovery, Severity, Trigger, UpdateFlags,
    User,
};

/// SQLite-backed store for problems and the monitored inventory.
///
/// A single connection behind a mutex is enough for this read-mostly,
/// request-scoped workload; WAL mode keeps concurrent readers cheap.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn new(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// In-memory store, used by tests and demo seeding.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn init_schema(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS host_groups (
                 id   TEXT PRIMARY KEY,
                 name TEXT NOT NULL
             );
             CREATE TABLE IF NOT EXISTS hosts (
                 id             TEXT PRIMARY KEY,
                 name           TEXT NOT NULL,
                 in_maintenance INTEGER NOT NULL DEFAULT 0
             );
             CREATE TABLE IF NOT EXISTS host_group_members (
                 host_id  TEXT NOT NULL,
                 group_id TEXT NOT NULL,
                 PRIMARY KEY (host_id, group_id)
             );
             CREATE TABLE IF NOT EXISTS triggers (
                 id       TEXT PRIMARY KEY,
                 severity TEXT NOT NULL,
                 enabled  INTEGER NOT NULL DEFAULT 1
             );
             CREATE TABLE IF NOT EXISTS trigger_hosts (
                 trigger_id TEXT NOT NULL,
                 host_id    TEXT NOT NULL,
                 PRIMARY KEY (trigger_id, host_id)
             );
             CREATE TABLE IF NOT EXISTS users (
                 id   TEXT PRIMARY KEY,
                 name TEXT NOT NULL
             );
             CREATE TABLE IF NOT EXISTS problems (
                 id           TEXT PRIMARY KEY,
                 id_num       INTEGER NOT NULL,
                 trigger_id   TEXT NOT NULL,
                 name         TEXT NOT NULL,
                 severity     TEXT NOT NULL,
                 clock        INTEGER NOT NULL,
                 r_event_id   TEXT,
                 r_clock      INTEGER,
                 acknowledged INTEGER NOT NULL DEFAULT 0,
                 tags         TEXT NOT NULL DEFAULT '[]'
             );
             CREATE INDEX IF NOT EXISTS idx_problems_trigger ON problems (trigger_id);
             CREATE INDEX IF NOT EXISTS idx_problems_id_num ON problems (id_num);
             CREATE TABLE IF NOT EXISTS problem_updates (
                 id         TEXT PRIMARY KEY,
                 problem_id TEXT NOT NULL,
                 user_id    TEXT NOT NULL,
                 message    TEXT,
                 flags      INTEGER NOT NULL,
                 clock      INTEGER NOT NULL
             );
             CREATE INDEX IF NOT EXISTS idx_updates_problem ON problem_updates (problem_id);",
        )?;
        Ok(())
    }

    // ---- Inventory write helpers (seeding and tests) ----

    pub fn insert_group(&self, group: &HostGroup) -> Result<()> {
        self.conn().execute(
            "INSERT OR REPLACE INTO host_groups (id, name) VALUES (?1, ?2)",
            rusqlite::params![&group.id, &group.name],
        )?;
        Ok(())
    }

    pub fn insert_host(&self, host: &Host) -> Result<()> {
        let conn = self.conn();
        conn.execute(
            "INSERT OR REPLACE INTO hosts (id, name, in_maintenance) VALUES (?1, ?2, ?3)",
            rusqlite::params![&host.id, &host.name, host.in_maintenance],
        )?;
        conn.execute(
            "DELETE FROM host_group_members WHERE host_id = ?1",
            rusqlite::params![&host.id],
        )?;
        let mut stmt = conn.prepare_cached(
            "INSERT INTO host_group_members (host_id, group_id) VALUES (?1, ?2)",
        )?;
        for group_id in &host.group_ids {
            stmt.execute(rusqlite::params![&host.id, group_id])?;
        }
        Ok(())
    }

    pub fn insert_trigger(&self, trigger: &Trigger) -> Result<()> {
        let conn = self.conn();
        conn.execute(
            "INSERT OR REPLACE INTO triggers (id, severity, enabled) VALUES (?1, ?2, ?3)",
            rusqlite::params![&trigger.id, trigger.severity.to_string(), trigger.enabled],
        )?;
        conn.execute(
            "DELETE FROM trigger_hosts WHERE trigger_id = ?1",
            rusqlite::params![&trigger.id],
        )?;
        let mut stmt = conn
            .prepare_cached("INSERT INTO trigger_hosts (trigger_id, host_id) VALUES (?1, ?2)")?;
        for host_id in &trigger.host_ids {
            stmt.execute(rusqlite::params![&trigger.id, host_id])?;
        }
        Ok(())
    }

    pub fn insert_user(&self, user: &User) -> Result<()> {
        self.conn().execute(
            "INSERT OR REPLACE INTO users (id, name) VALUES (?1, ?2)",
            rusqlite::params![&user.id, &user.name],
        )?;
        Ok(())
    }

    pub fn insert_problem(&self, problem: &Problem) -> Result<()> {
        let tags_json = serde_json::to_string(&problem.tags)?;
        let conn = self.conn();
        conn.execute(
            "INSERT OR REPLACE INTO problems
                 (id, id_num, trigger_id, name, severity, clock, r_event_id, r_clock, acknowledged, tags)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            rusqlite::params![
                &problem.id,
                problem.id_num(),
                &problem.trigger_id,
                &problem.name,
                problem.severity.to_string(),
                problem.clock.timestamp_millis(),
                problem.recovery.as_ref().map(|r| r.event_id.clone()),
                problem.recovery.as_ref().map(|r| r.clock.timestamp_millis()),
                problem.acknowledged,
                tags_json,
            ],
        )?;
        let mut stmt = conn.prepare_cached(
            "INSERT OR REPLACE INTO problem_updates (id, problem_id, user_id, message, flags, clock)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )?;
        for update in &problem.updates {
            stmt.execute(rusqlite::params![
                &update.id,
                &update.problem_id,
                &update.user_id,
                &update.message,
                update.flags.bits(),
                update.clock.timestamp_millis(),
            ])?;
        }
        Ok(())
    }

    /// Appends an acknowledgement/update action. The update record itself is
    /// append-only; only the problem's `acknowledged` flag is adjusted when
    /// the action carries an (un)acknowledge bit.
    pub fn add_update(&self, update: &ProblemUpdate) -> Result<()> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO problem_updates (id, problem_id, user_id, message, flags, clock)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            rusqlite::params![
                &update.id,
                &update.problem_id,
                &update.user_id,
                &update.message,
                update.flags.bits(),
                update.clock.timestamp_millis(),
            ],
        )?;
        if update.flags.contains(UpdateFlags::ACKNOWLEDGE) {
            conn.execute(
                "UPDATE problems SET acknowledged = 1 WHERE id = ?1",
                rusqlite::params![&update.problem_id],
            )?;
        } else if update.flags.contains(UpdateFlags::UNACKNOWLEDGE) {
            conn.execute(
                "UPDATE problems SET acknowledged = 0 WHERE id = ?1",
                rusqlite::params![&update.problem_id],
            )?;
        }
        Ok(())
    }

    /// Links a recovery event to a problem, closing it. Unlike the read
    /// paths, resolving a problem that does not exist is an error.
    pub fn resolve_problem(&self, problem_id: &str, recovery: &Recovery) -> Result<()> {
        let affected = self.conn().execute(
            "UPDATE problems SET r_event_id = ?1, r_clock = ?2 WHERE id = ?3",
            rusqlite::params![
                &recovery.event_id,
                recovery.clock.timestamp_millis(),
                problem_id
            ],
        )?;
        if affected == 0 {
            return Err(StorageError::NotFound {
                entity: "problem",
                id: problem_id.to_string(),
            });
        }
        Ok(())
    }

    // ---- Query building ----

    /// Appends `AND <column> IN (?, ?, ...)` with positional parameters.
    /// An empty value list matches nothing, which is the short-circuit
    /// behavior resolved-but-empty predicate sets rely on.
    fn push_in_clause(
        sql: &mut String,
        params: &mut Vec<Box<dyn rusqlite::types::ToSql>>,
        column: &str,
        values: &[String],
    ) {
        if values.is_empty() {
            sql.push_str(" AND 0");
            return;
        }
        sql.push_str(" AND ");
        sql.push_str(column);
        sql.push_str(" IN (");
        for (i, value) in values.iter().enumerate() {
            if i > 0 {
                sql.push(',');
            }
            sql.push_str(&format!("?{}", params.len() + 1));
            params.push(Box::new(value.clone()));
        }
        sql.push(')');
    }

    fn build_where(query: &ProblemQuery) -> (String, Vec<Box<dyn rusqlite::types::ToSql>>) {
        let mut sql = String::from(" WHERE 1=1");
        let mut params: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();

        if let Some(trigger_ids) = &query.trigger_ids {
            Self::push_in_clause(&mut sql, &mut params, "trigger_id", trigger_ids);
        }
        if let Some(host_ids) = &query.host_ids {
            if host_ids.is_empty() {
                sql.push_str(" AND 0");
            } else {
                let mut sub = String::new();
                Self::push_in_clause(&mut sub, &mut params, "host_id", host_ids);
                // sub starts with " AND host_id IN (...)"; reuse the IN list
                let in_list = sub.trim_start_matches(" AND ");
                sql.push_str(&format!(
                    " AND trigger_id IN (SELECT trigger_id FROM trigger_hosts WHERE {in_list})"
                ));
            }
        }
        if !query.severities.is_empty() && query.severities.len() < Severity::ALL.len() {
            let names: Vec<String> = query.severities.iter().map(|s| s.to_string()).collect();
            Self::push_in_clause(&mut sql, &mut params, "severity", &names);
        }
        if query.unacknowledged_only {
            sql.push_str(" AND acknowledged = 0");
        }
        if let Some(name) = &query.name_contains {
            sql.push_str(&format!(" AND name LIKE ?{}", params.len() + 1));
            params.push(Box::new(format!("%{name}%")));
        }

        (sql, params)
    }

    fn load_updates(&self, conn: &Connection, problem_id: &str) -> Result<Vec<ProblemUpdate>> {
        let mut stmt = conn.prepare_cached(
            "SELECT id, user_id, message, flags, clock FROM problem_updates
             WHERE problem_id = ?1 ORDER BY clock ASC, id ASC",
        )?;
        let rows = stmt.query_map(rusqlite::params![problem_id], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, Option<String>>(2)?,
                row.get::<_, i64>(3)?,
                row.get::<_, i64>(4)?,
            ))
        })?;

        let mut updates = Vec::new();
        for row in rows {
            let (id, user_id, message, flags, clock_ms) = row?;
            updates.push(ProblemUpdate {
                id,
                problem_id: problem_id.to_string(),
                user_id,
                message,
                flags: UpdateFlags(flags as u32),
                clock: DateTime::from_timestamp_millis(clock_ms).unwrap_or_default(),
            });
        }
        Ok(updates)
    }

    fn load_hosts_by_ids(&self, ids: &[String]) -> Result<Vec<Host>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let conn = self.conn();
        let mut sql = String::from("SELECT id, name, in_maintenance FROM hosts WHERE 1=1");
        let mut params: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();
        Self::push_in_clause(&mut sql, &mut params, "id", ids);
        sql.push_str(" ORDER BY name ASC");

        let param_refs: Vec<&dyn rusqlite::types::ToSql> =
            params.iter().map(|p| p.as_ref()).collect();
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(param_refs.as_slice(), |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, bool>(2)?,
            ))
        })?;

        let mut hosts = Vec::new();
        for row in rows {
            let (id, name, in_maintenance) = row?;
            hosts.push(Host {
                id,
                name,
                group_ids: Vec::new(),
                in_maintenance,
            });
        }

        let mut member_stmt = conn.prepare_cached(
            "SELECT group_id FROM host_group_members WHERE host_id = ?1 ORDER BY group_id",
        )?;
        for host in &mut hosts {
            let groups = member_stmt
                .query_map(rusqlite::params![&host.id], |row| row.get::<_, String>(0))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            host.group_ids = groups;
        }
        Ok(hosts)
    }
}

impl ProblemStore for SqliteStore {
    fn query_problems(&self, query: &ProblemQuery) -> Result<Vec<Problem>> {
        let (where_sql, params) = Self::build_where(query);
        let mut sql = format!(
            "SELECT id, trigger_id, name, severity, clock, r_event_id, r_clock, acknowledged, tags
             FROM problems{where_sql} ORDER BY id_num DESC"
        );
        if let Some(limit) = query.limit {
            sql.push_str(&format!(" LIMIT {limit}"));
        }

        let conn = self.conn();
        let param_refs: Vec<&dyn rusqlite::types::ToSql> =
            params.iter().map(|p| p.as_ref()).collect();
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(param_refs.as_slice(), |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, i64>(4)?,
                row.get::<_, Option<String>>(5)?,
                row.get::<_, Option<i64>>(6)?,
                row.get::<_, bool>(7)?,
                row.get::<_, String>(8)?,
            ))
        })?;

        let mut problems = Vec::new();
        for row in rows {
            let (id, trigger_id, name, sev_str, clock_ms, r_event_id, r_clock_ms, acknowledged, tags_json) =
                row?;
            let severity: Severity = sev_str.parse().unwrap_or(Severity::NotClassified);
            let tags: Vec<ProblemTag> = serde_json::from_str(&tags_json).unwrap_or_default();
            let recovery = match (r_event_id, r_clock_ms) {
                (Some(event_id), Some(clock_ms)) => Some(Recovery {
                    event_id,
                    clock: DateTime::from_timestamp_millis(clock_ms).unwrap_or_default(),
                }),
                _ => None,
            };
            let updates = self.load_updates(&conn, &id)?;
            problems.push(Problem {
                id,
                trigger_id,
                name,
                severity,
                clock: DateTime::from_timestamp_millis(clock_ms).unwrap_or_default(),
                recovery,
                acknowledged,
                tags,
                updates,
            });
        }
        Ok(problems)
    }

    fn count_problems(&self, query: &ProblemQuery) -> Result<u64> {
        let (where_sql, params) = Self::build_where(query);
        let sql = format!("SELECT COUNT(*) FROM problems{where_sql}");
        let conn = self.conn();
        let param_refs: Vec<&dyn rusqlite::types::ToSql> =
            params.iter().map(|p| p.as_ref()).collect();
        let count: i64 = conn.query_row(&sql, param_refs.as_slice(), |row| row.get(0))?;
        Ok(count as u64)
    }
}

impl Directory for SqliteStore {
    fn list_groups(&self, ids: Option<&[String]>) -> Result<Vec<HostGroup>> {
        let conn = self.conn();
        let mut sql = String::from("SELECT id, name FROM host_groups WHERE 1=1");
        let mut params: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();
        if let Some(ids) = ids {
            Self::push_in_clause(&mut sql, &mut params, "id", ids);
        }
        sql.push_str(" ORDER BY name ASC");

        let param_refs: Vec<&dyn rusqlite::types::ToSql> =
            params.iter().map(|p| p.as_ref()).collect();
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(param_refs.as_slice(), |row| {
            Ok(HostGroup {
                id: row.get(0)?,
                name: row.get(1)?,
            })
        })?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }

    fn hosts_in_groups(&self, group_ids: &[String]) -> Result<Vec<Host>> {
        if group_ids.is_empty() {
            return Ok(Vec::new());
        }
        let host_ids = {
            let conn = self.conn();
            let mut sql =
                String::from("SELECT DISTINCT host_id FROM host_group_members WHERE 1=1");
            let mut params: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();
            Self::push_in_clause(&mut sql, &mut params, "group_id", group_ids);
            let param_refs: Vec<&dyn rusqlite::types::ToSql> =
                params.iter().map(|p| p.as_ref()).collect();
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(param_refs.as_slice(), |row| row.get::<_, String>(0))?;
            rows.collect::<std::result::Result<Vec<_>, _>>()?
        };
        self.load_hosts_by_ids(&host_ids)
    }

    fn get_hosts(&self, ids: &[String]) -> Result<Vec<Host>> {
        self.load_hosts_by_ids(ids)
    }

    fn get_triggers(&self, ids: &[String]) -> Result<Vec<Trigger>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let conn = self.conn();
        let mut sql = String::from("SELECT id, severity, enabled FROM triggers WHERE 1=1");
        let mut params: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();
        Self::push_in_clause(&mut sql, &mut params, "id", ids);

        let param_refs: Vec<&dyn rusqlite::types::ToSql> =
            params.iter().map(|p| p.as_ref()).collect();
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(param_refs.as_slice(), |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, bool>(2)?,
            ))
        })?;

        let mut triggers = Vec::new();
        for row in rows {
            let (id, sev_str, enabled) = row?;
            triggers.push(Trigger {
                id,
                severity: sev_str.parse().unwrap_or(Severity::NotClassified),
                host_ids: Vec::new(),
                enabled,
            });
        }

        let mut host_stmt = conn.prepare_cached(
            "SELECT host_id FROM trigger_hosts WHERE trigger_id = ?1 ORDER BY host_id",
        )?;
        for trigger in &mut triggers {
            let hosts = host_stmt
                .query_map(rusqlite::params![&trigger.id], |row| {
                    row.get::<_, String>(0)
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            trigger.host_ids = hosts;
        }
        Ok(triggers)
    }

    fn find_triggers_by_problem_name(&self, name: &str) -> Result<Vec<Trigger>> {
        let trigger_ids = {
            let conn = self.conn();
            let mut stmt = conn.prepare_cached(
                "SELECT DISTINCT trigger_id FROM problems WHERE name LIKE ?1",
            )?;
            let rows = stmt.query_map(rusqlite::params![format!("%{name}%")], |row| {
                row.get::<_, String>(0)
            })?;
            rows.collect::<std::result::Result<Vec<_>, _>>()?
        };
        let triggers = self.get_triggers(&trigger_ids)?;
        Ok(triggers.into_iter().filter(|t| t.enabled).collect())
    }

    fn get_user(&self, id: &str) -> Result<Option<User>> {
        let conn = self.conn();
        let mut stmt = conn.prepare_cached("SELECT id, name FROM users WHERE id = ?1")?;
        let mut rows = stmt.query_map(rusqlite::params![id], |row| {
            Ok(User {
                id: row.get(0)?,
                name: row.get(1)?,
            })
        })?;
        match rows.next() {
            Some(user) => Ok(Some(user?)),
            None => Ok(None),
        }
    }
}

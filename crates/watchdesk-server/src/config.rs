use serde::{Deserialize, Serialize};
use watchdesk_problem::config::EngineConfig;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_http_port")]
    pub http_port: u16,
    #[serde(default = "default_db_path")]
    pub db_path: String,

    /// CORS 允许的 origins 列表，为空时允许所有来源（开发模式）
    #[serde(default)]
    pub cors_allowed_origins: Vec<String>,

    /// 展示相关的引擎限制（行数上限、采样上限等）
    #[serde(default)]
    pub display: EngineConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_port: default_http_port(),
            db_path: default_db_path(),
            cors_allowed_origins: Vec::new(),
            display: EngineConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }
}

fn default_http_port() -> u16 {
    8080
}

fn default_db_path() -> String {
    "data/watchdesk.db".to_string()
}

// ---- Seed file types (used by the `seed` CLI subcommand) ----

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedFile {
    #[serde(default)]
    pub groups: Vec<SeedGroup>,
    #[serde(default)]
    pub hosts: Vec<SeedHost>,
    #[serde(default)]
    pub triggers: Vec<SeedTrigger>,
    #[serde(default)]
    pub users: Vec<SeedUser>,
    #[serde(default)]
    pub problems: Vec<SeedProblem>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedGroup {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedHost {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub group_ids: Vec<String>,
    #[serde(default)]
    pub in_maintenance: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedTrigger {
    pub id: String,
    #[serde(default = "default_seed_severity")]
    pub severity: String,
    #[serde(default)]
    pub host_ids: Vec<String>,
    #[serde(default = "default_seed_enabled")]
    pub enabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedUser {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedProblem {
    pub trigger_id: String,
    pub name: String,
    #[serde(default = "default_seed_severity")]
    pub severity: String,
    /// How long ago the problem started, in seconds.
    #[serde(default)]
    pub age_secs: i64,
    #[serde(default)]
    pub acknowledged: bool,
    #[serde(default)]
    pub tags: Vec<SeedTag>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedTag {
    pub tag: String,
    #[serde(default)]
    pub value: String,
}

fn default_seed_severity() -> String {
    "warning".to_string()
}

fn default_seed_enabled() -> bool {
    true
}

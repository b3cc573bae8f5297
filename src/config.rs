use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::gateway::GatewaySettings;
use crate::llm::{DEFAULT_OPENAI_BASE_URL, DEFAULT_OPENAI_MODEL};
use crate::security::{SqlGuard, DEFAULT_ROW_LIMIT};

/// Dynamic multi-target SQL query gateway
#[derive(Parser, Debug, Clone)]
#[command(name = "db-query", version, about, long_about = None)]
pub struct GatewayConfig {
    /// Address the HTTP server listens on
    #[arg(long, env = "DB_QUERY_BIND", default_value = "127.0.0.1:3000")]
    pub bind: SocketAddr,

    /// Directory holding the registry database
    #[arg(long, env = "DB_QUERY_DATA_DIR", default_value = "data")]
    pub data_dir: PathBuf,

    /// Enables natural-language queries when set
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub openai_api_key: Option<String>,

    #[arg(long, env = "OPENAI_BASE_URL", default_value = DEFAULT_OPENAI_BASE_URL)]
    pub openai_base_url: String,

    #[arg(long, env = "OPENAI_MODEL", default_value = DEFAULT_OPENAI_MODEL)]
    pub openai_model: String,

    #[arg(long, env = "DB_QUERY_CONNECT_TIMEOUT_SECS", default_value_t = 10)]
    pub connect_timeout_secs: u64,

    #[arg(long, env = "DB_QUERY_QUERY_TIMEOUT_SECS", default_value_t = 30)]
    pub query_timeout_secs: u64,

    #[arg(long, env = "DB_QUERY_LLM_TIMEOUT_SECS", default_value_t = 60)]
    pub llm_timeout_secs: u64,

    /// Row bound appended to queries without a LIMIT
    #[arg(long, env = "DB_QUERY_MAX_ROWS", default_value_t = DEFAULT_ROW_LIMIT)]
    pub max_rows: u64,
}

impl GatewayConfig {
    pub fn settings(&self) -> GatewaySettings {
        GatewaySettings {
            guard: SqlGuard::new(self.max_rows),
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            query_timeout: Duration::from_secs(self.query_timeout_secs),
        }
    }

    pub fn llm_timeout(&self) -> Duration {
        Duration::from_secs(self.llm_timeout_secs)
    }

    /// The API key, ignoring a blank value.
    pub fn api_key(&self) -> Option<&str> {
        self.openai_api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
    }
}

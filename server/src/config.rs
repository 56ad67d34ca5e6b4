use clap::parser::ValueSource;
use clap::{ArgMatches, CommandFactory, FromArgMatches, Parser};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::ffi::OsString;

/// HauzFlow real-time and messaging server
#[derive(Parser, Serialize, Deserialize, Clone, Debug)]
#[command(name = "hauzflow-server", version, about = "HauzFlow real-time and messaging server")]
pub struct Config {
    /// Port to listen on
    #[arg(long, env = "HAUZFLOW_PORT", default_value = "3000")]
    pub port: u16,

    /// Bind address
    #[arg(long, env = "HAUZFLOW_BIND_ADDRESS", default_value = "0.0.0.0")]
    pub bind_address: String,

    /// Path to TOML config file
    #[arg(long, default_value = "./hauzflow.toml")]
    pub config: String,

    /// Enable structured JSON logging (for Docker/production)
    #[arg(long, env = "HAUZFLOW_JSON_LOGS")]
    pub json_logs: bool,

    /// Output a commented TOML config template and exit
    #[arg(long)]
    pub generate_config: bool,

    /// Data directory for persistent state (SQLite database)
    #[arg(long, env = "HAUZFLOW_DATA_DIR", default_value = "./data")]
    pub data_dir: String,

    /// Deployment environment reported by GET /
    #[arg(long, env = "HAUZFLOW_ENVIRONMENT", default_value = "development")]
    pub environment: String,

    /// Origins allowed by CORS (comma separated)
    #[arg(
        long,
        env = "HAUZFLOW_ALLOWED_ORIGINS",
        value_delimiter = ',',
        default_value = "http://localhost:5173,http://localhost:3000"
    )]
    pub allowed_origins: Vec<String>,

    /// Real-time connection settings (loaded from [realtime] section in TOML)
    #[arg(skip)]
    #[serde(default = "default_realtime_config")]
    pub realtime: Option<RealtimeConfig>,
}

/// Settings for the WebSocket side-channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RealtimeConfig {
    /// Seconds between server pings (default: 30)
    #[serde(default = "default_ping_interval")]
    pub ping_interval_secs: u64,

    /// Seconds to wait for a pong before closing (default: 10)
    #[serde(default = "default_pong_timeout")]
    pub pong_timeout_secs: u64,

    /// Send the list of online users to a connection after it announces (default: true)
    #[serde(default = "default_presence_snapshot")]
    pub presence_snapshot: bool,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            ping_interval_secs: 30,
            pong_timeout_secs: 10,
            presence_snapshot: true,
        }
    }
}

fn default_ping_interval() -> u64 {
    30
}

fn default_pong_timeout() -> u64 {
    10
}

fn default_presence_snapshot() -> bool {
    true
}

fn default_realtime_config() -> Option<RealtimeConfig> {
    Some(RealtimeConfig::default())
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 3000,
            bind_address: "0.0.0.0".to_string(),
            config: "./hauzflow.toml".to_string(),
            json_logs: false,
            generate_config: false,
            data_dir: "./data".to_string(),
            environment: "development".to_string(),
            allowed_origins: vec![
                "http://localhost:5173".to_string(),
                "http://localhost:3000".to_string(),
            ],
            realtime: Some(RealtimeConfig::default()),
        }
    }
}

impl Config {
    /// Real-time settings, falling back to defaults when the section is absent.
    pub fn realtime(&self) -> RealtimeConfig {
        self.realtime.clone().unwrap_or_default()
    }

    /// Load config with layered precedence:
    /// built-in defaults < TOML file < env vars (HAUZFLOW_*) < CLI args
    pub fn load() -> Result<Self, figment::Error> {
        Self::load_from(std::env::args_os())
    }

    /// Same as `load`, with explicit command-line arguments.
    pub fn load_from<I, T>(args: I) -> Result<Self, figment::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let matches = Config::command().get_matches_from(args);
        let cli = Config::from_arg_matches(&matches).unwrap_or_else(|e| e.exit());
        let config_path = cli.config.clone();

        Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&config_path))
            // List values come through clap's value_delimiter instead.
            .merge(
                Env::prefixed("HAUZFLOW_")
                    .ignore(&["allowed_origins"])
                    .split("__"),
            )
            .merge(Serialized::defaults(explicit_args(&cli, &matches)?))
            .extract()
    }
}

/// CLI values the user actually supplied (flag or env), keyed by field name.
/// Clap defaults are left out so they cannot mask the TOML layer.
fn explicit_args(
    cli: &Config,
    matches: &ArgMatches,
) -> Result<serde_json::Map<String, serde_json::Value>, figment::Error> {
    let serde_json::Value::Object(mut all) =
        serde_json::to_value(cli).map_err(|e| figment::Error::from(e.to_string()))?
    else {
        return Ok(serde_json::Map::new());
    };

    Ok(matches
        .ids()
        .filter(|id| {
            matches!(
                matches.value_source(id.as_str()),
                Some(ValueSource::CommandLine | ValueSource::EnvVariable)
            )
        })
        .filter_map(|id| {
            let key = id.as_str().to_string();
            all.remove(&key).map(|value| (key, value))
        })
        .collect())
}

/// Generate a commented TOML config template
pub fn generate_config_template() -> String {
    r#"# HauzFlow Server Configuration
# Place this file at ./hauzflow.toml or specify with --config <path>
# All settings can be overridden via environment variables (HAUZFLOW_PORT, etc.)
# or CLI flags (--port, etc.)

# Server port (default: 3000)
# port = 3000

# Bind address (default: 0.0.0.0, all interfaces)
# bind_address = "0.0.0.0"

# Enable structured JSON logging for Docker/production
# json_logs = false

# Data directory for the SQLite database
# data_dir = "./data"

# Environment name reported by GET /
# environment = "development"

# Origins allowed to call the API from a browser
# allowed_origins = ["http://localhost:5173", "http://localhost:3000"]

# ---- Real-time (WebSocket) ----
# [realtime]

# Server ping interval and pong deadline, in seconds
# ping_interval_secs = 30
# pong_timeout_secs = 10

# Send the online-user list to a client right after it announces its identity
# presence_snapshot = true
"#
    .to_string()
}

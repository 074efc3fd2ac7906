use clap::Parser;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::auth::credentials::Credentials;

/// Encrypted HTTP file storage server
///
/// Flags left unset on the command line do not override lower layers.
#[derive(Parser, Serialize, Clone, Debug, Default)]
#[command(name = "filevault-server", version, about = "Encrypted HTTP file storage server")]
pub struct Cli {
    /// Port to listen on [default: 8080]
    #[arg(long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,

    /// Bind address [default: 0.0.0.0]
    #[arg(long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bind_address: Option<String>,

    /// Path to TOML config file
    #[arg(long, env = "FILEVAULT_CONFIG", default_value = DEFAULT_CONFIG_PATH)]
    #[serde(skip)]
    pub config: String,

    /// Enable structured JSON logging (for Docker/production)
    #[arg(long)]
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub json_logs: bool,

    /// Output a commented TOML config template and exit
    #[arg(long)]
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub generate_config: bool,

    /// Directory holding the stored files [default: ./uploads]
    #[arg(long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage_dir: Option<String>,

    /// Data directory for key material [default: ./data]
    #[arg(long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<String>,

    /// Encrypt stored files at rest with AES-GCM [default: true]
    #[arg(long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encryption: Option<bool>,

    /// Hex-encoded 16/24/32-byte storage key (generated into data_dir if unset)
    #[arg(long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encryption_key: Option<String>,

    /// Basic-auth username
    #[arg(long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth_username: Option<String>,

    /// Basic-auth password
    #[arg(long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth_password: Option<String>,

    /// Maximum upload size in megabytes [default: 100]
    #[arg(long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_upload_size_mb: Option<u32>,
}

pub const DEFAULT_CONFIG_PATH: &str = "./filevault.toml";

/// Resolved server configuration.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Config {
    pub port: u16,
    pub bind_address: String,
    pub json_logs: bool,
    #[serde(default)]
    pub generate_config: bool,
    pub storage_dir: String,
    pub data_dir: String,
    pub encryption: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encryption_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_password: Option<String>,
    pub max_upload_size_mb: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8080,
            bind_address: "0.0.0.0".to_string(),
            json_logs: false,
            generate_config: false,
            storage_dir: "./uploads".to_string(),
            data_dir: "./data".to_string(),
            encryption: true,
            encryption_key: None,
            auth_username: None,
            auth_password: None,
            max_upload_size_mb: 100,
        }
    }
}

impl Config {
    /// Load config with layered precedence:
    /// built-in defaults < TOML file < env vars (FILEVAULT_*) < CLI args
    pub fn load() -> Result<Self, figment::Error> {
        let cli = Cli::parse();
        let config_path = cli.config.clone();
        Self::figment(&config_path, cli).extract()
    }

    fn figment(config_path: &str, cli: Cli) -> Figment {
        Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(config_path))
            .merge(Env::prefixed("FILEVAULT_").ignore(&["config"]))
            .merge(Serialized::defaults(cli))
    }

    /// The shared credential pair, if authentication is configured.
    ///
    /// Setting only one of username/password is an error.
    pub fn credentials(&self) -> Result<Option<Credentials>, String> {
        match (&self.auth_username, &self.auth_password) {
            (Some(username), Some(password)) => {
                if username.is_empty() || password.is_empty() {
                    return Err("auth_username and auth_password must not be empty".to_string());
                }
                if username.contains(':') {
                    return Err("auth_username must not contain ':'".to_string());
                }
                Ok(Some(Credentials::new(username.clone(), password.clone())))
            }
            (None, None) => Ok(None),
            _ => Err("auth_username and auth_password must be set together".to_string()),
        }
    }

    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_size_mb as usize * 1024 * 1024
    }
}

/// Generate a commented TOML config template
pub fn generate_config_template() -> String {
    r#"# filevault server configuration
# Place this file at ./filevault.toml or specify with --config <path>
# All settings can be overridden via environment variables (FILEVAULT_PORT, etc.)
# or CLI flags (--port, etc.)

# Server port (default: 8080)
# port = 8080

# Bind address (default: 0.0.0.0, all interfaces)
# bind_address = "0.0.0.0"

# Enable structured JSON logging for Docker/production
# json_logs = false

# Directory holding the stored files (created on startup)
# storage_dir = "./uploads"

# Data directory for the generated storage key (storage.key)
# data_dir = "./data"

# ---- Encryption at rest ----

# Encrypt stored files with AES-GCM (default: true)
# Encrypted files are stored as <name>.enc
# encryption = true

# Hex-encoded 16, 24 or 32 byte key (AES-128/192/256).
# If unset, a random 256-bit key is generated into data_dir/storage.key
# on first boot and reused afterwards.
# encryption_key = ""

# ---- Authentication ----

# Shared basic-auth credentials. Leave both unset to disable authentication.
# auth_username = "admin"
# auth_password = "change-me"

# ---- Uploads ----

# Maximum upload size in megabytes (default: 100)
# max_upload_size_mb = 100
"#
    .to_string()
}

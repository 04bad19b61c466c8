//! Gateway Configuration
//!
//! Listener, credential, directory and channel settings. Loaded from a JSON
//! file; every field has a default so a missing or partial file is fine.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::errors::{GatewayError, GatewayResult};
use crate::auth::{JwtConfig, SessionConfig};
use crate::lang::Lang;

/// Gateway configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Explicit bind host; overrides `network_serve` when set
    #[serde(default)]
    pub host: Option<String>,

    /// Port to bind to (default: 6806)
    #[serde(default = "default_port")]
    pub port: u16,

    /// Listen on all interfaces instead of loopback
    #[serde(default)]
    pub network_serve: bool,

    /// Workspace access code; empty means the workspace is open
    #[serde(default)]
    pub access_auth_code: String,

    /// Start with the read-only gate set
    #[serde(default)]
    pub read_only: bool,

    /// Keep running without a listener when the port cannot be bound
    #[serde(default)]
    pub lenient_boot: bool,

    #[serde(default)]
    pub jwt: JwtConfig,

    #[serde(default)]
    pub session: SessionConfig,

    /// Workspace root; also the audience of session records
    #[serde(default = "default_workspace_dir")]
    pub workspace_dir: PathBuf,

    /// Install directory holding `stage/`, `appearance/` and friends
    #[serde(default = "default_working_dir")]
    pub working_dir: PathBuf,

    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    #[serde(default = "default_temp_dir")]
    pub temp_dir: PathBuf,

    #[serde(default)]
    pub lang: Lang,

    /// Largest accepted command-channel message, in bytes
    #[serde(default = "default_max_message_size")]
    pub max_message_size: usize,
}

fn default_port() -> u16 {
    6806
}

fn default_workspace_dir() -> PathBuf {
    PathBuf::from("./workspace")
}

fn default_working_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_data_dir() -> PathBuf {
    default_workspace_dir().join("data")
}

fn default_temp_dir() -> PathBuf {
    default_workspace_dir().join("temp")
}

fn default_max_message_size() -> usize {
    8 * 1024 * 1024
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: None,
            port: default_port(),
            network_serve: false,
            access_auth_code: String::new(),
            read_only: false,
            lenient_boot: false,
            jwt: JwtConfig::default(),
            session: SessionConfig::default(),
            workspace_dir: default_workspace_dir(),
            working_dir: default_working_dir(),
            data_dir: default_data_dir(),
            temp_dir: default_temp_dir(),
            lang: Lang::default(),
            max_message_size: default_max_message_size(),
        }
    }
}

impl GatewayConfig {
    /// Create a new config with specified port
    pub fn with_port(port: u16) -> Self {
        Self {
            port,
            ..Default::default()
        }
    }

    /// Load from a JSON file
    pub fn load(path: &Path) -> GatewayResult<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            GatewayError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        serde_json::from_str(&raw)
            .map_err(|e| GatewayError::Config(format!("invalid {}: {}", path.display(), e)))
    }

    /// Load from `path` if given, else defaults
    pub fn load_or_default(path: Option<&Path>) -> GatewayResult<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    pub fn bind_host(&self) -> String {
        match &self.host {
            Some(host) => host.clone(),
            None if self.network_serve => "0.0.0.0".to_string(),
            None => "127.0.0.1".to_string(),
        }
    }

    /// Get the socket address string
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.bind_host(), self.port)
    }

    pub fn parse_socket_addr(&self) -> GatewayResult<SocketAddr> {
        let addr = self.socket_addr();
        addr.parse()
            .map_err(|_| GatewayError::Config(format!("invalid listen address {}", addr)))
    }

    /// Workspace identity carried by sessions
    pub fn workspace_key(&self) -> String {
        self.workspace_dir.to_string_lossy().into_owned()
    }

    /// Resolve a path under the install directory
    pub fn stage_path(&self, rel: &str) -> PathBuf {
        self.working_dir.join("stage").join(rel)
    }
}

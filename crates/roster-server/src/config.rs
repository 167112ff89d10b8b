//! Runtime server configuration, deserialised from `config.toml` and
//! `ROSTER__*` environment variables.

use std::path::PathBuf;

use roster_core::settings::DirectorySettings;
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
  #[serde(default = "default_host")]
  pub host:       String,
  #[serde(default = "default_port")]
  pub port:       u16,
  pub store_path: PathBuf,
  /// Prefix the API is nested under.
  #[serde(default = "default_mount")]
  pub mount:      String,
  pub directory:  DirectorySettings,
}

fn default_host() -> String { "127.0.0.1".into() }

fn default_port() -> u16 { 8080 }

fn default_mount() -> String { "/api".into() }

impl ServerConfig {
  pub fn address(&self) -> String { format!("{}:{}", self.host, self.port) }
}

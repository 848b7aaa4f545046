//! Runtime configuration for translit-serve.
//!
//! Settings come from a JSON file (optional, missing fields fall back to
//! defaults) and are then overridden by command-line flags and the `PORT`
//! environment variable.

use std::path::PathBuf;

use clap::Parser;
use serde::{Deserialize, Serialize};

/// Default checkpoint location, relative to the working directory.
pub const DEFAULT_CHECKPOINT_PATH: &str = "model/hindi_transliteration_model.safetensors";

/// Command-line arguments.
#[derive(Parser, Debug, Clone, Default)]
#[command(name = "translit-serve", about = "Seq2seq transliteration HTTP server")]
pub struct Cli {
    /// Path to configuration file (JSON).
    #[arg(short, long, default_value = "config.json")]
    pub config: PathBuf,

    /// Listening port. Overrides the config file.
    #[arg(short, long, env = "PORT")]
    pub port: Option<u16>,

    /// Bind address. Overrides the config file.
    #[arg(long)]
    pub host: Option<String>,

    /// Checkpoint file. Overrides the config file.
    #[arg(long)]
    pub checkpoint: Option<PathBuf>,

    /// Enable verbose logging.
    #[arg(short, long)]
    pub verbose: bool,
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Server configuration.
    pub server: ServerConfig,

    /// Model configuration.
    pub model: ModelSettings,
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind host (e.g. "0.0.0.0").
    pub host: String,

    /// Listening port.
    pub port: u16,

    /// Allow cross-origin requests from any origin.
    pub cors: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            cors: true,
        }
    }
}

/// Where the model lives on disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelSettings {
    /// Safetensors checkpoint holding weights, vocabularies and the architecture record.
    pub checkpoint_path: PathBuf,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            checkpoint_path: PathBuf::from(DEFAULT_CHECKPOINT_PATH),
        }
    }
}

impl Config {
    /// Load configuration from a JSON file, falling back to defaults for missing fields.
    pub fn load(path: &std::path::Path) -> anyhow::Result<Self> {
        if path.exists() {
            let data = std::fs::read_to_string(path)?;
            let config: Config = serde_json::from_str(&data)?;
            Ok(config)
        } else {
            tracing::warn!("Config file not found at {:?}, using defaults", path);
            Ok(Config::default())
        }
    }

    /// Apply command-line (and environment) overrides on top of the file settings.
    pub fn with_overrides(mut self, cli: &Cli) -> Self {
        if let Some(port) = cli.port {
            self.server.port = port;
        }
        if let Some(host) = &cli.host {
            self.server.host = host.clone();
        }
        if let Some(path) = &cli.checkpoint {
            self.model.checkpoint_path = path.clone();
        }
        self
    }

    /// Socket address string for the listener.
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let cfg = Config::default();
        assert_eq!(cfg.server.port, 5000);
        assert_eq!(cfg.listen_addr(), "0.0.0.0:5000");
        assert_eq!(
            cfg.model.checkpoint_path,
            PathBuf::from(DEFAULT_CHECKPOINT_PATH)
        );
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let cfg: Config = serde_json::from_str(r#"{"server": {"port": 8081}}"#).unwrap();
        assert_eq!(cfg.server.port, 8081);
        assert_eq!(cfg.server.host, "0.0.0.0");
        assert!(cfg.server.cors);
        assert_eq!(
            cfg.model.checkpoint_path,
            PathBuf::from(DEFAULT_CHECKPOINT_PATH)
        );
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = Config::load(&dir.path().join("nope.json")).unwrap();
        assert_eq!(cfg.server.port, 5000);
    }

    #[test]
    fn test_cli_overrides() {
        let cli = Cli {
            port: Some(9000),
            checkpoint: Some(PathBuf::from("/tmp/m.safetensors")),
            ..Cli::default()
        };
        let cfg = Config::default().with_overrides(&cli);
        assert_eq!(cfg.server.port, 9000);
        assert_eq!(cfg.server.host, "0.0.0.0");
        assert_eq!(cfg.model.checkpoint_path, PathBuf::from("/tmp/m.safetensors"));
    }
}

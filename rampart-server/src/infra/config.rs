use std::env;

use anyhow::Context;
use rampart_core::config::PipelineConfig;
use serde::Deserialize;

/// Top-level server configuration.
///
/// Values are resolved in three layers, lowest precedence first: built-in
/// defaults, an optional TOML file named by `RAMPART_CONFIG`, and individual
/// environment variables. CLI flags are applied on top by the binary.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub server: HttpSettings,
    /// SQLite connection string for the job store.
    pub database_url: String,
    /// When set, jobs are queued through Redis instead of the in-process broker.
    pub redis_url: Option<String>,
    /// Key prefix for the Redis queue lists.
    pub queue_namespace: String,
    /// Boot with the consumer paused; jobs accumulate until a start request.
    pub start_paused: bool,
    pub pipeline: PipelineConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            server: HttpSettings::default(),
            database_url: "sqlite:rampart.db".to_string(),
            redis_url: None,
            queue_namespace: "rampart".to_string(),
            start_paused: false,
            pipeline: PipelineConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpSettings {
    pub host: String,
    pub port: u16,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

/// A loaded configuration plus metadata about where it came from.
#[derive(Debug, Clone)]
pub struct ConfigLoad {
    pub config: ServerConfig,
    pub env_file_loaded: bool,
    pub file_path: Option<String>,
}

impl ServerConfig {
    /// Resolve configuration from defaults, the optional TOML file, and the
    /// environment.
    pub fn load() -> anyhow::Result<ConfigLoad> {
        let env_file_loaded = dotenvy::dotenv().is_ok();

        let file_path = env_var("RAMPART_CONFIG");
        let mut config = match &file_path {
            Some(path) => {
                let raw = std::fs::read_to_string(path)
                    .with_context(|| format!("failed to read config file {path}"))?;
                toml::from_str(&raw)
                    .with_context(|| format!("failed to parse config file {path}"))?
            }
            None => Self::default(),
        };
        config.apply_env_overrides()?;

        Ok(ConfigLoad {
            config,
            env_file_loaded,
            file_path,
        })
    }

    fn apply_env_overrides(&mut self) -> anyhow::Result<()> {
        if let Some(host) = env_var("RAMPART_HOST") {
            self.server.host = host;
        }
        if let Some(port) = env_var("RAMPART_PORT") {
            self.server.port = port
                .parse()
                .context("RAMPART_PORT must be a port number")?;
        }
        if let Some(url) = env_var("DATABASE_URL") {
            self.database_url = url;
        }
        if let Some(url) = env_var("REDIS_URL") {
            self.redis_url = Some(url);
        }
        if let Some(namespace) = env_var("RAMPART_QUEUE_NAMESPACE") {
            self.queue_namespace = namespace;
        }
        if let Some(count) = env_var("RAMPART_WORKERS") {
            self.pipeline.workers.count = count
                .parse()
                .context("RAMPART_WORKERS must be a positive integer")?;
        }
        if let Some(flag) = env_var("RAMPART_START_PAUSED") {
            self.start_paused = parse_bool(&flag)
                .context("RAMPART_START_PAUSED must be a boolean")?;
        }
        Ok(())
    }
}

/// Read an environment variable, treating empty or whitespace-only values as
/// unset.
fn env_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.trim().is_empty())
}

fn parse_bool(raw: &str) -> anyhow::Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => anyhow::bail!("'{other}' is not a boolean"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_bind_every_interface_on_8080() {
        let config = ServerConfig::default();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.database_url, "sqlite:rampart.db");
        assert!(config.redis_url.is_none());
        assert!(!config.start_paused);
    }

    #[test]
    fn partial_toml_only_touches_named_fields() {
        let raw = r#"
            start_paused = true

            [server]
            port = 9090

            [pipeline.workers]
            count = 2
        "#;
        let config: ServerConfig = toml::from_str(raw).expect("partial config parses");
        assert_eq!(config.server.port, 9090);
        assert_eq!(config.server.host, "0.0.0.0");
        assert!(config.start_paused);
        assert_eq!(config.pipeline.workers.count, 2);
        assert_eq!(config.database_url, "sqlite:rampart.db");
    }

    #[test]
    fn unknown_toml_values_are_rejected_with_context() {
        let parsed = toml::from_str::<ServerConfig>("server = \"not a table\"");
        assert!(parsed.is_err());
    }

    #[test]
    fn boolean_flags_accept_common_spellings() {
        for raw in ["1", "true", "YES", "on"] {
            assert!(parse_bool(raw).expect("truthy value"), "{raw}");
        }
        for raw in ["0", "false", "No", "off"] {
            assert!(!parse_bool(raw).expect("falsy value"), "{raw}");
        }
        assert!(parse_bool("sometimes").is_err());
    }
}

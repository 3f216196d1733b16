use dataproxy_graphql::GraphQLConfig;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    /// Shared secret expected in `Authorization: Bearer <api_key>`
    #[serde(default)]
    pub auth: AuthConfig,
    /// Where the introspection document comes from
    #[serde(default)]
    pub introspection: IntrospectionConfig,
    #[serde(default)]
    pub client: ClientConfig,
    #[serde(default)]
    pub graphql: GraphQLConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.server.port == 0 {
            return Err("server.port must be > 0".into());
        }
        if self.server.body_limit_bytes == 0 {
            return Err("server.body_limit_bytes must be > 0".into());
        }
        if self.auth.api_key.as_deref().unwrap_or("").is_empty() {
            return Err("auth.api_key is required (or set DATA_PROXY_API_KEY)".into());
        }
        match (&self.introspection.path, &self.introspection.command) {
            (None, None) => {
                return Err("introspection.path or introspection.command is required".into());
            }
            (Some(_), Some(_)) => {
                return Err("introspection.path and introspection.command are exclusive".into());
            }
            (None, Some(command)) if command.is_empty() => {
                return Err("introspection.command must name a program".into());
            }
            _ => {}
        }
        let lvl = self.logging.level.to_ascii_lowercase();
        let valid_levels = ["trace", "debug", "info", "warn", "error", "off"];
        if !valid_levels.contains(&lvl.as_str()) {
            return Err(format!("logging.level must be one of {valid_levels:?}"));
        }
        if self.metrics.enabled {
            if self.metrics.port == 0 {
                return Err("metrics.port must be > 0".into());
            }
            if self.metrics.port == self.server.port {
                return Err("metrics.port must differ from server.port".into());
            }
        }
        self.graphql
            .validate()
            .map_err(|e| format!("graphql config error: {e}"))?;
        Ok(())
    }

    pub fn addr(&self) -> SocketAddr {
        socket_addr(&self.server.host, self.server.port)
    }

    pub fn metrics_addr(&self) -> SocketAddr {
        socket_addr(&self.server.host, self.metrics.port)
    }
}

fn socket_addr(host: &str, port: u16) -> SocketAddr {
    use std::net::{IpAddr, Ipv4Addr};
    let host: IpAddr = host.parse().unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED));
    SocketAddr::from((host, port))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_body_limit")]
    pub body_limit_bytes: usize,
    /// Disables response body logging.
    #[serde(default)]
    pub production: bool,
}

fn default_host() -> String {
    "0.0.0.0".into()
}
fn default_port() -> u16 {
    3000
}
fn default_body_limit() -> usize {
    4 * 1024 * 1024
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            body_limit_bytes: default_body_limit(),
            production: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AuthConfig {
    #[serde(default)]
    pub api_key: Option<String>,
}

/// Exactly one of `path` and `command` must be set.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct IntrospectionConfig {
    /// JSON dump of the document.
    #[serde(default)]
    pub path: Option<PathBuf>,
    /// Program and arguments printing the document on stdout.
    #[serde(default)]
    pub command: Option<Vec<String>>,
    /// Working directory of `command`.
    #[serde(default)]
    pub current_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ClientBackend {
    #[default]
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ClientConfig {
    #[serde(default)]
    pub backend: ClientBackend,
    /// Records loaded into the in-memory client at startup,
    /// as `{ "<Model>": [ {..}, .. ] }`.
    #[serde(default)]
    pub seed_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".into()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_metrics_port")]
    pub port: u16,
}

fn default_metrics_port() -> u16 {
    9090
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: default_metrics_port(),
        }
    }
}

pub mod loader {
    use super::AppConfig;
    use config::builder::DefaultState;
    use config::{Config, ConfigBuilder, ConfigError, Environment, File};
    use std::path::PathBuf;

    pub const DEFAULT_CONFIG_PATH: &str = "dataproxy.toml";

    /// Deployment variables understood for compatibility with existing
    /// data proxy setups, with the key each one overrides.
    pub const LEGACY_ENV: &[(&str, &str)] = &[
        ("DATA_PROXY_API_KEY", "auth.api_key"),
        ("PORT", "server.port"),
        ("ENABLE_PROMETHEUS_METRICS", "metrics.enabled"),
        ("PROMETHEUS_METRICS_PORT", "metrics.port"),
    ];

    pub fn load_config(path: Option<&str>) -> Result<AppConfig, String> {
        let mut builder = Config::builder();
        let pathbuf = PathBuf::from(path.unwrap_or(DEFAULT_CONFIG_PATH));
        if pathbuf.exists() {
            builder = builder.add_source(File::from(pathbuf));
        }
        // Environment variable overrides, e.g., DATAPROXY__SERVER__PORT=4000
        builder = builder.add_source(
            Environment::with_prefix("DATAPROXY")
                .prefix_separator("__")
                .try_parsing(true)
                .separator("__"),
        );
        builder = apply_legacy_env(builder).map_err(|e| format!("config build error: {e}"))?;

        let cfg = builder
            .build()
            .map_err(|e| format!("config build error: {e}"))?;
        let mut merged: AppConfig = cfg
            .try_deserialize()
            .map_err(|e| format!("config deserialize error: {e}"))?;
        if std::env::var("NODE_ENV").is_ok_and(|v| v == "production") {
            merged.server.production = true;
        }
        merged.validate()?;
        Ok(merged)
    }

    fn apply_legacy_env(
        mut builder: ConfigBuilder<DefaultState>,
    ) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
        for (var, key) in LEGACY_ENV {
            let value = std::env::var(var).ok().filter(|v| !v.is_empty());
            builder = builder.set_override_option(*key, value)?;
        }
        Ok(builder)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> AppConfig {
        AppConfig {
            auth: AuthConfig {
                api_key: Some("secret".into()),
            },
            introspection: IntrospectionConfig {
                path: Some("fixtures/sample_dmmf.json".into()),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_defaults() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.server.port, 3000);
        assert_eq!(cfg.metrics.port, 9090);
        assert!(!cfg.metrics.enabled);
        assert_eq!(cfg.client.backend, ClientBackend::Memory);
        assert_eq!(cfg.addr().to_string(), "0.0.0.0:3000");
    }

    #[test]
    fn test_api_key_is_required() {
        let mut cfg = valid();
        assert!(cfg.validate().is_ok());

        cfg.auth.api_key = Some(String::new());
        assert!(cfg.validate().unwrap_err().contains("auth.api_key"));
    }

    #[test]
    fn test_introspection_source_is_exclusive() {
        let mut cfg = valid();
        cfg.introspection.command = Some(vec!["node".into(), "dmmf.js".into()]);
        assert!(cfg.validate().unwrap_err().contains("exclusive"));

        cfg.introspection.path = None;
        assert!(cfg.validate().is_ok());

        cfg.introspection.command = None;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_metrics_port_must_differ() {
        let mut cfg = valid();
        cfg.metrics.enabled = true;
        cfg.metrics.port = cfg.server.port;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_logging_level() {
        let mut cfg = valid();
        cfg.logging.level = "verbose".into();
        assert!(cfg.validate().is_err());
    }
}

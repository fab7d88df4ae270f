use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use clap::Parser;
use serde::Deserialize;
use thiserror::Error;

const DEFAULT_PORT: u16 = 8080;
const DEFAULT_MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

#[derive(Debug, Parser)]
#[command(
    name = "apiserver-rs",
    version,
    about = "Versioned HTTP API server with health and user routes"
)]
pub struct Cli {
    #[arg(long, value_name = "ADDR")]
    pub bind: Option<SocketAddr>,

    #[arg(long, short = 'c', value_name = "FILE")]
    pub config: Option<PathBuf>,

    #[arg(long, value_name = "BYTES")]
    pub max_body_bytes: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind: SocketAddr,
    pub max_body_bytes: usize,
    pub middleware: MiddlewareConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            middleware: MiddlewareConfig::default(),
        }
    }
}

/// Layers wrapped around the route table when the engine is built.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct MiddlewareConfig {
    /// Turn handler panics into `500` responses instead of dropping the connection.
    pub recovery: bool,
    pub request_logging: bool,
    /// Set and propagate `x-request-id`.
    pub request_id: bool,
    pub rate_limit: Option<RateLimitConfig>,
}

impl Default for MiddlewareConfig {
    fn default() -> Self {
        Self {
            recovery: true,
            request_logging: true,
            request_id: true,
            rate_limit: None,
        }
    }
}

/// Global token bucket: `burst_size` requests up front, one more every
/// `period_seconds`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct RateLimitConfig {
    pub period_seconds: u64,
    pub burst_size: u32,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("invalid config in {path}: {source}")]
    Parse {
        path: String,
        source: toml::de::Error,
    },
    #[error("env var {key} is not valid unicode")]
    NotUnicode { key: String },
    #[error("invalid boolean value for env var {key}: {value}")]
    InvalidEnvBool { key: String, value: String },
    #[error("invalid port in env var {key}: {value}")]
    InvalidEnvPort { key: String, value: String },
}

#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    bind: Option<SocketAddr>,
    max_body_bytes: Option<usize>,
    middleware: Option<MiddlewareConfig>,
}

/// Values read from the process environment.
#[derive(Debug, Default)]
struct EnvConfig {
    port: Option<u16>,
    request_logging: Option<bool>,
}

impl AppConfig {
    pub fn from_cli(cli: Cli) -> Result<Self, ConfigError> {
        let from_file = read_file_config(cli.config.as_deref())?;
        let from_env = read_env_config()?;
        Ok(Self::resolve(cli, from_env, from_file))
    }

    fn resolve(cli: Cli, env: EnvConfig, file: FileConfig) -> Self {
        let defaults = Self::default();

        let bind = cli
            .bind
            .or(env.port.map(|port| SocketAddr::from(([0, 0, 0, 0], port))))
            .or(file.bind)
            .unwrap_or(defaults.bind);
        let max_body_bytes = cli
            .max_body_bytes
            .or(file.max_body_bytes)
            .unwrap_or(defaults.max_body_bytes);

        let mut middleware = file.middleware.unwrap_or_default();
        if let Some(enabled) = env.request_logging {
            middleware.request_logging = enabled;
        }

        Self {
            bind,
            max_body_bytes,
            middleware,
        }
    }
}

fn read_file_config(path: Option<&Path>) -> Result<FileConfig, ConfigError> {
    let Some(path) = path else {
        return Ok(FileConfig::default());
    };

    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.display().to_string(),
        source,
    })?;

    toml::from_str(&raw).map_err(|source| ConfigError::Parse {
        path: path.display().to_string(),
        source,
    })
}

fn read_env_config() -> Result<EnvConfig, ConfigError> {
    let port = match read_env("PORT")? {
        Some(raw) => Some(parse_port_value("PORT", &raw)?),
        None => None,
    };
    let request_logging = match read_env("APISERVER_REQUEST_LOGGING")? {
        Some(raw) => Some(parse_bool_value("APISERVER_REQUEST_LOGGING", &raw)?),
        None => None,
    };

    Ok(EnvConfig {
        port,
        request_logging,
    })
}

fn read_env(key: &str) -> Result<Option<String>, ConfigError> {
    match std::env::var(key) {
        Ok(value) => Ok(Some(value)),
        Err(std::env::VarError::NotPresent) => Ok(None),
        Err(std::env::VarError::NotUnicode(_)) => Err(ConfigError::NotUnicode {
            key: String::from(key),
        }),
    }
}

fn parse_port_value(key: &str, raw: &str) -> Result<u16, ConfigError> {
    raw.trim()
        .parse::<u16>()
        .map_err(|_| ConfigError::InvalidEnvPort {
            key: String::from(key),
            value: String::from(raw),
        })
}

fn parse_bool_value(key: &str, raw: &str) -> Result<bool, ConfigError> {
    let normalized = raw.trim().to_ascii_lowercase();
    match normalized.as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidEnvBool {
            key: String::from(key),
            value: String::from(raw),
        }),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use std::io::Write;

    use super::*;

    fn empty_cli() -> Cli {
        Cli {
            bind: None,
            config: None,
            max_body_bytes: None,
        }
    }

    #[test]
    fn parse_bool_value_accepts_common_true_values() {
        assert_eq!(parse_bool_value("K", "true").ok(), Some(true));
        assert_eq!(parse_bool_value("K", "1").ok(), Some(true));
        assert_eq!(parse_bool_value("K", "YES").ok(), Some(true));
        assert_eq!(parse_bool_value("K", " on ").ok(), Some(true));
    }

    #[test]
    fn parse_bool_value_accepts_common_false_values() {
        assert_eq!(parse_bool_value("K", "false").ok(), Some(false));
        assert_eq!(parse_bool_value("K", "0").ok(), Some(false));
        assert_eq!(parse_bool_value("K", "NO").ok(), Some(false));
        assert_eq!(parse_bool_value("K", " off ").ok(), Some(false));
    }

    #[test]
    fn parse_bool_value_rejects_invalid_values() {
        assert!(parse_bool_value("K", "maybe").is_err());
    }

    #[test]
    fn parse_port_value_rejects_out_of_range() {
        assert_eq!(parse_port_value("PORT", " 3000 ").ok(), Some(3000));
        assert!(matches!(
            parse_port_value("PORT", "70000"),
            Err(ConfigError::InvalidEnvPort { .. })
        ));
    }

    #[test]
    fn defaults_listen_on_all_interfaces_port_8080() {
        let config =
            AppConfig::resolve(empty_cli(), EnvConfig::default(), FileConfig::default());
        assert_eq!(config.bind, SocketAddr::from(([0, 0, 0, 0], 8080)));
        assert_eq!(config.max_body_bytes, DEFAULT_MAX_BODY_BYTES);
        assert_eq!(config.middleware, MiddlewareConfig::default());
    }

    #[test]
    fn cli_bind_overrides_port_env_and_file() {
        let cli = Cli {
            bind: Some("127.0.0.1:9000".parse().unwrap()),
            ..empty_cli()
        };
        let env = EnvConfig {
            port: Some(3000),
            request_logging: None,
        };
        let file = FileConfig {
            bind: Some("127.0.0.1:7000".parse().unwrap()),
            ..FileConfig::default()
        };

        let config = AppConfig::resolve(cli, env, file);
        assert_eq!(config.bind, "127.0.0.1:9000".parse().unwrap());
    }

    #[test]
    fn port_env_overrides_file_bind() {
        let env = EnvConfig {
            port: Some(3000),
            request_logging: None,
        };
        let file = FileConfig {
            bind: Some("127.0.0.1:7000".parse().unwrap()),
            ..FileConfig::default()
        };

        let config = AppConfig::resolve(empty_cli(), env, file);
        assert_eq!(config.bind, SocketAddr::from(([0, 0, 0, 0], 3000)));
    }

    #[test]
    fn file_config_sets_middleware_and_env_overrides_logging() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
bind = "127.0.0.1:7000"
max_body_bytes = 1024

[middleware]
recovery = false
request_logging = true

[middleware.rate_limit]
period_seconds = 5
burst_size = 10
"#
        )
        .unwrap();

        let from_file = read_file_config(Some(file.path())).unwrap();
        let env = EnvConfig {
            port: None,
            request_logging: Some(false),
        };
        let config = AppConfig::resolve(empty_cli(), env, from_file);

        assert_eq!(config.bind, "127.0.0.1:7000".parse().unwrap());
        assert_eq!(config.max_body_bytes, 1024);
        assert!(!config.middleware.recovery);
        assert!(!config.middleware.request_logging);
        assert!(config.middleware.request_id);
        assert_eq!(
            config.middleware.rate_limit,
            Some(RateLimitConfig {
                period_seconds: 5,
                burst_size: 10
            })
        );
    }

    #[test]
    fn malformed_file_reports_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "bind = 12").unwrap();

        let result = read_file_config(Some(file.path()));
        assert!(matches!(result, Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn missing_file_reports_read_error() {
        let result = read_file_config(Some(Path::new("/nonexistent/apiserver.toml")));
        assert!(matches!(result, Err(ConfigError::Read { .. })));
    }
}

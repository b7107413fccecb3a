//! Configuration for the MCP server.
//!
//! Configuration is loaded from environment variables with sensible defaults.

use pybox_engine::EngineConfig;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

/// Maximum size for submitted source text in bytes (10 MB).
pub const MAX_SOURCE_BYTES: usize = 10 * 1024 * 1024;

/// Transport mode for the MCP server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransportMode {
    /// Stdio only (for local AI tools like Claude Desktop)
    Stdio,
    /// HTTP only (for remote AI agents)
    Http,
    /// Both stdio and HTTP (default - maximum compatibility)
    #[default]
    Both,
}

impl TransportMode {
    /// Parse from string (case-insensitive).
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "stdio" => Self::Stdio,
            "http" | "sse" | "remote" => Self::Http,
            _ => Self::Both,
        }
    }

    /// Check if stdio transport should be enabled.
    pub fn stdio_enabled(&self) -> bool {
        matches!(self, Self::Stdio | Self::Both)
    }

    /// Check if HTTP transport should be enabled.
    pub fn http_enabled(&self) -> bool {
        matches!(self, Self::Http | Self::Both)
    }
}

/// Configuration validation error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("interpreter not found: {0}")]
    MissingInterpreter(PathBuf),
}

/// Configuration for the pybox MCP server.
#[derive(Debug, Clone)]
pub struct PyboxConfig {
    /// Explicit interpreter path (default: `python3` from `PATH`).
    pub interpreter: Option<PathBuf>,

    /// Per-invocation deadline in seconds (default: 30).
    pub timeout_secs: u64,

    /// Worker address-space limit in MiB (default: none).
    pub memory_limit_mb: Option<u64>,

    /// Worker CPU-time limit in seconds (default: none).
    pub cpu_limit_secs: Option<u64>,

    /// Maximum concurrent invocations (default: 8).
    pub max_concurrent: usize,

    /// Captured-output cap in bytes (default: 1 MiB).
    pub max_output_bytes: usize,

    /// Transport mode (default: both stdio and HTTP).
    pub transport_mode: TransportMode,

    /// HTTP server bind address.
    pub http_addr: SocketAddr,
}

impl Default for PyboxConfig {
    fn default() -> Self {
        Self {
            interpreter: None,
            timeout_secs: 30,
            memory_limit_mb: None,
            cpu_limit_secs: None,
            max_concurrent: 8,
            max_output_bytes: 1024 * 1024,
            transport_mode: TransportMode::Both,
            http_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)), 8080),
        }
    }
}

impl PyboxConfig {
    /// Load configuration from environment variables.
    ///
    /// | Variable | Default |
    /// |----------|---------|
    /// | `PYBOX_INTERPRETER` | `python3` from `PATH` |
    /// | `PYBOX_TIMEOUT_SECS` | `30` |
    /// | `PYBOX_MEMORY_LIMIT_MB` | unlimited |
    /// | `PYBOX_CPU_LIMIT_SECS` | unlimited |
    /// | `PYBOX_MAX_CONCURRENT` | `8` |
    /// | `PYBOX_MAX_OUTPUT_BYTES` | `1048576` |
    /// | `PYBOX_TRANSPORT` | `both` (stdio, http, both) |
    /// | `PYBOX_HTTP_HOST` | `0.0.0.0` |
    /// | `PYBOX_HTTP_PORT` | `8080` |
    pub fn from_env() -> Self {
        let default = Self::default();

        let http_host: IpAddr = std::env::var("PYBOX_HTTP_HOST")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)));

        let http_port: u16 = std::env::var("PYBOX_HTTP_PORT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(8080);

        Self {
            interpreter: std::env::var("PYBOX_INTERPRETER").ok().map(PathBuf::from),
            timeout_secs: std::env::var("PYBOX_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|&v| v > 0)
                .unwrap_or(default.timeout_secs),
            memory_limit_mb: std::env::var("PYBOX_MEMORY_LIMIT_MB")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|&v| v > 0),
            cpu_limit_secs: std::env::var("PYBOX_CPU_LIMIT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|&v| v > 0),
            max_concurrent: std::env::var("PYBOX_MAX_CONCURRENT")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|&v| v > 0)
                .unwrap_or(default.max_concurrent),
            max_output_bytes: std::env::var("PYBOX_MAX_OUTPUT_BYTES")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|&v| v > 0)
                .unwrap_or(default.max_output_bytes),
            transport_mode: std::env::var("PYBOX_TRANSPORT")
                .map(|v| TransportMode::parse(&v))
                .unwrap_or(default.transport_mode),
            http_addr: SocketAddr::new(http_host, http_port),
        }
    }

    /// Build the engine configuration this server config describes.
    pub fn engine_config(&self) -> EngineConfig {
        let mut builder = EngineConfig::builder()
            .timeout(Duration::from_secs(self.timeout_secs))
            .max_concurrent(self.max_concurrent)
            .max_output_bytes(self.max_output_bytes);
        if let Some(path) = &self.interpreter {
            builder = builder.interpreter(path);
        }
        if let Some(mib) = self.memory_limit_mb {
            builder = builder.memory_limit_mb(mib);
        }
        if let Some(secs) = self.cpu_limit_secs {
            builder = builder.cpu_limit_secs(secs);
        }
        // All inputs above are already filtered to be non-zero.
        builder.build().unwrap_or_default()
    }

    /// Validate that the configured runtime exists.
    ///
    /// Call this at startup to get a clear error about a missing interpreter.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.engine_config().resolved_interpreter().is_none() {
            return Err(ConfigError::MissingInterpreter(
                self.interpreter
                    .clone()
                    .unwrap_or_else(|| PathBuf::from("python3")),
            ));
        }
        Ok(())
    }

    /// Validate configuration but only log warnings instead of failing.
    ///
    /// Use this at startup so missing runtimes surface immediately rather
    /// than as per-invocation diagnostics.
    pub fn validate_warn(&self) {
        if self.engine_config().resolved_interpreter().is_none() {
            match &self.interpreter {
                Some(path) => tracing::warn!("Interpreter not found: {:?}", path),
                None => tracing::warn!("No python3 found on PATH"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PyboxConfig::default();
        assert!(config.interpreter.is_none());
        assert_eq!(config.timeout_secs, 30);
        assert_eq!(config.max_concurrent, 8);
        assert_eq!(config.max_output_bytes, 1024 * 1024);
        assert_eq!(config.transport_mode, TransportMode::Both);
        assert_eq!(config.http_addr.port(), 8080);
    }

    #[test]
    fn test_transport_mode_parsing() {
        assert_eq!(TransportMode::parse("stdio"), TransportMode::Stdio);
        assert_eq!(TransportMode::parse("STDIO"), TransportMode::Stdio);
        assert_eq!(TransportMode::parse("http"), TransportMode::Http);
        assert_eq!(TransportMode::parse("HTTP"), TransportMode::Http);
        assert_eq!(TransportMode::parse("both"), TransportMode::Both);
        assert_eq!(TransportMode::parse("anything"), TransportMode::Both);
    }

    #[test]
    fn test_transport_mode_flags() {
        assert!(TransportMode::Stdio.stdio_enabled());
        assert!(!TransportMode::Stdio.http_enabled());

        assert!(!TransportMode::Http.stdio_enabled());
        assert!(TransportMode::Http.http_enabled());

        assert!(TransportMode::Both.stdio_enabled());
        assert!(TransportMode::Both.http_enabled());
    }

    #[test]
    fn test_engine_config_mapping() {
        let config = PyboxConfig {
            timeout_secs: 5,
            memory_limit_mb: Some(128),
            cpu_limit_secs: Some(4),
            max_concurrent: 2,
            max_output_bytes: 4096,
            ..Default::default()
        };
        let engine = config.engine_config();
        assert_eq!(engine.timeout, Duration::from_secs(5));
        assert_eq!(engine.memory_limit_mb, Some(128));
        assert_eq!(engine.cpu_limit_secs, Some(4));
        assert_eq!(engine.max_concurrent, 2);
        assert_eq!(engine.max_output_bytes, 4096);
    }

    #[test]
    fn test_max_source_size() {
        assert_eq!(MAX_SOURCE_BYTES, 10 * 1024 * 1024);
    }
}

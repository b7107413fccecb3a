//! Engine configuration types.

use crate::error::EngineError;
use std::path::PathBuf;
use std::time::Duration;

/// Default wall-clock deadline for one invocation.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default maximum number of concurrently running workers.
pub const DEFAULT_MAX_CONCURRENT: usize = 8;

/// Default cap on captured output (1 MiB).
pub const DEFAULT_MAX_OUTPUT_BYTES: usize = 1024 * 1024;

/// Configuration for the execution engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Explicit interpreter path. `None` resolves `python3` from `PATH`.
    pub interpreter: Option<PathBuf>,
    /// Wall-clock deadline per invocation; the worker is killed on expiry.
    pub timeout: Duration,
    /// Address-space limit applied inside the worker, in MiB (`None` = unlimited).
    pub memory_limit_mb: Option<u64>,
    /// CPU-time limit applied inside the worker, in seconds (`None` = unlimited).
    pub cpu_limit_secs: Option<u64>,
    /// Maximum number of invocations executing at once.
    pub max_concurrent: usize,
    /// Cap on captured output per invocation, in bytes.
    pub max_output_bytes: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            interpreter: None,
            timeout: DEFAULT_TIMEOUT,
            memory_limit_mb: None,
            cpu_limit_secs: None,
            max_concurrent: DEFAULT_MAX_CONCURRENT,
            max_output_bytes: DEFAULT_MAX_OUTPUT_BYTES,
        }
    }
}

impl EngineConfig {
    /// Create a new config builder.
    pub fn builder() -> EngineConfigBuilder {
        EngineConfigBuilder::default()
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.timeout.is_zero() {
            return Err(EngineError::InvalidConfig("timeout must be > 0".into()));
        }
        if self.max_concurrent == 0 {
            return Err(EngineError::InvalidConfig(
                "max_concurrent must be > 0".into(),
            ));
        }
        if self.max_output_bytes == 0 {
            return Err(EngineError::InvalidConfig(
                "max_output_bytes must be > 0".into(),
            ));
        }
        Ok(())
    }

    /// Resolve the interpreter this configuration would run.
    ///
    /// Returns `None` when an explicit path does not exist or no `python3`
    /// is on `PATH`. Useful for startup checks and test guards.
    pub fn resolved_interpreter(&self) -> Option<PathBuf> {
        match &self.interpreter {
            Some(path) if path.exists() => Some(path.clone()),
            Some(_) => None,
            None => which::which("python3").ok(),
        }
    }
}

/// Builder for [`EngineConfig`].
#[derive(Debug, Default)]
pub struct EngineConfigBuilder {
    config: EngineConfig,
}

impl EngineConfigBuilder {
    /// Set an explicit interpreter path.
    pub fn interpreter(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.interpreter = Some(path.into());
        self
    }

    /// Set the per-invocation deadline.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Set the worker address-space limit in MiB.
    pub fn memory_limit_mb(mut self, mib: u64) -> Self {
        self.config.memory_limit_mb = Some(mib);
        self
    }

    /// Set the worker CPU-time limit in seconds.
    pub fn cpu_limit_secs(mut self, secs: u64) -> Self {
        self.config.cpu_limit_secs = Some(secs);
        self
    }

    /// Set the maximum number of concurrent invocations.
    pub fn max_concurrent(mut self, count: usize) -> Self {
        self.config.max_concurrent = count;
        self
    }

    /// Set the captured-output cap in bytes.
    pub fn max_output_bytes(mut self, bytes: usize) -> Self {
        self.config.max_output_bytes = bytes;
        self
    }

    /// Build the configuration, validating all fields.
    pub fn build(self) -> Result<EngineConfig, EngineError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

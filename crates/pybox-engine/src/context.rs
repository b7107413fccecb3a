//! Per-invocation execution context.
//!
//! An [`ExecutionContext`] defines the isolated environment one invocation
//! runs in: a dedicated worker process definition (interpreter in isolated
//! mode), a private scratch working directory, and a scrubbed environment.
//! Contexts are created fresh per invocation and discarded (scratch
//! directory included) when the invocation ends, whatever the outcome.
//!
//! The only state shared between invocations is the interpreter installation
//! itself (standard library and preinstalled site-packages), which the worker
//! can read but not modify. A program importing an optional library that is
//! not installed sees an ordinary `ImportError` it can catch; the host never
//! faults for it.

use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use chrono::{DateTime, Utc};
use std::fmt;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tokio::process::Command;
use uuid::Uuid;

/// Unique identifier for one invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InvocationId(Uuid);

impl InvocationId {
    /// Create a new random invocation ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Get the underlying UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for InvocationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for InvocationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for InvocationId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

/// The isolated environment for one invocation.
///
/// Dropping the context removes the scratch directory.
pub struct ExecutionContext {
    id: InvocationId,
    interpreter: PathBuf,
    scratch: TempDir,
    started_at: DateTime<Utc>,
}

impl ExecutionContext {
    /// Create a fresh context for one invocation.
    ///
    /// Resolves the interpreter (explicit path from config, else `python3`
    /// on `PATH`) and creates the private scratch directory the worker will
    /// run in.
    pub fn create(config: &EngineConfig) -> Result<Self> {
        let id = InvocationId::new();
        let interpreter = resolve_interpreter(config)?;
        let scratch = tempfile::Builder::new()
            .prefix("pybox-")
            .tempdir()
            .map_err(EngineError::Io)?;

        tracing::debug!(
            invocation_id = %id,
            interpreter = %interpreter.display(),
            scratch = %scratch.path().display(),
            "Execution context created"
        );

        Ok(Self {
            id,
            interpreter,
            scratch,
            started_at: Utc::now(),
        })
    }

    /// Get the invocation ID.
    pub fn id(&self) -> InvocationId {
        self.id
    }

    /// Path to the resolved interpreter.
    pub fn interpreter(&self) -> &Path {
        &self.interpreter
    }

    /// Path to the private scratch directory.
    pub fn scratch_path(&self) -> &Path {
        self.scratch.path()
    }

    /// When this context was created.
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Build the base worker command: interpreter in isolated mode, scratch
    /// directory as working directory, environment reduced to the minimum.
    ///
    /// `-I` starts the interpreter with only builtins and the read-only
    /// module registry pre-seeded (no user site dir, no inherited `PYTHON*`
    /// variables); `-u` keeps stdout unbuffered so partial output survives a
    /// deadline kill; `-X utf8` pins the I/O encoding independent of locale.
    pub(crate) fn command(&self) -> Command {
        let mut cmd = Command::new(&self.interpreter);
        cmd.arg("-I").arg("-u").arg("-X").arg("utf8");
        cmd.current_dir(self.scratch.path());
        cmd.env_clear();
        cmd.env("PATH", "/usr/local/bin:/usr/bin:/bin");
        cmd.env("HOME", self.scratch.path());
        cmd
    }
}

fn resolve_interpreter(config: &EngineConfig) -> Result<PathBuf> {
    match &config.interpreter {
        Some(path) => {
            if path.exists() {
                Ok(path.clone())
            } else {
                Err(EngineError::InterpreterNotFound(
                    path.display().to_string(),
                ))
            }
        }
        None => which::which("python3")
            .map_err(|_| EngineError::InterpreterNotFound("python3".into())),
    }
}

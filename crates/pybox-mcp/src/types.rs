//! Tool parameter and response types for MCP tools.
//!
//! These types use serde for serialization and schemars for automatic
//! JSON Schema generation required by MCP.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Parameters for executing Python source text.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct ExecutePythonParams {
    /// Python source to execute.
    pub code: String,
}

/// Result of executing Python source text.
///
/// `output` is always present: captured output on success, captured output
/// plus a diagnostic line on failure.
#[derive(Debug, Serialize, JsonSchema)]
pub struct ExecutePythonResult {
    /// The single result string.
    pub output: String,
}

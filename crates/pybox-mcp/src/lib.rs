//! # pybox-mcp
//!
//! MCP server exposing the pybox execution engine as a tool.
//!
//! The server offers a single tool, `execute_python`, whose result is the
//! engine's one-string contract: captured output on success, captured output
//! plus a diagnostic line on failure. Transports: stdio for local AI tools
//! and streamable HTTP for remote agents.

pub mod config;
pub mod http;
pub mod server;
pub mod types;

pub use config::{ConfigError, PyboxConfig, TransportMode, MAX_SOURCE_BYTES};
pub use server::PyboxServer;
